//! Newtypes for provider identifiers to avoid stringly-typed plumbing between
//! pipeline steps.

use std::fmt;
use std::ops::Deref;

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw identifier returned by the provider.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrows the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }

            /// Returns `true` when the identifier carries no characters once
            /// trimmed.
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &Self::Target {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(
    /// Identifier of a VPC.
    VpcId
);
identifier!(
    /// Identifier of a VPC subnet.
    SubnetId
);
identifier!(
    /// Identifier of the routing table implicitly created for a subnet.
    RoutingTableId
);
identifier!(
    /// Identifier of a provider network, such as the external network.
    NetworkId
);
identifier!(
    /// Identifier of an internet gateway.
    GatewayId
);
identifier!(
    /// Identifier of a security group.
    SecurityGroupId
);
identifier!(
    /// Identifier of a security group rule.
    SecurityGroupRuleId
);
identifier!(
    /// Identifier of a compute flavor.
    FlavorId
);
identifier!(
    /// Identifier of a compute instance (server).
    InstanceId
);
identifier!(
    /// Identifier of a network port.
    PortId
);
identifier!(
    /// Identifier of an allocated floating IP.
    FloatingIpId
);
