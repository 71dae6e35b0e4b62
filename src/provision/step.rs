//! The ordered provisioning steps and the values they produce.

use std::fmt;

use super::context::RuleFailure;
use crate::model::{
    Flavor, FloatingIp, GatewayId, InstanceId, InstanceSnapshot, NetworkId, PortId,
    RoutingTableId, SecurityGroupId, SecurityGroupRuleId, SubnetId, VpcId,
};

/// One named step of the pipeline.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Step {
    /// Create the VPC.
    CreateVpc,
    /// Create the subnet inside the VPC.
    CreateSubnet,
    /// Look up the routing table created for the subnet.
    ResolveRoutingTable,
    /// Look up the external network.
    ResolveExternalNetwork,
    /// Create the internet gateway on the external network.
    CreateInternetGateway,
    /// Attach the gateway to the routing table.
    AttachGateway,
    /// Create the security group.
    CreateSecurityGroup,
    /// Add each configured rule to the security group.
    CreateSecurityRules,
    /// Pick a flavor.
    SelectFlavor,
    /// Request the instance.
    CreateInstance,
    /// Wait for the instance to become active.
    AwaitActivation,
    /// Find the instance's network port.
    ResolvePort,
    /// Allocate a floating IP on the external network.
    AllocateFloatingIp,
    /// Bind the floating IP to the port.
    AssociateFloatingIp,
}

impl Step {
    /// Every step, in execution order.
    pub const ALL: [Self; 14] = [
        Self::CreateVpc,
        Self::CreateSubnet,
        Self::ResolveRoutingTable,
        Self::ResolveExternalNetwork,
        Self::CreateInternetGateway,
        Self::AttachGateway,
        Self::CreateSecurityGroup,
        Self::CreateSecurityRules,
        Self::SelectFlavor,
        Self::CreateInstance,
        Self::AwaitActivation,
        Self::ResolvePort,
        Self::AllocateFloatingIp,
        Self::AssociateFloatingIp,
    ];

    /// Human-readable step name used in logs and failure reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::CreateVpc => "create vpc",
            Self::CreateSubnet => "create subnet",
            Self::ResolveRoutingTable => "resolve routing table",
            Self::ResolveExternalNetwork => "resolve external network",
            Self::CreateInternetGateway => "create internet gateway",
            Self::AttachGateway => "attach internet gateway",
            Self::CreateSecurityGroup => "create security group",
            Self::CreateSecurityRules => "create security rules",
            Self::SelectFlavor => "select flavor",
            Self::CreateInstance => "create instance",
            Self::AwaitActivation => "await activation",
            Self::ResolvePort => "resolve port",
            Self::AllocateFloatingIp => "allocate floating ip",
            Self::AssociateFloatingIp => "associate floating ip",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value produced by a successful step.
#[derive(Clone, Debug, PartialEq)]
pub enum StepOutput {
    /// VPC created.
    Vpc(VpcId),
    /// Subnet created.
    Subnet(SubnetId),
    /// Routing table discovered.
    RoutingTable(RoutingTableId),
    /// External network discovered.
    ExternalNetwork(NetworkId),
    /// Internet gateway created.
    Gateway(GatewayId),
    /// Gateway attached to the routing table.
    GatewayAttached,
    /// Security group created.
    SecurityGroup(SecurityGroupId),
    /// Rule creation results.
    SecurityRules {
        /// Rules created.
        created: Vec<SecurityGroupRuleId>,
        /// Rules the provider refused.
        failed: Vec<RuleFailure>,
    },
    /// Flavor selected.
    Flavor(Flavor),
    /// Instance creation accepted.
    Instance(InstanceId),
    /// Instance reached `ACTIVE`.
    Activated(InstanceSnapshot),
    /// Port discovered.
    Port(PortId),
    /// Floating IP allocated.
    FloatingIp(FloatingIp),
    /// Floating IP bound to the port.
    FloatingIpAssociated,
}
