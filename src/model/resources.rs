//! Resource snapshots and creation specs exchanged with the provider.

use std::fmt;

use serde_json::Value;

use super::ids::{FlavorId, FloatingIpId, InstanceId, PortId, RoutingTableId, SubnetId, VpcId};

/// Parameters for creating a VPC.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VpcSpec {
    /// Display name.
    pub name: String,
    /// IPv4 CIDR block, for example `10.0.0.0/16`.
    pub cidr: String,
}

/// Parameters for creating a subnet inside an existing VPC.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubnetSpec {
    /// Parent VPC.
    pub vpc_id: VpcId,
    /// Display name.
    pub name: String,
    /// IPv4 CIDR block carved from the VPC range.
    pub cidr: String,
}

/// Summary of a subnet as embedded in VPC details.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VpcSubnetSummary {
    /// Subnet identifier.
    pub id: SubnetId,
    /// Routing table bound to the subnet, when the provider reports one.
    pub routing_table_id: Option<RoutingTableId>,
}

/// VPC details used to discover routing tables.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VpcDetails {
    /// VPC identifier.
    pub id: VpcId,
    /// Subnets in provider order.
    pub subnets: Vec<VpcSubnetSummary>,
}

impl VpcDetails {
    /// Returns the routing table for `subnet`, falling back to the first
    /// subnet that reports one.
    #[must_use]
    pub fn routing_table_for(&self, subnet: &SubnetId) -> Option<&RoutingTableId> {
        self.subnets
            .iter()
            .find(|summary| &summary.id == subnet)
            .and_then(|summary| summary.routing_table_id.as_ref())
            .or_else(|| {
                self.subnets
                    .iter()
                    .find_map(|summary| summary.routing_table_id.as_ref())
            })
    }
}

/// Parameters for creating a compute instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerSpec {
    /// Instance name.
    pub name: String,
    /// Key pair injected into the instance, if any.
    pub key_name: Option<String>,
    /// Boot image identifier.
    pub image_ref: String,
    /// Flavor chosen by the selection policy.
    pub flavor_id: FlavorId,
    /// Subnet the primary NIC attaches to.
    pub subnet_id: SubnetId,
    /// Fixed IPv4 address requested on the subnet, if any.
    pub fixed_ip: Option<String>,
    /// Security group names (the compute API references groups by name).
    pub security_group_names: Vec<String>,
    /// Base64-encoded startup script.
    pub user_data: Option<String>,
    /// Boot volume size in gigabytes.
    pub volume_size_gb: u32,
}

/// Point-in-time state of a compute instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InstanceStatus {
    /// The instance is still being built.
    Building,
    /// The instance is running.
    Active,
    /// The provider failed to build the instance.
    Error,
    /// Any other status string the provider reports.
    Other(String),
}

impl InstanceStatus {
    /// Parses a provider status string. Both `BUILD` and `BUILDING` map to
    /// [`InstanceStatus::Building`].
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "BUILD" | "BUILDING" => Self::Building,
            "ACTIVE" => Self::Active,
            "ERROR" => Self::Error,
            _ => Self::Other(raw.to_owned()),
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Building => f.write_str("BUILDING"),
            Self::Active => f.write_str("ACTIVE"),
            Self::Error => f.write_str("ERROR"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

/// Latest instance snapshot, including the raw provider document.
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceSnapshot {
    /// Instance identifier.
    pub id: InstanceId,
    /// Parsed status.
    pub status: InstanceStatus,
    /// Raw `server` object as returned by the provider.
    pub raw: Value,
}

impl InstanceSnapshot {
    /// Returns the provider fault message, present on instances in `ERROR`.
    #[must_use]
    pub fn fault_message(&self) -> Option<&str> {
        self.raw
            .get("fault")
            .and_then(|fault| fault.get("message"))
            .and_then(Value::as_str)
    }
}

/// A publicly routable address allocated from the external network.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FloatingIp {
    /// Floating IP identifier.
    pub id: FloatingIpId,
    /// Allocated address.
    pub ip_address: String,
}

/// Compute sizing template.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Flavor {
    /// Flavor identifier.
    pub id: FlavorId,
    /// Flavor name, for example `m2.c1m2`.
    pub name: String,
}

/// SSH key pair registered with the compute service.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyPair {
    /// Key pair name.
    pub name: String,
    /// Public key fingerprint.
    pub fingerprint: String,
}

/// Boot image available to the tenant.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Image {
    /// Image identifier.
    pub id: String,
    /// Image name.
    pub name: String,
}

/// Network port bound to a device.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Port {
    /// Port identifier.
    pub id: PortId,
    /// Owning device (instance) identifier.
    pub device_id: String,
}
