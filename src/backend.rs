//! Backend abstraction over the remote provisioning API.
//!
//! Every method performs exactly one request against the control plane and
//! translates the response into a handle, a value, or an [`ApiError`]. The
//! orchestrator is the only caller that composes them.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::model::{
    Flavor, FloatingIp, FloatingIpId, GatewayId, Image, InstanceId, InstanceSnapshot, KeyPair,
    NetworkId, Port, PortId, RoutingTableId, SecurityGroupId, SecurityGroupRuleId, SecurityRule,
    ServerSpec, SubnetId, SubnetSpec, VpcDetails, VpcId, VpcSpec,
};

/// Errors raised by a single resource operation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ApiError {
    /// The request could not be completed (connection, DNS, TLS, timeout).
    #[error("{operation}: request failed: {message}")]
    Transport {
        /// Operation being performed.
        operation: String,
        /// Underlying transport error.
        message: String,
    },
    /// The provider answered with a status other than the declared success
    /// status.
    #[error("{operation}: provider rejected request with status {status}: {body}")]
    Rejected {
        /// Operation being performed.
        operation: String,
        /// HTTP status code returned.
        status: u16,
        /// Raw response body.
        body: String,
    },
    /// The provider answered successfully but the body lacked expected fields.
    #[error("{operation}: unexpected response body: {message}")]
    Decode {
        /// Operation being performed.
        operation: String,
        /// Description of the decoding failure.
        message: String,
    },
    /// A logically required resource was absent from a successful response.
    #[error("{what} not found")]
    NotFound {
        /// Description of the missing resource.
        what: String,
    },
}

impl ApiError {
    /// Convenience constructor for [`ApiError::NotFound`].
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }
}

/// Future returned by backend operations.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Resource operations offered by the provisioning API.
pub trait Backend: Send + Sync {
    /// Creates a VPC.
    fn create_vpc<'a>(&'a self, spec: &'a VpcSpec) -> ApiFuture<'a, VpcId>;

    /// Creates a subnet inside an existing VPC.
    fn create_subnet<'a>(&'a self, spec: &'a SubnetSpec) -> ApiFuture<'a, SubnetId>;

    /// Fetches VPC details, including per-subnet routing tables.
    fn get_vpc<'a>(&'a self, vpc_id: &'a VpcId) -> ApiFuture<'a, VpcDetails>;

    /// Looks up the external network used for gateways and floating IPs.
    fn find_external_network(&self) -> ApiFuture<'_, NetworkId>;

    /// Creates an internet gateway bound to the external network.
    fn create_internet_gateway<'a>(
        &'a self,
        name: &'a str,
        external_network_id: &'a NetworkId,
    ) -> ApiFuture<'a, GatewayId>;

    /// Attaches an internet gateway to a routing table.
    fn attach_gateway<'a>(
        &'a self,
        routing_table_id: &'a RoutingTableId,
        gateway_id: &'a GatewayId,
    ) -> ApiFuture<'a, ()>;

    /// Creates a security group.
    fn create_security_group<'a>(
        &'a self,
        name: &'a str,
        description: &'a str,
    ) -> ApiFuture<'a, SecurityGroupId>;

    /// Adds one rule to a security group.
    fn create_security_group_rule<'a>(
        &'a self,
        security_group_id: &'a SecurityGroupId,
        rule: &'a SecurityRule,
    ) -> ApiFuture<'a, SecurityGroupRuleId>;

    /// Lists the flavors available to the tenant.
    fn list_flavors(&self) -> ApiFuture<'_, Vec<Flavor>>;

    /// Lists the key pairs registered for the tenant.
    fn list_key_pairs(&self) -> ApiFuture<'_, Vec<KeyPair>>;

    /// Lists boot images visible to the tenant.
    fn list_images(&self) -> ApiFuture<'_, Vec<Image>>;

    /// Requests creation of an instance. The instance starts out building.
    fn create_server<'a>(&'a self, spec: &'a ServerSpec) -> ApiFuture<'a, InstanceId>;

    /// Fetches the current instance snapshot.
    fn get_server<'a>(&'a self, instance_id: &'a InstanceId) -> ApiFuture<'a, InstanceSnapshot>;

    /// Lists ports owned by the given device, in provider order.
    fn list_ports<'a>(&'a self, device_id: &'a InstanceId) -> ApiFuture<'a, Vec<Port>>;

    /// Allocates a floating IP from the external network.
    fn create_floating_ip<'a>(&'a self, network_id: &'a NetworkId) -> ApiFuture<'a, FloatingIp>;

    /// Binds a floating IP to a port.
    fn associate_floating_ip<'a>(
        &'a self,
        floating_ip_id: &'a FloatingIpId,
        port_id: &'a PortId,
    ) -> ApiFuture<'a, ()>;
}
