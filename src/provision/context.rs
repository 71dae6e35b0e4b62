//! Handles accumulated while the pipeline runs.

use super::error::StepError;
use super::step::StepOutput;
use crate::backend::ApiError;
use crate::model::{
    Flavor, FloatingIp, GatewayId, InstanceId, InstanceSnapshot, NetworkId, PortId,
    RoutingTableId, SecurityGroupId, SecurityGroupRuleId, SecurityRule, SubnetId, VpcId,
};

/// A security rule the provider refused.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RuleFailure {
    /// Rule that was not created.
    pub rule: SecurityRule,
    /// Provider error.
    pub error: ApiError,
}

/// Everything the pipeline has produced so far.
///
/// Each step reads its inputs from here and [`ProvisionContext::record`] folds
/// the step's output back in. Handles are only ever set from successful step
/// outputs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProvisionContext {
    /// Created VPC.
    pub vpc_id: Option<VpcId>,
    /// Created subnet.
    pub subnet_id: Option<SubnetId>,
    /// Routing table bound to the subnet.
    pub routing_table_id: Option<RoutingTableId>,
    /// External network for the gateway and floating IP.
    pub external_network_id: Option<NetworkId>,
    /// Created internet gateway.
    pub gateway_id: Option<GatewayId>,
    /// Whether the gateway was attached to the routing table.
    pub gateway_attached: bool,
    /// Created security group.
    pub security_group_id: Option<SecurityGroupId>,
    /// Rules created in the security group.
    pub rule_ids: Vec<SecurityGroupRuleId>,
    /// Rules the provider refused.
    pub rule_failures: Vec<RuleFailure>,
    /// Selected flavor.
    pub flavor: Option<Flavor>,
    /// Created instance.
    pub instance_id: Option<InstanceId>,
    /// Snapshot taken when the instance became active.
    pub instance: Option<InstanceSnapshot>,
    /// Port bound to the instance.
    pub port_id: Option<PortId>,
    /// Allocated floating IP.
    pub floating_ip: Option<FloatingIp>,
    /// Whether the floating IP was bound to the port.
    pub floating_ip_associated: bool,
}

impl ProvisionContext {
    /// Folds a step's output into the context.
    pub fn record(&mut self, output: StepOutput) {
        match output {
            StepOutput::Vpc(id) => self.vpc_id = Some(id),
            StepOutput::Subnet(id) => self.subnet_id = Some(id),
            StepOutput::RoutingTable(id) => self.routing_table_id = Some(id),
            StepOutput::ExternalNetwork(id) => self.external_network_id = Some(id),
            StepOutput::Gateway(id) => self.gateway_id = Some(id),
            StepOutput::GatewayAttached => self.gateway_attached = true,
            StepOutput::SecurityGroup(id) => self.security_group_id = Some(id),
            StepOutput::SecurityRules { created, failed } => {
                self.rule_ids.extend(created);
                self.rule_failures.extend(failed);
            }
            StepOutput::Flavor(flavor) => self.flavor = Some(flavor),
            StepOutput::Instance(id) => self.instance_id = Some(id),
            StepOutput::Activated(snapshot) => self.instance = Some(snapshot),
            StepOutput::Port(id) => self.port_id = Some(id),
            StepOutput::FloatingIp(ip) => self.floating_ip = Some(ip),
            StepOutput::FloatingIpAssociated => self.floating_ip_associated = true,
        }
    }

    /// Lists the identifiers of resources created on the provider so far, in
    /// creation order, as `(kind, id)` pairs.
    #[must_use]
    pub fn created_resources(&self) -> Vec<(&'static str, String)> {
        let mut created = Vec::new();
        let mut push = |kind: &'static str, id: Option<&str>| {
            if let Some(value) = id {
                created.push((kind, value.to_owned()));
            }
        };
        push("vpc", self.vpc_id.as_deref());
        push("subnet", self.subnet_id.as_deref());
        push("internet gateway", self.gateway_id.as_deref());
        push("security group", self.security_group_id.as_deref());
        push("instance", self.instance_id.as_deref());
        push(
            "floating ip",
            self.floating_ip.as_ref().map(|ip| ip.id.as_str()),
        );
        created
    }

    pub(super) fn require<'a, T>(
        value: Option<&'a T>,
        name: &'static str,
    ) -> Result<&'a T, StepError>
    where
        T: std::ops::Deref<Target = str>,
    {
        value
            .filter(|handle| !handle.trim().is_empty())
            .ok_or(StepError::MissingHandle(name))
    }

    pub(super) fn require_vpc(&self) -> Result<&VpcId, StepError> {
        Self::require(self.vpc_id.as_ref(), "vpc id")
    }

    pub(super) fn require_subnet(&self) -> Result<&SubnetId, StepError> {
        Self::require(self.subnet_id.as_ref(), "subnet id")
    }

    pub(super) fn require_routing_table(&self) -> Result<&RoutingTableId, StepError> {
        Self::require(self.routing_table_id.as_ref(), "routing table id")
    }

    pub(super) fn require_external_network(&self) -> Result<&NetworkId, StepError> {
        Self::require(self.external_network_id.as_ref(), "external network id")
    }

    pub(super) fn require_gateway(&self) -> Result<&GatewayId, StepError> {
        Self::require(self.gateway_id.as_ref(), "internet gateway id")
    }

    pub(super) fn require_security_group(&self) -> Result<&SecurityGroupId, StepError> {
        Self::require(self.security_group_id.as_ref(), "security group id")
    }

    pub(super) fn require_flavor(&self) -> Result<&Flavor, StepError> {
        self.flavor
            .as_ref()
            .filter(|flavor| !flavor.id.is_blank())
            .ok_or(StepError::MissingHandle("flavor"))
    }

    pub(super) fn require_instance(&self) -> Result<&InstanceId, StepError> {
        Self::require(self.instance_id.as_ref(), "instance id")
    }

    pub(super) fn require_port(&self) -> Result<&PortId, StepError> {
        Self::require(self.port_id.as_ref(), "port id")
    }

    pub(super) fn require_floating_ip(&self) -> Result<&FloatingIp, StepError> {
        self.floating_ip
            .as_ref()
            .filter(|ip| !ip.id.is_blank())
            .ok_or(StepError::MissingHandle("floating ip"))
    }
}
