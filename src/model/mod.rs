//! Domain types shared by the backend, the poller, and the orchestrator.

mod ids;
mod resources;
mod rules;

pub use ids::{
    FlavorId, FloatingIpId, GatewayId, InstanceId, NetworkId, PortId, RoutingTableId,
    SecurityGroupId, SecurityGroupRuleId, SubnetId, VpcId,
};
pub use resources::{
    Flavor, FloatingIp, Image, InstanceSnapshot, InstanceStatus, KeyPair, Port, ServerSpec,
    SubnetSpec, VpcDetails, VpcSpec, VpcSubnetSummary,
};
pub use rules::{Direction, PortRange, RuleParseError, SecurityRule, parse_rule_set};
