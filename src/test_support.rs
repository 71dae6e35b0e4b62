//! Test support utilities shared across unit and integration tests.

use std::collections::{HashMap, VecDeque};
use std::future::ready;
use std::sync::{Arc, Mutex, PoisonError};

use serde_json::json;

use crate::backend::{ApiError, ApiFuture, Backend};
use crate::model::{
    Flavor, FlavorId, FloatingIp, FloatingIpId, GatewayId, Image, InstanceId, InstanceSnapshot,
    InstanceStatus, KeyPair, NetworkId, Port, PortId, RoutingTableId, SecurityGroupId,
    SecurityGroupRuleId, SecurityRule, ServerSpec, SubnetId, SubnetSpec, VpcDetails, VpcId,
    VpcSpec, VpcSubnetSummary,
};

/// Backend operations, used to script failures and inspect call order.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Operation {
    /// `create_vpc`.
    CreateVpc,
    /// `create_subnet`.
    CreateSubnet,
    /// `get_vpc`.
    GetVpc,
    /// `find_external_network`.
    FindExternalNetwork,
    /// `create_internet_gateway`.
    CreateInternetGateway,
    /// `attach_gateway`.
    AttachGateway,
    /// `create_security_group`.
    CreateSecurityGroup,
    /// `create_security_group_rule`.
    CreateSecurityGroupRule,
    /// `list_flavors`.
    ListFlavors,
    /// `list_key_pairs`.
    ListKeyPairs,
    /// `list_images`.
    ListImages,
    /// `create_server`.
    CreateServer,
    /// `get_server`.
    GetServer,
    /// `list_ports`.
    ListPorts,
    /// `create_floating_ip`.
    CreateFloatingIp,
    /// `associate_floating_ip`.
    AssociateFloatingIp,
}

/// A recorded backend call with the inputs it received.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Call {
    /// VPC creation.
    CreateVpc(VpcSpec),
    /// Subnet creation.
    CreateSubnet(SubnetSpec),
    /// VPC lookup.
    GetVpc(VpcId),
    /// External network lookup.
    FindExternalNetwork,
    /// Gateway creation.
    CreateInternetGateway {
        /// Gateway name.
        name: String,
        /// External network.
        network: NetworkId,
    },
    /// Gateway attachment.
    AttachGateway {
        /// Routing table.
        routing_table: RoutingTableId,
        /// Gateway.
        gateway: GatewayId,
    },
    /// Security group creation.
    CreateSecurityGroup {
        /// Group name.
        name: String,
    },
    /// Rule creation.
    CreateSecurityGroupRule {
        /// Owning group.
        group: SecurityGroupId,
        /// Requested rule.
        rule: SecurityRule,
    },
    /// Flavor listing.
    ListFlavors,
    /// Key pair listing.
    ListKeyPairs,
    /// Image listing.
    ListImages,
    /// Instance creation.
    CreateServer(ServerSpec),
    /// Instance status lookup.
    GetServer(InstanceId),
    /// Port lookup.
    ListPorts(InstanceId),
    /// Floating IP allocation.
    CreateFloatingIp(NetworkId),
    /// Floating IP association.
    AssociateFloatingIp {
        /// Floating IP.
        floating_ip: FloatingIpId,
        /// Target port.
        port: PortId,
    },
}

impl Call {
    /// Operation this call belongs to.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::CreateVpc(_) => Operation::CreateVpc,
            Self::CreateSubnet(_) => Operation::CreateSubnet,
            Self::GetVpc(_) => Operation::GetVpc,
            Self::FindExternalNetwork => Operation::FindExternalNetwork,
            Self::CreateInternetGateway { .. } => Operation::CreateInternetGateway,
            Self::AttachGateway { .. } => Operation::AttachGateway,
            Self::CreateSecurityGroup { .. } => Operation::CreateSecurityGroup,
            Self::CreateSecurityGroupRule { .. } => Operation::CreateSecurityGroupRule,
            Self::ListFlavors => Operation::ListFlavors,
            Self::ListKeyPairs => Operation::ListKeyPairs,
            Self::ListImages => Operation::ListImages,
            Self::CreateServer(_) => Operation::CreateServer,
            Self::GetServer(_) => Operation::GetServer,
            Self::ListPorts(_) => Operation::ListPorts,
            Self::CreateFloatingIp(_) => Operation::CreateFloatingIp,
            Self::AssociateFloatingIp { .. } => Operation::AssociateFloatingIp,
        }
    }
}

#[derive(Debug)]
struct Script {
    calls: Vec<Call>,
    failures: HashMap<Operation, ApiError>,
    rule_failures: HashMap<usize, ApiError>,
    rules_seen: usize,
    routing_table: Option<RoutingTableId>,
    flavors: Vec<Flavor>,
    statuses: VecDeque<Result<InstanceSnapshot, ApiError>>,
    ports: Vec<Port>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            failures: HashMap::new(),
            rule_failures: HashMap::new(),
            rules_seen: 0,
            routing_table: Some(RoutingTableId::from("R1")),
            flavors: vec![Flavor {
                id: FlavorId::from("F1"),
                name: String::from("m2.c1m2"),
            }],
            statuses: VecDeque::from([Ok(snapshot("BUILD")), Ok(snapshot("ACTIVE"))]),
            ports: vec![Port {
                id: PortId::from("P1"),
                device_id: String::from("I1"),
            }],
        }
    }
}

fn snapshot(status: &str) -> InstanceSnapshot {
    InstanceSnapshot {
        id: InstanceId::from("I1"),
        status: InstanceStatus::parse(status),
        raw: json!({ "id": "I1", "status": status }),
    }
}

/// In-memory [`Backend`] that records calls and replays a scripted provider.
///
/// By default every operation succeeds with the handles `V1`, `S1`, `R1`,
/// `E1`, `G1`, `SG1`, flavor `m2.c1m2` (`F1`), instance `I1` (building, then
/// active), port `P1`, and floating IP `FIP1` at `203.0.113.5`. Clones share
/// the same script and call log.
#[derive(Clone, Debug, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
}

impl ScriptedBackend {
    /// Creates a backend with the default successful script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_script<T>(&self, f: impl FnOnce(&mut Script) -> T) -> T {
        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut script)
    }

    /// Makes every call to `operation` fail with `error`.
    #[must_use]
    pub fn failing(self, operation: Operation, error: ApiError) -> Self {
        self.with_script(|script| script.failures.insert(operation, error));
        self
    }

    /// Makes the `index`-th rule creation (zero based) fail with `error`.
    #[must_use]
    pub fn failing_rule(self, index: usize, error: ApiError) -> Self {
        self.with_script(|script| script.rule_failures.insert(index, error));
        self
    }

    /// Replaces the status sequence reported by `get_server`. The last entry
    /// repeats once the sequence is exhausted.
    #[must_use]
    pub fn with_statuses(self, statuses: &[&str]) -> Self {
        self.with_script(|script| {
            script.statuses = statuses.iter().map(|status| Ok(snapshot(status))).collect();
        });
        self
    }

    /// Replaces the `get_server` script with explicit results.
    #[must_use]
    pub fn with_status_results(self, results: Vec<Result<InstanceSnapshot, ApiError>>) -> Self {
        self.with_script(|script| script.statuses = results.into());
        self
    }

    /// Replaces the flavor list.
    #[must_use]
    pub fn with_flavors(self, flavors: Vec<Flavor>) -> Self {
        self.with_script(|script| script.flavors = flavors);
        self
    }

    /// Replaces the port list.
    #[must_use]
    pub fn with_ports(self, ports: Vec<Port>) -> Self {
        self.with_script(|script| script.ports = ports);
        self
    }

    /// Sets the routing table reported for the subnet, or none.
    #[must_use]
    pub fn with_routing_table(self, routing_table: Option<&str>) -> Self {
        self.with_script(|script| script.routing_table = routing_table.map(RoutingTableId::from));
        self
    }

    /// Returns every call recorded so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.with_script(|script| script.calls.clone())
    }

    /// Returns the operations invoked so far, in order.
    #[must_use]
    pub fn operations(&self) -> Vec<Operation> {
        self.with_script(|script| script.calls.iter().map(Call::operation).collect())
    }

    /// Counts calls to `operation`.
    #[must_use]
    pub fn count(&self, operation: Operation) -> usize {
        self.with_script(|script| {
            script
                .calls
                .iter()
                .filter(|call| call.operation() == operation)
                .count()
        })
    }

    fn respond<'a, T: Send + 'a>(
        &self,
        call: Call,
        produce: impl FnOnce(&mut Script) -> Result<T, ApiError>,
    ) -> ApiFuture<'a, T> {
        let result = self.with_script(|script| {
            let operation = call.operation();
            script.calls.push(call);
            match script.failures.get(&operation) {
                Some(error) => Err(error.clone()),
                None => produce(script),
            }
        });
        Box::pin(ready(result))
    }
}

impl Backend for ScriptedBackend {
    fn create_vpc<'a>(&'a self, spec: &'a VpcSpec) -> ApiFuture<'a, VpcId> {
        self.respond(Call::CreateVpc(spec.clone()), |_| Ok(VpcId::from("V1")))
    }

    fn create_subnet<'a>(&'a self, spec: &'a SubnetSpec) -> ApiFuture<'a, SubnetId> {
        self.respond(Call::CreateSubnet(spec.clone()), |_| Ok(SubnetId::from("S1")))
    }

    fn get_vpc<'a>(&'a self, vpc_id: &'a VpcId) -> ApiFuture<'a, VpcDetails> {
        self.respond(Call::GetVpc(vpc_id.clone()), |script| {
            Ok(VpcDetails {
                id: vpc_id.clone(),
                subnets: vec![VpcSubnetSummary {
                    id: SubnetId::from("S1"),
                    routing_table_id: script.routing_table.clone(),
                }],
            })
        })
    }

    fn find_external_network(&self) -> ApiFuture<'_, NetworkId> {
        self.respond(Call::FindExternalNetwork, |_| Ok(NetworkId::from("E1")))
    }

    fn create_internet_gateway<'a>(
        &'a self,
        name: &'a str,
        external_network_id: &'a NetworkId,
    ) -> ApiFuture<'a, GatewayId> {
        let call = Call::CreateInternetGateway {
            name: name.to_owned(),
            network: external_network_id.clone(),
        };
        self.respond(call, |_| Ok(GatewayId::from("G1")))
    }

    fn attach_gateway<'a>(
        &'a self,
        routing_table_id: &'a RoutingTableId,
        gateway_id: &'a GatewayId,
    ) -> ApiFuture<'a, ()> {
        let call = Call::AttachGateway {
            routing_table: routing_table_id.clone(),
            gateway: gateway_id.clone(),
        };
        self.respond(call, |_| Ok(()))
    }

    fn create_security_group<'a>(
        &'a self,
        name: &'a str,
        _description: &'a str,
    ) -> ApiFuture<'a, SecurityGroupId> {
        let call = Call::CreateSecurityGroup {
            name: name.to_owned(),
        };
        self.respond(call, |_| Ok(SecurityGroupId::from("SG1")))
    }

    fn create_security_group_rule<'a>(
        &'a self,
        security_group_id: &'a SecurityGroupId,
        rule: &'a SecurityRule,
    ) -> ApiFuture<'a, SecurityGroupRuleId> {
        let call = Call::CreateSecurityGroupRule {
            group: security_group_id.clone(),
            rule: rule.clone(),
        };
        self.respond(call, |script| {
            let index = script.rules_seen;
            script.rules_seen += 1;
            script.rule_failures.get(&index).map_or_else(
                || Ok(SecurityGroupRuleId::from(format!("SGR{}", index + 1))),
                |error| Err(error.clone()),
            )
        })
    }

    fn list_flavors(&self) -> ApiFuture<'_, Vec<Flavor>> {
        self.respond(Call::ListFlavors, |script| Ok(script.flavors.clone()))
    }

    fn list_key_pairs(&self) -> ApiFuture<'_, Vec<KeyPair>> {
        self.respond(Call::ListKeyPairs, |_| {
            Ok(vec![KeyPair {
                name: String::from("deploy"),
                fingerprint: String::from("aa:bb:cc"),
            }])
        })
    }

    fn list_images(&self) -> ApiFuture<'_, Vec<Image>> {
        self.respond(Call::ListImages, |_| {
            Ok(vec![
                Image {
                    id: String::from("img-1"),
                    name: String::from("Ubuntu Server 22.04"),
                },
                Image {
                    id: String::from("img-2"),
                    name: String::from("Rocky Linux 9"),
                },
            ])
        })
    }

    fn create_server<'a>(&'a self, spec: &'a ServerSpec) -> ApiFuture<'a, InstanceId> {
        self.respond(Call::CreateServer(spec.clone()), |_| Ok(InstanceId::from("I1")))
    }

    fn get_server<'a>(&'a self, instance_id: &'a InstanceId) -> ApiFuture<'a, InstanceSnapshot> {
        self.respond(Call::GetServer(instance_id.clone()), |script| {
            let next = if script.statuses.len() > 1 {
                script.statuses.pop_front()
            } else {
                script.statuses.front().cloned()
            };
            next.unwrap_or_else(|| Ok(snapshot("ACTIVE")))
        })
    }

    fn list_ports<'a>(&'a self, device_id: &'a InstanceId) -> ApiFuture<'a, Vec<Port>> {
        self.respond(Call::ListPorts(device_id.clone()), |script| {
            Ok(script.ports.clone())
        })
    }

    fn create_floating_ip<'a>(&'a self, network_id: &'a NetworkId) -> ApiFuture<'a, FloatingIp> {
        self.respond(Call::CreateFloatingIp(network_id.clone()), |_| {
            Ok(FloatingIp {
                id: FloatingIpId::from("FIP1"),
                ip_address: String::from("203.0.113.5"),
            })
        })
    }

    fn associate_floating_ip<'a>(
        &'a self,
        floating_ip_id: &'a FloatingIpId,
        port_id: &'a PortId,
    ) -> ApiFuture<'a, ()> {
        let call = Call::AssociateFloatingIp {
            floating_ip: floating_ip_id.clone(),
            port: port_id.clone(),
        };
        self.respond(call, |_| Ok(()))
    }
}
