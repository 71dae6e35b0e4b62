//! NHN Cloud implementation of the provisioning backend.
//!
//! Each [`Backend`] method issues exactly one request. Creation calls on the
//! networking service answer `201 Created` (subnets and security group rules
//! may also answer `200 OK`), server creation answers `202 Accepted`, and
//! reads and updates answer `200 OK`. Any other status is surfaced as
//! [`ApiError::Rejected`].

mod endpoints;
mod http;
mod wire;

use std::time::Duration;

use crate::auth::AuthToken;
use crate::backend::{ApiError, ApiFuture, Backend};
use crate::model::{
    Flavor, FlavorId, FloatingIp, FloatingIpId, GatewayId, Image, InstanceId, InstanceSnapshot,
    InstanceStatus, KeyPair, NetworkId, Port, PortId, RoutingTableId, SecurityGroupId,
    SecurityGroupRuleId, SecurityRule, ServerSpec, SubnetId, SubnetSpec, VpcDetails, VpcId,
    VpcSpec, VpcSubnetSummary,
};
use http::{EXPECT_ACCEPTED, EXPECT_CREATED, EXPECT_OK, EXPECT_OK_OR_CREATED, require_field};
use wire::{
    AssociateFloatingIpBody, AssociateFloatingIpRequest, AttachGatewayRequest,
    CreateFloatingIpBody, CreateFloatingIpRequest, CreateGatewayBody, CreateGatewayRequest,
    CreateRuleRequest, CreateSecurityGroupBody, CreateSecurityGroupRequest, CreateServerRequest,
    CreateSubnetBody, CreateSubnetRequest, CreateVpcBody, CreateVpcRequest, FlavorListEnvelope,
    FloatingIpEnvelope, GatewayEnvelope, ImageListEnvelope, KeyPairListEnvelope,
    PortListEnvelope, RuleEnvelope, SecurityGroupEnvelope, ServerEnvelope, SubnetEnvelope,
    VpcEnvelope, VpcListEnvelope,
};

pub use endpoints::Endpoints;

/// Default per-request timeout applied to every call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Backend that talks to the NHN Cloud control plane over HTTPS.
#[derive(Clone, Debug)]
pub struct NhnBackend {
    http: reqwest::Client,
    endpoints: Endpoints,
    tenant_id: String,
    token: AuthToken,
}

impl NhnBackend {
    /// Creates a backend for `tenant_id` authenticated with `token`.
    ///
    /// Every request carries `request_timeout` so a stalled call cannot block
    /// the caller indefinitely.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] when the HTTP client cannot be built.
    pub fn new(
        endpoints: Endpoints,
        tenant_id: impl Into<String>,
        token: AuthToken,
        request_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|err| ApiError::Transport {
                operation: String::from("build http client"),
                message: err.to_string(),
            })?;
        Ok(Self {
            http,
            endpoints,
            tenant_id: tenant_id.into(),
            token,
        })
    }

    fn network_url(&self, path: &str) -> String {
        format!("{}/v2.0/{path}", self.endpoints.network)
    }

    fn instance_url(&self, path: &str) -> String {
        format!("{}/v2/{}/{path}", self.endpoints.instance, self.tenant_id)
    }

    fn snapshot_from(
        operation: &str,
        server: serde_json::Value,
    ) -> Result<InstanceSnapshot, ApiError> {
        let id = require_field(operation, "server.id", server_id(&server))?;
        let status = server
            .get("status")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ApiError::Decode {
                operation: operation.to_owned(),
                message: String::from("response is missing `server.status`"),
            })?;
        Ok(InstanceSnapshot {
            id: InstanceId::from(id),
            status: InstanceStatus::parse(status),
            raw: server,
        })
    }
}

fn server_id(server: &serde_json::Value) -> String {
    server
        .get("id")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned)
        .unwrap_or_default()
}

const CREATE_VPC: &str = "create vpc";
const CREATE_SUBNET: &str = "create subnet";
const GET_VPC: &str = "get vpc";
const FIND_EXTERNAL_NETWORK: &str = "find external network";
const CREATE_GATEWAY: &str = "create internet gateway";
const ATTACH_GATEWAY: &str = "attach internet gateway";
const CREATE_SECURITY_GROUP: &str = "create security group";
const CREATE_RULE: &str = "create security group rule";
const LIST_FLAVORS: &str = "list flavors";
const LIST_KEY_PAIRS: &str = "list key pairs";
const LIST_IMAGES: &str = "list images";
const CREATE_SERVER: &str = "create server";
const GET_SERVER: &str = "get server";
const LIST_PORTS: &str = "list ports";
const CREATE_FLOATING_IP: &str = "create floating ip";
const ASSOCIATE_FLOATING_IP: &str = "associate floating ip";

impl Backend for NhnBackend {
    fn create_vpc<'a>(&'a self, spec: &'a VpcSpec) -> ApiFuture<'a, VpcId> {
        Box::pin(async move {
            let payload = CreateVpcRequest {
                vpc: CreateVpcBody {
                    name: &spec.name,
                    cidrv4: &spec.cidr,
                },
            };
            let request = self.http.post(self.network_url("vpcs")).json(&payload);
            let envelope: VpcEnvelope = self
                .send_json(CREATE_VPC, request, EXPECT_CREATED)
                .await?;
            require_field(CREATE_VPC, "vpc.id", envelope.vpc.id).map(VpcId::from)
        })
    }

    fn create_subnet<'a>(&'a self, spec: &'a SubnetSpec) -> ApiFuture<'a, SubnetId> {
        Box::pin(async move {
            let payload = CreateSubnetRequest {
                vpcsubnet: CreateSubnetBody {
                    vpc_id: spec.vpc_id.as_str(),
                    cidr: &spec.cidr,
                    name: &spec.name,
                },
            };
            let request = self.http.post(self.network_url("vpcsubnets")).json(&payload);
            let envelope: SubnetEnvelope = self
                .send_json(CREATE_SUBNET, request, EXPECT_OK_OR_CREATED)
                .await?;
            require_field(CREATE_SUBNET, "vpcsubnet.id", envelope.vpcsubnet.id).map(SubnetId::from)
        })
    }

    fn get_vpc<'a>(&'a self, vpc_id: &'a VpcId) -> ApiFuture<'a, VpcDetails> {
        Box::pin(async move {
            let request = self.http.get(self.network_url(&format!("vpcs/{vpc_id}")));
            let envelope: VpcEnvelope = self.send_json(GET_VPC, request, EXPECT_OK).await?;
            let id = require_field(GET_VPC, "vpc.id", envelope.vpc.id)?;
            let subnets = envelope
                .vpc
                .subnets
                .into_iter()
                .filter(|subnet| !subnet.id.trim().is_empty())
                .map(|subnet| VpcSubnetSummary {
                    id: SubnetId::from(subnet.id),
                    routing_table_id: subnet
                        .routingtable
                        .map(|table| table.id)
                        .filter(|table_id| !table_id.trim().is_empty())
                        .map(RoutingTableId::from),
                })
                .collect();
            Ok(VpcDetails {
                id: VpcId::from(id),
                subnets,
            })
        })
    }

    fn find_external_network(&self) -> ApiFuture<'_, NetworkId> {
        Box::pin(async move {
            let request = self
                .http
                .get(self.network_url("vpcs"))
                .query(&[("router:external", "true")]);
            let envelope: VpcListEnvelope = self
                .send_json(FIND_EXTERNAL_NETWORK, request, EXPECT_OK)
                .await?;
            envelope
                .vpcs
                .into_iter()
                .find(|network| network.router_external && !network.id.trim().is_empty())
                .map(|network| NetworkId::from(network.id))
                .ok_or_else(|| ApiError::not_found("external network"))
        })
    }

    fn create_internet_gateway<'a>(
        &'a self,
        name: &'a str,
        external_network_id: &'a NetworkId,
    ) -> ApiFuture<'a, GatewayId> {
        Box::pin(async move {
            let payload = CreateGatewayRequest {
                internetgateway: CreateGatewayBody {
                    name,
                    external_network_id: external_network_id.as_str(),
                },
            };
            let request = self
                .http
                .post(self.network_url("internetgateways"))
                .json(&payload);
            let envelope: GatewayEnvelope = self
                .send_json(CREATE_GATEWAY, request, EXPECT_CREATED)
                .await?;
            require_field(CREATE_GATEWAY, "internetgateway.id", envelope.internetgateway.id)
                .map(GatewayId::from)
        })
    }

    fn attach_gateway<'a>(
        &'a self,
        routing_table_id: &'a RoutingTableId,
        gateway_id: &'a GatewayId,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let payload = AttachGatewayRequest {
                gateway_id: gateway_id.as_str(),
            };
            let request = self
                .http
                .put(self.network_url(&format!(
                    "routingtables/{routing_table_id}/attach_gateway"
                )))
                .json(&payload);
            self.send_unit(ATTACH_GATEWAY, request, EXPECT_OK).await
        })
    }

    fn create_security_group<'a>(
        &'a self,
        name: &'a str,
        description: &'a str,
    ) -> ApiFuture<'a, SecurityGroupId> {
        Box::pin(async move {
            let payload = CreateSecurityGroupRequest {
                security_group: CreateSecurityGroupBody { name, description },
            };
            let request = self
                .http
                .post(self.network_url("security-groups"))
                .json(&payload);
            let envelope: SecurityGroupEnvelope = self
                .send_json(CREATE_SECURITY_GROUP, request, EXPECT_CREATED)
                .await?;
            require_field(
                CREATE_SECURITY_GROUP,
                "security_group.id",
                envelope.security_group.id,
            )
            .map(SecurityGroupId::from)
        })
    }

    fn create_security_group_rule<'a>(
        &'a self,
        security_group_id: &'a SecurityGroupId,
        rule: &'a SecurityRule,
    ) -> ApiFuture<'a, SecurityGroupRuleId> {
        Box::pin(async move {
            let payload = CreateRuleRequest::new(security_group_id.as_str(), rule);
            let request = self
                .http
                .post(self.network_url("security-group-rules"))
                .json(&payload);
            let envelope: RuleEnvelope = self
                .send_json(CREATE_RULE, request, EXPECT_OK_OR_CREATED)
                .await?;
            require_field(CREATE_RULE, "security_group_rule.id", envelope.security_group_rule.id)
                .map(SecurityGroupRuleId::from)
        })
    }

    fn list_flavors(&self) -> ApiFuture<'_, Vec<Flavor>> {
        Box::pin(async move {
            let request = self.http.get(self.instance_url("flavors"));
            let envelope: FlavorListEnvelope = self
                .send_json(LIST_FLAVORS, request, EXPECT_OK)
                .await?;
            Ok(envelope
                .flavors
                .into_iter()
                .filter(|flavor| !flavor.id.trim().is_empty())
                .map(|flavor| Flavor {
                    id: FlavorId::from(flavor.id),
                    name: flavor.name,
                })
                .collect())
        })
    }

    fn list_key_pairs(&self) -> ApiFuture<'_, Vec<KeyPair>> {
        Box::pin(async move {
            let request = self.http.get(format!(
                "{}/v2/{}/os-keypairs",
                self.endpoints.compute, self.tenant_id
            ));
            let envelope: KeyPairListEnvelope = self
                .send_json(LIST_KEY_PAIRS, request, EXPECT_OK)
                .await?;
            Ok(envelope
                .keypairs
                .into_iter()
                .map(|entry| KeyPair {
                    name: entry.keypair.name,
                    fingerprint: entry.keypair.fingerprint,
                })
                .collect())
        })
    }

    fn list_images(&self) -> ApiFuture<'_, Vec<Image>> {
        Box::pin(async move {
            let request = self.http.get(format!("{}/v2/images", self.endpoints.image));
            let envelope: ImageListEnvelope = self
                .send_json(LIST_IMAGES, request, EXPECT_OK)
                .await?;
            Ok(envelope
                .images
                .into_iter()
                .map(|image| Image {
                    id: image.id,
                    name: image.name,
                })
                .collect())
        })
    }

    fn create_server<'a>(&'a self, spec: &'a ServerSpec) -> ApiFuture<'a, InstanceId> {
        Box::pin(async move {
            let payload = CreateServerRequest::new(spec);
            let request = self.http.post(self.instance_url("servers")).json(&payload);
            let envelope: ServerEnvelope = self
                .send_json(CREATE_SERVER, request, EXPECT_ACCEPTED)
                .await?;
            require_field(CREATE_SERVER, "server.id", server_id(&envelope.server))
                .map(InstanceId::from)
        })
    }

    fn get_server<'a>(&'a self, instance_id: &'a InstanceId) -> ApiFuture<'a, InstanceSnapshot> {
        Box::pin(async move {
            let request = self
                .http
                .get(self.instance_url(&format!("servers/{instance_id}")));
            let envelope: ServerEnvelope =
                self.send_json(GET_SERVER, request, EXPECT_OK).await?;
            Self::snapshot_from(GET_SERVER, envelope.server)
        })
    }

    fn list_ports<'a>(&'a self, device_id: &'a InstanceId) -> ApiFuture<'a, Vec<Port>> {
        Box::pin(async move {
            let request = self
                .http
                .get(self.network_url("ports"))
                .query(&[("device_id", device_id.as_str())]);
            let envelope: PortListEnvelope =
                self.send_json(LIST_PORTS, request, EXPECT_OK).await?;
            Ok(envelope
                .ports
                .into_iter()
                .filter(|port| !port.id.trim().is_empty())
                .map(|port| Port {
                    id: PortId::from(port.id),
                    device_id: port.device_id,
                })
                .collect())
        })
    }

    fn create_floating_ip<'a>(&'a self, network_id: &'a NetworkId) -> ApiFuture<'a, FloatingIp> {
        Box::pin(async move {
            let payload = CreateFloatingIpRequest {
                floatingip: CreateFloatingIpBody {
                    floating_network_id: network_id.as_str(),
                },
            };
            let request = self.http.post(self.network_url("floatingips")).json(&payload);
            let envelope: FloatingIpEnvelope = self
                .send_json(CREATE_FLOATING_IP, request, EXPECT_CREATED)
                .await?;
            let id = require_field(CREATE_FLOATING_IP, "floatingip.id", envelope.floatingip.id)?;
            let ip_address = require_field(
                CREATE_FLOATING_IP,
                "floatingip.floating_ip_address",
                envelope.floatingip.floating_ip_address,
            )?;
            Ok(FloatingIp {
                id: FloatingIpId::from(id),
                ip_address,
            })
        })
    }

    fn associate_floating_ip<'a>(
        &'a self,
        floating_ip_id: &'a FloatingIpId,
        port_id: &'a PortId,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let payload = AssociateFloatingIpRequest {
                floatingip: AssociateFloatingIpBody {
                    port_id: port_id.as_str(),
                },
            };
            let request = self
                .http
                .put(self.network_url(&format!("floatingips/{floating_ip_id}")))
                .json(&payload);
            self.send_unit(ASSOCIATE_FLOATING_IP, request, EXPECT_OK)
                .await
        })
    }
}
