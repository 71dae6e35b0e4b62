//! Request and response bodies for the provider's JSON API.
//!
//! Optional request fields are skipped when absent so the provider never sees
//! a `null` placeholder.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{SecurityRule, ServerSpec};

#[derive(Debug, Deserialize)]
pub(super) struct IdRef {
    #[serde(default)]
    pub(super) id: String,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateVpcRequest<'a> {
    pub(super) vpc: CreateVpcBody<'a>,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateVpcBody<'a> {
    pub(super) name: &'a str,
    pub(super) cidrv4: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct VpcEnvelope {
    pub(super) vpc: WireVpc,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireVpc {
    #[serde(default)]
    pub(super) id: String,
    #[serde(default)]
    pub(super) subnets: Vec<WireVpcSubnet>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireVpcSubnet {
    #[serde(default)]
    pub(super) id: String,
    #[serde(default)]
    pub(super) routingtable: Option<IdRef>,
}

#[derive(Debug, Deserialize)]
pub(super) struct VpcListEnvelope {
    #[serde(default)]
    pub(super) vpcs: Vec<WireNetwork>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireNetwork {
    #[serde(default)]
    pub(super) id: String,
    #[serde(rename = "router:external", default)]
    pub(super) router_external: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateSubnetRequest<'a> {
    pub(super) vpcsubnet: CreateSubnetBody<'a>,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateSubnetBody<'a> {
    pub(super) vpc_id: &'a str,
    pub(super) cidr: &'a str,
    pub(super) name: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct SubnetEnvelope {
    pub(super) vpcsubnet: IdRef,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateGatewayRequest<'a> {
    pub(super) internetgateway: CreateGatewayBody<'a>,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateGatewayBody<'a> {
    pub(super) name: &'a str,
    pub(super) external_network_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct GatewayEnvelope {
    pub(super) internetgateway: IdRef,
}

#[derive(Debug, Serialize)]
pub(super) struct AttachGatewayRequest<'a> {
    pub(super) gateway_id: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateSecurityGroupRequest<'a> {
    pub(super) security_group: CreateSecurityGroupBody<'a>,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateSecurityGroupBody<'a> {
    pub(super) name: &'a str,
    pub(super) description: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct SecurityGroupEnvelope {
    pub(super) security_group: IdRef,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateRuleRequest<'a> {
    pub(super) security_group_rule: CreateRuleBody<'a>,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateRuleBody<'a> {
    pub(super) security_group_id: &'a str,
    pub(super) direction: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) protocol: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) port_range_min: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) port_range_max: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) remote_ip_prefix: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) description: Option<&'a str>,
}

impl<'a> CreateRuleRequest<'a> {
    pub(super) fn new(security_group_id: &'a str, rule: &'a SecurityRule) -> Self {
        Self {
            security_group_rule: CreateRuleBody {
                security_group_id,
                direction: rule.direction.as_str(),
                protocol: rule.protocol.as_deref(),
                port_range_min: rule.port_range.map(|range| range.min),
                port_range_max: rule.port_range.map(|range| range.max),
                remote_ip_prefix: rule.remote_ip_prefix.as_deref(),
                description: rule.description.as_deref(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct RuleEnvelope {
    pub(super) security_group_rule: IdRef,
}

#[derive(Debug, Deserialize)]
pub(super) struct FlavorListEnvelope {
    #[serde(default)]
    pub(super) flavors: Vec<WireFlavor>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireFlavor {
    #[serde(default)]
    pub(super) id: String,
    #[serde(default)]
    pub(super) name: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct KeyPairListEnvelope {
    #[serde(default)]
    pub(super) keypairs: Vec<WireKeyPairEntry>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireKeyPairEntry {
    pub(super) keypair: WireKeyPair,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireKeyPair {
    #[serde(default)]
    pub(super) name: String,
    #[serde(default)]
    pub(super) fingerprint: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ImageListEnvelope {
    #[serde(default)]
    pub(super) images: Vec<WireImage>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireImage {
    #[serde(default)]
    pub(super) id: String,
    #[serde(default)]
    pub(super) name: String,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateServerRequest<'a> {
    pub(super) server: CreateServerBody<'a>,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateServerBody<'a> {
    pub(super) name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) key_name: Option<&'a str>,
    #[serde(rename = "flavorRef")]
    pub(super) flavor_ref: &'a str,
    pub(super) networks: Vec<ServerNetwork<'a>>,
    pub(super) security_groups: Vec<NamedRef<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) user_data: Option<&'a str>,
    pub(super) block_device_mapping_v2: Vec<BlockDevice<'a>>,
    pub(super) min_count: u8,
    pub(super) max_count: u8,
}

#[derive(Debug, Serialize)]
pub(super) struct ServerNetwork<'a> {
    pub(super) subnet: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(super) fixed_ip: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(super) struct NamedRef<'a> {
    pub(super) name: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct BlockDevice<'a> {
    pub(super) boot_index: u8,
    pub(super) source_type: &'static str,
    pub(super) uuid: &'a str,
    pub(super) volume_size: u32,
    pub(super) destination_type: &'static str,
    pub(super) delete_on_termination: bool,
}

impl<'a> CreateServerRequest<'a> {
    pub(super) fn new(spec: &'a ServerSpec) -> Self {
        Self {
            server: CreateServerBody {
                name: &spec.name,
                key_name: spec.key_name.as_deref(),
                flavor_ref: spec.flavor_id.as_str(),
                networks: vec![ServerNetwork {
                    subnet: spec.subnet_id.as_str(),
                    fixed_ip: spec.fixed_ip.as_deref(),
                }],
                security_groups: spec
                    .security_group_names
                    .iter()
                    .map(|name| NamedRef {
                        name: name.as_str(),
                    })
                    .collect(),
                user_data: spec.user_data.as_deref(),
                block_device_mapping_v2: vec![BlockDevice {
                    boot_index: 0,
                    source_type: "image",
                    uuid: &spec.image_ref,
                    volume_size: spec.volume_size_gb,
                    destination_type: "volume",
                    delete_on_termination: true,
                }],
                min_count: 1,
                max_count: 1,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ServerEnvelope {
    pub(super) server: Value,
}

#[derive(Debug, Deserialize)]
pub(super) struct PortListEnvelope {
    #[serde(default)]
    pub(super) ports: Vec<WirePort>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WirePort {
    #[serde(default)]
    pub(super) id: String,
    #[serde(default)]
    pub(super) device_id: String,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateFloatingIpRequest<'a> {
    pub(super) floatingip: CreateFloatingIpBody<'a>,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateFloatingIpBody<'a> {
    pub(super) floating_network_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct FloatingIpEnvelope {
    pub(super) floatingip: WireFloatingIp,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireFloatingIp {
    #[serde(default)]
    pub(super) id: String,
    #[serde(default)]
    pub(super) floating_ip_address: String,
}

#[derive(Debug, Serialize)]
pub(super) struct AssociateFloatingIpRequest<'a> {
    pub(super) floatingip: AssociateFloatingIpBody<'a>,
}

#[derive(Debug, Serialize)]
pub(super) struct AssociateFloatingIpBody<'a> {
    pub(super) port_id: &'a str,
}
