//! Region-scoped base URLs for the provider's service endpoints.

/// Base URLs for each control-plane service used by the backend.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Endpoints {
    /// Networking service (VPCs, subnets, gateways, security groups, ports,
    /// floating IPs).
    pub network: String,
    /// Instance service (servers and flavors).
    pub instance: String,
    /// Compute service (key pairs).
    pub compute: String,
    /// Image service.
    pub image: String,
}

impl Endpoints {
    /// Builds the public endpoints for `region` (for example `kr1`).
    #[must_use]
    pub fn for_region(region: &str) -> Self {
        let code = region.trim().to_ascii_lowercase();
        Self {
            network: format!("https://{code}-api-network-infrastructure.nhncloudservice.com"),
            instance: format!("https://{code}-api-instance-infrastructure.nhncloudservice.com"),
            compute: format!("https://{code}-api-compute-infrastructure.nhncloudservice.com"),
            image: format!("https://{code}-api-image-infrastructure.nhncloudservice.com"),
        }
    }

    /// Routes every service to the same base URL. Useful for local doubles.
    #[must_use]
    pub fn uniform(base: &str) -> Self {
        let root = base.trim_end_matches('/').to_owned();
        Self {
            network: root.clone(),
            instance: root.clone(),
            compute: root.clone(),
            image: root,
        }
    }
}
