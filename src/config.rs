//! Configuration loading via `ortho-config`.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::auth::Credentials;
use crate::model::{RuleParseError, parse_rule_set};
use crate::nhn::Endpoints;
use crate::paths::expand_tilde;
use crate::poller::PollSettings;
use crate::provision::ProvisionRequest;
use crate::user_data::{UserDataError, UserDataSources, resolve_user_data};

/// Rule set applied when none is configured: HTTP and SSH from anywhere.
pub const DEFAULT_SECURITY_RULES: &str = "ingress:tcp:80:0.0.0.0/0,ingress:tcp:22:0.0.0.0/0";

/// Settings for a provisioning run, merged from defaults, `stratus.toml`,
/// `STRATUS_*` environment variables, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "STRATUS",
    discovery(
        app_name = "stratus",
        env_var = "STRATUS_CONFIG_PATH",
        config_file_name = "stratus.toml",
        dotfile_name = ".stratus.toml",
        project_file_name = "stratus.toml"
    )
)]
pub struct StratusConfig {
    /// Region code selecting every API host. Defaults to `kr1`.
    #[ortho_config(default = "kr1".to_owned())]
    pub region: String,
    /// Tenant identifier. Required.
    #[ortho_config(default = String::new())]
    pub tenant_id: String,
    /// API user name used to issue tokens. Required.
    #[ortho_config(default = String::new())]
    pub api_username: String,
    /// API password used to issue tokens. Required.
    #[ortho_config(default = String::new())]
    pub api_password: String,
    /// Token cache location. Supports `~/` expansion.
    #[ortho_config(default = ".stratus-token.json".to_owned())]
    pub token_cache_path: String,
    /// VPC name.
    #[ortho_config(default = "stratus-vpc".to_owned())]
    pub vpc_name: String,
    /// VPC CIDR block.
    #[ortho_config(default = "10.0.0.0/16".to_owned())]
    pub vpc_cidr: String,
    /// Subnet name.
    #[ortho_config(default = "stratus-subnet".to_owned())]
    pub subnet_name: String,
    /// Subnet CIDR block; must lie inside the VPC block.
    #[ortho_config(default = "10.0.1.0/24".to_owned())]
    pub subnet_cidr: String,
    /// Internet gateway name; `<vpc_name>-igw` when unset.
    pub gateway_name: Option<String>,
    /// Security group name.
    #[ortho_config(default = "stratus-sg".to_owned())]
    pub security_group_name: String,
    /// Security group description.
    #[ortho_config(default = "web server and ssh access".to_owned())]
    pub security_group_description: String,
    /// Comma-separated `direction:protocol:ports:remote` rules.
    #[ortho_config(default = DEFAULT_SECURITY_RULES.to_owned())]
    pub security_rules: String,
    /// Instance name.
    #[ortho_config(default = "stratus-web".to_owned())]
    pub instance_name: String,
    /// Boot image identifier. Required for provisioning.
    #[ortho_config(default = String::new())]
    pub image_ref: String,
    /// Key pair injected into the instance.
    pub key_name: Option<String>,
    /// Fixed IPv4 address on the subnet.
    pub fixed_ip: Option<String>,
    /// Preferred flavor name.
    #[ortho_config(default = "m2.c1m2".to_owned())]
    pub preferred_flavor: String,
    /// Boot volume size in gigabytes.
    #[ortho_config(default = 30)]
    pub volume_size_gb: u32,
    /// Inline startup script.
    pub user_data: Option<String>,
    /// Path to a startup script.
    pub user_data_file: Option<String>,
    /// Path to an HTML page served by the generated nginx bootstrap.
    pub web_page_file: Option<String>,
    /// Seconds between activation polls.
    #[ortho_config(default = 10)]
    pub poll_interval_secs: u64,
    /// Seconds to wait for activation before giving up.
    #[ortho_config(default = 600)]
    pub wait_timeout_secs: u64,
    /// Per-request HTTP timeout in seconds.
    #[ortho_config(default = 30)]
    pub request_timeout_secs: u64,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn guidance(&self) -> String {
        format!(
            "set {} or add {} to stratus.toml",
            self.env_var, self.toml_key
        )
    }
}

const REGION: FieldMetadata = FieldMetadata::new("region code", "STRATUS_REGION", "region");
const TENANT: FieldMetadata = FieldMetadata::new("tenant ID", "STRATUS_TENANT_ID", "tenant_id");
const USERNAME: FieldMetadata =
    FieldMetadata::new("API user name", "STRATUS_API_USERNAME", "api_username");
const PASSWORD: FieldMetadata =
    FieldMetadata::new("API password", "STRATUS_API_PASSWORD", "api_password");
const TOKEN_CACHE: FieldMetadata = FieldMetadata::new(
    "token cache path",
    "STRATUS_TOKEN_CACHE_PATH",
    "token_cache_path",
);
const IMAGE: FieldMetadata = FieldMetadata::new("boot image ID", "STRATUS_IMAGE_REF", "image_ref");
const POLL_INTERVAL: FieldMetadata = FieldMetadata::new(
    "poll interval",
    "STRATUS_POLL_INTERVAL_SECS",
    "poll_interval_secs",
);
const WAIT_TIMEOUT: FieldMetadata = FieldMetadata::new(
    "activation timeout",
    "STRATUS_WAIT_TIMEOUT_SECS",
    "wait_timeout_secs",
);
const REQUEST_TIMEOUT: FieldMetadata = FieldMetadata::new(
    "request timeout",
    "STRATUS_REQUEST_TIMEOUT_SECS",
    "request_timeout_secs",
);
const VOLUME_SIZE: FieldMetadata =
    FieldMetadata::new("boot volume size", "STRATUS_VOLUME_SIZE_GB", "volume_size_gb");

impl StratusConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: {}",
                metadata.description,
                metadata.guidance()
            )));
        }
        Ok(())
    }

    fn require_positive(value: u64, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::Invalid(format!(
                "{} must be greater than zero: {}",
                metadata.description,
                metadata.guidance()
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("stratus")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Checks the settings needed to talk to the API at all.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the environment variable and TOML key
    /// of the first missing or invalid value.
    pub fn validate_access(&self) -> Result<(), ConfigError> {
        Self::require_field(&self.region, &REGION)?;
        Self::require_field(&self.tenant_id, &TENANT)?;
        Self::require_field(&self.api_username, &USERNAME)?;
        Self::require_field(&self.api_password, &PASSWORD)?;
        Self::require_field(&self.token_cache_path, &TOKEN_CACHE)?;
        Self::require_positive(self.request_timeout_secs, &REQUEST_TIMEOUT)
    }

    /// Checks everything a provisioning run needs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for the first missing or invalid value,
    /// including malformed security rules.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_access()?;
        Self::require_field(&self.image_ref, &IMAGE)?;
        Self::require_positive(self.poll_interval_secs, &POLL_INTERVAL)?;
        Self::require_positive(self.wait_timeout_secs, &WAIT_TIMEOUT)?;
        Self::require_positive(u64::from(self.volume_size_gb), &VOLUME_SIZE)?;
        parse_rule_set(&self.security_rules)?;
        Ok(())
    }

    /// Region-scoped API endpoints.
    #[must_use]
    pub fn endpoints(&self) -> Endpoints {
        Endpoints::for_region(&self.region)
    }

    /// Credentials for token issuance.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials {
            tenant_id: self.tenant_id.trim().to_owned(),
            username: self.api_username.trim().to_owned(),
            password: self.api_password.clone(),
        }
    }

    /// Token cache path with `~/` expanded.
    #[must_use]
    pub fn token_cache_path(&self) -> String {
        expand_tilde(self.token_cache_path.trim())
    }

    /// Per-request HTTP timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Activation poll cadence and deadline.
    #[must_use]
    pub const fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_secs(self.poll_interval_secs),
            timeout: Duration::from_secs(self.wait_timeout_secs),
        }
    }

    /// Builds the provisioning request, resolving the startup script.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails or the startup script
    /// cannot be resolved.
    pub fn provision_request(&self) -> Result<ProvisionRequest, ConfigError> {
        self.validate()?;
        let security_rules = parse_rule_set(&self.security_rules)?;
        let user_data = resolve_user_data(UserDataSources {
            inline: self.user_data.as_deref(),
            file: self.user_data_file.as_deref(),
            web_page_file: self.web_page_file.as_deref(),
        })?;
        Ok(ProvisionRequest {
            vpc_name: self.vpc_name.clone(),
            vpc_cidr: self.vpc_cidr.clone(),
            subnet_name: self.subnet_name.clone(),
            subnet_cidr: self.subnet_cidr.clone(),
            gateway_name: self.gateway_name.clone(),
            security_group_name: self.security_group_name.clone(),
            security_group_description: self.security_group_description.clone(),
            security_rules,
            instance_name: self.instance_name.clone(),
            image_ref: self.image_ref.trim().to_owned(),
            key_name: non_blank(self.key_name.as_deref()),
            fixed_ip: non_blank(self.fixed_ip.as_deref()),
            preferred_flavor: self.preferred_flavor.clone(),
            volume_size_gb: self.volume_size_gb,
            user_data: Some(user_data),
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configuration value is out of range.
    #[error("invalid configuration value: {0}")]
    Invalid(String),
    /// Indicates the security rule set is malformed.
    #[error("invalid security_rules (STRATUS_SECURITY_RULES): {0}")]
    Rules(#[from] RuleParseError),
    /// Indicates the startup script could not be resolved.
    #[error(transparent)]
    UserData(#[from] UserDataError),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
