//! Unit tests for configuration validation and request building.

use std::time::Duration;

use rstest::*;
use stratus::StratusConfig;
use stratus::config::{ConfigError, DEFAULT_SECURITY_RULES};
use stratus::model::PortRange;
use tempfile::TempDir;

#[fixture]
fn valid_config() -> StratusConfig {
    StratusConfig {
        region: String::from("kr1"),
        tenant_id: String::from("f5a1c0de0000000000000000000000aa"),
        api_username: String::from("operator@example.com"),
        api_password: String::from("api-password"),
        token_cache_path: String::from(".stratus-token.json"),
        vpc_name: String::from("web-vpc"),
        vpc_cidr: String::from("10.0.0.0/16"),
        subnet_name: String::from("web-subnet"),
        subnet_cidr: String::from("10.0.1.0/24"),
        gateway_name: None,
        security_group_name: String::from("web-sg"),
        security_group_description: String::from("web and ssh"),
        security_rules: String::from(DEFAULT_SECURITY_RULES),
        instance_name: String::from("web"),
        image_ref: String::from("img-1"),
        key_name: Some(String::from("deploy")),
        fixed_ip: None,
        preferred_flavor: String::from("m2.c1m2"),
        volume_size_gb: 30,
        user_data: None,
        user_data_file: None,
        web_page_file: None,
        poll_interval_secs: 10,
        wait_timeout_secs: 600,
        request_timeout_secs: 30,
    }
}

#[rstest]
#[case::tenant(
    StratusConfig { tenant_id: String::new(), ..valid_config() },
    "STRATUS_TENANT_ID",
    "tenant_id"
)]
#[case::username(
    StratusConfig { api_username: String::from("  "), ..valid_config() },
    "STRATUS_API_USERNAME",
    "api_username"
)]
#[case::password(
    StratusConfig { api_password: String::new(), ..valid_config() },
    "STRATUS_API_PASSWORD",
    "api_password"
)]
#[case::image(
    StratusConfig { image_ref: String::new(), ..valid_config() },
    "STRATUS_IMAGE_REF",
    "image_ref"
)]
fn missing_fields_produce_actionable_errors(
    #[case] config: StratusConfig,
    #[case] env_var: &str,
    #[case] toml_key: &str,
) {
    let error = config.validate().expect_err("field is required");
    let ConfigError::MissingField(ref message) = error else {
        panic!("expected MissingField error, got {error:?}");
    };
    assert!(message.contains(env_var), "error should mention env var: {message}");
    assert!(message.contains(toml_key), "error should mention TOML key: {message}");
    assert!(
        message.contains("stratus.toml"),
        "error should mention config file: {message}"
    );
}

#[rstest]
fn access_checks_ignore_provisioning_fields(valid_config: StratusConfig) {
    let config = StratusConfig {
        image_ref: String::new(),
        ..valid_config
    };
    assert_eq!(config.validate_access(), Ok(()));
}

#[rstest]
#[case::poll(StratusConfig { poll_interval_secs: 0, ..valid_config() }, "STRATUS_POLL_INTERVAL_SECS")]
#[case::wait(StratusConfig { wait_timeout_secs: 0, ..valid_config() }, "STRATUS_WAIT_TIMEOUT_SECS")]
#[case::request(StratusConfig { request_timeout_secs: 0, ..valid_config() }, "STRATUS_REQUEST_TIMEOUT_SECS")]
#[case::volume(StratusConfig { volume_size_gb: 0, ..valid_config() }, "STRATUS_VOLUME_SIZE_GB")]
fn zero_durations_and_sizes_are_invalid(#[case] config: StratusConfig, #[case] env_var: &str) {
    let error = config.validate().expect_err("zero is rejected");
    let ConfigError::Invalid(ref message) = error else {
        panic!("expected Invalid error, got {error:?}");
    };
    assert!(message.contains(env_var), "error should mention env var: {message}");
}

#[rstest]
fn malformed_rules_are_rejected(valid_config: StratusConfig) {
    let config = StratusConfig {
        security_rules: String::from("sideways:tcp:80:0.0.0.0/0"),
        ..valid_config
    };
    let error = config.validate().expect_err("direction is invalid");
    assert!(matches!(error, ConfigError::Rules(_)), "got {error:?}");
}

#[rstest]
fn request_carries_rules_and_default_bootstrap(valid_config: StratusConfig) {
    let request = valid_config
        .provision_request()
        .expect("request should build");

    let ports: Vec<Option<PortRange>> = request
        .security_rules
        .iter()
        .map(|rule| rule.port_range)
        .collect();
    assert_eq!(
        ports,
        vec![Some(PortRange::single(80)), Some(PortRange::single(22))]
    );
    assert!(
        request
            .security_rules
            .iter()
            .all(|rule| rule.description.is_some()),
        "rules: {:?}",
        request.security_rules
    );
    assert_eq!(request.gateway_name(), "web-vpc-igw");
    assert_eq!(request.key_name.as_deref(), Some("deploy"));
    let script = request.user_data.expect("bootstrap script");
    assert!(script.starts_with("#!/bin/bash"), "script: {script}");
    assert!(script.contains("apt-get install -y nginx"), "script: {script}");
}

#[rstest]
fn request_reads_script_file(valid_config: StratusConfig) {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("boot.sh");
    std::fs::write(&path, "#!/bin/sh\necho ready\n").expect("write script");
    let config = StratusConfig {
        user_data_file: Some(path.to_string_lossy().into_owned()),
        ..valid_config
    };

    let request = config.provision_request().expect("request should build");

    assert_eq!(request.user_data.as_deref(), Some("#!/bin/sh\necho ready\n"));
}

#[rstest]
fn conflicting_script_sources_are_rejected(valid_config: StratusConfig) {
    let config = StratusConfig {
        user_data: Some(String::from("#!/bin/sh\n")),
        web_page_file: Some(String::from("index.html")),
        ..valid_config
    };
    let error = config.provision_request().expect_err("sources conflict");
    assert!(matches!(error, ConfigError::UserData(_)), "got {error:?}");
}

#[rstest]
fn blank_optional_values_are_dropped(valid_config: StratusConfig) {
    let config = StratusConfig {
        key_name: Some(String::from("  ")),
        fixed_ip: Some(String::new()),
        ..valid_config
    };
    let request = config.provision_request().expect("request should build");
    assert_eq!(request.key_name, None);
    assert_eq!(request.fixed_ip, None);
}

#[rstest]
fn poll_settings_follow_configured_seconds(valid_config: StratusConfig) {
    let config = StratusConfig {
        poll_interval_secs: 5,
        wait_timeout_secs: 90,
        ..valid_config
    };
    let settings = config.poll_settings();
    assert_eq!(settings.interval, Duration::from_secs(5));
    assert_eq!(settings.timeout, Duration::from_secs(90));
}

#[rstest]
fn region_selects_endpoint_hosts(valid_config: StratusConfig) {
    let config = StratusConfig {
        region: String::from("jp1"),
        ..valid_config
    };
    let endpoints = config.endpoints();
    assert!(endpoints.network.contains("jp1"), "network: {}", endpoints.network);
    assert!(endpoints.instance.contains("jp1"), "instance: {}", endpoints.instance);
}
