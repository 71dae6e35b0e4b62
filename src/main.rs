//! Binary entry point for the stratus CLI.

use std::io::{self, Write};
use std::process;

use chrono::Utc;
use clap::Parser;
use thiserror::Error;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use stratus::auth::{AuthError, IdentityClient, TokenCache, TokenProvider};
use stratus::backend::{ApiError, Backend};
use stratus::cancel::Cancellation;
use stratus::config::{ConfigError, StratusConfig};
use stratus::nhn::NhnBackend;
use stratus::provision::{ProvisionFailure, ProvisionOrchestrator, ProvisionReport};

mod cli;

use cli::{Cli, ImagesCommand, ProvisionCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
    #[error("api error: {0}")]
    Api(#[from] ApiError),
    #[error("provisioning failed: {0}")]
    Provision(Box<ProvisionFailure>),
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let mut config = StratusConfig::load_without_cli_args()?;
    match cli {
        Cli::Provision(args) => {
            apply_overrides(&mut config, args);
            provision(&config).await
        }
        Cli::Flavors => {
            let backend = connect(&config).await?;
            let mut flavors = backend.list_flavors().await?;
            flavors.sort_by(|left, right| left.name.cmp(&right.name));
            let rows = flavors
                .iter()
                .map(|flavor| (flavor.name.as_str(), flavor.id.as_str()));
            write_rows(io::stdout(), rows);
            Ok(())
        }
        Cli::Keypairs => {
            let backend = connect(&config).await?;
            let key_pairs = backend.list_key_pairs().await?;
            let rows = key_pairs
                .iter()
                .map(|pair| (pair.name.as_str(), pair.fingerprint.as_str()));
            write_rows(io::stdout(), rows);
            Ok(())
        }
        Cli::Images(ImagesCommand { name }) => {
            let backend = connect(&config).await?;
            let images = backend.list_images().await?;
            let needle = name.map(|text| text.to_lowercase());
            let rows = images
                .iter()
                .filter(|image| {
                    needle
                        .as_deref()
                        .is_none_or(|filter| image.name.to_lowercase().contains(filter))
                })
                .map(|image| (image.name.as_str(), image.id.as_str()));
            write_rows(io::stdout(), rows);
            Ok(())
        }
    }
}

fn apply_overrides(config: &mut StratusConfig, args: ProvisionCommand) {
    let ProvisionCommand {
        region,
        flavor,
        image,
        user_data,
        user_data_file,
        poll_interval,
        wait_timeout,
    } = args;
    if let Some(value) = region {
        config.region = value;
    }
    if let Some(value) = flavor {
        config.preferred_flavor = value;
    }
    if let Some(value) = image {
        config.image_ref = value;
    }
    if user_data.is_some() || user_data_file.is_some() {
        config.user_data = user_data;
        config.user_data_file = user_data_file;
        config.web_page_file = None;
    }
    if let Some(value) = poll_interval {
        config.poll_interval_secs = value;
    }
    if let Some(value) = wait_timeout {
        config.wait_timeout_secs = value;
    }
}

async fn connect(config: &StratusConfig) -> Result<NhnBackend, CliError> {
    config.validate_access()?;
    let provider = TokenProvider::new(
        IdentityClient::new(config.request_timeout())?,
        TokenCache::new(config.token_cache_path()),
    );
    let token = provider.token(&config.credentials(), Utc::now()).await?;
    NhnBackend::new(
        config.endpoints(),
        config.tenant_id.trim(),
        token,
        config.request_timeout(),
    )
    .map_err(CliError::from)
}

async fn provision(config: &StratusConfig) -> Result<(), CliError> {
    let request = config.provision_request()?;
    let backend = connect(config).await?;

    let (handle, cancellation) = Cancellation::new();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling provisioning");
            handle.cancel();
        }
    });

    let orchestrator = ProvisionOrchestrator::new(backend)
        .with_poll_settings(config.poll_settings())
        .with_cancellation(cancellation);
    let result = orchestrator.run(&request).await;
    interrupt.abort();

    match result {
        Ok(report) => {
            write_report(io::stdout(), &report);
            Ok(())
        }
        Err(failure) => {
            write_failure(io::stderr(), &failure);
            Err(CliError::Provision(Box::new(failure)))
        }
    }
}

fn write_rows<'a>(mut target: impl Write, rows: impl Iterator<Item = (&'a str, &'a str)>) {
    for (name, id) in rows {
        writeln!(target, "{name}\t{id}").ok();
    }
}

fn write_report(mut target: impl Write, report: &ProvisionReport) {
    writeln!(target, "instance {} ({})", report.instance_id, report.flavor.name).ok();
    for failure in &report.resources.rule_failures {
        writeln!(target, "rule not created: {}: {}", failure.rule, failure.error).ok();
    }
    writeln!(target, "web server address: {}", report.url()).ok();
    writeln!(
        target,
        "the page is served once the startup script finishes installing nginx"
    )
    .ok();
}

fn write_failure(mut target: impl Write, failure: &ProvisionFailure) {
    let created = failure.created.created_resources();
    if created.is_empty() {
        return;
    }
    writeln!(target, "resources left in place:").ok();
    for (kind, id) in created {
        writeln!(target, "  {kind}: {id}").ok();
    }
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
