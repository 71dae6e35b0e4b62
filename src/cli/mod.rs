//! Command-line interface definitions for the `stratus` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `stratus` binary.
#[derive(Debug, Parser)]
#[command(
    name = "stratus",
    about = "Provision a web server in a fresh VPC on NHN Cloud",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Create the network, security group, instance, and public address.
    #[command(
        name = "provision",
        about = "Create the network, security group, instance, and public address"
    )]
    Provision(ProvisionCommand),
    /// List the flavors available to the tenant.
    #[command(name = "flavors", about = "List the flavors available to the tenant")]
    Flavors,
    /// List the key pairs registered for the tenant.
    #[command(name = "keypairs", about = "List the key pairs registered for the tenant")]
    Keypairs,
    /// List boot images.
    #[command(name = "images", about = "List boot images")]
    Images(ImagesCommand),
}

/// Arguments for the `stratus provision` subcommand.
#[derive(Debug, Default, Parser)]
pub(crate) struct ProvisionCommand {
    /// Override the region code (for example `kr1`).
    #[arg(long, value_name = "REGION")]
    pub(crate) region: Option<String>,
    /// Override the preferred flavor name.
    ///
    /// When no flavor has this exact name, the flavor whose name sorts first
    /// is used instead.
    #[arg(long, value_name = "NAME")]
    pub(crate) flavor: Option<String>,
    /// Override the boot image ID.
    #[arg(long, value_name = "IMAGE_ID")]
    pub(crate) image: Option<String>,
    /// Provide the startup script inline.
    #[arg(long, value_name = "SCRIPT", conflicts_with = "user_data_file")]
    pub(crate) user_data: Option<String>,
    /// Provide the startup script from a local file.
    #[arg(long, value_name = "PATH", conflicts_with = "user_data")]
    pub(crate) user_data_file: Option<String>,
    /// Seconds between activation polls.
    #[arg(long, value_name = "SECS")]
    pub(crate) poll_interval: Option<u64>,
    /// Seconds to wait for the instance to become active.
    #[arg(long, value_name = "SECS")]
    pub(crate) wait_timeout: Option<u64>,
}

/// Arguments for the `stratus images` subcommand.
#[derive(Debug, Default, Parser)]
pub(crate) struct ImagesCommand {
    /// Only list images whose name contains this text (case-insensitive).
    #[arg(long, value_name = "FILTER")]
    pub(crate) name: Option<String>,
}
