//! Core library for the stratus provisioning tool.
//!
//! The crate stands up a small web server on NHN Cloud: a VPC and subnet, an
//! internet gateway on the subnet's routing table, a security group, a compute
//! instance, and a floating IP bound to the instance's port. Each remote call
//! is one [`backend::Backend`] operation; [`provision::ProvisionOrchestrator`]
//! sequences them, waiting on [`poller::ActivationPoller`] for the instance to
//! come up.

pub mod auth;
pub mod backend;
pub mod cancel;
pub mod config;
pub mod flavor;
pub mod model;
pub mod nhn;
pub mod paths;
pub mod poller;
pub mod ports;
pub mod provision;
pub mod test_support;
pub mod user_data;

pub use backend::{ApiError, Backend};
pub use config::{ConfigError, StratusConfig};
pub use nhn::{Endpoints, NhnBackend};
pub use poller::{ActivationPoller, PollOutcome, PollSettings};
pub use provision::{
    ProvisionFailure, ProvisionOrchestrator, ProvisionReport, ProvisionRequest, Step, StepError,
};
