//! Failures raised by pipeline steps and by the pipeline as a whole.

use std::time::Duration;

use thiserror::Error;

use super::context::ProvisionContext;
use super::step::Step;
use crate::backend::ApiError;
use crate::model::{InstanceId, InstanceStatus};

/// Reasons a single step can fail.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum StepError {
    /// A resource operation failed.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// The instance entered `ERROR` while activating.
    #[error("instance {instance_id} failed to activate: {reason}")]
    InstanceErrored {
        /// Instance that failed.
        instance_id: InstanceId,
        /// Provider fault message or generic description.
        reason: String,
    },
    /// The instance was still not active when the wait deadline passed.
    #[error(
        "instance {instance_id} not active after {}s{}{}",
        .waited.as_secs(),
        last_status_note(.last_status.as_ref()),
        last_error_note(.last_error.as_deref())
    )]
    ActivationTimedOut {
        /// Instance being waited for.
        instance_id: InstanceId,
        /// Time spent waiting.
        waited: Duration,
        /// Last status observed.
        last_status: Option<InstanceStatus>,
        /// Most recent failed status poll, if any.
        last_error: Option<Box<ApiError>>,
    },
    /// The run was cancelled.
    #[error("provisioning was cancelled")]
    Cancelled,
    /// A step ran before the handle it depends on was recorded.
    #[error("required {0} is not available")]
    MissingHandle(&'static str),
}

fn last_status_note(status: Option<&InstanceStatus>) -> String {
    status.map_or_else(String::new, |value| format!(" (last status {value})"))
}

fn last_error_note(error: Option<&ApiError>) -> String {
    error.map_or_else(String::new, |value| format!("; last poll error: {value}"))
}

/// Pipeline failure naming the step that did not complete.
///
/// `created` holds every handle recorded before the failure. Nothing is rolled
/// back, so these resources remain on the provider.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{step} failed: {cause}")]
pub struct ProvisionFailure {
    /// Step that failed.
    pub step: Step,
    /// Why it failed.
    pub cause: StepError,
    /// Resources created before the failure.
    pub created: Box<ProvisionContext>,
}
