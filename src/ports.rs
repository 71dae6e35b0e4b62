//! Finds the network port bound to an activated instance.

use crate::backend::{ApiError, Backend};
use crate::model::{InstanceId, Port, PortId};

/// Picks the first port in provider order.
///
/// # Errors
///
/// Returns [`ApiError::NotFound`] when `ports` is empty.
pub fn select_port(ports: &[Port], instance_id: &InstanceId) -> Result<PortId, ApiError> {
    ports
        .first()
        .map(|port| port.id.clone())
        .ok_or_else(|| ApiError::not_found(format!("port for instance {instance_id}")))
}

/// Lists ports owned by `instance_id` and selects the first.
///
/// # Errors
///
/// Propagates the lookup failure, or returns [`ApiError::NotFound`] when the
/// instance has no port.
pub async fn resolve_port<B: Backend + ?Sized>(
    backend: &B,
    instance_id: &InstanceId,
) -> Result<PortId, ApiError> {
    let ports = backend.list_ports(instance_id).await?;
    select_port(&ports, instance_id)
}
