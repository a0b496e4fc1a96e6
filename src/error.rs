use thiserror::Error;
use uuid::Uuid;

/// Error taxonomy for the dispatch engine.
///
/// `Conflict`, `AlreadyAssigned`, `NoAvailableDriver` and `NoAvailableVehicle`
/// are safe to retry with fresh data because assignment re-validates conflicts
/// immediately before commit. `Validation` and `Unauthorized` must never be
/// retried without the caller fixing the request.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("delivery {0} is not pending")]
    AlreadyAssigned(Uuid),

    #[error("no driver available for the scheduled window")]
    NoAvailableDriver,

    #[error("no vehicle available for the scheduled window")]
    NoAvailableVehicle,

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    pub fn not_found(kind: &str, id: Uuid) -> Self {
        Self::NotFound(format!("{kind} {id}"))
    }
}
