pub mod context;
pub mod hooks;
pub mod repository;

pub use context::RequestContext;
pub use repository::{Reservation, SeatLedger};

/// Every error the allocation core can hand back to its caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Seats already held: {contested_seats:?}")]
    SeatConflict { contested_seats: Vec<u32> },

    #[error("Capacity exceeded: requested {requested}, capacity {capacity}")]
    CapacityExceeded { requested: u32, capacity: u32 },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Ledger backend failure. The outcome of the operation is unknown;
    /// re-query occupancy before retrying.
    #[error("Seat ledger unavailable: {0}")]
    StorageError(String),
}

impl CoreError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound { kind, id: id.to_string() }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::ValidationError(msg.into())
    }

    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Stable machine-readable code for API bodies and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::ValidationError(_) => "VALIDATION_ERROR",
            CoreError::NotFound { .. } => "NOT_FOUND",
            CoreError::SeatConflict { .. } => "SEAT_CONFLICT",
            CoreError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            CoreError::InvalidTransition { .. } => "INVALID_TRANSITION",
            CoreError::StorageError(_) => "STORAGE_ERROR",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
