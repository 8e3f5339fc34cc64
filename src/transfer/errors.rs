use thiserror::Error;

use crate::client::ClientError;

/// Errors from transfer graph construction and path planning
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransferError {
    /// No route exists, or an endpoint is unknown or excluded from transfers
    #[error("No transfer path found from {from} to {to}: {reason}")]
    NoTransferPathFound {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Transfer template {node}/{action} has invalid cost weight {weight}")]
    InvalidWeight {
        node: String,
        action: String,
        weight: f64,
    },

    #[error("Failed to load transfer definitions: {0}")]
    Client(#[from] ClientError),
}

impl TransferError {
    pub fn no_path(
        from: impl Into<String>,
        to: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::NoTransferPathFound {
            from: from.into(),
            to: to.into(),
            reason: reason.into(),
        }
    }

    pub fn is_no_path(&self) -> bool {
        matches!(self, Self::NoTransferPathFound { .. })
    }
}

pub type TransferResult<T> = Result<T, TransferError>;
