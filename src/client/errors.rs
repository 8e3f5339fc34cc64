use thiserror::Error;
use uuid::Uuid;

/// Errors from the resource and location services
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The service understood the request and refused it (e.g. quantity overflow)
    #[error("Request rejected: {reason}")]
    Rejected { reason: String },

    /// The service could not be reached; the caller may try again later
    #[error("{service} service unavailable: {reason}")]
    Unavailable { service: &'static str, reason: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    pub fn resource_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "Resource",
            id: id.into(),
        }
    }

    pub fn location_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "Location",
            id: id.into(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    /// Transient failures that should not be treated as a malformed request
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Errors from node communication
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NodeError {
    #[error("Unknown node: {node}")]
    UnknownNode { node: String },

    #[error("Node {node} has no action {action_id}")]
    UnknownAction { node: String, action_id: Uuid },

    #[error("Action {action_id} on node {node} timed out after {timeout_ms}ms")]
    Timeout {
        node: String,
        action_id: Uuid,
        timeout_ms: u64,
    },

    #[error("Failed to dispatch to node {node}: {reason}")]
    DispatchFailed { node: String, reason: String },

    #[error("Node {node} unavailable: {reason}")]
    Unavailable { node: String, reason: String },
}

impl NodeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type for resource and location client calls
pub type ClientResult<T> = Result<T, ClientError>;

/// Result type for node client calls
pub type NodeResult<T> = Result<T, NodeError>;
