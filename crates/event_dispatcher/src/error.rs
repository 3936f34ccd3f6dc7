//! Error types for the event dispatcher

use crate::node::NodeId;

/// Errors surfaced by dispatcher operations and listener callbacks.
///
/// Listener failures are not isolated: the first error returned by a
/// listener aborts the rest of the publish pass and is handed back to the
/// caller of [`crate::Dispatcher::publish`] as-is.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// A forward edge was requested towards a dispatcher that is not alive in this hub
    #[error("Invalid forward target: {target}")]
    InvalidForwardTarget { target: NodeId },

    /// The dispatcher behind a handle has been removed from its hub
    #[error("Dispatcher not found: {0}")]
    NodeNotFound(NodeId),

    /// The global dispatcher lives as long as its hub
    #[error("The global dispatcher cannot be removed")]
    CannotRemoveGlobal,

    /// A listener table registered under a category holds a different listener type
    #[error("Listener table for category {category} has an unexpected type")]
    CategoryMismatch { category: &'static str },

    /// Hub configuration could not be parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Handler execution failed
    #[error("Handler execution failed: {0}")]
    HandlerExecutionFailed(String),

    /// Any other error raised by a listener
    #[error(transparent)]
    Custom(#[from] Box<dyn std::error::Error + 'static>),
}

impl From<String> for EventError {
    fn from(message: String) -> Self {
        EventError::HandlerExecutionFailed(message)
    }
}

impl From<&str> for EventError {
    fn from(message: &str) -> Self {
        EventError::HandlerExecutionFailed(message.to_string())
    }
}
