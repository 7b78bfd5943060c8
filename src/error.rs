//! Error types for flact.
//!
//! Configuration errors surface synchronously at the call site. Errors raised
//! while a queued task runs are caught by the scheduler and retried.

use thiserror::Error;

use crate::host::HostNode;

/// Errors that can occur while building, rendering or patching a tree.
#[derive(Debug, Error)]
pub enum FlactError {
    /// `render` was called without a container handle
    #[error("app container is missing")]
    MissingContainer,

    /// A ref was written through a field other than `current`
    #[error("property assignment denied: cannot define `{field}` on a ref (allowed: current)")]
    RefAssignment {
        /// The rejected field name
        field: String,
    },

    /// `use_mutable_state` received something that is not a record
    #[error("mutable state must be initialised with a record, found {found}")]
    MutableStateNotRecord {
        /// Kind of the rejected value
        found: &'static str,
    },

    /// A mutable-state cursor pointed at a missing or non-container value
    #[error("mutable state path `{path}` does not resolve to a record or list")]
    MutablePath {
        /// The path that failed to resolve
        path: String,
    },

    /// `set_data` was called on a query that has no data yet
    #[error("query data is not loaded yet, nothing to update")]
    QueryDataMissing,

    /// A component function reported a failure
    #[error("component `{component}` failed to render: {message}")]
    Render {
        /// Component name
        component: &'static str,
        /// Failure description
        message: String,
    },

    /// A task panicked while running
    #[error("task panicked: {message}")]
    TaskPanicked {
        /// Panic payload, if it was a string
        message: String,
    },

    /// The host binding layer rejected an operation
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Errors reported by a [`Host`](crate::host::Host) implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The handle does not belong to this host
    #[error("unknown host node {0:?}")]
    UnknownNode(HostNode),

    /// `child` is not attached under `parent`
    #[error("host node {child:?} is not a child of {parent:?}")]
    NotAChild {
        /// Expected parent
        parent: HostNode,
        /// Offending child
        child: HostNode,
    },

    /// A node cannot receive children (text nodes)
    #[error("host node {0:?} cannot have children")]
    NotAContainer(HostNode),
}

/// Result type alias for engine operations.
pub type FlactResult<T> = Result<T, FlactError>;

/// Result type alias for host binding operations.
pub type HostResult<T> = Result<T, HostError>;

impl FlactError {
    /// Create a render error for a component.
    pub fn render(component: &'static str, message: impl Into<String>) -> Self {
        Self::Render {
            component,
            message: message.into(),
        }
    }

    /// Create a ref assignment error.
    pub fn ref_assignment(field: impl Into<String>) -> Self {
        Self::RefAssignment {
            field: field.into(),
        }
    }

    /// Build a `TaskPanicked` error from a `catch_unwind` payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        Self::TaskPanicked {
            message: panic_message(payload.as_ref()),
        }
    }
}

/// Text of a `catch_unwind` payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
