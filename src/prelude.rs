//! Prelude module for common imports.
//!
//! ```
//! use flact::prelude::*;
//! ```

// View descriptions
pub use crate::vnode::{Child, Component, VNode, fragment, h, text};

// Properties
pub use crate::props::{Event, Listener, PropValue, Props, RefObject, RefTarget, Style};

// Hooks
pub use crate::hooks::{
    ByAddress, Deps, Dispatch, Hooks, MutableState, SetState, Value, is_deps_changed,
};

#[cfg(feature = "async")]
pub use crate::hooks::{Query, QueryError, QueryOptions};

// Engine
pub use crate::platform::{Channel, ManualPlatform, Platform};
pub use crate::runtime::{Runtime, RuntimeConfig};
pub use crate::scheduler::{Priority, SchedulerConfig, Step};

// Host
pub use crate::host::{Host, HostNode, MemoryHost, Namespace};

// Error
pub use crate::error::{FlactError, FlactResult};

// Macros
pub use crate::{children, deps};

#[cfg(feature = "macros")]
pub use crate::component;
