//! flact - Fiber-style UI reconciliation engine
//!
//! ## Core Concepts
//!
//! **View descriptions** ([`VNode`]) are cheap, immutable values produced on
//! every render. **Work nodes** persist across renders in an arena and own
//! the live host handles and hook storage. A time-sliced **reconciler** walks
//! dirty subtrees, diffs children by identity key and leaves patches that the
//! **commit** phase applies to the [`Host`] in one go.
//!
//! ## Modules
//! - `vnode`: view descriptions, `h`, `fragment`, `Component`
//! - `props`: property bags, styles, listeners, refs
//! - `node`: work node arena and patches
//! - `algo`: keyed list diff
//! - `host`: host binding trait, property update rule, in-memory host
//! - `reconcile` / `commit`: the tree walker and the patch phase
//! - `scheduler` / `platform`: task queue, time slices, turn requests
//! - `hooks`: state, reducer, memo, callback, ref, effects, mutable state, query
//! - `runtime`: the engine context tying it together
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use flact::prelude::*;
//!
//! let counter = Component::new("Counter", |hooks, _props| {
//!     let (count, set_count) = hooks.use_state(|| 0);
//!     let label = if count == 0 { "click me".to_string() } else { count.to_string() };
//!     h(
//!         "button",
//!         Props::new().on("click", move |_| set_count.update(|c| c + 1)),
//!         label,
//!     )
//! });
//!
//! let platform = Arc::new(ManualPlatform::new());
//! let runtime = Runtime::new(MemoryHost::new(), platform);
//! let app = runtime.with_host_mut(|host| host.create_element("div", Namespace::Html)).unwrap();
//!
//! runtime.render(h(counter, Props::new(), ()), Some(app)).unwrap();
//! runtime.run_until_idle();
//! assert_eq!(runtime.with_host(|host| host.text_content(app)), "click me");
//!
//! let button = runtime.with_host(|host| host.find_by_tag(app, "button")).unwrap();
//! runtime.with_host(|host| host.dispatch_event(button, &Event::new("click")));
//! runtime.run_until_idle();
//! assert_eq!(runtime.with_host(|host| host.text_content(app)), "1");
//! ```

extern crate self as flact;

#[macro_use]
mod macros;

// =============================================================================
// Modules
// =============================================================================

/// Algorithms: keyed diff
pub mod algo;

/// Commit phase and teardown
mod commit;

/// Error types
pub mod error;

/// Hook runtime
pub mod hooks;

/// Host binding layer
pub mod host;

/// Work node arena
pub mod node;

/// Clock and turn requests
pub mod platform;

/// Prelude for common imports
pub mod prelude;

/// Property bags
pub mod props;

/// Iterative tree walker
pub mod reconcile;

/// Engine context
pub mod runtime;

/// Task queue
pub mod scheduler;

/// View descriptions
pub mod vnode;

// =============================================================================
// Re-exports
// =============================================================================

// View descriptions
pub use vnode::{Child, Component, IntoRender, NODE_VALUE, VNode, VNodeKind, fragment, h, text};

// Properties
pub use props::{Event, Listener, PropValue, Props, RefObject, RefTarget, Style};

// Hooks
pub use hooks::{
    ByAddress, Dependency, Deps, Dispatch, HookList, Hooks, MutableState, PathSeg, SetState,
    StateAction, TearDown, Value, is_deps_changed,
};

#[cfg(feature = "async")]
pub use hooks::{Query, QueryError, QueryOptions, QueryState};

// Engine
pub use node::{NodeId, NodeKind, Patch, PatchFlags, Tree, WorkNode};
pub use platform::{Channel, ManualPlatform, Platform};
pub use runtime::{Runtime, RuntimeConfig, TurnReport};
pub use scheduler::{Priority, SchedulerConfig, Step, TaskId};

// Host
pub use host::{Host, HostNode, HostStats, MemoryHost, Namespace};

// Error types
pub use error::{FlactError, FlactResult, HostError, HostResult};

// Proc macros
#[cfg(feature = "macros")]
pub use flact_macros::component;
