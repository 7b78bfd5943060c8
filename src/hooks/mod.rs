//! Hook runtime.
//!
//! Each component node owns a [`HookList`]: one slot per hook call, in call
//! order. During a render the reconciler lends the list to a [`Hooks`] cursor
//! that starts at slot zero, so hook order and count must be the same on
//! every render of a component instance.
//!
//! | Hook | Module |
//! |------|--------|
//! | `use_state`, `use_reducer` | `state` |
//! | `use_memo`, `use_callback`, `use_ref` | `memo` |
//! | `use_effect`, `use_layout_effect` | `effect` |
//! | `use_mutable_state` | `mutable` |
//! | `use_query` (feature `async`) | `query` |

mod deps;
mod effect;
mod memo;
mod mutable;
#[cfg(feature = "async")]
mod query;
mod state;

pub use deps::{ByAddress, Dependency, Deps, is_deps_changed};
pub use effect::TearDown;
pub use mutable::{MutableState, PathSeg, Value};
#[cfg(feature = "async")]
pub use query::{Query, QueryError, QueryOptions, QueryState};
pub use state::{Dispatch, SetState, StateAction};

pub(crate) use effect::{EffectHandle, run_effects};

use std::any::{Any, type_name};
use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use tracing::warn;

use crate::node::NodeId;
use crate::platform::Platform;

// =============================================================================
// Engine seam
// =============================================================================

/// What hooks need from the engine that owns their node.
pub(crate) trait UpdateQueue {
    /// Enqueue a re-render of `node`.
    fn request_render(&self, node: NodeId);

    fn platform(&self) -> Arc<dyn Platform>;

    /// Run a future on the engine's local executor.
    #[cfg(feature = "async")]
    fn spawn_local(&self, future: futures_util::future::LocalBoxFuture<'static, ()>);
}

/// The node a hook belongs to, captured by dispatch closures.
#[derive(Clone)]
pub(crate) struct HookOwner {
    pub(crate) node: NodeId,
    pub(crate) dirty: Rc<Cell<bool>>,
    pub(crate) queue: Weak<dyn UpdateQueue>,
}

impl HookOwner {
    /// Mark the node dirty and enqueue a re-render, unless one is already pending.
    pub(crate) fn schedule(&self) {
        if self.dirty.get() {
            return;
        }
        self.dirty.set(true);
        if let Some(queue) = self.queue.upgrade() {
            queue.request_render(self.node);
        }
    }
}

// =============================================================================
// HookList
// =============================================================================

/// Ordered hook storage of one component node.
#[derive(Default)]
pub struct HookList {
    slots: Vec<Box<dyn Any>>,
    layout: Vec<EffectHandle>,
    passive: Vec<EffectHandle>,
}

impl HookList {
    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Effects queued by the last render: `(layout, passive)`.
    pub(crate) fn take_pending(&mut self) -> (Vec<EffectHandle>, Vec<EffectHandle>) {
        (
            std::mem::take(&mut self.layout),
            std::mem::take(&mut self.passive),
        )
    }

    /// Run every effect cleanup once, in declaration order, and disarm the slots.
    pub(crate) fn teardown(&mut self) {
        self.layout.clear();
        self.passive.clear();
        for slot in &self.slots {
            if let Some(handle) = slot.downcast_ref::<EffectHandle>() {
                effect::teardown(handle);
            }
        }
    }
}

impl fmt::Debug for HookList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookList")
            .field("slots", &self.slots.len())
            .field("layout", &self.layout.len())
            .field("passive", &self.passive.len())
            .finish()
    }
}

// =============================================================================
// Hooks
// =============================================================================

/// Hook cursor handed to a component for the duration of one render.
pub struct Hooks<'a> {
    list: &'a mut HookList,
    cursor: usize,
    owner: HookOwner,
}

impl<'a> Hooks<'a> {
    pub(crate) fn new(list: &'a mut HookList, owner: HookOwner) -> Self {
        Self {
            list,
            cursor: 0,
            owner,
        }
    }

    /// Number of hooks called so far in this render
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Next slot, initialized with `init` on first use.
    ///
    /// A slot holding a different type (hook order changed between renders)
    /// is reinitialized.
    fn slot<T: 'static>(&mut self, init: impl FnOnce() -> T) -> &mut T {
        let index = self.cursor;
        self.cursor += 1;

        let slots = &mut self.list.slots;
        match slots.get(index) {
            Some(slot) if slot.is::<T>() => {}
            Some(_) => {
                warn!(
                    node = ?self.owner.node,
                    index,
                    expected = type_name::<T>(),
                    "hook slot type changed between renders, reinitializing"
                );
                slots[index] = Box::new(init());
            }
            None => slots.push(Box::new(init())),
        }
        slots[index]
            .downcast_mut::<T>()
            .expect("hook slot type checked above")
    }

    fn queue_effect(&mut self, layout: bool, handle: EffectHandle) {
        if layout {
            self.list.layout.push(handle);
        } else {
            self.list.passive.push(handle);
        }
    }

    #[cfg(feature = "async")]
    pub(crate) fn owner(&self) -> &HookOwner {
        &self.owner
    }
}
