//! Effect and layout-effect hooks.
//!
//! A render queues every effect whose dependencies changed. Layout effects
//! run synchronously while the reconciler climbs back up past the node;
//! passive effects run later in their own scheduler task.

use std::cell::RefCell;
use std::rc::Rc;

use super::{Deps, Hooks, is_deps_changed};

type Cleanup = Box<dyn FnOnce()>;

/// Shared effect slot; the node's hook list and pending effect tasks both hold it.
pub(crate) type EffectHandle = Rc<RefCell<EffectSlot>>;

pub(crate) struct EffectSlot {
    deps: Option<Deps>,
    body: Option<Box<dyn FnOnce() -> Option<Cleanup>>>,
    cleanup: Option<Cleanup>,
    alive: bool,
}

impl EffectSlot {
    fn new() -> Self {
        Self {
            deps: None,
            body: None,
            cleanup: None,
            alive: true,
        }
    }
}

/// Return value of an effect body: `()` or a cleanup closure.
pub trait TearDown {
    fn into_cleanup(self) -> Option<Box<dyn FnOnce()>>;
}

impl TearDown for () {
    fn into_cleanup(self) -> Option<Box<dyn FnOnce()>> {
        None
    }
}

impl<F: FnOnce() + 'static> TearDown for F {
    fn into_cleanup(self) -> Option<Box<dyn FnOnce()>> {
        Some(Box::new(self))
    }
}

/// Run queued effects: every pending cleanup first, then every body.
pub(crate) fn run_effects(effects: &[EffectHandle]) {
    let mut bodies = Vec::with_capacity(effects.len());
    for handle in effects {
        let (cleanup, body) = {
            let mut slot = handle.borrow_mut();
            if !slot.alive || slot.body.is_none() {
                continue;
            }
            (slot.cleanup.take(), slot.body.take())
        };
        if let Some(cleanup) = cleanup {
            cleanup();
        }
        bodies.push((handle, body));
    }
    for (handle, body) in bodies {
        if let Some(body) = body {
            let cleanup = body();
            handle.borrow_mut().cleanup = cleanup;
        }
    }
}

/// Disarm a slot and run its cleanup, if the effect ever ran.
pub(crate) fn teardown(handle: &EffectHandle) {
    let cleanup = {
        let mut slot = handle.borrow_mut();
        slot.alive = false;
        slot.body = None;
        slot.cleanup.take()
    };
    if let Some(cleanup) = cleanup {
        cleanup();
    }
}

impl Hooks<'_> {
    /// Deferred effect, run in a follow-up task after the render commits.
    pub fn use_effect<R, F>(&mut self, deps: Deps, effect: F)
    where
        R: TearDown,
        F: FnOnce() -> R + 'static,
    {
        self.effect_impl(false, deps, effect);
    }

    /// Effect run synchronously during the reconciler's upward walk.
    pub fn use_layout_effect<R, F>(&mut self, deps: Deps, effect: F)
    where
        R: TearDown,
        F: FnOnce() -> R + 'static,
    {
        self.effect_impl(true, deps, effect);
    }

    fn effect_impl<R, F>(&mut self, layout: bool, deps: Deps, effect: F)
    where
        R: TearDown,
        F: FnOnce() -> R + 'static,
    {
        let handle = Rc::clone(self.slot(|| Rc::new(RefCell::new(EffectSlot::new()))));
        {
            let mut slot = handle.borrow_mut();
            if !is_deps_changed(slot.deps.as_ref(), &deps) {
                return;
            }
            slot.deps = Some(deps);
            slot.body = Some(Box::new(move || effect().into_cleanup()));
        }
        self.queue_effect(layout, handle);
    }
}
