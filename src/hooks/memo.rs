//! Memo, callback and ref hooks.

use std::rc::Rc;

use super::{Deps, Hooks, is_deps_changed};
use crate::props::RefObject;

struct MemoSlot<T> {
    value: T,
    deps: Deps,
}

impl Hooks<'_> {
    /// Cached value, recomputed only when `deps` changed.
    pub fn use_memo<T: Clone + 'static>(&mut self, deps: Deps, compute: impl FnOnce() -> T) -> T {
        let slot = self.slot::<Option<MemoSlot<T>>>(|| None);
        if let Some(memo) = slot
            .as_ref()
            .filter(|memo| !is_deps_changed(Some(&memo.deps), &deps))
        {
            return memo.value.clone();
        }
        let value = compute();
        *slot = Some(MemoSlot {
            value: value.clone(),
            deps,
        });
        value
    }

    /// Memo specialised to functions; the same `Rc` is returned while `deps` hold.
    pub fn use_callback<F: 'static>(&mut self, deps: Deps, f: F) -> Rc<F> {
        self.use_memo(deps, move || Rc::new(f))
    }

    /// Mutable cell that survives re-renders. Writing it never re-renders.
    pub fn use_ref<T: 'static>(&mut self, init: impl FnOnce() -> T) -> RefObject<T> {
        self.slot(|| RefObject::new(init())).clone()
    }
}
