//! State and reducer hooks.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::Hooks;

/// Dispatch handle returned by [`Hooks::use_reducer`].
///
/// The handle is created once per hook slot, so it compares equal across
/// renders and can be used as a dependency.
pub struct Dispatch<A>(Rc<dyn Fn(A)>);

impl<A> Dispatch<A> {
    fn new(f: impl Fn(A) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn dispatch(&self, action: A) {
        (self.0)(action)
    }
}

impl<A> Clone for Dispatch<A> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<A> PartialEq for Dispatch<A> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl<A> fmt::Debug for Dispatch<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dispatch({:p})", Rc::as_ptr(&self.0))
    }
}

/// Action accepted by the setter of [`Hooks::use_state`].
pub enum StateAction<T> {
    Set(T),
    Update(Box<dyn FnOnce(&T) -> T>),
}

/// Setter returned by [`Hooks::use_state`].
pub struct SetState<T>(Dispatch<StateAction<T>>);

impl<T> SetState<T> {
    /// Replace the value.
    pub fn set(&self, value: T) {
        self.0.dispatch(StateAction::Set(value));
    }

    /// Compute the next value from the current one.
    pub fn update(&self, f: impl FnOnce(&T) -> T + 'static) {
        self.0.dispatch(StateAction::Update(Box::new(f)));
    }
}

impl<T> Clone for SetState<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> PartialEq for SetState<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T> fmt::Debug for SetState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SetState").field(&self.0).finish()
    }
}

struct ReducerSlot<S, A> {
    value: Rc<RefCell<S>>,
    dispatch: Dispatch<A>,
}

impl Hooks<'_> {
    /// Reducer-backed state.
    ///
    /// Dispatching computes `reducer(&current, action)`. A result equal to
    /// the current value is dropped; anything else is stored and the node is
    /// scheduled for re-render. The reducer of the first render is kept.
    pub fn use_reducer<S, A, R>(&mut self, reducer: R, init: impl FnOnce() -> S) -> (S, Dispatch<A>)
    where
        S: Clone + PartialEq + 'static,
        A: 'static,
        R: Fn(&S, A) -> S + 'static,
    {
        let owner = self.owner.clone();
        let slot = self.slot(move || {
            let value = Rc::new(RefCell::new(init()));
            let cell = Rc::clone(&value);
            let dispatch = Dispatch::new(move |action: A| {
                let next = reducer(&cell.borrow(), action);
                if *cell.borrow() == next {
                    return;
                }
                *cell.borrow_mut() = next;
                owner.schedule();
            });
            ReducerSlot { value, dispatch }
        });
        (slot.value.borrow().clone(), slot.dispatch.clone())
    }

    /// Local state with a setter.
    pub fn use_state<T>(&mut self, init: impl FnOnce() -> T) -> (T, SetState<T>)
    where
        T: Clone + PartialEq + 'static,
    {
        let (value, dispatch) = self.use_reducer(
            |current: &T, action: StateAction<T>| match action {
                StateAction::Set(value) => value,
                StateAction::Update(f) => f(current),
            },
            init,
        );
        (value, SetState(dispatch))
    }
}
