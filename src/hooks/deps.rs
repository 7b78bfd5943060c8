//! Dependency lists shared by memo and effect hooks.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

/// A value that can take part in a dependency list.
///
/// Implemented for every `PartialEq + 'static` type; values of different
/// types never compare equal.
///
/// Entries compare with `==`, so a shared pointer such as `Rc<T>` compares
/// by the value it points to. Wrap it in [`ByAddress`] to compare by
/// allocation instead.
pub trait Dependency: Any {
    fn dep_eq(&self, other: &dyn Dependency) -> bool;
    fn as_any(&self) -> &dyn Any;
}

impl<T: PartialEq + 'static> Dependency for T {
    fn dep_eq(&self, other: &dyn Dependency) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `Rc` dependency that compares by allocation rather than by value.
///
/// ```
/// use std::rc::Rc;
/// use flact::{ByAddress, deps, is_deps_changed};
///
/// let shared = Rc::new(vec![1, 2]);
/// let same = deps![ByAddress(Rc::clone(&shared))];
/// assert!(!is_deps_changed(Some(&same), &deps![ByAddress(Rc::clone(&shared))]));
/// assert!(is_deps_changed(Some(&same), &deps![ByAddress(Rc::new(vec![1, 2]))]));
/// ```
#[derive(Debug)]
pub struct ByAddress<T: ?Sized>(pub Rc<T>);

impl<T: ?Sized> Clone for ByAddress<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: ?Sized> PartialEq for ByAddress<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: ?Sized> Eq for ByAddress<T> {}

/// Dependency list of a memo or effect hook.
///
/// `None` inside means "no list": the hook recomputes on every render.
pub struct Deps(Option<SmallVec<[Box<dyn Dependency>; 2]>>);

impl Deps {
    /// Recompute on every render.
    pub fn every_render() -> Self {
        Self(None)
    }

    /// Empty static list: compute once per node lifetime. Same as `deps![]`.
    pub fn once() -> Self {
        Self(Some(SmallVec::new()))
    }

    pub fn from_list(list: Vec<Box<dyn Dependency>>) -> Self {
        Self(Some(SmallVec::from_vec(list)))
    }

    /// Number of entries, `None` for [`Deps::every_render`]
    pub fn len(&self) -> Option<usize> {
        self.0.as_ref().map(SmallVec::len)
    }
}

impl fmt::Debug for Deps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.len() {
            Some(n) => write!(f, "Deps({n})"),
            None => f.write_str("Deps(every render)"),
        }
    }
}

/// `true` when `next` differs from `prev`: no previous list, either side has
/// no list, lengths differ, or any positional pair is unequal.
pub fn is_deps_changed(prev: Option<&Deps>, next: &Deps) -> bool {
    let (Some(prev), Some(next)) = (prev.and_then(|d| d.0.as_ref()), next.0.as_ref()) else {
        return true;
    };
    prev.len() != next.len()
        || prev
            .iter()
            .zip(next.iter())
            .any(|(a, b)| !(**a).dep_eq(&**b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_missing_previous_is_changed() {
        assert!(is_deps_changed(None, &crate::deps![1]));
        assert!(is_deps_changed(None, &Deps::once()));
    }

    #[test]
    fn test_length_mismatch_is_changed() {
        assert!(is_deps_changed(Some(&crate::deps![1]), &crate::deps![1, 2]));
        assert!(is_deps_changed(Some(&crate::deps![1, 2]), &crate::deps![1]));
    }

    #[test]
    fn test_elementwise_comparison() {
        assert!(!is_deps_changed(Some(&crate::deps![1, "a"]), &crate::deps![1, "a"]));
        assert!(is_deps_changed(Some(&crate::deps![1, "a"]), &crate::deps![1, "b"]));
        // same value, different type
        assert!(is_deps_changed(Some(&crate::deps![1i32]), &crate::deps![1i64]));
    }

    #[test]
    fn test_static_and_every_render() {
        assert!(!is_deps_changed(Some(&Deps::once()), &crate::deps![]));
        assert!(is_deps_changed(Some(&Deps::every_render()), &Deps::every_render()));
        assert!(is_deps_changed(Some(&Deps::once()), &Deps::every_render()));
    }

    #[test]
    fn test_rc_dependencies_compare_by_value() {
        let a = Rc::new(5);
        assert!(!is_deps_changed(Some(&crate::deps![a.clone()]), &crate::deps![Rc::new(5)]));
    }

    #[test]
    fn test_by_address_compares_allocations() {
        let a = Rc::new(5);
        let prev = crate::deps![ByAddress(Rc::clone(&a))];
        assert!(!is_deps_changed(Some(&prev), &crate::deps![ByAddress(Rc::clone(&a))]));
        assert!(is_deps_changed(Some(&prev), &crate::deps![ByAddress(Rc::new(5))]));
        // wrapped and bare values are different types
        assert!(is_deps_changed(Some(&prev), &crate::deps![a]));
    }
}
