//! Deep-mutable state.
//!
//! [`Hooks::use_mutable_state`] keeps a dynamic [`Value`] record and hands out
//! [`MutableState`] cursors. Writing through a cursor compares the new value
//! with the old one by deep equality; only a real change schedules a
//! re-render of the owning node.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::rc::Rc;

use compact_str::CompactString;

use super::{HookOwner, Hooks};
use crate::error::{FlactError, FlactResult};

// =============================================================================
// Value
// =============================================================================

/// Dynamically shaped, deeply comparable value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(CompactString),
    List(Vec<Value>),
    Record(BTreeMap<CompactString, Value>),
}

impl Value {
    impl_value_accessors!(
        Bool => bool,
        Number => f64,
        Text => CompactString,
        List => Vec<Value>,
        Record => BTreeMap<CompactString, Value>,
    );

    /// Build a record from `(key, value)` pairs.
    pub fn record<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<CompactString>,
        V: Into<Value>,
    {
        Self::Record(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Field of a record
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_record()?.get(key)
    }

    /// Element of a list
    pub fn at(&self, index: usize) -> Option<&Value> {
        self.as_list()?.get(index)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::List(_) => "list",
            Self::Record(_) => "record",
        }
    }

    fn resolve(&self, path: &[PathSeg]) -> Option<&Value> {
        path.iter().try_fold(self, |value, seg| match seg {
            PathSeg::Key(k) => value.get(k),
            PathSeg::Index(i) => value.at(*i),
        })
    }

    fn resolve_mut(&mut self, path: &[PathSeg]) -> Option<&mut Value> {
        path.iter().try_fold(self, |value, seg| match (value, seg) {
            (Self::Record(map), PathSeg::Key(k)) => map.get_mut(k.as_str()),
            (Self::List(list), PathSeg::Index(i)) => list.get_mut(*i),
            _ => None,
        })
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(list: Vec<Value>) -> Self {
        Self::List(list)
    }
}

impl From<BTreeMap<CompactString, Value>> for Value {
    fn from(map: BTreeMap<CompactString, Value>) -> Self {
        Self::Record(map)
    }
}

/// One step of a cursor path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSeg {
    Key(CompactString),
    Index(usize),
}

// =============================================================================
// MutableState
// =============================================================================

/// Cursor into the state of [`Hooks::use_mutable_state`].
#[derive(Clone)]
pub struct MutableState {
    root: Rc<RefCell<Value>>,
    owner: HookOwner,
    path: Vec<PathSeg>,
}

impl MutableState {
    /// Cursor to a record field
    pub fn field(&self, key: impl Into<CompactString>) -> Self {
        self.descend(PathSeg::Key(key.into()))
    }

    /// Cursor to a list element
    pub fn index(&self, index: usize) -> Self {
        self.descend(PathSeg::Index(index))
    }

    fn descend(&self, seg: PathSeg) -> Self {
        let mut path = self.path.clone();
        path.push(seg);
        Self {
            root: Rc::clone(&self.root),
            owner: self.owner.clone(),
            path,
        }
    }

    /// Snapshot of the value under the cursor.
    pub fn get(&self) -> Option<Value> {
        self.root.borrow().resolve(&self.path).cloned()
    }

    /// Read the value under the cursor in place.
    pub fn with<R>(&self, f: impl FnOnce(Option<&Value>) -> R) -> R {
        f(self.root.borrow().resolve(&self.path))
    }

    /// Write the value under the cursor.
    ///
    /// The parent must be a record (any key) or a list (existing index, or
    /// `len` to append). The root itself only accepts records.
    pub fn set(&self, value: impl Into<Value>) -> FlactResult<()> {
        let value = value.into();
        let Some((last, parent)) = self.path.split_last() else {
            if !value.is_record() {
                return Err(FlactError::MutableStateNotRecord {
                    found: value.kind_name(),
                });
            }
            let changed = *self.root.borrow() != value;
            if changed {
                *self.root.borrow_mut() = value;
                self.owner.schedule();
            }
            return Ok(());
        };

        let changed = {
            let mut root = self.root.borrow_mut();
            let container = root
                .resolve_mut(parent)
                .ok_or_else(|| self.path_error())?;
            match (container, last) {
                (Value::Record(map), PathSeg::Key(k)) => {
                    if map.get(k.as_str()) == Some(&value) {
                        false
                    } else {
                        map.insert(k.clone(), value);
                        true
                    }
                }
                (Value::List(list), PathSeg::Index(i)) if *i < list.len() => {
                    if list[*i] == value {
                        false
                    } else {
                        list[*i] = value;
                        true
                    }
                }
                (Value::List(list), PathSeg::Index(i)) if *i == list.len() => {
                    list.push(value);
                    true
                }
                _ => return Err(self.path_error()),
            }
        };
        if changed {
            self.owner.schedule();
        }
        Ok(())
    }

    /// Append to the list under the cursor.
    pub fn push(&self, value: impl Into<Value>) -> FlactResult<()> {
        let len = self
            .with(|v| v.and_then(Value::as_list).map(Vec::len))
            .ok_or_else(|| self.path_error())?;
        self.index(len).set(value)
    }

    /// Remove a field from the record under the cursor.
    pub fn remove(&self, key: &str) -> FlactResult<Option<Value>> {
        let removed = {
            let mut root = self.root.borrow_mut();
            match root.resolve_mut(&self.path) {
                Some(Value::Record(map)) => map.remove(key),
                _ => return Err(self.path_error()),
            }
        };
        if removed.is_some() {
            self.owner.schedule();
        }
        Ok(removed)
    }

    /// Mutate the value under the cursor in place.
    pub fn update(&self, f: impl FnOnce(&mut Value)) -> FlactResult<()> {
        let mut next = self.get().ok_or_else(|| self.path_error())?;
        f(&mut next);
        self.set(next)
    }

    fn path_error(&self) -> FlactError {
        let mut path = String::from("$");
        for seg in &self.path {
            let _ = match seg {
                PathSeg::Key(k) => write!(path, ".{k}"),
                PathSeg::Index(i) => write!(path, "[{i}]"),
            };
        }
        FlactError::MutablePath { path }
    }
}

impl fmt::Debug for MutableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutableState")
            .field("path", &self.path)
            .field("value", &self.get())
            .finish()
    }
}

impl Hooks<'_> {
    /// Record state mutated in place through [`MutableState`] cursors.
    ///
    /// Fails with [`FlactError::MutableStateNotRecord`] when the initial value
    /// is not a record.
    pub fn use_mutable_state(&mut self, init: impl FnOnce() -> Value) -> FlactResult<MutableState> {
        let owner = self.owner.clone();
        let root = Rc::clone(self.slot(|| Rc::new(RefCell::new(init()))));
        let found = {
            let value = root.borrow();
            (!value.is_record()).then(|| value.kind_name())
        };
        if let Some(found) = found {
            return Err(FlactError::MutableStateNotRecord { found });
        }
        Ok(MutableState {
            root,
            owner,
            path: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_paths() {
        let v = Value::record([
            ("name", Value::from("x")),
            ("tags", Value::from(vec![Value::from("a"), Value::from("b")])),
        ]);
        assert_eq!(v.get("name"), Some(&Value::from("x")));
        assert_eq!(v.get("tags").and_then(|t| t.at(1)), Some(&Value::from("b")));
        assert!(v.get("missing").is_none());
        assert!(v.is_record());
        assert_eq!(Value::Null.kind_name(), "null");
    }

    #[test]
    fn test_deep_equality() {
        let a = Value::record([("n", Value::from(1)), ("l", Value::from(vec![Value::Null]))]);
        let b = Value::record([("l", Value::from(vec![Value::Null])), ("n", Value::from(1))]);
        assert_eq!(a, b);
        assert_ne!(a, Value::record([("n", Value::from(2))]));
    }
}
