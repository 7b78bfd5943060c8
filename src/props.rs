//! Property bags.
//!
//! A view description carries its properties as an ordered list of
//! `(name, value)` pairs over a closed value type. Listener and ref values
//! compare by identity, everything else by value.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use compact_str::{CompactString, format_compact};
use smallvec::SmallVec;

use crate::error::{FlactError, FlactResult};
use crate::host::HostNode;
use crate::vnode::VNode;

/// Name of the property that carries a listener for `event`.
#[inline]
pub fn listener_prop(event: &str) -> CompactString {
    format_compact!("on{event}")
}

/// Render a number the way a host document stringifies it (`1`, `1.5`, `NaN`).
pub fn number_to_text(n: f64) -> CompactString {
    if n.is_infinite() {
        return CompactString::const_new(if n > 0.0 { "Infinity" } else { "-Infinity" });
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format_compact!("{}", n as i64)
    } else {
        format_compact!("{n}")
    }
}

// =============================================================================
// PropValue
// =============================================================================

/// A single property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Text(CompactString),
    Number(f64),
    Bool(bool),
    /// Style map, diffed key by key
    Style(Style),
    /// Event listener, bound under an `on`-prefixed property name
    Listener(Listener),
    /// Ref target; only reaches props of component nodes
    Ref(RefTarget),
}

impl PropValue {
    impl_value_accessors!(
        Text => CompactString,
        Number => f64,
        Bool => bool,
        Style => Style,
        Listener => Listener,
        Ref => RefTarget,
    );

    /// Truthiness used to decide between setting and removing an attribute.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Text(s) => !s.is_empty(),
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::Bool(b) => *b,
            Self::Style(_) | Self::Listener(_) | Self::Ref(_) => true,
        }
    }

    /// String form written into a host attribute.
    pub fn to_attr_string(&self) -> CompactString {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => number_to_text(*n),
            Self::Bool(b) => CompactString::const_new(if *b { "true" } else { "false" }),
            Self::Style(style) => style.to_css(),
            Self::Listener(_) | Self::Ref(_) => CompactString::default(),
        }
    }

    /// Short name of the variant, for diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Number(_) => "number",
            Self::Bool(_) => "bool",
            Self::Style(_) => "style",
            Self::Listener(_) => "listener",
            Self::Ref(_) => "ref",
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        Self::Text(CompactString::from(s))
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        Self::Text(CompactString::from(s))
    }
}

impl From<CompactString> for PropValue {
    fn from(s: CompactString) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

macro_rules! impl_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for PropValue {
                fn from(n: $ty) -> Self {
                    Self::Number(n as f64)
                }
            }
        )*
    };
}

impl_from_number!(f64, f32, i32, i64, u32, u64, usize);

impl From<Style> for PropValue {
    fn from(style: Style) -> Self {
        Self::Style(style)
    }
}

impl From<Listener> for PropValue {
    fn from(listener: Listener) -> Self {
        Self::Listener(listener)
    }
}

impl From<RefTarget> for PropValue {
    fn from(target: RefTarget) -> Self {
        Self::Ref(target)
    }
}

impl From<RefObject<Option<HostNode>>> for PropValue {
    fn from(obj: RefObject<Option<HostNode>>) -> Self {
        Self::Ref(RefTarget::Object(obj))
    }
}

// =============================================================================
// Style
// =============================================================================

/// Ordered style map (`property -> value`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Style(SmallVec<[(CompactString, CompactString); 4]>);

impl Style {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Style::set`]
    pub fn with(mut self, property: impl Into<CompactString>, value: impl Into<CompactString>) -> Self {
        self.set(property, value);
        self
    }

    /// Insert or update a property.
    pub fn set(&mut self, property: impl Into<CompactString>, value: impl Into<CompactString>) {
        let property = property.into();
        let value = value.into();
        if let Some(entry) = self.0.iter_mut().find(|(k, _)| *k == property) {
            entry.1 = value;
        } else {
            self.0.push((property, value));
        }
    }

    pub fn get(&self, property: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == property)
            .map(|(_, v)| v.as_str())
    }

    pub fn remove(&mut self, property: &str) -> Option<CompactString> {
        self.0
            .iter()
            .position(|(k, _)| k == property)
            .map(|pos| self.0.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Inline CSS text (`color: red; width: 1px;`)
    pub fn to_css(&self) -> CompactString {
        let mut css = CompactString::default();
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                css.push(' ');
            }
            css.push_str(k);
            css.push_str(": ");
            css.push_str(v);
            css.push(';');
        }
        css
    }
}

// =============================================================================
// Events and listeners
// =============================================================================

/// Event delivered to a [`Listener`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Event {
    /// Event name without the `on` prefix (`click`, `input`)
    pub name: CompactString,
    /// Payload, e.g. the new value of an input
    pub value: Option<CompactString>,
}

impl Event {
    pub fn new(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<CompactString>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Shared event callback. Two listeners are equal only if they are the same closure.
#[derive(Clone)]
pub struct Listener(Rc<dyn Fn(&Event)>);

impl Listener {
    pub fn new(f: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(f))
    }

    #[inline]
    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({:p})", Rc::as_ptr(&self.0))
    }
}

// =============================================================================
// Refs
// =============================================================================

/// Mutable cell whose only writable field is `current`.
///
/// Returned by `use_ref` and used as an object ref on host elements.
pub struct RefObject<T>(Rc<RefCell<T>>);

impl<T> RefObject<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    /// Clone out the current value.
    pub fn current(&self) -> T
    where
        T: Clone,
    {
        self.0.borrow().clone()
    }

    /// Read the current value in place.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.0.borrow())
    }

    pub fn set_current(&self, value: T) {
        *self.0.borrow_mut() = value;
    }

    /// Write through a named field. Only `current` is writable.
    pub fn assign(&self, field: &str, value: T) -> FlactResult<()> {
        if field != "current" {
            return Err(FlactError::ref_assignment(field));
        }
        self.set_current(value);
        Ok(())
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Clone for RefObject<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> PartialEq for RefObject<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T: fmt::Debug> fmt::Debug for RefObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefObject")
            .field("current", &*self.0.borrow())
            .finish()
    }
}

/// Where a host element publishes its handle after placement.
#[derive(Clone)]
pub enum RefTarget {
    Object(RefObject<Option<HostNode>>),
    Callback(Rc<dyn Fn(Option<HostNode>)>),
}

impl RefTarget {
    pub fn callback(f: impl Fn(Option<HostNode>) + 'static) -> Self {
        Self::Callback(Rc::new(f))
    }

    /// Publish `node` (or `None` on teardown).
    pub(crate) fn attach(&self, node: Option<HostNode>) {
        match self {
            Self::Object(obj) => obj.set_current(node),
            Self::Callback(f) => f(node),
        }
    }
}

impl From<RefObject<Option<HostNode>>> for RefTarget {
    fn from(obj: RefObject<Option<HostNode>>) -> Self {
        Self::Object(obj)
    }
}

impl PartialEq for RefTarget {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Callback(a), Self::Callback(b)) => {
                std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for RefTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(obj) => f.debug_tuple("Object").field(obj).finish(),
            Self::Callback(cb) => write!(f, "Callback({:p})", Rc::as_ptr(cb)),
        }
    }
}

// =============================================================================
// Props
// =============================================================================

/// Ordered property bag plus the normalized child list.
#[derive(Debug, Clone, Default)]
pub struct Props {
    entries: SmallVec<[(CompactString, PropValue); 4]>,
    children: Vec<VNode>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Props::set`]
    pub fn with(mut self, name: impl Into<CompactString>, value: impl Into<PropValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Set the identity key
    pub fn key(self, key: impl Into<PropValue>) -> Self {
        self.with("key", key)
    }

    /// Bind a listener for `event` (stored as `on{event}`)
    pub fn on(self, event: &str, f: impl Fn(&Event) + 'static) -> Self {
        self.with(listener_prop(event), Listener::new(f))
    }

    pub fn style(self, style: Style) -> Self {
        self.with("style", style)
    }

    /// Attach a ref target
    pub fn ref_to(self, target: impl Into<RefTarget>) -> Self {
        self.with("ref", PropValue::Ref(target.into()))
    }

    /// Insert or update a property.
    pub fn set(&mut self, name: impl Into<CompactString>, value: impl Into<PropValue>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == name) {
            entry.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&PropValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Text value of a property
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name)?.as_text().map(CompactString::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == name)
    }

    pub fn remove(&mut self, name: &str) -> Option<PropValue> {
        self.entries
            .iter()
            .position(|(k, _)| k == name)
            .map(|pos| self.entries.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of properties, children excluded
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn children(&self) -> &[VNode] {
        &self.children
    }

    pub fn set_children(&mut self, children: Vec<VNode>) {
        self.children = children;
    }

    pub(crate) fn take_children(&mut self) -> Vec<VNode> {
        std::mem::take(&mut self.children)
    }

    pub(crate) fn take_key(&mut self) -> Option<CompactString> {
        self.remove("key").map(|v| v.to_attr_string())
    }

    pub(crate) fn take_ref(&mut self) -> Option<RefTarget> {
        if !matches!(self.get("ref"), Some(PropValue::Ref(_))) {
            return None;
        }
        match self.remove("ref") {
            Some(PropValue::Ref(target)) => Some(target),
            _ => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
