//! Host binding layer.
//!
//! The engine never touches an output document directly. Everything it needs
//! is expressed through the [`Host`] trait: node creation, attribute/field/style
//! writes, listener binding and ordered insertion.
//!
//! - [`apply_props`]: the property update rule shared by every host
//! - [`MemoryHost`]: an in-memory document used by tests and headless runs

mod memory;
mod props;

pub use memory::{HostStats, MemoryHost};
pub use props::{PropMode, apply_props};
pub(crate) use props::listener_event;

use std::fmt;

use crate::error::HostResult;
use crate::props::{Listener, PropValue};

// =============================================================================
// HostNode
// =============================================================================

/// Opaque handle to a node owned by a [`Host`].
///
/// The engine stores handles and hands them back; only the host knows what
/// they point at.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostNode(u64);

impl HostNode {
    /// Create from a raw value
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw value
    #[inline]
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for HostNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostNode({})", self.0)
    }
}

// =============================================================================
// Namespace
// =============================================================================

/// Element namespace.
///
/// A subtree rooted at `<svg>` renders in [`Namespace::Svg`]; every element
/// below it inherits the namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Namespace {
    #[default]
    Html,
    Svg,
}

impl Namespace {
    /// Namespace URI as used by DOM `createElementNS`
    pub const fn uri(self) -> &'static str {
        match self {
            Self::Html => "http://www.w3.org/1999/xhtml",
            Self::Svg => "http://www.w3.org/2000/svg",
        }
    }

    /// Namespace for an element `tag` created under a parent in `self`.
    #[inline]
    pub fn child(self, tag: &str) -> Self {
        if self == Self::Svg || tag == "svg" {
            Self::Svg
        } else {
            Self::Html
        }
    }
}

// =============================================================================
// Host trait
// =============================================================================

/// Primitives a host document must expose to the engine.
///
/// Listener binding is keyed by event name: binding a second listener for the
/// same event replaces the first.
pub trait Host {
    /// Create an element node.
    fn create_element(&mut self, tag: &str, namespace: Namespace) -> HostResult<HostNode>;

    /// Create an empty text node.
    fn create_text(&mut self) -> HostResult<HostNode>;

    /// Whether `name` is a field on this node's type (as opposed to a plain attribute).
    fn has_field(&self, node: HostNode, name: &str) -> bool;

    /// Assign a field.
    fn set_field(&mut self, node: HostNode, name: &str, value: &PropValue) -> HostResult<()>;

    fn set_attribute(&mut self, node: HostNode, name: &str, value: &str) -> HostResult<()>;

    fn remove_attribute(&mut self, node: HostNode, name: &str) -> HostResult<()>;

    /// Set one style property. An empty `value` clears the property.
    fn set_style(&mut self, node: HostNode, property: &str, value: &str) -> HostResult<()>;

    fn set_listener(&mut self, node: HostNode, event: &str, listener: Listener) -> HostResult<()>;

    fn remove_listener(&mut self, node: HostNode, event: &str) -> HostResult<()>;

    /// Insert `child` under `parent` before `before`, or append when `before` is `None`.
    ///
    /// A `child` already attached elsewhere is moved.
    fn insert_before(
        &mut self,
        parent: HostNode,
        child: HostNode,
        before: Option<HostNode>,
    ) -> HostResult<()>;

    fn remove_child(&mut self, parent: HostNode, child: HostNode) -> HostResult<()>;
}
