//! Work nodes
//!
//! A [`WorkNode`] is the engine's persistent record of one tree position. It
//! survives across renders for as long as the position keeps its identity,
//! and owns the live host handle, hook storage and diff bookkeeping.
//!
//! # Structure
//!
//! ```text
//! Tree (slotmap arena)
//! └── WorkNode
//!     ├── parent / first_child / next_sibling   threaded links (NodeId)
//!     ├── children                               last diffed child list
//!     ├── props + committed                      current and previous version
//!     ├── host / parent_host                     output tree handles
//!     ├── patch                                  pending action + anchor
//!     └── hooks                                  ordered hook storage
//! ```
//!
//! Links are arena keys, never references, so the tree has no ownership
//! cycles. A removed node's key is invalidated and later lookups miss.

mod patch;
mod tree;

pub use patch::{Patch, PatchFlags};
pub use tree::Tree;

use std::cell::Cell;
use std::rc::Rc;

use compact_str::CompactString;

use crate::algo::{IdentityKey, KindKey};
use crate::hooks::HookList;
use crate::host::{HostNode, Namespace};
use crate::props::{Props, RefTarget};
use crate::vnode::{Component, VNode, VNodeKind};

slotmap::new_key_type! {
    /// Arena key of a [`WorkNode`].
    pub struct NodeId;
}

// =============================================================================
// NodeKind
// =============================================================================

/// What a work node renders as.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Render root; its host handle is the app container
    Root,
    Element(CompactString),
    Text,
    Component(Component),
}

impl NodeKind {
    /// Whether this node owns a host handle of its own
    #[inline]
    pub fn is_host(&self) -> bool {
        !matches!(self, Self::Component(_))
    }

    #[inline]
    pub fn is_component(&self) -> bool {
        matches!(self, Self::Component(_))
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text)
    }

    /// Element tag, if an element
    pub fn tag(&self) -> Option<&str> {
        match self {
            Self::Element(tag) => Some(tag),
            _ => None,
        }
    }
}

impl From<VNodeKind> for NodeKind {
    fn from(kind: VNodeKind) -> Self {
        match kind {
            VNodeKind::Element(tag) => Self::Element(tag),
            VNodeKind::Text => Self::Text,
            VNodeKind::Component(c) => Self::Component(c),
        }
    }
}

// =============================================================================
// WorkNode
// =============================================================================

/// Persistent per-position record.
#[derive(Debug)]
pub struct WorkNode {
    pub(crate) kind: NodeKind,
    pub(crate) key: Option<CompactString>,
    /// Properties of the latest description
    pub(crate) props: Props,
    /// Properties as last applied to the host (the previous version)
    pub(crate) committed: Option<Props>,
    pub(crate) ref_target: Option<RefTarget>,

    pub(crate) host: Option<HostNode>,
    /// Nearest host ancestor's handle; insertion parent of `host`
    pub(crate) parent_host: Option<HostNode>,
    /// `host` is attached under `parent_host`
    pub(crate) mounted: bool,
    pub(crate) namespace: Namespace,

    pub(crate) parent: Option<NodeId>,
    pub(crate) first_child: Option<NodeId>,
    pub(crate) next_sibling: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,

    /// Shared with hook dispatchers of this node
    pub(crate) dirty: Rc<Cell<bool>>,
    pub(crate) patch: Patch,
    pub(crate) hooks: HookList,
    /// For a node pending removal: the new node anchored on it
    pub(crate) matched_partner: Option<NodeId>,
}

impl WorkNode {
    fn new(kind: NodeKind, key: Option<CompactString>, props: Props) -> Self {
        Self {
            kind,
            key,
            props,
            committed: None,
            ref_target: None,
            host: None,
            parent_host: None,
            mounted: false,
            namespace: Namespace::Html,
            parent: None,
            first_child: None,
            next_sibling: None,
            children: Vec::new(),
            dirty: Rc::new(Cell::new(false)),
            patch: Patch::default(),
            hooks: HookList::default(),
            matched_partner: None,
        }
    }

    /// Dirty root whose host handle is the app container.
    pub(crate) fn root(container: HostNode, description: VNode) -> Self {
        let mut props = Props::new();
        props.set_children(vec![description]);
        let mut node = Self::new(NodeKind::Root, None, props);
        node.host = Some(container);
        node.mounted = true;
        node.dirty.set(true);
        node
    }

    pub(crate) fn from_vnode(vnode: VNode) -> Self {
        let VNode {
            kind,
            key,
            props,
            ref_target,
        } = vnode;
        let mut node = Self::new(kind.into(), key, props);
        node.ref_target = ref_target;
        node
    }

    /// Take the kind, properties and ref of a newer description of this
    /// position. The identity key is unchanged, so a component keeps its
    /// name but picks up the latest render closure.
    pub(crate) fn absorb(&mut self, vnode: VNode) {
        self.kind = vnode.kind.into();
        self.props = vnode.props;
        self.ref_target = vnode.ref_target;
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    /// Properties last applied to the host
    pub fn committed(&self) -> Option<&Props> {
        self.committed.as_ref()
    }

    pub fn host(&self) -> Option<HostNode> {
        self.host
    }

    pub fn parent_host(&self) -> Option<HostNode> {
        self.parent_host
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn first_child(&self) -> Option<NodeId> {
        self.first_child
    }

    pub fn next_sibling(&self) -> Option<NodeId> {
        self.next_sibling
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub fn patch(&self) -> Patch {
        self.patch
    }

    pub fn hooks(&self) -> &HookList {
        &self.hooks
    }

    pub fn matched_partner(&self) -> Option<NodeId> {
        self.matched_partner
    }

    /// Identity key this node is matched by
    pub fn identity(&self) -> IdentityKey {
        let kind = match &self.kind {
            NodeKind::Root => KindKey::Root,
            NodeKind::Element(tag) => KindKey::Element(tag.clone()),
            NodeKind::Text => KindKey::Text,
            NodeKind::Component(c) => KindKey::Component(c.name()),
        };
        IdentityKey::new(self.key.clone(), kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props::Props;
    use crate::vnode::h;

    #[test]
    fn test_from_vnode_matches_identity() {
        let vnode = h("li", Props::new().key("a").with("title", "x"), ());
        let identity = vnode.identity();
        let node = WorkNode::from_vnode(vnode);
        assert_eq!(node.identity(), identity);
        assert_eq!(node.key(), Some("a"));
        assert_eq!(node.props().text("title"), Some("x"));
        assert!(!node.is_dirty());
        assert!(node.patch().is_empty());
    }

    #[test]
    fn test_root_is_dirty_and_mounted() {
        let root = WorkNode::root(HostNode::from_raw(1), h("p", Props::new(), "hi"));
        assert!(root.is_dirty());
        assert!(root.is_mounted());
        assert_eq!(root.host(), Some(HostNode::from_raw(1)));
        assert_eq!(root.props().children().len(), 1);
        assert_eq!(root.identity().kind, KindKey::Root);
    }

    #[test]
    fn test_kind_classes() {
        assert!(NodeKind::Root.is_host());
        assert!(NodeKind::Text.is_text());
        assert_eq!(NodeKind::Element("div".into()).tag(), Some("div"));
        assert!(NodeKind::Component(Component::fragment()).is_component());
    }
}
