//! View descriptions.
//!
//! A [`VNode`] is the immutable input of a render pass. It is built with [`h`]
//! (or [`fragment`]), consumed once by the reconciler and never mutated.
//!
//! # Normalization
//!
//! Children go through [`Child`]: nested lists are flattened, `bool`, `None`
//! and `()` render nothing, strings and numbers become text descriptions.

use std::fmt;
use std::rc::Rc;

use compact_str::CompactString;

use crate::algo::{IdentityKey, KindKey};
use crate::error::FlactResult;
use crate::hooks::Hooks;
use crate::props::{Props, RefTarget, number_to_text};

/// Property holding the content of a text description.
pub const NODE_VALUE: &str = "nodeValue";

// =============================================================================
// Component
// =============================================================================

/// Signature of a component render function.
pub type RenderFn = dyn Fn(&mut Hooks<'_>, &Props) -> FlactResult<Child>;

/// A named render function.
///
/// Two components are the same type when their names match; the name is what
/// the identity key records.
#[derive(Clone)]
pub struct Component {
    name: &'static str,
    render: Rc<RenderFn>,
}

impl Component {
    pub fn new<R, F>(name: &'static str, render: F) -> Self
    where
        R: IntoRender,
        F: Fn(&mut Hooks<'_>, &Props) -> R + 'static,
    {
        Self {
            name,
            render: Rc::new(move |hooks, props| render(hooks, props).into_render()),
        }
    }

    /// Built-in component that renders its `children` property.
    pub fn fragment() -> Self {
        Self::new("Fragment", |_, props| {
            Child::List(props.children().iter().cloned().map(Child::Node).collect())
        })
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn render(&self, hooks: &mut Hooks<'_>, props: &Props) -> FlactResult<Child> {
        (self.render)(hooks, props)
    }
}

impl PartialEq for Component {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.name)
    }
}

/// Values a component may return.
pub trait IntoRender {
    fn into_render(self) -> FlactResult<Child>;
}

impl IntoRender for Child {
    fn into_render(self) -> FlactResult<Child> {
        Ok(self)
    }
}

impl IntoRender for VNode {
    fn into_render(self) -> FlactResult<Child> {
        Ok(Child::Node(self))
    }
}

impl IntoRender for Option<VNode> {
    fn into_render(self) -> FlactResult<Child> {
        Ok(self.into())
    }
}

impl IntoRender for &'static str {
    fn into_render(self) -> FlactResult<Child> {
        Ok(self.into())
    }
}

impl IntoRender for String {
    fn into_render(self) -> FlactResult<Child> {
        Ok(self.into())
    }
}

impl IntoRender for () {
    fn into_render(self) -> FlactResult<Child> {
        Ok(Child::Empty)
    }
}

impl IntoRender for FlactResult<Child> {
    fn into_render(self) -> FlactResult<Child> {
        self
    }
}

impl IntoRender for FlactResult<VNode> {
    fn into_render(self) -> FlactResult<Child> {
        self.map(Child::Node)
    }
}

// =============================================================================
// VNode
// =============================================================================

/// What a view description renders as.
#[derive(Debug, Clone, PartialEq)]
pub enum VNodeKind {
    /// Host element by tag name
    Element(CompactString),
    /// Host text node; content lives in the `nodeValue` property
    Text,
    Component(Component),
}

impl From<&str> for VNodeKind {
    fn from(tag: &str) -> Self {
        Self::Element(CompactString::from(tag))
    }
}

impl From<String> for VNodeKind {
    fn from(tag: String) -> Self {
        Self::Element(CompactString::from(tag))
    }
}

impl From<CompactString> for VNodeKind {
    fn from(tag: CompactString) -> Self {
        Self::Element(tag)
    }
}

impl From<Component> for VNodeKind {
    fn from(component: Component) -> Self {
        Self::Component(component)
    }
}

/// Immutable description of one tree position.
#[derive(Debug, Clone)]
pub struct VNode {
    pub kind: VNodeKind,
    pub key: Option<CompactString>,
    pub props: Props,
    /// Ref of a host element, lifted out of its props
    pub ref_target: Option<RefTarget>,
}

impl VNode {
    /// Text description.
    pub fn text(content: impl Into<CompactString>) -> Self {
        let mut props = Props::new();
        props.set(NODE_VALUE, content.into());
        Self {
            kind: VNodeKind::Text,
            key: None,
            props,
            ref_target: None,
        }
    }

    /// Identity key used to match this description against existing nodes.
    pub fn identity(&self) -> IdentityKey {
        let kind = match &self.kind {
            VNodeKind::Element(tag) => KindKey::Element(tag.clone()),
            VNodeKind::Text => KindKey::Text,
            VNodeKind::Component(c) => KindKey::Component(c.name()),
        };
        IdentityKey::new(self.key.clone(), kind)
    }

    pub fn is_component(&self) -> bool {
        matches!(self.kind, VNodeKind::Component(_))
    }

    /// Content of a text description
    pub fn text_content(&self) -> Option<&str> {
        match self.kind {
            VNodeKind::Text => self.props.text(NODE_VALUE),
            _ => None,
        }
    }
}

/// Build a normalized view description.
///
/// `key` is stripped from `props` into [`VNode::key`]. On host elements `ref`
/// is lifted into [`VNode::ref_target`]; components keep it so they can
/// forward it. When `children` is empty, children already set on `props`
/// are kept.
pub fn h(kind: impl Into<VNodeKind>, mut props: Props, children: impl Into<Child>) -> VNode {
    let kind = kind.into();
    let children = children.into().flatten();
    if !children.is_empty() {
        props.set_children(children);
    }

    let key = props.take_key();
    let ref_target = match kind {
        VNodeKind::Component(_) => None,
        _ => props.take_ref(),
    };

    VNode {
        kind,
        key,
        props,
        ref_target,
    }
}

/// Group children without a wrapping host element.
pub fn fragment(children: impl Into<Child>) -> VNode {
    h(Component::fragment(), Props::new(), children)
}

/// Shorthand for [`VNode::text`].
pub fn text(content: impl Into<CompactString>) -> VNode {
    VNode::text(content)
}

// =============================================================================
// Child
// =============================================================================

/// Un-normalized child value.
#[derive(Debug, Clone, Default)]
pub enum Child {
    /// Renders nothing
    #[default]
    Empty,
    Text(CompactString),
    Node(VNode),
    List(Vec<Child>),
}

impl Child {
    /// Flatten into a list of descriptions.
    pub fn flatten(self) -> Vec<VNode> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(self, out: &mut Vec<VNode>) {
        match self {
            Self::Empty => {}
            Self::Text(s) => out.push(VNode::text(s)),
            Self::Node(node) => out.push(node),
            Self::List(list) => {
                for child in list {
                    child.flatten_into(out);
                }
            }
        }
    }
}

impl From<VNode> for Child {
    fn from(node: VNode) -> Self {
        Self::Node(node)
    }
}

impl From<&str> for Child {
    fn from(s: &str) -> Self {
        Self::Text(CompactString::from(s))
    }
}

impl From<&String> for Child {
    fn from(s: &String) -> Self {
        Self::Text(CompactString::from(s.as_str()))
    }
}

impl From<String> for Child {
    fn from(s: String) -> Self {
        Self::Text(CompactString::from(s))
    }
}

impl From<CompactString> for Child {
    fn from(s: CompactString) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for Child {
    fn from(_: bool) -> Self {
        Self::Empty
    }
}

impl From<()> for Child {
    fn from(_: ()) -> Self {
        Self::Empty
    }
}

macro_rules! impl_child_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Child {
                fn from(n: $ty) -> Self {
                    Self::Text(number_to_text(n as f64))
                }
            }
        )*
    };
}

impl_child_from_number!(i32, i64, u32, u64, usize, f32, f64);

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}

impl<T: Into<Child>> From<Vec<T>> for Child {
    fn from(list: Vec<T>) -> Self {
        Self::List(list.into_iter().map(Into::into).collect())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostNode;
    use crate::props::RefObject;

    #[test]
    fn test_flatten_drops_empty_values() {
        let child = crate::children![
            "a",
            true,
            None::<VNode>,
            (),
            vec![crate::children![1, 2.5], Child::from("b")],
        ];
        let nodes = child.flatten();
        let texts: Vec<_> = nodes.iter().filter_map(VNode::text_content).collect();
        assert_eq!(texts, ["a", "1", "2.5", "b"]);
    }

    #[test]
    fn test_h_extracts_key() {
        let node = h("li", Props::new().key("a").with("title", "t"), "x");
        assert_eq!(node.key.as_deref(), Some("a"));
        assert!(!node.props.contains("key"));
        assert_eq!(node.props.children().len(), 1);
        assert_eq!(
            node.identity(),
            IdentityKey::new(Some("a".into()), KindKey::Element("li".into()))
        );
    }

    #[test]
    fn test_h_ref_placement() {
        let slot = RefObject::<Option<HostNode>>::new(None);

        let el = h("input", Props::new().ref_to(slot.clone()), ());
        assert!(el.ref_target.is_some());
        assert!(!el.props.contains("ref"));

        let comp = Component::new("Input", |_, _| ());
        let node = h(comp, Props::new().ref_to(slot), ());
        assert!(node.ref_target.is_none());
        assert!(node.props.contains("ref"));
    }

    #[test]
    fn test_h_keeps_prop_children() {
        let mut props = Props::new();
        props.set_children(vec![VNode::text("kept")]);
        let node = h("div", props, ());
        assert_eq!(node.props.children()[0].text_content(), Some("kept"));
    }

    #[test]
    fn test_component_identity_by_name() {
        let a = Component::new("Item", |_, _| "a");
        let b = Component::new("Item", |_, _| "b");
        let c = Component::new("Other", |_, _| ());
        assert_eq!(a, b);
        assert_ne!(a, c);

        let node = fragment(vec!["x", "y"]);
        assert!(node.is_component());
        assert_eq!(node.props.children().len(), 2);
    }
}
