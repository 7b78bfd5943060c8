//! In-memory host document.
//!
//! [`MemoryHost`] implements [`Host`] over a flat arena. It keeps fields,
//! attributes, style and listeners per node, counts structural operations,
//! and serializes any subtree to HTML for assertions.

use compact_str::CompactString;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use super::{Host, HostNode, Namespace};
use crate::error::{HostError, HostResult};
use crate::props::{Event, Listener, PropValue, Style};
use crate::vnode::NODE_VALUE;

/// Fields an element exposes by default (`name in node` on a DOM element).
pub const DEFAULT_ELEMENT_FIELDS: &[&str] = &[
    "id",
    "className",
    "value",
    "checked",
    "disabled",
    "title",
    "hidden",
    "tabIndex",
    "textContent",
    "placeholder",
    "type",
    "name",
    "href",
    "src",
];

/// Counters of structural host operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStats {
    /// Elements and text nodes created
    pub created: usize,
    /// `insert_before` calls, moves included
    pub inserts: usize,
    /// `remove_child` calls
    pub removals: usize,
}

#[derive(Debug, Clone)]
enum EntryKind {
    Element {
        tag: CompactString,
        namespace: Namespace,
    },
    Text,
}

#[derive(Debug)]
struct Entry {
    kind: EntryKind,
    fields: SmallVec<[(CompactString, PropValue); 2]>,
    attributes: Vec<(CompactString, CompactString)>,
    style: Style,
    listeners: FxHashMap<CompactString, Listener>,
    parent: Option<HostNode>,
    children: Vec<HostNode>,
    detached: u32,
}

impl Entry {
    fn new(kind: EntryKind) -> Self {
        Self {
            kind,
            fields: SmallVec::new(),
            attributes: Vec::new(),
            style: Style::new(),
            listeners: FxHashMap::default(),
            parent: None,
            children: Vec::new(),
            detached: 0,
        }
    }

    fn field(&self, name: &str) -> Option<&PropValue> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }
}

/// Host document kept in memory.
#[derive(Debug)]
pub struct MemoryHost {
    entries: Vec<Entry>,
    element_fields: FxHashSet<CompactString>,
    stats: HostStats,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::with_fields(DEFAULT_ELEMENT_FIELDS.iter().copied())
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host whose elements expose exactly `fields`.
    pub fn with_fields<'a>(fields: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            entries: Vec::new(),
            element_fields: fields.into_iter().map(CompactString::from).collect(),
            stats: HostStats::default(),
        }
    }

    fn alloc(&mut self, kind: EntryKind) -> HostNode {
        self.entries.push(Entry::new(kind));
        self.stats.created += 1;
        HostNode::from_raw(self.entries.len() as u64)
    }

    fn entry(&self, node: HostNode) -> HostResult<&Entry> {
        let index = node.as_raw().checked_sub(1).ok_or(HostError::UnknownNode(node))?;
        self.entries
            .get(index as usize)
            .ok_or(HostError::UnknownNode(node))
    }

    fn entry_mut(&mut self, node: HostNode) -> HostResult<&mut Entry> {
        let index = node.as_raw().checked_sub(1).ok_or(HostError::UnknownNode(node))?;
        self.entries
            .get_mut(index as usize)
            .ok_or(HostError::UnknownNode(node))
    }

    fn detach(&mut self, child: HostNode) -> HostResult<()> {
        let Some(parent) = self.entry(child)?.parent else {
            return Ok(());
        };
        self.entry_mut(parent)?.children.retain(|&c| c != child);
        let entry = self.entry_mut(child)?;
        entry.parent = None;
        entry.detached += 1;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Inspection
    // -------------------------------------------------------------------------

    pub fn stats(&self) -> HostStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = HostStats::default();
    }

    /// Element tag, `None` for text nodes and unknown handles
    pub fn tag(&self, node: HostNode) -> Option<&str> {
        match &self.entry(node).ok()?.kind {
            EntryKind::Element { tag, .. } => Some(tag),
            EntryKind::Text => None,
        }
    }

    pub fn namespace(&self, node: HostNode) -> Option<Namespace> {
        match self.entry(node).ok()?.kind {
            EntryKind::Element { namespace, .. } => Some(namespace),
            EntryKind::Text => None,
        }
    }

    pub fn children(&self, node: HostNode) -> &[HostNode] {
        self.entry(node).map_or(&[], |e| e.children.as_slice())
    }

    pub fn parent(&self, node: HostNode) -> Option<HostNode> {
        self.entry(node).ok()?.parent
    }

    /// How many times `node` was detached from a parent (moves included)
    pub fn detach_count(&self, node: HostNode) -> u32 {
        self.entry(node).map_or(0, |e| e.detached)
    }

    pub fn field(&self, node: HostNode, name: &str) -> Option<&PropValue> {
        self.entry(node).ok()?.field(name)
    }

    pub fn attribute(&self, node: HostNode, name: &str) -> Option<&str> {
        self.entry(node)
            .ok()?
            .attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Style property; `Some("")` once cleared
    pub fn style(&self, node: HostNode, property: &str) -> Option<&str> {
        self.entry(node).ok()?.style.get(property)
    }

    pub fn listener(&self, node: HostNode, event: &str) -> Option<Listener> {
        self.entry(node).ok()?.listeners.get(event).cloned()
    }

    /// Invoke the listener bound for `event.name`. Returns whether one was bound.
    pub fn dispatch_event(&self, node: HostNode, event: &Event) -> bool {
        match self.listener(node, &event.name) {
            Some(listener) => {
                listener.call(event);
                true
            }
            None => false,
        }
    }

    /// Concatenated text of `node` and its descendants.
    pub fn text_content(&self, node: HostNode) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: HostNode, out: &mut String) {
        let Ok(entry) = self.entry(node) else {
            return;
        };
        match entry.kind {
            EntryKind::Text => {
                if let Some(value) = entry.field(NODE_VALUE) {
                    out.push_str(&value.to_attr_string());
                }
            }
            EntryKind::Element { .. } => {
                for &child in &entry.children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Depth-first search below `root` (inclusive) for an element with `tag`.
    pub fn find_by_tag(&self, root: HostNode, tag: &str) -> Option<HostNode> {
        if self.tag(root) == Some(tag) {
            return Some(root);
        }
        self.children(root)
            .iter()
            .find_map(|&child| self.find_by_tag(child, tag))
    }

    // -------------------------------------------------------------------------
    // Serialization
    // -------------------------------------------------------------------------

    /// Serialize the children of `node` to HTML.
    pub fn inner_html(&self, node: HostNode) -> String {
        let mut out = String::new();
        for &child in self.children(node) {
            self.render(child, &mut out);
        }
        out
    }

    /// Serialize `node` and its subtree to HTML.
    pub fn to_html(&self, node: HostNode) -> String {
        let mut out = String::new();
        self.render(node, &mut out);
        out
    }

    fn render(&self, node: HostNode, out: &mut String) {
        let Ok(entry) = self.entry(node) else {
            return;
        };
        let tag = match &entry.kind {
            EntryKind::Text => {
                if let Some(value) = entry.field(NODE_VALUE) {
                    out.push_str(&escape_html(&value.to_attr_string()));
                }
                return;
            }
            EntryKind::Element { tag, .. } => tag,
        };

        out.push('<');
        out.push_str(tag);
        for (name, value) in &entry.fields {
            if name == "textContent" || !value.is_truthy() {
                continue;
            }
            let name = if name == "className" { "class" } else { name.as_str() };
            push_attr(out, name, &value.to_attr_string());
        }
        for (name, value) in &entry.attributes {
            push_attr(out, name, value);
        }
        let css: String = entry
            .style
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| format!("{k}: {v};"))
            .collect::<Vec<_>>()
            .join(" ");
        if !css.is_empty() {
            push_attr(out, "style", &css);
        }

        if is_void_element(tag) {
            out.push_str(" />");
            return;
        }
        out.push('>');
        for &child in &entry.children {
            self.render(child, out);
        }
        out.push_str("</");
        out.push_str(tag);
        out.push('>');
    }
}

// =============================================================================
// Host impl
// =============================================================================

impl Host for MemoryHost {
    fn create_element(&mut self, tag: &str, namespace: Namespace) -> HostResult<HostNode> {
        Ok(self.alloc(EntryKind::Element {
            tag: tag.into(),
            namespace,
        }))
    }

    fn create_text(&mut self) -> HostResult<HostNode> {
        Ok(self.alloc(EntryKind::Text))
    }

    fn has_field(&self, node: HostNode, name: &str) -> bool {
        match self.entry(node).map(|e| &e.kind) {
            Ok(EntryKind::Text) => name == NODE_VALUE,
            Ok(EntryKind::Element { .. }) => self.element_fields.contains(name),
            Err(_) => false,
        }
    }

    fn set_field(&mut self, node: HostNode, name: &str, value: &PropValue) -> HostResult<()> {
        let entry = self.entry_mut(node)?;
        match entry.fields.iter_mut().find(|(k, _)| k == name) {
            Some((_, slot)) => *slot = value.clone(),
            None => entry.fields.push((name.into(), value.clone())),
        }
        Ok(())
    }

    fn set_attribute(&mut self, node: HostNode, name: &str, value: &str) -> HostResult<()> {
        let entry = self.entry_mut(node)?;
        match entry.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, slot)) => *slot = value.into(),
            None => entry.attributes.push((name.into(), value.into())),
        }
        Ok(())
    }

    fn remove_attribute(&mut self, node: HostNode, name: &str) -> HostResult<()> {
        self.entry_mut(node)?.attributes.retain(|(k, _)| k != name);
        Ok(())
    }

    fn set_style(&mut self, node: HostNode, property: &str, value: &str) -> HostResult<()> {
        self.entry_mut(node)?.style.set(property, value);
        Ok(())
    }

    fn set_listener(&mut self, node: HostNode, event: &str, listener: Listener) -> HostResult<()> {
        self.entry_mut(node)?.listeners.insert(event.into(), listener);
        Ok(())
    }

    fn remove_listener(&mut self, node: HostNode, event: &str) -> HostResult<()> {
        self.entry_mut(node)?.listeners.remove(event);
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: HostNode,
        child: HostNode,
        before: Option<HostNode>,
    ) -> HostResult<()> {
        if matches!(self.entry(parent)?.kind, EntryKind::Text) {
            return Err(HostError::NotAContainer(parent));
        }
        self.entry(child)?;
        if let Some(before) = before {
            if self.entry(before)?.parent != Some(parent) {
                return Err(HostError::NotAChild {
                    parent,
                    child: before,
                });
            }
            if before == child {
                return Ok(());
            }
        }

        self.detach(child)?;
        let siblings = &mut self.entry_mut(parent)?.children;
        let index = before
            .and_then(|b| siblings.iter().position(|&c| c == b))
            .unwrap_or(siblings.len());
        siblings.insert(index, child);
        self.entry_mut(child)?.parent = Some(parent);
        self.stats.inserts += 1;
        Ok(())
    }

    fn remove_child(&mut self, parent: HostNode, child: HostNode) -> HostResult<()> {
        if self.entry(child)?.parent != Some(parent) {
            return Err(HostError::NotAChild { parent, child });
        }
        self.detach(child)?;
        self.stats.removals += 1;
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&escape_attr(value));
    out.push('"');
}

/// Escape HTML special characters.
fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            _ => result.push(c),
        }
    }
    result
}

/// Escape attribute value special characters.
fn escape_attr(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '"' => result.push_str("&quot;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            _ => result.push(c),
        }
    }
    result
}

fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn div(host: &mut MemoryHost) -> HostNode {
        host.create_element("div", Namespace::Html).unwrap()
    }

    fn text(host: &mut MemoryHost, content: &str) -> HostNode {
        let node = host.create_text().unwrap();
        host.set_field(node, NODE_VALUE, &PropValue::from(content)).unwrap();
        node
    }

    #[test]
    fn test_insert_before_and_move() {
        let mut host = MemoryHost::new();
        let root = div(&mut host);
        let (a, b, c) = (text(&mut host, "a"), text(&mut host, "b"), text(&mut host, "c"));
        for n in [a, b, c] {
            host.insert_before(root, n, None).unwrap();
        }
        assert_eq!(host.text_content(root), "abc");

        host.insert_before(root, c, Some(a)).unwrap();
        assert_eq!(host.children(root), &[c, a, b]);
        assert_eq!(host.detach_count(c), 1);
        assert_eq!(host.stats().inserts, 4);
    }

    #[test]
    fn test_remove_child() {
        let mut host = MemoryHost::new();
        let root = div(&mut host);
        let a = text(&mut host, "a");
        host.insert_before(root, a, None).unwrap();
        host.remove_child(root, a).unwrap();

        assert!(host.children(root).is_empty());
        assert_eq!(host.parent(a), None);
        assert_eq!(host.stats().removals, 1);
        assert_eq!(
            host.remove_child(root, a),
            Err(HostError::NotAChild { parent: root, child: a })
        );
    }

    #[test]
    fn test_structural_errors() {
        let mut host = MemoryHost::new();
        let root = div(&mut host);
        let other = div(&mut host);
        let t = text(&mut host, "x");
        let stray = div(&mut host);

        assert_eq!(host.insert_before(t, root, None), Err(HostError::NotAContainer(t)));
        assert_eq!(
            host.insert_before(root, t, Some(stray)),
            Err(HostError::NotAChild { parent: root, child: stray })
        );
        let unknown = HostNode::from_raw(99);
        assert_eq!(host.insert_before(root, unknown, None), Err(HostError::UnknownNode(unknown)));
        assert!(host.insert_before(other, t, None).is_ok());
    }

    #[test]
    fn test_known_fields() {
        let mut host = MemoryHost::with_fields(["value"]);
        let input = host.create_element("input", Namespace::Html).unwrap();
        let t = host.create_text().unwrap();
        assert!(host.has_field(input, "value"));
        assert!(!host.has_field(input, "id"));
        assert!(host.has_field(t, NODE_VALUE));
        assert!(!host.has_field(t, "value"));
    }

    #[test]
    fn test_to_html() {
        let mut host = MemoryHost::new();
        let root = div(&mut host);
        host.set_field(root, "className", &PropValue::from("box")).unwrap();
        host.set_attribute(root, "data-x", "\"q\"").unwrap();
        host.set_style(root, "color", "red").unwrap();
        let br = host.create_element("br", Namespace::Html).unwrap();
        let t = text(&mut host, "a < b");
        host.insert_before(root, t, None).unwrap();
        host.insert_before(root, br, None).unwrap();

        assert_eq!(
            host.to_html(root),
            r#"<div class="box" data-x="&quot;q&quot;" style="color: red;">a &lt; b<br /></div>"#
        );
        assert_eq!(host.inner_html(root), "a &lt; b<br />");
    }

    #[test]
    fn test_dispatch_event() {
        use std::cell::Cell;
        use std::rc::Rc;

        let mut host = MemoryHost::new();
        let button = host.create_element("button", Namespace::Html).unwrap();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        host.set_listener(button, "click", Listener::new(move |_| counter.set(counter.get() + 1)))
            .unwrap();

        assert!(host.dispatch_event(button, &Event::new("click")));
        assert!(!host.dispatch_event(button, &Event::new("input")));
        host.remove_listener(button, "click").unwrap();
        assert!(!host.dispatch_event(button, &Event::new("click")));
        assert_eq!(hits.get(), 1);
    }
}
