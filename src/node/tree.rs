//! Work node arena and traversal helpers.

use slotmap::SlotMap;

use super::{NodeId, WorkNode};
use crate::host::HostNode;

/// Arena owning every work node of a runtime.
#[derive(Debug, Default)]
pub struct Tree {
    nodes: SlotMap<NodeId, WorkNode>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, node: WorkNode) -> NodeId {
        self.nodes.insert(node)
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&WorkNode> {
        self.nodes.get(id)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut WorkNode> {
        self.nodes.get_mut(id)
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn remove(&mut self, id: NodeId) -> Option<WorkNode> {
        self.nodes.remove(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &WorkNode)> {
        self.nodes.iter()
    }

    /// Children of `id` following the threaded sibling links.
    pub fn child_ids(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let first = self.get(id).and_then(|n| n.first_child);
        std::iter::successors(first, |&c| self.get(c).and_then(|n| n.next_sibling))
    }

    /// `id` and all its descendants, parents before children.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.get(current) else {
                continue;
            };
            out.push(current);
            stack.extend(node.children.iter().rev().copied());
        }
        out
    }

    /// Host handle of the closest ancestor that owns one.
    pub fn nearest_host_ancestor(&self, id: NodeId) -> Option<HostNode> {
        let mut current = self.get(id)?.parent;
        while let Some(pid) = current {
            let node = self.get(pid)?;
            if node.kind.is_host() {
                return node.host;
            }
            current = node.parent;
        }
        None
    }

    /// First attached host handle inside the subtree of `id`, descending
    /// through components in child order.
    pub fn first_mounted_host(&self, id: NodeId) -> Option<HostNode> {
        self.first_host_where(id, &|_| true)
    }

    /// Like [`first_mounted_host`](Self::first_mounted_host), skipping
    /// subtrees that are about to be placed.
    fn first_stable_host(&self, id: NodeId) -> Option<HostNode> {
        self.first_host_where(id, &|node| !node.patch.flags.needs_placement())
    }

    fn first_host_where(&self, id: NodeId, keep: &dyn Fn(&WorkNode) -> bool) -> Option<HostNode> {
        let node = self.get(id)?;
        if !keep(node) {
            return None;
        }
        if node.kind.is_host() {
            return node.host.filter(|_| node.mounted);
        }
        node.children
            .iter()
            .find_map(|&child| self.first_host_where(child, keep))
    }

    /// Host handle `id` must be inserted before.
    ///
    /// The anchor's first attached host wins. Without one, the next sibling
    /// host that stays in place is used, climbing out of component parents.
    /// `None` means append.
    pub(crate) fn resolve_anchor(&self, id: NodeId) -> Option<HostNode> {
        let node = self.get(id)?;
        if let Some(host) = node.patch.anchor.and_then(|a| self.first_mounted_host(a)) {
            return Some(host);
        }

        let mut current = id;
        loop {
            let node = self.get(current)?;
            let mut sibling = node.next_sibling;
            while let Some(sid) = sibling {
                if let Some(host) = self.first_stable_host(sid) {
                    return Some(host);
                }
                sibling = self.get(sid)?.next_sibling;
            }
            let parent = self.get(node.parent?)?;
            if parent.kind.is_host() {
                return None;
            }
            current = node.parent?;
        }
    }

    /// Topmost attached host handles inside the subtree of `id`.
    pub(crate) fn top_hosts(&self, id: NodeId) -> Vec<(HostNode, Option<HostNode>)> {
        let mut out = Vec::new();
        self.collect_top_hosts(id, &mut out);
        out
    }

    fn collect_top_hosts(&self, id: NodeId, out: &mut Vec<(HostNode, Option<HostNode>)>) {
        let Some(node) = self.get(id) else {
            return;
        };
        if node.kind.is_host() {
            if let Some(host) = node.host.filter(|_| node.mounted) {
                out.push((host, node.parent_host));
            }
            return;
        }
        for &child in &node.children {
            self.collect_top_hosts(child, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeKind, Patch, PatchFlags};
    use crate::props::Props;
    use crate::vnode::{Component, h};

    fn link(tree: &mut Tree, parent: NodeId, children: &[NodeId]) {
        for (i, &c) in children.iter().enumerate() {
            let node = tree.get_mut(c).unwrap();
            node.parent = Some(parent);
            node.next_sibling = children.get(i + 1).copied();
        }
        let p = tree.get_mut(parent).unwrap();
        p.children = children.to_vec();
        p.first_child = children.first().copied();
    }

    fn element(tree: &mut Tree, tag: &str, host: u64) -> NodeId {
        let mut node = WorkNode::from_vnode(h(tag, Props::new(), ()));
        node.host = Some(HostNode::from_raw(host));
        node.mounted = true;
        tree.insert(node)
    }

    fn component(tree: &mut Tree) -> NodeId {
        tree.insert(WorkNode::from_vnode(h(Component::fragment(), Props::new(), ())))
    }

    #[test]
    fn test_first_mounted_host_descends_components() {
        let mut tree = Tree::new();
        let root = tree.insert(WorkNode::root(HostNode::from_raw(1), h("p", Props::new(), ())));
        let comp = component(&mut tree);
        let inner = component(&mut tree);
        let a = element(&mut tree, "a", 10);
        link(&mut tree, root, &[comp]);
        link(&mut tree, comp, &[inner]);
        link(&mut tree, inner, &[a]);

        assert_eq!(tree.first_mounted_host(comp), Some(HostNode::from_raw(10)));
        assert_eq!(tree.nearest_host_ancestor(a), Some(HostNode::from_raw(1)));
        assert_eq!(tree.subtree(root), vec![root, comp, inner, a]);
        assert_eq!(tree.child_ids(comp).collect::<Vec<_>>(), vec![inner]);
    }

    #[test]
    fn test_resolve_anchor_climbs_out_of_components() {
        let mut tree = Tree::new();
        let root = tree.insert(WorkNode::root(HostNode::from_raw(1), h("p", Props::new(), ())));
        let comp = component(&mut tree);
        let after = element(&mut tree, "b", 20);
        let fresh = element(&mut tree, "a", 10);
        link(&mut tree, root, &[comp, after]);
        link(&mut tree, comp, &[fresh]);

        let node = tree.get_mut(fresh).unwrap();
        node.mounted = false;
        node.patch = Patch::new(PatchFlags::INSERT, None);

        assert_eq!(tree.resolve_anchor(fresh), Some(HostNode::from_raw(20)));
        assert_eq!(tree.resolve_anchor(after), None);
    }

    #[test]
    fn test_resolve_anchor_skips_pending_siblings() {
        let mut tree = Tree::new();
        let root = tree.insert(WorkNode::root(HostNode::from_raw(1), h("p", Props::new(), ())));
        let a = element(&mut tree, "a", 10);
        let b = element(&mut tree, "b", 20);
        let c = element(&mut tree, "c", 30);
        link(&mut tree, root, &[a, b, c]);
        tree.get_mut(a).unwrap().patch = Patch::new(PatchFlags::INSERT, None);
        tree.get_mut(b).unwrap().patch = Patch::new(PatchFlags::MOVE, None);

        assert_eq!(tree.resolve_anchor(a), Some(HostNode::from_raw(30)));

        tree.get_mut(a).unwrap().patch = Patch::new(PatchFlags::INSERT, Some(b));
        assert_eq!(tree.resolve_anchor(a), Some(HostNode::from_raw(20)));
    }

    #[test]
    fn test_top_hosts_stop_at_first_host() {
        let mut tree = Tree::new();
        let comp = component(&mut tree);
        let a = element(&mut tree, "a", 10);
        let inner = element(&mut tree, "span", 11);
        let b = element(&mut tree, "b", 20);
        link(&mut tree, comp, &[a, b]);
        link(&mut tree, a, &[inner]);
        for id in [a, b] {
            tree.get_mut(id).unwrap().parent_host = Some(HostNode::from_raw(1));
        }

        let hosts = tree.top_hosts(comp);
        assert_eq!(
            hosts,
            vec![
                (HostNode::from_raw(10), Some(HostNode::from_raw(1))),
                (HostNode::from_raw(20), Some(HostNode::from_raw(1))),
            ]
        );
        assert!(matches!(tree.get(comp).map(|n| n.kind()), Some(NodeKind::Component(_))));
    }
}
