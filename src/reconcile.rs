//! Reconciler
//!
//! An iterative depth-first walk over the work node tree, resumable between
//! nodes. A [`Walk`] starts at a dirty node and, for each node it visits:
//!
//! 1. **Expand**: render components through their hook list; host nodes take
//!    their children from props and get a host handle on first visit.
//! 2. **Diff**: match old children against the new descriptions and thread
//!    the result into `first_child` / `next_sibling`, with patch flags set.
//! 3. **Advance**: go to the first child, else climb. Climbing past a
//!    component runs its layout effects and collects its passive ones.
//!    Reaching the walk root commits the subtree and ends the walk.
//!
//! The deadline is checked before every node except the first of a step, so
//! each step makes progress.

use std::mem;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Weak;

use tracing::{debug, trace};

use crate::algo::{IdentityKey, NewOp, OldOp, diff_keyed};
use crate::commit::{self, Removals};
use crate::error::{FlactError, FlactResult, panic_message};
use crate::hooks::{HookOwner, Hooks, UpdateQueue, run_effects};
use crate::host::{Host, PropMode, apply_props};
use crate::node::{NodeId, NodeKind, Patch, PatchFlags, Tree, WorkNode};
use crate::scheduler::{Deadline, EffectBatch, Step};
use crate::vnode::VNode;

/// Everything a walk step borrows from the runtime.
pub(crate) struct RenderCtx<'a, H: Host> {
    pub(crate) tree: &'a mut Tree,
    pub(crate) host: &'a mut H,
    pub(crate) deadline: &'a Deadline,
    pub(crate) queue: Weak<dyn UpdateQueue>,
    /// Passive effects collected while climbing, one batch per node
    pub(crate) passive: Vec<EffectBatch>,
}

/// Resumable reconciliation of one dirty subtree.
#[derive(Debug)]
pub struct Walk {
    root: NodeId,
    cursor: Option<NodeId>,
    started: bool,
    /// Removed nodes nothing was anchored on
    deletions: Vec<NodeId>,
    /// Removed nodes kept until their partner is placed
    deferred: Vec<NodeId>,
}

impl Walk {
    pub fn new(root: NodeId) -> Self {
        Self {
            root,
            cursor: Some(root),
            started: false,
            deletions: Vec::new(),
            deferred: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Node the next step starts at; `None` once finished
    pub fn cursor(&self) -> Option<NodeId> {
        self.cursor
    }

    /// Run until the subtree is committed or the deadline passes.
    ///
    /// On error the cursor stays on the failing node, so running the step
    /// again resumes there.
    pub(crate) fn step<H: Host>(&mut self, ctx: &mut RenderCtx<'_, H>) -> FlactResult<Step> {
        if !self.started {
            if !ctx.tree.get(self.root).is_some_and(WorkNode::is_dirty) {
                debug!(root = ?self.root, "root is clean, nothing to reconcile");
                self.cursor = None;
                return Ok(Step::Done);
            }
            self.started = true;
            debug!(root = ?self.root, "reconcile started");
        }

        let mut progressed = false;
        while let Some(id) = self.cursor {
            if progressed && ctx.deadline.expired() {
                debug!(root = ?self.root, cursor = ?id, "time slice exhausted, yielding");
                return Ok(Step::Continue);
            }
            let Some(children) = self.expand(id, ctx)? else {
                self.cursor = None;
                break;
            };
            self.reconcile_children(id, children, ctx);
            progressed = true;
            self.cursor = self.advance(id, ctx)?;
        }
        Ok(Step::Done)
    }

    // -------------------------------------------------------------------------
    // Expand
    // -------------------------------------------------------------------------

    /// Produce the new child descriptions of `id`; `None` if it is gone.
    fn expand<H: Host>(&mut self, id: NodeId, ctx: &mut RenderCtx<'_, H>) -> FlactResult<Option<Vec<VNode>>> {
        let Some(node) = ctx.tree.get_mut(id) else {
            return Ok(None);
        };
        node.dirty.set(false);

        let children = match node.kind.clone() {
            NodeKind::Component(component) => {
                trace!(node = ?id, component = component.name(), "render component");
                let owner = HookOwner {
                    node: id,
                    dirty: node.dirty.clone(),
                    queue: ctx.queue.clone(),
                };
                let mut hooks = mem::take(&mut node.hooks);
                let props = mem::take(&mut node.props);
                let result = catch_unwind(AssertUnwindSafe(|| {
                    let mut cursor = Hooks::new(&mut hooks, owner);
                    component.render(&mut cursor, &props)
                }));
                if let Some(node) = ctx.tree.get_mut(id) {
                    node.hooks = hooks;
                    node.props = props;
                }
                match result {
                    Ok(rendered) => rendered?.flatten(),
                    Err(payload) => {
                        return Err(FlactError::render(component.name(), panic_message(payload.as_ref())));
                    }
                }
            }
            NodeKind::Root => node.props.take_children(),
            NodeKind::Element(_) | NodeKind::Text => {
                let children = node.props.take_children();
                self.materialize(id, ctx)?;
                children
            }
        };
        Ok(Some(children))
    }

    /// Resolve the insertion parent and create the host handle on first visit.
    fn materialize<H: Host>(&self, id: NodeId, ctx: &mut RenderCtx<'_, H>) -> FlactResult<()> {
        let parent_host = ctx.tree.nearest_host_ancestor(id);
        let Some(node) = ctx.tree.get_mut(id) else {
            return Ok(());
        };
        node.parent_host = parent_host;
        if node.host.is_some() {
            return Ok(());
        }

        let mode = PropMode {
            namespace: node.namespace,
            is_text: node.kind.is_text(),
        };
        let handle = match &node.kind {
            NodeKind::Element(tag) => ctx.host.create_element(tag, node.namespace)?,
            _ => ctx.host.create_text()?,
        };
        apply_props(ctx.host, handle, None, &node.props, mode)?;
        node.host = Some(handle);
        trace!(node = ?id, ?handle, "created host node");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Diff
    // -------------------------------------------------------------------------

    fn reconcile_children<H: Host>(&mut self, id: NodeId, vnodes: Vec<VNode>, ctx: &mut RenderCtx<'_, H>) {
        let tree = &mut *ctx.tree;
        let Some(parent) = tree.get_mut(id) else {
            return;
        };
        let old_ids = mem::take(&mut parent.children);
        let namespace = parent.namespace;

        let old_keys: Vec<Option<IdentityKey>> = old_ids
            .iter()
            .map(|&c| tree.get(c).map(WorkNode::identity))
            .collect();
        let new_keys: Vec<IdentityKey> = vnodes.iter().map(VNode::identity).collect();
        let plan = diff_keyed(&old_keys, &new_keys);
        if !old_ids.is_empty() || !vnodes.is_empty() {
            trace!(node = ?id, stats = ?plan.stats, "diffed children");
        }

        let mut new_ids = Vec::with_capacity(vnodes.len());
        for (vnode, op) in vnodes.into_iter().zip(plan.new_ops) {
            let child = match op {
                NewOp::Update { old } => {
                    reuse(tree, old_ids[old], vnode, PatchFlags::UPDATE, None);
                    old_ids[old]
                }
                NewOp::Move { old, anchor } => {
                    reuse(tree, old_ids[old], vnode, PatchFlags::MOVE, Some(old_ids[anchor]));
                    old_ids[old]
                }
                NewOp::Insert { anchor } => {
                    let mut node = WorkNode::from_vnode(vnode);
                    node.patch = Patch::new(PatchFlags::INSERT, anchor.map(|a| old_ids[a]));
                    tree.insert(node)
                }
            };
            if let Some(node) = tree.get_mut(child) {
                node.parent = Some(id);
                node.next_sibling = None;
                node.matched_partner = None;
                node.namespace = match &node.kind {
                    NodeKind::Element(tag) => namespace.child(tag),
                    _ => namespace,
                };
            }
            new_ids.push(child);
        }

        for pair in new_ids.windows(2) {
            if let Some(node) = tree.get_mut(pair[0]) {
                node.next_sibling = Some(pair[1]);
            }
        }

        for (i, op) in plan.old_ops.iter().enumerate() {
            let OldOp::Remove { partner } = *op else {
                continue;
            };
            let old = old_ids[i];
            match partner {
                None => self.deletions.push(old),
                Some(j) => {
                    if let Some(node) = tree.get_mut(old) {
                        node.patch = Patch::new(PatchFlags::REMOVE, None);
                        node.matched_partner = Some(new_ids[j]);
                    }
                    self.deferred.push(old);
                }
            }
        }

        if let Some(parent) = tree.get_mut(id) {
            parent.first_child = new_ids.first().copied();
            parent.children = new_ids;
        }
    }

    // -------------------------------------------------------------------------
    // Advance
    // -------------------------------------------------------------------------

    /// Next node to expand, committing when the climb reaches the walk root.
    fn advance<H: Host>(&mut self, id: NodeId, ctx: &mut RenderCtx<'_, H>) -> FlactResult<Option<NodeId>> {
        if let Some(first) = ctx.tree.get(id).and_then(|n| n.first_child) {
            return Ok(Some(first));
        }

        let mut current = id;
        loop {
            self.flush_effects(current, ctx);
            if current == self.root {
                break;
            }
            let Some(node) = ctx.tree.get(current) else {
                break;
            };
            if let Some(sibling) = node.next_sibling {
                return Ok(Some(sibling));
            }
            match node.parent {
                Some(parent) => current = parent,
                None => break,
            }
        }

        let removals = Removals {
            unrelated: mem::take(&mut self.deletions),
            deferred: mem::take(&mut self.deferred),
        };
        commit::commit(ctx.tree, ctx.host, self.root, removals)?;
        debug!(root = ?self.root, "subtree committed");
        Ok(None)
    }

    /// Run layout effects of `id` now; collect its passive effects.
    fn flush_effects<H: Host>(&self, id: NodeId, ctx: &mut RenderCtx<'_, H>) {
        let Some(node) = ctx.tree.get_mut(id) else {
            return;
        };
        if !node.kind.is_component() {
            return;
        }
        let (layout, passive) = node.hooks.take_pending();
        if !layout.is_empty() {
            trace!(node = ?id, count = layout.len(), "run layout effects");
            run_effects(&layout);
        }
        if !passive.is_empty() {
            ctx.passive.push(EffectBatch(passive));
        }
    }
}

/// Point an existing node at its new description.
fn reuse(tree: &mut Tree, id: NodeId, vnode: VNode, flags: PatchFlags, anchor: Option<NodeId>) {
    if let Some(node) = tree.get_mut(id) {
        node.absorb(vnode);
        node.patch.flags |= flags;
        if anchor.is_some() {
            node.patch.anchor = anchor;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::host::{HostNode, MemoryHost, Namespace};
    use crate::platform::{ManualPlatform, Platform};
    use crate::props::Props;
    use crate::runtime::Shared;
    use crate::vnode::{Component, h};

    struct Fixture {
        tree: Tree,
        host: MemoryHost,
        container: HostNode,
        platform: Arc<ManualPlatform>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut host = MemoryHost::new();
            let container = host.create_element("main", Namespace::Html).unwrap();
            Self {
                tree: Tree::new(),
                host,
                container,
                platform: Arc::new(ManualPlatform::new()),
            }
        }

        fn mount(&mut self, vnode: VNode) -> NodeId {
            self.tree.insert(WorkNode::root(self.container, vnode))
        }

        fn run(&mut self, walk: &mut Walk, slice: Duration) -> Step {
            let platform: Arc<dyn Platform> = self.platform.clone();
            let deadline = Deadline::new(Arc::clone(&platform), platform.now() + slice);
            let mut ctx = RenderCtx {
                tree: &mut self.tree,
                host: &mut self.host,
                deadline: &deadline,
                queue: Weak::<Shared<MemoryHost>>::new(),
                passive: Vec::new(),
            };
            walk.step(&mut ctx).unwrap()
        }

        fn html(&self) -> String {
            self.host.inner_html(self.container)
        }
    }

    fn list(keys: &[&str]) -> VNode {
        let items: Vec<VNode> = keys
            .iter()
            .map(|k| h("li", Props::new().key(*k), *k))
            .collect();
        h("ul", Props::new(), items)
    }

    #[test]
    fn test_initial_render_builds_host_tree() {
        let mut fx = Fixture::new();
        let root = fx.mount(h("div", Props::new().with("id", "app"), crate::children!["hello", h("b", Props::new(), "!")]));
        let mut walk = Walk::new(root);

        assert_eq!(fx.run(&mut walk, Duration::from_secs(1)), Step::Done);
        assert_eq!(fx.html(), r#"<div id="app">hello<b>!</b></div>"#);
        assert!(!fx.tree.get(root).unwrap().is_dirty());
        assert!(walk.cursor().is_none());
    }

    #[test]
    fn test_clean_root_is_skipped() {
        let mut fx = Fixture::new();
        let root = fx.mount(h("p", Props::new(), ()));
        fx.tree.get_mut(root).unwrap().dirty.set(false);
        let mut walk = Walk::new(root);
        assert_eq!(fx.run(&mut walk, Duration::from_secs(1)), Step::Done);
        assert_eq!(fx.host.stats().created, 1);
    }

    #[test]
    fn test_yield_and_resume() {
        let mut fx = Fixture::new();
        fx.platform = Arc::new(ManualPlatform::new().with_auto_tick(Duration::from_millis(2)));
        let root = fx.mount(list(&["a", "b", "c", "d"]));
        let mut walk = Walk::new(root);

        let mut steps = 0;
        while fx.run(&mut walk, Duration::from_millis(5)) == Step::Continue {
            steps += 1;
            assert!(fx.html().is_empty(), "nothing is visible before commit");
        }
        assert!(steps > 0);
        assert_eq!(fx.html(), "<ul><li>a</li><li>b</li><li>c</li><li>d</li></ul>");
    }

    #[test]
    fn test_keyed_rerender_reuses_nodes() {
        let mut fx = Fixture::new();
        let root = fx.mount(list(&["a", "b", "c"]));
        fx.run(&mut Walk::new(root), Duration::from_secs(1));
        let ul = fx.host.find_by_tag(fx.container, "ul").unwrap();
        let before: Vec<_> = fx.host.children(ul).to_vec();

        let node = fx.tree.get_mut(root).unwrap();
        node.props.set_children(vec![list(&["c", "a"])]);
        node.dirty.set(true);
        fx.run(&mut Walk::new(root), Duration::from_secs(1));

        assert_eq!(fx.html(), "<ul><li>c</li><li>a</li></ul>");
        assert_eq!(fx.host.children(ul), &[before[2], before[0]]);
        assert_eq!(fx.host.detach_count(before[1]), 1);
    }

    #[test]
    fn test_svg_namespace_flows_down() {
        let mut fx = Fixture::new();
        let root = fx.mount(h(
            "div",
            Props::new(),
            h("svg", Props::new(), h("circle", Props::new().with("r", 2), ())),
        ));
        fx.run(&mut Walk::new(root), Duration::from_secs(1));

        let svg = fx.host.find_by_tag(fx.container, "svg").unwrap();
        let circle = fx.host.find_by_tag(fx.container, "circle").unwrap();
        let div = fx.host.find_by_tag(fx.container, "div").unwrap();
        assert_eq!(fx.host.namespace(div), Some(Namespace::Html));
        assert_eq!(fx.host.namespace(svg), Some(Namespace::Svg));
        assert_eq!(fx.host.namespace(circle), Some(Namespace::Svg));
        assert_eq!(fx.host.attribute(circle, "r"), Some("2"));
    }

    #[test]
    fn test_component_error_keeps_cursor() {
        let mut fx = Fixture::new();
        let failing = Component::new("Failing", |_, _| -> FlactResult<VNode> {
            Err(FlactError::render("Failing", "no data"))
        });
        let root = fx.mount(h("div", Props::new(), h(failing, Props::new(), ())));
        let mut walk = Walk::new(root);

        let platform: Arc<dyn Platform> = fx.platform.clone();
        let deadline = Deadline::new(Arc::clone(&platform), platform.now() + Duration::from_secs(1));
        let mut ctx = RenderCtx {
            tree: &mut fx.tree,
            host: &mut fx.host,
            deadline: &deadline,
            queue: Weak::<Shared<MemoryHost>>::new(),
            passive: Vec::new(),
        };
        let err = walk.step(&mut ctx).unwrap_err();
        assert!(matches!(err, FlactError::Render { component: "Failing", .. }));
        let cursor = walk.cursor().unwrap();
        assert!(ctx.tree.get(cursor).unwrap().kind().is_component());
    }

    #[test]
    fn test_component_panic_becomes_render_error() {
        let mut fx = Fixture::new();
        let panicking = Component::new("Panicking", |_, _| -> VNode { panic!("bad state") });
        let root = fx.mount(h(panicking, Props::new(), ()));
        let mut walk = Walk::new(root);

        let platform: Arc<dyn Platform> = fx.platform.clone();
        let deadline = Deadline::new(Arc::clone(&platform), platform.now() + Duration::from_secs(1));
        let mut ctx = RenderCtx {
            tree: &mut fx.tree,
            host: &mut fx.host,
            deadline: &deadline,
            queue: Weak::<Shared<MemoryHost>>::new(),
            passive: Vec::new(),
        };
        match walk.step(&mut ctx) {
            Err(FlactError::Render { component, message }) => {
                assert_eq!(component, "Panicking");
                assert_eq!(message, "bad state");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
