//! Commit phase
//!
//! Applies the patches the reconciler left on a subtree to the host. Nothing
//! becomes visible before this runs, and it runs to completion once started.
//!
//! Per node, parents first:
//!
//! - component with a patch: the patch is inherited by its direct children,
//!   so their host nodes are placed where the component goes
//! - host node with `INSERT`/`MOVE`: inserted before its resolved anchor
//! - host node with `UPDATE`/`MOVE`: properties diffed against the committed
//!   version
//! - a removed node anchored on by this one is torn down once this node's
//!   subtree is placed
//!
//! Committing a subtree without patches performs no host operations.

use tracing::{debug, trace};

use crate::error::FlactResult;
use crate::host::{Host, PropMode, apply_props, listener_event};
use crate::node::{NodeId, PatchFlags, Tree};

/// Removals collected by a walk.
#[derive(Debug, Default)]
pub(crate) struct Removals {
    /// No new node is anchored on these
    pub(crate) unrelated: Vec<NodeId>,
    /// Torn down after their partner is placed
    pub(crate) deferred: Vec<NodeId>,
}

/// Commit the subtree rooted at `root`.
pub(crate) fn commit<H: Host + ?Sized>(
    tree: &mut Tree,
    host: &mut H,
    root: NodeId,
    removals: Removals,
) -> FlactResult<()> {
    for id in removals.unrelated {
        teardown(tree, host, id)?;
    }
    visit(tree, host, root)?;
    for id in removals.deferred {
        if tree.contains(id) {
            teardown(tree, host, id)?;
        }
    }
    Ok(())
}

fn visit<H: Host + ?Sized>(tree: &mut Tree, host: &mut H, id: NodeId) -> FlactResult<()> {
    let Some(node) = tree.get(id) else {
        return Ok(());
    };
    let patch = node.patch;
    let is_component = node.kind.is_component();
    let is_root = node.parent.is_none();
    let children = node.children.clone();

    if !patch.is_empty() {
        if is_component {
            for &child in &children {
                if let Some(child) = tree.get_mut(child) {
                    child.patch.inherit(patch);
                }
            }
        } else if !is_root {
            place(tree, host, id, patch.flags)?;
        }
    }

    for child in children {
        visit(tree, host, child)?;
    }

    if let Some(anchor) = patch.anchor {
        let claimed = tree.get(anchor).is_some_and(|a| {
            a.patch.flags.contains(PatchFlags::REMOVE) && a.matched_partner == Some(id)
        });
        if claimed {
            teardown(tree, host, anchor)?;
        }
    }

    if let Some(node) = tree.get_mut(id) {
        node.patch = Default::default();
    }
    Ok(())
}

/// Insert and update one host node, then attach its ref.
fn place<H: Host + ?Sized>(tree: &mut Tree, host: &mut H, id: NodeId, flags: PatchFlags) -> FlactResult<()> {
    let before = if flags.needs_placement() {
        tree.resolve_anchor(id)
    } else {
        None
    };
    let Some(node) = tree.get_mut(id) else {
        return Ok(());
    };
    let Some(handle) = node.host else {
        return Ok(());
    };

    if flags.needs_placement() {
        if let Some(parent) = node.parent_host {
            host.insert_before(parent, handle, before)?;
            node.mounted = true;
            trace!(node = ?id, ?handle, ?before, "placed host node");
        }
    }

    if flags.needs_props() {
        let mode = PropMode {
            namespace: node.namespace,
            is_text: node.kind.is_text(),
        };
        apply_props(host, handle, node.committed.as_ref(), &node.props, mode)?;
    }
    node.committed = Some(node.props.clone());

    if let Some(target) = &node.ref_target {
        target.attach(Some(handle));
    }
    Ok(())
}

/// Unmount the subtree rooted at `id` and drop it from the arena.
///
/// Effect cleanups run for every component, listeners are unbound, refs are
/// cleared and the topmost host nodes are detached from their parents.
pub(crate) fn teardown<H: Host + ?Sized>(tree: &mut Tree, host: &mut H, id: NodeId) -> FlactResult<()> {
    let ids = tree.subtree(id);
    let detach = tree.top_hosts(id);

    for &nid in &ids {
        let Some(node) = tree.get_mut(nid) else {
            continue;
        };
        node.hooks.teardown();
        if let (Some(handle), Some(committed)) = (node.host, &node.committed) {
            let events = committed
                .iter()
                .filter(|(_, value)| value.is_listener())
                .filter_map(|(name, _)| listener_event(name));
            for event in events {
                host.remove_listener(handle, &event)?;
            }
        }
        if let Some(target) = &node.ref_target {
            target.attach(None);
        }
    }

    for (handle, parent) in detach {
        if let Some(parent) = parent {
            host.remove_child(parent, handle)?;
        }
    }

    for &nid in &ids {
        tree.remove(nid);
    }
    debug!(node = ?id, nodes = ids.len(), "tore down subtree");
    Ok(())
}
