//! Pending patch of a work node.

use bitflags::bitflags;

use super::NodeId;

bitflags! {
    /// Actions the commit phase applies to a node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PatchFlags: u8 {
        /// Re-apply properties against the previous version
        const UPDATE = 1 << 1;
        /// Place a new host node
        const INSERT = 1 << 2;
        /// Tear down
        const REMOVE = 1 << 3;
        /// Re-place an existing host node
        const MOVE = 1 << 5;
    }
}

impl PatchFlags {
    /// INSERT or MOVE
    #[inline]
    pub fn needs_placement(self) -> bool {
        self.intersects(Self::INSERT | Self::MOVE)
    }

    /// UPDATE or MOVE
    #[inline]
    pub fn needs_props(self) -> bool {
        self.intersects(Self::UPDATE | Self::MOVE)
    }
}

/// Action flags plus the insertion anchor (insert-before semantics).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Patch {
    pub flags: PatchFlags,
    pub anchor: Option<NodeId>,
}

impl Patch {
    pub fn new(flags: PatchFlags, anchor: Option<NodeId>) -> Self {
        Self { flags, anchor }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Merge a patch inherited from a component parent.
    ///
    /// Flags are OR-ed. When the parent is being placed its anchor replaces
    /// this node's own, so the whole range lands before the parent's anchor.
    pub(crate) fn inherit(&mut self, parent: Patch) {
        self.flags |= parent.flags & !PatchFlags::REMOVE;
        if parent.flags.needs_placement() {
            self.anchor = parent.anchor;
        }
    }
}
