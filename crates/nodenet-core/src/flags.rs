//! Edge and node status bitsets.

use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// State of one half of an edge.
    ///
    /// The two halves of an edge always agree except for the directional
    /// bits, which are mirrored (see [`EdgeFlags::invert`]).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    pub struct EdgeFlags: u8 {
        /// Discovered by an automatic linker.
        const AUTO = 1 << 0;
        /// Pinned from outside; survives automatic recomputation.
        const MANUAL = 1 << 1;
        /// The peer's linker wants this edge.
        const IN = 1 << 2;
        /// This node's linker wants this edge.
        const OUT = 1 << 3;
        /// Adjacent but not graph-connecting (e.g. a closed valve).
        const NO_MERGE = 1 << 4;

        /// Provenance bits: who created or wants the edge.
        const SOURCE_MASK = Self::AUTO.bits() | Self::MANUAL.bits() | Self::IN.bits() | Self::OUT.bits();
    }
}

impl EdgeFlags {
    /// The state of an edge that does not exist. Treating a missing edge as a
    /// non-mergeable one makes adding or removing a mergeable edge a plain
    /// `NO_MERGE` transition.
    pub const NULL: EdgeFlags = EdgeFlags::NO_MERGE;

    /// Flags as seen from the other end of the edge.
    pub fn invert(self) -> Self {
        let mut flags = self.difference(Self::IN | Self::OUT);
        if self.contains(Self::IN) {
            flags |= Self::OUT;
        }
        if self.contains(Self::OUT) {
            flags |= Self::IN;
        }
        flags
    }

    /// Whether the edge counts toward graph connectivity.
    pub fn is_mergeable(self) -> bool {
        !self.contains(Self::NO_MERGE)
    }
}

impl Default for EdgeFlags {
    fn default() -> Self {
        Self::empty()
    }
}

bitflags::bitflags! {
    /// Per-node status.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct NodeFlags: u8 {
        /// The node has been reached by a floodfill.
        const INIT = 1 << 0;
        /// The node is queued for an automatic edge update.
        const EDGES = 1 << 1;
        /// The node may connect its graph to another graph.
        const MERGE = 1 << 2;
        /// The node may sit on a split boundary of its graph.
        const SPLIT = 1 << 3;
    }
}

impl Default for NodeFlags {
    fn default() -> Self {
        Self::empty()
    }
}
