//! Update reports and diagnostic instrumentation.
//!
//! - [`UpdateReport`] summarises what one call to `Engine::update` did.
//! - [`UpdateProfile`] captures per-phase timing. Only populated when the
//!   `profiling` feature is enabled.
//! - [`DiagnosticInfo`] explains the state of a single node. Always available.

use std::fmt;
use std::time::Duration;

use crate::flags::NodeFlags;
use crate::id::{EntityId, GraphId, GraphProto};

/// Summary of a single `Engine::update` call.
#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    pub tick: u64,
    /// Edge/split/merge passes run.
    pub iterations: u32,
    /// Nodes whose automatic edges were recomputed.
    pub edge_updates: u32,
    /// Graphs that actually split into two or more.
    pub splits_resolved: u32,
    /// Graphs absorbed into a survivor.
    pub merges_resolved: u32,
    pub graphs_spawned: u32,
    pub graphs_deleted: u32,
    /// The iteration cap was hit with work still queued.
    pub capped: bool,
    pub profile: Option<UpdateProfile>,
}

/// Per-phase timing accumulated over all iterations of one update.
#[derive(Debug, Clone, Default)]
pub struct UpdateProfile {
    pub edges: Duration,
    pub splits: Duration,
    pub merges: Duration,
    pub delivery: Duration,
    pub total: Duration,
}

impl UpdateProfile {
    /// Returns the name and duration of the slowest phase.
    pub fn bottleneck_phase(&self) -> (&'static str, Duration) {
        let phases = [
            ("edges", self.edges),
            ("splits", self.splits),
            ("merges", self.merges),
            ("delivery", self.delivery),
        ];
        phases
            .into_iter()
            .fold(("edges", Duration::ZERO), |best, phase| {
                if phase.1 >= best.1 { phase } else { best }
            })
    }
}

/// Snapshot of everything the engine knows about a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticInfo {
    pub node: EntityId,
    pub host: EntityId,
    pub prototype: String,
    pub proto: GraphProto,
    pub graph: Option<GraphId>,
    pub flags: NodeFlags,
    pub edge_count: usize,
    pub mergeable_edges: u32,
    pub queued_for_edges: bool,
}

impl fmt::Display for DiagnosticInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:?}) proto={} host={:?} graph={:?} flags={:?} edges={} mergeable={}",
            self.prototype,
            self.node,
            self.proto,
            self.host,
            self.graph.map(GraphId::entity),
            self.flags,
            self.edge_count,
            self.mergeable_edges,
        )?;
        if self.queued_for_edges {
            f.write_str(" queued")?;
        }
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn report_default_is_empty() {
        let r = UpdateReport::default();
        assert_eq!(r.iterations, 0);
        assert!(!r.capped);
        assert!(r.profile.is_none());
    }

    #[test]
    fn bottleneck_phase_returns_largest() {
        let p = UpdateProfile {
            edges: Duration::from_micros(10),
            splits: Duration::from_micros(300),
            merges: Duration::from_micros(20),
            delivery: Duration::from_micros(5),
            total: Duration::from_micros(335),
        };
        assert_eq!(p.bottleneck_phase(), ("splits", Duration::from_micros(300)));
    }

    #[test]
    fn bottleneck_phase_tie_goes_to_last() {
        let p = UpdateProfile {
            edges: Duration::from_micros(7),
            merges: Duration::from_micros(7),
            ..Default::default()
        };
        assert_eq!(p.bottleneck_phase().0, "merges");
    }

    #[test]
    fn diagnostic_display_mentions_prototype_and_queue_state() {
        let mut sm: SlotMap<EntityId, ()> = SlotMap::with_key();
        let node = sm.insert(());
        let info = DiagnosticInfo {
            node,
            host: node,
            prototype: "pipe_straight".into(),
            proto: GraphProto::from("pipe"),
            graph: None,
            flags: NodeFlags::EDGES,
            edge_count: 0,
            mergeable_edges: 0,
            queued_for_edges: true,
        };
        let text = info.to_string();
        assert!(text.starts_with("pipe_straight"));
        assert!(text.contains("proto=pipe"));
        assert!(text.ends_with("queued"));
    }
}
