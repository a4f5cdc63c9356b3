use crate::event::EventKind;
use serde::{Deserialize, Serialize};

/// Engine tuning knobs. Loadable from data files via `nodenet-data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on edge/split/merge passes per `update`.
    pub max_iterations: u32,
    /// Pending events reserved for up front. The queue grows past it.
    pub event_buffer_capacity: usize,
    /// Event kinds that are never buffered.
    pub suppressed_events: Vec<EventKind>,
}

impl EngineConfig {
    pub const DEFAULT_MAX_ITERATIONS: u32 = 100;
    pub const DEFAULT_EVENT_BUFFER_CAPACITY: usize = 1024;
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            event_buffer_capacity: Self::DEFAULT_EVENT_BUFFER_CAPACITY,
            suppressed_events: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_iterations, 100);
        assert_eq!(config.event_buffer_capacity, 1024);
        assert!(config.suppressed_events.is_empty());
    }
}
