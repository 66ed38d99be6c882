//! Core configuration for vizij-animgraph-core.

use serde::{Deserialize, Serialize};

use crate::clip::{MAX_EVENTS, MAX_KEYS};
use crate::graph::MAX_CLIPS;

/// Sizing limits shared by graphs, clips and the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Clip slots of graphs created without an explicit capacity (at most 128).
    pub max_clips: usize,
    /// Key capacity hint for clips built without one.
    pub default_key_capacity: usize,
    /// Event capacity hint for clips built without one.
    pub default_event_capacity: usize,

    /// Transition hops allowed per clip in a single update before the
    /// resolution loop gives up and wraps time in place.
    pub hops_per_clip: usize,

    /// Maximum events to retain per tick before the rest are dropped.
    pub max_events_per_tick: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_clips: MAX_CLIPS,
            default_key_capacity: 32,
            default_event_capacity: 8,
            hops_per_clip: 4,
            max_events_per_tick: 1024,
        }
    }
}

impl Config {
    /// Clamp every limit into the range the storage supports.
    pub fn normalized(mut self) -> Self {
        self.max_clips = self.max_clips.clamp(1, MAX_CLIPS);
        self.default_key_capacity = self.default_key_capacity.min(MAX_KEYS);
        self.default_event_capacity = self.default_event_capacity.min(MAX_EVENTS);
        self.hops_per_clip = self.hops_per_clip.max(1);
        self
    }
}
