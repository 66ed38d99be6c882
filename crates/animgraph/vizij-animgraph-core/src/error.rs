//! Error types for the animation graph.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Bounded list an error refers to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListKind {
    Clip,
    Key,
    Event,
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Clip => "clip",
            Self::Key => "key",
            Self::Event => "event",
        })
    }
}

/// Every failure the graph, its clips and its instances can report.
///
/// Failures are local: an operation that returns an error leaves the object it
/// was called on untouched.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum AnimGraphError {
    /// The graph has no free clip slot left.
    #[error("Graph '{graph}' is full ({capacity} clips)")]
    ClipCapacity { graph: String, capacity: usize },

    /// The clip's key list is full.
    #[error("Clip '{clip}' key list is full ({capacity} keys)")]
    KeyCapacity { clip: String, capacity: usize },

    /// The clip's event list is full.
    #[error("Clip '{clip}' event list is full ({capacity} events)")]
    EventCapacity { clip: String, capacity: usize },

    /// A requested capacity exceeds the hard storage limit.
    #[error("Requested {what} capacity {requested} exceeds the limit of {limit}")]
    CapacityTooLarge {
        what: ListKind,
        requested: usize,
        limit: usize,
    },

    /// Clip id is unknown or refers to a removed clip.
    #[error("Invalid clip id: {id}")]
    InvalidClip { id: String },

    /// Edge id is unknown or refers to a removed edge.
    #[error("Invalid edge id: {id}")]
    InvalidEdge { id: String },

    /// No clip with this name in the graph.
    #[error("Unknown clip name: {name}")]
    UnknownClipName { name: String },

    /// No graph with this name in the catalog.
    #[error("Unknown graph: {name}")]
    UnknownGraph { name: String },

    /// No instance with this id in the engine.
    #[error("Unknown instance: {id}")]
    UnknownInstance { id: u32 },

    /// An edge already links this ordered pair of clips.
    #[error("Edge {source_clip} -> {destination} already exists")]
    DuplicateEdge {
        source_clip: String,
        destination: String,
    },

    /// Clip names are unique within a graph.
    #[error("Clip name '{name}' is already used in graph '{graph}'")]
    DuplicateClipName { graph: String, name: String },

    /// Structural change attempted on a static graph with attached instances.
    #[error("Graph '{graph}' is locked by {references} instance(s)")]
    GraphLocked { graph: String, references: u32 },

    /// The shared graph is already borrowed elsewhere.
    #[error("Graph '{graph}' is busy")]
    GraphBusy { graph: String },

    /// Negative, NaN or infinite time.
    #[error("Invalid time value: {time}")]
    InvalidTime { time: f32 },

    /// Negative, NaN or infinite playback frequency.
    #[error("Invalid frequency: {frequency}")]
    InvalidFrequency { frequency: f32 },

    /// Timestamps must be appended in timeline order.
    #[error("Timestamp {time} precedes the last {what} at {last}")]
    OutOfOrderTimestamp {
        what: ListKind,
        time: f32,
        last: f32,
    },

    /// Nothing to remove.
    #[error("Clip '{clip}' has no {what} to remove")]
    EmptyList { clip: String, what: ListKind },

    /// A non-static graph resolves against an instance-private edge table.
    #[error("Graph '{graph}' needs a cloned edge table")]
    MissingEdgeTable { graph: String },

    /// The instance is paused.
    #[error("Instance is paused")]
    Paused,

    /// The instance has no current clip yet.
    #[error("Instance has no current clip")]
    NoCurrentClip,

    /// Malformed or inconsistent graph definition.
    #[error("Definition error: {reason}")]
    Definition { reason: String },
}

impl AnimGraphError {
    /// Create a definition error from any message.
    pub fn definition(reason: impl Into<String>) -> Self {
        Self::Definition {
            reason: reason.into(),
        }
    }

    /// Errors that describe a transient state of the caller rather than bad input.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Paused | Self::NoCurrentClip | Self::GraphLocked { .. } | Self::GraphBusy { .. }
        )
    }

    /// Playback conditions that a scheduler simply skips.
    #[inline]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Paused | Self::NoCurrentClip)
    }

    /// Get error category for logging.
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::ClipCapacity { .. }
            | Self::KeyCapacity { .. }
            | Self::EventCapacity { .. }
            | Self::CapacityTooLarge { .. } => "capacity",
            Self::InvalidClip { .. }
            | Self::InvalidEdge { .. }
            | Self::UnknownClipName { .. }
            | Self::UnknownGraph { .. }
            | Self::UnknownInstance { .. }
            | Self::DuplicateEdge { .. }
            | Self::DuplicateClipName { .. } => "reference",
            Self::GraphLocked { .. } | Self::GraphBusy { .. } => "lock",
            Self::InvalidTime { .. }
            | Self::InvalidFrequency { .. }
            | Self::OutOfOrderTimestamp { .. }
            | Self::EmptyList { .. }
            | Self::MissingEdgeTable { .. } => "validation",
            Self::Paused | Self::NoCurrentClip => "playback",
            Self::Definition { .. } => "definition",
        }
    }
}

impl From<serde_json::Error> for AnimGraphError {
    fn from(err: serde_json::Error) -> Self {
        Self::Definition {
            reason: err.to_string(),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = core::result::Result<T, AnimGraphError>;
