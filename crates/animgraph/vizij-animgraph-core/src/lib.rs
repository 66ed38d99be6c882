//! Vizij AnimGraph Core (engine-agnostic)
//!
//! Keyframe clips wired together by a directed transition graph. Each tick an
//! [`Instance`] advances its clock, resolves which clip it lands in through
//! [`Graph::compute_anim`] and queues START / STOP / CUT / LOOP / UPDATE and
//! custom event notifications in the order their boundaries were crossed.
//!
//! Graphs are shared between instances ([`SharedGraph`]). Static graphs keep
//! one set of edge repeat counters for everyone and refuse structural edits
//! while played; other graphs hand each instance its own [`EdgeTable`].

pub mod clip;
pub mod config;
pub mod definition;
pub mod edge_table;
pub mod engine;
pub mod error;
pub mod events;
pub mod graph;
pub mod ids;
pub mod instance;
pub mod names;
pub mod scheduler;

// Re-exports for consumers (adapters)
pub use clip::{Clip, ClipFlags, CustomEvent, KeyRef, PayloadHandle, MAX_EVENTS, MAX_KEYS};
pub use config::Config;
pub use definition::{
    parse_graph_json, ClipDefinition, EdgeDefinition, EventDefinition, GraphDefinition,
    KeyDefinition,
};
pub use edge_table::{EdgeTable, RepeatBudget};
pub use engine::Engine;
pub use error::{AnimGraphError, ListKind, Result};
pub use events::{AnimEvent, AnimEventKind, Outputs, UpdateFailure};
pub use graph::{
    Edge, EdgeProperty, EdgePropertyKind, Graph, Resolution, SharedGraph, Target, Transition,
    MAX_CLIPS,
};
pub use ids::{ClipId, EdgeId, IdAllocator, InstId, SlotId};
pub use instance::{Instance, PlaybackState};
pub use names::NameTable;
pub use scheduler::{run_tick, Updatable};
