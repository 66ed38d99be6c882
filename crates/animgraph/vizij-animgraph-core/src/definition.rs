//! JSON authoring format for graphs.
//!
//! ```json
//! {
//!   "name": "hero",
//!   "staticLinks": false,
//!   "clips": [
//!     { "name": "idle", "keyDuration": 0.25, "keys": [{ "payload": "idle_0" }, { "payload": "idle_1" }] },
//!     { "name": "run", "keys": [{ "payload": "run_0", "time": 0.0 }, { "payload": "run_1", "time": 0.4 }],
//!       "events": [{ "name": "step", "time": 0.2, "value": 1.0 }] }
//!   ],
//!   "edges": [{ "source": "idle", "destination": "run", "priority": 2 }]
//! }
//! ```
//!
//! A key is placed at its absolute `time` when given. Otherwise it lands
//! `duration` (or the clip's `keyDuration`) after the previous key.

use serde::{Deserialize, Serialize};

use crate::clip::{Clip, ClipFlags};
use crate::config::Config;
use crate::error::{AnimGraphError, Result};
use crate::graph::{EdgeProperty, Graph};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDefinition {
    pub name: String,
    #[serde(default)]
    pub static_links: bool,
    /// Clip slots; defaults to `Config::max_clips`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
    pub clips: Vec<ClipDefinition>,
    #[serde(default)]
    pub edges: Vec<EdgeDefinition>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipDefinition {
    pub name: String,
    #[serde(default)]
    pub keys: Vec<KeyDefinition>,
    #[serde(default)]
    pub events: Vec<EventDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_duration: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyDefinition {
    pub payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventDefinition {
    pub name: String,
    pub time: f32,
    #[serde(default)]
    pub value: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDefinition {
    pub source: String,
    pub destination: String,
    #[serde(default)]
    pub priority: i32,
    /// 0 (the default) never depletes.
    #[serde(default)]
    pub repeat: u32,
    #[serde(default)]
    pub immediate_cut: bool,
    #[serde(default)]
    pub clear_target: bool,
}

/// Parse a graph definition from JSON.
pub fn parse_graph_json(s: &str) -> Result<GraphDefinition> {
    serde_json::from_str(s).map_err(|e| AnimGraphError::definition(format!("parse error: {e}")))
}

impl ClipDefinition {
    /// Lists get room for at least the config's default capacities.
    pub fn build(&self, cfg: &Config) -> Result<Clip> {
        let mut clip = Clip::new(
            &self.name,
            self.keys.len().max(cfg.default_key_capacity),
            self.events.len().max(cfg.default_event_capacity),
        )?
            .with_flags(ClipFlags(self.flags.unwrap_or(0)));
        let mut cursor = 0.0f32;
        for (index, key) in self.keys.iter().enumerate() {
            let time = match (key.time, key.duration.or(self.key_duration)) {
                (Some(time), _) => time,
                // The first key of a relative timeline starts the clip.
                (None, Some(_)) if index == 0 && key.duration.is_none() => 0.0,
                (None, Some(duration)) => cursor + duration,
                (None, None) => {
                    return Err(AnimGraphError::definition(format!(
                        "clip '{}': key {index} has neither time nor duration",
                        self.name
                    )))
                }
            };
            clip.add_key(key.payload.as_str(), time)?;
            cursor = time;
        }
        for event in &self.events {
            clip.add_event(&event.name, event.time, event.value)?;
        }
        Ok(clip)
    }
}

impl GraphDefinition {
    /// Build the graph: clips in declaration order, then edges.
    pub fn build(&self, cfg: &Config) -> Result<Graph> {
        let capacity = self.capacity.unwrap_or(cfg.max_clips);
        let mut graph = Graph::with_config(&self.name, &Config {
            max_clips: capacity,
            ..cfg.clone()
        })?
        .with_static_links(self.static_links);
        if graph.capacity() < self.clips.len() {
            return Err(AnimGraphError::ClipCapacity {
                graph: self.name.clone(),
                capacity: graph.capacity(),
            });
        }

        for clip in &self.clips {
            graph.add_clip(clip.build(cfg)?)?;
        }
        for edge in &self.edges {
            let lookup = |name: &str| {
                graph
                    .clip_id_from_name(name)
                    .ok_or_else(|| AnimGraphError::UnknownClipName {
                        name: name.to_owned(),
                    })
            };
            let source = lookup(&edge.source)?;
            let destination = lookup(&edge.destination)?;
            let id = graph.add_edge(source, destination)?;
            graph.set_edge_property(id, EdgeProperty::Priority(edge.priority))?;
            graph.set_edge_property(id, EdgeProperty::RepeatCount(edge.repeat))?;
            graph.set_edge_property(id, EdgeProperty::ImmediateCut(edge.immediate_cut))?;
            graph.set_edge_property(id, EdgeProperty::ClearTarget(edge.clear_target))?;
        }
        Ok(graph)
    }
}
