//! Engine: graph catalog, instance registry and the per-tick step.
//!
//! Methods:
//! - new, load_graph / load_graph_json / register_graph, clear_cache
//! - create_instance, instance(_mut), remove_instance
//! - update (step every instance, collect events)

use std::rc::Rc;

use hashbrown::HashMap;
use log::debug;

use crate::config::Config;
use crate::definition::{parse_graph_json, GraphDefinition};
use crate::error::{AnimGraphError, Result};
use crate::events::Outputs;
use crate::graph::{Graph, SharedGraph};
use crate::ids::{IdAllocator, InstId};
use crate::instance::Instance;
use crate::scheduler::{run_tick, Updatable};

#[derive(Debug)]
pub struct Engine {
    cfg: Config,
    ids: IdAllocator,
    graphs: HashMap<String, SharedGraph>,
    instances: Vec<Instance>,

    // Per-tick outputs
    outputs: Outputs,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Engine {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg: cfg.normalized(),
            ids: IdAllocator::new(),
            graphs: HashMap::new(),
            instances: Vec::new(),
            outputs: Outputs::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    // ---------- graphs ----------

    /// Build and cache a graph. A graph already cached under the same name is
    /// returned as is, without rebuilding.
    pub fn load_graph(&mut self, def: &GraphDefinition) -> Result<SharedGraph> {
        if let Some(cached) = self.graphs.get(&def.name) {
            debug!("graph '{}' already loaded", def.name);
            return Ok(Rc::clone(cached));
        }
        let graph = def.build(&self.cfg)?;
        Ok(self.register_graph(graph))
    }

    pub fn load_graph_json(&mut self, json: &str) -> Result<SharedGraph> {
        let def = parse_graph_json(json)?;
        self.load_graph(&def)
    }

    /// Cache a hand-built graph under its name, replacing any earlier entry.
    /// Instances already playing the old graph keep it alive.
    pub fn register_graph(&mut self, graph: Graph) -> SharedGraph {
        let name = graph.name().to_string();
        let shared = graph.into_shared();
        if self.graphs.insert(name.clone(), Rc::clone(&shared)).is_some() {
            debug!("graph '{name}' replaced in catalog");
        }
        shared
    }

    pub fn graph(&self, name: &str) -> Option<SharedGraph> {
        self.graphs.get(name).map(Rc::clone)
    }

    pub fn graph_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.graphs.keys().map(String::as_str)
    }

    /// Forget cached graphs nobody else holds. Returns how many were dropped.
    pub fn clear_cache(&mut self) -> usize {
        let before = self.graphs.len();
        self.graphs.retain(|_, graph| Rc::strong_count(graph) > 1);
        let dropped = before - self.graphs.len();
        if dropped > 0 {
            debug!("cleared {dropped} unused graph(s)");
        }
        dropped
    }

    // ---------- instances ----------

    pub fn create_instance(&mut self, graph_name: &str) -> Result<InstId> {
        let graph = self
            .graph(graph_name)
            .ok_or_else(|| AnimGraphError::UnknownGraph {
                name: graph_name.to_owned(),
            })?;
        self.create_instance_for(graph)
    }

    pub fn create_instance_for(&mut self, graph: SharedGraph) -> Result<InstId> {
        let id = self.ids.alloc_inst();
        self.instances.push(Instance::new(id, graph)?);
        Ok(id)
    }

    pub fn instance(&self, id: InstId) -> Option<&Instance> {
        self.instances.iter().find(|inst| inst.id() == id)
    }

    pub fn instance_mut(&mut self, id: InstId) -> Option<&mut Instance> {
        self.instances.iter_mut().find(|inst| inst.id() == id)
    }

    /// Detach and drop the instance.
    pub fn remove_instance(&mut self, id: InstId) -> Result<()> {
        let index = self
            .instances
            .iter()
            .position(|inst| inst.id() == id)
            .ok_or(AnimGraphError::UnknownInstance { id: id.0 })?;
        self.instances.remove(index);
        Ok(())
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    // ---------- stepping ----------

    /// Step every instance by `dt` in creation order.
    pub fn update(&mut self, dt: f32) -> &Outputs {
        let targets = self
            .instances
            .iter_mut()
            .map(|inst| inst as &mut dyn Updatable);
        run_tick(targets, dt, self.cfg.max_events_per_tick, &mut self.outputs);
        &self.outputs
    }

    /// Outputs of the last update.
    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::Clip;

    fn tiny_graph(name: &str) -> Graph {
        let mut graph = Graph::new(name, 1, false).unwrap();
        let mut clip = Clip::new("idle", 1, 0).unwrap();
        clip.add_key("idle_0", 0.0).unwrap();
        graph.add_clip(clip).unwrap();
        graph
    }

    #[test]
    fn clear_cache_keeps_graphs_in_use() {
        let mut engine = Engine::default();
        engine.register_graph(tiny_graph("kept"));
        engine.register_graph(tiny_graph("dropped"));
        let inst = engine.create_instance("kept").unwrap();

        assert_eq!(engine.clear_cache(), 1);
        assert!(engine.graph("kept").is_some());
        assert!(engine.graph("dropped").is_none());

        engine.remove_instance(inst).unwrap();
        assert_eq!(engine.clear_cache(), 1);
        assert_eq!(engine.graph_names().count(), 0);
    }

    #[test]
    fn unknown_names_and_ids() {
        let mut engine = Engine::default();
        assert!(matches!(
            engine.create_instance("nope"),
            Err(AnimGraphError::UnknownGraph { .. })
        ));
        assert_eq!(
            engine.remove_instance(InstId(9)),
            Err(AnimGraphError::UnknownInstance { id: 9 })
        );
    }
}
