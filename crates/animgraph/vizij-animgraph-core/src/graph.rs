//! Clip catalog plus the directed transition edges between clips.
//!
//! A graph answers one question per call to [`Graph::compute_anim`]: given the
//! clip an instance is in, where it wants to go and how far its clock ran,
//! which clip does it end up in and at what local time. Callers repeat the
//! call while a transition happened, bounded by [`Graph::hop_limit`].

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use hashbrown::HashMap;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::clip::Clip;
use crate::config::Config;
use crate::edge_table::{EdgeTable, RepeatBudget};
use crate::error::{AnimGraphError, ListKind, Result};
use crate::ids::{ClipId, EdgeId, SlotArena, SlotId};
use crate::names::NameTable;

/// Hard limit of clip slots per graph.
pub const MAX_CLIPS: usize = 128;

/// Graph handle shared by every instance playing it.
pub type SharedGraph = Rc<RefCell<Graph>>;

/// Where an instance wants to go next.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    /// Follow the highest-priority edge out of the current clip.
    #[default]
    Auto,
    Clip(ClipId),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: ClipId,
    pub destination: ClipId,
    /// Higher wins.
    pub priority: i32,
    /// 0 means the edge never depletes.
    pub repeat_count: u32,
    /// Leave the source clip as soon as the edge is selected instead of at its end.
    pub immediate_cut: bool,
    /// Traversing the edge resets the instance target to [`Target::Auto`].
    pub clear_target: bool,
}

impl Edge {
    fn new(source: ClipId, destination: ClipId) -> Self {
        Self {
            source,
            destination,
            priority: 0,
            repeat_count: 0,
            immediate_cut: false,
            clear_target: false,
        }
    }

    #[inline]
    pub fn is_self_edge(&self) -> bool {
        self.source == self.destination
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgePropertyKind {
    Priority,
    RepeatCount,
    ImmediateCut,
    ClearTarget,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeProperty {
    Priority(i32),
    RepeatCount(u32),
    ImmediateCut(bool),
    ClearTarget(bool),
}

impl EdgeProperty {
    pub fn kind(&self) -> EdgePropertyKind {
        match self {
            Self::Priority(_) => EdgePropertyKind::Priority,
            Self::RepeatCount(_) => EdgePropertyKind::RepeatCount,
            Self::ImmediateCut(_) => EdgePropertyKind::ImmediateCut,
            Self::ClearTarget(_) => EdgePropertyKind::ClearTarget,
        }
    }
}

/// What happened at the boundary resolved by one [`Graph::compute_anim`] call.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Transition {
    /// Still inside the clip, or holding a zero-length clip.
    None,
    /// Wrapped back to the start of the same clip `count` times, through a
    /// self edge (`edge`) or plainly because nothing else was usable.
    Loop { count: u32, edge: Option<EdgeId> },
    /// Left the clip through `edge`. `cut` is set for immediate-cut edges,
    /// which fire mid-clip and discard the overshoot.
    Edge { edge: EdgeId, cut: bool },
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub clip: ClipId,
    pub time: f32,
    pub transition: Transition,
    pub clear_target: bool,
}

impl Resolution {
    fn stay(clip: ClipId, time: f32) -> Self {
        Self {
            clip,
            time,
            transition: Transition::None,
            clear_target: false,
        }
    }

    #[inline]
    pub fn is_transition(&self) -> bool {
        !matches!(self.transition, Transition::None)
    }

    #[inline]
    pub fn cut(&self) -> bool {
        matches!(self.transition, Transition::Edge { cut: true, .. })
    }

    /// Edge traversed, if any.
    pub fn edge(&self) -> Option<EdgeId> {
        match self.transition {
            Transition::Edge { edge, .. } => Some(edge),
            Transition::Loop { edge, .. } => edge,
            Transition::None => None,
        }
    }

    /// How many times [`Resolution::edge`] was traversed.
    pub fn traversals(&self) -> u32 {
        match self.transition {
            Transition::Edge { .. } => 1,
            Transition::Loop { count, edge: Some(_) } => count,
            Transition::Loop { edge: None, .. } | Transition::None => 0,
        }
    }
}

/// Whole laps of a `length` clip contained in `time`, and the time left over.
fn whole_laps(time: f32, length: f32) -> (u32, f32) {
    let wrapped = time.rem_euclid(length);
    let laps = ((time - wrapped) / length).round().max(1.0) as u32;
    (laps, wrapped)
}

#[derive(Debug)]
pub struct Graph {
    name: Arc<str>,
    static_links: bool,
    hops_per_clip: usize,
    clips: SlotArena<ClipId, Clip>,
    by_name: HashMap<Arc<str>, ClipId>,
    names: NameTable,
    edges: SlotArena<EdgeId, Edge>,
    /// Outgoing edges, indexed by the source clip's slot.
    outgoing: Vec<Vec<EdgeId>>,
    /// Incoming edges, indexed by the destination clip's slot.
    incoming: Vec<Vec<EdgeId>>,
    shared: EdgeTable,
    references: u32,
    revision: u64,
}

impl Graph {
    /// Empty graph with room for `capacity` clips.
    ///
    /// A static-links graph keeps a single set of repeat counters consumed by
    /// every instance and refuses structural changes while instances are
    /// attached. Otherwise each instance clones the counters.
    pub fn new(name: &str, capacity: usize, static_links: bool) -> Result<Self> {
        if capacity > MAX_CLIPS {
            return Err(AnimGraphError::CapacityTooLarge {
                what: ListKind::Clip,
                requested: capacity,
                limit: MAX_CLIPS,
            });
        }
        let edges = SlotArena::with_capacity(capacity * capacity);
        let shared = EdgeTable::build(&edges, 0);
        Ok(Self {
            name: Arc::from(name),
            static_links,
            hops_per_clip: Config::default().hops_per_clip,
            clips: SlotArena::with_capacity(capacity),
            by_name: HashMap::new(),
            names: NameTable::new(),
            edges,
            outgoing: Vec::new(),
            incoming: Vec::new(),
            shared,
            references: 0,
            revision: 0,
        })
    }

    /// Non-static graph sized and bounded by `cfg`.
    pub fn with_config(name: &str, cfg: &Config) -> Result<Self> {
        let cfg = cfg.clone().normalized();
        let mut graph = Self::new(name, cfg.max_clips, false)?;
        graph.hops_per_clip = cfg.hops_per_clip;
        Ok(graph)
    }

    pub fn with_static_links(mut self, static_links: bool) -> Self {
        self.static_links = static_links;
        self
    }

    pub fn into_shared(self) -> SharedGraph {
        Rc::new(RefCell::new(self))
    }

    #[inline]
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.static_links
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.clips.capacity()
    }

    #[inline]
    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Bumped by every structural change (clips or edges added or removed).
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Transition hops one update may resolve before giving up.
    pub fn hop_limit(&self) -> usize {
        self.clip_count().max(1) * self.hops_per_clip
    }

    // ---------- reference lock ----------

    pub fn add_reference(&mut self) -> u32 {
        self.references = self.references.saturating_add(1);
        self.references
    }

    pub fn remove_reference(&mut self) -> u32 {
        if self.references == 0 {
            debug!("graph '{}': remove_reference without a reference", self.name);
        }
        self.references = self.references.saturating_sub(1);
        self.references
    }

    #[inline]
    pub fn reference_count(&self) -> u32 {
        self.references
    }

    /// Static graphs freeze their structure while instances are attached.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.static_links && self.references > 0
    }

    fn ensure_unlocked(&self) -> Result<()> {
        if self.is_locked() {
            debug!(
                "graph '{}': structural change rejected, {} reference(s)",
                self.name, self.references
            );
            return Err(AnimGraphError::GraphLocked {
                graph: self.name.to_string(),
                references: self.references,
            });
        }
        Ok(())
    }

    fn bump_revision(&mut self) {
        self.revision += 1;
        self.shared.sync(&self.edges, self.revision);
    }

    // ---------- clips ----------

    pub fn add_clip(&mut self, mut clip: Clip) -> Result<ClipId> {
        self.ensure_unlocked()?;
        if self.by_name.contains_key(clip.name().as_ref()) {
            return Err(AnimGraphError::DuplicateClipName {
                graph: self.name.to_string(),
                name: clip.name().to_string(),
            });
        }
        if self.clips.is_full() {
            return Err(AnimGraphError::ClipCapacity {
                graph: self.name.to_string(),
                capacity: self.clips.capacity(),
            });
        }
        clip.intern_names(&mut self.names);
        let name = Arc::clone(clip.name());
        let id = self
            .clips
            .insert(clip)
            .ok_or_else(|| AnimGraphError::ClipCapacity {
                graph: self.name.to_string(),
                capacity: self.clips.capacity(),
            })?;
        if self.outgoing.len() <= id.index() {
            self.outgoing.resize_with(id.index() + 1, Vec::new);
            self.incoming.resize_with(id.index() + 1, Vec::new);
        }
        self.outgoing[id.index()].clear();
        self.incoming[id.index()].clear();
        self.by_name.insert(name, id);
        self.bump_revision();
        Ok(id)
    }

    /// Removes the clip and every edge leading into or out of it.
    pub fn remove_clip(&mut self, id: ClipId) -> Result<Clip> {
        self.ensure_unlocked()?;
        if !self.clips.contains(id) {
            return Err(invalid_clip(id));
        }
        let touching: Vec<EdgeId> = self
            .edges
            .iter()
            .filter(|(_, edge)| edge.source == id || edge.destination == id)
            .map(|(edge_id, _)| edge_id)
            .collect();
        for edge_id in touching {
            self.detach_edge(edge_id);
        }
        let clip = self.clips.remove(id).ok_or_else(|| invalid_clip(id))?;
        self.by_name.remove(clip.name().as_ref());
        let held = std::iter::once(clip.name()).chain(clip.events().iter().map(|e| &e.name));
        self.names.release(held);
        self.bump_revision();
        Ok(clip)
    }

    pub fn remove_all_clips(&mut self) -> Result<()> {
        self.ensure_unlocked()?;
        self.edges.clear();
        self.clips.clear();
        self.by_name.clear();
        self.names.clear();
        for adjacency in self.outgoing.iter_mut().chain(self.incoming.iter_mut()) {
            adjacency.clear();
        }
        self.bump_revision();
        Ok(())
    }

    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.clips.get(id)
    }

    pub fn clip_id_from_name(&self, name: &str) -> Option<ClipId> {
        self.by_name.get(name).copied()
    }

    pub fn clip_ids(&self) -> impl Iterator<Item = ClipId> + '_ {
        self.clips.iter().map(|(id, _)| id)
    }

    pub fn clips(&self) -> impl Iterator<Item = (ClipId, &Clip)> + '_ {
        self.clips.iter()
    }

    /// Length of `clip`, or 0 for an unknown id.
    pub fn clip_length(&self, clip: ClipId) -> f32 {
        self.clips.get(clip).map_or(0.0, Clip::length)
    }

    /// `time` folded back into `[0, length)` of `clip`.
    pub fn wrap_time(&self, clip: ClipId, time: f32) -> f32 {
        let length = self.clip_length(clip);
        if length > 0.0 && time.is_finite() {
            time.rem_euclid(length)
        } else {
            0.0
        }
    }

    // ---------- edges ----------

    /// New edge with priority 0, unlimited repeats and both flags off.
    pub fn add_edge(&mut self, source: ClipId, destination: ClipId) -> Result<EdgeId> {
        self.ensure_unlocked()?;
        let (src_name, dst_name) = match (self.clips.get(source), self.clips.get(destination)) {
            (Some(src), Some(dst)) => (src.name().to_string(), dst.name().to_string()),
            (None, _) => return Err(invalid_clip(source)),
            (_, None) => return Err(invalid_clip(destination)),
        };
        if self.edge(source, destination).is_some() {
            return Err(AnimGraphError::DuplicateEdge {
                source_clip: src_name,
                destination: dst_name,
            });
        }
        let id = self
            .edges
            .insert(Edge::new(source, destination))
            .ok_or_else(|| AnimGraphError::InvalidEdge {
                id: format!("{src_name} -> {dst_name}"),
            })?;
        self.outgoing[source.index()].push(id);
        self.incoming[destination.index()].push(id);
        self.bump_revision();
        Ok(id)
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Result<Edge> {
        self.ensure_unlocked()?;
        let edge = self.detach_edge(id).ok_or_else(|| invalid_edge(id))?;
        self.bump_revision();
        Ok(edge)
    }

    fn detach_edge(&mut self, id: EdgeId) -> Option<Edge> {
        let edge = self.edges.remove(id)?;
        if let Some(out) = self.outgoing.get_mut(edge.source.index()) {
            out.retain(|other| *other != id);
        }
        if let Some(inc) = self.incoming.get_mut(edge.destination.index()) {
            inc.retain(|other| *other != id);
        }
        Some(edge)
    }

    /// Edge linking `source` to `destination`, if any.
    pub fn edge(&self, source: ClipId, destination: ClipId) -> Option<EdgeId> {
        self.outgoing_of(source).find(|id| {
            self.edges
                .get(*id)
                .is_some_and(|edge| edge.destination == destination)
        })
    }

    pub fn edge_info(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &Edge)> + '_ {
        self.edges.iter()
    }

    pub fn outgoing_edges(&self, source: ClipId) -> Vec<EdgeId> {
        self.outgoing_of(source).collect()
    }

    fn outgoing_of(&self, source: ClipId) -> impl Iterator<Item = EdgeId> + '_ {
        let live = self.clips.contains(source);
        self.outgoing
            .get(source.index())
            .filter(|_| live)
            .into_iter()
            .flatten()
            .copied()
    }

    pub(crate) fn edge_arena(&self) -> &SlotArena<EdgeId, Edge> {
        &self.edges
    }

    /// Edge properties are not structural and may change on a locked graph.
    /// Setting the repeat count also refills the shared counter.
    pub fn set_edge_property(&mut self, id: EdgeId, property: EdgeProperty) -> Result<()> {
        let edge = self.edges.get_mut(id).ok_or_else(|| invalid_edge(id))?;
        match property {
            EdgeProperty::Priority(priority) => edge.priority = priority,
            EdgeProperty::ImmediateCut(flag) => edge.immediate_cut = flag,
            EdgeProperty::ClearTarget(flag) => edge.clear_target = flag,
            EdgeProperty::RepeatCount(count) => {
                edge.repeat_count = count;
                self.shared.set_repeat_count(id, count);
            }
        }
        Ok(())
    }

    pub fn edge_property(&self, id: EdgeId, kind: EdgePropertyKind) -> Result<EdgeProperty> {
        let edge = self.edges.get(id).ok_or_else(|| invalid_edge(id))?;
        Ok(match kind {
            EdgePropertyKind::Priority => EdgeProperty::Priority(edge.priority),
            EdgePropertyKind::RepeatCount => EdgeProperty::RepeatCount(edge.repeat_count),
            EdgePropertyKind::ImmediateCut => EdgeProperty::ImmediateCut(edge.immediate_cut),
            EdgePropertyKind::ClearTarget => EdgeProperty::ClearTarget(edge.clear_target),
        })
    }

    // ---------- counters ----------

    /// Fresh copy of the authored repeat counters for one instance.
    pub fn clone_edge_table(&self) -> EdgeTable {
        EdgeTable::build(&self.edges, self.revision)
    }

    /// Counters consumed by every instance of a static graph.
    pub fn shared_edge_table(&self) -> &EdgeTable {
        &self.shared
    }

    pub fn reset_counters(&mut self) {
        self.shared = EdgeTable::build(&self.edges, self.revision);
    }

    // ---------- resolution ----------

    fn check_query(&self, source: ClipId, target: Target, time: f32) -> Result<()> {
        if !self.clips.contains(source) {
            return Err(invalid_clip(source));
        }
        if let Target::Clip(clip) = target {
            if !self.clips.contains(clip) {
                return Err(invalid_clip(clip));
            }
        }
        if !time.is_finite() || time < 0.0 {
            return Err(AnimGraphError::InvalidTime { time });
        }
        Ok(())
    }

    /// Resolve one hop from `source` at local `time` towards `target`.
    ///
    /// Static graphs consume their shared counters and ignore `table`;
    /// non-static graphs need the caller's cloned table, which is brought up
    /// to date with the graph's revision first.
    pub fn compute_anim(
        &mut self,
        table: Option<&mut EdgeTable>,
        source: ClipId,
        target: Target,
        time: f32,
    ) -> Result<Resolution> {
        self.check_query(source, target, time)?;
        let resolution = if self.static_links {
            let resolution = self.resolve(&self.shared, source, target, time);
            if let Some(edge) = resolution.edge() {
                self.shared.consume(edge, resolution.traversals());
            }
            resolution
        } else {
            let table = table.ok_or_else(|| AnimGraphError::MissingEdgeTable {
                graph: self.name.to_string(),
            })?;
            table.sync(&self.edges, self.revision);
            let resolution = self.resolve(table, source, target, time);
            if let Some(edge) = resolution.edge() {
                table.consume(edge, resolution.traversals());
            }
            resolution
        };
        trace!(
            "graph '{}': {source} @ {time} -> {} @ {} ({:?})",
            self.name,
            resolution.clip,
            resolution.time,
            resolution.transition
        );
        Ok(resolution)
    }

    /// Clip the next transition out of `source` would lead to, without
    /// consuming anything. `None` when no usable edge exists.
    pub fn find_next_anim(&self, source: ClipId, target: Target) -> Result<Option<ClipId>> {
        self.check_query(source, target, 0.0)?;
        Ok(self
            .select_edge(&self.shared, source, target)
            .and_then(|id| self.edges.get(id))
            .map(|edge| edge.destination))
    }

    fn resolve(&self, table: &EdgeTable, source: ClipId, target: Target, time: f32) -> Resolution {
        let length = self.clip_length(source);
        if target == Target::Clip(source) && time < length {
            return Resolution::stay(source, time);
        }

        let selected = self
            .select_edge(table, source, target)
            .and_then(|id| self.edges.get(id).map(|edge| (id, edge)));

        if let Some((id, edge)) = selected {
            if edge.immediate_cut && !edge.is_self_edge() {
                return Resolution {
                    clip: edge.destination,
                    time: 0.0,
                    transition: Transition::Edge { edge: id, cut: true },
                    clear_target: edge.clear_target,
                };
            }
        }

        if length > 0.0 && time < length {
            return Resolution::stay(source, time);
        }

        match selected {
            Some((id, edge)) if !edge.is_self_edge() => Resolution {
                clip: edge.destination,
                time: (time - length).max(0.0),
                transition: Transition::Edge {
                    edge: id,
                    cut: false,
                },
                clear_target: edge.clear_target,
            },
            Some((id, edge)) if length > 0.0 => {
                // Consecutive laps through the self edge fold into one hop,
                // up to what its counter still allows.
                let (laps, wrapped) = whole_laps(time, length);
                let (count, time) = match table.budget(id) {
                    Some(RepeatBudget::Remaining(left)) if left < laps => {
                        (left, (time - left as f32 * length).max(0.0))
                    }
                    _ => (laps, wrapped),
                };
                Resolution {
                    clip: source,
                    time,
                    transition: Transition::Loop {
                        count,
                        edge: Some(id),
                    },
                    clear_target: edge.clear_target,
                }
            }
            _ if length > 0.0 => {
                let (loops, wrapped) = whole_laps(time, length);
                Resolution {
                    clip: source,
                    time: wrapped,
                    transition: Transition::Loop {
                        count: loops,
                        edge: None,
                    },
                    clear_target: false,
                }
            }
            _ => Resolution::stay(source, 0.0),
        }
    }

    fn usable_edges<'a>(
        &'a self,
        table: &'a EdgeTable,
        source: ClipId,
    ) -> impl Iterator<Item = EdgeId> + 'a {
        self.outgoing_of(source)
            .filter(move |id| table.is_usable(*id))
    }

    fn select_edge(&self, table: &EdgeTable, source: ClipId, target: Target) -> Option<EdgeId> {
        let usable = || self.usable_edges(table, source);
        match target {
            Target::Auto => self.highest_priority(usable()),
            Target::Clip(clip) if clip == source => usable().find(|id| {
                self.edges
                    .get(*id)
                    .is_some_and(|edge| edge.destination == source)
            }),
            Target::Clip(clip) => {
                // A direct edge wins outright. Otherwise the first hop's
                // priority decides and path length only breaks ties. Self
                // edges never get closer to another clip.
                let hops = self.hops_to(table, clip);
                let routed = usable()
                    .filter_map(|id| {
                        let edge = self.edges.get(id)?;
                        if edge.is_self_edge() {
                            return None;
                        }
                        let remaining = hops.get(edge.destination.index()).copied().flatten()?;
                        Some((id, remaining, edge.priority))
                    })
                    .min_by(|a, b| {
                        (a.1 != 0)
                            .cmp(&(b.1 != 0))
                            .then_with(|| b.2.cmp(&a.2))
                            .then_with(|| a.1.cmp(&b.1))
                            .then_with(|| a.0.cmp(&b.0))
                    })
                    .map(|(id, _, _)| id);
                routed.or_else(|| {
                    debug!(
                        "graph '{}': {clip} unreachable from {source}, following priority",
                        self.name
                    );
                    self.highest_priority(usable())
                })
            }
        }
    }

    fn highest_priority(&self, candidates: impl Iterator<Item = EdgeId>) -> Option<EdgeId> {
        candidates
            .filter_map(|id| self.edges.get(id).map(|edge| (id, edge.priority)))
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
            .map(|(id, _)| id)
    }

    /// Usable-edge distance from every clip slot to `target` (0 for `target`).
    fn hops_to(&self, table: &EdgeTable, target: ClipId) -> Vec<Option<u32>> {
        let mut hops = vec![None; self.clips.slot_count()];
        if target.index() >= hops.len() {
            return hops;
        }
        hops[target.index()] = Some(0u32);
        let mut queue = VecDeque::from([(target, 0u32)]);
        while let Some((clip, distance)) = queue.pop_front() {
            let Some(incoming) = self.incoming.get(clip.index()) else {
                continue;
            };
            for &id in incoming {
                let Some(edge) = self.edges.get(id) else {
                    continue;
                };
                if !table.is_usable(id) {
                    continue;
                }
                let slot = &mut hops[edge.source.index()];
                if slot.is_none() {
                    *slot = Some(distance + 1);
                    queue.push_back((edge.source, distance + 1));
                }
            }
        }
        hops
    }
}

fn invalid_clip(id: ClipId) -> AnimGraphError {
    AnimGraphError::InvalidClip { id: id.to_string() }
}

fn invalid_edge(id: EdgeId) -> AnimGraphError {
    AnimGraphError::InvalidEdge { id: id.to_string() }
}
