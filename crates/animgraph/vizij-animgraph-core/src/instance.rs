//! Per-entity playback cursor over a shared graph.

use std::rc::Rc;
use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::clip::{Clip, PayloadHandle};
use crate::edge_table::EdgeTable;
use crate::error::{AnimGraphError, Result};
use crate::events::{AnimEvent, AnimEventKind};
use crate::graph::{SharedGraph, Target, Transition};
use crate::ids::{ClipId, InstId};

/// Loop notifications raised one by one for a single hop; wraps beyond this
/// are folded into one final LOOP carrying the total.
const MAX_LOOP_EVENTS_PER_HOP: u32 = 64;

/// Playback state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackState {
    /// No clip has been set yet.
    Stopped,
    Playing,
    Paused,
}

impl PlaybackState {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Playing => "playing",
            Self::Paused => "paused",
        }
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }
}

/// Cursor playing one [`SharedGraph`].
///
/// Attaching adds a reference to the graph (locking a static graph against
/// structural changes); dropping the instance removes it again.
#[derive(Debug)]
pub struct Instance {
    id: InstId,
    graph: SharedGraph,
    graph_name: Arc<str>,
    /// Private counters; `None` for static graphs.
    table: Option<EdgeTable>,
    current: Option<ClipId>,
    target: Target,
    time: f32,
    frequency: f32,
    paused: bool,
    loop_count: u32,
    reported_key: Option<usize>,
    /// Events stamped exactly at the start of the current clip are still due.
    fresh: bool,
    pending: Vec<AnimEvent>,
}

fn push_crossed(
    out: &mut Vec<AnimEvent>,
    instance: InstId,
    clip: &Clip,
    from: f32,
    to: f32,
    include_start: bool,
) {
    for event in clip.events_in(from, to, include_start) {
        out.push(AnimEvent::new(
            instance,
            clip.name(),
            AnimEventKind::Custom {
                name: Arc::clone(&event.name),
                value: event.value,
                time: event.time,
            },
        ));
    }
}

impl Instance {
    pub fn new(id: InstId, graph: SharedGraph) -> Result<Self> {
        let (graph_name, table) = {
            let mut attached = graph.try_borrow_mut().map_err(|_| AnimGraphError::GraphBusy {
                graph: String::from("shared graph"),
            })?;
            attached.add_reference();
            let table = (!attached.is_static()).then(|| attached.clone_edge_table());
            (Arc::clone(attached.name()), table)
        };
        Ok(Self {
            id,
            graph,
            graph_name,
            table,
            current: None,
            target: Target::Auto,
            time: 0.0,
            frequency: 1.0,
            paused: false,
            loop_count: 0,
            reported_key: None,
            fresh: false,
            pending: Vec::new(),
        })
    }

    fn busy(&self) -> AnimGraphError {
        AnimGraphError::GraphBusy {
            graph: self.graph_name.to_string(),
        }
    }

    #[inline]
    pub fn id(&self) -> InstId {
        self.id
    }

    pub fn graph(&self) -> &SharedGraph {
        &self.graph
    }

    /// Private counters of a non-static graph.
    pub fn edge_table(&self) -> Option<&EdgeTable> {
        self.table.as_ref()
    }

    /// Refill the private counters from the graph's authored repeat counts.
    pub fn reset_edge_table(&mut self) -> Result<()> {
        let shared = Rc::clone(&self.graph);
        let graph = shared.try_borrow().map_err(|_| self.busy())?;
        if let Some(table) = self.table.as_mut() {
            table.reset(&graph);
        }
        Ok(())
    }

    pub fn state(&self) -> PlaybackState {
        match (self.current, self.paused) {
            (None, _) => PlaybackState::Stopped,
            (Some(_), true) => PlaybackState::Paused,
            (Some(_), false) => PlaybackState::Playing,
        }
    }

    // ---------- clips ----------

    /// Jump to `clip` at time 0. A clip that was playing is reported as cut.
    pub fn set_current_anim(&mut self, clip: ClipId) -> Result<()> {
        let shared = Rc::clone(&self.graph);
        let graph = shared.try_borrow().map_err(|_| self.busy())?;
        let next = graph
            .clip(clip)
            .ok_or_else(|| AnimGraphError::InvalidClip { id: clip.to_string() })?;
        if let Some(old) = self.current.and_then(|id| graph.clip(id)) {
            self.pending.push(AnimEvent::new(
                self.id,
                old.name(),
                AnimEventKind::Cut { time: self.time },
            ));
        }
        self.pending
            .push(AnimEvent::new(self.id, next.name(), AnimEventKind::Start));
        self.current = Some(clip);
        self.time = 0.0;
        self.loop_count = 0;
        self.target = Target::Auto;
        self.reported_key = None;
        self.fresh = true;
        Ok(())
    }

    pub fn set_current_anim_from_name(&mut self, name: &str) -> Result<()> {
        let clip = self.clip_id_from_name(name)?;
        self.set_current_anim(clip)
    }

    #[inline]
    pub fn current_anim(&self) -> Option<ClipId> {
        self.current
    }

    pub fn current_anim_name(&self) -> Option<Arc<str>> {
        self.current.and_then(|clip| self.clip_name(clip))
    }

    /// Stored only; it steers the next boundary resolution.
    pub fn set_target_anim(&mut self, target: Target) -> Result<()> {
        if let Target::Clip(clip) = target {
            let graph = self.graph.try_borrow().map_err(|_| self.busy())?;
            if graph.clip(clip).is_none() {
                return Err(AnimGraphError::InvalidClip { id: clip.to_string() });
            }
        }
        self.target = target;
        Ok(())
    }

    /// `None` selects [`Target::Auto`].
    pub fn set_target_anim_from_name(&mut self, name: Option<&str>) -> Result<()> {
        let target = match name {
            Some(name) => Target::Clip(self.clip_id_from_name(name)?),
            None => Target::Auto,
        };
        self.set_target_anim(target)
    }

    #[inline]
    pub fn target_anim(&self) -> Target {
        self.target
    }

    pub fn target_anim_name(&self) -> Option<Arc<str>> {
        match self.target {
            Target::Clip(clip) => self.clip_name(clip),
            Target::Auto => None,
        }
    }

    /// Clip the next transition would lead to, judged on the graph's shared counters.
    pub fn next_anim(&self) -> Result<Option<ClipId>> {
        let current = self.current.ok_or(AnimGraphError::NoCurrentClip)?;
        let graph = self.graph.try_borrow().map_err(|_| self.busy())?;
        graph.find_next_anim(current, self.target)
    }

    fn clip_id_from_name(&self, name: &str) -> Result<ClipId> {
        let graph = self.graph.try_borrow().map_err(|_| self.busy())?;
        graph
            .clip_id_from_name(name)
            .ok_or_else(|| AnimGraphError::UnknownClipName {
                name: name.to_owned(),
            })
    }

    fn clip_name(&self, clip: ClipId) -> Option<Arc<str>> {
        let graph = self.graph.try_borrow().ok()?;
        graph.clip(clip).map(|c| Arc::clone(c.name()))
    }

    // ---------- clock ----------

    /// Applies while paused too.
    pub fn set_time(&mut self, time: f32) -> Result<()> {
        if !time.is_finite() || time < 0.0 {
            return Err(AnimGraphError::InvalidTime { time });
        }
        self.time = time;
        self.fresh &= time == 0.0;
        Ok(())
    }

    #[inline]
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Zero freezes the clock while staying in the playing state.
    pub fn set_frequency(&mut self, frequency: f32) -> Result<()> {
        if !frequency.is_finite() || frequency < 0.0 {
            debug!("instance {}: rejected frequency {frequency}", self.id);
            return Err(AnimGraphError::InvalidFrequency { frequency });
        }
        self.frequency = frequency;
        Ok(())
    }

    #[inline]
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn pause(&mut self, paused: bool) {
        self.paused = paused;
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Wraps of the current clip since it became current.
    #[inline]
    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }

    pub fn current_key(&self) -> Option<usize> {
        let graph = self.graph.try_borrow().ok()?;
        graph.clip(self.current?)?.key_index_for_time(self.time)
    }

    pub fn current_key_payload(&self) -> Option<PayloadHandle> {
        let graph = self.graph.try_borrow().ok()?;
        let clip = graph.clip(self.current?)?;
        let index = clip.key_index_for_time(self.time)?;
        clip.key(index).map(|key| key.payload.clone())
    }

    // ---------- stepping ----------

    /// Advance the clock by `dt * frequency` and resolve every boundary the
    /// new time crosses. Notifications are queued in crossing order.
    pub fn update(&mut self, dt: f32) -> Result<()> {
        if self.paused {
            return Err(AnimGraphError::Paused);
        }
        let Some(start) = self.current else {
            return Err(AnimGraphError::NoCurrentClip);
        };
        if !dt.is_finite() || dt < 0.0 {
            return Err(AnimGraphError::InvalidTime { time: dt });
        }

        let shared = Rc::clone(&self.graph);
        let mut graph = shared.try_borrow_mut().map_err(|_| self.busy())?;
        if graph.clip(start).is_none() {
            return Err(AnimGraphError::InvalidClip { id: start.to_string() });
        }
        if let Target::Clip(target) = self.target {
            if graph.clip(target).is_none() {
                debug!("instance {}: target {target} vanished, using auto", self.id);
                self.target = Target::Auto;
            }
        }

        let hop_limit = graph.hop_limit();
        let mut clip_id = start;
        let mut time = self.time + dt * self.frequency;
        let mut from = self.time;
        let mut include_start = self.fresh;
        let mut clip_changed = false;
        let mut hops = 0usize;

        loop {
            if hops >= hop_limit {
                warn!(
                    "instance {}: {hop_limit} hops in one update on graph '{}', holding {clip_id}",
                    self.id,
                    graph.name()
                );
                time = graph.wrap_time(clip_id, time);
                break;
            }
            hops += 1;

            let resolution = graph.compute_anim(self.table.as_mut(), clip_id, self.target, time)?;
            if resolution.clear_target {
                self.target = Target::Auto;
            }
            let Some(clip) = graph.clip(clip_id) else {
                break;
            };

            match resolution.transition {
                Transition::None => {
                    push_crossed(&mut self.pending, self.id, clip, from, resolution.time, include_start);
                    time = resolution.time;
                    break;
                }
                Transition::Loop { count, .. } => {
                    let length = clip.length();
                    push_crossed(&mut self.pending, self.id, clip, from, length, include_start);
                    let announced = count.min(MAX_LOOP_EVENTS_PER_HOP);
                    for wrap in 0..announced {
                        if wrap > 0 {
                            push_crossed(&mut self.pending, self.id, clip, 0.0, length, true);
                        }
                        self.loop_count = self.loop_count.saturating_add(1);
                        self.pending.push(AnimEvent::new(
                            self.id,
                            clip.name(),
                            AnimEventKind::Loop {
                                count: self.loop_count,
                            },
                        ));
                    }
                    if count > announced {
                        self.loop_count = self.loop_count.saturating_add(count - announced);
                        debug!(
                            "instance {}: folded {} wraps of '{}'",
                            self.id,
                            count - announced,
                            clip.name()
                        );
                        self.pending.push(AnimEvent::new(
                            self.id,
                            clip.name(),
                            AnimEventKind::Loop {
                                count: self.loop_count,
                            },
                        ));
                    }
                }
                Transition::Edge { cut, .. } => {
                    let end = if cut { time.min(clip.length()) } else { clip.length() };
                    push_crossed(&mut self.pending, self.id, clip, from, end, include_start);
                    let kind = if cut {
                        AnimEventKind::Cut { time: end }
                    } else {
                        AnimEventKind::Stop
                    };
                    self.pending.push(AnimEvent::new(self.id, clip.name(), kind));
                    if let Some(next) = graph.clip(resolution.clip) {
                        self.pending
                            .push(AnimEvent::new(self.id, next.name(), AnimEventKind::Start));
                    }
                    clip_id = resolution.clip;
                    self.loop_count = 0;
                    clip_changed = true;
                }
            }
            from = 0.0;
            include_start = true;
            time = resolution.time;
        }

        self.current = Some(clip_id);
        self.time = time;
        self.fresh = false;

        if let Some(clip) = graph.clip(clip_id) {
            let key = clip.key_index_for_time(time);
            if key != self.reported_key || clip_changed {
                self.reported_key = key;
                if let Some(key) = key {
                    self.pending
                        .push(AnimEvent::new(self.id, clip.name(), AnimEventKind::Update { key }));
                }
            }
        }
        Ok(())
    }

    /// Queued notifications, oldest first.
    pub fn pending_events(&self) -> &[AnimEvent] {
        &self.pending
    }

    pub fn drain_events(&mut self) -> Vec<AnimEvent> {
        std::mem::take(&mut self.pending)
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        match self.graph.try_borrow_mut() {
            Ok(mut graph) => {
                graph.remove_reference();
            }
            Err(_) => warn!(
                "instance {}: graph '{}' busy on drop, reference kept",
                self.id, self.graph_name
            ),
        }
    }
}
