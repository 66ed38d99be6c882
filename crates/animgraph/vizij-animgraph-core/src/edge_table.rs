//! Consumable repeat counters for a graph's edges.
//!
//! A graph owns one shared table. Instances playing a non-static graph clone
//! it so their counters deplete independently.

use serde::{Deserialize, Serialize};

use crate::graph::{Edge, Graph};
use crate::ids::{EdgeId, SlotArena, SlotId};

/// Traversals an edge still allows.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepeatBudget {
    Unlimited,
    Remaining(u32),
}

impl RepeatBudget {
    /// An authored repeat count of 0 means the edge never depletes.
    pub fn from_repeat_count(repeat_count: u32) -> Self {
        if repeat_count == 0 {
            Self::Unlimited
        } else {
            Self::Remaining(repeat_count)
        }
    }

    #[inline]
    pub fn is_usable(self) -> bool {
        !matches!(self, Self::Remaining(0))
    }

    fn consume(&mut self, times: u32) {
        if let Self::Remaining(left) = self {
            *left = left.saturating_sub(times);
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
struct Counter {
    generation: u32,
    budget: RepeatBudget,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EdgeTable {
    counters: Vec<Option<Counter>>,
    revision: u64,
}

impl EdgeTable {
    pub(crate) fn build(edges: &SlotArena<EdgeId, Edge>, revision: u64) -> Self {
        let mut counters = vec![None; edges.slot_count()];
        for (id, edge) in edges.iter() {
            counters[id.index()] = Some(Counter {
                generation: id.generation(),
                budget: RepeatBudget::from_repeat_count(edge.repeat_count),
            });
        }
        Self { counters, revision }
    }

    /// Bring the table up to date with the graph's edges. Edges that survived
    /// keep their counters, new edges start from their authored count.
    pub(crate) fn sync(&mut self, edges: &SlotArena<EdgeId, Edge>, revision: u64) {
        if self.revision == revision {
            return;
        }
        let mut fresh = Self::build(edges, revision);
        for (slot, counter) in fresh.counters.iter_mut().enumerate() {
            let kept = self.counters.get(slot).copied().flatten();
            if let (Some(new), Some(old)) = (counter.as_mut(), kept) {
                if new.generation == old.generation {
                    new.budget = old.budget;
                }
            }
        }
        log::trace!("edge table resynced to revision {revision}");
        *self = fresh;
    }

    fn counter(&self, edge: EdgeId) -> Option<&Counter> {
        self.counters
            .get(edge.index())
            .and_then(Option::as_ref)
            .filter(|counter| counter.generation == edge.generation())
    }

    /// `None` for edges this table does not know about.
    pub fn budget(&self, edge: EdgeId) -> Option<RepeatBudget> {
        self.counter(edge).map(|counter| counter.budget)
    }

    #[inline]
    pub fn is_usable(&self, edge: EdgeId) -> bool {
        self.budget(edge).is_some_and(RepeatBudget::is_usable)
    }

    /// Spend `times` traversals of `edge`.
    pub(crate) fn consume(&mut self, edge: EdgeId, times: u32) {
        if let Some(counter) = self
            .counters
            .get_mut(edge.index())
            .and_then(Option::as_mut)
            .filter(|counter| counter.generation == edge.generation())
        {
            counter.budget.consume(times);
        }
    }

    pub(crate) fn set_repeat_count(&mut self, edge: EdgeId, repeat_count: u32) {
        if let Some(counter) = self
            .counters
            .get_mut(edge.index())
            .and_then(Option::as_mut)
            .filter(|counter| counter.generation == edge.generation())
        {
            counter.budget = RepeatBudget::from_repeat_count(repeat_count);
        }
    }

    /// Restore every counter to the graph's authored repeat counts.
    pub fn reset(&mut self, graph: &Graph) {
        *self = Self::build(graph.edge_arena(), graph.revision());
    }

    /// Graph revision this table was last synchronised with.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }
}
