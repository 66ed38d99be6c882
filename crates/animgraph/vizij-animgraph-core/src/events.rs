//! Notifications raised while instances play.
//!
//! Every event names the instance and the clip it concerns. The engine
//! gathers them per tick into [`Outputs`]; adapters forward them to whatever
//! bus the host uses.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::AnimGraphError;
use crate::ids::InstId;

/// What happened to the clip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum AnimEventKind {
    /// The clip became current.
    Start,
    /// The clip ended and an edge led elsewhere.
    Stop,
    /// The clip was left before its end, `time` into it.
    Cut { time: f32 },
    /// The clip wrapped around; `count` is the running loop count.
    Loop { count: u32 },
    /// The displayed key changed.
    Update { key: usize },
    /// A custom event timestamp was crossed.
    Custom {
        name: Arc<str>,
        value: f32,
        time: f32,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimEvent {
    pub instance: InstId,
    pub clip: Arc<str>,
    pub kind: AnimEventKind,
}

impl AnimEvent {
    pub fn new(instance: InstId, clip: &Arc<str>, kind: AnimEventKind) -> Self {
        Self {
            instance,
            clip: Arc::clone(clip),
            kind,
        }
    }
}

/// An update target that failed for a reason other than being idle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateFailure {
    pub instance: InstId,
    pub error: AnimGraphError,
}

/// Outputs returned by Engine::update().
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Outputs {
    #[serde(default)]
    pub events: Vec<AnimEvent>,
    #[serde(default)]
    pub failures: Vec<UpdateFailure>,
}

impl Outputs {
    #[inline]
    pub fn clear(&mut self) {
        self.events.clear();
        self.failures.clear();
    }

    #[inline]
    pub fn push_event(&mut self, event: AnimEvent) {
        self.events.push(event);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.failures.is_empty()
    }

    /// Events raised by one instance, in emission order.
    pub fn events_for(&self, instance: InstId) -> impl Iterator<Item = &AnimEvent> + '_ {
        self.events.iter().filter(move |e| e.instance == instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_clip_names() {
        let clip: Arc<str> = Arc::from("run");
        let event = AnimEvent::new(
            InstId(2),
            &clip,
            AnimEventKind::Custom {
                name: Arc::from("hit"),
                value: 1.5,
                time: 0.5,
            },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["clip"], "run");
        assert_eq!(json["kind"]["Custom"]["name"], "hit");

        let back: AnimEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn outputs_filter_by_instance() {
        let clip: Arc<str> = Arc::from("idle");
        let mut out = Outputs::default();
        out.push_event(AnimEvent::new(InstId(0), &clip, AnimEventKind::Start));
        out.push_event(AnimEvent::new(InstId(1), &clip, AnimEventKind::Start));
        assert_eq!(out.events_for(InstId(1)).count(), 1);
        out.clear();
        assert!(out.is_empty());
    }
}
