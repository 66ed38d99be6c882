//! Tick scheduling: the [`Updatable`] seam and the pass that steps every
//! instance once and gathers its events.

use log::{debug, warn};

use crate::error::Result;
use crate::events::{AnimEvent, Outputs, UpdateFailure};
use crate::ids::InstId;
use crate::instance::Instance;

/// Anything the engine steps once per tick.
pub trait Updatable {
    fn id(&self) -> InstId;

    fn update(&mut self, dt: f32) -> Result<()>;

    /// Move queued notifications into `out`, oldest first.
    fn drain_events(&mut self, out: &mut Vec<AnimEvent>);
}

impl Updatable for Instance {
    fn id(&self) -> InstId {
        Instance::id(self)
    }

    fn update(&mut self, dt: f32) -> Result<()> {
        Instance::update(self, dt)
    }

    fn drain_events(&mut self, out: &mut Vec<AnimEvent>) {
        out.append(&mut Instance::drain_events(self));
    }
}

/// Step every target in order and gather what they raised into `outputs`.
///
/// Idle targets (paused, or nothing to play) are skipped; other failures are
/// recorded and do not stop the pass. Events beyond `max_events` are dropped.
pub fn run_tick<'a, I>(targets: I, dt: f32, max_events: usize, outputs: &mut Outputs)
where
    I: IntoIterator<Item = &'a mut dyn Updatable>,
{
    outputs.clear();
    let mut dropped = 0usize;
    let mut scratch = Vec::new();
    for target in targets {
        match target.update(dt) {
            Ok(()) => {}
            Err(err) if err.is_idle() => debug!("{}: skipped ({err})", target.id()),
            Err(err) => {
                warn!("{}: update failed [{}]: {err}", target.id(), err.category());
                outputs.failures.push(UpdateFailure {
                    instance: target.id(),
                    error: err,
                });
            }
        }
        target.drain_events(&mut scratch);
        let room = max_events.saturating_sub(outputs.events.len());
        dropped += scratch.len().saturating_sub(room);
        outputs
            .events
            .extend(scratch.drain(..).take(room));
    }
    if dropped > 0 {
        warn!("dropped {dropped} events over the per-tick limit of {max_events}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnimGraphError;
    use crate::events::AnimEventKind;
    use std::sync::Arc;

    struct Ticker {
        id: InstId,
        burst: usize,
        fail: Option<AnimGraphError>,
        queued: Vec<AnimEvent>,
    }

    impl Updatable for Ticker {
        fn id(&self) -> InstId {
            self.id
        }

        fn update(&mut self, _dt: f32) -> Result<()> {
            let clip: Arc<str> = Arc::from("tick");
            for _ in 0..self.burst {
                self.queued
                    .push(AnimEvent::new(self.id, &clip, AnimEventKind::Start));
            }
            match &self.fail {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            }
        }

        fn drain_events(&mut self, out: &mut Vec<AnimEvent>) {
            out.append(&mut self.queued);
        }
    }

    fn ticker(id: u32, burst: usize, fail: Option<AnimGraphError>) -> Ticker {
        Ticker {
            id: InstId(id),
            burst,
            fail,
            queued: Vec::new(),
        }
    }

    #[test]
    fn idle_targets_are_not_failures() {
        let mut a = ticker(0, 1, Some(AnimGraphError::Paused));
        let mut b = ticker(1, 1, Some(AnimGraphError::InvalidTime { time: -1.0 }));
        let mut out = Outputs::default();
        let targets = vec![&mut a as &mut dyn Updatable, &mut b];
        run_tick(targets, 0.1, 16, &mut out);
        assert_eq!(out.events.len(), 2);
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].instance, InstId(1));
    }

    #[test]
    fn events_are_capped_in_registration_order() {
        let mut a = ticker(0, 3, None);
        let mut b = ticker(1, 3, None);
        let mut out = Outputs::default();
        let targets = vec![&mut a as &mut dyn Updatable, &mut b];
        run_tick(targets, 0.1, 4, &mut out);
        let owners: Vec<_> = out.events.iter().map(|e| e.instance.0).collect();
        assert_eq!(owners, vec![0, 0, 0, 1]);
        assert!(b.queued.is_empty());
    }
}
