//! A single clip: a timestamped key list plus a timestamped custom-event list.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{AnimGraphError, ListKind, Result};

/// Hard limit for both the key and the event list of a clip.
pub const MAX_KEYS: usize = 65535;
pub const MAX_EVENTS: usize = 65535;

/// Opaque reference to whatever a key displays (a frame, a graphic name...).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayloadHandle(pub String);

impl PayloadHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PayloadHandle {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for PayloadHandle {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyRef {
    pub payload: PayloadHandle,
    pub time: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomEvent {
    pub name: Arc<str>,
    pub time: f32,
    pub value: f32,
}

/// Free-form flag word carried with a clip for downstream consumers.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClipFlags(pub u32);

impl ClipFlags {
    pub const NONE: ClipFlags = ClipFlags(0);

    #[inline]
    pub fn contains(self, other: ClipFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: ClipFlags) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: ClipFlags) {
        self.0 &= !other.0;
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Clip {
    name: Arc<str>,
    flags: ClipFlags,
    keys: Vec<KeyRef>,
    key_capacity: usize,
    events: Vec<CustomEvent>,
    event_capacity: usize,
    length: f32,
}

fn check_time(time: f32) -> Result<()> {
    if time.is_finite() && time >= 0.0 {
        Ok(())
    } else {
        Err(AnimGraphError::InvalidTime { time })
    }
}

impl Clip {
    /// Both capacities are fixed for the clip's lifetime.
    pub fn new(name: &str, key_capacity: usize, event_capacity: usize) -> Result<Self> {
        if key_capacity > MAX_KEYS {
            return Err(AnimGraphError::CapacityTooLarge {
                what: ListKind::Key,
                requested: key_capacity,
                limit: MAX_KEYS,
            });
        }
        if event_capacity > MAX_EVENTS {
            return Err(AnimGraphError::CapacityTooLarge {
                what: ListKind::Event,
                requested: event_capacity,
                limit: MAX_EVENTS,
            });
        }
        Ok(Self {
            name: Arc::from(name),
            flags: ClipFlags::NONE,
            keys: Vec::with_capacity(key_capacity),
            key_capacity,
            events: Vec::with_capacity(event_capacity),
            event_capacity,
            length: 0.0,
        })
    }

    pub fn with_flags(mut self, flags: ClipFlags) -> Self {
        self.flags = flags;
        self
    }

    #[inline]
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    #[inline]
    pub fn flags(&self) -> ClipFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: ClipFlags) {
        self.flags = flags;
    }

    /// Duration of the timeline: the last key's timestamp. Events never extend it.
    #[inline]
    pub fn length(&self) -> f32 {
        self.length
    }

    #[inline]
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn key_capacity(&self) -> usize {
        self.key_capacity
    }

    #[inline]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn event_capacity(&self) -> usize {
        self.event_capacity
    }

    pub fn keys(&self) -> &[KeyRef] {
        &self.keys
    }

    pub fn key(&self, index: usize) -> Option<&KeyRef> {
        self.keys.get(index)
    }

    pub fn events(&self) -> &[CustomEvent] {
        &self.events
    }

    /// Append a key. Keys may share a timestamp but never go backwards.
    pub fn add_key(&mut self, payload: impl Into<PayloadHandle>, time: f32) -> Result<usize> {
        check_time(time)?;
        if self.keys.len() >= self.key_capacity {
            return Err(AnimGraphError::KeyCapacity {
                clip: self.name.to_string(),
                capacity: self.key_capacity,
            });
        }
        if let Some(last) = self.keys.last() {
            if time < last.time {
                return Err(AnimGraphError::OutOfOrderTimestamp {
                    what: ListKind::Key,
                    time,
                    last: last.time,
                });
            }
        }
        self.keys.push(KeyRef {
            payload: payload.into(),
            time,
        });
        self.length = time;
        Ok(self.keys.len() - 1)
    }

    /// Append a custom event. Event timestamps are strictly increasing.
    pub fn add_event(&mut self, name: &str, time: f32, value: f32) -> Result<usize> {
        check_time(time)?;
        if self.events.len() >= self.event_capacity {
            return Err(AnimGraphError::EventCapacity {
                clip: self.name.to_string(),
                capacity: self.event_capacity,
            });
        }
        if let Some(last) = self.events.last() {
            if time <= last.time {
                return Err(AnimGraphError::OutOfOrderTimestamp {
                    what: ListKind::Event,
                    time,
                    last: last.time,
                });
            }
        }
        self.events.push(CustomEvent {
            name: Arc::from(name),
            time,
            value,
        });
        Ok(self.events.len() - 1)
    }

    pub fn remove_last_key(&mut self) -> Result<KeyRef> {
        let key = self.keys.pop().ok_or_else(|| AnimGraphError::EmptyList {
            clip: self.name.to_string(),
            what: ListKind::Key,
        })?;
        self.recompute_length();
        Ok(key)
    }

    pub fn remove_last_event(&mut self) -> Result<CustomEvent> {
        self.events.pop().ok_or_else(|| AnimGraphError::EmptyList {
            clip: self.name.to_string(),
            what: ListKind::Event,
        })
    }

    pub fn remove_all_keys(&mut self) {
        self.keys.clear();
        self.recompute_length();
    }

    pub fn remove_all_events(&mut self) {
        self.events.clear();
    }

    fn recompute_length(&mut self) {
        self.length = self.keys.last().map_or(0.0, |k| k.time);
    }

    /// Index of the last key whose timestamp is `<= time`.
    pub fn key_index_for_time(&self, time: f32) -> Option<usize> {
        self.keys
            .partition_point(|key| key.time <= time)
            .checked_sub(1)
    }

    pub fn next_event_after(&self, time: f32) -> Option<&CustomEvent> {
        let index = self.events.partition_point(|event| event.time <= time);
        self.events.get(index)
    }

    /// Events with `from < time <= to` (`from <= time` when `include_start`),
    /// in timeline order.
    pub fn events_in(&self, from: f32, to: f32, include_start: bool) -> &[CustomEvent] {
        let start = if include_start {
            self.events.partition_point(|event| event.time < from)
        } else {
            self.events.partition_point(|event| event.time <= from)
        };
        let end = self.events.partition_point(|event| event.time <= to);
        if start >= end {
            &[]
        } else {
            &self.events[start..end]
        }
    }

    pub(crate) fn intern_names(&mut self, table: &mut crate::names::NameTable) {
        table.adopt(&mut self.name);
        for event in &mut self.events {
            table.adopt(&mut event.name);
        }
    }
}
