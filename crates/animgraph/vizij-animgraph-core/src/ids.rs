//! Identifiers, allocators and the generational slot arena backing graphs.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Typed handle into a [`SlotArena`]: a slot index plus the generation the slot
/// had when the value was inserted.
pub trait SlotId: Copy + Eq {
    fn from_parts(index: u32, generation: u32) -> Self;
    fn index(self) -> usize;
    fn generation(self) -> u32;
}

macro_rules! slot_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name {
            index: u32,
            generation: u32,
        }

        impl SlotId for $name {
            #[inline]
            fn from_parts(index: u32, generation: u32) -> Self {
                Self { index, generation }
            }

            #[inline]
            fn index(self) -> usize {
                self.index as usize
            }

            #[inline]
            fn generation(self) -> u32 {
                self.generation
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}v{}"), self.index, self.generation)
            }
        }
    };
}

slot_id!(
    /// Clip handle. Stale after the clip is removed from its graph.
    ClipId,
    "clip"
);

slot_id!(
    /// Edge handle. Stale after the edge (or one of its clips) is removed.
    EdgeId,
    "edge"
);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct InstId(pub u32);

impl fmt::Display for InstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "inst#{}", self.0)
    }
}

/// Monotonic allocator for InstId.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_inst: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_inst(&mut self) -> InstId {
        let id = InstId(self.next_inst);
        self.next_inst = self.next_inst.wrapping_add(1);
        id
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Clone, Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Fixed-capacity arena. Freed slots are reused lowest index first and bump
/// their generation, so ids taken before the removal no longer resolve.
#[derive(Clone, Debug)]
pub struct SlotArena<I, T> {
    slots: Vec<Slot<T>>,
    capacity: usize,
    len: usize,
    _id: core::marker::PhantomData<I>,
}

impl<I: SlotId, T> SlotArena<I, T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            capacity,
            len: 0,
            _id: core::marker::PhantomData,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len >= self.capacity
    }

    /// Returns `None` when every slot is taken.
    pub fn insert(&mut self, value: T) -> Option<I> {
        if self.is_full() {
            return None;
        }
        let index = match self.slots.iter().position(|slot| slot.value.is_none()) {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    value: None,
                });
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        slot.generation = slot.generation.wrapping_add(1);
        slot.value = Some(value);
        self.len += 1;
        Some(I::from_parts(index as u32, slot.generation))
    }

    pub fn remove(&mut self, id: I) -> Option<T> {
        let slot = self.slots.get_mut(id.index())?;
        if slot.generation != id.generation() {
            return None;
        }
        let value = slot.value.take()?;
        self.len -= 1;
        Some(value)
    }

    #[inline]
    pub fn contains(&self, id: I) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: I) -> Option<&T> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.value.as_mut())
    }

    /// Live id stored at a raw slot index.
    pub fn id_at(&self, index: usize) -> Option<I> {
        let slot = self.slots.get(index)?;
        slot.value
            .as_ref()
            .map(|_| I::from_parts(index as u32, slot.generation))
    }

    /// Live entries in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (I::from_parts(index as u32, slot.generation), value))
        })
    }

    /// Upper bound (exclusive) of the slot indices handed out so far.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.value = None;
        }
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_monotonic() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.alloc_inst(), InstId(0));
        assert_eq!(alloc.alloc_inst(), InstId(1));
        alloc.reset();
        assert_eq!(alloc.alloc_inst(), InstId(0));
    }

    #[test]
    fn arena_respects_capacity() {
        let mut arena: SlotArena<ClipId, &str> = SlotArena::with_capacity(2);
        assert!(arena.insert("a").is_some());
        assert!(arena.insert("b").is_some());
        assert!(arena.insert("c").is_none());
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn stale_ids_do_not_alias_reused_slots() {
        let mut arena: SlotArena<ClipId, &str> = SlotArena::with_capacity(4);
        let a = arena.insert("a").unwrap();
        let _b = arena.insert("b").unwrap();
        assert_eq!(arena.remove(a), Some("a"));

        let c = arena.insert("c").unwrap();
        assert_eq!(c.index(), a.index(), "first free slot is reused");
        assert_ne!(c, a);
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(c), Some(&"c"));
        assert_eq!(arena.remove(a), None);
    }

    #[test]
    fn iter_and_id_at_follow_slot_order() {
        let mut arena: SlotArena<EdgeId, u8> = SlotArena::with_capacity(4);
        let first = arena.insert(1).unwrap();
        let second = arena.insert(2).unwrap();
        arena.remove(first);
        let ids: Vec<_> = arena.iter().map(|(id, v)| (id, *v)).collect();
        assert_eq!(ids, vec![(second, 2)]);
        assert_eq!(arena.id_at(0), None);
        assert_eq!(arena.id_at(1), Some(second));
        arena.clear();
        assert!(arena.is_empty());
    }

    #[test]
    fn display_is_compact() {
        let id = ClipId::from_parts(3, 1);
        assert_eq!(id.to_string(), "clip#3v1");
        assert_eq!(InstId(7).to_string(), "inst#7");
    }
}
