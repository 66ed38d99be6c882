//! String interning for clip and event names.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};

/// Hands out one shared `Arc<str>` per distinct name, so events raised every
/// tick clone a pointer instead of allocating.
#[derive(Clone, Debug, Default)]
pub struct NameTable {
    names: HashSet<Arc<str>>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, name: &str) -> Arc<str> {
        if let Some(existing) = self.names.get(name) {
            return Arc::clone(existing);
        }
        let interned: Arc<str> = Arc::from(name);
        self.names.insert(Arc::clone(&interned));
        interned
    }

    /// Re-point `name` at the table's copy.
    pub fn adopt(&mut self, name: &mut Arc<str>) {
        let shared = self.intern(name);
        *name = shared;
    }

    /// Forget every name whose only holders are the table and `held`, the
    /// names of something being discarded. Returns how many were dropped.
    pub fn release<'a>(&mut self, held: impl IntoIterator<Item = &'a Arc<str>>) -> usize {
        let mut uses: HashMap<&'a str, usize> = HashMap::new();
        for name in held {
            *uses.entry(name.as_ref()).or_default() += 1;
        }
        let before = self.names.len();
        self.names.retain(|name| match uses.get(name.as_ref()) {
            Some(count) => Arc::strong_count(name) > count + 1,
            None => true,
        });
        before - self.names.len()
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_shares_storage() {
        let mut table = NameTable::new();
        let a = table.intern("hit");
        let b = table.intern("hit");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(table.len(), 1);

        let mut foreign: Arc<str> = Arc::from("hit");
        table.adopt(&mut foreign);
        assert!(Arc::ptr_eq(&foreign, &a));
    }

    #[test]
    fn release_keeps_names_still_in_use() {
        let mut table = NameTable::new();
        let walk = table.intern("walk");
        let step_a = table.intern("step");
        let step_b = table.intern("step");
        let kept = table.intern("step");

        // `walk` and both of its `step` events go; another holder keeps `step`.
        assert_eq!(table.release([&walk, &step_a, &step_b]), 1);
        assert_eq!(table.len(), 1);
        drop(kept);
        assert_eq!(table.release([&step_a, &step_b]), 1);
        assert!(table.is_empty());
    }
}
