use std::collections::HashSet;

use indexmap::IndexSet;

use crate::table::DefId;

/// Discovered composites: those already emitted and those waiting for emission.
///
/// `pending` keeps insertion order so that declarations come out in
/// first-discovery order on every run.
#[derive(Debug, Default)]
pub struct Worklist {
    resolved: HashSet<DefId>,
    pending: IndexSet<DefId>,
}

impl Worklist {
    pub fn new() -> Self { Self::default() }

    /// Record a reference to `def`. Returns true when it was newly queued.
    pub fn discover(&mut self, def: DefId) -> bool {
        if self.resolved.contains(&def) {
            return false;
        }
        self.pending.insert(def)
    }

    /// Move every pending definition into `resolved` and hand the batch back.
    ///
    /// Discoveries made while the batch is processed form the next batch.
    pub fn take_batch(&mut self) -> Vec<DefId> {
        let batch: Vec<DefId> = std::mem::take(&mut self.pending).into_iter().collect();
        self.resolved.extend(batch.iter().copied());
        batch
    }

    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{EnumDef, StructDef};
    use crate::table::TypeTable;

    #[test]
    fn batches_preserve_discovery_order_and_skip_resolved() {
        let mut table = TypeTable::new();
        let a = table.insert(StructDef::new("A")).unwrap();
        let b = table.insert(StructDef::new("B")).unwrap();
        let c = table.insert(EnumDef::new("C")).unwrap();

        let mut work = Worklist::new();
        assert!(work.discover(b));
        assert!(work.discover(a));
        assert!(!work.discover(b));
        assert_eq!(work.take_batch(), vec![b, a]);

        assert!(!work.discover(a));
        assert!(work.discover(c));
        assert_eq!(work.take_batch(), vec![c]);
        assert!(work.take_batch().is_empty());
        assert_eq!(work.resolved_count(), 3);
        assert!(!work.discover(c));
    }
}
