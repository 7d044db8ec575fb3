//! Case data store - holds the most recently applied dataset snapshot
//!
//! The snapshot is replaced wholesale. Key indexes are built before the swap,
//! so a lookup sees either the previous snapshot or the new one, never a mix.

use crate::domain::snapshot::{CaseRecord, DatasetSnapshot};
use crate::domain::types::{CaseDate, EntityKind, JoinKey};
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;
use tracing::{debug, info};

#[derive(Debug)]
struct IndexedSnapshot {
    snapshot: DatasetSnapshot,
    region_index: FxHashMap<JoinKey, usize>,
    facility_index: FxHashMap<JoinKey, usize>,
}

impl IndexedSnapshot {
    fn build(snapshot: DatasetSnapshot) -> Self {
        let region_index = index_records(EntityKind::Region, &snapshot.region_records);
        let facility_index = index_records(EntityKind::Facility, &snapshot.facility_records);
        Self { snapshot, region_index, facility_index }
    }

    fn index(&self, kind: EntityKind) -> &FxHashMap<JoinKey, usize> {
        match kind {
            EntityKind::Region => &self.region_index,
            EntityKind::Facility => &self.facility_index,
        }
    }
}

/// First record wins when a join key repeats
fn index_records(kind: EntityKind, records: &[CaseRecord]) -> FxHashMap<JoinKey, usize> {
    let mut index = FxHashMap::default();
    index.reserve(records.len());
    for (idx, record) in records.iter().enumerate() {
        match index.entry(record.join_key.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(idx);
            }
            Entry::Occupied(_) => {
                debug!(kind = %kind, key = %record.join_key, "duplicate_record_ignored");
            }
        }
    }
    index
}

#[derive(Debug, Default)]
pub struct CaseDataStore {
    current: Option<IndexedSnapshot>,
}

impl CaseDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a new snapshot, discarding the previous one entirely
    pub fn replace(&mut self, snapshot: DatasetSnapshot) {
        let indexed = IndexedSnapshot::build(snapshot);
        info!(
            date = %indexed.snapshot.date,
            region_records = %indexed.snapshot.region_records.len(),
            facility_records = %indexed.snapshot.facility_records.len(),
            "snapshot_replaced"
        );
        self.current = Some(indexed);
    }

    pub fn current(&self) -> Option<&DatasetSnapshot> {
        self.current.as_ref().map(|c| &c.snapshot)
    }

    /// Effective date of the current snapshot
    pub fn date(&self) -> Option<CaseDate> {
        self.current().map(|s| s.date)
    }

    pub fn lookup(&self, kind: EntityKind, key: &JoinKey) -> Option<&CaseRecord> {
        let current = self.current.as_ref()?;
        let idx = *current.index(kind).get(key)?;
        current.snapshot.records(kind).get(idx)
    }
}
