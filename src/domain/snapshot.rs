//! Case records and dataset snapshots as served for a single date

use super::types::{CaseDate, EntityKind, JoinKey, MetricMap};

/// One row of case data, immutable once received
#[derive(Debug, Clone, PartialEq)]
pub struct CaseRecord {
    pub join_key: JoinKey,
    pub date: CaseDate,
    pub metrics: MetricMap,
}

impl CaseRecord {
    pub fn new(join_key: &str, date: CaseDate) -> Self {
        Self { join_key: JoinKey::normalize(join_key), date, metrics: MetricMap::new() }
    }

    /// Builder used by tests and the wire decoder
    pub fn with_metric(mut self, name: &str, value: Option<f64>) -> Self {
        self.metrics.insert(name.to_string(), value);
        self
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied().flatten()
    }
}

/// A complete dataset for one effective date
///
/// Region and facility records are separate join spaces and are never
/// cross-matched.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSnapshot {
    /// Date the service actually served, which may differ from the one requested
    pub date: CaseDate,
    pub region_records: Vec<CaseRecord>,
    pub facility_records: Vec<CaseRecord>,
}

impl DatasetSnapshot {
    pub fn new(date: CaseDate) -> Self {
        Self { date, region_records: Vec::new(), facility_records: Vec::new() }
    }

    pub fn with_record(mut self, kind: EntityKind, record: CaseRecord) -> Self {
        match kind {
            EntityKind::Region => self.region_records.push(record),
            EntityKind::Facility => self.facility_records.push(record),
        }
        self
    }

    pub fn records(&self, kind: EntityKind) -> &[CaseRecord] {
        match kind {
            EntityKind::Region => &self.region_records,
            EntityKind::Facility => &self.facility_records,
        }
    }

    pub fn len(&self) -> usize {
        self.region_records.len() + self.facility_records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
