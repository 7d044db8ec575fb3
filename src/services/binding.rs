//! Binding engine - joins the current snapshot onto registered entities
//!
//! For each entity the engine looks up the record in the entity's own join
//! space, overwrites the entity's bound metrics, classifies the layer's
//! derived metric and pushes the resulting style to the map host.
//!
//! Join misses are not errors. Each layer declares what a miss means:
//! regions treat a missing record as zero cases, facilities as no report.

use crate::domain::entity::Entity;
use crate::domain::snapshot::CaseRecord;
use crate::domain::style::{LayerStyle, StyleApply};
use crate::domain::types::{CaseDate, EntityKind, MetricMap};
use crate::io::map_host::MapHost;
use crate::services::classifier::{classify, BucketTable};
use crate::services::registry::EntityRegistry;
use crate::services::store::CaseDataStore;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// What an entity's declared fields become when no record matches it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissPolicy {
    /// Absence of a record means zero
    Zero,
    /// Absence of a record means unknown
    NoData,
}

/// The value a layer classifies, computed from an entity's metrics
///
/// When every field in `sum_of` is present their sum is used. Otherwise the
/// first present field in `fallback` is used, in order. A metric counts as
/// present when it is not null.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DerivedMetric {
    pub sum_of: Vec<String>,
    #[serde(default)]
    pub fallback: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DerivedMetricError {
    #[error("derived metric names no fields in sum_of or fallback")]
    NoFields,
    #[error("derived metric has a blank field name")]
    BlankField,
}

impl DerivedMetric {
    pub fn single(field: &str) -> Self {
        Self { sum_of: vec![field.to_string()], fallback: Vec::new() }
    }

    /// A metric that names no fields would classify every entity as no data
    pub fn validate(&self) -> Result<(), DerivedMetricError> {
        if self.sum_of.is_empty() && self.fallback.is_empty() {
            return Err(DerivedMetricError::NoFields);
        }
        if self.sum_of.iter().chain(&self.fallback).any(|f| f.trim().is_empty()) {
            return Err(DerivedMetricError::BlankField);
        }
        Ok(())
    }

    pub fn evaluate(&self, metrics: &MetricMap) -> Option<f64> {
        let present = |name: &String| metrics.get(name).copied().flatten().filter(|v| !v.is_nan());

        if !self.sum_of.is_empty() {
            let parts: Option<Vec<f64>> = self.sum_of.iter().map(present).collect();
            if let Some(parts) = parts {
                return Some(parts.iter().sum());
            }
        }
        self.fallback.iter().find_map(present)
    }
}

/// Everything the engine needs to bind and style one layer
#[derive(Debug, Clone, PartialEq)]
pub struct LayerBinding {
    /// Metrics every entity of the layer is expected to carry
    pub fields: Vec<String>,
    pub metric: DerivedMetric,
    pub on_miss: MissPolicy,
    pub buckets: BucketTable,
    pub style: LayerStyle,
}

impl LayerBinding {
    pub fn region_default() -> Self {
        Self {
            fields: vec!["cases".to_string(), "deaths".to_string()],
            metric: DerivedMetric::single("cases"),
            on_miss: MissPolicy::Zero,
            buckets: BucketTable::region_default(),
            style: LayerStyle::base_default(),
        }
    }

    pub fn facility_default() -> Self {
        Self {
            fields: vec![
                "resident_cases".to_string(),
                "staff_cases".to_string(),
                "total_cases".to_string(),
                "deaths".to_string(),
            ],
            metric: DerivedMetric {
                sum_of: vec!["resident_cases".to_string(), "staff_cases".to_string()],
                fallback: vec!["total_cases".to_string()],
            },
            on_miss: MissPolicy::NoData,
            buckets: BucketTable::facility_default(),
            style: LayerStyle { dash_array: None, ..LayerStyle::base_default() },
        }
    }

    /// Bound metrics for an entity given its record, or its absence
    fn bound_metrics(&self, record: Option<&CaseRecord>) -> MetricMap {
        match record {
            Some(record) => {
                let mut metrics = record.metrics.clone();
                for field in &self.fields {
                    metrics.entry(field.clone()).or_insert(None);
                }
                metrics
            }
            None => {
                let fill = match self.on_miss {
                    MissPolicy::Zero => Some(0.0),
                    MissPolicy::NoData => None,
                };
                self.fields.iter().map(|field| (field.clone(), fill)).collect()
            }
        }
    }
}

/// Per-layer join counts from one bind pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerReport {
    pub matched: usize,
    pub missed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindReport {
    pub date: CaseDate,
    pub region: LayerReport,
    pub facility: LayerReport,
}

impl BindReport {
    pub fn empty(date: CaseDate) -> Self {
        Self { date, region: LayerReport::default(), facility: LayerReport::default() }
    }

    fn layer_mut(&mut self, kind: EntityKind) -> &mut LayerReport {
        match kind {
            EntityKind::Region => &mut self.region,
            EntityKind::Facility => &mut self.facility,
        }
    }

    pub fn matched(&self) -> usize {
        self.region.matched + self.facility.matched
    }

    pub fn missed(&self) -> usize {
        self.region.missed + self.facility.missed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BindingEngine {
    region: LayerBinding,
    facility: LayerBinding,
}

impl Default for BindingEngine {
    fn default() -> Self {
        Self::new(LayerBinding::region_default(), LayerBinding::facility_default())
    }
}

impl BindingEngine {
    pub fn new(region: LayerBinding, facility: LayerBinding) -> Self {
        Self { region, facility }
    }

    pub fn layer(&self, kind: EntityKind) -> &LayerBinding {
        match kind {
            EntityKind::Region => &self.region,
            EntityKind::Facility => &self.facility,
        }
    }

    /// Value the entity's layer classifies on
    pub fn derived_value(&self, entity: &Entity) -> Option<f64> {
        self.layer(entity.kind).metric.evaluate(entity.metrics())
    }

    pub fn color_for(&self, entity: &Entity) -> &str {
        classify(self.derived_value(entity), &self.layer(entity.kind).buckets)
    }

    /// Resting style computed from the entity's current bound metrics
    pub fn style_for(&self, entity: &Entity) -> StyleApply {
        let layer = self.layer(entity.kind);
        layer.style.apply(&entity.key, entity.kind, self.color_for(entity), false)
    }

    /// Join the store's current snapshot onto every registered entity
    ///
    /// Returns `None` without touching anything when no snapshot is loaded.
    pub fn bind_all(
        &self,
        registry: &mut EntityRegistry,
        store: &CaseDataStore,
        host: &mut dyn MapHost,
    ) -> Option<BindReport> {
        let Some(snapshot) = store.current() else {
            debug!("bind_skipped_no_snapshot");
            return None;
        };
        let date = snapshot.date;
        let mut report = BindReport::empty(date);

        for entity in registry.iter_mut() {
            let record = store.lookup(entity.kind, &entity.key);
            let layer_report = report.layer_mut(entity.kind);
            if record.is_some() {
                layer_report.matched += 1;
            } else {
                layer_report.missed += 1;
                debug!(kind = %entity.kind, key = %entity.key, "join_miss");
            }

            let metrics = self.layer(entity.kind).bound_metrics(record);
            entity.bind(metrics, date);
            host.apply_style(entity.handle, &self.style_for(entity));
        }

        info!(
            date = %date,
            regions_matched = %report.region.matched,
            regions_missed = %report.region.missed,
            facilities_matched = %report.facility.matched,
            facilities_missed = %report.facility.missed,
            "bind_complete"
        );
        Some(report)
    }

    /// Push the current style of every entity without rebinding
    pub fn paint_all(&self, registry: &EntityRegistry, host: &mut dyn MapHost) {
        for entity in registry.iter() {
            host.apply_style(entity.handle, &self.style_for(entity));
        }
    }
}
