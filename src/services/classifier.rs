//! Threshold classification of metric values into colour buckets
//!
//! A bucket table is an ascending list of inclusive lower bounds. A value
//! belongs to the bucket with the greatest lower bound not above it; values
//! below the first bound fall into the first bucket. Null and NaN go to the
//! table's no-data colour. The same function serves every layer, each layer
//! just carries its own table.

use crate::domain::entity::format_metric;
use serde::Deserialize;
use smallvec::SmallVec;
use thiserror::Error;

/// One colour band, starting at `lower` (inclusive)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Bucket {
    pub lower: f64,
    pub color: String,
}

impl Bucket {
    pub fn new(lower: f64, color: &str) -> Self {
        Self { lower, color: color.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BucketTableError {
    #[error("bucket table is empty")]
    Empty,
    #[error("bucket lower bound {0} is not finite")]
    NonFinite(f64),
    #[error("bucket lower bounds must strictly increase, got {prev} then {next}")]
    NotAscending { prev: f64, next: f64 },
}

/// Validated bucket table for one layer
#[derive(Debug, Clone, PartialEq)]
pub struct BucketTable {
    buckets: SmallVec<[Bucket; 8]>,
    no_data_color: String,
}

/// Region case-count colours (yellow to dark red)
const REGION_BOUNDS: [(f64, &str); 8] = [
    (0.0, "#FFEDA0"),
    (10_000.0, "#FED976"),
    (15_000.0, "#FEB24C"),
    (20_000.0, "#FD8D3C"),
    (40_000.0, "#FC4E2A"),
    (60_000.0, "#E31A1C"),
    (80_000.0, "#BD0026"),
    (1_000_000.0, "#800026"),
];

/// Facility case-count colours (light to dark green)
const FACILITY_BOUNDS: [(f64, &str); 5] = [
    (0.0, "#ffffcc"),
    (1.0, "#c2e699"),
    (10.0, "#78c679"),
    (50.0, "#31a354"),
    (100.0, "#006837"),
];

pub const DEFAULT_NO_DATA_COLOR: &str = "#cccccc";

impl BucketTable {
    pub fn new<I>(buckets: I, no_data_color: &str) -> Result<Self, BucketTableError>
    where
        I: IntoIterator<Item = Bucket>,
    {
        let buckets: SmallVec<[Bucket; 8]> = buckets.into_iter().collect();
        if buckets.is_empty() {
            return Err(BucketTableError::Empty);
        }
        for bucket in &buckets {
            if !bucket.lower.is_finite() {
                return Err(BucketTableError::NonFinite(bucket.lower));
            }
        }
        for pair in buckets.windows(2) {
            if pair[1].lower <= pair[0].lower {
                return Err(BucketTableError::NotAscending { prev: pair[0].lower, next: pair[1].lower });
            }
        }
        Ok(Self { buckets, no_data_color: no_data_color.to_string() })
    }

    pub fn region_default() -> Self {
        Self::from_constants(&REGION_BOUNDS)
    }

    pub fn facility_default() -> Self {
        Self::from_constants(&FACILITY_BOUNDS)
    }

    fn from_constants(bounds: &[(f64, &str)]) -> Self {
        Self {
            buckets: bounds.iter().map(|(lower, color)| Bucket::new(*lower, color)).collect(),
            no_data_color: DEFAULT_NO_DATA_COLOR.to_string(),
        }
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn no_data_color(&self) -> &str {
        &self.no_data_color
    }

    /// Index of the bucket a present value falls in
    #[inline]
    fn bucket_index(&self, value: f64) -> usize {
        // Values below the first bound land in bucket 0
        self.buckets.partition_point(|b| b.lower <= value).saturating_sub(1)
    }

    /// Legend rows, lowest bucket first, followed by the no-data row
    pub fn legend(&self) -> Vec<LegendEntry> {
        let mut entries: Vec<LegendEntry> = self
            .buckets
            .iter()
            .enumerate()
            .map(|(i, bucket)| {
                let to = self.buckets.get(i + 1).map(|next| next.lower);
                let label = match to {
                    Some(to) => format!("{}\u{2013}{}", format_metric(bucket.lower), format_metric(to)),
                    None => format!("{}+", format_metric(bucket.lower)),
                };
                LegendEntry { from: Some(bucket.lower), to, color: bucket.color.clone(), label }
            })
            .collect();
        entries.push(LegendEntry {
            from: None,
            to: None,
            color: self.no_data_color.clone(),
            label: "No data".to_string(),
        });
        entries
    }
}

/// One legend row
#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub from: Option<f64>,
    pub to: Option<f64>,
    pub color: String,
    pub label: String,
}

/// Map a metric value to its colour key in `table`
pub fn classify(value: Option<f64>, table: &BucketTable) -> &str {
    match value {
        Some(v) if !v.is_nan() => &table.buckets[table.bucket_index(v)].color,
        _ => table.no_data_color(),
    }
}
