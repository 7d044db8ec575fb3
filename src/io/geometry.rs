//! Geometry manifest loader - populates the entity registry at startup
//!
//! Reads a GeoJSON `FeatureCollection` (or a bare array of features). Each
//! feature becomes one entity named by `properties.name`; its display handle
//! is the feature's position in the file so the host can find it again.
//! Coordinates are never looked at.

use crate::domain::types::{DisplayHandle, EntityKind};
use crate::services::registry::EntityRegistry;
use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Manifest {
    Collection { features: Vec<Feature> },
    Bare(Vec<Feature>),
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<Properties>,
    #[serde(default)]
    geometry: Option<Geometry>,
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    geometry_type: String,
}

/// Outcome of loading a manifest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManifestSummary {
    pub regions: usize,
    pub facilities: usize,
    pub skipped: usize,
}

impl Feature {
    /// Declared kind, or Point geometries as facilities and everything else as regions
    fn kind(&self) -> Result<EntityKind, String> {
        let declared = self.properties.as_ref().and_then(|p| p.kind.as_deref());
        match declared {
            Some(kind) => kind.parse::<EntityKind>().map_err(|e| e.to_string()),
            None => match self.geometry.as_ref().map(|g| g.geometry_type.as_str()) {
                Some("Point") | Some("MultiPoint") => Ok(EntityKind::Facility),
                _ => Ok(EntityKind::Region),
            },
        }
    }

    fn name(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|p| p.name.as_deref())
            .filter(|name| !name.trim().is_empty())
    }
}

/// Build a registry from manifest text
pub fn parse_manifest(text: &str) -> anyhow::Result<(EntityRegistry, ManifestSummary)> {
    let manifest: Manifest = serde_json::from_str(text).context("Invalid geometry manifest")?;
    let features = match manifest {
        Manifest::Collection { features } => features,
        Manifest::Bare(features) => features,
    };

    let mut registry = EntityRegistry::new();
    let mut summary = ManifestSummary::default();

    for (idx, feature) in features.iter().enumerate() {
        let Some(name) = feature.name() else {
            warn!(feature = %idx, "feature_without_name_skipped");
            summary.skipped += 1;
            continue;
        };
        let kind = match feature.kind() {
            Ok(kind) => kind,
            Err(e) => {
                warn!(feature = %idx, name = %name, error = %e, "feature_kind_unknown");
                summary.skipped += 1;
                continue;
            }
        };
        let handle = DisplayHandle(u32::try_from(idx).context("Too many features in manifest")?);

        match registry.register(name, kind, handle) {
            Ok(_) => match kind {
                EntityKind::Region => summary.regions += 1,
                EntityKind::Facility => summary.facilities += 1,
            },
            Err(e) => {
                warn!(feature = %idx, name = %name, error = %e, "feature_skipped");
                summary.skipped += 1;
            }
        }
    }

    Ok((registry, summary))
}

/// Load the manifest file at `path`
pub fn load_registry<P: AsRef<Path>>(path: P) -> anyhow::Result<EntityRegistry> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read geometry file {}", path.display()))?;
    let (registry, summary) =
        parse_manifest(&text).with_context(|| format!("Failed to load geometry file {}", path.display()))?;

    info!(
        file = %path.display(),
        regions = %summary.regions,
        facilities = %summary.facilities,
        skipped = %summary.skipped,
        "geometry_loaded"
    );
    Ok(registry)
}
