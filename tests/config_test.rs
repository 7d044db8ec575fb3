//! Integration tests for configuration and geometry loading

use case_map::domain::types::{DisplayHandle, EntityKind, JoinKey};
use case_map::infra::Config;
use case_map::io::geometry::load_registry;
use case_map::services::{LayerBinding, MissPolicy};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r##"
[data_service]
url = "http://test-host:8080/date"
timeout_ms = 2500

[geometry]
file = "/srv/map/counties.geojson"

[metrics]
interval_secs = 15

[highlight]
stroke_color = "#000"
weight = 4
opacity = 1
fill_opacity = 0.9

[layers.facility]
on_miss = "zero"
metric = { sum_of = ["total_cases"] }
"##;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.data_service_url(), "http://test-host:8080/date");
    assert_eq!(config.data_service_timeout_ms(), 2500);
    assert_eq!(config.geometry_file(), "/srv/map/counties.geojson");
    assert_eq!(config.metrics_interval_secs(), 15);
    assert_eq!(config.highlight().stroke_color, "#000");
    assert_eq!(config.highlight().dash_array, None);
    assert_eq!(config.facility_layer().on_miss, MissPolicy::Zero);
    assert_eq!(config.facility_layer().metric.sum_of, vec!["total_cases".to_string()]);
    assert!(config.facility_layer().metric.fallback.is_empty());
    assert_eq!(config.region_layer(), &LayerBinding::region_default());
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/path/config.toml");
    assert_eq!(config.config_file(), "default");
    assert_eq!(config.data_service_url(), "http://localhost:5000/date");
}

#[test]
fn test_load_from_path_falls_back_on_invalid_buckets() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file
        .write_all(b"[layers.region]\nbuckets = [{ lower = 5, color = \"#111\" }, { lower = 5, color = \"#222\" }]\n")
        .unwrap();
    temp_file.flush().unwrap();

    assert!(Config::from_file(temp_file.path()).is_err());
    let config = Config::load_from_path(temp_file.path().to_str().unwrap());
    assert_eq!(config.config_file(), "default");
}

#[test]
fn test_bundled_dev_config_matches_defaults() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/dev.toml");
    let config = Config::from_file(&path).unwrap();
    let defaults = Config::default();

    assert_eq!(config.region_layer(), defaults.region_layer());
    assert_eq!(config.facility_layer(), defaults.facility_layer());
    assert_eq!(config.highlight(), defaults.highlight());
    assert_eq!(config.data_service_url(), defaults.data_service_url());
}

#[test]
fn test_bundled_geometry_manifest() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/entities.geojson");
    let registry = load_registry(&path).unwrap();

    assert_eq!(registry.count(EntityKind::Region), 4);
    assert_eq!(registry.count(EntityKind::Facility), 2);
    let facility = registry
        .find(EntityKind::Facility, &JoinKey::normalize("Valley Skilled Nursing"))
        .unwrap();
    assert_eq!(facility.handle, DisplayHandle(5));
}

#[test]
fn test_load_geometry_from_temp_file() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file
        .write_all(br#"[{"properties": {"name": "Alpha"}, "geometry": {"type": "Polygon", "coordinates": []}}]"#)
        .unwrap();
    temp_file.flush().unwrap();

    let registry = load_registry(temp_file.path()).unwrap();
    assert_eq!(registry.len(), 1);
    assert!(registry.find(EntityKind::Region, &JoinKey::normalize("alpha")).is_some());
}
