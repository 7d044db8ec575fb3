//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! Every section is optional. Layer sections override the built-in layer
//! defaults field by field, so a file can change only a bucket table.

use crate::domain::style::LayerStyle;
use crate::services::binding::{BindingEngine, DerivedMetric, LayerBinding, MissPolicy};
use crate::services::classifier::{Bucket, BucketTable};
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct DataServiceConfig {
    #[serde(default = "default_data_service_url")]
    pub url: String,
    /// Request timeout in milliseconds (0 to wait indefinitely)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_data_service_url() -> String {
    "http://localhost:5000/date".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for DataServiceConfig {
    fn default() -> Self {
        Self { url: default_data_service_url(), timeout_ms: default_timeout_ms() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeometryConfig {
    /// GeoJSON manifest of regions and facilities
    #[serde(default = "default_geometry_file")]
    pub file: String,
}

fn default_geometry_file() -> String {
    "data/entities.geojson".to_string()
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self { file: default_geometry_file() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

fn default_metrics_interval() -> u64 {
    30
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

/// Per-layer overrides; anything left out keeps the layer's default
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LayerConfig {
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    #[serde(default)]
    pub metric: Option<DerivedMetric>,
    #[serde(default)]
    pub on_miss: Option<MissPolicy>,
    #[serde(default)]
    pub no_data_color: Option<String>,
    #[serde(default)]
    pub buckets: Option<Vec<Bucket>>,
    #[serde(default)]
    pub style: Option<LayerStyle>,
}

impl LayerConfig {
    fn into_binding(self, defaults: LayerBinding) -> anyhow::Result<LayerBinding> {
        let no_data_color = self
            .no_data_color
            .unwrap_or_else(|| defaults.buckets.no_data_color().to_string());
        let buckets = match self.buckets {
            Some(buckets) => BucketTable::new(buckets, &no_data_color)?,
            None => BucketTable::new(defaults.buckets.buckets().iter().cloned(), &no_data_color)?,
        };

        let metric = self.metric.unwrap_or(defaults.metric);
        metric.validate()?;

        Ok(LayerBinding {
            fields: self.fields.unwrap_or(defaults.fields),
            metric,
            on_miss: self.on_miss.unwrap_or(defaults.on_miss),
            buckets,
            style: self.style.unwrap_or(defaults.style),
        })
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LayersConfig {
    #[serde(default)]
    pub region: LayerConfig,
    #[serde(default)]
    pub facility: LayerConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub data_service: DataServiceConfig,
    #[serde(default)]
    pub geometry: GeometryConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub highlight: Option<LayerStyle>,
    #[serde(default)]
    pub layers: LayersConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    data_service_url: String,
    data_service_timeout_ms: u64,
    geometry_file: String,
    metrics_interval_secs: u64,
    highlight: LayerStyle,
    region_layer: LayerBinding,
    facility_layer: LayerBinding,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_service_url: default_data_service_url(),
            data_service_timeout_ms: default_timeout_ms(),
            geometry_file: default_geometry_file(),
            metrics_interval_secs: default_metrics_interval(),
            highlight: LayerStyle::highlight_default(),
            region_layer: LayerBinding::region_default(),
            facility_layer: LayerBinding::facility_default(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Determine config file path from args or environment
    pub fn resolve_config_path(args: &[String]) -> String {
        for (i, arg) in args.iter().enumerate() {
            if arg == "--config" {
                if let Some(path) = args.get(i + 1) {
                    return path.clone();
                }
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                return path.to_string();
            }
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Parse configuration text; `source` names it in error messages
    pub fn from_toml_str(content: &str, source: &str) -> anyhow::Result<Self> {
        let toml_config: TomlConfig =
            toml::from_str(content).with_context(|| format!("Failed to parse config file {}", source))?;

        let region_layer = toml_config
            .layers
            .region
            .into_binding(LayerBinding::region_default())
            .with_context(|| format!("Invalid [layers.region] in {}", source))?;
        let facility_layer = toml_config
            .layers
            .facility
            .into_binding(LayerBinding::facility_default())
            .with_context(|| format!("Invalid [layers.facility] in {}", source))?;

        Ok(Self {
            data_service_url: toml_config.data_service.url,
            data_service_timeout_ms: toml_config.data_service.timeout_ms,
            geometry_file: toml_config.geometry.file,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            highlight: toml_config.highlight.unwrap_or_else(LayerStyle::highlight_default),
            region_layer,
            facility_layer,
            config_file: source.to_string(),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load(args: &[String]) -> Self {
        Self::load_from_path(&Self::resolve_config_path(args))
    }

    /// Load from an explicit path, falling back to defaults on any error
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {:#}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Binding engine for the configured layers
    pub fn binding_engine(&self) -> BindingEngine {
        BindingEngine::new(self.region_layer.clone(), self.facility_layer.clone())
    }

    pub fn data_service_url(&self) -> &str {
        &self.data_service_url
    }

    pub fn data_service_timeout_ms(&self) -> u64 {
        self.data_service_timeout_ms
    }

    /// Request timeout, `None` when disabled
    pub fn data_service_timeout(&self) -> Option<Duration> {
        match self.data_service_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn geometry_file(&self) -> &str {
        &self.geometry_file
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn highlight(&self) -> &LayerStyle {
        &self.highlight
    }

    pub fn region_layer(&self) -> &LayerBinding {
        &self.region_layer
    }

    pub fn facility_layer(&self) -> &LayerBinding {
        &self.facility_layer
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::EntityKind;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.data_service_url(), "http://localhost:5000/date");
        assert_eq!(config.data_service_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(config.geometry_file(), "data/entities.geojson");
        assert_eq!(config.metrics_interval_secs(), 30);
        assert_eq!(config.highlight(), &LayerStyle::highlight_default());
        assert_eq!(config.region_layer(), &LayerBinding::region_default());
        assert_eq!(config.facility_layer(), &LayerBinding::facility_default());
    }

    #[test]
    fn test_empty_file_matches_defaults() {
        let config = Config::from_toml_str("", "empty.toml").unwrap();
        assert_eq!(config.region_layer(), Config::default().region_layer());
        assert_eq!(config.facility_layer(), Config::default().facility_layer());
        assert_eq!(config.config_file(), "empty.toml");
    }

    #[test]
    fn test_layer_override_keeps_other_defaults() {
        let content = r##"
[layers.region]
no_data_color = "#000000"

[[layers.region.buckets]]
lower = 0
color = "#eeeeee"

[[layers.region.buckets]]
lower = 100
color = "#111111"
"##;
        let config = Config::from_toml_str(content, "test.toml").unwrap();
        let region = config.region_layer();
        assert_eq!(region.buckets.buckets().len(), 2);
        assert_eq!(region.buckets.no_data_color(), "#000000");
        assert_eq!(region.metric, DerivedMetric::single("cases"));
        assert_eq!(region.on_miss, MissPolicy::Zero);

        let engine = config.binding_engine();
        assert_eq!(engine.layer(EntityKind::Region).buckets.buckets()[1].color, "#111111");
        assert_eq!(engine.layer(EntityKind::Facility), &LayerBinding::facility_default());
    }

    #[test]
    fn test_no_data_color_alone_rebuilds_default_table() {
        let content = "[layers.facility]\nno_data_color = \"#abcdef\"\n";
        let config = Config::from_toml_str(content, "test.toml").unwrap();
        let facility = config.facility_layer();
        assert_eq!(facility.buckets.no_data_color(), "#abcdef");
        assert_eq!(facility.buckets.buckets(), BucketTable::facility_default().buckets());
    }

    #[test]
    fn test_invalid_bucket_table_is_rejected() {
        let content = r##"
[[layers.region.buckets]]
lower = 10
color = "#eeeeee"

[[layers.region.buckets]]
lower = 5
color = "#111111"
"##;
        let err = Config::from_toml_str(content, "bad.toml").unwrap_err();
        assert!(format!("{:#}", err).contains("[layers.region]"));

        let err = Config::from_toml_str("[layers.facility]\nbuckets = []\n", "bad.toml").unwrap_err();
        assert!(format!("{:#}", err).contains("empty"));
    }

    #[test]
    fn test_metric_without_fields_is_rejected() {
        let err = Config::from_toml_str("[layers.region]\nmetric = { sum_of = [] }\n", "bad.toml").unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("[layers.region]"));
        assert!(message.contains("names no fields"));

        let content = "[layers.facility]\nmetric = { sum_of = [\"resident_cases\", \" \"] }\n";
        assert!(Config::from_toml_str(content, "bad.toml").is_err());

        // Fallback alone is a valid metric
        let content = "[layers.facility]\nmetric = { sum_of = [], fallback = [\"total_cases\"] }\n";
        let config = Config::from_toml_str(content, "ok.toml").unwrap();
        assert_eq!(config.facility_layer().metric.fallback, vec!["total_cases".to_string()]);
    }

    #[test]
    fn test_zero_timeout_disables() {
        let config = Config::from_toml_str("[data_service]\ntimeout_ms = 0\n", "t.toml").unwrap();
        assert_eq!(config.data_service_timeout(), None);
        assert_eq!(config.data_service_url(), "http://localhost:5000/date");
    }

    #[test]
    fn test_resolve_config_path_default() {
        let args: Vec<String> = vec!["case-map".to_string()];
        if env::var("CONFIG_FILE").is_err() {
            assert_eq!(Config::resolve_config_path(&args), "config/dev.toml");
        }
    }

    #[test]
    fn test_resolve_config_path_from_arg() {
        let args: Vec<String> =
            vec!["case-map".to_string(), "--config".to_string(), "config/prod.toml".to_string()];
        assert_eq!(Config::resolve_config_path(&args), "config/prod.toml");
    }

    #[test]
    fn test_resolve_config_path_from_arg_equals() {
        let args: Vec<String> = vec!["case-map".to_string(), "--config=config/staging.toml".to_string()];
        assert_eq!(Config::resolve_config_path(&args), "config/staging.toml");
    }
}
