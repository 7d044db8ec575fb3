//! IO modules - external system interfaces
//!
//! - `data_service` - HTTP client for per-date case snapshots
//! - `map_host` - Style/focus/info sink standing in for the rendered map
//! - `date_control` - Effective date and error notices for the date picker
//! - `geometry` - GeoJSON manifest loader for the entity registry
//! - `console` - Line-based input driver for the binary

pub mod console;
pub mod data_service;
pub mod date_control;
pub mod geometry;
pub mod map_host;

// Re-export commonly used types
pub use data_service::{DataService, FetchError, HttpDataService};
pub use date_control::{DateControl, RecordingDateControl, TracingDateControl};
pub use map_host::{MapHost, RecordingMapHost, TracingMapHost};
