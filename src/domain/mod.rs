//! Domain models - entities, case records and style values
//!
//! - `types` - join keys, entity kinds, dates and display handles
//! - `entity` - bound entities and the hover info panel
//! - `snapshot` - case records and per-date dataset snapshots
//! - `style` - style-apply values handed to the map host

pub mod entity;
pub mod snapshot;
pub mod style;
pub mod types;

pub use entity::{Entity, InfoPanel};
pub use snapshot::{CaseRecord, DatasetSnapshot};
pub use style::{LayerStyle, StyleApply};
pub use types::{CaseDate, DisplayHandle, EntityKind, JoinKey, MetricMap};
