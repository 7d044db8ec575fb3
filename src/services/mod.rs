//! Services - binding, interaction and sync logic
//!
//! - `classifier` - Threshold bucket tables and value classification
//! - `registry` - Entities keyed by kind and join key
//! - `store` - Current dataset snapshot with per-kind indexes
//! - `binding` - Joins snapshots onto entities and pushes styles
//! - `interaction` - Per-layer hover/leave/select state machine
//! - `context` - The map state every operation works on
//! - `sync` - Date requests, fetch completions and the event loop

pub mod binding;
pub mod classifier;
pub mod context;
pub mod interaction;
pub mod registry;
pub mod store;
pub mod sync;

// Re-export commonly used types
pub use binding::{BindReport, BindingEngine, LayerBinding, MissPolicy};
pub use classifier::{classify, Bucket, BucketTable};
pub use context::MapContext;
pub use interaction::{HoverState, InteractionStateMachine};
pub use registry::EntityRegistry;
pub use store::CaseDataStore;
pub use sync::{MapEvent, SyncController, SyncError, SyncPhase};
