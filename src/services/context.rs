//! Map context - the owned state every map operation works on
//!
//! Bundles the registry, the data store, the binding engine and one
//! interaction state machine per layer. All mutation goes through `&mut self`
//! on a single task, so a bind pass is never interleaved with a hover.

use crate::domain::snapshot::DatasetSnapshot;
use crate::domain::style::LayerStyle;
use crate::domain::types::{EntityKind, JoinKey};
use crate::io::map_host::MapHost;
use crate::services::binding::{BindReport, BindingEngine};
use crate::services::interaction::InteractionStateMachine;
use crate::services::registry::EntityRegistry;
use crate::services::store::CaseDataStore;

pub struct MapContext {
    registry: EntityRegistry,
    store: CaseDataStore,
    engine: BindingEngine,
    region_hover: InteractionStateMachine,
    facility_hover: InteractionStateMachine,
}

impl MapContext {
    pub fn new(registry: EntityRegistry, engine: BindingEngine, highlight: LayerStyle) -> Self {
        Self {
            registry,
            store: CaseDataStore::new(),
            engine,
            region_hover: InteractionStateMachine::new(EntityKind::Region, highlight.clone()),
            facility_hover: InteractionStateMachine::new(EntityKind::Facility, highlight),
        }
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn store(&self) -> &CaseDataStore {
        &self.store
    }

    pub fn engine(&self) -> &BindingEngine {
        &self.engine
    }

    pub fn interaction(&self, kind: EntityKind) -> &InteractionStateMachine {
        match kind {
            EntityKind::Region => &self.region_hover,
            EntityKind::Facility => &self.facility_hover,
        }
    }

    /// Initial paint before any snapshot has been applied
    pub fn paint(&self, host: &mut dyn MapHost) {
        self.engine.paint_all(&self.registry, host);
    }

    /// Replace the store, rebind every entity and restore any active highlight
    pub fn apply_snapshot(&mut self, snapshot: DatasetSnapshot, host: &mut dyn MapHost) -> BindReport {
        let date = snapshot.date;
        self.store.replace(snapshot);
        let report = self
            .engine
            .bind_all(&mut self.registry, &self.store, host)
            .unwrap_or_else(|| BindReport::empty(date));
        self.region_hover.reapply(&self.registry, &self.engine, host);
        self.facility_hover.reapply(&self.registry, &self.engine, host);
        report
    }

    pub fn hover(&mut self, kind: EntityKind, name: &str, host: &mut dyn MapHost) -> bool {
        let key = JoinKey::normalize(name);
        let machine = match kind {
            EntityKind::Region => &mut self.region_hover,
            EntityKind::Facility => &mut self.facility_hover,
        };
        machine.on_hover(&key, &self.registry, &self.engine, host)
    }

    pub fn leave(&mut self, kind: EntityKind, name: &str, host: &mut dyn MapHost) -> bool {
        let key = JoinKey::normalize(name);
        let machine = match kind {
            EntityKind::Region => &mut self.region_hover,
            EntityKind::Facility => &mut self.facility_hover,
        };
        machine.on_leave(&key, &self.registry, &self.engine, host)
    }

    pub fn select(&self, kind: EntityKind, name: &str, host: &mut dyn MapHost) -> bool {
        let key = JoinKey::normalize(name);
        self.interaction(kind).on_select(&key, &self.registry, host)
    }
}
