//! Hover/selection state for one map layer
//!
//! The highlight is an overlay on top of the bound style. It never writes
//! entity metrics, and leaving an entity restyles it from its current metrics
//! rather than from a remembered style, so a snapshot applied mid-hover is
//! reflected as soon as the pointer leaves.

use crate::domain::entity::{Entity, InfoPanel};
use crate::domain::style::{LayerStyle, StyleApply};
use crate::domain::types::{EntityKind, JoinKey};
use crate::io::map_host::MapHost;
use crate::services::binding::BindingEngine;
use crate::services::registry::EntityRegistry;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HoverState {
    #[default]
    Idle,
    Highlighted(JoinKey),
}

pub struct InteractionStateMachine {
    kind: EntityKind,
    state: HoverState,
    highlight: LayerStyle,
}

impl InteractionStateMachine {
    pub fn new(kind: EntityKind, highlight: LayerStyle) -> Self {
        Self { kind, state: HoverState::Idle, highlight }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn state(&self) -> &HoverState {
        &self.state
    }

    pub fn highlighted(&self) -> Option<&JoinKey> {
        match &self.state {
            HoverState::Highlighted(key) => Some(key),
            HoverState::Idle => None,
        }
    }

    fn highlight_style(&self, entity: &Entity, engine: &BindingEngine) -> StyleApply {
        self.highlight.apply(&entity.key, entity.kind, engine.color_for(entity), true)
    }

    /// Highlight `key`, restoring whatever was highlighted before
    ///
    /// Returns false for keys not registered in this layer.
    pub fn on_hover(
        &mut self,
        key: &JoinKey,
        registry: &EntityRegistry,
        engine: &BindingEngine,
        host: &mut dyn MapHost,
    ) -> bool {
        let Some(entity) = registry.find(self.kind, key) else {
            debug!(kind = %self.kind, key = %key, "hover_unknown_entity");
            return false;
        };

        if let HoverState::Highlighted(previous) = &self.state {
            if previous != key {
                if let Some(prev_entity) = registry.find(self.kind, previous) {
                    host.apply_style(prev_entity.handle, &engine.style_for(prev_entity));
                }
            }
        }

        host.apply_style(entity.handle, &self.highlight_style(entity, engine));
        host.show_info(Some(&InfoPanel::for_entity(entity)));
        debug!(kind = %self.kind, key = %key, "entity_highlighted");
        self.state = HoverState::Highlighted(key.clone());
        true
    }

    /// Drop the highlight if `key` is the highlighted entity
    pub fn on_leave(
        &mut self,
        key: &JoinKey,
        registry: &EntityRegistry,
        engine: &BindingEngine,
        host: &mut dyn MapHost,
    ) -> bool {
        if self.highlighted() != Some(key) {
            debug!(kind = %self.kind, key = %key, "leave_ignored");
            return false;
        }

        self.state = HoverState::Idle;
        if let Some(entity) = registry.find(self.kind, key) {
            host.apply_style(entity.handle, &engine.style_for(entity));
        }
        host.show_info(None);
        true
    }

    /// Ask the host to bring the entity into view
    pub fn on_select(&self, key: &JoinKey, registry: &EntityRegistry, host: &mut dyn MapHost) -> bool {
        match registry.find(self.kind, key) {
            Some(entity) => {
                host.focus(entity.handle, &entity.key);
                true
            }
            None => {
                debug!(kind = %self.kind, key = %key, "select_unknown_entity");
                false
            }
        }
    }

    /// Put the highlight back on top of a freshly bound style
    pub fn reapply(&self, registry: &EntityRegistry, engine: &BindingEngine, host: &mut dyn MapHost) {
        let Some(key) = self.highlighted() else {
            return;
        };
        if let Some(entity) = registry.find(self.kind, key) {
            host.apply_style(entity.handle, &self.highlight_style(entity, engine));
            host.show_info(Some(&InfoPanel::for_entity(entity)));
        }
    }
}
