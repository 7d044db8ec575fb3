//! Map rendering host interface
//!
//! The engine never draws anything. It hands style-apply calls, focus
//! requests and info panel updates to a `MapHost`, which owns the actual
//! features and markers behind each `DisplayHandle`.

use crate::domain::entity::InfoPanel;
use crate::domain::style::StyleApply;
use crate::domain::types::{DisplayHandle, JoinKey};
use rustc_hash::FxHashMap;
use tracing::{debug, info};

pub trait MapHost {
    /// Restyle the feature or marker behind `handle`
    fn apply_style(&mut self, handle: DisplayHandle, style: &StyleApply);

    /// Pan/zoom so the entity fills the view
    fn focus(&mut self, handle: DisplayHandle, key: &JoinKey);

    /// Show the hover info box, or its placeholder when `None`
    fn show_info(&mut self, panel: Option<&InfoPanel>);
}

/// Host that logs every call, used by the console binary
#[derive(Debug, Default)]
pub struct TracingMapHost {
    applied: u64,
}

impl TracingMapHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of style applications so far
    pub fn applied(&self) -> u64 {
        self.applied
    }
}

impl MapHost for TracingMapHost {
    fn apply_style(&mut self, handle: DisplayHandle, style: &StyleApply) {
        self.applied += 1;
        debug!(
            handle = %handle,
            key = %style.key,
            kind = %style.kind,
            color = %style.color_key,
            stroke = %style.stroke_color,
            weight = %style.weight,
            opacity = %style.opacity,
            highlighted = %style.highlighted,
            "style_applied"
        );
    }

    fn focus(&mut self, handle: DisplayHandle, key: &JoinKey) {
        info!(handle = %handle, key = %key, "focus_requested");
    }

    fn show_info(&mut self, panel: Option<&InfoPanel>) {
        match panel {
            Some(panel) => info!(title = %panel.title, lines = ?panel.lines, "info_panel"),
            None => info!(title = %InfoPanel::PLACEHOLDER, "info_panel"),
        }
    }
}

/// Host that remembers the last style per handle and every other call
///
/// Serves headless embedding and tests.
#[derive(Debug, Default)]
pub struct RecordingMapHost {
    styles: FxHashMap<DisplayHandle, StyleApply>,
    applied: Vec<(DisplayHandle, StyleApply)>,
    focused: Vec<DisplayHandle>,
    info: Option<InfoPanel>,
}

impl RecordingMapHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Style currently shown for `handle`
    pub fn style(&self, handle: DisplayHandle) -> Option<&StyleApply> {
        self.styles.get(&handle)
    }

    pub fn styles(&self) -> &FxHashMap<DisplayHandle, StyleApply> {
        &self.styles
    }

    /// Every style application, oldest first
    pub fn history(&self) -> &[(DisplayHandle, StyleApply)] {
        &self.applied
    }

    pub fn focused(&self) -> &[DisplayHandle] {
        &self.focused
    }

    pub fn info(&self) -> Option<&InfoPanel> {
        self.info.as_ref()
    }

    pub fn clear_history(&mut self) {
        self.applied.clear();
    }
}

impl MapHost for RecordingMapHost {
    fn apply_style(&mut self, handle: DisplayHandle, style: &StyleApply) {
        self.styles.insert(handle, style.clone());
        self.applied.push((handle, style.clone()));
    }

    fn focus(&mut self, handle: DisplayHandle, _key: &JoinKey) {
        self.focused.push(handle);
    }

    fn show_info(&mut self, panel: Option<&InfoPanel>) {
        self.info = panel.cloned();
    }
}
