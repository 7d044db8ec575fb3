//! Entities - the regions and facilities the map binds data onto

use super::types::{CaseDate, DisplayHandle, EntityKind, JoinKey, MetricMap};

/// A region or facility tracked by the engine, independent of its visuals
///
/// `metrics` and `bound_date` are the authoritative bound state and are only
/// written by the binding engine. Everything the map host shows is derived
/// from them.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub key: JoinKey,
    /// Name as it appeared in the geometry input, for display
    pub name: String,
    pub kind: EntityKind,
    pub handle: DisplayHandle,
    metrics: MetricMap,
    bound_date: Option<CaseDate>,
}

impl Entity {
    pub fn new(name: &str, kind: EntityKind, handle: DisplayHandle) -> Self {
        Self {
            key: JoinKey::normalize(name),
            name: name.trim().to_string(),
            kind,
            handle,
            metrics: MetricMap::new(),
            bound_date: None,
        }
    }

    pub fn metrics(&self) -> &MetricMap {
        &self.metrics
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied().flatten()
    }

    /// Date of the snapshot last bound onto this entity
    pub fn bound_date(&self) -> Option<CaseDate> {
        self.bound_date
    }

    pub(crate) fn bind(&mut self, metrics: MetricMap, date: CaseDate) {
        self.metrics = metrics;
        self.bound_date = Some(date);
    }
}

/// Hover info box content
#[derive(Debug, Clone, PartialEq)]
pub struct InfoPanel {
    pub title: String,
    pub lines: Vec<String>,
}

impl InfoPanel {
    pub const PLACEHOLDER: &'static str = "Hover over a region";

    pub fn for_entity(entity: &Entity) -> Self {
        let lines = entity
            .metrics()
            .iter()
            .map(|(name, value)| {
                let label = name.replace('_', " ");
                match value {
                    Some(v) => format!("{} {}", format_metric(*v), label),
                    None => format!("no data ({})", label),
                }
            })
            .collect();
        Self { title: entity.name.clone(), lines }
    }

    pub fn render(&self) -> String {
        let mut out = self.title.clone();
        for line in &self.lines {
            out.push('\n');
            out.push_str(line);
        }
        out
    }
}

/// Whole numbers print without a fraction, everything else with two places
pub fn format_metric(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entity_normalizes_key_and_keeps_name() {
        let entity = Entity::new(" San  Mateo ", EntityKind::Region, DisplayHandle(3));
        assert_eq!(entity.key.as_str(), "san mateo");
        assert_eq!(entity.name, "San  Mateo");
        assert!(entity.metrics().is_empty());
        assert_eq!(entity.bound_date(), None);
    }

    #[test]
    fn test_info_panel_lines() {
        let mut entity = Entity::new("Alpha", EntityKind::Region, DisplayHandle(0));
        let mut metrics = MetricMap::new();
        metrics.insert("cases".to_string(), Some(12000.0));
        metrics.insert("deaths".to_string(), None);
        entity.bind(metrics, CaseDate::from_ymd(2020, 3, 14).unwrap());

        let panel = InfoPanel::for_entity(&entity);
        assert_eq!(panel.title, "Alpha");
        assert_eq!(panel.lines, vec!["12000 cases".to_string(), "no data (deaths)".to_string()]);
        assert_eq!(panel.render(), "Alpha\n12000 cases\nno data (deaths)");
    }

    #[test]
    fn test_format_metric() {
        assert_eq!(format_metric(3.0), "3");
        assert_eq!(format_metric(0.126), "0.13");
        assert_eq!(format_metric(-2.0), "-2");
    }
}
