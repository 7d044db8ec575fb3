//! End-to-end flow: date input -> fetch -> bind -> styles and displayed date

use async_trait::async_trait;
use case_map::domain::snapshot::DatasetSnapshot;
use case_map::domain::style::LayerStyle;
use case_map::domain::types::{CaseDate, DisplayHandle, EntityKind, JoinKey};
use case_map::infra::SyncMetrics;
use case_map::io::data_service::decode_response;
use case_map::io::geometry::parse_manifest;
use case_map::io::{DataService, FetchError, RecordingDateControl, RecordingMapHost};
use case_map::services::{BindingEngine, MapContext, MapEvent, SyncController};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

const MANIFEST: &str = r#"[
    {"properties": {"name": "Alpha", "kind": "county"}, "geometry": {"type": "Polygon", "coordinates": []}},
    {"properties": {"name": "Beta", "kind": "county"}, "geometry": {"type": "Polygon", "coordinates": []}},
    {"properties": {"name": "Sunrise Care"}, "geometry": {"type": "Point", "coordinates": [0, 0]}},
    {"properties": {"name": "Hillside Home"}, "geometry": {"type": "Point", "coordinates": [1, 1]}}
]"#;

/// Serves 2020-3-14 for any request, the way the service substitutes the
/// nearest available date
struct NearestDateService;

#[async_trait]
impl DataService for NearestDateService {
    async fn fetch(&self, date: CaseDate) -> Result<DatasetSnapshot, FetchError> {
        if date == CaseDate::from_ymd(2020, 1, 1).unwrap() {
            return Err(FetchError::Status(503));
        }
        decode_response(
            br#"{
                "date": "2020-3-14",
                "regionRecords": [
                    {"county": "Alpha", "cases": 12000, "deaths": 40},
                    {"county": "Gamma", "cases": 5}
                ],
                "facilityRecords": [
                    {"facility": "Sunrise Care", "county": "Alameda", "resident_cases": "NA", "staff_cases": 2, "total_cases": 17},
                    {"county": null, "total_cases": 900}
                ]
            }"#,
        )
        .map(|decoded| decoded.snapshot)
    }
}

fn controller() -> SyncController {
    let (registry, _) = parse_manifest(MANIFEST).unwrap();
    let context = MapContext::new(registry, BindingEngine::default(), LayerStyle::highlight_default());
    SyncController::new(context, Arc::new(NearestDateService), Arc::new(SyncMetrics::new()))
}

async fn run_events(controller: &mut SyncController, events: Vec<MapEvent>) -> (RecordingMapHost, RecordingDateControl) {
    let mut host = RecordingMapHost::new();
    let mut date_control = RecordingDateControl::new();
    let (event_tx, event_rx) = mpsc::channel(16);
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    for event in events {
        event_tx.send(event).await.unwrap();
    }
    drop(event_tx);

    controller.run(event_rx, shutdown_rx, &mut host, &mut date_control).await;
    (host, date_control)
}

#[tokio::test]
async fn test_requested_date_substituted_and_bound() {
    let mut controller = controller();
    let (host, date_control) = run_events(
        &mut controller,
        vec![
            MapEvent::DateInput("2020-3-15".to_string()),
            MapEvent::Hover(EntityKind::Region, "Alpha".to_string()),
            MapEvent::Leave(EntityKind::Region, "Alpha".to_string()),
        ],
    )
    .await;

    let served = CaseDate::from_ymd(2020, 3, 14).unwrap();
    assert_eq!(date_control.displayed, Some(served));
    assert!(date_control.errors.is_empty());
    assert_eq!(controller.context().store().date(), Some(served));

    // Alpha: 12000 cases, 10000-15000 bucket
    let alpha = host.style(DisplayHandle(0)).unwrap();
    assert_eq!(alpha.color_key, "#FED976");
    assert!(!alpha.highlighted);

    // Beta: no record, regions treat that as zero cases
    let beta_entity = controller
        .context()
        .registry()
        .find(EntityKind::Region, &JoinKey::normalize("beta"))
        .unwrap();
    assert_eq!(beta_entity.metric("cases"), Some(0.0));
    assert_eq!(host.style(DisplayHandle(1)).unwrap().color_key, "#FFEDA0");

    // Sunrise: resident count missing, falls back to the reported total
    assert_eq!(host.style(DisplayHandle(2)).unwrap().color_key, "#78c679");

    // Hillside: no record, facilities show no data
    assert_eq!(host.style(DisplayHandle(3)).unwrap().color_key, "#cccccc");
}

#[tokio::test]
async fn test_malformed_and_failed_dates_keep_last_good_state() {
    let mut controller = controller();
    let (_, first) = run_events(&mut controller, vec![MapEvent::DateInput("2020-3-15".to_string())]).await;
    assert!(first.errors.is_empty());

    let (host, date_control) = run_events(
        &mut controller,
        vec![
            MapEvent::DateInput("2020-02-30".to_string()),
            MapEvent::DateInput("2020-1-1".to_string()),
        ],
    )
    .await;

    assert_eq!(date_control.errors.len(), 2);
    assert_eq!(date_control.displayed, CaseDate::from_ymd(2020, 3, 14));
    assert_eq!(controller.context().store().date(), CaseDate::from_ymd(2020, 3, 14));
    // Rejected dates leave the bound colours in place
    assert_eq!(host.style(DisplayHandle(0)).unwrap().color_key, "#FED976");
}

#[tokio::test]
async fn test_hover_survives_rebind() {
    let mut controller = controller();
    run_events(&mut controller, vec![MapEvent::DateInput("2020-3-15".to_string())]).await;

    let (host, _) = run_events(
        &mut controller,
        vec![
            MapEvent::Hover(EntityKind::Facility, "sunrise care".to_string()),
            MapEvent::DateInput("2020-3-16".to_string()),
        ],
    )
    .await;

    let sunrise = host.style(DisplayHandle(2)).unwrap();
    assert!(sunrise.highlighted);
    assert_eq!(sunrise.color_key, "#78c679");
    let panel = host.info().unwrap();
    assert_eq!(panel.title, "Sunrise Care");
}
