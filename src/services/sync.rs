//! Sync controller - date requests, fetches and snapshot application
//!
//! Phases: `Idle -> Fetching -> (applied | failed) -> Idle`.
//!
//! Every accepted date request gets the next sequence number and supersedes
//! any request still in flight. Fetches run as separate tasks and report back
//! through a channel; a completion is applied only if its sequence number is
//! the latest issued, so a slow response for an old date can never overwrite
//! a newer one. Superseded fetches are not aborted, their results are ignored.
//!
//! Everything else (binding, hover, select) runs on the controller's own
//! task, which makes each bind pass atomic with respect to hover events.

use crate::domain::snapshot::DatasetSnapshot;
use crate::domain::types::{CaseDate, DateParseError, EntityKind};
use crate::infra::metrics::SyncMetrics;
use crate::io::data_service::{DataService, FetchError};
use crate::io::date_control::DateControl;
use crate::io::map_host::MapHost;
use crate::services::binding::BindReport;
use crate::services::context::MapContext;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Completion channel capacity; at most one live fetch matters at a time
const COMPLETION_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error(transparent)]
    MalformedDate(#[from] DateParseError),
    #[error("fetching {requested} failed: {source}")]
    FetchFailed { requested: CaseDate, source: FetchError },
    #[error("response #{seq} for {requested} superseded by request #{latest}")]
    StaleResponse { seq: u64, latest: u64, requested: CaseDate },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Fetching { seq: u64, requested: CaseDate },
}

/// Result of one fetch task
#[derive(Debug)]
pub struct FetchCompletion {
    pub seq: u64,
    pub requested: CaseDate,
    pub result: Result<DatasetSnapshot, FetchError>,
}

/// Input events from the date control and the map
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapEvent {
    DateInput(String),
    Hover(EntityKind, String),
    Leave(EntityKind, String),
    Select(EntityKind, String),
    Legend,
}

pub struct SyncController {
    context: MapContext,
    service: Arc<dyn DataService>,
    metrics: Arc<SyncMetrics>,
    phase: SyncPhase,
    /// Sequence number of the most recent accepted request
    latest_seq: u64,
    completion_tx: mpsc::Sender<FetchCompletion>,
    completion_rx: mpsc::Receiver<FetchCompletion>,
}

impl SyncController {
    pub fn new(context: MapContext, service: Arc<dyn DataService>, metrics: Arc<SyncMetrics>) -> Self {
        let (completion_tx, completion_rx) = mpsc::channel(COMPLETION_BUFFER);
        Self {
            context,
            service,
            metrics,
            phase: SyncPhase::Idle,
            latest_seq: 0,
            completion_tx,
            completion_rx,
        }
    }

    pub fn context(&self) -> &MapContext {
        &self.context
    }

    pub fn phase(&self) -> &SyncPhase {
        &self.phase
    }

    /// Validate a raw date and start fetching it
    ///
    /// Must be called from within a tokio runtime. Malformed input is
    /// reported to the date control and never reaches the data service.
    pub fn request_date(&mut self, raw: &str, date_control: &mut dyn DateControl) -> Result<u64, SyncError> {
        match raw.parse::<CaseDate>() {
            Ok(date) => Ok(self.start_fetch(date)),
            Err(e) => {
                self.metrics.record_malformed_date();
                let err = SyncError::from(e);
                warn!(input = %raw, "date_rejected");
                self.notify_error(&err, date_control);
                Err(err)
            }
        }
    }

    fn start_fetch(&mut self, requested: CaseDate) -> u64 {
        self.latest_seq += 1;
        let seq = self.latest_seq;

        if let SyncPhase::Fetching { seq: superseded, requested: old } = &self.phase {
            debug!(superseded = %superseded, superseded_date = %old, seq = %seq, "request_superseded");
        }
        self.phase = SyncPhase::Fetching { seq, requested };
        self.metrics.record_fetch_started();
        info!(seq = %seq, date = %requested, "fetch_started");

        let service = self.service.clone();
        let tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = service.fetch(requested).await;
            // Receiver only goes away with the controller
            let _ = tx.send(FetchCompletion { seq, requested, result }).await;
        });
        seq
    }

    /// Wait for the next fetch task to finish
    pub async fn next_completion(&mut self) -> Option<FetchCompletion> {
        self.completion_rx.recv().await
    }

    /// Apply a completed fetch if it is still the latest request
    pub fn apply_completion(
        &mut self,
        completion: FetchCompletion,
        host: &mut dyn MapHost,
        date_control: &mut dyn DateControl,
    ) -> Result<BindReport, SyncError> {
        let FetchCompletion { seq, requested, result } = completion;
        if seq != self.latest_seq {
            self.metrics.record_stale_discarded();
            debug!(seq = %seq, latest = %self.latest_seq, date = %requested, "stale_response_discarded");
            return Err(SyncError::StaleResponse { seq, latest: self.latest_seq, requested });
        }
        self.phase = SyncPhase::Idle;

        match result {
            Ok(snapshot) => {
                let effective = snapshot.date;
                let start = Instant::now();
                let report = self.context.apply_snapshot(snapshot, host);
                let bind_latency_us = start.elapsed().as_micros() as u64;
                self.metrics.record_snapshot_applied(bind_latency_us, report.matched(), report.missed());

                if effective != requested {
                    info!(requested = %requested, served = %effective, "date_substituted");
                }
                info!(
                    seq = %seq,
                    date = %effective,
                    matched = %report.matched(),
                    missed = %report.missed(),
                    bind_latency_us = %bind_latency_us,
                    "snapshot_applied"
                );
                date_control.show_effective_date(effective);
                Ok(report)
            }
            Err(source) => {
                self.metrics.record_fetch_failed();
                let err = SyncError::FetchFailed { requested, source };
                warn!(seq = %seq, error = %err, "fetch_failed");
                self.notify_error(&err, date_control);
                Err(err)
            }
        }
    }

    /// Surface an error and put the last good date back in the control
    fn notify_error(&self, err: &SyncError, date_control: &mut dyn DateControl) {
        date_control.show_error(err);
        if let Some(date) = self.context.store().date() {
            date_control.show_effective_date(date);
        }
    }

    /// Dispatch one input event
    pub fn handle_event(&mut self, event: MapEvent, host: &mut dyn MapHost, date_control: &mut dyn DateControl) {
        match event {
            MapEvent::DateInput(raw) => {
                // Rejections are already surfaced to the date control
                let _ = self.request_date(&raw, date_control);
            }
            MapEvent::Hover(kind, name) => {
                self.context.hover(kind, &name, host);
            }
            MapEvent::Leave(kind, name) => {
                self.context.leave(kind, &name, host);
            }
            MapEvent::Select(kind, name) => {
                self.context.select(kind, &name, host);
            }
            MapEvent::Legend => self.log_legend(),
        }
    }

    fn log_legend(&self) {
        for kind in EntityKind::ALL {
            for entry in self.context.engine().layer(kind).buckets.legend() {
                info!(layer = %kind, label = %entry.label, color = %entry.color, "legend");
            }
        }
    }

    /// Run until shutdown, or until the event stream ends and no fetch is pending
    pub async fn run(
        &mut self,
        mut events: mpsc::Receiver<MapEvent>,
        mut shutdown: watch::Receiver<bool>,
        host: &mut dyn MapHost,
        date_control: &mut dyn DateControl,
    ) {
        self.context.paint(host);
        let mut events_open = true;

        loop {
            if !events_open && self.phase == SyncPhase::Idle {
                break;
            }

            tokio::select! {
                event = events.recv(), if events_open => {
                    match event {
                        Some(event) => self.handle_event(event, host, date_control),
                        None => {
                            debug!("event_stream_closed");
                            events_open = false;
                        }
                    }
                }
                Some(completion) = self.completion_rx.recv() => {
                    // Errors are already logged and surfaced
                    let _ = self.apply_completion(completion, host, date_control);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(phase = ?self.phase, "sync_controller_stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::snapshot::CaseRecord;
    use crate::domain::style::LayerStyle;
    use crate::domain::types::{DisplayHandle, JoinKey};
    use crate::io::date_control::RecordingDateControl;
    use crate::io::map_host::RecordingMapHost;
    use crate::services::binding::BindingEngine;
    use crate::services::registry::EntityRegistry;
    use async_trait::async_trait;
    use rustc_hash::FxHashMap;
    use tokio::sync::oneshot;

    type Reply = Result<DatasetSnapshot, FetchError>;

    /// Data service whose responses are released by the test, per date
    struct GatedService {
        gates: parking_lot::Mutex<FxHashMap<CaseDate, oneshot::Receiver<Reply>>>,
    }

    impl GatedService {
        fn new(dates: &[CaseDate]) -> (Self, FxHashMap<CaseDate, oneshot::Sender<Reply>>) {
            let mut receivers = FxHashMap::default();
            let mut senders = FxHashMap::default();
            for date in dates {
                let (tx, rx) = oneshot::channel();
                senders.insert(*date, tx);
                receivers.insert(*date, rx);
            }
            (Self { gates: parking_lot::Mutex::new(receivers) }, senders)
        }
    }

    #[async_trait]
    impl DataService for GatedService {
        async fn fetch(&self, date: CaseDate) -> Result<DatasetSnapshot, FetchError> {
            let gate = self.gates.lock().remove(&date);
            match gate {
                Some(rx) => rx.await.unwrap_or_else(|_| Err(FetchError::Transport("gate dropped".into()))),
                None => Err(FetchError::Status(404)),
            }
        }
    }

    fn day(d: u32) -> CaseDate {
        CaseDate::from_ymd(2020, 3, d).unwrap()
    }

    fn snapshot(d: u32, alpha_cases: f64) -> DatasetSnapshot {
        DatasetSnapshot::new(day(d))
            .with_record(EntityKind::Region, CaseRecord::new("Alpha", day(d)).with_metric("cases", Some(alpha_cases)))
    }

    fn controller(service: GatedService) -> (SyncController, Arc<SyncMetrics>) {
        let mut registry = EntityRegistry::new();
        registry.register("Alpha", EntityKind::Region, DisplayHandle(0)).unwrap();
        let context = MapContext::new(registry, BindingEngine::default(), LayerStyle::highlight_default());
        let metrics = Arc::new(SyncMetrics::new());
        (SyncController::new(context, Arc::new(service), metrics.clone()), metrics)
    }

    fn alpha_cases(controller: &SyncController) -> Option<f64> {
        controller
            .context()
            .registry()
            .find(EntityKind::Region, &JoinKey::normalize("Alpha"))
            .and_then(|e| e.metric("cases"))
    }

    #[tokio::test]
    async fn test_malformed_date_is_rejected_without_fetch() {
        let (service, _gates) = GatedService::new(&[]);
        let (mut controller, metrics) = controller(service);
        let mut dc = RecordingDateControl::new();

        let err = controller.request_date("2020-13-45", &mut dc).unwrap_err();
        assert!(matches!(err, SyncError::MalformedDate(_)));
        assert_eq!(controller.phase(), &SyncPhase::Idle);
        assert_eq!(metrics.fetches_started(), 0);
        assert_eq!(metrics.malformed_dates(), 1);
        assert_eq!(dc.errors.len(), 1);
        assert_eq!(dc.displayed, None);
    }

    #[tokio::test]
    async fn test_late_response_for_older_request_is_discarded() {
        let (service, mut gates) = GatedService::new(&[day(15), day(16)]);
        let (mut controller, metrics) = controller(service);
        let mut host = RecordingMapHost::new();
        let mut dc = RecordingDateControl::new();

        let seq_a = controller.request_date("2020-3-15", &mut dc).unwrap();
        let seq_b = controller.request_date("2020-3-16", &mut dc).unwrap();
        assert!(seq_b > seq_a);
        assert_eq!(controller.phase(), &SyncPhase::Fetching { seq: seq_b, requested: day(16) });

        gates.remove(&day(16)).unwrap().send(Ok(snapshot(16, 200.0))).unwrap();
        let completion = controller.next_completion().await.unwrap();
        assert_eq!(completion.seq, seq_b);
        controller.apply_completion(completion, &mut host, &mut dc).unwrap();

        gates.remove(&day(15)).unwrap().send(Ok(snapshot(15, 100.0))).unwrap();
        let completion = controller.next_completion().await.unwrap();
        let err = controller.apply_completion(completion, &mut host, &mut dc).unwrap_err();
        assert_eq!(err, SyncError::StaleResponse { seq: seq_a, latest: seq_b, requested: day(15) });

        assert_eq!(controller.context().store().date(), Some(day(16)));
        assert_eq!(alpha_cases(&controller), Some(200.0));
        assert_eq!(dc.displayed, Some(day(16)));
        assert_eq!(metrics.stale_discarded(), 1);
        assert_eq!(controller.phase(), &SyncPhase::Idle);
    }

    #[tokio::test]
    async fn test_early_response_for_older_request_is_discarded() {
        let (service, mut gates) = GatedService::new(&[day(15), day(16)]);
        let (mut controller, _metrics) = controller(service);
        let mut host = RecordingMapHost::new();
        let mut dc = RecordingDateControl::new();

        controller.request_date("2020-3-15", &mut dc).unwrap();
        controller.request_date("2020-3-16", &mut dc).unwrap();

        gates.remove(&day(15)).unwrap().send(Ok(snapshot(15, 100.0))).unwrap();
        let completion = controller.next_completion().await.unwrap();
        assert!(controller.apply_completion(completion, &mut host, &mut dc).is_err());
        assert!(controller.context().store().current().is_none());
        assert!(matches!(controller.phase(), SyncPhase::Fetching { .. }));

        gates.remove(&day(16)).unwrap().send(Ok(snapshot(16, 200.0))).unwrap();
        let completion = controller.next_completion().await.unwrap();
        controller.apply_completion(completion, &mut host, &mut dc).unwrap();
        assert_eq!(controller.context().store().date(), Some(day(16)));
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_last_good_snapshot() {
        let (service, mut gates) = GatedService::new(&[day(15), day(16)]);
        let (mut controller, metrics) = controller(service);
        let mut host = RecordingMapHost::new();
        let mut dc = RecordingDateControl::new();

        controller.request_date("2020-3-15", &mut dc).unwrap();
        gates.remove(&day(15)).unwrap().send(Ok(snapshot(15, 12_000.0))).unwrap();
        let completion = controller.next_completion().await.unwrap();
        controller.apply_completion(completion, &mut host, &mut dc).unwrap();
        let painted = host.style(DisplayHandle(0)).unwrap().clone();

        controller.request_date("2020-3-16", &mut dc).unwrap();
        gates.remove(&day(16)).unwrap().send(Err(FetchError::Status(500))).unwrap();
        let completion = controller.next_completion().await.unwrap();
        let err = controller.apply_completion(completion, &mut host, &mut dc).unwrap_err();

        assert_eq!(err, SyncError::FetchFailed { requested: day(16), source: FetchError::Status(500) });
        assert_eq!(controller.context().store().date(), Some(day(15)));
        assert_eq!(alpha_cases(&controller), Some(12_000.0));
        assert_eq!(host.style(DisplayHandle(0)).unwrap(), &painted);
        assert_eq!(dc.displayed, Some(day(15)));
        assert_eq!(dc.errors.len(), 1);
        assert_eq!(metrics.fetches_failed(), 1);
        assert_eq!(controller.phase(), &SyncPhase::Idle);
    }

    #[tokio::test]
    async fn test_run_drains_pending_fetch_after_events_close() {
        let (service, mut gates) = GatedService::new(&[day(15)]);
        let (mut controller, _metrics) = controller(service);
        let mut host = RecordingMapHost::new();
        let mut dc = RecordingDateControl::new();
        let (event_tx, event_rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        event_tx.send(MapEvent::DateInput("2020-3-15".to_string())).await.unwrap();
        event_tx.send(MapEvent::Hover(EntityKind::Region, "alpha".to_string())).await.unwrap();
        drop(event_tx);
        gates.remove(&day(15)).unwrap().send(Ok(snapshot(15, 45_000.0))).unwrap();

        controller.run(event_rx, shutdown_rx, &mut host, &mut dc).await;

        assert_eq!(dc.displayed, Some(day(15)));
        let style = host.style(DisplayHandle(0)).unwrap();
        assert!(style.highlighted);
        assert_eq!(style.color_key, "#FC4E2A");
    }
}
