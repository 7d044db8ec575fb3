//! Date input control interface
//!
//! Receives the effective date of every applied snapshot (which may differ
//! from the date the user picked) and user-visible error notices.

use crate::domain::types::CaseDate;
use crate::services::sync::SyncError;
use tracing::{info, warn};

pub trait DateControl {
    fn show_effective_date(&mut self, date: CaseDate);

    fn show_error(&mut self, error: &SyncError);
}

/// Date control that writes to the log, used by the console binary
#[derive(Debug, Default)]
pub struct TracingDateControl;

impl DateControl for TracingDateControl {
    fn show_effective_date(&mut self, date: CaseDate) {
        info!(date = %date, "date_displayed");
    }

    fn show_error(&mut self, error: &SyncError) {
        warn!(error = %error, "date_error_notice");
    }
}

/// Date control that keeps what it was shown
#[derive(Debug, Default)]
pub struct RecordingDateControl {
    pub displayed: Option<CaseDate>,
    pub errors: Vec<String>,
}

impl RecordingDateControl {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DateControl for RecordingDateControl {
    fn show_effective_date(&mut self, date: CaseDate) {
        self.displayed = Some(date);
    }

    fn show_error(&mut self, error: &SyncError) {
        self.errors.push(error.to_string());
    }
}
