use serde::{Deserialize, Serialize};
use std::fmt;

/// On/Off peak classification of an hour per the regional calendar convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeakLabel {
    On,
    Off,
}

impl PeakLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeakLabel::On => "On",
            PeakLabel::Off => "Off",
        }
    }
}

impl fmt::Display for PeakLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the hour classification lookup.
///
/// `dow` is Monday-first 0-6, `hour_ending` is 1-24. Together they cover the
/// full week grid of 168 slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HourClassRow {
    pub dow: i32,
    pub hour_ending: i32,
    pub label: PeakLabel,
}

/// Counters reported after a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub horizon_hours: usize,
    pub hub_count: usize,
    pub hub_on_off_count: usize,
    pub rows_written: usize,
    /// Largest relative deviation between reconciled monthly means and the
    /// input forecast, checked against the 1e-9 tolerance.
    pub max_reconciliation_error: f64,
}
