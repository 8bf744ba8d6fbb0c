//! Console rendering of the dashboard view, the alert banner and the audit feed.

use crate::poller::DashboardView;
use std::fmt::Write as _;
use time::format_description::well_known::Rfc3339;
use tokio::sync::{mpsc, watch};
use vitals_core::{AlertEvent, Assignment, AuditRecord, VitalsReading};

const BELL: char = '\u{7}';

/// Newest value of a channel across a device's readings (newest first).
fn latest(readings: &[VitalsReading], channel: fn(&VitalsReading) -> Option<f64>) -> Option<f64> {
    readings.iter().find_map(channel)
}

fn cell(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.decimals$}"))
}

fn roster_line(assignment: &Assignment, readings: &[VitalsReading]) -> String {
    format!(
        "{:<9} {:<24} {:<10} HR {:>5}  SpO2 {:>5}  Temp {:>5}",
        assignment.status.as_str().to_uppercase(),
        assignment.display_name(),
        assignment.device_id,
        cell(latest(readings, |r| r.heart_rate), 0),
        cell(latest(readings, |r| r.spo2), 0),
        cell(latest(readings, |r| r.skin_temp), 1),
    )
}

pub fn render_view(view: &DashboardView) -> String {
    let mut out = String::new();
    if view.load_error {
        let _ = writeln!(out, "!! error loading data from kernel, showing last known state");
    }
    if view.roster.is_empty() {
        let _ = writeln!(out, "(no patients registered)");
    }
    for assignment in &view.roster {
        let _ = writeln!(out, "{}", roster_line(assignment, view.readings_for(assignment)));
    }
    out
}

pub fn render_banner(event: &AlertEvent) -> String {
    let at = event.detected_at.format(&Rfc3339).unwrap_or_default();
    format!("{BELL}*** CRITICAL: {} ({}) at {at} ***", event.patient_name, event.patient_id)
}

pub fn render_record(record: &AuditRecord) -> String {
    format!("[{}] {} {}", record.timestamp, record.kind, record.details)
}

/// Prints every view refresh, every newly raised banner and every audit record
/// until all inputs are closed or `shutdown` turns true.
pub async fn run(
    mut views: watch::Receiver<DashboardView>,
    mut alerts: watch::Receiver<Option<AlertEvent>>,
    mut records: mpsc::Receiver<AuditRecord>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            changed = views.changed() => {
                if changed.is_err() { break; }
                let text = render_view(&views.borrow_and_update());
                println!("{text}");
            }
            changed = alerts.changed() => {
                if changed.is_err() { break; }
                if let Some(event) = alerts.borrow_and_update().clone() {
                    println!("{}", render_banner(&event));
                }
            }
            Some(record) = records.recv() => println!("{}", render_record(&record)),
        }
    }
}
