//! Polling session: the dashboard's only refresh mechanism.
//!
//! Every tick fetches the roster and the recent vitals of each assigned
//! device, then feeds each patient's status through the alert machine with the
//! status seen on the previous successful poll. A failed poll changes nothing
//! but the `load_error` flag.

use crate::client::{DashboardSource, SourceError};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use vitals_core::{sort_by_severity, AlertBoard, AlertMachine, AlertSignal, Assignment, Status, VitalsReading};

/// What a presentation layer renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardView {
    /// Severity order: critical, warning, ok, unknown.
    pub roster: Vec<Assignment>,
    /// Readings per device id, newest first.
    pub vitals: HashMap<String, Vec<VitalsReading>>,
    /// The last poll failed; the rest of the view is from the last success.
    pub load_error: bool,
    pub last_success: Option<OffsetDateTime>,
}

impl DashboardView {
    pub fn readings_for(&self, assignment: &Assignment) -> &[VitalsReading] {
        self.vitals.get(&assignment.device_id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Result of the fetch half of a poll.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub roster: Vec<Assignment>,
    pub vitals: HashMap<String, Vec<VitalsReading>>,
}

pub struct PollingClient<S> {
    source: S,
    window: usize,
    period: Duration,
    previous: HashMap<String, Status>,
    alerts: AlertMachine,
    board: AlertBoard,
    view_tx: watch::Sender<DashboardView>,
}

impl<S: DashboardSource> PollingClient<S> {
    pub fn new(source: S, window: usize, period: Duration, board: AlertBoard) -> Self {
        let (view_tx, _rx) = watch::channel(DashboardView::default());
        Self {
            source,
            window,
            period,
            previous: HashMap::new(),
            alerts: AlertMachine::default(),
            board,
            view_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardView> {
        self.view_tx.subscribe()
    }

    pub fn view(&self) -> DashboardView {
        self.view_tx.borrow().clone()
    }

    pub fn previous_status(&self, patient_id: &str) -> Option<Status> {
        self.previous.get(patient_id).copied()
    }

    /// Roster first, then vitals for every assigned device since its registration.
    pub async fn fetch(&self) -> Result<Snapshot, SourceError> {
        let roster = self.source.fetch_roster().await?;
        let pairs: Vec<(String, String)> = roster
            .iter()
            .map(|a| (a.device_id.clone(), a.timestamp.clone()))
            .collect();

        let vitals = if pairs.is_empty() {
            HashMap::new()
        } else {
            self.source
                .fetch_recent_vitals(&pairs, self.window)
                .await?
                .into_iter()
                .map(|d| (d.device_id, d.readings))
                .collect()
        };
        Ok(Snapshot { roster, vitals })
    }

    /// Folds one fetch result into the session state and returns the alert
    /// signals it produced (already applied to the board).
    pub fn apply(&mut self, result: Result<Snapshot, SourceError>, now: Instant) -> Vec<AlertSignal> {
        let mut signals = match result {
            Ok(snapshot) => self.apply_snapshot(snapshot, now),
            Err(e) => {
                warn!("dashboard poll failed: {e}");
                self.view_tx.send_modify(|view| view.load_error = true);
                Vec::new()
            }
        };

        // auto-clear fires even when nothing new was observed
        signals.extend(self.alerts.expire(now));

        for signal in &signals {
            match signal {
                AlertSignal::Raised(event) => {
                    warn!(patient_id = %event.patient_id, patient = %event.patient_name, "CRITICAL alert raised")
                }
                AlertSignal::Cleared { patient_id, reason } => debug!(patient_id = %patient_id, ?reason, "alert cleared"),
            }
            self.board.apply(signal);
        }
        signals
    }

    fn apply_snapshot(&mut self, snapshot: Snapshot, now: Instant) -> Vec<AlertSignal> {
        let Snapshot { mut roster, vitals } = snapshot;
        sort_by_severity(&mut roster);

        let mut signals = Vec::new();

        let present: HashSet<&str> = roster.iter().map(|a| a.patient_id.as_str()).collect();
        let departed: Vec<String> = self
            .previous
            .keys()
            .filter(|id| !present.contains(id.as_str()))
            .cloned()
            .collect();
        for patient_id in departed {
            info!(patient_id = %patient_id, "patient left the roster");
            self.previous.remove(&patient_id);
            signals.extend(self.alerts.forget(&patient_id));
        }

        for assignment in &roster {
            let previous = self.previous.get(&assignment.patient_id).copied();
            signals.extend(self.alerts.observe(
                &assignment.patient_id,
                assignment.display_name(),
                previous,
                assignment.status,
                now,
            ));
            self.previous.insert(assignment.patient_id.clone(), assignment.status);
        }

        self.view_tx.send_replace(DashboardView {
            roster,
            vitals,
            load_error: false,
            last_success: Some(OffsetDateTime::now_utc()),
        });
        signals
    }

    pub async fn poll_once(&mut self, now: Instant) -> Vec<AlertSignal> {
        let result = self.fetch().await;
        self.apply(result, now)
    }

    /// Fixed-period loop until `shutdown` turns true (or its sender goes away).
    /// A fetch in flight at shutdown completes but is not applied.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(period_ms = self.period.as_millis() as u64, window = self.window, "polling session started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }

            let result = self.fetch().await;
            if *shutdown.borrow() {
                debug!("shutdown during poll, result discarded");
                break;
            }
            self.apply(result, Instant::now());
        }
        info!("polling session stopped");
    }
}
