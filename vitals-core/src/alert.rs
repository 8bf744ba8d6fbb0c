//! Critical-alert state machine.
//!
//! Each patient is either `normal` or `alerting`. A transition into `critical`
//! (previous observation not critical) raises one [`AlertEvent`] and arms a
//! fixed auto-clear deadline. Further critical observations are suppressed and
//! do not move the deadline. Leaving `critical` clears the alert at once;
//! whichever of the two clears first wins.
//!
//! Time is passed in by the caller so the machine stays deterministic.

use crate::models::AlertEvent;
use crate::status::Status;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tracing::debug;

/// Lifetime of a raised alert when the patient stays critical.
pub const AUTO_CLEAR: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertPhase {
    Normal,
    Alerting { raised_at: Instant, clears_at: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearReason {
    /// Patient left `critical`.
    Recovered,
    /// Auto-clear deadline passed.
    Expired,
    /// Patient disappeared from the roster.
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertSignal {
    Raised(AlertEvent),
    Cleared { patient_id: String, reason: ClearReason },
}

#[derive(Debug, Clone, Copy)]
struct LiveAlert {
    raised_at: Instant,
    clears_at: Instant,
}

#[derive(Debug)]
pub struct AlertMachine {
    auto_clear: Duration,
    live: HashMap<String, LiveAlert>,
}

impl Default for AlertMachine {
    fn default() -> Self {
        Self::new(AUTO_CLEAR)
    }
}

impl AlertMachine {
    pub fn new(auto_clear: Duration) -> Self {
        Self {
            auto_clear,
            live: HashMap::new(),
        }
    }

    /// Phase as of `now`; an alert past its deadline already reads as `Normal`.
    pub fn phase(&self, patient_id: &str, now: Instant) -> AlertPhase {
        match self.live.get(patient_id) {
            Some(live) if live.clears_at > now => AlertPhase::Alerting {
                raised_at: live.raised_at,
                clears_at: live.clears_at,
            },
            _ => AlertPhase::Normal,
        }
    }

    pub fn is_alerting(&self, patient_id: &str, now: Instant) -> bool {
        matches!(self.phase(patient_id, now), AlertPhase::Alerting { .. })
    }

    /// Feed one successful observation for a patient.
    ///
    /// `previous` is the status seen for this patient on the preceding poll
    /// (`None` the first time the patient is seen).
    pub fn observe(
        &mut self,
        patient_id: &str,
        patient_name: &str,
        previous: Option<Status>,
        current: Status,
        now: Instant,
    ) -> Vec<AlertSignal> {
        let mut signals = Vec::new();

        if self.live.get(patient_id).is_some_and(|live| live.clears_at <= now) {
            self.live.remove(patient_id);
            signals.push(AlertSignal::Cleared {
                patient_id: patient_id.to_string(),
                reason: ClearReason::Expired,
            });
        }

        let alerting = self.live.contains_key(patient_id);
        match (alerting, current.is_critical()) {
            // duplicate: the original deadline stands
            (true, true) => {}
            (true, false) => {
                self.live.remove(patient_id);
                signals.push(AlertSignal::Cleared {
                    patient_id: patient_id.to_string(),
                    reason: ClearReason::Recovered,
                });
            }
            (false, true) if previous != Some(Status::Critical) => {
                self.live.insert(
                    patient_id.to_string(),
                    LiveAlert {
                        raised_at: now,
                        clears_at: now + self.auto_clear,
                    },
                );
                debug!(patient_id, "critical transition, alert raised");
                signals.push(AlertSignal::Raised(AlertEvent {
                    patient_id: patient_id.to_string(),
                    patient_name: patient_name.to_string(),
                    detected_at: OffsetDateTime::now_utc(),
                }));
            }
            // still critical after the alert timed out: same episode, stay quiet
            (false, true) => {}
            (false, false) => {}
        }

        signals
    }

    /// Drops every alert whose deadline has passed.
    pub fn expire(&mut self, now: Instant) -> Vec<AlertSignal> {
        let expired: Vec<String> = self
            .live
            .iter()
            .filter(|(_, live)| live.clears_at <= now)
            .map(|(id, _)| id.clone())
            .collect();

        expired
            .into_iter()
            .map(|patient_id| {
                self.live.remove(&patient_id);
                AlertSignal::Cleared {
                    patient_id,
                    reason: ClearReason::Expired,
                }
            })
            .collect()
    }

    /// Forget a patient entirely (deregistered, or gone from the roster).
    pub fn forget(&mut self, patient_id: &str) -> Option<AlertSignal> {
        self.live.remove(patient_id).map(|_| AlertSignal::Cleared {
            patient_id: patient_id.to_string(),
            reason: ClearReason::Removed,
        })
    }

    pub fn live_count(&self, now: Instant) -> usize {
        self.live.values().filter(|live| live.clears_at > now).count()
    }
}
