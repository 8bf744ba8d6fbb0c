//! Shared "current critical alert" cell.
//!
//! One writer (the polling session driving the [`AlertMachine`](crate::alert::AlertMachine))
//! and any number of readers (banner, sound, logs). Readers either peek with
//! [`AlertBoard::current`] or await changes on a [`watch::Receiver`].

use crate::alert::AlertSignal;
use crate::models::AlertEvent;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct AlertBoard {
    tx: Arc<watch::Sender<Option<AlertEvent>>>,
}

impl Default for AlertBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertBoard {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// The newest alert replaces whatever banner is showing.
    pub fn raise(&self, event: AlertEvent) {
        self.tx.send_replace(Some(event));
    }

    /// Clears the banner only if it belongs to `patient_id`. Returns whether it did.
    pub fn clear_for(&self, patient_id: &str) -> bool {
        self.tx.send_if_modified(|current| {
            if current.as_ref().is_some_and(|e| e.patient_id == patient_id) {
                *current = None;
                true
            } else {
                false
            }
        })
    }

    pub fn apply(&self, signal: &AlertSignal) {
        match signal {
            AlertSignal::Raised(event) => self.raise(event.clone()),
            AlertSignal::Cleared { patient_id, .. } => {
                self.clear_for(patient_id);
            }
        }
    }

    pub fn current(&self) -> Option<AlertEvent> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<AlertEvent>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::ClearReason;
    use time::OffsetDateTime;

    fn event(patient_id: &str) -> AlertEvent {
        AlertEvent {
            patient_id: patient_id.into(),
            patient_name: patient_id.to_uppercase(),
            detected_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn test_clear_only_own_banner() {
        let board = AlertBoard::new();
        board.raise(event("p1"));
        board.raise(event("p2"));

        assert!(!board.clear_for("p1"));
        assert_eq!(board.current().map(|e| e.patient_id), Some("p2".to_string()));

        board.apply(&AlertSignal::Cleared {
            patient_id: "p2".into(),
            reason: ClearReason::Expired,
        });
        assert!(board.current().is_none());
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let board = AlertBoard::new();
        let mut rx = board.subscribe();

        let writer = board.clone();
        tokio::spawn(async move {
            writer.apply(&AlertSignal::Raised(event("p1")));
        });

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().as_ref().map(|e| e.patient_id.clone()), Some("p1".to_string()));
    }
}
