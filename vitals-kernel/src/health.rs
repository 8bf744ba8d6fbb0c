use crate::store::Stores;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

#[derive(Debug, Serialize, Deserialize)]
pub struct KernelHealth {
    pub started_at: String,
    pub uptime_seconds: u64,
    pub patients_tracked: u32,
    pub readings_stored: u64,
    pub memory_usage_mb: f32,
    pub mqtt_status: String,
    pub mqtt_reconnects: u32,
}

#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    started_at: OffsetDateTime,
    mqtt_reconnects: Arc<AtomicU32>,
    mqtt_status: Arc<Mutex<String>>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            started_at: OffsetDateTime::now_utc(),
            mqtt_reconnects: Arc::new(AtomicU32::new(0)),
            mqtt_status: Arc::new(Mutex::new("disabled".to_string())),
        }
    }

    pub fn mark_mqtt_connecting(&self) {
        *self.mqtt_status.lock() = "connecting".to_string();
    }

    pub fn mark_mqtt_connected(&self) {
        *self.mqtt_status.lock() = "connected".to_string();
    }

    pub fn increment_reconnects(&self) {
        self.mqtt_reconnects.fetch_add(1, Ordering::Relaxed);
        *self.mqtt_status.lock() = "reconnecting".to_string();
    }

    pub fn get_health(&self, stores: &Stores) -> KernelHealth {
        KernelHealth {
            started_at: self.started_at.format(&Rfc3339).unwrap_or_default(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            patients_tracked: stores.assignments.count() as u32,
            readings_stored: stores.vitals.count() as u64,
            memory_usage_mb: get_memory_usage_mb(),
            mqtt_status: self.mqtt_status.lock().clone(),
            mqtt_reconnects: self.mqtt_reconnects.load(Ordering::Relaxed),
        }
    }
}

fn get_memory_usage_mb() -> f32 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if let Some(rest) = line.strip_prefix("VmRSS:") {
                    if let Some(kb) = rest.split_whitespace().next().and_then(|s| s.parse::<u64>().ok()) {
                        return (kb as f32) / 1024.0; // KB -> MB
                    }
                }
            }
        }
    }

    // inconnu hors Linux
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mqtt_status_transitions() {
        let tracker = HealthTracker::new();
        let stores = Stores::in_memory();
        let health = tracker.get_health(&stores);
        assert_eq!(health.mqtt_status, "disabled");
        assert!(health.started_at.ends_with('Z'));

        tracker.mark_mqtt_connecting();
        tracker.increment_reconnects();
        let health = tracker.get_health(&stores);
        assert_eq!(health.mqtt_status, "reconnecting");
        assert_eq!(health.mqtt_reconnects, 1);

        tracker.mark_mqtt_connected();
        assert_eq!(tracker.get_health(&stores).mqtt_status, "connected");
        assert_eq!(tracker.get_health(&stores).patients_tracked, 0);
    }
}
