use super::{Collection, RecentQuery, StoreError, VitalsStore};
use vitals_core::models::{compare_timestamps, is_after};
use vitals_core::{DeviceVitals, VitalsReading};

pub struct JsonVitals {
    docs: Collection<VitalsReading>,
}

impl JsonVitals {
    pub fn new(docs: Collection<VitalsReading>) -> Self {
        Self { docs }
    }
}

impl VitalsStore for JsonVitals {
    fn insert(&self, reading: VitalsReading) -> Result<(), StoreError> {
        self.docs.push(reading)
    }

    fn recent(&self, queries: &[RecentQuery], limit: usize) -> Result<Vec<DeviceVitals>, StoreError> {
        Ok(self.docs.read(|docs| {
            queries
                .iter()
                .map(|query| {
                    // plus récent inséré d'abord pour départager les horodatages égaux
                    let mut readings: Vec<VitalsReading> = docs
                        .iter()
                        .rev()
                        .filter(|r| r.device_id == query.device_id)
                        .filter(|r| query.since.as_deref().map_or(true, |since| is_after(&r.timestamp, since)))
                        .cloned()
                        .collect();
                    readings.sort_by(|a, b| compare_timestamps(&b.timestamp, &a.timestamp));
                    readings.truncate(limit);
                    DeviceVitals {
                        device_id: query.device_id.clone(),
                        readings,
                    }
                })
                .collect()
        }))
    }

    fn count(&self) -> usize {
        self.docs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(device_id: &str, ts: &str, hr: f64) -> VitalsReading {
        VitalsReading {
            device_id: device_id.into(),
            timestamp: ts.into(),
            heart_rate: Some(hr),
            ..Default::default()
        }
    }

    fn query(device_id: &str, since: Option<&str>) -> RecentQuery {
        RecentQuery {
            device_id: device_id.into(),
            since: since.map(String::from),
        }
    }

    #[test]
    fn test_recent_is_strictly_after_newest_first_and_limited() {
        let store = JsonVitals::new(Collection::in_memory("data"));
        // inserted out of order on purpose
        store.insert(reading("w-1", "2025-03-01T10:00:02Z", 72.0)).unwrap();
        store.insert(reading("w-1", "2025-03-01T10:00:00Z", 70.0)).unwrap();
        store.insert(reading("w-1", "2025-03-01T10:00:03Z", 73.0)).unwrap();
        store.insert(reading("w-1", "2025-03-01T10:00:01Z", 71.0)).unwrap();
        store.insert(reading("w-2", "2025-03-01T10:00:05Z", 90.0)).unwrap();

        let result = store
            .recent(&[query("w-1", Some("2025-03-01T10:00:00Z"))], 2)
            .unwrap();
        assert_eq!(result.len(), 1);
        let hrs: Vec<f64> = result[0].readings.iter().filter_map(|r| r.heart_rate).collect();
        assert_eq!(hrs, vec![73.0, 72.0]);

        let all = store.recent(&[query("w-1", Some("2025-03-01T10:00:00Z"))], 10).unwrap();
        assert_eq!(all[0].readings.len(), 3, "the reading at the threshold itself is excluded");
    }

    #[test]
    fn test_recent_per_device_fan_out() {
        let store = JsonVitals::new(Collection::in_memory("data"));
        store.insert(reading("w-1", "2025-03-01T10:00:00Z", 70.0)).unwrap();
        store.insert(reading("w-2", "2025-03-01T10:00:00Z", 90.0)).unwrap();

        let result = store
            .recent(&[query("w-2", None), query("w-unknown", None), query("w-1", None)], 120)
            .unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].readings[0].heart_rate, Some(90.0));
        assert!(result[1].readings.is_empty());
        assert_eq!(result[2].readings[0].heart_rate, Some(70.0));
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_recent_window_with_mixed_timestamp_forms() {
        let store = JsonVitals::new(Collection::in_memory("data"));
        store.insert(reading("w-1", "2025-03-01T10:00:00.7", 115.0)).unwrap();
        store.insert(reading("w-1", "2025-03-01T10:00:00Z", 150.0)).unwrap();
        store.insert(reading("w-1", "2025-03-01T10:00:00.5Z", 70.0)).unwrap();

        let newest = store.recent(&[query("w-1", None)], 1).unwrap();
        assert_eq!(newest[0].readings[0].heart_rate, Some(115.0));

        let after = store.recent(&[query("w-1", Some("2025-03-01T10:00:00.6"))], 10).unwrap();
        assert_eq!(after[0].readings.len(), 1);
    }
}
