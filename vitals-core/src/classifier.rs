//! Status Classifier: maps a window of readings for one device to a [`Status`].
//!
//! The function is pure and total. For each graded channel the newest reading
//! carrying that channel wins, whatever order the readings arrive in; the
//! patient's status is the worst channel grade. Without any graded channel the
//! result is [`Status::Unknown`].

use crate::models::{compare_timestamps, VitalsReading};
use crate::status::Status;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Threshold band for one channel. Bounds are exclusive: a value equal to a
/// bound is graded on the safe side of it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Band {
    pub critical_below: Option<f64>,
    pub warning_below: Option<f64>,
    pub warning_above: Option<f64>,
    pub critical_above: Option<f64>,
}

impl Band {
    pub fn grade(&self, value: f64) -> Status {
        let below = |bound: Option<f64>| bound.is_some_and(|b| value < b);
        let above = |bound: Option<f64>| bound.is_some_and(|b| value > b);

        if below(self.critical_below) || above(self.critical_above) {
            Status::Critical
        } else if below(self.warning_below) || above(self.warning_above) {
            Status::Warning
        } else {
            Status::Ok
        }
    }
}

/// Classification thresholds. Loaded from the kernel configuration; the
/// defaults below are placeholders until clinical values are supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierPolicy {
    pub heart_rate: Band,
    pub spo2: Band,
    pub skin_temp: Band,
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        Self {
            heart_rate: Band {
                critical_below: Some(40.0),
                warning_below: Some(50.0),
                warning_above: Some(110.0),
                critical_above: Some(130.0),
            },
            spo2: Band {
                critical_below: Some(90.0),
                warning_below: Some(94.0),
                warning_above: None,
                critical_above: None,
            },
            skin_temp: Band {
                critical_below: Some(35.0),
                warning_below: Some(36.0),
                warning_above: Some(38.0),
                critical_above: Some(39.5),
            },
        }
    }
}

type Channel = fn(&VitalsReading) -> Option<f64>;

/// Newest value of one channel, graded. Ties on timestamp keep the more severe grade.
fn latest_grade(readings: &[VitalsReading], channel: Channel, band: &Band) -> Option<Status> {
    let mut best: Option<(&str, Status)> = None;

    for reading in readings {
        let Some(value) = channel(reading) else { continue };
        let grade = band.grade(value);
        best = match best {
            None => Some((reading.timestamp.as_str(), grade)),
            Some((ts, current)) => match compare_timestamps(&reading.timestamp, ts) {
                Ordering::Greater => Some((reading.timestamp.as_str(), grade)),
                Ordering::Equal => Some((ts, current.worst(grade))),
                Ordering::Less => Some((ts, current)),
            },
        };
    }

    best.map(|(_, grade)| grade)
}

fn heart_rate(r: &VitalsReading) -> Option<f64> {
    r.heart_rate
}

fn spo2(r: &VitalsReading) -> Option<f64> {
    r.spo2
}

fn skin_temp(r: &VitalsReading) -> Option<f64> {
    r.skin_temp
}

pub fn classify(policy: &ClassifierPolicy, readings: &[VitalsReading]) -> Status {
    let channels: [(Channel, &Band); 3] = [
        (heart_rate as Channel, &policy.heart_rate),
        (spo2 as Channel, &policy.spo2),
        (skin_temp as Channel, &policy.skin_temp),
    ];

    channels
        .iter()
        .filter_map(|(channel, band)| latest_grade(readings, *channel, band))
        .fold(Status::Unknown, Status::worst)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(ts: &str, hr: Option<f64>, spo2: Option<f64>) -> VitalsReading {
        VitalsReading {
            device_id: "w-1".into(),
            timestamp: ts.into(),
            heart_rate: hr,
            spo2,
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_and_channelless_input_is_unknown() {
        let policy = ClassifierPolicy::default();
        assert_eq!(classify(&policy, &[]), Status::Unknown);

        let motion_only = VitalsReading {
            device_id: "w-1".into(),
            timestamp: "2025-03-01T10:00:00Z".into(),
            acc_x: Some(0.2),
            gyro_z: Some(-1.0),
            ..Default::default()
        };
        assert_eq!(classify(&policy, &[motion_only]), Status::Unknown);
    }

    #[test]
    fn test_non_numeric_channels_never_classify_critical() {
        let policy = ClassifierPolicy::default();
        let r: VitalsReading =
            serde_json::from_str(r#"{"deviceId": "w-1", "timestamp": "t", "heartRate": "???", "o2Sat": {}}"#).unwrap();
        assert_eq!(classify(&policy, &[r]), Status::Unknown);
    }

    #[test]
    fn test_grades() {
        let policy = ClassifierPolicy::default();
        let at = |hr| classify(&policy, &[reading("2025-03-01T10:00:00Z", Some(hr), None)]);
        assert_eq!(at(72.0), Status::Ok);
        assert_eq!(at(115.0), Status::Warning);
        assert_eq!(at(45.0), Status::Warning);
        assert_eq!(at(140.0), Status::Critical);
        assert_eq!(at(130.0), Status::Warning);
    }

    #[test]
    fn test_worst_channel_wins() {
        let policy = ClassifierPolicy::default();
        let r = reading("2025-03-01T10:00:00Z", Some(72.0), Some(85.0));
        assert_eq!(classify(&policy, &[r]), Status::Critical);
    }

    #[test]
    fn test_newest_value_wins_regardless_of_order() {
        let policy = ClassifierPolicy::default();
        let old_critical = reading("2025-03-01T10:00:00Z", Some(150.0), None);
        let new_ok = reading("2025-03-01T10:00:05Z", Some(80.0), None);

        assert_eq!(classify(&policy, &[old_critical.clone(), new_ok.clone()]), Status::Ok);
        assert_eq!(classify(&policy, &[new_ok, old_critical]), Status::Ok);
    }

    #[test]
    fn test_channels_resolve_independently() {
        let policy = ClassifierPolicy::default();
        // newest packet carries heart rate only; the SpO2 from the older one still counts
        let older = reading("2025-03-01T10:00:00Z", Some(70.0), Some(92.0));
        let newer = reading("2025-03-01T10:00:01Z", Some(75.0), None);
        assert_eq!(classify(&policy, &[newer, older]), Status::Warning);
    }

    #[test]
    fn test_duplicate_timestamps_resolve_to_more_severe() {
        let policy = ClassifierPolicy::default();
        let a = reading("2025-03-01T10:00:00Z", Some(70.0), None);
        let b = reading("2025-03-01T10:00:00Z", Some(135.0), None);
        assert_eq!(classify(&policy, &[a.clone(), b.clone()]), Status::Critical);
        assert_eq!(classify(&policy, &[b, a]), Status::Critical);
    }

    #[test]
    fn test_mixed_timestamp_forms_classify_the_same_in_any_order() {
        let policy = ClassifierPolicy::default();
        let readings = [
            reading("2025-03-01T10:00:00Z", Some(150.0), None),
            reading("2025-03-01T10:00:00.5Z", Some(70.0), None),
            reading("2025-03-01T10:00:00.7", Some(115.0), None),
        ];
        let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];

        for order in orders {
            let shuffled: Vec<VitalsReading> = order.iter().map(|&i| readings[i].clone()).collect();
            assert_eq!(classify(&policy, &shuffled), Status::Warning, "order {order:?}");
        }
    }

    #[test]
    fn test_policy_from_yaml_keeps_defaults_for_missing_bands() {
        let policy: ClassifierPolicy = serde_yaml::from_str(
            "heart_rate:\n  critical_above: 150\n",
        )
        .unwrap();
        assert_eq!(policy.heart_rate.critical_above, Some(150.0));
        assert_eq!(policy.heart_rate.warning_above, None);
        assert_eq!(policy.spo2, ClassifierPolicy::default().spo2);
    }
}
