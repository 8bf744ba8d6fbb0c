//! Patient status labels and the severity order used by every roster view.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Severity classification of a patient's latest vitals.
///
/// Anything the store holds that is not one of the three known labels
/// (including `null` or a missing field) is read back as [`Status::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    Critical,
    Warning,
    Ok,
    #[default]
    Unknown,
}

impl Status {
    /// Position in the dashboard ordering: critical first, unknown last.
    pub fn rank(self) -> u8 {
        match self {
            Status::Critical => 0,
            Status::Warning => 1,
            Status::Ok => 2,
            Status::Unknown => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Critical => "critical",
            Status::Warning => "warning",
            Status::Ok => "ok",
            Status::Unknown => "unknown",
        }
    }

    /// Lenient parse; never fails.
    pub fn from_label(label: &str) -> Self {
        match label {
            "critical" => Status::Critical,
            "warning" => Status::Warning,
            "ok" => Status::Ok,
            _ => Status::Unknown,
        }
    }

    pub fn is_critical(self) -> bool {
        self == Status::Critical
    }

    /// The more severe of two statuses. `Unknown` never wins over a real grade.
    pub fn worst(self, other: Status) -> Status {
        if self.severity_cmp(other) == Ordering::Greater { other } else { self }
    }

    /// Compares by dashboard rank (`Less` means more severe).
    pub fn severity_cmp(self, other: Status) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(match raw {
            Some(serde_json::Value::String(label)) => Status::from_label(&label),
            _ => Status::Unknown,
        })
    }
}

/// Anything that carries a status can be ordered on the dashboard.
pub trait HasStatus {
    fn status(&self) -> Status;
}

/// Stable sort by severity: records with equal status keep their incoming order.
pub fn sort_by_severity<T: HasStatus>(items: &mut [T]) {
    items.sort_by(|a, b| a.status().severity_cmp(b.status()));
}
