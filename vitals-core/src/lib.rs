//! Vitals Core - shared model and live-alerting pipeline
//!
//! Used by both the kernel (classification at ingestion time) and the
//! monitoring sessions (edge detection and banner state):
//! - Status labels and the severity order of roster views
//! - Status Classifier over a window of device readings
//! - Per-patient critical-alert state machine with 5 s auto-clear
//! - Alert board: shared single-writer cell for the current banner

pub mod alert;
pub mod board;
pub mod classifier;
pub mod models;
pub mod status;

pub use alert::{AlertMachine, AlertPhase, AlertSignal, ClearReason, AUTO_CLEAR};
pub use board::AlertBoard;
pub use classifier::{classify, Band, ClassifierPolicy};
pub use models::{AlertEvent, Assignment, AuditRecord, DeviceVitals, NewAssignment, VitalsReading};
pub use status::{sort_by_severity, HasStatus, Status};
