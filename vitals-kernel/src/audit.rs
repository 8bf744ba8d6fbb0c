//! Piste d'audit : écriture best-effort, jamais bloquante pour l'opération principale.

use crate::store::AuditLog;
use tracing::warn;
use uuid::Uuid;
use vitals_core::models::now_rfc3339;
use vitals_core::AuditRecord;

pub const PATIENT_REGISTERED: &str = "Patient registered";
pub const PATIENT_DELETED: &str = "Patient deleted";
pub const USER_CREATED: &str = "User created";
pub const USER_DELETED: &str = "User deleted";
pub const DATA_RECEIVED: &str = "Data received";

/// Ajoute une entrée ; un échec est journalisé puis ignoré.
pub fn record(log: &dyn AuditLog, kind: &str, details: serde_json::Value) {
    let entry = AuditRecord {
        id: Uuid::new_v4().to_string(),
        kind: kind.to_string(),
        timestamp: now_rfc3339(),
        details,
    };
    if let Err(e) = log.append(entry) {
        warn!(kind, error = %e, "audit record dropped");
    }
}
