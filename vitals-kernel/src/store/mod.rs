/**
 * STORES v1 - Interfaces de persistance du kernel Vitals
 *
 * RÔLE :
 * Ce module définit les collections documentaires dont dépend le kernel :
 * affectations patient ↔ appareil, relevés vitaux, journaux d'audit, utilisateurs.
 *
 * FONCTIONNEMENT :
 * - Un trait par collection (AssignmentStore, VitalsStore, AuditLog, UserStore)
 * - Implémentation par défaut : documents JSON sous `data_dir`, cache mémoire + Mutex
 * - Collections mutables réécrites en snapshot, collections immuables en JSON lines
 * - Mode mémoire pur pour les tests
 *
 * GARANTIES :
 * - Un appareil n'a jamais deux affectations actives : le contrôle et l'insertion
 *   se font sous le même verrou
 * - Les relevés ne sont jamais modifiés ni supprimés par le kernel
 */

mod assignments;
mod audit;
mod collection;
mod users;
mod vitals;

pub use assignments::JsonAssignments;
pub use audit::JsonAuditLog;
pub use collection::Collection;
pub use users::{JsonUsers, UserRecord};
pub use vitals::JsonVitals;

use std::path::Path;
use std::sync::Arc;
use vitals_core::{Assignment, AuditRecord, DeviceVitals, Status, VitalsReading};

/// Erreurs possibles lors des opérations de stockage
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Device {device_id} is currently assigned to another patient (ID: {patient_id})")]
    DeviceAssigned { device_id: String, patient_id: String },
    #[error("Patient {0} is already registered")]
    DuplicatePatient(String),
    #[error("Username {0} already exists")]
    DuplicateUser(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Affectations actives patient ↔ appareil
pub trait AssignmentStore: Send + Sync {
    /// Toutes les affectations, enregistrement le plus récent en premier
    fn list(&self) -> Result<Vec<Assignment>, StoreError>;

    fn get(&self, patient_id: &str) -> Result<Option<Assignment>, StoreError>;

    fn find_by_device(&self, device_id: &str) -> Result<Option<Assignment>, StoreError>;

    /// Insère si l'appareil est libre et le patient inconnu, atomiquement
    fn register(&self, assignment: Assignment) -> Result<(), StoreError>;

    /// Retire l'affectation et la renvoie
    fn remove(&self, patient_id: &str) -> Result<Assignment, StoreError>;

    fn set_status(&self, patient_id: &str, status: Status) -> Result<(), StoreError>;

    /// Recalcule le statut du patient qui porte l'appareil, sous le verrou de
    /// la collection ; `None` si l'appareil n'est pas (ou plus) affecté
    fn reclassify_device(
        &self,
        device_id: &str,
        grade: &mut dyn FnMut(&Assignment) -> Result<Status, StoreError>,
    ) -> Result<Option<StatusUpdate>, StoreError>;

    fn count(&self) -> usize;
}

/// Résultat d'une reclassification
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub patient_id: String,
    pub previous: Status,
    pub current: Status,
}

/// Fenêtre demandée pour un appareil : relevés strictement postérieurs à `since`
#[derive(Debug, Clone, PartialEq)]
pub struct RecentQuery {
    pub device_id: String,
    pub since: Option<String>,
}

/// Relevés vitaux, append-only
pub trait VitalsStore: Send + Sync {
    fn insert(&self, reading: VitalsReading) -> Result<(), StoreError>;

    /// Par requête, au plus `limit` relevés, du plus récent au plus ancien
    fn recent(&self, queries: &[RecentQuery], limit: usize) -> Result<Vec<DeviceVitals>, StoreError>;

    fn count(&self) -> usize;
}

/// Journal d'audit, append-only
pub trait AuditLog: Send + Sync {
    fn append(&self, record: AuditRecord) -> Result<(), StoreError>;

    /// Entrées du plus récent au plus ancien
    fn list(&self) -> Result<Vec<AuditRecord>, StoreError>;
}

pub trait UserStore: Send + Sync {
    fn create(&self, user: UserRecord) -> Result<(), StoreError>;

    fn list(&self) -> Result<Vec<UserRecord>, StoreError>;

    fn remove(&self, username: &str) -> Result<(), StoreError>;
}

/// Ensemble des collections partagées par les handlers HTTP et l'ingestion MQTT
#[derive(Clone)]
pub struct Stores {
    pub assignments: Arc<dyn AssignmentStore>,
    pub vitals: Arc<dyn VitalsStore>,
    /// Événements administratifs (patients, utilisateurs)
    pub events: Arc<dyn AuditLog>,
    /// Événements de données (réception des relevés)
    pub data_log: Arc<dyn AuditLog>,
    pub users: Arc<dyn UserStore>,
}

impl Stores {
    /// Ouvre (ou crée) les collections JSON dans `data_dir`
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir)?;
        Ok(Self {
            assignments: Arc::new(JsonAssignments::new(Collection::snapshot(
                "assignments",
                data_dir.join("assignments.json"),
            )?)),
            vitals: Arc::new(JsonVitals::new(Collection::append_only(
                "data",
                data_dir.join("data.jsonl"),
            )?)),
            events: Arc::new(JsonAuditLog::new(Collection::append_only(
                "event_log",
                data_dir.join("event_log.jsonl"),
            )?)),
            data_log: Arc::new(JsonAuditLog::new(Collection::append_only(
                "data_log",
                data_dir.join("data_log.jsonl"),
            )?)),
            users: Arc::new(JsonUsers::new(Collection::snapshot(
                "users",
                data_dir.join("users.json"),
            )?)),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            assignments: Arc::new(JsonAssignments::new(Collection::in_memory("assignments"))),
            vitals: Arc::new(JsonVitals::new(Collection::in_memory("data"))),
            events: Arc::new(JsonAuditLog::new(Collection::in_memory("event_log"))),
            data_log: Arc::new(JsonAuditLog::new(Collection::in_memory("data_log"))),
            users: Arc::new(JsonUsers::new(Collection::in_memory("users"))),
        }
    }
}
