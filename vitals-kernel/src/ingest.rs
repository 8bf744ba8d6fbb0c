/**
 * INGESTION - Réception des relevés vitaux et reclassification du patient
 *
 * RÔLE :
 * Point d'entrée unique des paquets envoyés par les objets connectés, qu'ils
 * arrivent par HTTP (POST /data) ou par MQTT (vitals/devices/reading@v1).
 *
 * FONCTIONNEMENT :
 * 1. Horodatage serveur si l'appareil n'en fournit pas
 * 2. Stockage du relevé (immuable) et trace "Data received" (best-effort)
 * 3. Si l'appareil est affecté : classification sur les N derniers relevés
 *    postérieurs à l'enregistrement du patient, sous le verrou des affectations
 *    (une désaffectation concurrente donne simplement "non affecté")
 */

use crate::audit;
use crate::store::{RecentQuery, StoreError, Stores};
use serde::Serialize;
use tracing::{debug, info};
use vitals_core::models::now_rfc3339;
use vitals_core::{classify, ClassifierPolicy, Status, VitalsReading};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(rename = "patientId", skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

pub fn ingest_reading(
    stores: &Stores,
    policy: &ClassifierPolicy,
    window: usize,
    mut reading: VitalsReading,
) -> Result<IngestOutcome, StoreError> {
    if reading.timestamp.trim().is_empty() {
        reading.timestamp = now_rfc3339();
    }
    let device_id = reading.device_id.clone();
    let details = serde_json::to_value(&reading)?;

    stores.vitals.insert(reading)?;
    audit::record(stores.data_log.as_ref(), audit::DATA_RECEIVED, details);

    let mut outcome = IngestOutcome { device_id: device_id.clone(), patient_id: None, status: None };

    let update = stores.assignments.reclassify_device(&device_id, &mut |assignment| {
        let window_query = RecentQuery {
            device_id: device_id.clone(),
            since: Some(assignment.timestamp.clone()),
        };
        let recent = stores.vitals.recent(&[window_query], window.max(1))?;
        let readings = recent.into_iter().next().map(|d| d.readings).unwrap_or_default();
        Ok(classify(policy, &readings))
    })?;

    match update {
        Some(update) => {
            if update.previous != update.current {
                info!(
                    patient_id = %update.patient_id,
                    from = %update.previous,
                    to = %update.current,
                    "patient status changed"
                );
            }
            outcome.patient_id = Some(update.patient_id);
            outcome.status = Some(update.current);
        }
        None => debug!(device_id = %device_id, "reading from unassigned device"),
    }

    Ok(outcome)
}
