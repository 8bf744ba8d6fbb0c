/**
 * API REST VITALS - Serveur HTTP principal du kernel
 *
 * RÔLE :
 * Ce module expose l'API consommée par les sessions de supervision (polling),
 * par les objets connectés (POST /data) et par les outils d'administration.
 *
 * FONCTIONNEMENT :
 * - Serveur Axum avec middleware clé API (x-api-key) sauf sur /health
 * - Routes : /patients (roster), /data (relevés), /events + /datalog (audit), /users
 * - Réponses JSON ; erreurs normalisées `{"error": ...}` (400, 404, 409, 500)
 *
 * CONTRAT DE FRAÎCHEUR :
 * Aucune notification push : chaque client relit /patients et /data à son
 * propre rythme. Le statut renvoyé est celui calculé à l'ingestion.
 */

use crate::accounts::{build_user, NewUser, UserView};
use crate::audit;
use crate::error::{ApiError, ApiResult};
use crate::health::{HealthTracker, KernelHealth};
use crate::ingest::{ingest_reading, IngestOutcome};
use crate::store::{RecentQuery, Stores};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use vitals_core::models::now_rfc3339;
use vitals_core::{sort_by_severity, Assignment, AuditRecord, ClassifierPolicy, DeviceVitals, NewAssignment, Status, VitalsReading};

/// Taille de fenêtre par défaut pour GET /data (vue détaillée d'un patient)
pub const DEFAULT_VITALS_WINDOW: usize = 120;

#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub policy: Arc<ClassifierPolicy>,
    pub status_window: usize,
    pub api_key: Option<Arc<str>>,
    pub health: HealthTracker,
    pub password_iterations: u32,
}

async fn require_api_key(State(app): State<AppState>, req: Request, next: Next) -> Result<Response, StatusCode> {
    // Health check toujours accessible
    if req.uri().path() == "/health" {
        return Ok(next.run(req).await);
    }

    let Some(expected) = app.api_key.as_deref() else {
        warn!("SECURITY: VITALS_API_KEY not set - API access denied");
        return Err(StatusCode::UNAUTHORIZED);
    };

    let ok = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);

    if !ok {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/patients", get(list_patients).post(register_patient))
        .route("/patients/{patient_id}", get(get_patient).delete(delete_patient))
        .route("/data", get(read_vitals).post(receive_data))
        .route("/events", get(list_events))
        .route("/datalog", get(list_data_log))
        .route("/users", get(list_users).post(create_user))
        .route("/users/{username}", delete(delete_user))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_api_key))
        .with_state(app_state)
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<KernelHealth> {
    Json(app.health.get_health(&app.stores))
}

#[derive(Debug, Deserialize)]
struct RosterParams {
    sort: Option<String>,
}

// GET /patients (roster, enregistrement le plus récent d'abord ; ?sort=severity)
async fn list_patients(
    State(app): State<AppState>,
    params: Result<Query<RosterParams>, QueryRejection>,
) -> ApiResult<Json<Vec<Assignment>>> {
    let Query(params) = params?;
    let mut roster = app.stores.assignments.list()?;
    if params.sort.as_deref() == Some("severity") {
        sort_by_severity(&mut roster);
    }
    Ok(Json(roster))
}

// GET /patients/{patient_id}
async fn get_patient(State(app): State<AppState>, Path(patient_id): Path<String>) -> ApiResult<Json<Assignment>> {
    app.stores
        .assignments
        .get(&patient_id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Patient {patient_id}")))
}

// POST /patients (enregistrement patient ↔ appareil)
async fn register_patient(
    State(app): State<AppState>,
    payload: Result<Json<NewAssignment>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(req) = payload?;
    let patient_id = req.patient_id.trim().to_string();
    let device_id = req.device_id.trim().to_string();
    if patient_id.is_empty() || device_id.is_empty() {
        return Err(ApiError::Malformed("patientId and deviceId are required".into()));
    }

    let assignment = Assignment {
        patient_id,
        device_id,
        name: req.name.filter(|n| !n.trim().is_empty()),
        timestamp: req.timestamp.filter(|t| !t.trim().is_empty()).unwrap_or_else(now_rfc3339),
        status: Status::Unknown,
    };

    app.stores.assignments.register(assignment.clone())?;
    info!(patient_id = %assignment.patient_id, device_id = %assignment.device_id, "patient registered");
    audit::record(
        app.stores.events.as_ref(),
        audit::PATIENT_REGISTERED,
        serde_json::to_value(&assignment).unwrap_or(Value::Null),
    );

    Ok(Json(json!({ "message": "Patient registered successfully", "patient": assignment })))
}

// DELETE /patients/{patient_id}
async fn delete_patient(State(app): State<AppState>, Path(patient_id): Path<String>) -> ApiResult<Json<Value>> {
    let removed = app.stores.assignments.remove(&patient_id)?;
    info!(patient_id = %removed.patient_id, device_id = %removed.device_id, "patient deleted");
    audit::record(
        app.stores.events.as_ref(),
        audit::PATIENT_DELETED,
        json!({ "patientId": removed.patient_id, "deviceId": removed.device_id }),
    );
    Ok(Json(json!({ "message": "Patient deleted successfully" })))
}

/// Paires (appareil, horodatage) dans l'ordre des paramètres répétés :
/// `?deviceIds=a&timestamps=t1&deviceIds=b&timestamps=t2&n=50`
fn parse_vitals_query(params: Vec<(String, String)>) -> ApiResult<(Vec<RecentQuery>, usize)> {
    let mut devices = Vec::new();
    let mut timestamps = Vec::new();
    let mut limit = DEFAULT_VITALS_WINDOW;

    for (key, value) in params {
        match key.as_str() {
            "deviceIds" | "deviceIDs" | "deviceId" => devices.push(value),
            "timestamps" | "timestamp" => timestamps.push(value),
            "n" | "N" => {
                limit = value
                    .parse::<usize>()
                    .map_err(|_| ApiError::Malformed(format!("invalid n: {value}")))?;
            }
            _ => {} // paramètre inconnu, on l'ignore
        }
    }

    let queries = devices
        .into_iter()
        .enumerate()
        .map(|(idx, device_id)| RecentQuery {
            device_id,
            since: timestamps.get(idx).filter(|t| !t.is_empty()).cloned(),
        })
        .collect();
    Ok((queries, limit))
}

// GET /data (relevés récents par appareil)
async fn read_vitals(
    State(app): State<AppState>,
    params: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> ApiResult<Json<Vec<DeviceVitals>>> {
    let Query(params) = params?;
    let (queries, limit) = parse_vitals_query(params)?;
    Ok(Json(app.stores.vitals.recent(&queries, limit)?))
}

// POST /data (ingestion d'un relevé)
async fn receive_data(
    State(app): State<AppState>,
    payload: Result<Json<VitalsReading>, JsonRejection>,
) -> ApiResult<Json<IngestOutcome>> {
    let Json(reading) = payload?;
    if reading.device_id.trim().is_empty() {
        return Err(ApiError::Malformed("deviceId is required".into()));
    }
    let outcome = ingest_reading(&app.stores, &app.policy, app.status_window, reading)?;
    Ok(Json(outcome))
}

// GET /events (audit administratif)
async fn list_events(State(app): State<AppState>) -> ApiResult<Json<Vec<AuditRecord>>> {
    Ok(Json(app.stores.events.list()?))
}

// GET /datalog (audit des données)
async fn list_data_log(State(app): State<AppState>) -> ApiResult<Json<Vec<AuditRecord>>> {
    Ok(Json(app.stores.data_log.list()?))
}

// GET /users (sans secret)
async fn list_users(State(app): State<AppState>) -> ApiResult<Json<Vec<UserView>>> {
    let users = app.stores.users.list()?;
    Ok(Json(users.into_iter().map(UserView::from).collect()))
}

// POST /users
async fn create_user(
    State(app): State<AppState>,
    payload: Result<Json<NewUser>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(new_user) = payload?;
    if new_user.username.trim().is_empty() || new_user.password.is_empty() {
        return Err(ApiError::Malformed("username and password are required".into()));
    }

    // PBKDF2 est volontairement coûteux : hors du runtime async
    let iterations = app.password_iterations;
    let user = tokio::task::spawn_blocking(move || build_user(new_user, iterations))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let details = json!({ "username": user.username, "role": user.role });
    app.stores.users.create(user)?;
    audit::record(app.stores.events.as_ref(), audit::USER_CREATED, details);
    Ok(Json(json!({ "message": "User creation successful." })))
}

// DELETE /users/{username}
async fn delete_user(State(app): State<AppState>, Path(username): Path<String>) -> ApiResult<Json<Value>> {
    app.stores.users.remove(&username)?;
    audit::record(app.stores.events.as_ref(), audit::USER_DELETED, json!({ "username": username }));
    Ok(Json(json!({ "message": "User deleted successfully" })))
}
