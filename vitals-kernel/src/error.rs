//! Erreurs de l'API REST et leur traduction HTTP (`{"error": ...}`).

use crate::store::StoreError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Corps ou paramètres illisibles
    #[error("Malformed request: {0}")]
    Malformed(String),
    /// Appareil déjà affecté ; porte l'identifiant du patient qui l'occupe
    #[error("Device is currently assigned to another patient (ID: {patient_id})")]
    DeviceAssigned { patient_id: String },
    #[error("{0}")]
    Conflict(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Malformed(_) => StatusCode::BAD_REQUEST,
            ApiError::DeviceAssigned { .. } | ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        match err {
            StoreError::DeviceAssigned { patient_id, .. } => ApiError::DeviceAssigned { patient_id },
            StoreError::DuplicatePatient(_) | StoreError::DuplicateUser(_) => ApiError::Conflict(message),
            StoreError::NotFound(what) => ApiError::NotFound(what),
            StoreError::Serialization(_) | StoreError::Io(_) => ApiError::Internal(message),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Malformed(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Malformed(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            ApiError::DeviceAssigned { patient_id } => json!({ "error": self.to_string(), "patientId": patient_id }),
            ApiError::Internal(detail) => {
                error!(detail = %detail, "request failed");
                json!({ "error": "Failed to store data." })
            }
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
