use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::TripPlannerError;

/// Error body: user facing text, technical detail and per-field messages
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    detail: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    fields: BTreeMap<String, String>,
}

#[derive(Debug)]
pub struct ApiError(pub TripPlannerError);

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            TripPlannerError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            TripPlannerError::NotFound { .. } => StatusCode::NOT_FOUND,
            TripPlannerError::Backend { status: 401 | 403, .. } => StatusCode::UNAUTHORIZED,
            TripPlannerError::Backend { status: 409, .. } => StatusCode::CONFLICT,
            TripPlannerError::Backend { .. } | TripPlannerError::Api { .. } => StatusCode::BAD_GATEWAY,
            TripPlannerError::Config { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<TripPlannerError> for ApiError {
    fn from(err: TripPlannerError) -> Self {
        Self(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(error = %self.0, "Request rejected");
        }

        let body = ErrorBody {
            error: self.0.user_message(),
            detail: self.0.to_string(),
            fields: self.0.field_errors().iter().cloned().collect(),
        };
        (status, Json(body)).into_response()
    }
}
