//! HTTP mapping of the request-level error taxonomy

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use healthwire_core::TelemetryError;
use healthwire_storage::StorageError;

/// Error body: `{"error": "<message>", "code": "<CODE>"}`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

/// A [`TelemetryError`] on its way out as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub TelemetryError);

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            TelemetryError::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            TelemetryError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            TelemetryError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            TelemetryError::DuplicateEvent => StatusCode::CONFLICT,
            TelemetryError::InvalidWindow(_) => StatusCode::BAD_REQUEST,
            TelemetryError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            TelemetryError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            TelemetryError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            TelemetryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        self.0.error_code()
    }
}

impl From<TelemetryError> for ApiError {
    fn from(err: TelemetryError) -> Self {
        ApiError(err)
    }
}

/// Storage failures outside a uniqueness context are server errors
impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError(TelemetryError::internal(err.to_string()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let TelemetryError::Internal(detail) = &self.0 {
            tracing::error!(detail = %detail, "Request failed with internal error");
        }

        let status = self.status_code();
        let body = ErrorBody {
            error: self.0.to_string(),
            code: self.error_code(),
        };
        let mut response = (status, Json(body)).into_response();
        if let TelemetryError::MethodNotAllowed { allow } = &self.0 {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static(*allow));
        }
        response
    }
}
