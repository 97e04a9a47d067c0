//! Mapping from [`SiteSenseError`] to HTTP responses.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, warn};

use sitesense_shared::{ErrorKind, SiteSenseError};

/// Body of every failed response.
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// A request failure on its way out as a response.
#[derive(Debug)]
pub struct ApiError(SiteSenseError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Policy => StatusCode::FORBIDDEN,
            ErrorKind::Resource | ErrorKind::Provider | ErrorKind::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<SiteSenseError> for ApiError {
    fn from(err: SiteSenseError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(SiteSenseError::validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match self.0.kind() {
            ErrorKind::Validation => "Invalid request",
            ErrorKind::Policy => "Scraping not allowed by robots.txt",
            ErrorKind::Resource => "Failed to load page",
            ErrorKind::Provider | ErrorKind::Internal => "Internal server error",
        };

        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        } else {
            warn!(%status, error = %self.0, "request rejected");
        }

        (
            status,
            Json(ErrorBody {
                success: false,
                error,
                message: Some(self.0.to_string()),
            }),
        )
            .into_response()
    }
}
