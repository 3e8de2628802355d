//! Errors surfaced at the HTTP boundary.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::membership::MembershipError;

/// Errors returned by the room routes.
///
/// The response body never carries the underlying cause; callers see a
/// Matrix error code and a fixed message.
#[derive(Error, Debug)]
pub enum RoomsApiError {
    /// The membership backend failed.
    #[error("membership storage failed: {0}")]
    Storage(#[from] MembershipError),

    /// No authenticated device was attached to the request.
    #[error("request is not authenticated")]
    MissingDevice,
}

impl RoomsApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MissingDevice => StatusCode::UNAUTHORIZED,
        }
    }

    /// Matrix `errcode` for this error.
    pub fn errcode(&self) -> &'static str {
        match self {
            Self::Storage(_) => "M_UNKNOWN",
            Self::MissingDevice => "M_MISSING_TOKEN",
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            Self::Storage(_) => "Internal Server Error",
            Self::MissingDevice => "Missing access token",
        }
    }
}

impl IntoResponse for RoomsApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "errcode": self.errcode(),
            "error": self.public_message(),
        });
        (self.status(), Json(body)).into_response()
    }
}
