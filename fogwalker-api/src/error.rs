//! API error handling.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fogwalker_core::{ContentEnvelope, ErrorKind, FogwalkerError};

/// API error type, rendered as a failed [`ContentEnvelope`].
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    envelope: ContentEnvelope,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(status: StatusCode, kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            status,
            envelope: ContentEnvelope::failure(kind, detail),
        }
    }

    /// Not found error.
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, ErrorKind::Unknown, detail)
    }

    /// Internal server error.
    pub fn internal(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, kind, detail)
    }

    /// HTTP status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Classification carried by the envelope.
    pub fn kind(&self) -> Option<ErrorKind> {
        self.envelope.error_type
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.envelope)).into_response()
    }
}

impl From<FogwalkerError> for ApiError {
    fn from(err: FogwalkerError) -> Self {
        match &err {
            FogwalkerError::UnknownVariant(_) => ApiError::not_found(err.to_string()),
            _ => {
                let kind = err.kind();
                tracing::error!(error = %err, error_type = %kind, "Content request failed");
                ApiError::internal(kind, err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_maps_to_auth_500() {
        let err = ApiError::from(FogwalkerError::Unauthorized("bad key".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.kind(), Some(ErrorKind::Auth));
    }

    #[test]
    fn test_unknown_variant_is_404() {
        let err = ApiError::from(FogwalkerError::UnknownVariant("nebula".into()));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
