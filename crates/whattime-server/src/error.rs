use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use whattime_core::ActionError;

// ---------------------------------------------------------------------------
// Internal sentinel for missing caller identity
// ---------------------------------------------------------------------------

/// Private sentinel error type used to carry an explicit HTTP 401 through
/// the `anyhow::Error` chain without touching the `ActionError` enum.
#[derive(Debug)]
struct UnauthorizedError(String);

impl std::fmt::Display for UnauthorizedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for UnauthorizedError {}

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(ActionError::Validation(msg.into()).into())
    }

    /// Construct a 401 Unauthorized error.
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self(UnauthorizedError(msg.into()).into())
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        if self.0.downcast_ref::<UnauthorizedError>().is_some() {
            return (StatusCode::UNAUTHORIZED, "AuthenticationError");
        }
        match self.0.downcast_ref::<ActionError>() {
            Some(ActionError::NotFound(_)) => (StatusCode::NOT_FOUND, "ActionNotFound"),
            Some(ActionError::Conflict(_)) => (StatusCode::CONFLICT, "ActionConflict"),
            Some(ActionError::Validation(_)) => (StatusCode::BAD_REQUEST, "BadActionRequest"),
            Some(ActionError::StoreUnavailable(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "ServiceUnavailable")
            }
            Some(ActionError::InvalidConfig(_) | ActionError::Io(_) | ActionError::Json(_))
            | None => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let message = self.0.to_string();
        let body = serde_json::json!({
            "code": code,
            "description": message,
            "error": message,
        });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn not_found_maps_to_404() {
        let err = AppError(ActionError::NotFound("a1".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn conflict_maps_to_409() {
        let err = AppError(ActionError::Conflict("Cannot cancel complete action".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn validation_maps_to_400() {
        let err = AppError(ActionError::Validation("'utc_offset' is required".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn bad_request_constructor_maps_to_400() {
        assert_eq!(
            AppError::bad_request("malformed JSON").into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn store_unavailable_maps_to_503() {
        let err = AppError(ActionError::StoreUnavailable("locked".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn io_error_maps_to_500() {
        let io_err = std::io::Error::other("disk full");
        let err = AppError(ActionError::Io(io_err).into());
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn non_action_error_maps_to_500() {
        let err = AppError(anyhow::anyhow!("something unexpected"));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unauthorized_constructor_maps_to_401() {
        let err = AppError::unauthorized("missing caller identity");
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn response_body_is_json() {
        let err = AppError(ActionError::NotFound("a1".into()).into());
        let response = err.into_response();
        let ct = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .expect("should have content-type");
        assert!(
            ct.to_str().unwrap().contains("application/json"),
            "expected JSON content type, got {:?}",
            ct
        );
    }
}
