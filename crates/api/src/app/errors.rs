use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use clinicos_authz::AuthzError;

/// Handler error: an [`AuthzError`] rendered as a JSON error body.
///
/// | AuthzError | Status |
/// |---|---|
/// | `Forbidden` | 403 |
/// | `InvalidArguments` | 400 |
/// | anything else | 500 |
#[derive(Debug)]
pub struct ApiError(pub AuthzError);

impl From<AuthzError> for ApiError {
    fn from(value: AuthzError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            AuthzError::Forbidden => json_error(StatusCode::FORBIDDEN, "forbidden", "forbidden"),
            AuthzError::InvalidArguments(msg) => {
                json_error(StatusCode::BAD_REQUEST, "invalid_arguments", msg)
            }
            other => {
                error!(error = %other, "authorization backend failure");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "authorization backend failure",
                )
            }
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinicos_authz::StoreError;

    #[test]
    fn status_mapping() {
        let status = |e: AuthzError| ApiError(e).into_response().status();
        assert_eq!(status(AuthzError::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(status(AuthzError::invalid("bad domain")), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(AuthzError::Store(StoreError::Unavailable("down".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(AuthzError::Reload("timed out".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
