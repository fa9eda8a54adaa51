use axum::Json;
use axum::extract::rejection::{FormRejection, JsonRejection, QueryRejection};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::auth::AuthError;
use crate::qa::QaError;

/// An error response rendered as `{"detail": ...}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    #[inline]
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    #[inline]
    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, detail)
    }

    #[inline]
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }

    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[inline]
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl IntoResponse for ApiError {
    #[inline]
    fn into_response(self) -> Response {
        let mut response =
            (self.status, Json(serde_json::json!({ "detail": self.detail }))).into_response();

        if self.status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}

impl From<AuthError> for ApiError {
    #[inline]
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::BadRequest(detail) => Self::new(StatusCode::BAD_REQUEST, detail),
            AuthError::Unauthorized(detail) => Self::unauthorized(detail),
            AuthError::Conflict(detail) => Self::new(StatusCode::CONFLICT, detail),
            AuthError::Unprocessable(detail) => Self::new(StatusCode::UNPROCESSABLE_ENTITY, detail),
            AuthError::Mail(_) | AuthError::Internal(_) => {
                error!("Request failed: {}", error);
                Self::internal()
            }
        }
    }
}

impl From<QaError> for ApiError {
    #[inline]
    fn from(error: QaError) -> Self {
        match error {
            QaError::NotReady => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "The question answering engine is not ready.",
            ),
            other => {
                error!("Chat request failed: {}", other);
                Self::internal()
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    #[inline]
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<FormRejection> for ApiError {
    #[inline]
    fn from(rejection: FormRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    #[inline]
    fn from(rejection: QueryRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}
