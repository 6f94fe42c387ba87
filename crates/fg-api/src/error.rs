use std::borrow::Cow;
use std::future::Future;

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use fg_common::store::StoreError;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Per-request data made available to error responses.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub id: Option<String>,
    pub path: String,
}

tokio::task_local! {
    static REQUEST: RequestContext;
}

pub async fn with_request_context<Fut, T>(context: RequestContext, fut: Fut) -> T
where
    Fut: Future<Output = T>,
{
    REQUEST.scope(context, fut).await
}

pub fn current_request() -> RequestContext {
    REQUEST.try_with(Clone::clone).unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("database error: {0}")]
    Database(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: Cow<'static, str>,
    request_id: Option<String>,
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
            ApiError::Database(_) => "database_error",
            ApiError::Internal(_) => "internal_error",
        }
    }

    /// Client-facing text. Internal failures never leak their cause.
    fn public_message(&self) -> Cow<'static, str> {
        match self {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) => Cow::Owned(msg.clone()),
            ApiError::ServiceUnavailable(_) => Cow::Borrowed("service unavailable"),
            ApiError::Database(_) | ApiError::Internal(_) => Cow::Borrowed("internal server error"),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let request = current_request();

        if status.is_server_error() {
            error!(
                path = %request.path,
                request_id = request.id.as_deref().unwrap_or(""),
                status = status.as_u16(),
                error = %self,
                "request failed"
            );
        } else {
            warn!(path = %request.path, status = status.as_u16(), error = %self, "request rejected");
        }

        let body = Json(ErrorResponse {
            code: self.code(),
            message: self.public_message(),
            request_id: request.id,
        });
        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Database(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use serde_json::Value;

    use super::*;

    async fn body_of(err: ApiError) -> (StatusCode, Value) {
        let context = RequestContext {
            id: Some("req-7".into()),
            path: "/api/fits?ship=587".into(),
        };
        let response = with_request_context(context, async { err.into_response() }).await;
        let (parts, body) = response.into_parts();
        let bytes = body.collect().await.unwrap().to_bytes();
        (parts.status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn internal_errors_are_generic() {
        let (status, json) = body_of(ApiError::Database("relation \"fit\" does not exist".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], "internal server error");
        assert_eq!(json["request_id"], "req-7");
    }

    #[tokio::test]
    async fn client_errors_keep_their_message() {
        let (status, json) = body_of(ApiError::BadRequest("missing fit id".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "bad_request");
        assert_eq!(json["message"], "missing fit id");
    }
}
