//! Mapping from pipeline errors and extractor rejections to HTTP responses.
//!
//! Every failure leaves as `{"error": "..."}`.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pmassist_core::error::Error;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

const GENERIC_MESSAGE: &str = "An unexpected error occurred";

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Any handler failure.
///
/// NotFound and InvalidInput carry their message to the caller. Everything
/// else from the pipeline is logged in full and answered with a generic 500.
#[derive(Debug)]
pub enum ApiError {
    Pipeline(Error),
    /// The request was refused before reaching the pipeline with a status
    /// other than 400 (oversized body, wrong content type).
    Rejected { status: StatusCode, message: String },
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Pipeline(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let status = rejection.status();
        match status {
            StatusCode::PAYLOAD_TOO_LARGE | StatusCode::UNSUPPORTED_MEDIA_TYPE => Self::Rejected {
                status,
                message: rejection.body_text(),
            },
            _ => Self::Pipeline(Error::InvalidInput(rejection.body_text())),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Pipeline(Error::InvalidInput(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::Pipeline(Error::InvalidInput(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Rejected { status, message } => {
                debug!(%status, %message, "Request rejected");
                (status, message)
            }
            Self::Pipeline(err @ Error::NotFound { .. }) => (StatusCode::NOT_FOUND, err.to_string()),
            Self::Pipeline(Error::InvalidInput(message)) => (StatusCode::BAD_REQUEST, message),
            Self::Pipeline(other) => {
                error!(error = %other, "Unexpected failure handling request");
                (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_MESSAGE.to_string())
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use pmassist_core::error::StoreError;

    async fn render(err: ApiError) -> (StatusCode, String) {
        let response = err.into_response();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&body).unwrap();
        (status, body.error)
    }

    #[tokio::test]
    async fn not_found_keeps_message() {
        let (status, message) = render(Error::not_found("Project", "p-1").into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(message, "Project not found: p-1");
    }

    #[tokio::test]
    async fn invalid_input_is_bad_request() {
        let (status, message) =
            render(Error::InvalidInput("question is required".into()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "question is required");
    }

    #[tokio::test]
    async fn store_failure_is_generic() {
        let err: Error = StoreError::QueryFailed("disk I/O error at /var/db".into()).into();
        let (status, message) = render(err.into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, GENERIC_MESSAGE);
        assert!(!message.contains("/var/db"));
    }

    #[tokio::test]
    async fn rejection_keeps_its_status() {
        let err = ApiError::Rejected {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            message: "length limit exceeded".into(),
        };
        let (status, message) = render(err).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(message, "length limit exceeded");
    }
}
