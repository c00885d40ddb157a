use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::common::error::DomainError;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: &'static str,
    message: &'a str,
}

/// Control-socket error, rendered as
/// `{"error":{"code":"SCREAMING_SNAKE","message":"..."}}`.
///
/// The chained plugin only looks at the status; the body is for operators
/// reading plugin logs.
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: &'static str, message: String },
    NotFound { code: &'static str, message: String },
    Internal { message: String },
    ServiceUnavailable { message: String },
    Timeout,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::BadRequest { code, .. } | Self::NotFound { code, .. } => *code,
            Self::Internal { .. } => "INTERNAL_ERROR",
            Self::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            Self::Timeout => "REQUEST_TIMEOUT",
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::NotFound { message, .. }
            | Self::Internal { message }
            | Self::ServiceUnavailable { message } => message,
            Self::Timeout => "request exceeded the control socket deadline",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code(),
                message: self.message(),
            },
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound(message) => Self::NotFound {
                code: "NOT_FOUND",
                message,
            },
            DomainError::InvalidConfig(message) => Self::BadRequest {
                code: "INVALID_REQUEST",
                message,
            },
            DomainError::ToolchainMissing(message) => Self::ServiceUnavailable { message },
            DomainError::EngineError(message) => Self::Internal { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    async fn render(err: ApiError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn domain_errors_map_to_status_codes() {
        let (status, body) = render(DomainError::EngineError("nsenter failed".into()).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(body["error"]["message"], "nsenter failed");

        let (status, _) = render(DomainError::NotFound("netns".into()).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = render(DomainError::ToolchainMissing("tc".into()).into()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, body) = render(ApiError::Timeout).await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(body["error"]["code"], "REQUEST_TIMEOUT");
    }
}
