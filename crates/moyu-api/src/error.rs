use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::error;

use crate::response::Envelope;
use crate::services::ServiceError;

/// Message used for every authentication failure, whatever the cause.
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

/// HTTP-facing error. Every variant renders the standard envelope with
/// `status: "error"`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// 401. Carries no detail so clients cannot tell causes apart.
    #[error("{}", UNAUTHORIZED_MESSAGE)]
    Unauthenticated,
    /// 422 with `data: {"errors": [...]}`.
    #[error("{message}: {}", errors.join(", "))]
    Validation { message: String, errors: Vec<String> },
    /// 400
    #[error("{message}")]
    BadRequest { message: String, data: Value },
    /// 403
    #[error("{0}")]
    Forbidden(String),
    /// 404
    #[error("{0}")]
    NotFound(String),
    /// 502
    #[error("{message}")]
    BadGateway { message: String, data: Value },
}

impl ApiError {
    pub fn validation(message: impl Into<String>, errors: Vec<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            errors,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
            data: Value::Null,
        }
    }

    pub fn bad_request_with(message: impl Into<String>, data: Value) -> Self {
        ApiError::BadRequest {
            message: message.into(),
            data,
        }
    }

    pub fn bad_gateway_with(message: impl Into<String>, data: Value) -> Self {
        ApiError::BadGateway {
            message: message.into(),
            data,
        }
    }

    /// Map a service failure onto the response for an endpoint whose
    /// user-facing failure text is `message`.
    pub fn from_service(message: &str, err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(_) => ApiError::NotFound(message.to_string()),
            ServiceError::Forbidden(_) => ApiError::Forbidden(message.to_string()),
            ServiceError::Validation(errors) => ApiError::validation(message, errors),
            ServiceError::EmailTaken => ApiError::validation(message, vec![err.to_string()]),
            ServiceError::InvalidCredentials => ApiError::bad_request_with(
                message,
                json!({ "errors": [err.to_string()] }),
            ),
            ServiceError::BadNotification(_) => ApiError::bad_request(message),
            ServiceError::Upstream(e) => {
                error!("{}: upstream failure: {:#}", message, e);
                ApiError::bad_gateway_with(message, Value::Null)
            }
            ServiceError::Store(e) => {
                error!("{}: store failure: {:#}", message, e);
                ApiError::bad_request(message)
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::Unauthenticated => UNAUTHORIZED_MESSAGE,
            ApiError::Validation { message, .. } => message,
            ApiError::BadRequest { message, .. } => message,
            ApiError::Forbidden(message) => message,
            ApiError::NotFound(message) => message,
            ApiError::BadGateway { message, .. } => message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.message().to_string();
        let data = match self {
            ApiError::Validation { errors, .. } => json!({ "errors": errors }),
            ApiError::BadRequest { data, .. } | ApiError::BadGateway { data, .. } => data,
            _ => Value::Null,
        };
        Envelope::error(message, status, data).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_shows_the_client_message() {
        assert_eq!(ApiError::Unauthenticated.to_string(), "Unauthorized");
        assert_eq!(ApiError::bad_request("Login failed").to_string(), "Login failed");
        assert_eq!(
            ApiError::validation("Register account failed", vec!["name is required".into()]).to_string(),
            "Register account failed: name is required"
        );
    }

    #[test]
    fn ownership_failures_keep_their_kind() {
        let forbidden = ApiError::from_service("nope", ServiceError::Forbidden("x".into()));
        assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);

        let missing = ApiError::from_service("nope", ServiceError::NotFound("campaign"));
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(missing.message(), "nope");
    }

    #[test]
    fn store_errors_do_not_leak_detail() {
        let err = ApiError::from_service(
            "Failed to get campaigns",
            ServiceError::Store(anyhow::anyhow!("disk I/O error at page 7")),
        );
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "Failed to get campaigns");
    }

    #[test]
    fn upstream_errors_are_bad_gateway() {
        let err = ApiError::from_service(
            "Failed to create transaction",
            ServiceError::Upstream(anyhow::anyhow!("timeout")),
        );
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }
}
