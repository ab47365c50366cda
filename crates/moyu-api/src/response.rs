use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// The JSON shape of every response: `{message, status, code, data}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub message: String,
    pub status: &'static str,
    pub code: u16,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            status: "success",
            code: StatusCode::OK.as_u16(),
            data,
        }
    }

    pub fn error(message: impl Into<String>, code: StatusCode, data: T) -> Self {
        Self {
            message: message.into(),
            status: "error",
            code: code.as_u16(),
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Shorthand for a 200 envelope.
pub fn ok<T: Serialize>(message: &str, data: T) -> Envelope<T> {
    Envelope::success(message, data)
}
