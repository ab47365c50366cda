use std::collections::HashMap;

use axum::{
    Json,
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Multipart, Path, Request, multipart::MultipartError},
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// `Json<T>` whose rejection renders the standard 422 envelope.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(ApiError::validation(
                "Invalid request body",
                vec![rejection.body_text()],
            )),
        }
    }
}

/// Numeric `{id}` path segment; anything else is a 400 envelope.
pub struct ResourceId(pub i64);

impl<S> FromRequestParts<S> for ResourceId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<i64>::from_request_parts(parts, state).await {
            Ok(Path(id)) if id > 0 => Ok(ResourceId(id)),
            _ => Err(ApiError::bad_request("Invalid resource id")),
        }
    }
}

pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Bytes,
}

/// A drained multipart form: text fields by name plus the one file field.
pub struct UploadForm {
    pub fields: HashMap<String, String>,
    pub file: Option<UploadedFile>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart, file_field: &str) -> Result<Self, MultipartError> {
        let mut fields = HashMap::new();
        let mut file = None;

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            if name == file_field {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await?;
                file = Some(UploadedFile { file_name, bytes });
            } else {
                fields.insert(name, field.text().await?);
            }
        }

        Ok(Self { fields, file })
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|v| v.trim())
    }
}

/// Form booleans as browsers and HTTP clients send them.
pub fn parse_form_bool(value: Option<&str>) -> Option<bool> {
    match value.map(|v| v.to_ascii_lowercase()) {
        None => Some(false),
        Some(v) if v.is_empty() => Some(false),
        Some(v) => match v.as_str() {
            "true" | "1" | "on" | "yes" => Some(true),
            "false" | "0" | "off" | "no" => Some(false),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_bools() {
        assert_eq!(parse_form_bool(None), Some(false));
        assert_eq!(parse_form_bool(Some("")), Some(false));
        assert_eq!(parse_form_bool(Some("TRUE")), Some(true));
        assert_eq!(parse_form_bool(Some("1")), Some(true));
        assert_eq!(parse_form_bool(Some("false")), Some(false));
        assert_eq!(parse_form_bool(Some("maybe")), None);
    }
}
