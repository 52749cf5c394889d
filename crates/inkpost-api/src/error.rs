use std::collections::BTreeMap;

use axum::Json;
use axum::extract::rejection::{
    JsonRejection, PathRejection, QueryRejection,
};
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::token::AuthError;

/// Uniform JSON body for every response, success or failure.
#[derive(Serialize)]
pub struct Envelope<'a, T> {
    pub success: bool,
    pub message: &'a str,
    pub data: T,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Invalid data")]
    InvalidFields(BTreeMap<String, String>),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Internal server error")]
    Storage(String),
}

impl ApiError {
    /// Single-field validation failure, reported in the `data` map.
    pub fn field(name: &str, message: &str) -> Self {
        ApiError::InvalidFields(BTreeMap::from([(name.to_string(), message.to_string())]))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidFields(_) | ApiError::Conflict(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Storage(detail) = &self {
            error!(error = %detail, "storage failure");
        }

        let message = self.to_string();
        let data = match &self {
            ApiError::InvalidFields(fields) => Some(fields),
            _ => None,
        };
        let body = Envelope {
            success: false,
            message: &message,
            data,
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<inkpost_db::Error> for ApiError {
    fn from(e: inkpost_db::Error) -> Self {
        use inkpost_db::Error as Db;
        match e {
            Db::EmptyName => ApiError::Validation("Name must not be empty".into()),
            Db::Conflict(what) => ApiError::Conflict(format!("{what} already exists")),
            Db::NotFound(what) => ApiError::NotFound(format!("{what} not found")),
            Db::UnknownTag(id) => ApiError::Validation(format!("Tag {id} does not exist")),
            Db::UnknownCategory(id) => {
                ApiError::Validation(format!("Category {id} does not exist"))
            }
            other => ApiError::Storage(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MissingSecret | AuthError::Signing(_) => ApiError::Storage(e.to_string()),
            _ => {
                warn!(kind = %e, "token rejected");
                ApiError::Unauthorized("invalid or expired token".into())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        ApiError::Validation(r.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(r: QueryRejection) -> Self {
        ApiError::Validation(r.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(r: PathRejection) -> Self {
        ApiError::NotFound(r.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(r: MultipartRejection) -> Self {
        ApiError::Validation(r.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::Validation(e.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Storage(format!("spawn_blocking join error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};

    async fn render(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn field_errors_land_in_data() {
        let (status, body) = render(ApiError::field("email", "Invalid email")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({"success": false, "message": "Invalid data", "data": {"email": "Invalid email"}})
        );
    }

    #[tokio::test]
    async fn storage_detail_is_not_leaked() {
        let (status, body) = render(ApiError::Storage("disk I/O error at page 7".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Internal server error");
        assert_eq!(body["data"], Value::Null);
    }

    #[test]
    fn db_errors_map_to_statuses() {
        let cases = [
            (inkpost_db::Error::Conflict("slug".into()), StatusCode::BAD_REQUEST),
            (inkpost_db::Error::NotFound("article".into()), StatusCode::NOT_FOUND),
            (inkpost_db::Error::UnknownTag(3), StatusCode::BAD_REQUEST),
            (inkpost_db::Error::EmptyName, StatusCode::BAD_REQUEST),
            (inkpost_db::Error::Lock("poisoned".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn token_failures_are_unauthorized() {
        for e in [AuthError::Malformed, AuthError::Expired, AuthError::InvalidSignature] {
            assert_eq!(ApiError::from(e).status(), StatusCode::UNAUTHORIZED);
        }
    }
}
