//! Handler errors rendered as OpenAI error bodies.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::openai::{ErrorBody, ErrorDetail};
use crate::translate::TranslateError;
use crate::vertex::VertexError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error(transparent)]
    Vertex(#[from] VertexError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Translate(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Translate(_) | ApiError::Vertex(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True when the error came from Vertex AI rather than the client.
    pub fn is_upstream(&self) -> bool {
        self.status() == StatusCode::INTERNAL_SERVER_ERROR
    }

    pub fn body(&self) -> ErrorBody {
        let (kind, code) = match self {
            ApiError::Unauthorized(_) => ("invalid_request_error", Some("invalid_api_key")),
            _ if self.status() == StatusCode::BAD_REQUEST => ("invalid_request_error", None),
            _ => ("server_error", None),
        };

        ErrorBody {
            error: ErrorDetail {
                message: self.to_string(),
                kind: kind.to_string(),
                code: code.map(str::to_string),
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
