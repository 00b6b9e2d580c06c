//! HTTP-facing errors. Every failure leaves as `(status, plain text)`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// An upstream answered with a non-2xx status, passed through as-is.
    #[error("{message}")]
    Upstream { status: u16, message: String },

    /// An upstream could not be reached or sent something unreadable.
    #[error("{0}")]
    BadGateway(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<common::Error> for AppError {
    fn from(err: common::Error) -> Self {
        match err {
            common::Error::InvalidInput(msg) => AppError::BadRequest(msg),
            common::Error::NotFound(msg) => AppError::NotFound(msg),
            common::Error::Upstream { status, .. } => AppError::Upstream {
                status,
                message: err.to_string(),
            },
            common::Error::Http(_) | common::Error::MalformedResponse { .. } => {
                AppError::BadGateway(err.to_string())
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!("{} {}", status.as_u16(), self);
        }
        (status, self.to_string()).into_response()
    }
}
