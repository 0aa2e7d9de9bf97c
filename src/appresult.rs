use axum::{extract::{rejection::JsonRejection, FromRequest}, http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;

use crate::RelayError;

pub type AppResult<T> = Result<T, AppError>;

/// `axum::Json` for request bodies, rejecting with an `AppError`.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        if self.0.is::<JsonRejection>() {
            return StatusCode::BAD_REQUEST;
        }

        match self.0.downcast_ref::<RelayError>() {
            Some(RelayError::RoomNotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, backtrace = %self.0.backtrace(), "request failed");
        }

        (
            status,
            Json(json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
