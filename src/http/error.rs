use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::kai::KaiError;

#[derive(Error, Debug)]
pub enum AppError {
  #[error("bad request {0}")]
  BadRequest(String),
  #[error("external process error {0}")]
  ExternalProcess(String),
  #[error("internal server error {0}")]
  InternalServerError(String),
}

impl From<KaiError> for AppError {
  fn from(err: KaiError) -> Self {
    if err.is_invalid_request() {
      AppError::BadRequest(err.to_string())
    } else {
      AppError::ExternalProcess(err.to_string())
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    match self {
      AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
      AppError::ExternalProcess(msg) => {
        error!("{}", msg);
        (StatusCode::BAD_GATEWAY, msg).into_response()
      }
      AppError::InternalServerError(msg) => {
        error!("internal server error: {}", msg);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
      }
    }
  }
}
