use axum::{extract::State, Json};

use crate::http::error::AppError;
use crate::http::AppState;
use crate::kai::{KaiRequest, KaiResponse};

/// Process an image that already exists on the server's filesystem
#[utoipa::path(
  post,
  path = "/api/v1/process",
  request_body = KaiRequest,
  responses(
    (status = 200, description = "KAI-impl wrote the output image", body = KaiResponse),
    (status = 400, description = "Unsupported image format or invalid options", body = String),
    (status = 502, description = "KAI-impl could not be launched, failed, or wrote no output", body = String)
  )
)]
pub async fn process(
  State(state): State<AppState>,
  Json(request): Json<KaiRequest>,
) -> Result<Json<KaiResponse>, AppError> {
  let output_image_path = state.process(request).await?;

  Ok(Json(KaiResponse { output_image_path }))
}
