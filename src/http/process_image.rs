use axum::{
  extract::{self, State},
  http::{header, HeaderName, StatusCode},
  response::IntoResponse,
};
use tracing::error;
use utoipa::ToSchema;

use crate::http::error::AppError;
use crate::http::uploads;
use crate::http::AppState;
use crate::kai::{self, KaiOption, KaiRequest};

pub const X_KAI_OUTPUT_PATH: HeaderName = HeaderName::from_static("x-kai-output-path");

/// Multipart fields accepted by [`process_image`].
#[allow(dead_code)]
#[derive(ToSchema)]
pub struct UploadForm {
  #[schema(value_type = String, format = Binary)]
  image: Vec<u8>,
  /// Repeat the field once per selected option.
  options: Vec<KaiOption>,
  /// Path to the ML task configuration file.
  ml_config: String,
  /// Path to the facial imaging library.
  facial_img_dir: Option<String>,
}

/// Upload an image, run KAI-impl on it and get the output image back
#[utoipa::path(
  post,
  path = "/api/v1/process-image",
  request_body(content = UploadForm, content_type = "multipart/form-data"),
  responses(
    (status = 200, description = "Output image; its server path is in the X-KAI-Output-Path header"),
    (status = 400, description = "Missing fields, unsupported image format or invalid options", body = String),
    (status = 502, description = "KAI-impl could not be launched, failed, or wrote no output", body = String)
  )
)]
pub async fn process_image(
  State(state): State<AppState>,
  mut multipart: extract::Multipart,
) -> Result<impl IntoResponse, AppError> {
  let mut uploaded_image: Option<(axum::body::Bytes, Option<String>)> = None;
  let mut options: Vec<KaiOption> = Vec::new();
  let mut ml_config: Option<String> = None;
  let mut facial_img_dir: Option<String> = None;

  while let Some(field) = multipart
    .next_field()
    .await
    .map_err(|e| AppError::BadRequest(e.to_string()))?
  {
    let name = field.name().unwrap_or("").to_owned();

    match name.as_str() {
      "image" => {
        let file_name = field.file_name().map(str::to_owned);
        let data = field
          .bytes()
          .await
          .map_err(|e| AppError::BadRequest(e.to_string()))?;
        if !data.is_empty() {
          uploaded_image = Some((data, file_name));
        }
      }
      "options" => {
        let token = field
          .text()
          .await
          .map_err(|e| AppError::BadRequest(e.to_string()))?;
        options.push(token.trim().parse()?);
      }
      "ml_config" => {
        ml_config = Some(
          field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?,
        );
      }
      "facial_img_dir" => {
        let dir = field
          .text()
          .await
          .map_err(|e| AppError::BadRequest(e.to_string()))?;
        facial_img_dir = Some(dir).filter(|d| !d.trim().is_empty());
      }
      _ => {}
    }
  }

  let Some((data, file_name)) = uploaded_image else {
    return Err(AppError::BadRequest("missing image".to_owned()));
  };

  let ml_config = ml_config.unwrap_or_default();

  // Reject bad requests before anything is written to the upload directory.
  let ext = uploads::detect_extension(&data, file_name.as_deref())?;
  kai::check_arguments(&ml_config, &options, facial_img_dir.as_deref())?;

  let input_path = state
    .uploads
    .store(&data, ext)
    .await
    .map_err(|e| AppError::InternalServerError(e.to_string()))?;

  let request = KaiRequest {
    input_image_path: input_path.to_string_lossy().into_owned(),
    options,
    ml_config,
    facial_img_dir,
  };

  let output_image_path = state.process(request).await?;
  let output_file = state.handler.resolve(&output_image_path);

  let body = state.uploads.read(&output_file).await.map_err(|e| {
    error!("failed to read KAI-impl output: {}", e);
    AppError::InternalServerError(e.to_string())
  })?;

  let headers = [
    (header::CONTENT_TYPE, uploads::mime_for(&output_file).to_owned()),
    (X_KAI_OUTPUT_PATH, output_image_path),
  ];

  Ok((StatusCode::OK, headers, body))
}
