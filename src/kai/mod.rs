use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

mod error;
mod handler;
pub mod runner;

pub use error::KaiError;
pub use handler::RequestHandler;
pub use runner::{ProcessRunner, RunOutput, Runner};

/// Inserted between the input file stem and its extension to name the output.
pub const OUTPUT_SUFFIX: &str = "_KAI";

/// Extensions KAI-impl accepts, checked in this order.
pub const RECOGNIZED_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".tif"];

/// Option flags passed through to KAI-impl.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KaiOption {
  /// Followed on the command line by the facial imaging library path.
  #[serde(rename = "-facialImgDir")]
  FacialImgDir,
  /// Passed through as is. The config path is always sent positionally, so this flag is inert here.
  #[serde(rename = "-MLConfig")]
  MlConfig,
}

impl KaiOption {
  pub const ALL: [KaiOption; 2] = [KaiOption::FacialImgDir, KaiOption::MlConfig];

  pub fn token(&self) -> &'static str {
    match self {
      KaiOption::FacialImgDir => "-facialImgDir",
      KaiOption::MlConfig => "-MLConfig",
    }
  }
}

impl fmt::Display for KaiOption {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.token())
  }
}

impl FromStr for KaiOption {
  type Err = KaiError;

  fn from_str(token: &str) -> Result<Self, Self::Err> {
    KaiOption::ALL
      .into_iter()
      .find(|opt| opt.token() == token)
      .ok_or_else(|| KaiError::UnknownOption(token.to_owned()))
  }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct KaiRequest {
  /// Image to process. Relative paths are resolved by KAI-impl from its working directory.
  pub input_image_path: String,
  #[serde(default)]
  pub options: Vec<KaiOption>,
  /// Path to the ML task configuration file.
  pub ml_config: String,
  /// Path to the facial imaging library, used with `-facialImgDir`.
  #[serde(default)]
  pub facial_img_dir: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct KaiResponse {
  pub output_image_path: String,
}

/// A validated request, ready to hand to a [`Runner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
  pub output_image_path: String,
  pub option_tokens: Vec<String>,
  pub args: Vec<String>,
}

impl PreparedRequest {
  /// Option tokens joined with spaces, for logging only.
  pub fn options_display(&self) -> String {
    self.option_tokens.join(" ")
  }
}

impl KaiRequest {
  pub fn prepare(&self) -> Result<PreparedRequest, KaiError> {
    let output_image_path = output_path(&self.input_image_path)?;

    let option_tokens = check_arguments(
      &self.ml_config,
      &self.options,
      self.facial_img_dir.as_deref(),
    )?;

    let mut args = Vec::with_capacity(3 + option_tokens.len());
    args.push(self.input_image_path.clone());
    args.push(self.ml_config.clone());
    args.push(output_image_path.clone());
    args.extend(option_tokens.iter().cloned());

    Ok(PreparedRequest {
      output_image_path,
      option_tokens,
      args,
    })
  }
}

/// Derives the output image path: `photo.png` becomes `photo_KAI.png`.
pub fn output_path(input_image_path: &str) -> Result<String, KaiError> {
  RECOGNIZED_EXTENSIONS
    .iter()
    .find(|ext| input_image_path.ends_with(*ext))
    .map(|ext| {
      let stem = &input_image_path[..input_image_path.len() - ext.len()];
      format!("{}{}{}", stem, OUTPUT_SUFFIX, ext)
    })
    .ok_or_else(|| KaiError::UnsupportedFormat(input_image_path.to_owned()))
}

/// Validates everything but the input path and returns the option tokens.
pub fn check_arguments(
  ml_config: &str,
  options: &[KaiOption],
  facial_img_dir: Option<&str>,
) -> Result<Vec<String>, KaiError> {
  if ml_config.trim().is_empty() {
    return Err(KaiError::MissingConfigPath);
  }

  option_tokens(options, facial_img_dir)
}

pub fn option_tokens(
  options: &[KaiOption],
  facial_img_dir: Option<&str>,
) -> Result<Vec<String>, KaiError> {
  let mut tokens = Vec::with_capacity(options.len() + 1);

  for opt in options {
    tokens.push(opt.token().to_owned());

    if *opt == KaiOption::FacialImgDir {
      match facial_img_dir {
        Some(dir) if !dir.trim().is_empty() => tokens.push(dir.to_owned()),
        _ => return Err(KaiError::MissingFacialImageDir),
      }
    }
  }

  Ok(tokens)
}
