use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KaiError {
  #[error("unsupported image format: {0} (expected .jpg, .jpeg, .png or .tif)")]
  UnsupportedFormat(String),
  #[error("unknown option: {0}")]
  UnknownOption(String),
  #[error("path to the ML task configuration file is required")]
  MissingConfigPath,
  #[error("-facialImgDir was selected without a facial imaging library path")]
  MissingFacialImageDir,
  #[error("failed to launch {}: {source}", .program.display())]
  Launch {
    program: PathBuf,
    #[source]
    source: io::Error,
  },
  #[error("KAI-impl failed ({}): {stderr}", exit_description(.code))]
  SubprocessFailure { code: Option<i32>, stderr: String },
  #[error("KAI-impl finished but produced no output at {}", .0.display())]
  MissingOutput(PathBuf),
}

impl KaiError {
  /// Errors caused by the request itself rather than by the external process.
  pub fn is_invalid_request(&self) -> bool {
    matches!(
      self,
      KaiError::UnsupportedFormat(_)
        | KaiError::UnknownOption(_)
        | KaiError::MissingConfigPath
        | KaiError::MissingFacialImageDir
    )
  }
}

fn exit_description(code: &Option<i32>) -> String {
  match *code {
    Some(code) => format!("exit code {}", code),
    None => "terminated by signal".to_owned(),
  }
}
