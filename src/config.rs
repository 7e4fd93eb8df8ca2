use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const CONFIG_PATH_ENV: &str = "KAI_DEMO_CONFIG";

#[derive(Deserialize)]
pub struct Config {
  pub app: AppConfig,
  #[serde(default)]
  pub kai: KaiConfig,
  pub uploads: UploadConfig,
}

#[derive(Deserialize)]
pub struct AppConfig {
  pub listen: String,
  pub metrics_listen: String,
  pub max_body_size_mb: usize,
  pub worker_threads: usize,
  pub request_timeout_secs: Option<u64>,
  pub enable_openapi: Option<bool>,
}

#[derive(Deserialize)]
pub struct KaiConfig {
  /// Directory the executable lives in and runs from, relative to the server's working directory.
  #[serde(default = "default_working_dir")]
  pub working_dir: PathBuf,
  #[serde(default = "default_executable")]
  pub executable: String,
}

impl Default for KaiConfig {
  fn default() -> Self {
    Self {
      working_dir: default_working_dir(),
      executable: default_executable(),
    }
  }
}

#[derive(Deserialize)]
pub struct UploadConfig {
  pub path: PathBuf,
}

fn default_working_dir() -> PathBuf {
  PathBuf::from("build")
}

fn default_executable() -> String {
  "KAI-impl".to_owned()
}

/// Config file location, honouring `KAI_DEMO_CONFIG` when set.
pub fn config_path() -> String {
  std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned())
}

pub fn parse(config_path: &str) -> Result<Config> {
  let toml_str = fs::read_to_string(config_path)
    .with_context(|| format!("failed to read config file: {}", config_path))?;

  from_str(&toml_str).with_context(|| format!("failed to deserialize config: {}", config_path))
}

pub fn from_str(toml_str: &str) -> Result<Config> {
  let cfg: Config = toml::from_str(toml_str)?;

  Ok(cfg)
}
