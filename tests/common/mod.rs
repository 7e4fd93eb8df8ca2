//! Shared fixture: shell scripts standing in for KAI-impl, a config file and input images.
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use kai_demo::config;
use tempfile::TempDir;

/// Records its arguments next to the output, copies the input to the output.
const SUCCEEDS: &str = r#"#!/bin/sh
printf '%s\n' "$@" > "$3.args"
pwd -P > "$3.cwd"
cp "$1" "$3"
echo "[KAI Task Manager]-- Process completed successfully!"
"#;

const FAILS: &str = r#"#!/bin/sh
echo "[KAI Task Manager]-- Error: Could not open the MLConfig JSON file!" >&2
exit 3
"#;

const WRITES_NOTHING: &str = "#!/bin/sh\nexit 0\n";

#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub enum Kai {
  Succeeds,
  Fails,
  WritesNothing,
  /// No `build` directory at all.
  Missing,
}

impl Kai {
  fn dir_name(&self) -> &'static str {
    match self {
      Kai::Succeeds => "succeeds",
      Kai::Fails => "fails",
      Kai::WritesNothing => "writes-nothing",
      Kai::Missing => "missing",
    }
  }
}

pub struct Fixture {
  root: TempDir,
}

static FIXTURE: OnceLock<Fixture> = OnceLock::new();

/// Every executable is written here once, before any test launches a child process.
pub fn fixture() -> &'static Fixture {
  FIXTURE.get_or_init(|| {
    let root = tempfile::tempdir().expect("failed to create fixture dir");

    for (kai, script) in [
      (Kai::Succeeds, SUCCEEDS),
      (Kai::Fails, FAILS),
      (Kai::WritesNothing, WRITES_NOTHING),
    ] {
      let build = root.path().join(kai.dir_name()).join("build");
      fs::create_dir_all(&build).unwrap();
      let program = build.join("KAI-impl");
      fs::write(&program, script).unwrap();
      fs::set_permissions(&program, fs::Permissions::from_mode(0o755)).unwrap();
    }
    fs::create_dir_all(root.path().join(Kai::Missing.dir_name())).unwrap();

    fs::create_dir_all(root.path().join("images")).unwrap();
    fs::write(root.path().join("ml_config.json"), r#"{"tasks": []}"#).unwrap();

    Fixture { root }
  })
}

#[allow(dead_code)]
impl Fixture {
  pub fn working_dir(&self, kai: Kai) -> PathBuf {
    self.root.path().join(kai.dir_name()).join("build")
  }

  pub fn ml_config(&self) -> String {
    self
      .root
      .path()
      .join("ml_config.json")
      .to_string_lossy()
      .into_owned()
  }

  pub fn uploads_dir(&self) -> PathBuf {
    self.root.path().join("uploads")
  }

  /// Writes a small PNG to `dir`, named `name`. Names must be unique per test.
  pub fn image_in(&self, dir: &Path, name: &str) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, png_bytes()).unwrap();
    path
  }

  pub fn image(&self, name: &str) -> PathBuf {
    self.image_in(&self.root.path().join("images"), name)
  }

  pub fn config(&self, kai: Kai) -> config::Config {
    config::Config {
      app: config::AppConfig {
        listen: "0.0.0.0:0".to_string(),
        metrics_listen: "0.0.0.0:0".to_string(),
        max_body_size_mb: 10,
        worker_threads: 2,
        request_timeout_secs: Some(30),
        enable_openapi: Some(true),
      },
      kai: config::KaiConfig {
        working_dir: self.working_dir(kai),
        executable: "KAI-impl".to_string(),
      },
      uploads: config::UploadConfig {
        path: self.uploads_dir(),
      },
    }
  }
}

pub fn png_bytes() -> Vec<u8> {
  let img = image::RgbImage::from_pixel(2, 2, image::Rgb([200, 120, 80]));
  let mut data = std::io::Cursor::new(Vec::new());
  img
    .write_to(&mut data, image::ImageFormat::Png)
    .expect("failed to encode png");
  data.into_inner()
}

/// Lines written by the succeeding script for a run that produced `output`.
pub fn recorded_args(output: &str) -> Vec<String> {
  fs::read_to_string(format!("{}.args", output))
    .expect("KAI-impl did not record its arguments")
    .lines()
    .map(str::to_owned)
    .collect()
}
