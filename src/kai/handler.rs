use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::{KaiError, KaiRequest, Runner};

/// Turns a [`KaiRequest`] into one blocking KAI-impl run.
pub struct RequestHandler {
  runner: Arc<dyn Runner>,
}

impl RequestHandler {
  pub fn new(runner: Arc<dyn Runner>) -> Self {
    Self { runner }
  }

  /// Runs KAI-impl for `request` and returns the output image path.
  ///
  /// Blocks until the child exits. Validation errors are returned before
  /// anything is launched.
  pub fn process(&self, request: &KaiRequest) -> Result<String, KaiError> {
    let prepared = request.prepare()?;

    info!(
      input = %request.input_image_path,
      output = %prepared.output_image_path,
      ml_config = %request.ml_config,
      options = %prepared.options_display(),
      "processing image"
    );

    let start = Instant::now();
    let result = self.run(&prepared.args, &prepared.output_image_path);
    let elapsed = start.elapsed().as_secs_f64();

    let outcome = match &result {
      Ok(()) => "success",
      Err(KaiError::MissingOutput(_)) => "missing_output",
      Err(KaiError::Launch { .. }) => "launch_failure",
      Err(_) => "failure",
    };
    metrics::counter!("kai_invocations_total", "outcome" => outcome).increment(1);
    metrics::histogram!("kai_invocation_duration_seconds").record(elapsed);

    result.map(|()| prepared.output_image_path)
  }

  /// Where the output lands on disk, as seen from the server.
  pub fn resolve(&self, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
      path.to_path_buf()
    } else {
      self.runner.working_dir().join(path)
    }
  }

  fn run(&self, args: &[String], output_image_path: &str) -> Result<(), KaiError> {
    let output = self.runner.run(args)?;

    if !output.stdout.is_empty() {
      debug!(stdout = %output.stdout.trim_end(), "KAI-impl output");
    }

    if !output.success() {
      warn!(code = ?output.code, stderr = %output.stderr.trim_end(), "KAI-impl failed");
      return Err(KaiError::SubprocessFailure {
        code: output.code,
        stderr: output.stderr.trim_end().to_owned(),
      });
    }

    let resolved = self.resolve(output_image_path);
    if !resolved.is_file() {
      warn!(output = %resolved.display(), "KAI-impl exited cleanly without writing output");
      return Err(KaiError::MissingOutput(resolved));
    }

    Ok(())
  }
}
