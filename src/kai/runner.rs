use std::path::{self, Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use super::KaiError;

#[derive(Debug, Clone, Default)]
pub struct RunOutput {
  /// `None` when the process was terminated by a signal.
  pub code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl RunOutput {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }
}

/// Runs KAI-impl to completion with the given positional arguments.
pub trait Runner: Send + Sync {
  /// Directory the executable runs in. Relative paths in `args` are resolved from here.
  fn working_dir(&self) -> &Path;

  fn run(&self, args: &[String]) -> Result<RunOutput, KaiError>;
}

/// Launches the executable as a child process without going through a shell.
///
/// The working directory is set on the child only, so the server's own
/// working directory never changes and concurrent runs cannot interfere.
pub struct ProcessRunner {
  program: PathBuf,
  working_dir: PathBuf,
}

impl ProcessRunner {
  pub fn new(working_dir: impl AsRef<Path>, executable: &str) -> Result<Self, KaiError> {
    let working_dir = path::absolute(working_dir.as_ref()).map_err(|source| KaiError::Launch {
      program: working_dir.as_ref().join(executable),
      source,
    })?;

    Ok(Self {
      program: working_dir.join(executable),
      working_dir,
    })
  }

  pub fn program(&self) -> &Path {
    &self.program
  }
}

impl Runner for ProcessRunner {
  fn working_dir(&self) -> &Path {
    &self.working_dir
  }

  fn run(&self, args: &[String]) -> Result<RunOutput, KaiError> {
    debug!(
      program = %self.program.display(),
      working_dir = %self.working_dir.display(),
      "running {} {}",
      self.program.display(),
      args.join(" ")
    );

    let output = Command::new(&self.program)
      .args(args)
      .current_dir(&self.working_dir)
      .stdin(Stdio::null())
      .output()
      .map_err(|source| KaiError::Launch {
        program: self.program.clone(),
        source,
      })?;

    Ok(RunOutput {
      code: output.status.code(),
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
  }
}
