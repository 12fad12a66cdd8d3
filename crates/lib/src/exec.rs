//! Command execution for recipe hooks and package manager installs.
//!
//! Unlike a hermetic builder, commands here inherit the caller's environment:
//! recipes compile against whatever the host provides. Extra variables are
//! layered on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ExecError {
  #[error("failed to spawn '{cmd}': {source}")]
  Spawn {
    cmd: String,
    #[source]
    source: std::io::Error,
  },

  #[error("command failed with exit code {code:?}: {cmd}")]
  CmdFailed { cmd: String, code: Option<i32> },

  #[error("command cancelled: {0}")]
  Cancelled(String),
}

/// How a command runs.
#[derive(Debug, Clone, Default)]
pub struct ExecOpts {
  /// Working directory; `None` keeps the current one.
  pub cwd: Option<PathBuf>,
  /// Variables added to the inherited environment.
  pub env: BTreeMap<String, String>,
  /// Capture stdout instead of passing it through to the terminal.
  pub capture: bool,
  pub cancel: CancellationToken,
}

impl ExecOpts {
  pub fn in_dir(cwd: impl Into<PathBuf>) -> Self {
    Self {
      cwd: Some(cwd.into()),
      ..Default::default()
    }
  }
}

/// Run `cmd` through `/bin/sh -c`.
///
/// Returns the trimmed stdout when capturing, an empty string otherwise.
pub async fn run_shell(cmd: &str, opts: &ExecOpts) -> Result<String, ExecError> {
  let mut command = Command::new("/bin/sh");
  command.arg("-c").arg(cmd);
  run(command, cmd, opts).await
}

/// Run `program` with `args` directly, without a shell.
pub async fn run_program<S: AsRef<str>>(program: &str, args: &[S], opts: &ExecOpts) -> Result<String, ExecError> {
  let mut command = Command::new(program);
  command.args(args.iter().map(AsRef::as_ref));

  let cmd_line = std::iter::once(program)
    .chain(args.iter().map(AsRef::as_ref))
    .collect::<Vec<_>>()
    .join(" ");
  run(command, &cmd_line, opts).await
}

async fn run(mut command: Command, cmd_line: &str, opts: &ExecOpts) -> Result<String, ExecError> {
  info!(cmd = %cmd_line, "executing command");

  let working_dir: Option<&Path> = opts.cwd.as_deref();
  if let Some(dir) = working_dir {
    command.current_dir(dir);
  }
  command.envs(&opts.env).kill_on_drop(true).stdin(Stdio::null());

  if opts.capture {
    command.stdout(Stdio::piped()).stderr(Stdio::piped());
  } else {
    command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
  }

  debug!(working_dir = ?working_dir, capture = opts.capture, "spawning process");

  let child = command.spawn().map_err(|source| ExecError::Spawn {
    cmd: cmd_line.to_string(),
    source,
  })?;

  let output = tokio::select! {
    biased;
    _ = opts.cancel.cancelled() => {
      return Err(ExecError::Cancelled(cmd_line.to_string()));
    }
    output = child.wait_with_output() => output.map_err(|source| ExecError::Spawn {
      cmd: cmd_line.to_string(),
      source,
    })?,
  };

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.is_empty() {
      debug!(stderr = %stderr, "command stderr");
    }
    return Err(ExecError::CmdFailed {
      cmd: cmd_line.to_string(),
      code: output.status.code(),
    });
  }

  let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
  if !stdout.is_empty() {
    debug!(stdout = %stdout, "command output");
  }
  Ok(stdout)
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn capture() -> ExecOpts {
    ExecOpts {
      capture: true,
      ..Default::default()
    }
  }

  #[tokio::test]
  async fn simple_command() {
    let result = run_shell("echo hello", &capture()).await.unwrap();
    assert_eq!(result, "hello");
  }

  #[tokio::test]
  async fn extra_env_is_visible() {
    let mut opts = capture();
    opts.env.insert("MY_VAR".to_string(), "my_value".to_string());
    let result = run_shell("echo $MY_VAR", &opts).await.unwrap();
    assert_eq!(result, "my_value");
  }

  #[tokio::test]
  async fn caller_env_is_inherited() {
    let result = run_shell("echo $PATH", &capture()).await.unwrap();
    assert!(!result.is_empty());
  }

  #[tokio::test]
  async fn failure_reports_exit_code() {
    let result = run_shell("exit 3", &capture()).await;
    assert!(matches!(result, Err(ExecError::CmdFailed { code: Some(3), .. })));
  }

  #[tokio::test]
  async fn runs_in_cwd() {
    let temp = TempDir::new().unwrap();
    let opts = ExecOpts {
      capture: true,
      ..ExecOpts::in_dir(temp.path())
    };
    run_shell("touch cwd_marker", &opts).await.unwrap();
    assert!(temp.path().join("cwd_marker").exists());
  }

  #[tokio::test]
  async fn multiline_command() {
    let cmd = r#"
      x=1
      y=2
      echo $((x + y))
    "#;
    assert_eq!(run_shell(cmd, &capture()).await.unwrap(), "3");
  }

  #[tokio::test]
  async fn program_without_shell() {
    let result = run_program("echo", &["a", "b"], &capture()).await.unwrap();
    assert_eq!(result, "a b");
  }

  #[tokio::test]
  async fn failed_program_reports_command_line() {
    let result = run_program("sh", &["-c", "exit 4"], &capture()).await;
    match result {
      Err(ExecError::CmdFailed { cmd, code }) => {
        assert_eq!(cmd, "sh -c exit 4");
        assert_eq!(code, Some(4));
      }
      other => panic!("unexpected result: {:?}", other),
    }
  }

  #[tokio::test]
  async fn missing_program_fails_to_spawn() {
    let result = run_program::<&str>("/nonexistent/program", &[], &capture()).await;
    assert!(matches!(result, Err(ExecError::Spawn { .. })));
  }

  #[tokio::test]
  async fn cancellation_stops_command() {
    let opts = capture();
    opts.cancel.cancel();
    let result = run_shell("sleep 5", &opts).await;
    assert!(matches!(result, Err(ExecError::Cancelled(_))));
  }
}
