//! Remuxing module
//!
//! Copies a remote stream into a local container file by running ffmpeg
//! without re-encoding. The outcome of every run is returned as a typed
//! [`RemuxOutput`] or [`RemuxError`].

use ffmpeg_sidecar::command::{FfmpegCommand, ffmpeg_is_installed};
use ffmpeg_sidecar::paths::ffmpeg_path;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;

/// Errors that can occur while remuxing a stream
#[derive(Debug, Error)]
pub enum RemuxError {
    /// ffmpeg is neither next to the executable nor on the PATH
    #[error("{0} not found. Please install ffmpeg first.")]
    ToolNotFound(String),

    /// The process could not be started
    #[error("Failed to start {tool}: {source}")]
    Spawn { tool: String, source: io::Error },

    /// The process ran but did not succeed
    #[error("{tool} failed with exit code {code:?}: {stderr}")]
    ExitStatus {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Result of a successful remux run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemuxOutput {
    pub exit_code: Option<i32>,
    /// Captured output; empty when the output was passed through
    pub stdout: String,
    pub stderr: String,
}

/// Copies a stream into a container file
pub trait Remuxer: Send + Sync {
    /// Remuxes `source` (a URL) into `destination`
    fn remux(&self, source: &str, destination: &Path) -> Result<RemuxOutput, RemuxError>;
}

/// [`Remuxer`] running ffmpeg with stream copy
pub struct FfmpegRemuxer {
    binary: PathBuf,
    /// Pass ffmpeg's output through instead of capturing it
    verbose: bool,
    overwrite: bool,
}

impl FfmpegRemuxer {
    /// Uses the ffmpeg found by ffmpeg-sidecar (sidecar binary or PATH)
    pub fn new(verbose: bool, overwrite: bool) -> Self {
        Self::with_binary(ffmpeg_path(), verbose, overwrite)
    }

    pub fn with_binary(binary: PathBuf, verbose: bool, overwrite: bool) -> Self {
        Self {
            binary,
            verbose,
            overwrite,
        }
    }

    /// Checks that ffmpeg can be run
    pub fn ensure_available(&self) -> Result<(), RemuxError> {
        let available = if self.binary == ffmpeg_path() {
            ffmpeg_is_installed()
        } else {
            FfmpegCommand::new_with_path(&self.binary)
                .arg("-version")
                .as_inner_mut()
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|status| status.success())
                .unwrap_or(false)
        };

        if available {
            Ok(())
        } else {
            Err(RemuxError::ToolNotFound(self.tool_name()))
        }
    }

    fn tool_name(&self) -> String {
        self.binary.display().to_string()
    }

    /// ffmpeg invocation copying `source` into `destination`
    fn command(&self, source: &str, destination: &Path) -> FfmpegCommand {
        let mut command = FfmpegCommand::new_with_path(&self.binary);
        command.arg("-nostdin");

        if self.overwrite {
            command.overwrite();
        } else {
            command.no_overwrite();
        }

        command.input(source).args(["-c", "copy"]).output(destination);
        command
    }
}

impl Remuxer for FfmpegRemuxer {
    fn remux(&self, source: &str, destination: &Path) -> Result<RemuxOutput, RemuxError> {
        let mut ffmpeg = self.command(source, destination);

        tracing::debug!(tool = %self.tool_name(), source, destination = %destination.display(), "running remux");

        // Spawned through the inner command: FfmpegChild insists on piped stdio
        let command = ffmpeg.as_inner_mut();
        command.stdin(Stdio::null());

        let result = if self.verbose {
            command
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .map(|status| RemuxOutput {
                    exit_code: status.code(),
                    stdout: String::new(),
                    stderr: String::new(),
                })
        } else {
            command
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .map(|output| RemuxOutput {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                })
        };

        let output = result.map_err(|e| RemuxError::Spawn {
            tool: self.tool_name(),
            source: e,
        })?;

        if output.exit_code != Some(0) {
            return Err(RemuxError::ExitStatus {
                tool: self.tool_name(),
                code: output.exit_code,
                stderr: last_lines(&output.stderr, 5),
            });
        }

        Ok(output)
    }
}

/// The last `count` non-empty lines of `text`
fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(count)..].join("\n")
}
