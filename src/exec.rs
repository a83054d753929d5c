//! External command execution and drush invocation.
//!
//! This module contains:
//!
//! - [`CommandRunner`]: the seam between orchestration logic and real
//!   subprocess execution, so tests can script tool behavior
//! - [`TokioRunner`]: the production runner with timeout handling
//! - [`Invoker`]: drush/composer invocation with binary selection and
//!   output normalization
//! - [`expand`]: named-placeholder argv templating
//!
//! Arguments always travel as discrete argv entries; no shell is involved
//! anywhere, so callers must never pre-escape values.

use crate::profile::{AppProfile, Epoch};
use crate::site::SiteLocation;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Default ceiling for a single external command.
///
/// Core updates and Composer scaffolds are slow; plugin operations are not.
/// One generous ceiling covers both.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(900);

/// Raw output of a finished subprocess, before normalization.
#[derive(Debug, Clone)]
pub struct RawOutput {
    /// Process exit code, `None` when killed by signal.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

/// Normalized result of an external command.
///
/// `success` already accounts for the tool's habit of reporting failures
/// on stdout with a zero exit code; see [`ExecResult::normalize`].
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// Whether the command is considered to have succeeded.
    pub success: bool,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl ExecResult {
    /// Normalize raw process output into a success/stdout/stderr triple.
    ///
    /// If the error channel (stderr preferred, stdout fallback) begins
    /// with the literal token `Error:`, success is forced false regardless
    /// of the exit code, and stdout is copied into stderr when stderr was
    /// empty. drush reports some failures this way with exit code 0.
    pub fn normalize(raw: RawOutput) -> Self {
        let mut success = raw.code == Some(0);
        let mut stderr = raw.stderr;
        let probe = if !stderr.is_empty() { &stderr } else { &raw.stdout };
        if probe.starts_with("Error:") {
            success = false;
            if stderr.is_empty() {
                stderr = raw.stdout.clone();
            }
        }
        Self {
            success,
            stdout: raw.stdout,
            stderr,
        }
    }

    /// Diagnostic text for error reporting: stderr preferred, stdout
    /// fallback.
    pub fn error_text(&self) -> &str {
        if !self.stderr.is_empty() {
            &self.stderr
        } else {
            &self.stdout
        }
    }
}

/// Executes one external command against a working directory.
///
/// The production implementation is [`TokioRunner`]; tests substitute
/// scripted runners to simulate tool behavior without subprocesses.
#[allow(async_fn_in_trait)]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, working directory set to `dir`.
    async fn run(&self, dir: &Path, program: &str, args: &[String]) -> Result<RawOutput>;
}

/// Production runner backed by `tokio::process` with a timeout.
#[derive(Debug, Clone)]
pub struct TokioRunner {
    timeout: Duration,
}

impl TokioRunner {
    /// Runner with the default command timeout.
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Runner with a caller-chosen timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TokioRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for TokioRunner {
    async fn run(&self, dir: &Path, program: &str, args: &[String]) -> Result<RawOutput> {
        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(dir)
            .kill_on_drop(true)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = timeout(self.timeout, command.output())
            .await
            .map_err(|_| Error::Timeout {
                duration: self.timeout,
            })??;

        Ok(RawOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Expand a whitespace-separated argv template with named values.
///
/// Each `{name}` occurrence is replaced from `vars`; a substituted value
/// stays a single argv entry no matter what it contains, which is what
/// makes caller-side escaping unnecessary. Unknown placeholders are left
/// verbatim.
pub fn expand(template: &str, vars: &[(&str, &str)]) -> Vec<String> {
    template
        .split_whitespace()
        .map(|token| {
            let mut out = token.to_string();
            for (name, value) in vars {
                out = out.replace(&format!("{{{name}}}"), value);
            }
            out
        })
        .collect()
}

/// System fallback paths probed when a binary is not in PATH.
const FALLBACK_PATHS: &[&str] = &["/usr/local/bin", "/usr/bin"];

/// Locate a helper binary (`php`, `composer`) via PATH with fallbacks.
///
/// Falls back to the bare name when nothing is found; the runner's own
/// PATH search then gets the last word.
pub(crate) fn find_program(name: &str) -> PathBuf {
    if let Ok(path) = which::which(name) {
        return path;
    }
    for dir in FALLBACK_PATHS {
        let path = PathBuf::from(dir).join(name);
        if path.exists() {
            return path;
        }
    }
    PathBuf::from(name)
}

/// Builds and executes drush/composer commands for one site.
///
/// Binary selection follows the installed epoch and the serving runtime:
/// legacy sites, and any site on a runtime older than the profile's
/// minimum, run the bundled phar through `php`; Composer-epoch sites run
/// their own `vendor/bin/drush`.
pub struct Invoker<'a, R> {
    profile: &'a AppProfile,
    runner: &'a R,
}

impl<'a, R: CommandRunner> Invoker<'a, R> {
    pub fn new(profile: &'a AppProfile, runner: &'a R) -> Self {
        Self { profile, runner }
    }

    /// Resolve the drush program and leading args for this site.
    fn drush_command(&self, location: &SiteLocation) -> (String, Vec<String>) {
        let epoch = self.profile.epoch_of_install(&location.app_root);
        let use_legacy = epoch == Epoch::Legacy || self.profile.runtime_requires_legacy_cli();

        if use_legacy {
            let php = find_program("php");
            (
                php.to_string_lossy().into_owned(),
                vec![self.profile.legacy_cli.to_string_lossy().into_owned()],
            )
        } else {
            let drush = location.app_root.join("vendor/bin/drush");
            (drush.to_string_lossy().into_owned(), Vec::new())
        }
    }

    /// Run a drush subcommand in the site's application root.
    pub async fn drush(&self, location: &SiteLocation, args: &[String]) -> Result<ExecResult> {
        let (program, mut argv) = self.drush_command(location);
        argv.extend_from_slice(args);
        let raw = self
            .runner
            .run(&location.app_root, &program, &argv)
            .await?;
        Ok(ExecResult::normalize(raw))
    }

    /// Run a composer subcommand in an arbitrary directory.
    pub async fn composer(&self, dir: &Path, args: &[String]) -> Result<ExecResult> {
        let composer = find_program("composer");
        let raw = self
            .runner
            .run(dir, &composer.to_string_lossy(), args)
            .await?;
        Ok(ExecResult::normalize(raw))
    }
}
