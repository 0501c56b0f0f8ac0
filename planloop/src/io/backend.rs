//! Backend abstraction for agent invocation.
//!
//! The [`Backend`] trait decouples the role agents from the process that actually
//! produces an answer (by default `codex exec`). Tests use backends that write
//! predetermined output without spawning anything.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use regex::{Captures, Regex};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::io::process::{CapturedOutput, run_with_timeout};
use crate::io::schema::validate_schema;

/// Placeholders accepted in backend command arguments.
pub const PLACEHOLDERS: [&str; 2] = ["output_schema", "output"];

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder pattern is valid"));

/// Parameters for one backend invocation.
#[derive(Debug, Clone)]
pub struct BackendRequest {
    /// Working directory for the backend process.
    pub workdir: PathBuf,
    /// Prompt text fed to the backend on stdin.
    pub prompt: String,
    /// JSON Schema that constrains the backend's final message.
    pub output_schema_path: PathBuf,
    /// Where the backend must write its final JSON message.
    pub output_path: PathBuf,
    /// Where stdout/stderr of the backend are logged.
    pub log_path: PathBuf,
    /// Maximum time to wait for the backend.
    pub timeout: Duration,
    /// Keep at most this many bytes of each output stream.
    pub output_limit_bytes: usize,
}

/// Abstraction over agent backends.
pub trait Backend {
    /// Run the backend. Must write its output to `request.output_path`.
    fn exec(&self, request: &BackendRequest) -> Result<()>;
}

/// Backend that spawns a configured command line.
///
/// `{output_schema}` and `{output}` in arguments are replaced with the request's
/// paths; the prompt is written to stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBackend {
    command: Vec<String>,
}

impl CommandBackend {
    pub fn new(command: Vec<String>) -> Result<Self> {
        validate_command(&command)?;
        Ok(Self { command })
    }

    /// Default command: `codex exec` constrained by the output schema.
    pub fn default_command() -> Vec<String> {
        [
            "codex",
            "exec",
            "-c",
            "model_reasoning_effort=medium",
            "--skip-git-repo-check",
            "--output-schema",
            "{output_schema}",
            "--output-last-message",
            "{output}",
            "-",
        ]
        .into_iter()
        .map(str::to_string)
        .collect()
    }

    fn render_args(&self, request: &BackendRequest) -> Vec<String> {
        self.command[1..]
            .iter()
            .map(|arg| {
                PLACEHOLDER_RE
                    .replace_all(arg, |caps: &Captures| match &caps[1] {
                        "output_schema" => request.output_schema_path.display().to_string(),
                        "output" => request.output_path.display().to_string(),
                        _ => caps[0].to_string(),
                    })
                    .into_owned()
            })
            .collect()
    }
}

impl Backend for CommandBackend {
    #[instrument(skip_all, fields(program = %self.command[0], timeout_secs = request.timeout.as_secs()))]
    fn exec(&self, request: &BackendRequest) -> Result<()> {
        info!(workdir = %request.workdir.display(), "starting backend");

        if !request.output_schema_path.exists() {
            bail!(
                "missing output schema {}",
                request.output_schema_path.display()
            );
        }
        if let Some(parent) = request.output_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create output dir {}", parent.display()))?;
        }

        let mut cmd = Command::new(&self.command[0]);
        cmd.args(self.render_args(request))
            .current_dir(&request.workdir);

        let output = run_with_timeout(
            cmd,
            request.prompt.as_bytes(),
            request.timeout,
            request.output_limit_bytes,
        )
        .with_context(|| format!("run {}", self.command[0]))?;

        write_backend_log(&request.log_path, &output)?;

        if output.timed_out {
            warn!(timeout_secs = request.timeout.as_secs(), "backend timed out");
            bail!("{} timed out after {:?}", self.command[0], request.timeout);
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "backend failed");
            bail!(
                "{} failed with status {:?} (see {})",
                self.command[0],
                output.status.code(),
                request.log_path.display()
            );
        }

        debug!("backend completed successfully");
        Ok(())
    }
}

/// Reject empty commands and unknown `{placeholder}` arguments.
pub fn validate_command(command: &[String]) -> Result<()> {
    let Some(program) = command.first() else {
        bail!("backend command must be a non-empty array");
    };
    if program.trim().is_empty() {
        bail!("backend command program must not be blank");
    }
    for arg in command {
        for caps in PLACEHOLDER_RE.captures_iter(arg) {
            let name = &caps[1];
            if !PLACEHOLDERS.contains(&name) {
                bail!(
                    "unknown placeholder '{{{name}}}' in backend command (expected one of: {})",
                    PLACEHOLDERS.join(", ")
                );
            }
        }
    }
    Ok(())
}

/// Run the backend, then load its output as `T` after checking it against `schema`.
#[instrument(skip_all, fields(output_path = %request.output_path.display()))]
pub fn execute_and_load_json<B: Backend, T: DeserializeOwned>(
    backend: &B,
    request: &BackendRequest,
    schema: &Value,
) -> Result<T> {
    backend.exec(request)?;
    if !request.output_path.exists() {
        return Err(anyhow!(
            "missing backend output {}",
            request.output_path.display()
        ));
    }
    let contents = fs::read_to_string(&request.output_path)
        .with_context(|| format!("read backend output {}", request.output_path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse {}", request.output_path.display()))?;
    validate_schema(&value, schema)
        .with_context(|| format!("validate {}", request.output_path.display()))?;
    let parsed = serde_json::from_value(value)
        .with_context(|| format!("decode {}", request.output_path.display()))?;
    Ok(parsed)
}

fn write_backend_log(path: &Path, output: &CapturedOutput) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create backend log dir {}", parent.display()))?;
    }
    let mut buf = String::new();
    buf.push_str("=== stdout ===\n");
    buf.push_str(&output.stdout.to_text());
    buf.push_str("\n=== stderr ===\n");
    buf.push_str(&output.stderr.to_text());
    if output.timed_out {
        buf.push_str("\n[backend timed out]\n");
    }
    fs::write(path, buf).with_context(|| format!("write backend log {}", path.display()))
}
