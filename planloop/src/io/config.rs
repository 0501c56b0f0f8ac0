//! Loop configuration stored in `planloop.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::io::backend::{CommandBackend, validate_command};

/// Default location of the config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "planloop.toml";

/// Loop configuration (TOML).
///
/// Meant to be edited by humans. Missing fields fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoopConfig {
    /// Upper bound on orchestrator steps; `0` disables the bound.
    pub max_steps: u32,

    /// Wall-clock budget for a single agent invocation, in seconds.
    pub agent_timeout_secs: u64,

    /// Keep at most this many bytes of each backend output stream.
    pub output_limit_bytes: usize,

    /// Maximum prompt size in bytes.
    pub prompt_budget_bytes: usize,

    /// Column at which progress output wraps results.
    pub wrap_width: usize,

    pub backend: BackendConfig,
    pub planner: RoleConfig,
    pub executor: RoleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendConfig {
    /// Command line of the agent backend. Supports `{output_schema}` and `{output}`.
    pub command: Vec<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            command: CommandBackend::default_command(),
        }
    }
}

/// Per-role settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleConfig {
    pub name: String,
    /// Overrides `backend.command` for this role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
}

impl RoleConfig {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            command: None,
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_steps: 100,
            agent_timeout_secs: 10 * 60,
            output_limit_bytes: 100_000,
            prompt_budget_bytes: 40_000,
            wrap_width: 80,
            backend: BackendConfig::default(),
            planner: RoleConfig::named("planner"),
            executor: RoleConfig::named("executor"),
        }
    }
}

impl LoopConfig {
    pub fn validate(&self) -> Result<()> {
        if self.agent_timeout_secs == 0 {
            return Err(anyhow!("agent_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.prompt_budget_bytes == 0 {
            return Err(anyhow!("prompt_budget_bytes must be > 0"));
        }
        if self.wrap_width < 20 {
            return Err(anyhow!("wrap_width must be >= 20"));
        }
        validate_command(&self.backend.command).context("backend.command")?;
        for (key, role) in [("planner", &self.planner), ("executor", &self.executor)] {
            if role.name.trim().is_empty() {
                return Err(anyhow!("{key}.name must not be empty"));
            }
            if let Some(command) = &role.command {
                validate_command(command).with_context(|| format!("{key}.command"))?;
            }
        }
        if self.planner.name == self.executor.name {
            return Err(anyhow!("planner.name and executor.name must differ"));
        }
        Ok(())
    }

    /// `None` when the step bound is disabled.
    pub fn step_limit(&self) -> Option<u32> {
        (self.max_steps > 0).then_some(self.max_steps)
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_timeout_secs)
    }

    /// Effective backend command for `role`.
    pub fn command_for<'a>(&'a self, role: &'a RoleConfig) -> &'a [String] {
        role.command.as_deref().unwrap_or(&self.backend.command)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `LoopConfig::default()`.
pub fn load_config(path: &Path) -> Result<LoopConfig> {
    if !path.exists() {
        let cfg = LoopConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: LoopConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &LoopConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');

    let tmp_path = path.with_extension("toml.tmp");
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, LoopConfig::default());
    }

    #[test]
    fn write_then_load_preserves_overrides() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("planloop.toml");
        let cfg = LoopConfig {
            max_steps: 0,
            executor: RoleConfig {
                name: "worker".to_string(),
                command: Some(vec!["my-agent".to_string(), "{output}".to_string()]),
            },
            ..LoopConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
        assert_eq!(loaded.step_limit(), None);
        assert_eq!(loaded.command_for(&loaded.executor)[0], "my-agent");
        assert_eq!(loaded.command_for(&loaded.planner)[0], "codex");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("planloop.toml");
        fs::write(&path, "max_steps = 7\n\n[planner]\nname = \"boss\"\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.step_limit(), Some(7));
        assert_eq!(cfg.planner.name, "boss");
        assert_eq!(cfg.executor.name, "executor");
        assert_eq!(cfg.wrap_width, 80);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let cfg = LoopConfig {
            agent_timeout_secs: 0,
            ..LoopConfig::default()
        };
        assert!(cfg.validate().is_err());

        let mut cfg = LoopConfig::default();
        cfg.planner.command = Some(vec!["agent".to_string(), "{prompt}".to_string()]);
        let err = cfg.validate().unwrap_err();
        assert!(format!("{err:#}").contains("unknown placeholder"));

        let mut cfg = LoopConfig::default();
        cfg.executor.name = "planner".to_string();
        assert!(cfg.validate().is_err());
    }
}
