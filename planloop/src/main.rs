//! `planloop` command line.
//!
//! Runs a planner agent and an executor agent in a loop until the planner
//! declares the objective complete.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use planloop::agents::executor::ExecutorAgent;
use planloop::agents::planner::PlannerAgent;
use planloop::agents::{AgentMap, AgentSettings};
use planloop::core::memory::Memory;
use planloop::core::types::State;
use planloop::exit_codes;
use planloop::io::backend::CommandBackend;
use planloop::io::config::{DEFAULT_CONFIG_PATH, LoopConfig, load_config, write_config};
use planloop::logging;
use planloop::orchestrator::Orchestrator;
use planloop::report::Reporter;

#[derive(Parser)]
#[command(
    name = "planloop",
    version,
    about = "Planner/executor agent loop driven by an objective"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the default config file.
    Init {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Load and validate the config file.
    Validate {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
    },
    /// Run the loop until the objective is completed.
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Objective handed to the planner.
    #[arg(long)]
    objective: String,
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Keep per-invocation artifacts here instead of a temporary directory.
    #[arg(long)]
    artifacts: Option<PathBuf>,
    /// Write the final memory as JSON.
    #[arg(long)]
    memory_out: Option<PathBuf>,
    /// Suppress progress output.
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(exit_codes::for_error(&err));
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { config, force } => cmd_init(&config, force),
        Command::Validate { config } => cmd_validate(&config),
        Command::Run(args) => cmd_run(args),
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &LoopConfig::default())?;
    println!("wrote {}", path.display());
    Ok(())
}

fn cmd_validate(path: &Path) -> Result<()> {
    let cfg = load_config(path)?;
    let source = if path.exists() {
        path.display().to_string()
    } else {
        "defaults".to_string()
    };
    println!(
        "config ok ({source}): planner '{}', executor '{}'",
        cfg.planner.name, cfg.executor.name
    );
    Ok(())
}

fn cmd_run(args: RunArgs) -> Result<()> {
    if args.objective.trim().is_empty() {
        bail!("objective must not be empty");
    }
    let cfg = load_config(&args.config)?;

    // Removed on success, kept when the run fails.
    let (artifacts_dir, temp) = match args.artifacts {
        Some(dir) => (dir, None),
        None => {
            let temp = tempfile::Builder::new()
                .prefix("planloop-")
                .tempdir()
                .context("create artifacts dir")?;
            (temp.path().to_path_buf(), Some(temp))
        }
    };
    let settings = AgentSettings {
        workdir: std::env::current_dir().context("resolve working directory")?,
        artifacts_dir,
        prompt_budget_bytes: cfg.prompt_budget_bytes,
        output_limit_bytes: cfg.output_limit_bytes,
        timeout: cfg.agent_timeout(),
    };
    info!(artifacts = %settings.artifacts_dir.display(), "starting run");

    let agents = build_agents(&cfg, settings)?;
    let reporter = (!args.quiet).then(|| Reporter::new(cfg.wrap_width));
    let result = Orchestrator::new(Memory::new(args.objective), agents)
        .with_max_steps(cfg.step_limit())
        .run_with(|event| {
            if let Some(reporter) = &reporter {
                reporter.handle(event);
            }
        });
    let memory = match result {
        Ok(memory) => memory,
        Err(err) => {
            if let Some(temp) = temp {
                let kept = temp.keep();
                eprintln!("artifacts kept at {}", kept.display());
            }
            return Err(err.into());
        }
    };

    if let Some(path) = &args.memory_out {
        write_json(path, &memory).context("write final memory")?;
    }
    println!(
        "Final Response: {}",
        memory.final_response().unwrap_or_default()
    );
    Ok(())
}

fn build_agents(cfg: &LoopConfig, settings: AgentSettings) -> Result<AgentMap> {
    let planner = PlannerAgent::new(
        &cfg.planner.name,
        CommandBackend::new(cfg.command_for(&cfg.planner).to_vec())?,
        settings.clone(),
    )?;
    let executor = ExecutorAgent::new(
        &cfg.executor.name,
        CommandBackend::new(cfg.command_for(&cfg.executor).to_vec())?,
        settings,
    )?;

    let mut agents = AgentMap::new();
    agents.insert(State::Plan, Box::new(planner));
    agents.insert(State::Execute, Box::new(executor));
    Ok(agents)
}

/// Serialize `value` to pretty-printed JSON with trailing newline.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut payload = serde_json::to_string_pretty(value).context("serialize json")?;
    payload.push('\n');
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(path, payload).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_requires_objective() {
        assert!(Cli::try_parse_from(["planloop", "run"]).is_err());
    }

    #[test]
    fn run_parses_all_flags() {
        let cli = Cli::try_parse_from([
            "planloop",
            "run",
            "--objective",
            "Create a report",
            "--config",
            "custom.toml",
            "--artifacts",
            "out",
            "--memory-out",
            "memory.json",
            "--quiet",
        ])
        .expect("parse");
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.objective, "Create a report");
        assert_eq!(args.config, PathBuf::from("custom.toml"));
        assert_eq!(args.artifacts, Some(PathBuf::from("out")));
        assert_eq!(args.memory_out, Some(PathBuf::from("memory.json")));
        assert!(args.quiet);
    }

    #[test]
    fn config_defaults_to_planloop_toml() {
        let cli = Cli::try_parse_from(["planloop", "validate"]).expect("parse");
        let Command::Validate { config } = cli.command else {
            panic!("expected validate");
        };
        assert_eq!(config, PathBuf::from("planloop.toml"));
    }
}
