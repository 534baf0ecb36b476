//! Dyad daemon: operator entry point for a governance store.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;

use dyad_external::{Clock, SystemClock};
use dyad_governance::{seed_genesis, EngineConfig, PollInspector, PollStatus};
use dyad_store::GovernanceStore;
use dyad_store_lmdb::{check_data_dir, check_integrity, LmdbEnvironment};
use dyad_types::{GovernanceParams, PollId};
use dyad_utils::{format_remaining, init_logging, LogFormat};

#[derive(Parser)]
#[command(name = "dyad-daemon", about = "Dyad governance engine admin tool")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base;
    /// flags and env vars override them.
    #[arg(long, env = "DYAD_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the LMDB environment.
    #[arg(long, env = "DYAD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "DYAD_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "DYAD_LOG_FORMAT")]
    log_format: Option<String>,

    /// Use short polls and low thresholds for local testing.
    #[arg(long, env = "DYAD_TESTNET")]
    testnet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Write the constitution, whitelist and founder allowance if absent.
    Seed,
    /// Read-only views of the store.
    Inspect {
        #[command(subcommand)]
        target: InspectTarget,
    },
    /// Count every table and verify the schema version.
    Check,
    /// Print the effective configuration as TOML.
    Config,
}

#[derive(clap::Subcommand)]
enum InspectTarget {
    /// One poll, as JSON.
    Poll { id: u64 },
    /// All polls, optionally filtered by status.
    Polls {
        #[arg(long, value_parser = parse_status)]
        status: Option<PollStatus>,
    },
    /// True Self vs. Shadow divergence of one poll.
    Shadow { id: u64 },
    /// Rollback action of one poll, if any.
    Rollback { id: u64 },
    /// Parameter whitelist with current values.
    Whitelist,
    /// Articles of the stored constitution.
    Constitution,
}

fn parse_status(s: &str) -> Result<PollStatus, String> {
    match s.to_ascii_lowercase().as_str() {
        "open" => Ok(PollStatus::Open),
        "closed" => Ok(PollStatus::Closed),
        "resolved" => Ok(PollStatus::Resolved),
        "rolled_back" | "rolledback" => Ok(PollStatus::RolledBack),
        "withdrawn" => Ok(PollStatus::Withdrawn),
        other => Err(format!("unknown poll status '{other}'")),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let path = path.to_str().context("config path is not valid UTF-8")?;
            EngineConfig::from_toml_file(path)?
        }
        None => EngineConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.log_format = format.clone();
    }
    if cli.testnet {
        config.params = GovernanceParams {
            founder: config.params.founder.take(),
            trusted_detectors: std::mem::take(&mut config.params.trusted_detectors),
            ..GovernanceParams::testnet_defaults()
        };
    }
    Ok(config)
}

fn open_store(config: &EngineConfig) -> anyhow::Result<Arc<LmdbEnvironment>> {
    check_data_dir(&config.data_dir).map_err(anyhow::Error::msg)?;
    let env = LmdbEnvironment::open(&config.data_dir, config.lmdb_map_size)
        .with_context(|| format!("opening {}", config.data_dir.display()))?;
    tracing::debug!(schema = env.schema_version()?, "store ready");
    Ok(Arc::new(env))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let format: LogFormat = config.log_format.parse().map_err(anyhow::Error::msg)?;
    init_logging(format, &config.log_level);

    match &cli.command {
        Command::Config => {
            print!("{}", config.to_toml_string()?);
        }
        Command::Seed => {
            let store = open_store(&config)?;
            let report = seed_genesis(store.as_ref(), &config.params, SystemClock.now())?;
            println!(
                "constitution: {}, whitelist entries: {}, founder allowance: {}",
                if report.constitution { "written" } else { "present" },
                report.whitelist_entries,
                if report.founder_authority { "written" } else { "present or disabled" },
            );
        }
        Command::Check => {
            let store = open_store(&config)?;
            let report = check_integrity(&store)?;
            for (table, count) in &report.entries_per_table {
                println!("{table:<22} {count}");
            }
            println!("{} tables, {} entries", report.databases_checked, report.total_entries);
            if !report.is_healthy() {
                for error in &report.errors {
                    eprintln!("error: {error}");
                }
                bail!("integrity check failed with {} error(s)", report.errors.len());
            }
        }
        Command::Inspect { target } => {
            let store: Arc<dyn GovernanceStore> = open_store(&config)?;
            inspect(PollInspector::new(store), target)?;
        }
    }
    Ok(())
}

fn inspect(inspector: PollInspector, target: &InspectTarget) -> anyhow::Result<()> {
    let now = SystemClock.now();
    match target {
        InspectTarget::Poll { id } => {
            let poll = inspector.get_poll(PollId::new(*id))?;
            println!("{}", serde_json::to_string_pretty(&poll)?);
        }
        InspectTarget::Polls { status } => {
            for poll in inspector.list_polls(*status)? {
                let timing = match poll.status {
                    PollStatus::Open => format!("closes in {}", format_remaining(now.as_secs(), poll.closes_at.as_secs())),
                    _ => poll.outcome.map_or_else(String::new, |o| o.to_string()),
                };
                println!("{:<10} {:<14} {:<11} {:<16} {}", poll.id, poll.kind.name(), poll.status, timing, poll.title);
            }
        }
        InspectTarget::Shadow { id } => {
            let shadow = inspector.shadow_consensus(PollId::new(*id), now)?;
            let pct = |bps: Option<u32>| bps.map_or_else(|| "n/a".to_string(), |b| format!("{:.2}%", b as f64 / 100.0));
            println!("true self yes: {}", pct(shadow.true_self_yes_bps));
            println!("shadow yes:    {}", pct(shadow.shadow_yes_bps));
            match shadow.gap_points() {
                Some(gap) => println!("gap:           {gap:+} points"),
                None => println!("gap:           n/a"),
            }
        }
        InspectTarget::Rollback { id } => match inspector.rollback_action(PollId::new(*id))? {
            Some(action) => println!("{}", serde_json::to_string_pretty(&action)?),
            None => println!("no rollback action"),
        },
        InspectTarget::Whitelist => {
            for entry in inspector.whitelist()? {
                println!("{:<32} {:<12} {}", entry.name, entry.category, entry.current_value);
            }
        }
        InspectTarget::Constitution => match inspector.constitution()? {
            Some(doc) => {
                println!("constitution v{}", doc.version);
                for article in &doc.articles {
                    println!(
                        "  {:>2}. {} (v{}{})",
                        article.number,
                        article.title,
                        article.version,
                        if article.is_active() { "" } else { ", repealed" }
                    );
                }
            }
            None => println!("not seeded"),
        },
    }
    Ok(())
}
