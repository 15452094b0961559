//! doseguard CLI: inspect and drive the dosing-constraint engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use doseguard::checker::ConstraintsChecker;
use doseguard::clock::{Clock, SystemClock, Timestamp};
use doseguard::config::DoseguardConfig;
use doseguard::freshness::VersionGuard;
use doseguard::limits::TherapyLimits;
use doseguard::notify::TracingSink;
use doseguard::store::{DurableStateStore, MemoryStateStore, StateKey, StateStore};
use doseguard::update::NullChannel;

#[derive(Parser)]
#[command(name = "doseguard", version, about = "Dosing-constraint aggregation engine")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "doseguard.toml")]
    config: PathBuf,

    /// Data directory for durable state (overrides the config file).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a data directory and write a default configuration file.
    Init,

    /// Run one decision cycle and print the resolved dosing limits.
    Status {
        /// Emit the resolved limits as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Inspect or set the staleness signal (stands in for an update channel).
    Stale {
        #[command(subcommand)]
        action: StaleAction,
    },
}

#[derive(Subcommand)]
enum StaleAction {
    /// Show the staleness signal, freshness stage, and gate timestamps.
    Show,
    /// Mark the installed software stale as of N days ago.
    Set {
        /// How many days ago the newer release appeared.
        #[arg(long)]
        days_ago: u64,
    },
    /// Clear the staleness signal (installation is current again).
    Clear,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = DoseguardConfig::load_or_default(&cli.config).into_diagnostic()?;
    let data_dir = cli.data_dir.clone().or_else(|| config.data_dir.clone());

    match cli.command {
        Commands::Init => {
            if cli.config.exists() {
                miette::bail!("config already exists at {}", cli.config.display());
            }
            let data_dir = data_dir.unwrap_or_else(|| PathBuf::from(".doseguard"));

            // Opening creates the directory and the database file.
            DurableStateStore::open(&data_dir).into_diagnostic()?;

            let config = DoseguardConfig {
                data_dir: Some(data_dir.clone()),
                ..DoseguardConfig::default()
            };
            config.save(&cli.config).into_diagnostic()?;

            println!("Initialized doseguard at {}", data_dir.display());
            println!("Config written to {}", cli.config.display());
        }

        Commands::Status { json } => {
            let store = open_store(data_dir.as_deref())?;
            let mut checker = build_checker(&config, store)?;
            let limits = checker.evaluate();

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&limits).into_diagnostic()?
                );
            } else {
                println!("Dosing limits:");
                println!(
                    "  closed loop allowed: {}",
                    limits.closed_loop_allowed.value()
                );
                for narrowing in limits.closed_loop_allowed.provenance() {
                    println!("    - {narrowing}");
                }
                let iob = limits.max_iob.value();
                if iob.is_finite() {
                    println!("  max IOB: {iob} U");
                } else {
                    println!("  max IOB: unlimited");
                }
                for narrowing in limits.max_iob.provenance() {
                    println!("    - {narrowing}");
                }
            }
        }

        Commands::Stale { action } => {
            if matches!(action, StaleAction::Set { .. } | StaleAction::Clear) {
                require_data_dir(data_dir.as_deref())?;
            }
            let store = open_store(data_dir.as_deref())?;
            let now = SystemClock.now();

            match action {
                StaleAction::Show => {
                    let policy = config.freshness.to_policy().into_diagnostic()?;
                    match store.get(StateKey::StaleSince).into_diagnostic()? {
                        Some(since) => {
                            let days = now.since(since).as_secs() / 86_400;
                            let stage = policy.schedule.stage(Some(since), now);
                            println!("Stale for {days} days (stage: {stage})");
                        }
                        None => println!("No staleness signal; installation is current."),
                    }
                    for key in [StateKey::LastVersionCheck, StateKey::LastStaleWarning] {
                        match store.get(key).into_diagnostic()? {
                            Some(at) => {
                                let hours = now.since(at).as_secs() / 3_600;
                                println!("  {key}: {hours} hours ago");
                            }
                            None => println!("  {key}: never"),
                        }
                    }
                }

                StaleAction::Set { days_ago } => {
                    let since = Timestamp::from_millis(
                        now.as_millis()
                            .saturating_sub(days_ago.saturating_mul(86_400_000)),
                    );
                    store.put(StateKey::StaleSince, since).into_diagnostic()?;
                    println!("Marked stale as of {days_ago} days ago.");
                }

                StaleAction::Clear => {
                    if store.remove(StateKey::StaleSince).into_diagnostic()? {
                        println!("Staleness signal cleared.");
                    } else {
                        println!("No staleness signal to clear.");
                    }
                }
            }
        }
    }

    Ok(())
}

/// Open the durable store, or fall back to memory when no directory is
/// configured.
fn open_store(data_dir: Option<&Path>) -> Result<Arc<dyn StateStore>> {
    match data_dir {
        Some(dir) => Ok(Arc::new(DurableStateStore::open(dir).into_diagnostic()?)),
        None => {
            tracing::warn!("no data directory configured, state will not persist");
            Ok(Arc::new(MemoryStateStore::new()))
        }
    }
}

fn require_data_dir(data_dir: Option<&Path>) -> Result<()> {
    if data_dir.is_none() {
        miette::bail!(
            "this command writes durable state; set data_dir in the config or pass --data-dir"
        );
    }
    Ok(())
}

/// Wire the production contributors into a checker.
fn build_checker(
    config: &DoseguardConfig,
    store: Arc<dyn StateStore>,
) -> Result<ConstraintsChecker> {
    let policy = config.freshness.to_policy().into_diagnostic()?;
    let settings = config.therapy.to_settings().into_diagnostic()?;

    let guard = VersionGuard::new(
        policy,
        Arc::new(SystemClock),
        store,
        Arc::new(TracingSink),
        Arc::new(NullChannel),
    )
    .into_diagnostic()?;

    let mut checker = ConstraintsChecker::new();
    checker.register(Box::new(guard));
    checker.register(Box::new(TherapyLimits::new(settings)));
    Ok(checker)
}
