use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::debug;
use tracing::metadata::LevelFilter;

use segstore::{
    HybridPolicySelector, StoreConfig, SwitchState, SwitchStateRegistry, POLICY_INFO_FILE_NAME,
};

/// Inspect and manage a store's compaction policy switch state.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the persisted switch state.
    Show {
        /// Data directory of the store. Defaults to the current directory.
        #[clap(long)]
        dir: Option<PathBuf>,
    },
    /// Print the policy the next compaction cycle would use.
    Next {
        #[clap(long)]
        dir: Option<PathBuf>,
        #[command(flatten)]
        period: PeriodArgs,
    },
    /// Start the store's rotation over from scratch.
    Reset {
        #[clap(long)]
        dir: Option<PathBuf>,
        #[command(flatten)]
        period: PeriodArgs,
    },
}

#[derive(ClapArgs)]
struct PeriodArgs {
    /// Compaction policy switch period, in cycles and in days.
    #[clap(long, conflicts_with = "config")]
    period: Option<u32>,

    /// JSON file with a `storeCompactionPolicySwitchPeriod` key.
    #[clap(long)]
    config: Option<PathBuf>,
}

impl PeriodArgs {
    fn store_config(&self) -> Result<StoreConfig> {
        match (self.period, &self.config) {
            (Some(period), _) => Ok(StoreConfig::new(period)?),
            (None, Some(path)) => StoreConfig::from_file(path)
                .with_context(|| format!("Failed to read config from {}", path.display())),
            (None, None) => Ok(StoreConfig::default()),
        }
    }
}

fn data_dir(dir: Option<PathBuf>) -> Result<PathBuf> {
    match dir {
        Some(dir) => Ok(dir),
        None => std::env::current_dir().context("Failed to find current directory"),
    }
}

fn main() -> Result<()> {
    logging::configure(LevelFilter::WARN);

    let args = Args::parse();
    match args.command {
        Command::Show { dir } => {
            let path = data_dir(dir)?.join(POLICY_INFO_FILE_NAME);
            debug!(?path, "Reading switch state");
            let state = SwitchState::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            println!("period: {}", state.counter.period());
            println!("counter: {}", state.counter.position());
            println!("value: {}", state.counter.value());
            println!("lastCompactAllTime: {}", state.last_compact_all_time);
        }
        Command::Next { dir, period } => {
            let config = period.store_config()?;
            let dir = data_dir(dir)?;
            let registry = Arc::new(SwitchStateRegistry::new(
                config.compaction_policy_switch_period,
            ));
            // Peeking never runs a policy, so there's nothing to delegate to.
            let selector = HybridPolicySelector::new(&config, registry, (), ());
            println!("{}", selector.peek(&dir.to_string_lossy(), &dir));
        }
        Command::Reset { dir, period } => {
            let config = period.store_config()?;
            let dir = data_dir(dir)?;
            let state = SwitchState::new(config.compaction_policy_switch_period);
            state
                .write(&dir)
                .with_context(|| format!("Failed to write switch state in {}", dir.display()))?;
            debug!(?dir, ?state, "Reset switch state");
        }
    }
    Ok(())
}
