// Command-line entry point: runs one swap scenario and prints its report.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use xswap_harness::chain::SandboxProvider;
use xswap_harness::cli::CliSandbox;
use xswap_harness::config::HarnessConfig;
use xswap_harness::logging::{init_file_logger, init_stderr_logger};
use xswap_harness::mock::MockSandbox;
use xswap_harness::scenario::{run_cross_chain_swap, run_local_swap, RelayMode};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Scenario {
    /// Swap between two assets of one vault.
    Local,
    /// Cross-chain swap, packet and ack submitted by hand.
    Direct,
    /// Cross-chain swap delivered by a running relayer.
    Relayer,
}

/// Runs a vault swap scenario against local chains.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(value_enum)]
    scenario: Scenario,

    /// Harness config (JSON). Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use the in-memory network instead of `junod`/`rly`.
    #[arg(long)]
    mock: bool,
}

async fn run(args: Args) -> xswap_harness::Result<()> {
    let config = match &args.config {
        Some(path) => HarnessConfig::from_json_file(path)?,
        None => HarnessConfig::default(),
    };
    match &config.log_dir {
        Some(dir) => {
            let path = init_file_logger(dir)?;
            println!("logging to {}", path.display());
        }
        None => init_stderr_logger(),
    }

    let provider: Arc<dyn SandboxProvider> =
        if args.mock { Arc::new(MockSandbox::new()) } else { Arc::new(CliSandbox::new(config.gas_limit)) };

    match args.scenario {
        Scenario::Local => {
            let report = run_local_swap(provider, &config).await?;
            println!("local swap on {} via {}", report.chain_id, report.vault);
            println!("  pool before: {} / {}", report.pool_before.0, report.pool_before.1);
            println!("  sent {} received {}", report.amount_in, report.amount_out);
        }
        Scenario::Direct | Scenario::Relayer => {
            let mode = match args.scenario {
                Scenario::Relayer => RelayMode::relayer(&config.polling),
                _ => RelayMode::DirectInjection,
            };
            let report = run_cross_chain_swap(provider, &config, mode).await?;
            println!("{} -> {} ({:?})", report.source_chain, report.destination_chain, report.final_state);
            println!("  channels: {} / {}", report.channels.source, report.channels.destination);
            println!("  vaults: {} -> {}", report.source_vault, report.destination_vault);
            if let Some(ack) = &report.ack {
                println!("  ack: {}", ack);
            }
            println!("  sent {} received {}", report.amount_sent, report.amount_received());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("scenario failed: {}", e);
            eprintln!("scenario failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
