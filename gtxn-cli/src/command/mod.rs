use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Subcommand;
use log::info;

use gtxn_core::bench::run_benchmark;
use gtxn_core::clock::{Clock, SystemClock};
use gtxn_core::config::{EngineConfig, WriterMode};
use gtxn_core::kv::memory::MemoryStore;
use gtxn_core::kv::KvStore;
use gtxn_core::reader::{ReadRound, Reader};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the concurrent benchmark driver (spec §4.7) against an
    /// in-process store and print the aggregated report.
    Bench {
        #[clap(long, value_enum)]
        writer: Option<WriterModeArg>,

        #[clap(long)]
        clients: Option<u32>,

        #[clap(long)]
        duration_seconds: Option<u64>,

        #[clap(long, default_value_t = false)]
        reject_negative_balance: bool,
    },

    /// Read back one round by id (spec §4.5).
    GetRound {
        round_id: String,

        #[clap(long, value_enum, default_value = "embedded")]
        writer: WriterModeArg,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum WriterModeArg {
    Embedded,
    Indexed,
}

impl From<WriterModeArg> for WriterMode {
    fn from(arg: WriterModeArg) -> Self {
        match arg {
            WriterModeArg::Embedded => WriterMode::Embedded,
            WriterModeArg::Indexed => WriterMode::Indexed,
        }
    }
}

/// Runs a parsed command against `base_config`, overriding fields present
/// on the command line.
pub async fn run(command: Command, base_config: EngineConfig) -> Result<()> {
    // A single in-process store backs every invocation of this binary; the
    // real external store is an abstract collaborator outside this crate's
    // scope (spec §1).
    let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match command {
        Command::Bench {
            writer,
            clients,
            duration_seconds,
            reject_negative_balance,
        } => {
            let mut config = base_config;
            if let Some(writer) = writer {
                config = config.with_mode_defaults(writer.into());
            }
            if let Some(clients) = clients {
                config.concurrent_clients = clients;
            }
            if let Some(duration_seconds) = duration_seconds {
                config.duration_seconds = duration_seconds;
            }
            if reject_negative_balance {
                config.business_reject_on_negative_balance = true;
            }
            config.validate().map_err(anyhow::Error::msg)?;

            info!("running benchmark: {config:?}");
            let report = run_benchmark(store, clock, &config, "gtxn-cli").await;
            println!("{report}");
            if !report.passed() {
                anyhow::bail!("benchmark did not meet its pass criteria");
            }
            Ok(())
        }
        Command::GetRound { round_id, writer } => {
            let reader = Reader::new(store);
            match WriterMode::from(writer) {
                WriterMode::Embedded => {
                    let round = reader
                        .get_embedded(&round_id)
                        .await
                        .context("reading embedded round")?;
                    println!("{}", serde_json::to_string_pretty(&round)?);
                }
                WriterMode::Indexed => {
                    let read = reader
                        .get_indexed(&round_id)
                        .await
                        .context("reading indexed round")?;
                    match read {
                        ReadRound::Indexed { round, details, degraded, missing_txn_ids } => {
                            if degraded {
                                eprintln!("warning: round is degraded, missing details: {missing_txn_ids:?}");
                            }
                            println!("{}", serde_json::to_string_pretty(&round)?);
                            println!("{} detail(s) resolved", details.len());
                        }
                        ReadRound::Embedded(_) => unreachable!("indexed mode reader returns ReadRound::Indexed"),
                    }
                }
            }
            Ok(())
        }
    }
}
