mod command;
mod config;
mod trace;

use anyhow::Result;
use clap::Parser;
use log::info;

use command::Command;
use config::CliConfig;

#[derive(Debug, Parser)]
#[command(version, author, about = "Gaming transaction engine CLI")]
struct Args {
    #[clap(short = 'l', long, default_value = "info")]
    log_level: String,

    #[clap(short = 'c', long = "config", default_value = "config/gtxncli.toml")]
    config: String,

    #[clap(subcommand)]
    cmd: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_dir = format!(
        "{}/.gtxn",
        std::env::var("HOME").unwrap_or_else(|_| ".".to_string())
    );
    let _guards = trace::init_logging(&log_dir, &args.log_level)?;
    info!("gtxn starting, args: {:?}", &args);

    let cli_config = CliConfig::load(&args.config);
    let engine_config = cli_config.to_engine_config();

    command::run(args.cmd, engine_config).await
}
