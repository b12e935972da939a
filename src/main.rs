use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::eyre;
use log::*;
use proctop::{
    MonitorConfig, TrackingAllocator,
    config::{self, ConfigManager},
    launch,
};
use std::{ffi::OsString, path::PathBuf};
use tracing_subscriber::EnvFilter;

#[global_allocator]
static ALLOC: TrackingAllocator = TrackingAllocator;

#[derive(Parser, Debug)]
#[command(about, version)]
struct Cli {
    #[arg(short, long, value_name = "FILE", default_value = config::DEFAULT_FILE)]
    config: PathBuf,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Monitor this process and print readings (the default)
    Watch(WatchArgs),
    /// Run proctop again as a child on the same terminal, passing ARGS through
    Launch {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<OsString>,
    },
    /// Validate the configuration file
    Validate,
}

#[derive(Args, Debug, Default)]
struct WatchArgs {
    /// Sampler tick in milliseconds
    #[arg(short, long)]
    interval: Option<u64>,
    /// Print period in milliseconds
    #[arg(short, long)]
    report: Option<u64>,
    /// Print JSON snapshots instead of summary lines
    #[arg(long)]
    json: bool,
    /// Stop after this many reports
    #[arg(short = 'n', long)]
    count: Option<u64>,
}

impl WatchArgs {
    fn apply(&self, mut config: MonitorConfig) -> MonitorConfig {
        if let Some(interval) = self.interval {
            config.interval = interval;
        }
        if let Some(report) = self.report {
            config.report = report;
        }
        config
    }
}

fn init_logging() -> color_eyre::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| eyre!(e))
}

async fn watch(config: MonitorConfig, args: &WatchArgs) -> color_eyre::Result<()> {
    let monitor = proctop::top(config.clone());
    let mut report = tokio::time::interval_at(
        tokio::time::Instant::now() + config.report(),
        config.report(),
    );
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut printed = 0;
    loop {
        tokio::select! {
            _ = report.tick() => {
                if args.json {
                    println!("{}", serde_json::to_string(&monitor.snapshot())?);
                } else {
                    println!("{}", monitor);
                }
                printed += 1;
                if args.count.is_some_and(|n| printed >= n) {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                debug!("Interrupted");
                break;
            }
        }
    }
    monitor.destroy();
    Ok(())
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    init_logging()?;
    let cli = Cli::parse();
    let config = ConfigManager::new(cli.config.clone())?.current();
    match &cli.command {
        Some(Commands::Validate) => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Some(Commands::Launch { args }) => {
            let status = launch::relaunch(&cli.config, args).await?;
            std::process::exit(launch::exit_code(status));
        }
        Some(Commands::Watch(args)) => watch(args.apply(config), args).await,
        None => watch(config, &WatchArgs::default()).await,
    }
}
