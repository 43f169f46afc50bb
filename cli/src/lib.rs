use clap::{Parser, Subcommand};
use std::path::PathBuf;

use utils::app_config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(name = "cryosync", version)]
#[command(about = "Mirror a growing project directory into a copy destination", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Set the logging level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Configuration file path, merged over the built-in defaults
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Poll a source directory and copy new files until it goes quiet
    Sync {
        /// Source project directory
        #[arg(short, long, env = "SOURCE_DIR")]
        source: Option<String>,

        /// Destination root; files land in <dest>/<source name>
        #[arg(short, long, env = "DEST_DIR")]
        dest: Option<String>,

        /// Seconds between scans
        #[arg(short, long, env = "TIMEOUT")]
        interval: Option<u64>,

        /// Empty scans before stopping, also the copy attempts per file
        #[arg(long)]
        max_retries: Option<u32>,

        /// Files per transfer batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Batches copied in parallel (0 = one per CPU)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Ask a scan server at this host for incremental scans
        #[arg(long)]
        remote_host: Option<String>,

        /// Scan server port
        #[arg(long)]
        remote_port: Option<u16>,

        /// Skip the initial full copy and go straight to polling
        #[arg(long)]
        resume: bool,

        /// Do not draw a progress bar during transfers
        #[arg(long, env = "NO_PROGRESS")]
        no_progress: bool,

        /// Do not write sync_log.txt / error_log.txt
        #[arg(long, env = "NO_LOG")]
        no_log: bool,
    },

    /// Serve scan requests from sync clients over TCP
    Serve {
        /// Listen address
        #[arg(long)]
        host: Option<String>,

        /// Listen port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Watch a directory of projects and copy each one once enough files appear
    Monitor {
        /// Directory holding the projects
        #[arg(short, long)]
        base_dir: Option<String>,

        /// Destination root
        #[arg(short, long)]
        dest: Option<String>,

        /// Minimum top-level files before a project is copied
        #[arg(short, long)]
        threshold: Option<usize>,

        /// Seconds between checks
        #[arg(short, long)]
        interval: Option<u64>,

        /// Do not draw a progress bar during transfers
        #[arg(long, env = "NO_PROGRESS")]
        no_progress: bool,
    },
}

fn set_opt<T: ToString>(key: &str, value: &Option<T>) -> utils::error::Result<()> {
    if let Some(value) = value {
        AppConfig::set(key, &value.to_string())?;
    }
    Ok(())
}

/// 将命令行参数写入配置覆盖层
fn apply_overrides(cli: &Cli) -> utils::error::Result<()> {
    AppConfig::merge_config(cli.config.as_deref())?;
    set_opt("log.level", &cli.log_level)?;

    match &cli.command {
        Commands::Sync {
            source,
            dest,
            interval,
            max_retries,
            batch_size,
            concurrency,
            remote_host,
            remote_port,
            resume,
            no_progress,
            no_log,
        } => {
            set_opt("sync.source", source)?;
            set_opt("sync.destination", dest)?;
            set_opt("sync.poll_interval", interval)?;
            set_opt("sync.max_retries", max_retries)?;
            set_opt("sync.batch_size", batch_size)?;
            set_opt("sync.concurrency", concurrency)?;
            if remote_host.is_some() {
                AppConfig::set("remote.enabled", "true")?;
            }
            set_opt("remote.host", remote_host)?;
            set_opt("remote.port", remote_port)?;
            if *resume {
                AppConfig::set("sync.resume", "true")?;
            }
            if *no_progress {
                AppConfig::set("sync.progress", "false")?;
            }
            if *no_log {
                AppConfig::set("sync.ledger", "false")?;
            }
        }
        Commands::Serve { host, port } => {
            set_opt("server.host", host)?;
            set_opt("server.port", port)?;
        }
        Commands::Monitor {
            base_dir,
            dest,
            threshold,
            interval,
            no_progress,
        } => {
            set_opt("monitor.base_dir", base_dir)?;
            set_opt("monitor.destination", dest)?;
            set_opt("monitor.threshold", threshold)?;
            set_opt("monitor.interval", interval)?;
            if *no_progress {
                AppConfig::set("sync.progress", "false")?;
            }
        }
    }
    Ok(())
}

pub async fn cli_match() -> utils::error::Result<()> {
    let cli = Cli::parse();
    apply_overrides(&cli)?;

    // Logging reads the level from config, so it is set up after the overrides
    let _guard = utils::logger::setup_logging()?;

    match &cli.command {
        Commands::Sync { .. } => commands::sync_cmd().await?,
        Commands::Serve { .. } => commands::serve_cmd().await?,
        Commands::Monitor { .. } => commands::monitor_cmd().await?,
    }

    Ok(())
}
