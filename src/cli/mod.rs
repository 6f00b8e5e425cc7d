pub mod process;
pub mod report;
pub mod watch;

use std::{env, path::PathBuf, time::Duration};

use anyhow::Result;
use clap::{Parser, Subcommand};
use process::{kill_previous_servers, restart_server};
use tracing::level_filters::LevelFilter;

use crate::{
    daemon::start_daemon,
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Worktally", version, long_about = None)]
#[command(about = "Counts time actively worked at this machine", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable console logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Start a daemon that records work time in the background")]
    Init {
        #[arg(
            long,
            help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
        )]
        dir: Option<PathBuf>,
    },
    #[command(about = "Print time worked today, this week, this month and this year")]
    Stats {
        #[arg(
            long = "no-cache",
            help = "Recompute every total from the full period log"
        )]
        no_cache: bool,
    },
    #[command(about = "Print time worked in an arbitrary date range")]
    Total {
        #[arg(
            help = "A date or range. Examples are \"2021\", \"03.2021\", \"01.03.2021-15.03.2021\", \"2021.03.01-now\""
        )]
        range: String,
    },
    #[command(about = "Keep the four standard totals on screen, refreshed in place")]
    Watch {
        #[arg(short, long, default_value_t = 5, help = "Seconds between refreshes")]
        interval: u64,
    },
    #[command(
        about = "Run a daemon directly in current console. Used for creating a daemon internally and for debugging"
    )]
    Serve {
        #[arg(
            long,
            help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
        )]
        dir: Option<PathBuf>,
    },
    #[command(about = "Stop currently running daemon.")]
    Stop {},
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(
        CLI_PREFIX,
        &create_application_default_path()?,
        logging_level,
        args.log,
    )?;

    match args.commands {
        Commands::Init { .. } => {
            restart_server()?;
            Ok(())
        }
        Commands::Stop {} => {
            let process_name = env::current_exe()?;
            kill_previous_servers(&process_name);
            Ok(())
        }
        Commands::Serve { dir } => {
            start_daemon(dir.map_or_else(create_application_default_path, Ok)?).await?;
            Ok(())
        }
        Commands::Stats { no_cache } => report::process_stats_command(no_cache).await,
        Commands::Total { range } => report::process_total_command(&range).await,
        Commands::Watch { interval } => {
            watch::process_watch_command(Duration::from_secs(interval)).await
        }
    }
}
