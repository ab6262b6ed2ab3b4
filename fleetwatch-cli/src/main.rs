//! fleetwatch CLI - Command-line interface
//!
//! Runs the vessel report ingest service and manages its configuration file.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::run::RunArgs;

#[derive(Parser)]
#[command(name = "fleetwatch")]
#[command(version, about = "Receive AIS and MAVLink vessel reports over TCP and UDP", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the TCP and UDP listeners and run until Ctrl+C
    Run {
        /// TCP listen port (overrides [tcp] port)
        #[arg(long)]
        tcp_port: Option<u16>,

        /// UDP listen port (overrides [udp] port)
        #[arg(long)]
        udp_port: Option<u16>,

        /// Directory for session logs (overrides [session_log] directory)
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Do not write session logs
        #[arg(long)]
        no_session_log: bool,

        /// Enable debug logging
        #[arg(long)]
        debug: bool,

        /// Only log to the log file; do not print events
        #[arg(long, short)]
        quiet: bool,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            tcp_port,
            udp_port,
            log_dir,
            no_session_log,
            debug,
            quiet,
        } => commands::run::run(RunArgs {
            tcp_port,
            udp_port,
            log_dir,
            no_session_log,
            debug,
            quiet,
        }),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}
