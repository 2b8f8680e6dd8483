mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "icstask")]
#[command(about = "Convert between Taskwarrior tasks and iCalendar VTODOs")]
struct Cli {
    /// Log more (repeat for debug and trace output)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write every task as a VTODO
    Task2ics {
        /// Taskwarrior data directory (defaults to the configured one)
        data_dir: Option<PathBuf>,

        /// Output iCalendar file (defaults to stdout)
        outfile: Option<PathBuf>,
    },
    /// Import every VTODO of an iCalendar file as a new task
    Ics2task {
        /// Input iCalendar file (defaults to stdin)
        infile: Option<PathBuf>,

        /// Taskwarrior data directory (defaults to the configured one)
        data_dir: Option<PathBuf>,

        /// Project for the imported tasks
        #[arg(short, long)]
        project: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Task2ics { data_dir, outfile } => commands::task2ics::run(data_dir, outfile).await,
        Commands::Ics2task {
            infile,
            data_dir,
            project,
        } => commands::ics2task::run(infile, data_dir, project).await,
    }
}
