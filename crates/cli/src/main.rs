//! watch-attach command line.
//!
//! `run` starts the configured watch tasks and bridges the attachment engine
//! to an IDE over stdio. `ps` and `match` are diagnostics for the process
//! scan and the workspace matcher.

mod bridge;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use colored::Colorize;
use tracing_subscriber::EnvFilter;
use wa_core::matcher::{extract_program_path, WorkspaceMatcher};
use wa_core::snapshot::{ProcessSnapshotProvider, SysinfoSnapshotProvider};

#[derive(Parser, Debug)]
#[command(
    name = "watch-attach",
    version,
    about = "Attach a debugger to the processes `dotnet watch` restarts"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Launch watch tasks and exchange debug requests as JSON lines on stdio
    Run(bridge::RunArgs),

    /// List running processes
    Ps {
        /// Only show descendants of this pid
        #[arg(long)]
        parent: Option<u32>,
    },

    /// Print the workspace root a command line belongs to
    Match {
        /// Full command line of the process
        command_line: String,

        /// Workspace root to match against; may be repeated
        #[arg(long = "root", required = true)]
        roots: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => bridge::run(args).await,
        Command::Ps { parent } => {
            list_processes(parent);
            Ok(())
        }
        Command::Match {
            command_line,
            roots,
        } => match_command_line(&command_line, &roots),
    }
}

/// Logs go to stderr; stdout belongs to the protocol.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn list_processes(parent: Option<u32>) {
    let provider = SysinfoSnapshotProvider::new();
    let matcher = WorkspaceMatcher::default();

    for process in provider.list_processes(parent) {
        let parent = process
            .parent_pid
            .map(|pid| pid.to_string())
            .unwrap_or_else(|| "-".to_string());
        let command_line = if matcher.is_false_positive(&process.command_line) {
            process.command_line.dimmed()
        } else {
            process.command_line.normal()
        };
        println!(
            "{:>8} {:>8}  {}",
            process.pid.to_string().cyan(),
            parent,
            command_line
        );
    }
}

fn match_command_line(command_line: &str, roots: &[String]) -> Result<()> {
    let matcher = WorkspaceMatcher::default();
    if matcher.is_false_positive(command_line) {
        return Err(eyre!("Command line is a build tool invocation"));
    }

    match matcher.match_workspace(command_line, roots) {
        Some(root) => {
            println!("{root}");
            Ok(())
        }
        None => {
            let program = extract_program_path(command_line).unwrap_or_default();
            eprintln!("{} {}", "No workspace root contains".yellow(), program);
            Err(eyre!("No match"))
        }
    }
}
