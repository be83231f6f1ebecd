//! wardendesk - a command-line dashboard for hostel wardens.
//!
//! Lists and filters the hostel's complaints, shows per-status counts, and
//! accepts, rejects or resolves complaints (notifying the student).

mod commands;
mod render;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wardendesk_core::models::{ComplaintFilter, ComplaintId, ComplaintStatus, WardenProfileUpdate};

/// Directory for daily log files when `--log-file` is not given
const ENV_LOG_DIR: &str = "WARDENDESK_LOG_DIR";

#[derive(Parser)]
#[command(name = "wardendesk", version)]
#[command(about = "Hostel complaint dashboard for wardens", long_about = None)]
struct Cli {
    /// Also write logs to a daily-rolling file in this directory
    #[arg(long, global = true, value_name = "DIR")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and store the bearer token in the OS keychain
    Login {
        #[arg(long)]
        warden_id: String,
        /// Bearer token for the admin API. Prompted for if omitted.
        #[arg(long)]
        token: Option<String>,
        /// Hostel to manage, if not the one on the warden profile
        #[arg(long)]
        hostel: Option<String>,
    },
    /// Forget the session and token
    Logout,
    /// Show the warden profile, updating any fields given
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        gender: Option<String>,
    },
    /// Show complaint counts by status
    Stats {
        /// Ignore cached data
        #[arg(long)]
        refresh: bool,
    },
    /// List complaints
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// pending, in_progress, resolved or rejected
        #[arg(long)]
        status: Option<ComplaintStatus>,
        #[arg(long)]
        category: Option<String>,
        /// Matches id, student, room, title and description
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        refresh: bool,
    },
    /// Show one complaint
    Show {
        id: ComplaintId,
        /// Page the complaint is listed on
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Start work on a pending complaint
    Accept {
        id: ComplaintId,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Reject a pending complaint
    Reject {
        id: ComplaintId,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Mark a complaint resolved
    Resolve {
        id: ComplaintId,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
}

/// Initialize the tracing subscriber for logging.
///
/// Stderr always; a daily file too when a log directory is configured. The
/// returned guard flushes the file writer and must live until exit.
fn init_tracing(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    // Use RUST_LOG to control the level (e.g. RUST_LOG=wardendesk_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let log_dir = log_dir.or_else(|| std::env::var_os(ENV_LOG_DIR).map(PathBuf::from));
    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "wardendesk.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_file);
    info!("wardendesk starting");

    match cli.command {
        Command::Login {
            warden_id,
            token,
            hostel,
        } => commands::login(warden_id, token, hostel).await,
        Command::Logout => commands::logout(),
        Command::Profile {
            name,
            email,
            phone,
            gender,
        } => {
            let update = WardenProfileUpdate {
                name,
                email,
                phone,
                gender,
            };
            commands::profile(update).await
        }
        Command::Stats { refresh } => commands::stats(refresh).await,
        Command::List {
            page,
            status,
            category,
            search,
            refresh,
        } => {
            let filter = ComplaintFilter {
                search,
                status,
                category,
            };
            commands::list(page, filter, refresh).await
        }
        Command::Show { id, page } => commands::show(id, page).await,
        Command::Accept { id, page } => {
            commands::review(id, page, ComplaintStatus::InProgress).await
        }
        Command::Reject { id, page } => commands::review(id, page, ComplaintStatus::Rejected).await,
        Command::Resolve { id, page } => commands::review(id, page, ComplaintStatus::Resolved).await,
    }
}
