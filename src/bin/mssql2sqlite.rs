//! CLI front-end: parses arguments, wires up the handler traits, and
//! calls into the library's [`mssql2sqlite::convert`] entry point.

use clap::Parser;
use log::{error, info, warn};
use mssql2sqlite::{
    convert, ConversionCoordinator, ConvertOptions, ProgressHandler, TableSelectionHandler,
    ViewFailureHandler,
};
use mssql2sqlite::schema::{Table, View};
use std::sync::Arc;

/// Migrates a SQL Server database into a new SQLite file.
#[derive(Parser, Debug)]
#[command(name = "mssql2sqlite", about = "Migrates a SQL Server database into a SQLite file")]
struct Cli {
    /// ADO-style connection string, e.g. "server=localhost;database=Northwind;user=sa;password=..."
    #[arg(long)]
    source: String,

    /// Path of the SQLite file to create. Overwritten if it already exists.
    #[arg(long)]
    destination: String,

    /// Encrypts the destination file with this SQLCipher password.
    #[arg(long)]
    password: Option<String>,

    /// Emits BEFORE triggers that emulate foreign key enforcement.
    #[arg(long, default_value_t = false)]
    triggers: bool,

    /// Translates and creates source views in the destination.
    #[arg(long, default_value_t = true)]
    views: bool,

    #[arg(long, default_value = "info")]
    log_level: String,
}

struct StdoutProgressHandler;

impl ProgressHandler for StdoutProgressHandler {
    fn on_progress(&self, done: bool, success: bool, percent: u8, message: &str) {
        if done {
            if success {
                println!("[100%] done: {message}");
            } else {
                eprintln!("[{percent}%] failed: {message}");
            }
        } else {
            println!("[{percent:>3}%] {message}");
        }
    }
}

struct KeepAllTables;

impl TableSelectionHandler for KeepAllTables {
    fn select_tables(&self, _tables: &[Table]) -> Option<Vec<Table>> {
        None
    }
}

/// Logs the failure and discards the view rather than aborting the
/// whole run; a single bad view shouldn't sink an otherwise good
/// migration.
struct WarnAndDiscardView;

impl ViewFailureHandler for WarnAndDiscardView {
    fn on_view_failed(&self, view: &View, error_message: &str) -> Option<String> {
        warn!("discarding view {}: {error_message}", view.name);
        None
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level)).init();

    let options = ConvertOptions {
        source_connection_string: cli.source,
        destination_path: cli.destination,
        destination_password: cli.password,
        create_triggers: cli.triggers,
        create_views: cli.views,
    };

    let coordinator = Arc::new(ConversionCoordinator::new());
    let cancel_handle = coordinator.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("cancellation requested, finishing the current batch");
            cancel_handle.cancel();
        }
    });

    info!("starting conversion");
    let result = convert(
        options,
        coordinator,
        &StdoutProgressHandler,
        Some(&KeepAllTables),
        Some(&WarnAndDiscardView),
    )
    .await;

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("conversion failed: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}
