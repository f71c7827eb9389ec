use clap::{Parser, Subcommand};
use lessonpay::application::{Collaborators, Platform};
use lessonpay::config::AppConfig;
use lessonpay::domain::ports::Stores;
use lessonpay::interfaces::csv::wallet_writer::WalletWriter;
use lessonpay::interfaces::http;
use lessonpay::interfaces::replay::ReplayRunner;
use lessonpay::telemetry;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing::warn;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replays a CSV of platform events and prints the wallet statement
    Replay {
        /// Input events CSV file
        input: PathBuf,
    },
    /// Serves the HTTP API
    Serve {
        /// Address to bind, overrides HTTP_BIND
        #[arg(long)]
        bind: Option<String>,
    },
}

fn open_stores(db_path: Option<PathBuf>) -> Result<Stores> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = lessonpay::infrastructure::rocksdb::RocksDBStore::open(path).into_diagnostic()?;
            Ok(store.into_stores())
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(path) => {
            warn!(
                db_path = %path.display(),
                "Persistent storage requested via --db-path, but the storage-rocksdb feature is not enabled. Falling back to in-memory storage"
            );
            Ok(Stores::in_memory())
        }
        None => Ok(Stores::in_memory()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();
    let cli = Cli::parse();
    let config = AppConfig::from_env().into_diagnostic()?;
    let stores = open_stores(cli.db_path)?;

    match cli.command {
        Command::Replay { input } => {
            let runner = ReplayRunner::new(stores, &config).into_diagnostic()?;
            let file = File::open(input).into_diagnostic()?;
            runner.run(file).await.into_diagnostic()?;

            let statements = runner.statements().await.into_diagnostic()?;
            let stdout = io::stdout();
            let mut writer = WalletWriter::new(stdout.lock());
            writer.write_statements(statements).into_diagnostic()?;
        }
        Command::Serve { bind } => {
            let platform = Platform::new(stores, Collaborators::simulated(&config), &config.settlement)
                .into_diagnostic()?;
            let resumed = platform.settlement.resume_unresolved().await.into_diagnostic()?;
            if !resumed.is_empty() {
                warn!(count = resumed.len(), "Resumed payment attempts left open by a previous run");
            }
            let bind = bind.unwrap_or_else(|| config.http_bind.clone());
            http::serve(platform, &bind).await.into_diagnostic()?;
        }
    }

    Ok(())
}
