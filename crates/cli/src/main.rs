use anyhow::Context;
use clap::{Parser, Subcommand};

use bookshelf_kernel::settings::Settings;

/// Bookshelf service administration.
#[derive(Debug, Parser)]
#[command(name = "bookshelf", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API until interrupted.
    Serve,
    /// Apply pending database migrations and exit.
    Migrate,
    /// Print the merged OpenAPI document to stdout.
    Openapi {
        /// Emit single-line JSON instead of pretty-printed output.
        #[arg(long)]
        compact: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().context("failed to load bookshelf settings")?;

    match cli.command {
        Command::Serve => {
            bookshelf_telemetry::init(&settings.telemetry)?;
            bookshelf_app::bootstrap::serve(&settings).await
        }
        Command::Migrate => {
            bookshelf_telemetry::init(&settings.telemetry)?;
            let applied = bookshelf_app::bootstrap::migrate(&settings).await?;
            tracing::info!(applied, "migrations complete");
            Ok(())
        }
        Command::Openapi { compact } => {
            let document = bookshelf_app::bootstrap::openapi_document(&settings)?;
            let rendered = if compact {
                serde_json::to_string(&document)?
            } else {
                serde_json::to_string_pretty(&document)?
            };
            println!("{rendered}");
            Ok(())
        }
    }
}
