mod collections;
mod sync;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pim-cli")]
#[command(about = "Push enriched product catalogs to a Shopify store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create or update every enriched product of one source
    Sync {
        /// Source name, e.g. `MultiCraft`
        source: String,
        /// Print the planned action per product without calling the store
        #[arg(long)]
        dry_run: bool,
        /// Products processed concurrently (overrides config)
        #[arg(long)]
        concurrency: Option<usize>,
        /// Add new products to the collection matching their category
        #[arg(long)]
        associate_categories: bool,
    },
    /// Manage custom collections
    Collections {
        #[command(subcommand)]
        command: CollectionsCommands,
    },
}

#[derive(Debug, Subcommand)]
enum CollectionsCommands {
    /// Rebuild the category -> collection mapping for a source from the store
    Map { source: String },
    /// Create a custom collection advertising the given category paths
    Create {
        #[arg(long)]
        title: String,
        /// Category key this collection covers, e.g. `MultiCraft-Paint`
        #[arg(long = "path")]
        paths: Vec<String>,
        /// Also record the paths in this source's collection mapping
        #[arg(long)]
        source: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = pim_core::load_app_config()?;
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(&config.log_level)?)
        .init();

    match cli.command {
        Commands::Sync {
            source,
            dry_run,
            concurrency,
            associate_categories,
        } => {
            let flags = sync::SyncFlags {
                dry_run,
                concurrency,
                associate_categories,
            };
            let summary = sync::run_sync(&config, &source, &flags).await?;
            sync::print_summary(&summary);
            if !summary.is_success() {
                std::process::exit(1);
            }
        }
        Commands::Collections {
            command: CollectionsCommands::Map { source },
        } => collections::run_map(&config, &source).await?,
        Commands::Collections {
            command:
                CollectionsCommands::Create {
                    title,
                    paths,
                    source,
                },
        } => collections::run_create(&config, &title, &paths, source.as_deref()).await?,
    }

    Ok(())
}

/// Filter from `PIM_LOG_LEVEL` alone; `RUST_LOG` is not consulted.
fn log_filter(level: &str) -> Result<EnvFilter, tracing_subscriber::filter::ParseError> {
    EnvFilter::try_new(level)
}
