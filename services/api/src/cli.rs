use std::path::PathBuf;

use admit_match::error::AppError;
use clap::{Args, Parser, Subcommand};

use crate::demo::{run_catalog_stats, run_recommend, CatalogStatsArgs, RecommendArgs};
use crate::server;

#[derive(Parser, Debug)]
#[command(
    name = "admit-match",
    about = "Serve the program matching API or score applicants from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Rank catalog programs for one applicant and print the result
    Recommend(RecommendArgs),
    /// Inspect the program catalog
    Catalog {
        #[command(subcommand)]
        command: CatalogCommand,
    },
}

#[derive(Subcommand, Debug)]
enum CatalogCommand {
    /// Print facet counts for the catalog
    Stats(CatalogStatsArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override CATALOG_CSV
    #[arg(long)]
    pub(crate) catalog_csv: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Recommend(args) => run_recommend(args),
        Command::Catalog {
            command: CatalogCommand::Stats(args),
        } => run_catalog_stats(args),
    }
}
