mod commands;
mod serve;
mod watch;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use stagehand_core::{BuildMode, StagehandConfig};

#[derive(Parser)]
#[command(name = "stagehand", about = "Build and deploy static sites to S3 and CloudFront")]
#[command(version)]
struct Cli {
    /// Defaults to `dev`
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, serve, and rebuild on source changes
    Dev {
        /// Port to serve on (default: [serve].port)
        #[arg(long, short = 'p')]
        port: Option<u16>,
    },
    /// Unminified build into the output directory
    BuildDev,
    /// Minified, fingerprinted build into the output directory
    BuildProd,
    /// Production build, then upload new and changed files
    Publish,
    /// Production build, then upload every file
    ForcePublish,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let project_dir = PathBuf::from(".");
    let config = StagehandConfig::load(&project_dir)?;
    // Deployment identifiers are required before any task runs.
    let target = config.deploy.target()?;

    match cli.command.unwrap_or(Commands::Dev { port: None }) {
        Commands::Dev { port } => commands::dev(&project_dir, &config, port).await?,
        Commands::BuildDev => commands::build(&project_dir, &config, BuildMode::Development).await?,
        Commands::BuildProd => commands::build(&project_dir, &config, BuildMode::Production).await?,
        Commands::Publish => commands::publish(&project_dir, &config, target, false).await?,
        Commands::ForcePublish => commands::publish(&project_dir, &config, target, true).await?,
    }

    Ok(())
}
