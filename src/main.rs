//! ClipMix video variant generator
//!
//! Turns a project's pool of short clips into many distinct output videos.
//! Each variant reorders, picks and retimes the clips, then re-encodes them
//! through an external encoder process.
//!
//! # Usage
//!
//! ```bash
//! clipmix generate --job job.json
//! clipmix plan --job job.json --seed 7
//! clipmix estimate --project p1 --settings settings.json --videos 10
//! clipmix combinations --clips 4
//! ```

use anyhow::Result;
use clap::Parser;
use tracing::info;

use clipmix::app::container::DefaultAppContainer;
use clipmix::cli::{commands, Cli, Commands};
use clipmix::utils::logging::LoggingSystem;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(&cli)?;

    let logging = LoggingSystem::new(config.logging.clone());
    logging.initialize()?;
    logging.log_system_info();

    match cli.command {
        Commands::Combinations(args) => commands::combinations(args)?,
        Commands::Generate(args) => {
            let container = DefaultAppContainer::new(&config)?;
            commands::generate(&container, &config, args).await?;
        }
        Commands::Plan(args) => {
            let container = DefaultAppContainer::new(&config)?;
            commands::plan(&container, args).await?;
        }
        Commands::Estimate(args) => {
            let container = DefaultAppContainer::new(&config)?;
            commands::estimate(&container, args).await?;
        }
    }

    info!("ClipMix completed successfully");
    Ok(())
}
