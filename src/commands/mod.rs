pub mod init;
pub mod sync;
pub mod update;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Configuration initialization")]
    Init(init::InitArgs),
    #[command(about = "Check whether a newer version is published")]
    Check,
    #[command(about = "Update the application to the latest version")]
    Update(update::UpdateArgs),
    #[command(about = "Pull or push the shared station data", arg_required_else_help = true)]
    Sync(sync::SyncArgs),
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help(true))]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    pub async fn menu() -> Result<()> {
        let cli = Self::parse();
        match cli.command {
            Commands::Init(args) => init::cmd(args),
            Commands::Check => update::check().await,
            Commands::Update(args) => update::cmd(args).await,
            Commands::Sync(args) => sync::cmd(args).await,
        }
    }
}
