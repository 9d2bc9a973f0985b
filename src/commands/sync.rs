//! `lru-tracker sync`: exchange the shared station data with GitHub.

use crate::{
    api::{github::GitHubStore, short_revision, RemoteStore},
    libs::{
        config::SyncRecord,
        context::AppContext,
        local_data::LocalDataFile,
        messages::Message,
        secret::{resolve_github_token, Secret},
        sync::{PullOutcome, PushResult, RemoteCheck, SyncOrchestrator, SyncPrompt, UnsavedChoice},
        view::View,
    },
    msg_bail_anyhow, msg_error, msg_error_anyhow, msg_info, msg_success, msg_warning,
};
use anyhow::Result;
use clap::{Args, Subcommand};
use dialoguer::{theme::ColorfulTheme, Confirm, Select};
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct SyncArgs {
    #[command(subcommand)]
    command: SyncCommand,
}

#[derive(Debug, Subcommand)]
enum SyncCommand {
    #[command(about = "Replace the local data with the shared copy")]
    Pull {
        /// Local data file (defaults to the configured one)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    #[command(about = "Publish the local data")]
    Push {
        /// Local data file (defaults to the configured one)
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Commit message
        #[arg(short, long)]
        message: Option<String>,
    },
    #[command(about = "Check whether the shared copy changed since the last sync")]
    Check,
    #[command(about = "Show the sync configuration and last sync")]
    Status,
    #[command(about = "Test the connection to GitHub")]
    Test,
    #[command(about = "Store the GitHub access token")]
    Login {
        /// Remove the stored token
        #[arg(short, long)]
        delete: bool,
    },
}

/// Asks the user on the terminal.
struct TerminalPrompt;

impl SyncPrompt for TerminalPrompt {
    fn resolve_unsaved(&self) -> UnsavedChoice {
        let items = [
            Message::UnsavedSaveThenPull.to_string(),
            Message::UnsavedDiscardAndPull.to_string(),
            Message::UnsavedCancel.to_string(),
        ];
        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(Message::PromptUnsavedChanges.to_string())
            .items(&items)
            .default(0)
            .interact();

        match selection {
            Ok(0) => UnsavedChoice::SaveThenPull,
            Ok(1) => UnsavedChoice::DiscardAndPull,
            _ => UnsavedChoice::Abort,
        }
    }

    fn confirm_overwrite(&self) -> bool {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(Message::ConfirmOverwriteRemote.to_string())
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}

pub async fn cmd(sync_args: SyncArgs) -> Result<()> {
    let ctx = AppContext::load()?;

    match sync_args.command {
        SyncCommand::Login { delete } => login(&ctx, delete),
        SyncCommand::Status => status(&ctx),
        SyncCommand::Test => test(&ctx).await,
        SyncCommand::Check => check(&ctx).await,
        SyncCommand::Pull { file } => pull(&ctx, file).await,
        SyncCommand::Push { file, message } => push(&ctx, file, message).await,
    }
}

fn store(ctx: &AppContext, record: &SyncRecord) -> Result<GitHubStore> {
    let config = ctx.sync_config();
    if !config.is_configured() {
        msg_bail_anyhow!(Message::SyncNotConfigured);
    }

    let token = resolve_github_token(&ctx.storage);
    Ok(GitHubStore::new(&config, token, ctx.policy)?.with_revision(record.last_revision.clone()))
}

fn local_path(ctx: &AppContext, file: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(file) = file {
        return Ok(file);
    }
    let configured = ctx.sync_config().local_data_file;
    if Path::new(&configured).is_absolute() {
        Ok(PathBuf::from(configured))
    } else {
        ctx.storage.get_path(&configured)
    }
}

fn login(ctx: &AppContext, delete: bool) -> Result<()> {
    let secret = Secret::github_token(&ctx.storage);
    if delete {
        secret.delete()?;
        msg_info!(Message::SyncTokenDeleted);
    } else {
        secret.prompt()?;
        msg_success!(Message::SyncTokenSaved);
    }
    Ok(())
}

fn status(ctx: &AppContext) -> Result<()> {
    let record = SyncRecord::read_from(&ctx.storage)?;
    let store = store(ctx, &record)?;
    View::sync_status(&store.status(record.last_sync)).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    Ok(())
}

async fn test(ctx: &AppContext) -> Result<()> {
    let record = SyncRecord::read_from(&ctx.storage)?;
    let store = store(ctx, &record)?;
    match store.test_connection().await {
        (true, message) => msg_success!(Message::SyncConnectionOk(message)),
        (false, message) => msg_error!(Message::SyncConnectionFailed(message)),
    }
    Ok(())
}

async fn check(ctx: &AppContext) -> Result<()> {
    let record = SyncRecord::read_from(&ctx.storage)?;
    let mut orchestrator = SyncOrchestrator::new(store(ctx, &record)?, ctx.guard.clone());

    match orchestrator.check().await {
        Ok(RemoteCheck::Missing) => msg_warning!(Message::SyncRemoteMissing),
        Ok(RemoteCheck::Changed { .. }) => msg_info!(Message::SyncRemoteChanged),
        Ok(RemoteCheck::UpToDate) => msg_success!(Message::SyncUpToDate),
        Err(e) => return Err(msg_error_anyhow!(Message::SyncFailed(e.to_string()))),
    }
    Ok(())
}

async fn pull(ctx: &AppContext, file: Option<PathBuf>) -> Result<()> {
    let mut record = SyncRecord::read_from(&ctx.storage)?;
    let mut orchestrator = SyncOrchestrator::new(store(ctx, &record)?, ctx.guard.clone());
    let mut local = LocalDataFile::load(local_path(ctx, file)?)?;

    let outcome = orchestrator
        .pull(&mut local, &TerminalPrompt)
        .await
        .map_err(|e| msg_error_anyhow!(Message::SyncFailed(e.to_string())))?;

    match outcome {
        PullOutcome::Pulled { revision } => {
            msg_success!(Message::SyncPulled {
                revision: short_revision(&revision),
                stations: local.count("stations"),
                history: local.count("history"),
            });
            record.record(Some(revision));
            record.save_to(&ctx.storage)?;
        }
        PullOutcome::NoRemoteData => msg_warning!(Message::SyncNoRemoteData),
        PullOutcome::Aborted => msg_info!(Message::SyncPullAborted),
    }
    Ok(())
}

async fn push(ctx: &AppContext, file: Option<PathBuf>, message: Option<String>) -> Result<()> {
    let mut record = SyncRecord::read_from(&ctx.storage)?;
    let mut orchestrator = SyncOrchestrator::new(store(ctx, &record)?, ctx.guard.clone());
    let local = LocalDataFile::load(local_path(ctx, file)?)?;

    let result = orchestrator
        .push(&local, &TerminalPrompt, message.as_deref())
        .await
        .map_err(|e| msg_error_anyhow!(Message::SyncFailed(e.to_string())))?;

    match result {
        PushResult::Pushed { revision } => {
            msg_success!(Message::SyncPushed(short_revision(&revision)));
            record.record(Some(revision));
            record.save_to(&ctx.storage)?;
        }
        PushResult::Declined => msg_info!(Message::SyncPushDeclined),
        PushResult::Conflict => msg_warning!(Message::SyncPushConflict),
    }
    Ok(())
}
