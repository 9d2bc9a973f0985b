use crate::{
    libs::{
        context::AppContext,
        diff::compute_change_set,
        http::human_readable_size,
        installer::{InstallProgress, Installer},
        messages::Message,
        self_replace::{restart_application, RestartMode},
        update::{UpdateCheck, UpdateClient, UpdateInfo, UpdatePayload},
    },
    msg_debug, msg_error, msg_error_anyhow, msg_info, msg_print, msg_success, msg_warning,
};
use anyhow::Result;
use clap::Args;
use dialoguer::{theme::ColorfulTheme, Confirm};

#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Install without asking for confirmation
    #[arg(short, long)]
    yes: bool,
    /// Relaunch the application after a file-by-file update
    #[arg(long)]
    restart: bool,
}

/// Reports whether an update is available without installing it.
pub async fn check() -> Result<()> {
    let ctx = AppContext::load()?;
    if let Some(info) = run_check(&ctx).await {
        describe(&ctx, &info);
    }
    Ok(())
}

pub async fn cmd(args: UpdateArgs) -> Result<()> {
    let ctx = AppContext::load()?;
    let Some(info) = run_check(&ctx).await else {
        return Ok(());
    };
    describe(&ctx, &info);

    if !args.yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(Message::ConfirmInstallUpdate.to_string())
            .default(true)
            .interact()?;
        if !confirmed {
            msg_info!(Message::UpdateCancelled);
            return Ok(());
        }
    }

    let progress = |event: InstallProgress| match event {
        InstallProgress::File { index, total, path } => {
            msg_print!(Message::UpdateFileProgress { index, total, path });
        }
        InstallProgress::Bytes { downloaded, total } => {
            msg_debug!(format!("{} / {:?} bytes", downloaded, total));
        }
    };

    let report = Installer::from_context(&ctx)
        .install(&info, &progress)
        .await
        .map_err(|e| msg_error_anyhow!(Message::UpdateInstallFailed(e.to_string())))?;

    msg_success!(Message::UpdateCompleted {
        app_name: AppContext::app_name().to_string(),
        version: report.version.to_string(),
        files: report.files_updated.len(),
    });

    match report.restart {
        RestartMode::SingleBinary { .. } => {
            msg_info!(Message::UpdateRestarting);
            restart_application(&report.restart)?;
        }
        RestartMode::MultiFile if args.restart && !report.files_updated.is_empty() => {
            msg_info!(Message::UpdateRestarting);
            restart_application(&report.restart)?;
        }
        RestartMode::MultiFile => msg_info!(Message::UpdateRestartRequired),
    }

    Ok(())
}

async fn run_check(ctx: &AppContext) -> Option<UpdateInfo> {
    msg_print!(Message::CheckingForUpdates(ctx.current_version.clone()));
    let result = UpdateClient::from_context(ctx).check_for_updates(&ctx.current_version).await;

    match UpdateCheck::from_result(result) {
        UpdateCheck::Available(info) => return Some(info),
        UpdateCheck::UpToDate => msg_success!(Message::NoUpdateRequired(ctx.current_version.clone())),
        UpdateCheck::Offline(e) => msg_error!(Message::UpdateCheckOffline(e)),
        UpdateCheck::BadServerData(e) => msg_error!(Message::UpdateCheckBadData(e)),
        UpdateCheck::Insecure(url) => msg_error!(Message::UpdateCheckInsecure(url)),
        UpdateCheck::Busy(op) => msg_warning!(Message::OperationBusy(op)),
    }
    None
}

fn describe(ctx: &AppContext, info: &UpdateInfo) {
    msg_info!(
        Message::UpdateAvailable {
            app_name: AppContext::app_name().to_string(),
            current: ctx.current_version.clone(),
            latest: info.version.to_string(),
        },
        true
    );

    match &info.payload {
        UpdatePayload::Incremental { manifest } => match compute_change_set(manifest, &ctx.install_dir) {
            Ok(changes) => msg_print!(Message::UpdateKindIncremental {
                files: changes.len(),
                size: human_readable_size(changes.total_size()),
            }),
            Err(e) => msg_debug!(format!("Cannot preview changes: {}", e)),
        },
        UpdatePayload::SingleFile { size_mb, .. } => msg_print!(Message::UpdateKindSingleFile(*size_mb)),
    }

    if !info.release_notes.is_empty() {
        msg_print!(Message::UpdateReleaseNotes(info.release_notes.clone()), true);
    }
}
