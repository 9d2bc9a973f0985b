//! Text for every [`Message`] variant.
//!
//! All user-facing wording lives here so it can be reviewed in one place.

use super::types::Message;
use std::fmt::{Display, Formatter, Result};

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let text = match self {
            // === CONFIGURATION MESSAGES ===
            Message::ConfigSaved => "Configuration saved successfully".to_string(),
            Message::ConfigDeleted => "Configuration removed".to_string(),
            Message::ConfigModuleUpdate => "Updates".to_string(),
            Message::ConfigModuleSync => "Shared data (GitHub)".to_string(),
            Message::PromptSelectModules => "Select modules to configure".to_string(),
            Message::PromptVersionUrl => "Version descriptor URL (version.json)".to_string(),
            Message::PromptManifestUrl => "Update manifest URL (update_manifest.json)".to_string(),
            Message::PromptBaseDownloadUrl => "Base URL for file downloads".to_string(),
            Message::PromptPackaging => "How is lru-tracker installed on this computer?".to_string(),
            Message::PackagingSingleBinary => "Single executable".to_string(),
            Message::PackagingMultiFile => "Launcher with separate files".to_string(),
            Message::PromptRepoOwner => "GitHub repository owner".to_string(),
            Message::PromptRepoName => "GitHub repository name".to_string(),
            Message::PromptDataFilePath => "Path of the shared data file in the repository".to_string(),
            Message::PromptBranch => "Branch".to_string(),
            Message::PromptLocalDataFile => "Local data file".to_string(),
            Message::PromptGithubToken => "GitHub personal access token".to_string(),

            // === UPDATE MESSAGES ===
            Message::CheckingForUpdates(current) => format!("Checking for updates (current version {})...", current),
            Message::NoUpdateRequired(current) => format!("You're up to date! Version {} is the latest.", current),
            Message::UpdateAvailable { app_name, current, latest } => {
                format!("A new version of {} is available: v{} (you have v{})", app_name, latest, current)
            }
            Message::UpdateReleaseNotes(notes) => format!("Release notes:\n{}", notes),
            Message::UpdateKindIncremental { files, size } => {
                format!("Smart update: {} changed file(s), {} to download", files, size)
            }
            Message::UpdateKindSingleFile(size_mb) => match size_mb {
                Some(mb) => format!("Full download of the new executable (~{:.0} MB)", mb),
                None => "Full download of the new executable".to_string(),
            },
            Message::ConfirmInstallUpdate => "Install the update now?".to_string(),
            Message::UpdateCancelled => "Update cancelled".to_string(),
            Message::UpdateCheckOffline(error) => {
                format!("Could not check for updates. Check your internet connection and try again. ({})", error)
            }
            Message::UpdateCheckBadData(error) => format!("The update server sent invalid data: {}", error),
            Message::UpdateCheckInsecure(url) => format!("Refusing to use insecure update URL '{}'. Update URLs must use HTTPS.", url),
            Message::OperationBusy(operation) => format!("Another operation is already running: {}", operation),
            Message::UpdateFileProgress { index, total, path } => format!("[{}/{}] {}", index, total, path),
            Message::UpdateCompleted { app_name, version, files } => {
                format!("{} updated to version {} ({} file(s) replaced)", app_name, version, files)
            }
            Message::UpdateInstallFailed(error) => {
                format!("Update failed and all changes were rolled back: {}", error)
            }
            Message::UpdateRestarting => "Restarting to finish the update...".to_string(),
            Message::UpdateRestartRequired => "Restart lru-tracker to use the new version.".to_string(),

            // === SYNC MESSAGES ===
            Message::SyncNotConfigured => "GitHub sync is not configured. Run 'lru-tracker init' first.".to_string(),
            Message::SyncPulled { revision, stations, history } => format!(
                "Data pulled from GitHub ({}). Stations: {}, history entries: {}",
                revision, stations, history
            ),
            Message::SyncNoRemoteData => "No data found on GitHub. This computer may need to push first.".to_string(),
            Message::SyncPullAborted => "Pull cancelled".to_string(),
            Message::SyncPushed(revision) => format!("Data pushed to GitHub ({}). Other computers can now pull your changes.", revision),
            Message::SyncPushDeclined => "Push cancelled. Pull first to get the latest data.".to_string(),
            Message::SyncPushConflict => {
                "Someone pushed again while you were pushing. Nothing was overwritten; pull first and try again.".to_string()
            }
            Message::SyncRemoteMissing => "No data file found on GitHub. Use 'lru-tracker sync push' to create it.".to_string(),
            Message::SyncRemoteChanged => "Remote data has been updated. Use 'lru-tracker sync pull' to get the latest data.".to_string(),
            Message::SyncUpToDate => "You have the latest data. No remote changes detected.".to_string(),
            Message::SyncConnectionOk(message) => message.clone(),
            Message::SyncConnectionFailed(message) => format!("Connection test failed: {}", message),
            Message::SyncTokenSaved => "GitHub token saved".to_string(),
            Message::SyncTokenDeleted => "GitHub token removed".to_string(),
            Message::SyncFailed(error) => format!("Sync failed: {}", error),
            Message::PromptUnsavedChanges => "You have unsaved local changes. What should happen to them before pulling?".to_string(),
            Message::UnsavedSaveThenPull => "Save them, then pull".to_string(),
            Message::UnsavedDiscardAndPull => "Discard them and pull".to_string(),
            Message::UnsavedCancel => "Don't pull".to_string(),
            Message::ConfirmOverwriteRemote => {
                "Remote data on GitHub has been updated since your last sync. Push anyway and overwrite it?".to_string()
            }

            // === MANIFEST TOOL MESSAGES ===
            Message::ManifestGenerated(path) => format!("Manifest generated: {}", path),
            Message::ManifestSummary { version, files, size } => {
                format!("Version: {}\nFiles tracked: {}\nTotal size: {}", version, files, size)
            }
            Message::ManifestSavings { mb, percent } => format!("Savings vs full download: {} MB ({}%)", mb, percent),
            Message::ManifestComparisonHeader => "Changes from previous version:".to_string(),
            Message::ManifestPreviousNotFound(path) => format!("Previous manifest not found: {}", path),
            Message::ManifestNextSteps => "Next steps:\n  1. Review the generated manifest\n  2. Commit update_manifest.json to the repository\n  3. Clients will download only the changed files".to_string(),
        };

        write!(f, "{}", text)
    }
}
