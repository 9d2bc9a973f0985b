/// Every user-facing message of the application.
///
/// Text lives in [`super::display`]; call sites only pick a variant and pass
/// the values it needs.
#[derive(Debug, Clone)]
pub enum Message {
    // === CONFIGURATION MESSAGES ===
    ConfigSaved,
    ConfigDeleted,
    ConfigModuleUpdate,
    ConfigModuleSync,
    PromptSelectModules,
    PromptVersionUrl,
    PromptManifestUrl,
    PromptBaseDownloadUrl,
    PromptPackaging,
    PackagingSingleBinary,
    PackagingMultiFile,
    PromptRepoOwner,
    PromptRepoName,
    PromptDataFilePath,
    PromptBranch,
    PromptLocalDataFile,
    PromptGithubToken,

    // === UPDATE MESSAGES ===
    CheckingForUpdates(String), // current version
    NoUpdateRequired(String),   // current version
    UpdateAvailable {
        app_name: String,
        current: String,
        latest: String,
    },
    UpdateReleaseNotes(String),
    UpdateKindIncremental {
        files: usize,
        size: String,
    },
    UpdateKindSingleFile(Option<f64>), // size in MB
    ConfirmInstallUpdate,
    UpdateCancelled,
    UpdateCheckOffline(String),
    UpdateCheckBadData(String),
    UpdateCheckInsecure(String),
    OperationBusy(String),
    UpdateFileProgress {
        index: usize,
        total: usize,
        path: String,
    },
    UpdateCompleted {
        app_name: String,
        version: String,
        files: usize,
    },
    UpdateInstallFailed(String),
    UpdateRestarting,
    UpdateRestartRequired,

    // === SYNC MESSAGES ===
    SyncNotConfigured,
    SyncPulled {
        revision: String,
        stations: usize,
        history: usize,
    },
    SyncNoRemoteData,
    SyncPullAborted,
    SyncPushed(String), // short revision
    SyncPushDeclined,
    SyncPushConflict,
    SyncRemoteMissing,
    SyncRemoteChanged,
    SyncUpToDate,
    SyncConnectionOk(String),
    SyncConnectionFailed(String),
    SyncTokenSaved,
    SyncTokenDeleted,
    SyncFailed(String),
    PromptUnsavedChanges,
    UnsavedSaveThenPull,
    UnsavedDiscardAndPull,
    UnsavedCancel,
    ConfirmOverwriteRemote,

    // === MANIFEST TOOL MESSAGES ===
    ManifestGenerated(String), // output path
    ManifestSummary {
        version: String,
        files: usize,
        size: String,
    },
    ManifestSavings {
        mb: f64,
        percent: f64,
    },
    ManifestComparisonHeader,
    ManifestPreviousNotFound(String),
    ManifestNextSteps,
}
