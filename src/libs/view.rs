use super::manifest::UpdateManifest;
use super::manifest_builder::ManifestComparison;
use crate::api::github::SyncStatus;
use crate::libs::http::human_readable_size;
use prettytable::{row, Table};
use std::error::Error;

pub struct View {}

impl View {
    pub fn sync_status(status: &SyncStatus) -> Result<(), Box<dyn Error>> {
        let mut table = Table::new();

        table.add_row(row!["REPOSITORY", status.repo]);
        table.add_row(row!["FILE", status.file_path]);
        table.add_row(row!["BRANCH", status.branch]);
        table.add_row(row!["LAST REVISION", status.last_revision_display()]);
        table.add_row(row!["LAST SYNC", status.last_sync_display()]);
        table.add_row(row!["TOKEN", if status.has_token { "Configured" } else { "Not set" }]);
        table.printstd();

        Ok(())
    }

    pub fn manifest_files(manifest: &UpdateManifest) -> Result<(), Box<dyn Error>> {
        let mut table = Table::new();

        table.add_row(row!["FILE", "SIZE", "SHA-256"]);
        for (path, entry) in &manifest.files {
            let short: String = entry.sha256.chars().take(16).collect();
            table.add_row(row![path, human_readable_size(entry.size), short]);
        }
        table.printstd();

        Ok(())
    }

    /// One row per file, unchanged files last.
    pub fn manifest_comparison(comparison: &ManifestComparison) -> Result<(), Box<dyn Error>> {
        let mut table = Table::new();

        table.add_row(row!["STATUS", "FILE"]);
        for file in &comparison.added {
            table.add_row(row!["added", file]);
        }
        for file in &comparison.modified {
            table.add_row(row!["modified", file]);
        }
        for file in &comparison.removed {
            table.add_row(row!["removed", file]);
        }
        for file in &comparison.unchanged {
            table.add_row(row!["unchanged", file]);
        }
        table.printstd();

        Ok(())
    }
}
