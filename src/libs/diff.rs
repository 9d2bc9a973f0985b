//! Selects the manifest entries whose local copy is missing or different.
//!
//! Files present locally but absent from the manifest are left alone; an
//! update never deletes anything.

use crate::libs::error::{UpdateError, UpdateResult};
use crate::libs::hasher;
use crate::libs::manifest::{ManifestEntry, UpdateManifest};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Ordered entries to download, in manifest order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    entries: Vec<(String, ManifestEntry)>,
}

impl ChangeSet {
    pub fn entries(&self) -> &[(String, ManifestEntry)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|(_, entry)| entry.size).sum()
    }

    pub fn paths(&self) -> Vec<&str> {
        self.entries.iter().map(|(path, _)| path.as_str()).collect()
    }

    pub fn push(&mut self, path: &str, entry: ManifestEntry) {
        self.entries.push((path.to_string(), entry));
    }
}

impl IntoIterator for ChangeSet {
    type Item = (String, ManifestEntry);
    type IntoIter = std::vec::IntoIter<(String, ManifestEntry)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Resolves a manifest path below `root`, refusing absolute paths and `..`.
pub fn resolve_entry_path(root: &Path, relative: &str) -> UpdateResult<PathBuf> {
    let normalized = relative.replace('\\', "/");
    let candidate = Path::new(&normalized);

    let escapes = candidate
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));
    if escapes || normalized.starts_with('/') || normalized.is_empty() {
        return Err(UpdateError::MalformedUpdateData(format!("manifest path '{}' escapes the install directory", relative)));
    }

    Ok(root.join(candidate))
}

/// Compares every manifest entry with the file under `local_root`.
pub fn compute_change_set(manifest: &UpdateManifest, local_root: &Path) -> UpdateResult<ChangeSet> {
    let mut change_set = ChangeSet::default();

    for (path, entry) in &manifest.files {
        let local_path = resolve_entry_path(local_root, path)?;

        if !local_path.exists() {
            debug!("{} is new", path);
            change_set.push(path, entry.clone());
            continue;
        }

        match hasher::digest_file(&local_path) {
            Ok(local_digest) if hasher::digests_match(&local_digest, &entry.sha256) => {}
            Ok(_) => {
                debug!("{} differs", path);
                change_set.push(path, entry.clone());
            }
            Err(e) => {
                warn!("Cannot hash {}, scheduling it for download: {}", local_path.display(), e);
                change_set.push(path, entry.clone());
            }
        }
    }

    Ok(change_set)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_rejects_escaping_paths() {
        let root = Path::new("/opt/app");
        assert!(resolve_entry_path(root, "../etc/passwd").is_err());
        assert!(resolve_entry_path(root, "/etc/passwd").is_err());
        assert!(resolve_entry_path(root, "a/../../b").is_err());
        assert_eq!(resolve_entry_path(root, "src\\main.py").unwrap(), root.join("src/main.py"));
    }
}
