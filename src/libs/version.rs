//! Dotted version parsing and ordering.
//!
//! Release versions are `major.minor.patch` tuples of non-negative integers.
//! Leading zeros are accepted and compared numerically (`1.02.0 == 1.2.0`).
//! Data coming from the network is validated with [`is_newer`], which never
//! fails: a malformed version only suppresses the update offer.
//!
//! ## Usage
//!
//! ```rust
//! use lru_tracker::libs::version::{is_newer, Version};
//!
//! assert!(is_newer("2.0.0", "1.9.9"));
//! assert!(!is_newer("abc", "1.0.0"));
//! let v = Version::parse("1.2.8").unwrap();
//! assert_eq!(v.to_string(), "1.2.8");
//! ```

use crate::libs::error::{UpdateError, UpdateResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Number of components required by [`Version::parse`].
pub const STRICT_COMPONENTS: usize = 3;

/// File in the install directory that records the installed version.
pub const VERSION_RECORD_FILE: &str = "version.txt";

/// An immutable, ordered version tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    parts: Vec<u64>,
}

impl Version {
    /// Parses exactly three dot-separated non-negative integers.
    pub fn parse(s: &str) -> UpdateResult<Self> {
        let version = Self::parse_relaxed(s)?;
        if version.parts.len() != STRICT_COMPONENTS {
            return Err(UpdateError::MalformedVersion(s.to_string()));
        }
        Ok(version)
    }

    /// Parses one or more dot-separated non-negative integers.
    pub fn parse_relaxed(s: &str) -> UpdateResult<Self> {
        let malformed = || UpdateError::MalformedVersion(s.to_string());
        if s.is_empty() {
            return Err(malformed());
        }

        let parts = s
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(malformed());
                }
                part.parse::<u64>().map_err(|_| malformed())
            })
            .collect::<UpdateResult<Vec<u64>>>()?;

        Ok(Self { parts })
    }

    pub fn parts(&self) -> &[u64] {
        &self.parts
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.parts.iter().zip(other.parts.iter()) {
            match a.cmp(b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        // A strict prefix sorts before the longer tuple.
        self.parts.len().cmp(&other.parts.len())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.parts.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", rendered.join("."))
    }
}

impl FromStr for Version {
    type Err = UpdateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Version::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Compares two already-parsed versions.
pub fn compare(a: &Version, b: &Version) -> Ordering {
    a.cmp(b)
}

/// Whether `candidate` is strictly newer than `baseline`.
///
/// Both strings are validated with the strict format first; malformed input on
/// either side yields `false`.
pub fn is_newer(candidate: &str, baseline: &str) -> bool {
    match (Version::parse(candidate), Version::parse(baseline)) {
        (Ok(candidate), Ok(baseline)) => candidate > baseline,
        (Err(e), _) | (_, Err(e)) => {
            debug!("Ignoring version comparison: {}", e);
            false
        }
    }
}

/// Plain-text record of the installed version, kept next to the application.
#[derive(Debug, Clone)]
pub struct VersionRecord {
    path: PathBuf,
}

impl VersionRecord {
    pub fn new(install_dir: &Path) -> Self {
        Self {
            path: install_dir.join(VERSION_RECORD_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the recorded version. Missing or malformed records yield `None`.
    pub fn read(&self) -> Option<Version> {
        let content = fs::read_to_string(&self.path).ok()?;
        match Version::parse(content.trim()) {
            Ok(version) => Some(version),
            Err(e) => {
                warn!("Ignoring version record {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Recorded version, or `fallback` when no valid record exists.
    pub fn current_or(&self, fallback: &str) -> String {
        self.read().map(|v| v.to_string()).unwrap_or_else(|| fallback.to_string())
    }

    pub fn write(&self, version: &Version) -> UpdateResult<()> {
        fs::write(&self.path, version.to_string()).map_err(|e| UpdateError::io(&self.path, e))
    }
}
