//! # lru-tracker
//!
//! Self-update and shared-data synchronization for the LRU tracker.
//!
//! ## Features
//!
//! - **Tiered Update Checks**: an incremental manifest first, a plain version
//!   descriptor as fallback
//! - **Smart Updates**: only files whose SHA-256 differs are downloaded, staged
//!   with backups and rolled back on any failure
//! - **Self Replacement**: a running single-binary install is swapped by a
//!   detached helper script after exit
//! - **Shared Data Sync**: pull and push of one JSON document kept in a GitHub
//!   repository, with revision-based conflict detection
//! - **Release Tooling**: the `update-manifest` binary generates the manifest
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lru_tracker::commands::Cli;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Cli::menu().await
//! }
//! ```

pub mod api;
pub mod commands;
pub mod libs;
