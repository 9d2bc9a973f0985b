//! Core library modules for lru-tracker.
//!
//! ## Features
//!
//! - **Core Infrastructure**: configuration, data storage, messaging, secrets
//! - **Self Update**: version comparison, manifests, change sets, transactional install
//! - **Shared Data**: local document handling and pull/push orchestration
//! - **Release Tooling**: manifest generation for new releases
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lru_tracker::libs::{context::AppContext, update::UpdateClient};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let ctx = AppContext::load()?;
//! let client = UpdateClient::from_context(&ctx);
//! if let Some(info) = client.check_for_updates(&ctx.current_version).await? {
//!     println!("{} is available", info.version);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod data_storage;
pub mod diff;
pub mod error;
pub mod guard;
pub mod hasher;
pub mod http;
pub mod installer;
pub mod local_data;
pub mod manifest;
pub mod manifest_builder;
pub mod messages;
pub mod secret;
pub mod self_replace;
pub mod sync;
pub mod update;
pub mod version;
pub mod view;
