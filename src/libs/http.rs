use crate::libs::error::{UpdateError, UpdateResult};
use reqwest::{redirect, Client, Url};
use std::error::Error as StdError;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

include!(concat!(env!("OUT_DIR"), "/app_metadata.rs"));

pub const MANIFEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const STORE_TIMEOUT: Duration = Duration::from_secs(10);
pub const PUSH_TIMEOUT: Duration = Duration::from_secs(15);
pub const FILE_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
pub const BINARY_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);
pub const MAX_REDIRECTS: usize = 10;

/// Which URLs the application is allowed to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportPolicy {
    /// Only `https://` URLs.
    #[default]
    HttpsOnly,
    /// `https://` anywhere plus plain `http://` to the loopback interface.
    AllowLoopback,
}

impl TransportPolicy {
    pub fn permits(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };

        match parsed.scheme() {
            "https" => true,
            "http" if *self == TransportPolicy::AllowLoopback => {
                matches!(parsed.host_str(), Some("127.0.0.1" | "localhost" | "[::1]" | "::1"))
            }
            _ => false,
        }
    }

    pub fn ensure(&self, url: &str) -> UpdateResult<()> {
        if self.permits(url) {
            Ok(())
        } else {
            Err(UpdateError::InsecureTransport(url.to_string()))
        }
    }
}

/// Raised by the redirect policy when a hop leaves the [`TransportPolicy`].
#[derive(Debug, thiserror::Error)]
#[error("redirect to '{0}' refused by the transport policy")]
pub struct RefusedRedirect(pub String);

/// Redirect policy that re-checks every hop against `policy`.
pub fn redirect_policy(policy: TransportPolicy) -> redirect::Policy {
    redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if policy.permits(attempt.url().as_str()) {
            attempt.follow()
        } else {
            let target = attempt.url().to_string();
            attempt.error(RefusedRedirect(target))
        }
    })
}

/// Target of a redirect the transport policy refused, if `err` was caused by one.
pub fn refused_redirect_target(err: &reqwest::Error) -> Option<String> {
    let mut source = StdError::source(err);
    while let Some(cause) = source {
        if let Some(refused) = cause.downcast_ref::<RefusedRedirect>() {
            return Some(refused.0.clone());
        }
        source = cause.source();
    }
    None
}

/// User-Agent sent with every request.
pub fn user_agent() -> String {
    format!("{}/{}", APP_METADATA_NAME, APP_METADATA_VERSION)
}

/// Thin wrapper around a shared `reqwest` client that enforces a [`TransportPolicy`].
#[derive(Debug, Clone)]
pub struct Http {
    client: Client,
    policy: TransportPolicy,
}

impl Http {
    pub fn new(policy: TransportPolicy) -> Self {
        let client = Client::builder()
            .user_agent(user_agent())
            .redirect(redirect_policy(policy))
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to a client without redirects: {}", e);
                Client::builder().redirect(redirect::Policy::none()).build().unwrap_or_default()
            });
        Self { client, policy }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn policy(&self) -> TransportPolicy {
        self.policy
    }

    /// GETs `url` and returns the body as text. Non-2xx statuses are network failures.
    pub async fn get_text(&self, url: &str, timeout: Duration) -> UpdateResult<String> {
        self.policy.ensure(url)?;
        debug!("GET {}", url);

        let res = self.client.get(url).timeout(timeout).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(UpdateError::Network(format!("GET {} returned {}", url, status)));
        }

        Ok(res.text().await?)
    }

    /// Streams `url` into `dest`, calling `on_progress(downloaded, total)` after every chunk.
    ///
    /// Returns the number of bytes written. The caller owns cleanup of `dest` on failure.
    pub async fn download_to_file(
        &self,
        url: &str,
        dest: &Path,
        timeout: Duration,
        on_progress: &mut (dyn FnMut(u64, Option<u64>) + Send),
    ) -> UpdateResult<u64> {
        self.policy.ensure(url)?;
        debug!("Downloading {} -> {}", url, dest.display());

        let mut res = self.client.get(url).timeout(timeout).send().await?;
        let status = res.status();
        if !status.is_success() {
            return Err(UpdateError::Network(format!("GET {} returned {}", url, status)));
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| UpdateError::io(parent, e))?;
        }

        let total = res.content_length();
        let mut file = File::create(dest).await.map_err(|e| UpdateError::io(dest, e))?;
        let mut downloaded: u64 = 0;

        while let Some(chunk) = res.chunk().await? {
            file.write_all(&chunk).await.map_err(|e| UpdateError::io(dest, e))?;
            downloaded += chunk.len() as u64;
            on_progress(downloaded, total);
        }

        file.flush().await.map_err(|e| UpdateError::io(dest, e))?;
        Ok(downloaded)
    }
}

/// Formats a byte count with binary units.
pub fn human_readable_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
