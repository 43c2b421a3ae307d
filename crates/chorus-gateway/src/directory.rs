//! Best-effort display-name lookup for credentials.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::credential::Credential;

/// Name used when the directory answers but the account has no name set.
pub const UNNAMED_ACCOUNT: &str = "unknown user";

/// Resolves a credential to a display name.
///
/// Implementations swallow their own failures: `None` means unresolved,
/// and callers substitute [`Credential::fallback_name`].
#[async_trait]
pub trait DirectoryLookup: Send + Sync {
    async fn lookup(&self, credential: &Credential) -> Option<String>;
}

/// Directory that never resolves anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDirectory;

#[async_trait]
impl DirectoryLookup for NoDirectory {
    async fn lookup(&self, _credential: &Credential) -> Option<String> {
        None
    }
}

/// Looks names up with an authenticated `GET` against a "current user" endpoint.
pub struct HttpDirectory {
    url: String,
    http: reqwest::Client,
}

impl HttpDirectory {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            url: url.into(),
            http: reqwest::Client::builder()
                .connect_timeout(timeout)
                .timeout(timeout)
                .build()?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct UserProfile {
    global_name: Option<String>,
    username: Option<String>,
}

impl UserProfile {
    fn display_name(self) -> String {
        self.global_name
            .filter(|name| !name.is_empty())
            .or(self.username.filter(|name| !name.is_empty()))
            .unwrap_or_else(|| UNNAMED_ACCOUNT.to_string())
    }
}

#[async_trait]
impl DirectoryLookup for HttpDirectory {
    async fn lookup(&self, credential: &Credential) -> Option<String> {
        let response = match self
            .http
            .get(&self.url)
            .header("Authorization", credential.expose())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!(credential = %credential, error = %e, "directory request failed");
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            debug!(credential = %credential, status = %status, "directory lookup rejected");
            return None;
        }

        match response.json::<UserProfile>().await {
            Ok(profile) => Some(profile.display_name()),
            Err(e) => {
                debug!(credential = %credential, error = %e, "directory response unreadable");
                None
            }
        }
    }
}
