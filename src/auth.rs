use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use tokio::process::Command as AsyncCommand;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::types::TokenResponse;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
// Refresh this long before the provider-reported expiry.
const EXPIRY_SLACK: Duration = Duration::from_secs(60);
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(300);

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Resolves default Google Cloud credentials: the metadata server when
/// running on GCP, `gcloud auth print-access-token` otherwise.
pub struct TokenProvider {
    http: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            cached: Mutex::new(None),
        }
    }

    /// Returns a valid access token, refreshing if the cached one is stale.
    pub async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    /// Forces a credential refresh. Failing both token sources is fatal to
    /// the run.
    pub async fn refresh(&self) -> Result<()> {
        let fresh = self.fetch_token().await?;
        *self.cached.lock().await = Some(fresh);
        Ok(())
    }

    async fn fetch_token(&self) -> Result<CachedToken> {
        match self.metadata_token().await {
            Ok(token) => Ok(token),
            Err(metadata_err) => {
                debug!(
                    "metadata server unavailable ({metadata_err:#}), falling back to gcloud"
                );
                self.gcloud_token().await.with_context(|| {
                    format!("no default credentials (metadata server: {metadata_err})")
                })
            }
        }
    }

    async fn metadata_token(&self) -> Result<CachedToken> {
        let response = self
            .http
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("metadata server returned {}", response.status()));
        }

        let token: TokenResponse = response.json().await?;
        let ttl = token
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_TTL);

        info!("obtained access token from metadata server");
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Instant::now() + ttl.saturating_sub(EXPIRY_SLACK),
        })
    }

    async fn gcloud_token(&self) -> Result<CachedToken> {
        let output = AsyncCommand::new("gcloud")
            .args(["auth", "print-access-token"])
            .output()
            .await?;

        if !output.status.success() {
            return Err(anyhow!("failed to get access token from gcloud"));
        }

        info!("obtained access token from gcloud");
        Ok(CachedToken {
            access_token: String::from_utf8(output.stdout)?.trim().to_string(),
            expires_at: Instant::now() + DEFAULT_TOKEN_TTL,
        })
    }
}
