use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::info;

use crate::auth::TokenProvider;
use crate::config::JobConfig;
use crate::retry::RetryConfig;
use crate::types::{Backup, CreateBackupRequest, ListBackupsResponse};

const FILESTORE_API_BASE: &str = "https://file.googleapis.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const BACKUP_DESCRIPTION: &str = "Filestore auto backup managed by scheduled job";

#[mockall::automock]
#[async_trait]
pub trait FilestoreBackupApi: Send + Sync {
    /// Refreshes default credentials. Failure is unrecoverable for the run.
    async fn authenticate(&self) -> Result<()>;
    /// Starts an asynchronous backup and returns the provider operation name.
    async fn create_backup(&self, backup_id: &str) -> Result<String>;
    async fn list_backups(&self) -> Result<Vec<Backup>>;
    async fn delete_backup(&self, backup_name: &str) -> Result<()>;
}

/// Backup collection URL for a project and backup region.
pub fn backups_url(project_id: &str, backup_region: &str) -> String {
    format!("{FILESTORE_API_BASE}/projects/{project_id}/locations/{backup_region}/backups")
}

/// Full resource path of the source Filestore instance.
pub fn source_instance_path(
    project_id: &str,
    instance_location: &str,
    instance_name: &str,
) -> String {
    format!("projects/{project_id}/locations/{instance_location}/instances/{instance_name}")
}

/// Pulls the provider's `error` member out of a non-2xx body, falling back
/// to the raw body.
pub fn extract_api_error(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("error").cloned())
        .map(|error| match error {
            Value::String(message) => message,
            other => other.to_string(),
        })
        .unwrap_or_else(|| body.to_string())
}

fn is_transient(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect()
}

pub struct FilestoreClient {
    http: Client,
    auth: TokenProvider,
    config: JobConfig,
    retry: RetryConfig,
}

impl FilestoreClient {
    pub fn new(config: &JobConfig) -> Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            auth: TokenProvider::new(http.clone()),
            http,
            config: config.clone(),
            retry: RetryConfig::default(),
        })
    }
}

#[async_trait]
impl FilestoreBackupApi for FilestoreClient {
    async fn authenticate(&self) -> Result<()> {
        self.auth.refresh().await
    }

    async fn create_backup(&self, backup_id: &str) -> Result<String> {
        let token = self.auth.token().await?;
        let url = format!(
            "{}?backupId={}",
            backups_url(&self.config.project_id, &self.config.backup_region),
            backup_id
        );
        let body = CreateBackupRequest {
            description: BACKUP_DESCRIPTION.to_string(),
            source_instance: source_instance_path(
                &self.config.project_id,
                &self.config.instance_location,
                &self.config.instance_name,
            ),
            source_file_share: self.config.instance_file_share_name.clone(),
        };

        info!("making a request to {url}");
        // Not retried: the POST is not idempotent.
        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(anyhow!(
                "backup creation failed with {status}: {}",
                extract_api_error(&body)
            ));
        }

        let result: Value = response.json().await?;
        match result.get("name").and_then(|name| name.as_str()) {
            Some(operation) => Ok(operation.to_string()),
            None => Err(anyhow!("no operation name returned from backup request")),
        }
    }

    async fn list_backups(&self) -> Result<Vec<Backup>> {
        let token = self.auth.token().await?;
        let url = backups_url(&self.config.project_id, &self.config.backup_region);

        let response = self
            .retry
            .execute("list backups", is_transient, || async {
                self.http.get(&url).bearer_auth(&token).send().await
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(anyhow!(
                "listing backups failed with {status}: {}",
                extract_api_error(&body)
            ));
        }

        let list: ListBackupsResponse = response.json().await?;
        Ok(list.backups)
    }

    async fn delete_backup(&self, backup_name: &str) -> Result<()> {
        let token = self.auth.token().await?;
        let url = format!("{FILESTORE_API_BASE}/{backup_name}");

        let response = self
            .retry
            .execute("delete backup", is_transient, || async {
                self.http.delete(&url).bearer_auth(&token).send().await
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            return Err(anyhow!(
                "deleting {backup_name} failed with {status}: {}",
                extract_api_error(&body)
            ));
        }

        Ok(())
    }
}
