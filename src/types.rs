use serde::{Deserialize, Serialize};

/// A backup as returned by the Filestore list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Backup {
    /// Full resource path, `projects/{p}/locations/{r}/backups/{id}`.
    pub name: String,
    #[serde(rename = "createTime")]
    pub create_time: String,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListBackupsResponse {
    // The key is omitted entirely when the region has no backups.
    #[serde(default)]
    pub backups: Vec<Backup>,
}

#[derive(Debug, Serialize)]
pub struct CreateBackupRequest {
    pub description: String,
    pub source_instance: String,
    pub source_file_share: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Final status of a run, printed as JSON on stdout.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_backups: Option<usize>,
}

impl RunSummary {
    pub fn started(backup_id: String, deleted_backups: Option<usize>) -> Self {
        Self {
            status: "ok".to_string(),
            message: "Backup creation has begun!".to_string(),
            backup_id: Some(backup_id),
            deleted_backups,
        }
    }

    pub fn cleanup_failed(backup_id: String, error: &anyhow::Error) -> Self {
        Self {
            status: "backup started, cleanup failed".to_string(),
            message: format!("{error:#}"),
            backup_id: Some(backup_id),
            deleted_backups: None,
        }
    }

    pub fn dry_run(backup_id: String, would_delete: usize) -> Self {
        Self {
            status: "dry-run".to_string(),
            message: format!(
                "would create backup {backup_id} and delete {would_delete} old backups"
            ),
            backup_id: Some(backup_id),
            deleted_backups: Some(would_delete),
        }
    }
}
