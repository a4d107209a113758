use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, error, info};

use crate::config::JobConfig;
use crate::gcp::FilestoreBackupApi;
use crate::types::{Backup, RunSummary};

/// Builds the backup id for an instance at a given instant.
pub fn backup_id(instance_name: &str, at: DateTime<Utc>) -> String {
    format!("{}-{}", instance_name, at.format("%Y%m%d-%H%M%S"))
}

/// Parses a provider `createTime`, tolerating a trailing `Z` and 1-9
/// fractional digits. Fractional seconds beyond microseconds are truncated.
pub fn parse_create_time(raw: &str) -> Result<NaiveDateTime> {
    let trimmed = raw.trim_end_matches('Z');
    let (base, frac) = match trimmed.split_once('.') {
        Some((base, frac)) => (base, Some(frac)),
        None => (trimmed, None),
    };

    let mut parsed = NaiveDateTime::parse_from_str(base, "%Y-%m-%dT%H:%M:%S")
        .with_context(|| format!("unparseable createTime {raw:?}"))?;

    if let Some(frac) = frac {
        let digits: String = frac.chars().take(6).collect();
        let micros: i64 = format!("{digits:0<6}")
            .parse()
            .with_context(|| format!("unparseable createTime {raw:?}"))?;
        parsed = parsed + chrono::Duration::microseconds(micros);
    }

    Ok(parsed)
}

/// Returns the backups beyond the newest `keep` entries, by creation time.
/// Ties keep provider response order.
pub fn select_expired(backups: Vec<Backup>, keep: usize) -> Result<Vec<Backup>> {
    let mut dated = backups
        .into_iter()
        .map(|backup| parse_create_time(&backup.create_time).map(|time| (time, backup)))
        .collect::<Result<Vec<_>>>()?;

    // Stable sort, most recent first.
    dated.sort_by(|a, b| b.0.cmp(&a.0));

    Ok(dated.into_iter().skip(keep).map(|(_, backup)| backup).collect())
}

/// One scheduled invocation: authenticate, trigger a backup, prune old ones.
pub struct BackupJob {
    client: Box<dyn FilestoreBackupApi>,
    config: JobConfig,
}

impl BackupJob {
    pub fn new(client: Box<dyn FilestoreBackupApi>, config: JobConfig) -> Self {
        Self { client, config }
    }

    /// Creation and cleanup are independent, non-transactional steps: an
    /// authentication or creation failure fails the run, a cleanup failure
    /// is reported in the summary after the backup was already triggered.
    pub async fn run(&self) -> Result<RunSummary> {
        if let Err(error) = self.client.authenticate().await {
            error!("authentication failed: {error:#}");
            return Err(error);
        }
        info!("authenticated with Google Cloud");

        let backup_id = backup_id(&self.config.instance_name, Utc::now());

        if self.config.dry_run {
            return self.dry_run(backup_id).await;
        }

        let operation = match self.client.create_backup(&backup_id).await {
            Ok(operation) => operation,
            Err(error) => {
                error!("backup creation failed: {error:#}");
                return Err(error);
            }
        };
        info!("backup {backup_id} is uploading in the background, operation {operation}");

        if self.config.backup_retention == 0 {
            return Ok(RunSummary::started(backup_id, None));
        }

        match self.cleanup_old_backups().await {
            Ok(deleted) => Ok(RunSummary::started(backup_id, Some(deleted))),
            Err(error) => {
                error!("cleanup failed: {error:#}");
                Ok(RunSummary::cleanup_failed(backup_id, &error))
            }
        }
    }

    /// Deletes every backup in the region beyond the newest
    /// `backup_retention`. The first delete failure aborts the rest.
    async fn cleanup_old_backups(&self) -> Result<usize> {
        let backups = self.client.list_backups().await?;
        info!(
            "{} backups in region {}",
            backups.len(),
            self.config.backup_region
        );
        for backup in &backups {
            debug!(
                "found backup {} created {} state {:?}",
                backup.name, backup.create_time, backup.state
            );
        }

        let expired = select_expired(backups, self.config.backup_retention)?;
        let mut deleted = 0;
        for backup in &expired {
            info!("deleting backup {}", backup.name);
            self.client.delete_backup(&backup.name).await?;
            deleted += 1;
        }

        info!(
            "deleted {deleted} backups, keeping the newest {}",
            self.config.backup_retention
        );
        Ok(deleted)
    }

    async fn dry_run(&self, backup_id: String) -> Result<RunSummary> {
        info!("dry-run: would create backup {backup_id}");
        if self.config.backup_retention == 0 {
            return Ok(RunSummary::dry_run(backup_id, 0));
        }

        let backups = self.client.list_backups().await?;
        let expired = select_expired(backups, self.config.backup_retention)?;
        for backup in &expired {
            info!("dry-run: would delete backup {}", backup.name);
        }
        Ok(RunSummary::dry_run(backup_id, expired.len()))
    }
}
