use clap::Parser;

/// Job configuration, sourced from the environment with CLI overrides.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "filestore-backup",
    version,
    about = "Triggers a GCP Filestore backup and prunes old backups beyond a retention count"
)]
pub struct JobConfig {
    #[arg(long, env = "PROJECT_ID")]
    pub project_id: String,

    /// Zone or region of the source Filestore instance.
    #[arg(long, env = "INSTANCE_LOCATION")]
    pub instance_location: String,

    #[arg(long, env = "INSTANCE_NAME")]
    pub instance_name: String,

    #[arg(long, env = "INSTANCE_FILE_SHARE_NAME")]
    pub instance_file_share_name: String,

    /// Region where backups are stored and pruned.
    #[arg(long, env = "BACKUP_REGION")]
    pub backup_region: String,

    /// Number of most-recent backups to keep. 0 keeps everything.
    #[arg(long, env = "BACKUP_RETENTION", default_value_t = 0)]
    pub backup_retention: usize,

    /// Log filter in tracing-subscriber EnvFilter syntax.
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log what would be created and deleted without calling the API.
    #[arg(long)]
    pub dry_run: bool,
}
