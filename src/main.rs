use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use filestore_backup::config::JobConfig;
use filestore_backup::gcp::FilestoreClient;
use filestore_backup::job::BackupJob;

#[tokio::main]
async fn main() -> Result<()> {
    let config = JobConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level)
                .with_context(|| format!("invalid log level {:?}", config.log_level))?,
        )
        .with_writer(std::io::stderr)
        .init();

    let client = FilestoreClient::new(&config)?;
    let job = BackupJob::new(Box::new(client), config);

    let summary = job.run().await?;
    println!("{}", serde_json::to_string(&summary)?);

    Ok(())
}
