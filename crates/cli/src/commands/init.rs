use std::path::Path;

use anyhow::Result;
use clap::Args;
use tracing::info;

use bucketdir_core::backend::local::LocalBackend;

use crate::config::{AppConfig, BackendConfig, TransferConfig};

#[derive(Args)]
pub struct InitArgs {
    /// Backend type: local or s3
    #[arg(long)]
    backend: String,

    /// Root directory for local backend
    #[arg(long)]
    path: Option<String>,

    /// S3 endpoint URL
    #[arg(long)]
    endpoint: Option<String>,

    /// S3 bucket name
    #[arg(long)]
    bucket: Option<String>,

    /// S3 region
    #[arg(long, default_value = "auto")]
    region: String,

    /// S3 access key
    #[arg(long)]
    access_key: Option<String>,

    /// S3 secret key
    #[arg(long)]
    secret_key: Option<String>,

    /// Simultaneous object operations for bulk commands
    #[arg(long)]
    concurrency: Option<usize>,
}

pub async fn run(args: InitArgs, config_path: &Path) -> Result<()> {
    let backend = match args.backend.as_str() {
        "local" => {
            let path = args
                .path
                .ok_or_else(|| anyhow::anyhow!("--path required for local backend"))?;
            LocalBackend::init(&path)?;
            BackendConfig::Local { path }
        }
        "s3" => {
            let endpoint = args
                .endpoint
                .ok_or_else(|| anyhow::anyhow!("--endpoint required for S3 backend"))?;
            let bucket = args
                .bucket
                .ok_or_else(|| anyhow::anyhow!("--bucket required for S3 backend"))?;
            let access_key = args
                .access_key
                .ok_or_else(|| anyhow::anyhow!("--access-key required for S3 backend"))?;
            let secret_key = args
                .secret_key
                .ok_or_else(|| anyhow::anyhow!("--secret-key required for S3 backend"))?;
            BackendConfig::S3 {
                endpoint,
                region: args.region,
                bucket,
                access_key,
                secret_key,
            }
        }
        other => anyhow::bail!("unknown backend: {other} (supported: local, s3)"),
    };

    let mut transfer = TransferConfig::default();
    if let Some(concurrency) = args.concurrency {
        if concurrency == 0 {
            anyhow::bail!("--concurrency must be at least 1");
        }
        transfer.concurrency = concurrency;
    }

    let config = AppConfig { backend, transfer };
    let storage = config.open_storage()?;
    config.save(config_path)?;

    info!(
        config_path = %config_path.display(),
        root = %storage.root_url(),
        "Config saved"
    );
    println!("Using {}", storage.root_url());
    println!("Config: {}", config_path.display());
    Ok(())
}
