use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use crate::config;

#[derive(Args)]
pub struct PutArgs {
    /// Destination object path
    path: String,

    /// Local file to upload
    file: PathBuf,
}

pub async fn run(args: PutArgs, config_path: &Path) -> Result<()> {
    let storage = config::storage(config_path)?;
    if args.file.is_dir() {
        storage.put_directory(&args.file, &args.path).await?;
        println!("Uploaded {} to {}/{}", args.file.display(), storage.root_url(), args.path);
        return Ok(());
    }

    let data = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    storage.put(&args.path, &data).await?;

    info!(path = %args.path, bytes = data.len(), "Uploaded");
    println!("Uploaded {} to {}/{}", args.file.display(), storage.root_url(), args.path);
    Ok(())
}
