use std::path::Path;

use anyhow::Result;
use clap::Args;
use tokio::io::AsyncWriteExt;

use bucketdir_core::StorageError;

use crate::config;

#[derive(Args)]
pub struct CatArgs {
    /// Object path
    path: String,
}

pub async fn run(args: CatArgs, config_path: &Path) -> Result<()> {
    let storage = config::storage(config_path)?;
    let data = match storage.get(&args.path).await {
        Ok(data) => data,
        Err(StorageError::NotExist { path }) => {
            anyhow::bail!("{}/{path} does not exist", storage.root_url())
        }
        Err(e) => return Err(e.into()),
    };

    let mut stdout = tokio::io::stdout();
    stdout.write_all(&data).await?;
    stdout.flush().await?;
    Ok(())
}
