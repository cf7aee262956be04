use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;

use crate::config;
use crate::progress;

#[derive(Args)]
pub struct CpArgs {
    /// Remote directory to copy from
    remote: String,

    /// Local directory to copy into
    local: PathBuf,
}

pub async fn run(args: CpArgs, config_path: &Path) -> Result<()> {
    let storage = config::storage(config_path)?;
    let url = format!("{}/{}", storage.root_url(), args.remote);

    let spinner = progress::create_spinner(&format!("Copying {url}..."));
    let result = storage.get_directory(&args.remote, &args.local).await;
    spinner.finish_and_clear();

    let copied = result?;
    if copied == 0 {
        println!("Nothing to copy under {url}");
    } else {
        println!("Copied {copied} objects to {}", args.local.display());
    }
    Ok(())
}
