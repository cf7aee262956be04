use std::path::Path;

use anyhow::Result;
use clap::Args;
use futures::StreamExt;

use crate::config;

#[derive(Args)]
pub struct FindArgs {
    /// Directory to search under
    prefix: String,

    /// Exact file name to look for
    filename: String,
}

pub async fn run(args: FindArgs, config_path: &Path) -> Result<()> {
    let storage = config::storage(config_path)?;
    let mut matches = storage.match_filenames_recursive(&args.prefix, &args.filename);

    let mut found = 0usize;
    while let Some(item) = matches.next().await {
        let key = item?;
        println!("{}/{key}", storage.root_url());
        found += 1;
    }

    if found == 0 {
        eprintln!("No objects named {} under {}", args.filename, args.prefix);
    }
    Ok(())
}
