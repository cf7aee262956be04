use std::path::Path;

use anyhow::Result;
use clap::Args;
use console::style;

use crate::config;

#[derive(Args)]
pub struct LsArgs {
    /// Directory to list (default: bucket root)
    #[arg(default_value = "")]
    dir: String,

    /// Print a JSON array instead of one entry per line
    #[arg(long)]
    json: bool,
}

pub async fn run(args: LsArgs, config_path: &Path) -> Result<()> {
    let storage = config::storage(config_path)?;
    let entries = storage.list(&args.dir).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No objects under {}/{}", storage.root_url(), args.dir);
        return Ok(());
    }
    for entry in &entries {
        if entry.ends_with('/') {
            println!("{}", style(entry).blue().bold());
        } else {
            println!("{entry}");
        }
    }
    Ok(())
}
