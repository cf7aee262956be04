use std::path::Path;

use anyhow::Result;
use clap::Args;
use dialoguer::Confirm;

use crate::config;
use crate::progress;

#[derive(Args)]
pub struct RmArgs {
    /// Object or directory to delete
    path: String,

    /// Don't ask for confirmation
    #[arg(short, long)]
    yes: bool,
}

pub async fn run(args: RmArgs, config_path: &Path) -> Result<()> {
    let storage = config::storage(config_path)?;
    let url = format!("{}/{}", storage.root_url(), args.path);

    if !args.yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete {url} and everything under it?"))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    let spinner = progress::create_spinner(&format!("Deleting {url}..."));
    let result = storage.delete(&args.path).await;
    spinner.finish_and_clear();

    let deleted = result?;
    println!("Deleted {url} and {deleted} nested objects");
    Ok(())
}
