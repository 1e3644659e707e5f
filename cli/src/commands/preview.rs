//! Preview command: phase one only, nothing is written.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::sync::Arc;
use sync::{CancelFlag, FsVault, SyncEngine};

use crate::commands::ConfigArgs;
use crate::output;

#[derive(Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output the full preview as JSON
    #[arg(long)]
    pub json: bool,

    /// Print the whole merged note instead of just the generated fragment
    #[arg(long)]
    pub merged: bool,
}

pub async fn run(args: PreviewArgs) -> Result<()> {
    let config = args.config.load()?;

    let engine = SyncEngine::new(Arc::new(FsVault::new()));
    let preview = engine
        .prepare(&crate::commands::request(config), &CancelFlag::new())
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&preview)?);
        return Ok(());
    }

    output::warnings(&preview.warnings);
    if preview.unchanged {
        output::success("Already up to date");
        return Ok(());
    }
    if preview.first_run {
        println!(
            "{}",
            "No generated region yet; one will be appended.".dimmed()
        );
        println!();
    }
    if args.merged {
        print!("{}", preview.merged_text);
    } else {
        print!("{}", preview.fragment);
    }

    Ok(())
}
