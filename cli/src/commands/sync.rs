//! Sync command.
//!
//! Runs the full two-phase pipeline: prepare (scan, parse, aggregate,
//! merge) and commit (backup-guarded atomic write).

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::sync::Arc;
use sync::{CancelFlag, FsVault, SyncEngine};

use crate::commands::ConfigArgs;
use crate::output;

#[derive(Args)]
pub struct SyncArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output the run outcome as JSON
    #[arg(long)]
    pub json: bool,

    /// Write even when the merged note is byte-identical to what is stored
    #[arg(long, short)]
    pub force: bool,
}

pub async fn run(args: SyncArgs) -> Result<()> {
    let config = args.config.load()?;
    let target = config.project_note.clone();

    let engine = SyncEngine::new(Arc::new(FsVault::new()));
    let cancel = CancelFlag::new();
    let request = crate::commands::request(config);

    let preview = engine.prepare(&request, &cancel).await?;

    if preview.unchanged && !args.force {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&preview.summary)?);
        } else {
            output::warnings(&preview.warnings);
            output::success("Already up to date");
            output::hint("Use --force to rewrite the note anyway");
        }
        return Ok(());
    }

    let outcome = engine
        .commit(&preview, args.config.timeout(), &cancel)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    output::warnings(&outcome.warnings);
    output::header("Sync");
    println!();
    println!(
        "  {} {}",
        "Entries:".dimmed(),
        preview.summary.total_entries.to_string().cyan()
    );
    if let Some((start, end)) = preview.summary.date_span {
        println!("  {} {start} to {end}", "Span:".dimmed());
    }
    println!("  {} {}", "Note:".dimmed(), target.display());
    if let Some(backup) = &outcome.report.backup_path {
        println!("  {} {}", "Backup:".dimmed(), backup.display());
    }
    println!();
    output::success(if preview.first_run {
        "Generated region appended"
    } else {
        "Generated region updated"
    });

    Ok(())
}
