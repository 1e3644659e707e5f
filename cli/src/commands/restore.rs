//! Restore command: put the project note back to its pre-sync backup.

use anyhow::Result;
use clap::Args;
use sync::AtomicNoteWriter;

use crate::commands::ConfigArgs;
use crate::output;

#[derive(Args)]
pub struct RestoreArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

pub async fn run(args: RestoreArgs) -> Result<()> {
    let config = args.config.load()?;
    let target = config.project_note;

    let writer = AtomicNoteWriter::new(config.backup);
    writer.restore(&target, args.config.timeout()).await?;

    output::success(&format!("Restored {} from backup", target.display()));
    Ok(())
}
