use crate::cli_args::FuseArgs;
use crate::load_config_for_command;
use crate::output;
use anyhow::{Context, Result};
use colored::Colorize;
use xfuse_core::{self as core, AppError, ArchiveStatus};

pub fn handle_fuse_command(args: FuseArgs, quiet: bool) -> Result<()> {
    let config = load_config_for_command(&args.source_config, Some(&args.filters), Some(&args))
        .context("Failed to load configuration")?;
    let run_config = config
        .resolve()
        .context("Invalid configuration for fuse command")?;

    let summary = core::run(&run_config).with_context(|| {
        format!(
            "Failed to combine files into {}",
            run_config.output.display()
        )
    })?;

    if args.json {
        output::print_json(&summary)?;
    } else if !quiet {
        output::print_run_summary_pretty(&summary);
        println!(
            "{} Output saved to: {}",
            "✅".green(),
            run_config.output.display().to_string().blue()
        );
    }

    // The artifact itself is complete; only the archive step failed.
    if let Some(ArchiveStatus::Failed { path, error }) = summary.archive {
        return Err(AppError::ArchiveNotCreated {
            path,
            message: error,
        }
        .into());
    }
    Ok(())
}
