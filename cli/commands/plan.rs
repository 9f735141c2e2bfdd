use crate::cli_args::PlanArgs;
use crate::load_config_for_command;
use crate::output::{self, PlanReport};
use anyhow::{Context, Result};
use xfuse_core as core;

pub fn handle_plan_command(args: PlanArgs, quiet: bool) -> Result<()> {
    let config = load_config_for_command(&args.source_config, Some(&args.filters), None)
        .context("Failed to load configuration for plan command")?;
    let run_config = config
        .resolve()
        .context("Invalid configuration for plan command")?;

    log::debug!("Plan: walking and filtering {}", run_config.source_root.display());
    let plan = core::plan(&run_config);
    let report = PlanReport::new(&plan, &run_config.source_root);
    log::debug!(
        "Plan: {} included, {} files skipped",
        report.included.len(),
        report.skipped_files.len()
    );

    if args.json {
        output::print_json(&report)
    } else {
        if !quiet {
            output::print_plan_pretty(&report);
        }
        Ok(())
    }
}
