mod cli_args;
mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use std::path::Path;
use std::process;

use cli_args::{Cli, Commands, FilterOpts, FuseArgs, SourceConfigOpts};
use xfuse_core::{AppError, BlockOrder, FuseConfig, LayoutStyle};

fn main() {
    let cli_args = Cli::parse();

    setup_logging(cli_args.quiet, cli_args.verbose);

    let quiet = cli_args.quiet;

    log::debug!("CLI args parsed: {:?}", cli_args);

    let exit_code = match run_app(cli_args, quiet) {
        Ok(_) => {
            log::info!("Application finished successfully.");
            0
        }
        Err(e) => {
            let exit_code = exit_code_for(e.downcast_ref::<AppError>());
            if !quiet || exit_code == 1 {
                eprintln!("{} {:#}", "Error:".red().bold(), e);
            } else {
                log::error!("Application failed: {:#}", e);
            }
            exit_code
        }
    };
    log::debug!("Exiting with code {}", exit_code);
    process::exit(exit_code);
}

fn exit_code_for(error: Option<&AppError>) -> i32 {
    match error {
        Some(e) if e.is_config_error() => 1,
        Some(AppError::TomlSerialize(_)) | Some(AppError::JsonSerialize(_)) => 1,
        Some(AppError::Io(_))
        | Some(AppError::FileRead { .. })
        | Some(AppError::DirCreation { .. })
        | Some(AppError::OutputOpen { .. })
        | Some(AppError::OutputWrite { .. })
        | Some(AppError::OutputAborted(_)) => 2,
        Some(AppError::Archive { .. }) | Some(AppError::ArchiveNotCreated { .. }) => 3,
        Some(_) => 1,
        None => 1,
    }
}

fn setup_logging(quiet: bool, verbose: u8) {
    let log_level = if quiet {
        log::LevelFilter::Off
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();
    log::trace!("Logger initialized with level: {:?}", log_level);
}

fn run_app(cli: Cli, quiet: bool) -> Result<()> {
    match cli.command {
        None => {
            Cli::command().print_help()?;
        }
        Some(command) => match command {
            Commands::Fuse(args) => {
                log::debug!("Executing 'fuse' command...");
                commands::fuse::handle_fuse_command(args, quiet)?;
            }
            Commands::Plan(args) => {
                log::debug!("Executing 'plan' command...");
                commands::plan::handle_plan_command(args, quiet)?;
            }
            Commands::Completion(args) => {
                log::debug!("Executing 'completion' command...");
                commands::completion::handle_completion_command(&args, quiet)?;
            }
            Commands::Config(args) => {
                log::debug!("Executing 'config' command...");
                commands::config::handle_config_command(&args, quiet)?;
            }
        },
    }
    Ok(())
}

fn merge_filter_overrides(config: &mut FuseConfig, filters: &FilterOpts) {
    if !filters.extensions.is_empty() {
        config.filters.extensions = filters.extensions.clone();
    }
    if !filters.exclude_folders.is_empty() {
        config.filters.exclude_folders = filters.exclude_folders.clone();
    }
    if !filters.exclude_patterns.is_empty() {
        config.filters.exclude_patterns = filters.exclude_patterns.clone();
    }
    if let Some(mb) = filters.max_size {
        config.filters.max_file_size_mb = Some(mb);
    }
    if filters.exclude_images {
        config.filters.exclude_images = true;
    }
    if filters.exclude_executables {
        config.filters.exclude_executables = true;
    }
    if filters.exclude_temp {
        config.filters.exclude_temp_and_backup = true;
    }
    if filters.exclude_hidden {
        config.filters.exclude_hidden = true;
    }
}

fn merge_fuse_overrides(config: &mut FuseConfig, args: &FuseArgs) {
    log::trace!("Applying fuse command CLI overrides to config...");
    let layout = &args.layout;
    if let Some(output) = &layout.output {
        config.general.output_file = output.clone();
    }
    match layout.style.as_deref() {
        Some("banner") => config.general.style = LayoutStyle::Banner,
        Some("markdown") => config.general.style = LayoutStyle::Markdown,
        _ => {}
    }
    if layout.line_numbers {
        config.output.line_numbers = true;
    }
    if layout.timestamps {
        config.output.timestamps = true;
    }
    if layout.file_size {
        config.output.file_size = true;
    }
    if layout.fence {
        config.output.syntax_fence = true;
    }
    if layout.strip_comments {
        config.output.strip_block_comments = true;
    }
    if layout.no_summary {
        config.output.write_summary = false;
    }
    if layout.counts_only {
        config.output.detail_skipped_folders = false;
        config.output.detail_skipped_files = false;
    }

    let execution = &args.execution;
    if let Some(workers) = execution.workers {
        config.general.workers = workers;
    }
    if execution.archive {
        config.general.archive = true;
    }
    if execution.ordered {
        config.general.block_order = BlockOrder::Traversal;
    }
}

/// Loads the config file for the chosen source (if any) and applies the
/// command-line overrides on top of it. The source directory always comes
/// from the command line.
pub fn load_config_for_command(
    source_opts: &SourceConfigOpts,
    filters: Option<&FilterOpts>,
    fuse_args: Option<&FuseArgs>,
) -> Result<FuseConfig> {
    let source_root = FuseConfig::determine_source_root(source_opts.source.as_ref())
        .context("Failed to determine source directory")?;
    log::info!("Source directory determined: {}", source_root.display());

    let mut config = load_config_file(&source_root, source_opts)?;
    config.general.source_dir = source_root;

    if let Some(filters) = filters {
        merge_filter_overrides(&mut config, filters);
    }
    if let Some(args) = fuse_args {
        merge_fuse_overrides(&mut config, args);
    }
    log::trace!("Config after CLI overrides: {:?}", config);
    Ok(config)
}

fn load_config_file(source_root: &Path, source_opts: &SourceConfigOpts) -> Result<FuseConfig> {
    let config_path = FuseConfig::resolve_config_path(
        source_root,
        source_opts.config_file.as_ref(),
        source_opts.no_config_file,
    )
    .context("Failed to resolve configuration path")?;

    match &config_path {
        Some(path) => FuseConfig::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(FuseConfig::default()),
    }
}
