use crate::cli_args::ConfigArgs;
use crate::load_config_for_command;
use crate::output;
use anyhow::{Context, Result};
use colored::*;
use std::fs;
use xfuse_core::FuseConfig;
use xfuse_core::config::{DEFAULT_CONFIG_DIR, DEFAULT_CONFIG_FILENAME};

pub fn handle_config_command(args: &ConfigArgs, quiet: bool) -> Result<()> {
    if args.effective {
        let config = load_config_for_command(&args.source_config, None, None)
            .context("Failed to load configuration")?;
        let text = config
            .to_toml_string()
            .context("Failed to serialize effective config to TOML")?;
        print!("{}", text);
        return Ok(());
    }

    let text = FuseConfig::default()
        .to_toml_string()
        .context("Failed to serialize default config to TOML")?;
    if !args.save {
        print!("{}", text);
        return Ok(());
    }

    let source_root = FuseConfig::determine_source_root(args.source_config.source.as_ref())
        .context("Failed to determine source directory for config command")?;
    let config_dir = source_root.join(DEFAULT_CONFIG_DIR);
    let config_path = config_dir.join(DEFAULT_CONFIG_FILENAME);

    if !output::confirm_overwrite(&config_path, quiet)? {
        println!("Save cancelled.");
        return Ok(());
    }
    fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create directory {}", config_dir.display()))?;
    fs::write(&config_path, text)
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;
    log::info!("Default config written to {}", config_path.display());

    if !quiet {
        println!(
            "{} Default config saved to: {}",
            "✅".green(),
            config_path.display().to_string().blue()
        );
    }
    Ok(())
}
