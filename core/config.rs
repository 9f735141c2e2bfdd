use crate::error::{AppError, Result};
use log;
use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_DIR: &str = ".xtools/xfuse";
pub const DEFAULT_CONFIG_FILENAME: &str = "xfuse.toml";
pub const DEFAULT_OUTPUT_FILE: &str = "xfuse_output.txt";
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_EXCLUDED_FOLDER: &str = ".git";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct FuseConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub filters: FiltersConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub archive: bool,
    #[serde(default)]
    pub style: LayoutStyle,
    #[serde(default)]
    pub block_order: BlockOrder,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FiltersConfig {
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default = "default_exclude_folders")]
    pub exclude_folders: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_file_size_mb: Option<f64>,
    #[serde(default)]
    pub exclude_images: bool,
    #[serde(default)]
    pub exclude_executables: bool,
    #[serde(default)]
    pub exclude_temp_and_backup: bool,
    #[serde(default)]
    pub exclude_hidden: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default)]
    pub line_numbers: bool,
    #[serde(default)]
    pub timestamps: bool,
    #[serde(default)]
    pub file_size: bool,
    #[serde(default)]
    pub syntax_fence: bool,
    #[serde(default)]
    pub strip_block_comments: bool,
    #[serde(default = "default_true")]
    pub write_summary: bool,
    #[serde(default = "default_true")]
    pub detail_skipped_folders: bool,
    #[serde(default = "default_true")]
    pub detail_skipped_files: bool,
}

/// Text layout of the output artifact.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LayoutStyle {
    #[default]
    Markdown,
    Banner,
}

/// Order in which file blocks reach the output.
///
/// `Completion` appends each block as soon as its worker finishes, so block
/// order follows I/O timing. `Traversal` buffers finished blocks by submission
/// index and emits them in walk order.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockOrder {
    #[default]
    Completion,
    Traversal,
}

fn default_true() -> bool {
    true
}
fn default_source_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_output_file() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_FILE)
}
fn default_workers() -> usize {
    DEFAULT_WORKERS
}
fn default_exclude_folders() -> Vec<String> {
    vec![DEFAULT_EXCLUDED_FOLDER.to_string()]
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            output_file: default_output_file(),
            workers: default_workers(),
            archive: false,
            style: LayoutStyle::default(),
            block_order: BlockOrder::default(),
        }
    }
}
impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            extensions: Vec::new(),
            exclude_folders: default_exclude_folders(),
            exclude_patterns: Vec::new(),
            max_file_size_mb: None,
            exclude_images: false,
            exclude_executables: false,
            exclude_temp_and_backup: false,
            exclude_hidden: false,
        }
    }
}
impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            line_numbers: false,
            timestamps: false,
            file_size: false,
            syntax_fence: false,
            strip_block_comments: false,
            write_summary: default_true(),
            detail_skipped_folders: default_true(),
            detail_skipped_files: default_true(),
        }
    }
}

/// Boolean switches of a resolved run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Toggles {
    pub line_numbers: bool,
    pub timestamps: bool,
    pub file_size: bool,
    pub syntax_fence: bool,
    pub strip_block_comments: bool,
    pub exclude_images: bool,
    pub exclude_executables: bool,
    pub exclude_temp_and_backup: bool,
    pub exclude_hidden: bool,
    pub write_summary: bool,
    pub detail_skipped_folders: bool,
    pub detail_skipped_files: bool,
}

/// Fully validated configuration for one run.
///
/// Only obtainable through [`FuseConfig::resolve`]. Workers share it behind an
/// `Arc` and nothing mutates it once the run has started.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub source_root: PathBuf,
    pub output: PathBuf,
    pub extensions: Vec<String>,
    pub exclude_folders: BTreeSet<String>,
    pub exclude_patterns: Vec<String>,
    exclude_set: RegexSet,
    pub max_file_size_mb: Option<f64>,
    pub toggles: Toggles,
    pub workers: NonZeroUsize,
    pub archive: bool,
    pub style: LayoutStyle,
    pub block_order: BlockOrder,
}

impl RunConfig {
    pub fn exclude_set(&self) -> &RegexSet {
        &self.exclude_set
    }

    pub fn max_file_size_bytes(&self) -> Option<f64> {
        self.max_file_size_mb.map(|mb| mb * 1024.0 * 1024.0)
    }
}

impl FuseConfig {
    pub fn for_source(source_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.general.source_dir = source_dir.into();
        config
    }

    pub fn determine_source_root(cli_source: Option<&PathBuf>) -> Result<PathBuf> {
        let path_to_resolve = match cli_source {
            Some(p) => expand_path(p),
            None => env::current_dir().map_err(AppError::Io)?,
        };
        canonical_source(&path_to_resolve)
    }

    pub fn resolve_config_path(
        source_root: &Path,
        cli_config_file: Option<&String>,
        cli_disable_config: bool,
    ) -> Result<Option<PathBuf>> {
        if cli_disable_config {
            log::debug!("Config file loading disabled via CLI flag.");
            return Ok(None);
        }
        let default_dir = source_root.join(DEFAULT_CONFIG_DIR);

        match cli_config_file {
            Some(p_str) => {
                let mut path = PathBuf::from(shellexpand::tilde(p_str).as_ref());
                let looks_like_path = path.is_absolute()
                    || path.components().count() > 1
                    || p_str.contains(['/', '\\']);
                if !looks_like_path {
                    path = default_dir.join(&path);
                }
                if !path.exists() && path.extension().is_none() {
                    path.set_extension("toml");
                }
                if !path.exists() {
                    return Err(AppError::Config(format!(
                        "Specified config file not found: {}",
                        path.display()
                    )));
                }
                log::debug!("Using specified config file: {}", path.display());
                Ok(Some(path))
            }
            None => {
                let default_path = default_dir.join(DEFAULT_CONFIG_FILENAME);
                if default_path.exists() {
                    log::debug!("Using default config file path: {}", default_path.display());
                    Ok(Some(default_path))
                } else {
                    log::debug!(
                        "No config file specified and default not found at: {}",
                        default_path.display()
                    );
                    Ok(None)
                }
            }
        }
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        log::info!("Loading configuration from: {}", config_path.display());
        let toml_content = fs::read_to_string(config_path).map_err(|e| AppError::FileRead {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&toml_content).map_err(|e| match e {
            AppError::TomlParse(msg) => AppError::TomlParse(format!(
                "Error parsing config file '{}': {}",
                config_path.display(),
                msg
            )),
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str::<FuseConfig>(content).map_err(|e| AppError::TomlParse(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validates this configuration and freezes it into a [`RunConfig`].
    pub fn resolve(&self) -> Result<RunConfig> {
        log::debug!("Resolving run configuration...");
        let source_root = canonical_source(&expand_path(&self.general.source_dir))?;

        if self.general.output_file.as_os_str().is_empty() {
            return Err(AppError::Config(
                "Output file name cannot be empty.".to_string(),
            ));
        }
        let output = expand_path(&self.general.output_file);
        if output.is_dir() {
            return Err(AppError::Config(format!(
                "Output path '{}' is a directory.",
                output.display()
            )));
        }

        let workers = NonZeroUsize::new(self.general.workers).ok_or_else(|| {
            AppError::InvalidArgument(
                "Number of worker threads must be a positive integer.".to_string(),
            )
        })?;

        if let Some(mb) = self.filters.max_file_size_mb {
            if !mb.is_finite() || mb < 0.0 {
                return Err(AppError::InvalidArgument(format!(
                    "Max file size must be a non-negative number of MB, got {}.",
                    mb
                )));
            }
        }

        let extensions: Vec<String> = self
            .filters
            .extensions
            .iter()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        let exclude_folders: BTreeSet<String> = self
            .filters
            .exclude_folders
            .iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        let exclude_patterns: Vec<String> = self
            .filters
            .exclude_patterns
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        let exclude_set = build_regex_set(&exclude_patterns)?;

        let toggles = Toggles {
            line_numbers: self.output.line_numbers,
            timestamps: self.output.timestamps,
            file_size: self.output.file_size,
            syntax_fence: self.output.syntax_fence,
            strip_block_comments: self.output.strip_block_comments,
            exclude_images: self.filters.exclude_images,
            exclude_executables: self.filters.exclude_executables,
            exclude_temp_and_backup: self.filters.exclude_temp_and_backup,
            exclude_hidden: self.filters.exclude_hidden,
            write_summary: self.output.write_summary,
            detail_skipped_folders: self.output.detail_skipped_folders,
            detail_skipped_files: self.output.detail_skipped_files,
        };

        log::debug!(
            "Run configuration resolved (source: {}, output: {}, workers: {})",
            source_root.display(),
            output.display(),
            workers
        );
        Ok(RunConfig {
            source_root,
            output,
            extensions,
            exclude_folders,
            exclude_patterns,
            exclude_set,
            max_file_size_mb: self.filters.max_file_size_mb,
            toggles,
            workers,
            archive: self.general.archive,
            style: self.general.style,
            block_order: self.general.block_order,
        })
    }
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}

fn canonical_source(path: &Path) -> Result<PathBuf> {
    match path.canonicalize() {
        Ok(canonical) if canonical.is_dir() => Ok(canonical),
        _ => Err(AppError::SourceNotFound(path.to_path_buf())),
    }
}

fn build_regex_set(patterns: &[String]) -> Result<RegexSet> {
    for pattern in patterns {
        if let Err(e) = Regex::new(pattern) {
            log::error!("Invalid exclude pattern \"{}\": {}", pattern, e);
            return Err(AppError::Pattern {
                pattern: pattern.clone(),
                source: e,
            });
        }
        log::trace!("Adding exclude pattern: {}", pattern);
    }
    RegexSet::new(patterns).map_err(|e| AppError::Pattern {
        pattern: patterns.join(", "),
        source: e,
    })
}
