use crate::config::RunConfig;
use crate::walk::Candidate;
use log;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::env;
use std::fmt;
use std::path::{Component, Path, PathBuf};

pub const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".svg"];
pub const EXECUTABLE_EXTENSIONS: &[&str] = &[".exe", ".bat", ".cmd", ".com", ".ps1"];
pub const BACKUP_SUFFIXES: &[&str] = &[".tmp", ".temp", ".bak", "~"];

static TEMP_ROOTS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    let raw = env::temp_dir();
    let mut roots = vec![raw.clone()];
    if let Ok(canonical) = raw.canonicalize() {
        if canonical != raw {
            roots.push(canonical);
        }
    }
    roots
});

/// Why a path did not make it into the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Extension,
    ExcludedFolder,
    Pattern,
    TooLarge,
    MetadataUnavailable,
    Image,
    Executable,
    TempOrBackup,
    Hidden,
    Symlink,
    NotRegular,
    OutputArtifact,
}

impl SkipReason {
    pub fn describe(self) -> &'static str {
        match self {
            SkipReason::Extension => "extension not included",
            SkipReason::ExcludedFolder => "inside excluded folder",
            SkipReason::Pattern => "matches exclude pattern",
            SkipReason::TooLarge => "exceeds size limit",
            SkipReason::MetadataUnavailable => "metadata unavailable",
            SkipReason::Image => "image file",
            SkipReason::Executable => "executable",
            SkipReason::TempOrBackup => "temp or backup file",
            SkipReason::Hidden => "hidden",
            SkipReason::Symlink => "symlink",
            SkipReason::NotRegular => "not a regular file",
            SkipReason::OutputArtifact => "output artifact",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// How "executable" is decided.
///
/// Unix hosts have a permission bit; elsewhere a fixed extension set stands in
/// for it. The two give different answers for the same file (a `0o755` shell
/// script is executable by bit but not by extension, `setup.exe` the reverse).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutablePolicy {
    PermissionBit,
    ExtensionSet,
}

impl ExecutablePolicy {
    pub const fn native() -> Self {
        if cfg!(unix) {
            ExecutablePolicy::PermissionBit
        } else {
            ExecutablePolicy::ExtensionSet
        }
    }

    pub fn is_executable(self, candidate: &Candidate) -> bool {
        match self {
            ExecutablePolicy::PermissionBit => candidate.attrs.executable_bit,
            ExecutablePolicy::ExtensionSet => {
                ends_with_any(&candidate.file_name().to_lowercase(), EXECUTABLE_EXTENSIONS)
            }
        }
    }
}

/// True when `candidate` passes every active predicate of `config`.
pub fn should_include(candidate: &Candidate, config: &RunConfig) -> bool {
    FilterEngine::new(config).check(candidate).is_ok()
}

/// The ordered predicate chain. Evaluation stops at the first failing
/// predicate, so every rejected candidate maps to exactly one [`SkipReason`].
pub struct FilterEngine<'a> {
    config: &'a RunConfig,
    executable_policy: ExecutablePolicy,
    temp_roots: Vec<PathBuf>,
}

impl<'a> FilterEngine<'a> {
    pub fn new(config: &'a RunConfig) -> Self {
        Self {
            config,
            executable_policy: ExecutablePolicy::native(),
            temp_roots: TEMP_ROOTS.clone(),
        }
    }

    pub fn with_executable_policy(mut self, policy: ExecutablePolicy) -> Self {
        self.executable_policy = policy;
        self
    }

    pub fn with_temp_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.temp_roots = roots;
        self
    }

    pub fn check(&self, candidate: &Candidate) -> Result<(), SkipReason> {
        let result = self.run_chain(candidate);
        if let Err(reason) = result {
            log::trace!("Excluding {} ({})", candidate.path.display(), reason);
        }
        result
    }

    /// Verdict for an entry whose metadata could not be read. Path-only
    /// predicates still take precedence over the metadata failure.
    pub fn check_unreadable(&self, path: &Path) -> SkipReason {
        self.check_path_or(path, SkipReason::MetadataUnavailable)
    }

    /// Verdict for a FIFO, socket or device node, which is never read.
    pub fn check_special(&self, path: &Path) -> SkipReason {
        self.check_path_or(path, SkipReason::NotRegular)
    }

    fn check_path_or(&self, path: &Path, fallback: SkipReason) -> SkipReason {
        self.check_path(path).err().unwrap_or(fallback)
    }

    fn run_chain(&self, candidate: &Candidate) -> Result<(), SkipReason> {
        self.check_path(&candidate.path)?;
        self.check_size(candidate)?;

        let toggles = &self.config.toggles;
        let name = candidate.file_name().to_lowercase();
        if toggles.exclude_images && ends_with_any(&name, IMAGE_EXTENSIONS) {
            return Err(SkipReason::Image);
        }
        if toggles.exclude_executables && self.executable_policy.is_executable(candidate) {
            return Err(SkipReason::Executable);
        }
        if toggles.exclude_temp_and_backup
            && (self.is_under_temp(&candidate.path) || ends_with_any(&name, BACKUP_SUFFIXES))
        {
            return Err(SkipReason::TempOrBackup);
        }
        if toggles.exclude_hidden && is_hidden(candidate) {
            return Err(SkipReason::Hidden);
        }
        Ok(())
    }

    fn check_path(&self, path: &Path) -> Result<(), SkipReason> {
        if !self.config.extensions.is_empty() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            if !self.config.extensions.iter().any(|ext| extension_matches(&name, ext)) {
                return Err(SkipReason::Extension);
            }
        }
        if self.in_excluded_folder(path) {
            return Err(SkipReason::ExcludedFolder);
        }
        if self.config.exclude_set().is_match(&path.to_string_lossy()) {
            return Err(SkipReason::Pattern);
        }
        Ok(())
    }

    fn check_size(&self, candidate: &Candidate) -> Result<(), SkipReason> {
        match self.config.max_file_size_bytes() {
            Some(limit) if candidate.size as f64 > limit => Err(SkipReason::TooLarge),
            _ => Ok(()),
        }
    }

    fn in_excluded_folder(&self, path: &Path) -> bool {
        let relative = path
            .strip_prefix(&self.config.source_root)
            .unwrap_or(path);
        relative.parent().is_some_and(|dirs| {
            dirs.components().any(|c| match c {
                Component::Normal(name) => name
                    .to_str()
                    .is_some_and(|n| self.config.exclude_folders.contains(n)),
                _ => false,
            })
        })
    }

    fn is_under_temp(&self, path: &Path) -> bool {
        self.temp_roots.iter().any(|root| path.starts_with(root))
    }
}

fn is_hidden(candidate: &Candidate) -> bool {
    candidate.file_name().starts_with('.') || candidate.attrs.hidden_attribute
}

/// A dotted entry is a plain suffix. A bare entry matches `.entry` or a file
/// named exactly `entry`, so `rs` accepts `main.rs` but not `bars`, and
/// `makefile` accepts `Makefile`.
fn extension_matches(name_lower: &str, entry: &str) -> bool {
    if entry.starts_with('.') {
        return name_lower.ends_with(entry);
    }
    name_lower == entry
        || name_lower
            .strip_suffix(entry)
            .is_some_and(|rest| rest.ends_with('.'))
}

fn ends_with_any(name_lower: &str, suffixes: &[&str]) -> bool {
    suffixes.iter().any(|s| name_lower.ends_with(s))
}
