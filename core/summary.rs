use crate::filter::SkipReason;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// A path that was excluded, and the predicate that excluded it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipRecord {
    pub path: PathBuf,
    pub reason: SkipReason,
}

impl SkipRecord {
    pub fn new(path: impl Into<PathBuf>, reason: SkipReason) -> Self {
        Self {
            path: path.into(),
            reason,
        }
    }
}

/// A candidate that passed every filter but could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedFile {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    #[default]
    Completed,
    /// No candidate survived filtering; nothing was dispatched.
    NothingToDo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum ArchiveStatus {
    Created { path: PathBuf },
    Failed { path: PathBuf, error: String },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub status: RunStatus,
    pub source_root: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    pub candidates: usize,
    pub files_processed: usize,
    pub total_bytes: u64,
    /// Processed files, sorted by path.
    pub processed_files: Vec<PathBuf>,
    pub failed_files: Vec<FailedFile>,
    pub skipped_folders: Vec<SkipRecord>,
    pub skipped_files: Vec<SkipRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<ArchiveStatus>,
}

impl RunSummary {
    pub fn total_megabytes(&self) -> f64 {
        self.total_bytes as f64 / 1024.0 / 1024.0
    }

    pub fn skip_reason(&self, path: &Path) -> Option<SkipReason> {
        self.skipped_files
            .iter()
            .find(|r| r.path == path)
            .map(|r| r.reason)
    }
}
