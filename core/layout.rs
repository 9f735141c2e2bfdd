use crate::config::{LayoutStyle, RunConfig, Toggles};
use crate::summary::{RunStatus, RunSummary, SkipRecord};
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::path::Path;
use std::time::SystemTime;

pub const RULE_WIDTH: usize = 80;
pub const FENCE: &str = "```";

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// `path` relative to `root`, falling back to the path itself.
pub fn relative_display(root: &Path, path: &Path) -> String {
    pathdiff::diff_paths(path, root)
        .filter(|rel| !rel.as_os_str().is_empty())
        .unwrap_or_else(|| path.to_path_buf())
        .to_string_lossy()
        .into_owned()
}

pub fn format_timestamp(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

fn join_or(items: impl IntoIterator<Item = impl AsRef<str>>, empty: &str) -> String {
    let joined = items
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        empty.to_string()
    } else {
        joined
    }
}

/// Generation metadata and a config echo, written before any file block.
pub fn render_header(config: &RunConfig, generated_at: DateTime<Local>) -> String {
    let stamp = generated_at.format("%Y-%m-%d %H:%M");
    let extensions = join_or(&config.extensions, "All");
    let folders = join_or(&config.exclude_folders, "None");
    let mut out = String::new();

    match config.style {
        LayoutStyle::Markdown => {
            let _ = writeln!(out, "# xfuse output - {}", stamp);
            let _ = writeln!(out, "Source Directory: {}", config.source_root.display());
            let _ = writeln!(out, "Included Extensions: {}", extensions);
            let _ = writeln!(out, "Excluded Folders: {}", folders);
            if !config.exclude_patterns.is_empty() {
                let _ = writeln!(
                    out,
                    "Excluded Patterns: {}",
                    config.exclude_patterns.join(", ")
                );
            }
            if let Some(mb) = config.max_file_size_mb {
                let _ = writeln!(out, "Max File Size: {} MB", mb);
            }
            let _ = writeln!(out, "Workers: {}", config.workers);
            out.push('\n');
        }
        LayoutStyle::Banner => {
            out.push_str("=== xfuse Run Summary ===\n");
            let _ = writeln!(out, "Generated on: {}", stamp);
            let _ = writeln!(out, "Source directory: {}", config.source_root.display());
            let _ = writeln!(out, "Included extensions: {}", extensions);
            let _ = writeln!(out, "Excluded folders: {}", folders);
            if !config.exclude_patterns.is_empty() {
                let _ = writeln!(
                    out,
                    "Excluded patterns: {}",
                    config.exclude_patterns.join(", ")
                );
            }
            if let Some(mb) = config.max_file_size_mb {
                let _ = writeln!(out, "Max file size: {} MB", mb);
            }
            let _ = writeln!(out, "Worker threads: {}", config.workers);
            let _ = writeln!(out, "{}\n", rule());
        }
    }
    out
}

/// The per-file header: relative path plus optional timestamp and size.
pub fn render_block_header(
    style: LayoutStyle,
    toggles: &Toggles,
    relative_path: &str,
    modified: Option<SystemTime>,
    size: u64,
) -> String {
    let mut meta = String::new();
    if toggles.timestamps {
        if let Some(time) = modified {
            let _ = writeln!(meta, "Last Modified: {}", format_timestamp(time));
        }
    }
    if toggles.file_size {
        let _ = writeln!(meta, "Size: {:.2} KB", size as f64 / 1024.0);
    }

    match style {
        LayoutStyle::Markdown => format!("\n## File: {}\n{}", relative_path, meta),
        LayoutStyle::Banner => format!(
            "{rule}\nFile: {}\n{}{rule}\n\n",
            relative_path,
            meta,
            rule = rule()
        ),
    }
}

pub fn render_error_stub(relative_path: &str, error: &str) -> String {
    format!("Error reading {}: {}\n\n", relative_path, error)
}

fn render_skip_section(
    out: &mut String,
    title: &str,
    records: &[SkipRecord],
    detail: bool,
    with_reason: bool,
    root: &Path,
) {
    if records.is_empty() {
        return;
    }
    if detail {
        let _ = writeln!(out, "\n{}:", title);
        for record in records {
            let rel = relative_display(root, &record.path);
            if with_reason {
                let _ = writeln!(out, "- {} ({})", rel, record.reason);
            } else {
                let _ = writeln!(out, "- {}", rel);
            }
        }
    } else {
        let _ = writeln!(out, "\n{} Count: {}", title, records.len());
    }
}

/// Totals and skip information, written after every block.
pub fn render_summary(summary: &RunSummary, config: &RunConfig) -> String {
    let mut out = String::new();
    match config.style {
        LayoutStyle::Markdown => out.push_str("\n---\n"),
        LayoutStyle::Banner => {
            let _ = writeln!(out, "{}", rule());
        }
    }
    if summary.status == RunStatus::NothingToDo {
        out.push_str("No files matched the current settings.\n");
    }
    let _ = writeln!(out, "Files Processed: {}", summary.files_processed);
    if !summary.failed_files.is_empty() {
        let _ = writeln!(out, "Files With Errors: {}", summary.failed_files.len());
    }
    let _ = writeln!(out, "Total Size: {:.2} MB", summary.total_megabytes());

    let root = summary.source_root.as_path();
    render_skip_section(
        &mut out,
        "Skipped Folders",
        &summary.skipped_folders,
        config.toggles.detail_skipped_folders,
        false,
        root,
    );
    render_skip_section(
        &mut out,
        "Skipped Files",
        &summary.skipped_files,
        config.toggles.detail_skipped_files,
        true,
        root,
    );
    out
}
