use anyhow::{Context, Result};
use byte_unit::{Byte, UnitType};
use colored::*;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table, presets::UTF8_FULL};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;
use xfuse_core::layout::relative_display;
use xfuse_core::{AppError, ArchiveStatus, Plan, RunStatus, RunSummary, SkipReason, SkipRecord};

pub fn human_size(bytes: u64) -> String {
    Byte::from_u64(bytes)
        .get_appropriate_unit(UnitType::Binary)
        .to_string()
}

pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let content = to_json(data).context("Failed to serialize to JSON")?;
    write_to_stdout(&content)
}

fn to_json<T: Serialize>(data: &T) -> std::result::Result<String, AppError> {
    Ok(serde_json::to_string_pretty(data)?)
}

fn write_to_stdout(content: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(content.as_bytes())
        .context("Failed to write to stdout")?;
    if !content.ends_with('\n') {
        handle
            .write_all(b"\n")
            .context("Failed to write newline to stdout")?;
    }
    handle.flush().context("Failed to flush stdout")?;
    Ok(())
}

/// Asks before replacing `path`. In quiet mode an existing file is an error.
pub fn confirm_overwrite(path: &Path, quiet: bool) -> Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    if quiet {
        anyhow::bail!(
            "Target file '{}' exists. Overwrite prevented in quiet mode.",
            path.display()
        );
    }
    print!(
        "{} File already exists at '{}'. Overwrite? [{}/{}] ",
        "⚠️".yellow(),
        path.display().to_string().cyan(),
        "y".green(),
        "N".red()
    );
    io::stdout().flush().context("Failed to flush stdout")?;
    let mut response = String::new();
    io::stdin()
        .read_line(&mut response)
        .context("Failed to read user input")?;
    Ok(response.trim().eq_ignore_ascii_case("y"))
}

fn count_by_reason(records: &[SkipRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.reason.to_string()).or_insert(0) += 1;
    }
    counts
}

fn reason_color(reason: SkipReason) -> Color {
    match reason {
        SkipReason::MetadataUnavailable | SkipReason::Symlink | SkipReason::NotRegular => {
            Color::Yellow
        }
        SkipReason::OutputArtifact => Color::Magenta,
        _ => Color::DarkGrey,
    }
}

fn line(label: &str, value: impl std::fmt::Display) {
    println!("{:<20} {}", label.green(), value.to_string().cyan());
}

pub fn print_run_summary_pretty(summary: &RunSummary) {
    println!();
    println!("{}", " xfuse Run Summary ".green().bold().underline());
    if summary.status == RunStatus::NothingToDo {
        println!("{}", "(No files matched the current settings)".yellow());
    }
    line("Files Processed:", summary.files_processed);
    line("Candidates:", summary.candidates);
    line("Total Size:", human_size(summary.total_bytes));
    if !summary.failed_files.is_empty() {
        println!(
            "{:<20} {}",
            "Read Errors:".green(),
            summary.failed_files.len().to_string().red()
        );
    }
    line("Skipped Folders:", summary.skipped_folders.len());
    line("Skipped Files:", summary.skipped_files.len());
    if let Some(output) = &summary.output {
        line("Output:", output.display());
    }
    match &summary.archive {
        Some(ArchiveStatus::Created { path }) => line("Archive:", path.display()),
        Some(ArchiveStatus::Failed { path, error }) => println!(
            "{:<20} {} ({})",
            "Archive:".green(),
            path.display().to_string().red(),
            error
        ),
        None => {}
    }

    if !summary.skipped_files.is_empty() {
        println!("\n{}", " Skipped Files By Reason ".green().bold().underline());
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Reason").fg(Color::Green),
            Cell::new("Files").fg(Color::Green),
        ]);
        for (reason, count) in count_by_reason(&summary.skipped_files) {
            table.add_row(vec![
                Cell::new(reason).fg(Color::Cyan),
                Cell::new(count).set_alignment(CellAlignment::Right),
            ]);
        }
        println!("{table}");
    }

    if !summary.failed_files.is_empty() {
        println!("\n{}", " Read Errors ".red().bold().underline());
        for failed in &summary.failed_files {
            println!(
                "- {} {}",
                relative_display(&summary.source_root, &failed.path).cyan(),
                failed.error.dimmed()
            );
        }
    }
    println!();
}

/// The plan as a serializable report with paths relative to the source.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanReport {
    pub source_root: String,
    pub total_bytes: u64,
    pub included: Vec<PlannedFile>,
    pub skipped_folders: Vec<PlannedSkip>,
    pub skipped_files: Vec<PlannedSkip>,
}

#[derive(Debug, Serialize)]
pub struct PlannedFile {
    pub path: String,
    pub bytes: u64,
}

#[derive(Debug, Serialize)]
pub struct PlannedSkip {
    pub path: String,
    pub reason: SkipReason,
}

impl PlanReport {
    pub fn new(plan: &Plan, source_root: &Path) -> Self {
        let skip = |r: &SkipRecord| PlannedSkip {
            path: relative_display(source_root, &r.path),
            reason: r.reason,
        };
        Self {
            source_root: source_root.display().to_string(),
            total_bytes: plan.total_bytes(),
            included: plan
                .candidates
                .iter()
                .map(|c| PlannedFile {
                    path: relative_display(source_root, &c.path),
                    bytes: c.size,
                })
                .collect(),
            skipped_folders: plan.skipped_folders.iter().map(skip).collect(),
            skipped_files: plan.skipped_files.iter().map(skip).collect(),
        }
    }
}

pub fn print_plan_pretty(report: &PlanReport) {
    println!(
        "{}",
        format!("\n--- Files To Combine ({}) ---", report.included.len())
            .green()
            .bold()
            .underline()
    );
    if report.included.is_empty() {
        println!("{}", "(None)".dimmed());
    } else {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Path").fg(Color::Green),
            Cell::new("Size").fg(Color::Green),
        ]);
        for file in &report.included {
            table.add_row(vec![
                Cell::new(&file.path).fg(Color::Cyan),
                Cell::new(human_size(file.bytes))
                    .set_alignment(CellAlignment::Right)
                    .fg(Color::DarkGrey),
            ]);
        }
        println!("{table}");
        println!("{:<20} {}", "Total Size:".green(), human_size(report.total_bytes).cyan());
    }

    println!("{}", "\n--- Skipped Folders ---".green().bold().underline());
    if report.skipped_folders.is_empty() {
        println!("{}", "(None)".dimmed());
    }
    for skip in &report.skipped_folders {
        println!("- {}", skip.path.cyan());
    }

    println!("{}", "\n--- Skipped Files ---".green().bold().underline());
    if report.skipped_files.is_empty() {
        println!("{}", "(None)".dimmed());
    } else {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec![
            Cell::new("Path").fg(Color::Green),
            Cell::new("Reason").fg(Color::Green),
        ]);
        for skip in &report.skipped_files {
            table.add_row(vec![
                Cell::new(&skip.path).fg(Color::Cyan),
                Cell::new(skip.reason).fg(reason_color(skip.reason)),
            ]);
        }
        println!("{table}");
    }
    println!();
}
