use crate::aggregate::{Aggregator, SkipLog, SkipRecorder};
use crate::archive;
use crate::config::{BlockOrder, RunConfig};
use crate::error::{AppError, Result};
use crate::filter::{FilterEngine, SkipReason};
use crate::layout;
use crate::pool::{ProcessingOutcome, Worker, WorkerPool};
use crate::summary::{ArchiveStatus, FailedFile, RunStatus, RunSummary, SkipRecord};
use crate::walk::{Candidate, TreeWalker, WalkEvent};
use chrono::Local;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

/// What a run would process, without reading or writing anything.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub candidates: Vec<Candidate>,
    pub skipped_folders: Vec<SkipRecord>,
    pub skipped_files: Vec<SkipRecord>,
}

impl Plan {
    pub fn total_bytes(&self) -> u64 {
        self.candidates.iter().map(|c| c.size).sum()
    }
}

pub fn plan(config: &RunConfig) -> Plan {
    let log = Mutex::new(SkipLog::default());
    let candidates = collect_candidates(config, None, &log);
    let log = log.into_inner().unwrap_or_else(PoisonError::into_inner);
    Plan {
        candidates,
        skipped_folders: log.folders,
        skipped_files: log.files,
    }
}

/// Runs the whole pipeline into `config.output`, then archives it if asked.
///
/// Nothing is created before the config has been resolved, so an invalid
/// configuration never leaves a partial artifact behind.
pub fn run(config: &RunConfig) -> Result<RunSummary> {
    log::info!(
        "Combining files from {} into {}",
        config.source_root.display(),
        config.output.display()
    );
    if let Some(parent) = config.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| AppError::DirCreation {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let file = File::create(&config.output).map_err(|e| AppError::OutputOpen {
        path: config.output.clone(),
        source: e,
    })?;
    let artifact = config.output.canonicalize().ok();

    let (mut summary, writer) = execute(config, BufWriter::new(file), artifact)?;
    drop(writer);
    summary.output = Some(config.output.clone());

    if config.archive && summary.status == RunStatus::Completed {
        summary.archive = Some(match archive::create_archive(&config.output) {
            Ok(path) => ArchiveStatus::Created { path },
            Err(e) => {
                log::error!("Failed to create zip archive: {}", e);
                ArchiveStatus::Failed {
                    path: archive::archive_path(&config.output),
                    error: e.to_string(),
                }
            }
        });
    }

    log::info!(
        "Processed {} of {} candidate files ({} bytes)",
        summary.files_processed,
        summary.candidates,
        summary.total_bytes
    );
    Ok(summary)
}

/// Runs the pipeline into an arbitrary writer and hands the writer back.
/// No archive is produced and no path is treated as the artifact.
pub fn run_with_writer<W>(config: &RunConfig, writer: W) -> Result<(RunSummary, W)>
where
    W: Write + Send + 'static,
{
    execute(config, writer, None)
}

fn execute<W>(config: &RunConfig, writer: W, artifact: Option<PathBuf>) -> Result<(RunSummary, W)>
where
    W: Write + Send + 'static,
{
    let config = Arc::new(config.clone());
    let aggregator = Arc::new(Aggregator::new(writer, config.output.clone()));
    aggregator.write_section(&layout::render_header(&config, Local::now()))?;

    let candidates = collect_candidates(&config, artifact, aggregator.as_ref());
    let mut tally = Tally {
        candidates: candidates.len(),
        ..Tally::default()
    };

    let status = if candidates.is_empty() {
        log::info!("No files matched; nothing to process.");
        RunStatus::NothingToDo
    } else {
        dispatch(&config, &aggregator, candidates, &mut tally)?;
        RunStatus::Completed
    };

    let skips = aggregator.take_skip_log();
    let summary = tally.into_summary(status, config.source_root.clone(), skips);
    if config.toggles.write_summary {
        aggregator.write_section(&layout::render_summary(&summary, &config))?;
    }
    aggregator.flush()?;
    let writer = aggregator.take_writer()?;
    Ok((summary, writer))
}

/// Paths the run itself produces, which must never be read back in.
fn own_artifacts(config: &RunConfig, artifact: Option<PathBuf>) -> Vec<PathBuf> {
    let Some(artifact) = artifact else {
        return Vec::new();
    };
    let mut paths = Vec::with_capacity(2);
    if config.archive {
        paths.push(archive::archive_path(&artifact));
    }
    paths.push(artifact);
    paths
}

fn collect_candidates<R>(config: &RunConfig, artifact: Option<PathBuf>, recorder: &R) -> Vec<Candidate>
where
    R: SkipRecorder + ?Sized,
{
    let engine = FilterEngine::new(config);
    let walker = TreeWalker::new(config).ignoring(own_artifacts(config, artifact));
    let mut candidates = Vec::new();

    for event in walker.walk() {
        match event {
            WalkEvent::File(candidate) => match engine.check(&candidate) {
                Ok(()) => candidates.push(candidate),
                Err(reason) => recorder.record_skipped_file(SkipRecord::new(candidate.path, reason)),
            },
            WalkEvent::Unreadable { path, .. } => {
                let reason = engine.check_unreadable(&path);
                recorder.record_skipped_file(SkipRecord::new(path, reason));
            }
            WalkEvent::UnreadableDir { path, .. } => {
                recorder
                    .record_skipped_folder(SkipRecord::new(path, SkipReason::MetadataUnavailable));
            }
            WalkEvent::Special(path) => {
                let reason = engine.check_special(&path);
                recorder.record_skipped_file(SkipRecord::new(path, reason));
            }
            WalkEvent::PrunedDir(path) => {
                recorder.record_skipped_folder(SkipRecord::new(path, SkipReason::ExcludedFolder));
            }
            WalkEvent::PrunedFile(path) => {
                recorder.record_skipped_file(SkipRecord::new(path, SkipReason::ExcludedFolder));
            }
            WalkEvent::Symlink(path) => {
                recorder.record_skipped_file(SkipRecord::new(path, SkipReason::Symlink));
            }
            WalkEvent::Ignored(path) => {
                recorder.record_skipped_file(SkipRecord::new(path, SkipReason::OutputArtifact));
            }
        }
    }

    log::info!("Found {} candidate files", candidates.len());
    candidates
}

/// Feeds every candidate through the pool. All results are drained even
/// after an output failure; the first such failure is returned.
fn dispatch<W>(
    config: &Arc<RunConfig>,
    aggregator: &Arc<Aggregator<W>>,
    candidates: Vec<Candidate>,
    tally: &mut Tally,
) -> Result<()>
where
    W: Write + Send + 'static,
{
    let pool = WorkerPool::new(config.workers)?;
    let worker = Arc::new(Worker::new(Arc::clone(config), Arc::clone(aggregator)));
    log::debug!(
        "Dispatching {} files to {} workers ({:?} order)",
        candidates.len(),
        pool.size(),
        config.block_order
    );

    let mut fatal = None;
    match config.block_order {
        BlockOrder::Completion => {
            let job_worker = Arc::clone(&worker);
            let results = pool.dispatch(candidates, move |c| job_worker.process(c));
            for (_, result) in results {
                tally.absorb(result, &mut fatal);
            }
        }
        BlockOrder::Traversal => {
            let job_worker = Arc::clone(&worker);
            pool.dispatch_ordered(
                candidates,
                config.workers,
                move |c| job_worker.prepare(c),
                |prepared| tally.absorb(worker.deliver(prepared), &mut fatal),
            );
        }
    }

    match fatal {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[derive(Default)]
struct Tally {
    candidates: usize,
    files_processed: usize,
    total_bytes: u64,
    processed: Vec<PathBuf>,
    failed: Vec<FailedFile>,
}

impl Tally {
    fn absorb(&mut self, result: Result<ProcessingOutcome>, fatal: &mut Option<AppError>) {
        match result {
            Ok(outcome) if outcome.processed => {
                self.files_processed += 1;
                self.total_bytes += outcome.bytes_read;
                self.processed.push(outcome.path);
            }
            Ok(outcome) => self.failed.push(FailedFile {
                path: outcome.path,
                error: outcome.error.map(|f| f.message).unwrap_or_default(),
            }),
            Err(e) => {
                if fatal.is_none() {
                    log::error!("Output failed: {}", e);
                    *fatal = Some(e);
                } else {
                    log::debug!("Discarding further output error: {}", e);
                }
            }
        }
    }

    fn into_summary(mut self, status: RunStatus, source_root: PathBuf, skips: SkipLog) -> RunSummary {
        self.processed.sort();
        self.failed.sort_by(|a, b| a.path.cmp(&b.path));
        RunSummary {
            status,
            source_root,
            output: None,
            candidates: self.candidates,
            files_processed: self.files_processed,
            total_bytes: self.total_bytes,
            processed_files: self.processed,
            failed_files: self.failed,
            skipped_folders: skips.folders,
            skipped_files: skips.files,
            archive: None,
        }
    }
}
