use crate::aggregate::{Aggregator, Block};
use crate::config::{RunConfig, Toggles};
use crate::error::Result;
use crate::layout;
use crate::walk::Candidate;
use once_cell::sync::Lazy;
use rayon::{ThreadPool, ThreadPoolBuilder};
use regex::Regex;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write};
use std::iter;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::vec;

static BLOCK_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("block comment regex is valid"));

/// Fixed-size pool of worker threads.
///
/// At most `workers` jobs run at once; each job's input and working buffers
/// are released before its result is sent back.
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    pub fn new(workers: NonZeroUsize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.get())
            .thread_name(|i| format!("xfuse-worker-{}", i))
            .build()?;
        Ok(Self { pool })
    }

    pub fn size(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Queues one job per item and returns the results as `(index, result)`
    /// pairs in completion order. Iteration ends once every job has reported.
    pub fn dispatch<I, T, F>(&self, items: Vec<I>, job: F) -> Dispatch<'_, I, T, F>
    where
        I: Send + 'static,
        T: Send + 'static,
        F: Fn(&I) -> T + Send + Sync + 'static,
    {
        let mut dispatch = Dispatch::new(&self.pool, items, job);
        dispatch.submit(usize::MAX);
        dispatch
    }

    /// Runs `job` over `items` and hands every result to `deliver` in item
    /// order. Only `window` items past the last delivered one are queued or
    /// held at any time, so a slow early item cannot make the whole tree pile
    /// up in memory.
    pub fn dispatch_ordered<I, T, F, D>(
        &self,
        items: Vec<I>,
        window: NonZeroUsize,
        job: F,
        mut deliver: D,
    ) where
        I: Send + 'static,
        T: Send + 'static,
        F: Fn(&I) -> T + Send + Sync + 'static,
        D: FnMut(T),
    {
        let mut dispatch = Dispatch::new(&self.pool, items, job);
        dispatch.submit(window.get());
        let mut pending = BTreeMap::new();
        let mut next = 0;
        while let Some((index, result)) = dispatch.next() {
            pending.insert(index, result);
            while let Some(result) = pending.remove(&next) {
                next += 1;
                deliver(result);
                dispatch.submit(1);
            }
        }
    }
}

/// Jobs handed to a [`WorkerPool`] whose results have not all been received.
pub struct Dispatch<'p, I, T, F> {
    pool: &'p ThreadPool,
    items: iter::Enumerate<vec::IntoIter<I>>,
    job: Arc<F>,
    tx: mpsc::Sender<(usize, T)>,
    rx: mpsc::Receiver<(usize, T)>,
    outstanding: usize,
}

impl<'p, I, T, F> Dispatch<'p, I, T, F>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(&I) -> T + Send + Sync + 'static,
{
    fn new(pool: &'p ThreadPool, items: Vec<I>, job: F) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            pool,
            items: items.into_iter().enumerate(),
            job: Arc::new(job),
            tx,
            rx,
            outstanding: 0,
        }
    }

    /// Queues up to `count` more items and returns how many were queued.
    pub fn submit(&mut self, count: usize) -> usize {
        let mut queued = 0;
        while queued < count {
            let Some((index, item)) = self.items.next() else {
                break;
            };
            let job = Arc::clone(&self.job);
            let tx = self.tx.clone();
            self.pool.spawn(move || {
                let result = job(&item);
                drop(item);
                drop(job);
                if tx.send((index, result)).is_err() {
                    log::debug!("Result receiver dropped before job {} finished", index);
                }
            });
            queued += 1;
        }
        self.outstanding += queued;
        queued
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }
}

impl<I, T, F> Iterator for Dispatch<'_, I, T, F> {
    type Item = (usize, T);

    fn next(&mut self) -> Option<(usize, T)> {
        if self.outstanding == 0 {
            return None;
        }
        let received = self.rx.recv().ok()?;
        self.outstanding -= 1;
        Some(received)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadFailure {
    pub kind: io::ErrorKind,
    pub message: String,
}

impl From<&io::Error> for ReadFailure {
    fn from(e: &io::Error) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// What happened to one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingOutcome {
    pub path: PathBuf,
    pub processed: bool,
    pub bytes_read: u64,
    pub error: Option<ReadFailure>,
}

/// A candidate read and rendered, ready to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prepared {
    Block {
        path: PathBuf,
        block: Block,
        bytes_read: u64,
    },
    Failed {
        path: PathBuf,
        relative_path: String,
        failure: ReadFailure,
    },
}

/// Reads and renders candidates, then hands them to the aggregator.
pub struct Worker<W> {
    config: Arc<RunConfig>,
    aggregator: Arc<Aggregator<W>>,
}

impl<W: Write> Worker<W> {
    pub fn new(config: Arc<RunConfig>, aggregator: Arc<Aggregator<W>>) -> Self {
        Self { config, aggregator }
    }

    pub fn process(&self, candidate: &Candidate) -> Result<ProcessingOutcome> {
        let prepared = self.prepare(candidate);
        self.deliver(prepared)
    }

    pub fn prepare(&self, candidate: &Candidate) -> Prepared {
        let relative_path = layout::relative_display(&self.config.source_root, &candidate.path);
        let bytes = match fs::read(&candidate.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Error reading file {}: {}", candidate.path.display(), e);
                return Prepared::Failed {
                    path: candidate.path.clone(),
                    relative_path,
                    failure: ReadFailure::from(&e),
                };
            }
        };

        let bytes_read = bytes.len() as u64;
        let text = String::from_utf8_lossy(&bytes);
        let toggles = &self.config.toggles;
        let block = Block {
            header: layout::render_block_header(
                self.config.style,
                toggles,
                &relative_path,
                candidate.modified,
                bytes_read,
            ),
            language: toggles
                .syntax_fence
                .then(|| fence_language(&candidate.path)),
            body: render_body(&text, toggles),
        };
        log::trace!("Prepared {} ({} bytes)", relative_path, bytes_read);
        Prepared::Block {
            path: candidate.path.clone(),
            block,
            bytes_read,
        }
    }

    /// Appends a prepared candidate. A read failure becomes an error stub and
    /// a non-processed outcome; only output failures are returned as errors.
    pub fn deliver(&self, prepared: Prepared) -> Result<ProcessingOutcome> {
        match prepared {
            Prepared::Block {
                path,
                block,
                bytes_read,
            } => {
                self.aggregator.append_block(&block)?;
                Ok(ProcessingOutcome {
                    path,
                    processed: true,
                    bytes_read,
                    error: None,
                })
            }
            Prepared::Failed {
                path,
                relative_path,
                failure,
            } => {
                self.aggregator
                    .append_error_stub(&relative_path, &failure.message)?;
                Ok(ProcessingOutcome {
                    path,
                    processed: false,
                    bytes_read: 0,
                    error: Some(failure),
                })
            }
        }
    }
}

pub fn strip_block_comments(text: &str) -> Cow<'_, str> {
    BLOCK_COMMENT.replace_all(text, "")
}

/// Prefixes each line with its 1-based number, right-aligned to width 4.
pub fn number_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 4);
    for (i, line) in text.lines().enumerate() {
        let _ = writeln!(out, "{:4} | {}", i + 1, line);
    }
    out
}

/// The file's last extension without the dot, or empty.
pub fn fence_language(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Comment stripping runs before numbering, so numbers refer to the
/// stripped text.
pub fn render_body(text: &str, toggles: &Toggles) -> String {
    let text = if toggles.strip_block_comments {
        strip_block_comments(text)
    } else {
        Cow::Borrowed(text)
    };
    if toggles.line_numbers {
        number_lines(&text)
    } else {
        text.into_owned()
    }
}
