use crate::error::{AppError, Result};
use crate::layout;
use crate::summary::SkipRecord;
use std::io::{self, Write};
use std::mem;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// One file's rendered contribution to the artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: String,
    /// Fence label; `None` writes the body unfenced.
    pub language: Option<String>,
    pub body: String,
}

impl Block {
    fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(self.header.as_bytes())?;
        if let Some(language) = &self.language {
            writeln!(out, "{}{}", layout::FENCE, language)?;
        }
        out.write_all(self.body.as_bytes())?;
        if self.language.is_some() {
            if !self.body.is_empty() && !self.body.ends_with('\n') {
                out.write_all(b"\n")?;
            }
            writeln!(out, "{}", layout::FENCE)?;
        }
        out.write_all(b"\n")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipLog {
    pub folders: Vec<SkipRecord>,
    pub files: Vec<SkipRecord>,
}

/// Somewhere to report excluded folders and files as they are found.
pub trait SkipRecorder {
    fn record_skipped_folder(&self, record: SkipRecord);
    fn record_skipped_file(&self, record: SkipRecord);
}

impl SkipRecorder for Mutex<SkipLog> {
    fn record_skipped_folder(&self, record: SkipRecord) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .folders
            .push(record);
    }

    fn record_skipped_file(&self, record: SkipRecord) {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .files
            .push(record);
    }
}

struct OutputSink<W> {
    writer: Option<W>,
    failed: bool,
}

/// Owns the output writer. Every append holds the sink lock for its whole
/// duration, so blocks from concurrent workers never interleave.
pub struct Aggregator<W> {
    label: PathBuf,
    sink: Mutex<OutputSink<W>>,
    skips: Mutex<SkipLog>,
}

impl<W: Write> Aggregator<W> {
    pub fn new(writer: W, label: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            sink: Mutex::new(OutputSink {
                writer: Some(writer),
                failed: false,
            }),
            skips: Mutex::new(SkipLog::default()),
        }
    }

    pub fn write_section(&self, text: &str) -> Result<()> {
        self.with_writer(|w| w.write_all(text.as_bytes()))
    }

    pub fn append_block(&self, block: &Block) -> Result<()> {
        self.with_writer(|w| block.write_to(w))
    }

    pub fn append_error_stub(&self, relative_path: &str, error: &str) -> Result<()> {
        let stub = layout::render_error_stub(relative_path, error);
        self.with_writer(|w| w.write_all(stub.as_bytes()))
    }

    pub fn flush(&self) -> Result<()> {
        self.with_writer(|w| w.flush())
    }

    pub fn take_skip_log(&self) -> SkipLog {
        mem::take(&mut *self.skips.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Hands the writer back. Later appends fail with `OutputAborted`.
    pub fn take_writer(&self) -> Result<W> {
        let mut sink = self
            .sink
            .lock()
            .map_err(|_| AppError::OutputAborted(self.label.clone()))?;
        sink.writer
            .take()
            .ok_or_else(|| AppError::OutputAborted(self.label.clone()))
    }

    fn with_writer(&self, op: impl FnOnce(&mut W) -> io::Result<()>) -> Result<()> {
        let mut sink = self
            .sink
            .lock()
            .map_err(|_| AppError::OutputAborted(self.label.clone()))?;
        if sink.failed {
            return Err(AppError::OutputAborted(self.label.clone()));
        }
        let Some(writer) = sink.writer.as_mut() else {
            return Err(AppError::OutputAborted(self.label.clone()));
        };
        if let Err(e) = op(writer) {
            log::error!("Write to {} failed: {}", self.label.display(), e);
            sink.failed = true;
            return Err(AppError::OutputWrite {
                path: self.label.clone(),
                source: e,
            });
        }
        Ok(())
    }
}

impl<W> SkipRecorder for Aggregator<W> {
    fn record_skipped_folder(&self, record: SkipRecord) {
        self.skips.record_skipped_folder(record);
    }

    fn record_skipped_file(&self, record: SkipRecord) {
        self.skips.record_skipped_file(record);
    }
}
