pub mod aggregate;
pub mod archive;
pub mod config;
pub mod error;
pub mod filter;
pub mod layout;
pub mod pool;
pub mod run;
pub mod summary;
pub mod walk;

pub use aggregate::{Aggregator, Block, SkipLog, SkipRecorder};
pub use config::{BlockOrder, FuseConfig, LayoutStyle, RunConfig, Toggles};
pub use error::{AppError, Result};
pub use filter::{ExecutablePolicy, FilterEngine, SkipReason, should_include};
pub use pool::{Dispatch, ProcessingOutcome, Worker, WorkerPool};
pub use run::{Plan, plan, run, run_with_writer};
pub use summary::{ArchiveStatus, FailedFile, RunStatus, RunSummary, SkipRecord};
pub use walk::{Candidate, TreeWalker, WalkEvent};
