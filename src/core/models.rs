//! Core data models for a pipeline run

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::processors::validate::ValidationReport;

/// Outcome of one translation task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskOutcome {
    /// Output written with new content
    Translated,
    /// Output already held identical content
    Unchanged,
    /// Destination was up to date
    Skipped,
    /// Read or write failed
    Failed,
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::Translated => write!(f, "translated"),
            TaskOutcome::Unchanged => write!(f, "unchanged"),
            TaskOutcome::Skipped => write!(f, "skipped"),
            TaskOutcome::Failed => write!(f, "failed"),
        }
    }
}

/// One unit of work: a single source file
#[derive(Debug, Clone)]
pub struct TranslationTask {
    /// File under the content root
    pub source: PathBuf,
    /// Mirrored file under the docs root
    pub destination: PathBuf,
    /// Path relative to both roots, `/`-separated
    pub relative: String,
    /// Destination missing or older than the source
    pub stale: bool,
    /// Set once the task has run
    pub outcome: Option<TaskOutcome>,
}

impl TranslationTask {
    /// Stale task with no outcome yet
    pub fn new(source: PathBuf, destination: PathBuf, relative: String) -> Self {
        Self {
            source,
            destination,
            relative,
            stale: true,
            outcome: None,
        }
    }
}

/// Category of a per-file error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Translation fell back to the source text
    Translation,
    /// Reading or writing the file failed
    Io,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Translation => write!(f, "translation"),
            FailureKind::Io => write!(f, "io"),
        }
    }
}

/// A per-file error recorded during a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileFailure {
    /// Path relative to the tree root
    pub file: String,
    /// What failed
    pub kind: FailureKind,
    /// Error text
    pub message: String,
}

/// Aggregate result of a run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Files read and rendered
    pub processed: usize,
    /// Files whose output was rewritten
    pub changed: usize,
    /// Files already up to date
    pub skipped: usize,
    /// Per-file failures, in completion order
    pub errors: Vec<FileFailure>,
    /// Translations held in the cache after the run
    pub cache_entries: usize,
    /// Set when the cache could not be saved; outputs are still valid
    pub cache_error: Option<String>,
    /// Present when the run changed something
    pub validation: Option<ValidationReport>,
}

impl RunSummary {
    /// Number of per-file errors
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Whether any output file was rewritten
    pub fn has_changes(&self) -> bool {
        self.changed > 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed: {}, changed: {}, skipped: {}, errors: {}",
            self.processed,
            self.changed,
            self.skipped,
            self.errors.len()
        )
    }
}
