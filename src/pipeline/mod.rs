pub mod classify;
pub mod identity;
pub mod llm;
pub mod loader;
pub mod morphology;
pub mod parser;
pub mod prompt;
pub mod retry;
pub mod runner;
pub mod sanitize;
pub mod types;
pub mod validators;

pub use types::*;

use thiserror::Error;

use crate::db::DatabaseError;
use loader::ExtractError;

/// Errors crossing the per-file processing boundary. The batch runner
/// converts every one of these into an error record and moves on to the
/// next file; none of them aborts the run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Text extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
