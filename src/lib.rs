//! medscrub — batch de-identification for Russian clinical discharge and
//! death summaries (epicrises).
//!
//! A run walks an input directory and, per document: detects duplicate
//! content against a persisted hash ledger, classifies the text as an
//! epicrisis, extracts the structured fields through a language model with
//! validation-driven retries, derives a deterministic pseudonymous patient
//! identifier (UIN) and the readmission flag, and writes a sanitized copy
//! of the source text with all personal values removed. Structured fields
//! land in SQLite; sanitized texts land in the output directory keyed by a
//! fresh per-document UUID.

pub mod config;
pub mod db;
pub mod pipeline;
