//! Batch orchestrator: walks the input directory and runs every document
//! through dedup, classification, extraction, identity resolution and
//! sanitization, sequentially and in filename order.
//!
//! One bad document never aborts the batch. Documents that exhaust their
//! attempts are still persisted together with their failing report; only
//! the per-file error boundary (unreadable file, storage failure) skips a
//! document entirely, and that too is recorded in the error log.
//!
//! Each document writes through to the store immediately, so a crash
//! mid-run leaves every completed document durably recorded. Two runs
//! against the same store must not execute concurrently; this is not
//! enforced with locking.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::db::PatientStore;

use super::classify::{check_and_mark_duplicate, is_epicrisis};
use super::identity::{
    generate_document_id, generate_uin, hash_personal_data, resolve_readmission,
};
use super::llm::LlmClient;
use super::loader::TextExtractor;
use super::morphology::MorphAnalyzer;
use super::retry::ExtractionEngine;
use super::sanitize::DocumentSanitizer;
use super::types::{compute_age, Check, PatientRecord, ValidationReport};
use super::PipelineError;

/// Per-run counters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// Input files seen.
    pub total: usize,
    /// Documents accepted by validation and stored.
    pub accepted: usize,
    /// Documents stored with a failing report after exhausting attempts.
    pub rejected: usize,
    pub duplicates_skipped: usize,
    pub non_epicrisis: usize,
    /// Files skipped by the per-file error boundary.
    pub errors: usize,
}

pub struct BatchRunner<'a> {
    store: &'a dyn PatientStore,
    llm: &'a dyn LlmClient,
    extractor: &'a dyn TextExtractor,
    morph: &'a dyn MorphAnalyzer,
    config: &'a PipelineConfig,
}

impl<'a> BatchRunner<'a> {
    pub fn new(
        store: &'a dyn PatientStore,
        llm: &'a dyn LlmClient,
        extractor: &'a dyn TextExtractor,
        morph: &'a dyn MorphAnalyzer,
        config: &'a PipelineConfig,
    ) -> Self {
        Self {
            store,
            llm,
            extractor,
            morph,
            config,
        }
    }

    /// Process every file in the input directory, then clear it.
    pub fn run(&self, conn: &Connection) -> Result<BatchSummary, PipelineError> {
        let files = input_files(&self.config.input_dir)?;
        let mut summary = BatchSummary {
            total: files.len(),
            ..BatchSummary::default()
        };
        let mut known_uins = self.store.known_uins(conn)?;

        info!(files = files.len(), "Starting batch");

        for path in &files {
            match self.process_file(conn, path, &mut known_uins, &mut summary) {
                Ok(()) => {}
                Err(e) => {
                    error!(file = %path.display(), error = %e, "Document failed");
                    summary.errors += 1;
                    // Best effort: leave a trace even for boundary failures
                    let report = boundary_error_report(&e);
                    if let Err(log_err) =
                        self.store
                            .append_error_log(conn, &generate_document_id(), &report)
                    {
                        warn!(error = %log_err, "Could not record the failure");
                    }
                }
            }
        }

        clear_input_dir(&files);
        info!(?summary, "Batch finished");
        Ok(summary)
    }

    fn process_file(
        &self,
        conn: &Connection,
        path: &Path,
        known_uins: &mut HashSet<String>,
        summary: &mut BatchSummary,
    ) -> Result<(), PipelineError> {
        let document = self.extractor.extract(path)?;

        // The hash joins the ledger at check time regardless of the
        // duplicate policy; the flag only decides whether to skip
        let duplicate = check_and_mark_duplicate(self.store, conn, &document.content)?;
        if duplicate && !self.config.allow_duplicates {
            info!(file = %path.display(), "Duplicate content, skipping");
            summary.duplicates_skipped += 1;
            return Ok(());
        }

        if !is_epicrisis(&document.content, &self.config.classifier) {
            info!(file = %path.display(), "Not an epicrisis, skipping");
            let mut report = ValidationReport::new();
            report.set(Check::IsEpicrisis, false);
            self.store
                .append_error_log(conn, &generate_document_id(), &report.to_json())?;
            summary.non_epicrisis += 1;
            return Ok(());
        }

        let engine = ExtractionEngine::new(self.llm, self.config.max_attempts, self.config.snils_floor);
        let outcome = engine.extract(&document);
        let document_id = generate_document_id();

        let Some(fields) = outcome.record else {
            // No parsable model output in any attempt
            self.store
                .append_error_log(conn, &document_id, &outcome.report.to_json())?;
            summary.errors += 1;
            return Ok(());
        };

        let age = compute_age(&fields.birth_date, &fields.admission_date);
        let hashes = hash_personal_data(&fields.full_name, &fields.birth_date, &self.config.region);
        let uin = generate_uin(&hashes);
        let readmission = resolve_readmission(self.store, conn, known_uins, uin.as_deref())?;

        let sanitizer = DocumentSanitizer::new(self.morph);
        let sanitized = sanitizer.sanitize(
            &document.content,
            &fields,
            uin.as_deref(),
            &age,
            document.format,
        );
        write_sanitized(&self.config.output_dir, &document_id, &sanitized)?;

        // Report persisted for accepted documents too; the row and its
        // report are written exactly once per document
        self.store
            .append_error_log(conn, &document_id, &outcome.report.to_json())?;

        let record = PatientRecord {
            uin,
            document_id,
            fields,
            region: self.config.region.clone(),
            age_at_admission: age,
            readmission,
        };
        self.store.append_record(conn, &record)?;

        if outcome.accepted {
            summary.accepted += 1;
        } else {
            summary.rejected += 1;
        }
        info!(
            file = %path.display(),
            accepted = outcome.accepted,
            attempts = outcome.attempts,
            readmission,
            "Document processed"
        );
        Ok(())
    }
}

/// Error-log payload for a file the boundary rejected. Unsupported
/// formats are recorded under their named check; everything else under a
/// generic processing-error key.
fn boundary_error_report(error: &PipelineError) -> serde_json::Value {
    if let PipelineError::Extract(super::loader::ExtractError::UnsupportedFormat(_)) = error {
        let mut report = ValidationReport::new();
        report.set(Check::SupportedFormat, false);
        return report.to_json();
    }
    serde_json::json!({ "Ошибка обработки": error.to_string() })
}

/// Regular files in the input directory, sorted by name for a stable
/// processing order.
fn input_files(dir: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

fn write_sanitized(
    output_dir: &Path,
    document_id: &str,
    content: &str,
) -> Result<(), std::io::Error> {
    std::fs::create_dir_all(output_dir)?;
    std::fs::write(output_dir.join(format!("{document_id}.txt")), content)
}

/// The input directory holds transient source documents only; every file
/// that entered the run is removed once the batch ends, processed or not.
fn clear_input_dir(files: &[PathBuf]) {
    for path in files {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(file = %path.display(), error = %e, "Could not remove input file");
        }
    }
}
