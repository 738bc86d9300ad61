//! Pipeline configuration.
//!
//! One flat struct with working defaults; the binary overrides fields from
//! CLI flags and environment. Serde-derived so a config file can feed it
//! as well.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::pipeline::classify::ClassifierConfig;
use crate::pipeline::llm::LlmSettings;
use crate::pipeline::retry::DEFAULT_MAX_ATTEMPTS;
use crate::pipeline::validators::SNILS_NUMBER_FLOOR;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory scanned for input documents; cleared after a run.
    pub input_dir: PathBuf,
    /// Directory receiving the sanitized `{document_id}.txt` files.
    pub output_dir: PathBuf,
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Operator-supplied region, part of the patient identity triple.
    pub region: String,
    /// Model calls allowed per document.
    pub max_attempts: u32,
    /// Process documents whose content hash was already seen.
    pub allow_duplicates: bool,
    pub snils_floor: u64,
    pub classifier: ClassifierConfig,
    pub llm: LlmSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            db_path: PathBuf::from("patients.db"),
            region: String::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            allow_duplicates: false,
            snils_floor: SNILS_NUMBER_FLOOR,
            classifier: ClassifierConfig::default(),
            llm: LlmSettings::default(),
        }
    }
}
