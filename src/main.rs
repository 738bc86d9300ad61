//! Command-line entry point for a single batch run.
//!
//! Credentials come from the environment (`API_KEY_YANDEX`, `FOLDER_ID`);
//! paths and thresholds from flags. Exit code 1 on any startup or batch
//! failure.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use medscrub::config::PipelineConfig;
use medscrub::db::{open_database, SqlitePatientStore};
use medscrub::pipeline::llm::{LlmSettings, YandexGptClient};
use medscrub::pipeline::loader::PlainTextLoader;
use medscrub::pipeline::morphology::RussianMorph;
use medscrub::pipeline::runner::BatchRunner;

#[derive(Parser, Debug)]
#[command(name = "medscrub", version, about = "De-identify a batch of clinical discharge summaries")]
struct Cli {
    /// Region the batch originates from; part of the patient identity
    #[arg(long)]
    region: String,

    /// Directory with the source documents; cleared after the run
    #[arg(long, default_value = "input")]
    input_dir: PathBuf,

    /// Directory for the sanitized texts
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// SQLite database file
    #[arg(long, default_value = "patients.db")]
    db_path: PathBuf,

    /// Process documents whose content was already seen
    #[arg(long)]
    allow_duplicates: bool,

    /// Model calls allowed per document
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Model name within the Yandex folder
    #[arg(long)]
    model: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Batch run failed");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let api_key = std::env::var("API_KEY_YANDEX")
        .map_err(|_| "API_KEY_YANDEX is not set in the environment")?;
    let folder_id =
        std::env::var("FOLDER_ID").map_err(|_| "FOLDER_ID is not set in the environment")?;

    let mut llm_settings = LlmSettings::default();
    if let Some(model) = cli.model {
        llm_settings.model = model;
    }

    let config = PipelineConfig {
        input_dir: cli.input_dir,
        output_dir: cli.output_dir,
        db_path: cli.db_path,
        region: cli.region,
        max_attempts: cli.max_attempts,
        allow_duplicates: cli.allow_duplicates,
        llm: llm_settings.clone(),
        ..PipelineConfig::default()
    };

    let conn = open_database(&config.db_path)?;
    let store = SqlitePatientStore;
    let llm = YandexGptClient::new(api_key, folder_id, llm_settings);
    let extractor = PlainTextLoader::new();
    let morph = RussianMorph::new();

    let runner = BatchRunner::new(&store, &llm, &extractor, &morph, &config);
    let summary = runner.run(&conn)?;

    info!(
        total = summary.total,
        accepted = summary.accepted,
        rejected = summary.rejected,
        duplicates = summary.duplicates_skipped,
        non_epicrisis = summary.non_epicrisis,
        errors = summary.errors,
        "Run complete"
    );
    Ok(())
}
