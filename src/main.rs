//! `contact-metadata`: apply a batch of metadata writes from a JSON file.
//!
//! Usage: `contact-metadata <batch.json>`
//!
//! The file holds an array of operations (`{"op": "insert", ...}`). Results
//! are printed to stdout as JSON; a rejected batch prints its error report
//! and exits with status 1.

use std::process::ExitCode;

use anyhow::Context;

use contact_metadata_lib::config::load_config;
use contact_metadata_lib::error::ErrorReport;
use contact_metadata_lib::metadata::MetadataOperation;
use contact_metadata_lib::provider::ContactMetadataProvider;

fn main() -> anyhow::Result<ExitCode> {
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {e}"))?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_filter.as_str()),
    )
    .init();

    let batch_path = std::env::args()
        .nth(1)
        .context("usage: contact-metadata <batch.json>")?;
    let content = std::fs::read_to_string(&batch_path)
        .with_context(|| format!("Failed to read {batch_path}"))?;
    let operations: Vec<MetadataOperation> =
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {batch_path}"))?;

    let provider = ContactMetadataProvider::open(&config).context("Failed to open database")?;
    log::info!("Applying {} operation(s) from {}", operations.len(), batch_path);

    match provider.apply_batch(&operations) {
        Ok(results) => {
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            log::warn!("Batch rejected: {e}");
            println!("{}", serde_json::to_string_pretty(&ErrorReport::from(&e))?);
            Ok(ExitCode::FAILURE)
        }
    }
}
