use crate::model::ChangeKind;
use crate::pipeline::{RunOptions, run_batch};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use tempfile::Builder;
use tracing::info;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct HarnessOptions {
    pub config_path: Option<PathBuf>,
    pub fragments_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct HarnessReport {
    pub first_run_products: usize,
    pub first_run_newly_found: usize,
    pub first_run_data_quality_issue: usize,
    pub second_run_no_change: usize,
    pub second_run_changed: usize,
    pub second_run_data_quality_issue: usize,
    pub matched_groups: usize,
    pub output_files: usize,
}

/// Runs the same batch twice from an empty snapshot. A stable pipeline
/// reports everything as new on the first run and nothing changed on the
/// second.
///
/// Snapshot and outputs live in a scratch directory that is removed
/// afterwards; the configured state is never touched.
pub fn run_harness(options: &HarnessOptions) -> Result<HarnessReport> {
    let scratch = Builder::new()
        .prefix("pricewatch-harness")
        .tempdir()
        .context("failed to create harness scratch directory")?;
    let out_dir = scratch.path().join("out");
    info!(scratch = %scratch.path().display(), "harness start");

    let run_options = RunOptions {
        config_path: options.config_path.clone(),
        fragments_dir: options.fragments_dir.clone(),
        snapshot_path: scratch.path().join("state/snapshot.json"),
        out_dir: out_dir.clone(),
        site: None,
        dry_run: false,
    };

    let first = run_batch(&run_options)?;
    let second = run_batch(&run_options)?;

    let mut output_files = 0usize;
    for entry in WalkDir::new(&out_dir) {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|s| s.to_str()) == Some("json")
        {
            output_files += 1;
        }
    }

    let first_summary = &first.outcome.summary;
    let second_summary = &second.outcome.summary;
    Ok(HarnessReport {
        first_run_products: first.report.products,
        first_run_newly_found: first_summary.count(ChangeKind::NewlyFound),
        first_run_data_quality_issue: first_summary.count(ChangeKind::DataQualityIssue),
        second_run_no_change: second_summary.count(ChangeKind::NoChange),
        second_run_changed: second_summary.total
            - second_summary.count(ChangeKind::NoChange)
            - second_summary.count(ChangeKind::DataQualityIssue),
        second_run_data_quality_issue: second_summary.count(ChangeKind::DataQualityIssue),
        matched_groups: second.report.matched_groups,
        output_files,
    })
}
