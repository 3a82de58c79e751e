use crate::aggregate::aggregate;
use crate::config::{LoadedConfig, PipelineConfig, load_config};
use crate::matcher::{assign_match_groups, match_products};
use crate::model::{
    AggregationOutcome, BatchReport, CanonicalProduct, MatchGroup, RawFragment, Snapshot,
    SnapshotEntry,
};
use crate::normalize::normalize_all;
use crate::store::{load_fragments_from_dir, load_snapshot, save_snapshot, write_json};
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config_path: Option<PathBuf>,
    pub fragments_dir: PathBuf,
    pub snapshot_path: PathBuf,
    pub out_dir: PathBuf,
    pub site: Option<String>,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct PrepareOptions {
    pub config_path: Option<PathBuf>,
    pub fragments_dir: PathBuf,
    pub site: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BatchRun {
    pub report: BatchReport,
    pub products: Vec<CanonicalProduct>,
    pub groups: Vec<MatchGroup>,
    pub outcome: AggregationOutcome,
}

/// Runs one full batch: normalize every fragment, group listings across
/// sites, diff against the stored snapshot, write the outputs and replace the
/// snapshot.
pub fn run_batch(options: &RunOptions) -> Result<BatchRun> {
    let loaded = load_config(options.config_path.as_deref())?;
    let scope = Scope::new(&loaded.config, options.site.as_deref());

    info!(
        config = %config_label(&loaded),
        fragments_dir = %options.fragments_dir.display(),
        site = ?options.site,
        "batch start"
    );

    let fragments = load_fragments_from_dir(&options.fragments_dir)?;
    let mut report = BatchReport {
        fragments_loaded: fragments.len(),
        ..BatchReport::default()
    };

    let mut products = prepare_products(&loaded, &scope, fragments, &mut report);
    let groups = match_products(&products, &loaded.config.matcher);
    assign_match_groups(&mut products, &groups);
    report.match_groups = groups.len();
    report.matched_groups = groups.iter().filter(|g| !g.is_singleton()).count();

    info!(
        products = report.products,
        skipped = report.fragments_skipped,
        groups = report.match_groups,
        matched = report.matched_groups,
        "normalization and matching complete"
    );

    let stored = load_snapshot(&options.snapshot_path)?;
    let (previous, retained) = scope.split_snapshot(stored);
    let now = Utc::now();
    let outcome = aggregate(&previous, &products, now);

    let summary = &outcome.summary;
    info!(
        total = summary.total,
        price_up = summary.price_up,
        price_down = summary.price_down,
        no_change = summary.no_change,
        newly_found = summary.newly_found,
        not_found = summary.not_found,
        availability_changed = summary.availability_changed,
        data_quality_issue = summary.data_quality_issue,
        "aggregation complete"
    );

    if options.dry_run {
        info!("dry run enabled; outputs and snapshot not persisted");
    } else {
        write_json(&options.out_dir.join("products.json"), &products)?;
        write_json(&options.out_dir.join("matches.json"), &groups)?;
        write_json(&options.out_dir.join("changes.json"), &outcome)?;

        let mut replacement = Snapshot::from_products(&products, now);
        let mut entries = retained;
        entries.append(&mut replacement.entries);
        replacement.entries = entries;
        save_snapshot(&options.snapshot_path, &replacement).with_context(|| {
            format!(
                "failed to replace snapshot {}",
                options.snapshot_path.display()
            )
        })?;
        info!(snapshot = %options.snapshot_path.display(), "snapshot replaced");
    }

    Ok(BatchRun {
        report,
        products,
        groups,
        outcome,
    })
}

pub fn normalize_batch(options: &PrepareOptions) -> Result<Vec<CanonicalProduct>> {
    let loaded = load_config(options.config_path.as_deref())?;
    load_and_prepare(&loaded, options)
}

pub fn match_batch(options: &PrepareOptions) -> Result<(Vec<CanonicalProduct>, Vec<MatchGroup>)> {
    let loaded = load_config(options.config_path.as_deref())?;
    let mut products = load_and_prepare(&loaded, options)?;
    let groups = match_products(&products, &loaded.config.matcher);
    assign_match_groups(&mut products, &groups);
    Ok((products, groups))
}

pub fn validate_config(config_path: &Path) -> Result<Vec<String>> {
    let loaded = load_config(Some(config_path))?;
    let mut messages = vec![format!(
        "OK: matcher threshold {} ({})",
        loaded.config.matcher.threshold,
        config_label(&loaded)
    )];
    for site in &loaded.config.sites {
        let state = if site.enabled { "enabled" } else { "disabled" };
        messages.push(format!("OK: {} ({state})", site.key));
    }
    Ok(messages)
}

fn config_label(loaded: &LoadedConfig) -> String {
    loaded
        .path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "built-in defaults".to_string())
}

fn load_and_prepare(
    loaded: &LoadedConfig,
    options: &PrepareOptions,
) -> Result<Vec<CanonicalProduct>> {
    let scope = Scope::new(&loaded.config, options.site.as_deref());
    let fragments = load_fragments_from_dir(&options.fragments_dir)?;
    let mut report = BatchReport::default();
    Ok(prepare_products(loaded, &scope, fragments, &mut report))
}

fn prepare_products(
    loaded: &LoadedConfig,
    scope: &Scope<'_>,
    fragments: Vec<RawFragment>,
    report: &mut BatchReport,
) -> Vec<CanonicalProduct> {
    let mut accepted = Vec::with_capacity(fragments.len());
    for mut fragment in fragments {
        if !scope.includes(&fragment.site) {
            report.fragments_skipped += 1;
            continue;
        }

        match loaded.config.site(&fragment.site) {
            Some(site) => {
                if fragment.brand.is_none() {
                    fragment.brand = site.brand.clone();
                }
            }
            None if !loaded.config.sites.is_empty() => {
                warn!(site = %fragment.site, "fragment from unconfigured site");
            }
            None => {}
        }

        accepted.push(fragment);
    }

    let products = normalize_all(&accepted);
    report.products = products.len();
    products
}

/// Which sites a run covers: the `--site` filter, minus disabled sites.
struct Scope<'a> {
    config: &'a PipelineConfig,
    only: Option<&'a str>,
}

impl<'a> Scope<'a> {
    fn new(config: &'a PipelineConfig, only: Option<&'a str>) -> Self {
        Self { config, only }
    }

    fn includes(&self, site: &str) -> bool {
        if self.only.is_some_and(|only| only != site) {
            return false;
        }
        self.config.site(site).is_none_or(|s| s.enabled)
    }

    /// Splits a stored snapshot into the part this run diffs against and the
    /// part it must carry over untouched.
    fn split_snapshot(&self, stored: Snapshot) -> (Snapshot, Vec<SnapshotEntry>) {
        let (in_scope, retained): (Vec<_>, Vec<_>) = stored
            .entries
            .into_iter()
            .partition(|entry| self.includes(&entry.site));
        (
            Snapshot {
                schema_version: stored.schema_version,
                captured_at: stored.captured_at,
                entries: in_scope,
            },
            retained,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MatcherConfig, SiteConfig};

    fn config() -> PipelineConfig {
        PipelineConfig {
            matcher: MatcherConfig::default(),
            sites: vec![
                SiteConfig {
                    key: "prist".to_string(),
                    name: "Прист".to_string(),
                    enabled: true,
                    brand: None,
                },
                SiteConfig {
                    key: "keysight".to_string(),
                    name: "Keysight".to_string(),
                    enabled: false,
                    brand: Some("Keysight".to_string()),
                },
            ],
        }
    }

    #[test]
    fn scope_excludes_disabled_and_filtered_sites() {
        let config = config();
        let all = Scope::new(&config, None);
        assert!(all.includes("prist"));
        assert!(all.includes("unlisted"));
        assert!(!all.includes("keysight"));

        let only = Scope::new(&config, Some("prist"));
        assert!(only.includes("prist"));
        assert!(!only.includes("unlisted"));
    }
}
