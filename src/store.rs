use crate::model::{RawFragment, Snapshot};
use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    if !path.exists() {
        return Ok(Snapshot::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot file {}", path.display()))?;
    let snapshot = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse snapshot file {}", path.display()))?;
    Ok(snapshot)
}

/// Replaces the stored snapshot wholesale.
pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    write_json(path, snapshot)
}

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let serialized = serde_json::to_string_pretty(value)?;
    std::fs::write(path, serialized)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// Reads every `*.json` file under `dir` as an array of fragments. Files are
/// visited in path order so a batch always loads the same way.
pub fn load_fragments_from_dir(dir: &Path) -> Result<Vec<RawFragment>> {
    if !dir.exists() {
        bail!("fragments dir does not exist: {}", dir.display());
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        paths.push(path.to_path_buf());
    }
    paths.sort();

    let mut fragments = Vec::new();
    for path in paths {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read fragment file {}", path.display()))?;
        let batch: Vec<RawFragment> = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse fragment file {}", path.display()))?;
        debug!(file = %path.display(), fragments = batch.len(), "loaded fragment file");
        fragments.extend(batch);
    }

    Ok(fragments)
}
