use crate::model::{
    AggregationOutcome, AggregationSummary, AvailabilityState, CanonicalProduct, ChangeKind,
    ChangeRecord, Snapshot, SnapshotEntry, is_valid_price,
};
use crate::price::normalize_whitespace;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Identity used to pair a listing across snapshots: the explicit product id
/// when one is carried, otherwise the normalized name. Both are scoped by
/// site. `None` means the listing cannot be keyed at all.
pub fn identity_key(site: &str, product_id: Option<&str>, name: &str) -> Option<String> {
    let site = site.trim();
    if site.is_empty() {
        return None;
    }

    if let Some(id) = product_id.map(str::trim).filter(|v| !v.is_empty()) {
        return Some(format!("{site}::id:{id}"));
    }

    composite_key(site, name)
}

fn composite_key(site: &str, name: &str) -> Option<String> {
    let name = normalize_whitespace(name).to_lowercase();
    if name.is_empty() {
        return None;
    }
    Some(format!("{}::{name}", site.trim()))
}

/// Diffs `current` against the `previous` snapshot.
///
/// Output is sorted by identity key, so two runs over the same inputs produce
/// the same records apart from `timestamp`.
pub fn aggregate(
    previous: &Snapshot,
    current: &[CanonicalProduct],
    now: DateTime<Utc>,
) -> AggregationOutcome {
    let mut changes = Vec::new();

    let mut previous_index: HashMap<String, usize> = HashMap::new();
    let mut previous_by_name: HashMap<String, (String, usize)> = HashMap::new();
    for (idx, entry) in previous.entries.iter().enumerate() {
        let Some(key) = identity_key(&entry.site, entry.product_id.as_deref(), &entry.name) else {
            warn!(site = %entry.site, name = %entry.name, "previous entry has no usable key");
            changes.push(previous_only(
                malformed_key(entry),
                entry,
                ChangeKind::DataQualityIssue,
                now,
            ));
            continue;
        };
        if previous_index.contains_key(&key) {
            warn!(key = %key, "previous snapshot key collision");
            changes.push(previous_only(key, entry, ChangeKind::DataQualityIssue, now));
            continue;
        }
        if entry.product_id.as_deref().is_some_and(|id| !id.trim().is_empty())
            && let Some(name_key) = composite_key(&entry.site, &entry.name)
        {
            previous_by_name
                .entry(name_key)
                .or_insert_with(|| (key.clone(), idx));
        }
        previous_index.insert(key, idx);
    }

    let mut consumed = HashSet::new();
    let mut current_keys = HashSet::new();

    for product in current {
        let Some(own_key) =
            identity_key(&product.site, product.product_id.as_deref(), &product.name)
        else {
            warn!(
                site = %product.site,
                url = %product.source_url,
                "current record has no usable key"
            );
            changes.push(current_only(
                malformed_key_for(&product.site, &product.source_url),
                product,
                ChangeKind::DataQualityIssue,
                now,
            ));
            continue;
        };
        if !current_keys.insert(own_key.clone()) {
            warn!(key = %own_key, "current batch key collision");
            changes.push(current_only(own_key, product, ChangeKind::DataQualityIssue, now));
            continue;
        }

        let matched = find_previous(&previous_index, &previous_by_name, &own_key, product)
            .filter(|(_, idx)| !consumed.contains(idx));

        match matched {
            Some((key, idx)) => {
                consumed.insert(idx);
                changes.push(compare(key, &previous.entries[idx], product, now));
            }
            None => {
                changes.push(current_only(own_key, product, ChangeKind::NewlyFound, now));
            }
        }
    }

    let mut unmatched = previous_index
        .iter()
        .filter(|(_, idx)| !consumed.contains(*idx))
        .collect::<Vec<_>>();
    unmatched.sort();
    for (key, idx) in unmatched {
        changes.push(previous_only(
            key.clone(),
            &previous.entries[*idx],
            ChangeKind::NotFound,
            now,
        ));
    }

    changes.sort_by(|a, b| a.key.cmp(&b.key).then_with(|| a.kind.cmp(&b.kind)));

    let mut summary = AggregationSummary::new(now);
    for change in &changes {
        summary.record(change.kind);
    }
    summary.unknown_availability = current
        .iter()
        .filter(|p| p.availability == AvailabilityState::Unknown)
        .count();
    summary.absent_price = current.iter().filter(|p| p.price.is_none()).count();

    AggregationOutcome { changes, summary }
}

fn find_previous(
    index: &HashMap<String, usize>,
    by_name: &HashMap<String, (String, usize)>,
    own_key: &str,
    product: &CanonicalProduct,
) -> Option<(String, usize)> {
    if let Some(idx) = index.get(own_key) {
        return Some((own_key.to_string(), *idx));
    }

    // Ids may appear or disappear between runs; the same site and name still
    // identifies the listing.
    if product.product_id.is_some() {
        let fallback = composite_key(&product.site, &product.name)?;
        return index.get(&fallback).map(|idx| (fallback, *idx));
    }

    by_name.get(own_key).cloned()
}

fn compare(
    key: String,
    previous: &SnapshotEntry,
    current: &CanonicalProduct,
    now: DateTime<Utc>,
) -> ChangeRecord {
    let prices_valid = previous.price.is_none_or(is_valid_price) && current.has_valid_price();
    let availability_differs = previous.availability != current.availability;

    let (kind, delta, percent_delta) = if !prices_valid {
        (ChangeKind::DataQualityIssue, None, None)
    } else {
        match (previous.price, current.price) {
            (Some(before), Some(after)) => {
                let delta = after - before;
                let percent = (before != 0.0).then(|| delta * 100.0 / before);
                let kind = if delta > 0.0 {
                    ChangeKind::PriceUp
                } else if delta < 0.0 {
                    ChangeKind::PriceDown
                } else if availability_differs {
                    ChangeKind::AvailabilityChanged
                } else {
                    ChangeKind::NoChange
                };
                (kind, Some(delta), percent)
            }
            (Some(_), None) => (ChangeKind::NotFound, None, None),
            (None, Some(_)) => (ChangeKind::NewlyFound, None, None),
            (None, None) if availability_differs => (ChangeKind::AvailabilityChanged, None, None),
            (None, None) => (ChangeKind::NoChange, None, None),
        }
    };

    ChangeRecord {
        key,
        site: current.site.clone(),
        name: current.name.clone(),
        previous_price: previous.price,
        current_price: current.price,
        delta,
        percent_delta,
        previous_availability: Some(previous.availability),
        current_availability: Some(current.availability),
        kind,
        timestamp: now,
    }
}

fn previous_only(
    key: String,
    entry: &SnapshotEntry,
    kind: ChangeKind,
    now: DateTime<Utc>,
) -> ChangeRecord {
    ChangeRecord {
        key,
        site: entry.site.clone(),
        name: entry.name.clone(),
        previous_price: entry.price,
        current_price: None,
        delta: None,
        percent_delta: None,
        previous_availability: Some(entry.availability),
        current_availability: None,
        kind,
        timestamp: now,
    }
}

fn current_only(
    key: String,
    product: &CanonicalProduct,
    kind: ChangeKind,
    now: DateTime<Utc>,
) -> ChangeRecord {
    ChangeRecord {
        key,
        site: product.site.clone(),
        name: product.name.clone(),
        previous_price: None,
        current_price: product.price,
        delta: None,
        percent_delta: None,
        previous_availability: None,
        current_availability: Some(product.availability),
        kind,
        timestamp: now,
    }
}

fn malformed_key(entry: &SnapshotEntry) -> String {
    malformed_key_for(&entry.site, "")
}

fn malformed_key_for(site: &str, detail: &str) -> String {
    format!("{}::<unkeyed>{detail}", site.trim())
}
