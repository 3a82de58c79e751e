use crate::config::MatcherConfig;
use crate::model::{CanonicalProduct, MatchGroup, PairScore};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use strsim::normalized_levenshtein;
use tracing::debug;

/// Groups products from different sites that name the same item.
///
/// Every cross-site pair is scored with [`token_sort_ratio`]; pairs scoring
/// above the configured threshold are accepted strongest first, with the
/// lexicographically smaller name anchoring ties. Accepting a pair merges the
/// two products' groups unless the merge would put two listings from one site
/// together. Products that never pair up come back as singleton groups.
pub fn match_products(products: &[CanonicalProduct], config: &MatcherConfig) -> Vec<MatchGroup> {
    let keys = products
        .iter()
        .map(|p| sorted_token_key(&p.name))
        .collect::<Vec<_>>();

    let mut candidates = Vec::new();
    for left in 0..products.len() {
        for right in (left + 1)..products.len() {
            if products[left].site == products[right].site {
                continue;
            }
            let score = key_similarity(&keys[left], &keys[right]);
            if score > config.threshold {
                candidates.push(PairScore { left, right, score });
            }
        }
    }

    candidates.sort_by(|a, b| compare_candidates(products, a, b));

    let mut group_of = (0..products.len()).collect::<Vec<_>>();
    let mut pending = products
        .iter()
        .enumerate()
        .map(|(idx, p)| PendingGroup {
            members: vec![idx],
            sites: BTreeSet::from([p.site.as_str()]),
            pairs: Vec::new(),
        })
        .collect::<Vec<_>>();

    for pair in candidates {
        let target = group_of[pair.left];
        let source = group_of[pair.right];

        if target == source {
            pending[target].pairs.push(pair);
            continue;
        }
        if !pending[target].sites.is_disjoint(&pending[source].sites) {
            debug!(
                left = %products[pair.left].name,
                right = %products[pair.right].name,
                score = pair.score,
                "pair rejected; groups already share a site"
            );
            continue;
        }

        debug!(
            left = %products[pair.left].name,
            right = %products[pair.right].name,
            score = pair.score,
            "pair accepted"
        );

        let absorbed = std::mem::take(&mut pending[source]);
        for member in &absorbed.members {
            group_of[*member] = target;
        }
        let group = &mut pending[target];
        group.members.extend(absorbed.members);
        group.sites.extend(absorbed.sites);
        group.pairs.extend(absorbed.pairs);
        group.pairs.push(pair);
    }

    let mut finished = pending
        .into_iter()
        .filter(|g| !g.members.is_empty())
        .map(|mut g| {
            g.members.sort_unstable();
            g
        })
        .collect::<Vec<_>>();
    finished.sort_by(|a, b| anchor(products, a).cmp(&anchor(products, b)));

    finished
        .into_iter()
        .enumerate()
        .map(|(idx, g)| MatchGroup {
            group_id: format!("grp-{:04}", idx + 1),
            members: g.members,
            pairs: g.pairs,
        })
        .collect()
}

/// Writes each group's id onto its member products.
pub fn assign_match_groups(products: &mut [CanonicalProduct], groups: &[MatchGroup]) {
    for group in groups {
        for member in &group.members {
            if let Some(product) = products.get_mut(*member) {
                product.match_group = Some(group.group_id.clone());
            }
        }
    }
}

/// Word-order-insensitive similarity on a 0–100 scale.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    key_similarity(&sorted_token_key(a), &sorted_token_key(b))
}

#[derive(Default)]
struct PendingGroup<'a> {
    members: Vec<usize>,
    sites: BTreeSet<&'a str>,
    pairs: Vec<PairScore>,
}

fn compare_candidates(products: &[CanonicalProduct], a: &PairScore, b: &PairScore) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| pair_names(products, a).cmp(&pair_names(products, b)))
        .then_with(|| (a.left, a.right).cmp(&(b.left, b.right)))
}

fn pair_names<'a>(products: &'a [CanonicalProduct], pair: &PairScore) -> (&'a str, &'a str) {
    let left = products[pair.left].name.as_str();
    let right = products[pair.right].name.as_str();
    if left <= right {
        (left, right)
    } else {
        (right, left)
    }
}

fn anchor<'a>(
    products: &'a [CanonicalProduct],
    group: &PendingGroup<'_>,
) -> (&'a str, &'a str, usize) {
    group
        .members
        .iter()
        .map(|idx| {
            let p = &products[*idx];
            (p.name.as_str(), p.site.as_str(), *idx)
        })
        .min()
        .unwrap_or(("", "", usize::MAX))
}

fn sorted_token_key(text: &str) -> String {
    let cleaned = text
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect::<String>();
    let mut tokens = cleaned.split_whitespace().collect::<Vec<_>>();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn key_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    normalized_levenshtein(a, b) * 100.0
}
