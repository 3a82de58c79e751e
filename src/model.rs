use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Text fragments captured for one listing by the page-fetch layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawFragment {
    pub site: String,
    #[serde(default)]
    pub product_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub price_text: String,
    #[serde(default)]
    pub availability_text: String,
    pub source_url: String,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AvailabilityState {
    InStock,
    PreOrder,
    OutOfStock,
    RequestPrice,
    Unknown,
}

impl AvailabilityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AvailabilityState::InStock => "IN_STOCK",
            AvailabilityState::PreOrder => "PRE_ORDER",
            AvailabilityState::OutOfStock => "OUT_OF_STOCK",
            AvailabilityState::RequestPrice => "REQUEST_PRICE",
            AvailabilityState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for AvailabilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Currency {
    #[default]
    #[serde(rename = "RUB")]
    Rub,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalProduct {
    pub site: String,
    pub product_id: Option<String>,
    pub name: String,
    pub brand: Option<String>,
    pub price: Option<f64>,
    pub currency: Currency,
    pub availability: AvailabilityState,
    pub expected_date: Option<NaiveDate>,
    pub source_url: String,
    pub captured_at: DateTime<Utc>,
    pub raw_price_text: String,
    pub match_group: Option<String>,
}

impl CanonicalProduct {
    pub fn has_valid_price(&self) -> bool {
        self.price.is_none_or(is_valid_price)
    }
}

pub fn is_valid_price(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PairScore {
    pub left: usize,
    pub right: usize,
    pub score: f64,
}

/// Products from different sites judged to be the same item. Members are
/// indexes into the slice handed to the matcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchGroup {
    pub group_id: String,
    pub members: Vec<usize>,
    pub pairs: Vec<PairScore>,
}

impl MatchGroup {
    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    PriceUp,
    PriceDown,
    NoChange,
    NewlyFound,
    NotFound,
    AvailabilityChanged,
    DataQualityIssue,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::PriceUp => "price_up",
            ChangeKind::PriceDown => "price_down",
            ChangeKind::NoChange => "no_change",
            ChangeKind::NewlyFound => "newly_found",
            ChangeKind::NotFound => "not_found",
            ChangeKind::AvailabilityChanged => "availability_changed",
            ChangeKind::DataQualityIssue => "data_quality_issue",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeRecord {
    pub key: String,
    pub site: String,
    pub name: String,
    pub previous_price: Option<f64>,
    pub current_price: Option<f64>,
    pub delta: Option<f64>,
    pub percent_delta: Option<f64>,
    pub previous_availability: Option<AvailabilityState>,
    pub current_availability: Option<AvailabilityState>,
    pub kind: ChangeKind,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregationSummary {
    pub generated_at: DateTime<Utc>,
    pub total: usize,
    pub price_up: usize,
    pub price_down: usize,
    pub no_change: usize,
    pub newly_found: usize,
    pub not_found: usize,
    pub availability_changed: usize,
    pub data_quality_issue: usize,
    pub unknown_availability: usize,
    pub absent_price: usize,
}

impl AggregationSummary {
    pub fn new(generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            total: 0,
            price_up: 0,
            price_down: 0,
            no_change: 0,
            newly_found: 0,
            not_found: 0,
            availability_changed: 0,
            data_quality_issue: 0,
            unknown_availability: 0,
            absent_price: 0,
        }
    }

    pub fn record(&mut self, kind: ChangeKind) {
        self.total += 1;
        let slot = match kind {
            ChangeKind::PriceUp => &mut self.price_up,
            ChangeKind::PriceDown => &mut self.price_down,
            ChangeKind::NoChange => &mut self.no_change,
            ChangeKind::NewlyFound => &mut self.newly_found,
            ChangeKind::NotFound => &mut self.not_found,
            ChangeKind::AvailabilityChanged => &mut self.availability_changed,
            ChangeKind::DataQualityIssue => &mut self.data_quality_issue,
        };
        *slot += 1;
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        match kind {
            ChangeKind::PriceUp => self.price_up,
            ChangeKind::PriceDown => self.price_down,
            ChangeKind::NoChange => self.no_change,
            ChangeKind::NewlyFound => self.newly_found,
            ChangeKind::NotFound => self.not_found,
            ChangeKind::AvailabilityChanged => self.availability_changed,
            ChangeKind::DataQualityIssue => self.data_quality_issue,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotEntry {
    #[serde(default)]
    pub product_id: Option<String>,
    pub site: String,
    pub name: String,
    #[serde(default)]
    pub price: Option<f64>,
    pub availability: AvailabilityState,
    pub captured_at: DateTime<Utc>,
}

impl From<&CanonicalProduct> for SnapshotEntry {
    fn from(product: &CanonicalProduct) -> Self {
        Self {
            product_id: product.product_id.clone(),
            site: product.site.clone(),
            name: product.name.clone(),
            price: product.price,
            availability: product.availability,
            captured_at: product.captured_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub schema_version: u32,
    pub captured_at: Option<DateTime<Utc>>,
    pub entries: Vec<SnapshotEntry>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            schema_version: 1,
            captured_at: None,
            entries: Vec::new(),
        }
    }
}

impl Snapshot {
    pub fn from_products(products: &[CanonicalProduct], captured_at: DateTime<Utc>) -> Self {
        Self {
            schema_version: 1,
            captured_at: Some(captured_at),
            entries: products.iter().map(SnapshotEntry::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationOutcome {
    pub changes: Vec<ChangeRecord>,
    pub summary: AggregationSummary,
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub fragments_loaded: usize,
    pub fragments_skipped: usize,
    pub products: usize,
    pub match_groups: usize,
    pub matched_groups: usize,
}
