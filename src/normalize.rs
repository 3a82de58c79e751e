use crate::availability::classify_availability;
use crate::date::extract_date;
use crate::model::{AvailabilityState, CanonicalProduct, Currency, RawFragment};
use crate::price::{normalize_whitespace, parse_price};
use tracing::debug;

/// Builds the canonical record for one fragment. Never fails: unparseable
/// text leaves the corresponding field empty and the record is still emitted.
pub fn normalize_fragment(fragment: &RawFragment) -> CanonicalProduct {
    let price = parse_price(&fragment.price_text);

    let mut availability = classify_availability(&fragment.availability_text);
    if availability == AvailabilityState::Unknown && price.on_request {
        availability = AvailabilityState::RequestPrice;
    }

    let expected_date = if availability == AvailabilityState::PreOrder {
        extract_date(&fragment.availability_text)
    } else {
        None
    };

    if price.value.is_none() && !price.on_request {
        debug!(
            site = %fragment.site,
            raw = %fragment.price_text,
            "no price recognized in fragment"
        );
    }

    CanonicalProduct {
        site: fragment.site.trim().to_string(),
        product_id: fragment
            .product_id
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ToString::to_string),
        name: normalize_whitespace(&fragment.name),
        brand: fragment
            .brand
            .as_deref()
            .map(normalize_whitespace)
            .filter(|v| !v.is_empty()),
        price: price.value,
        currency: Currency::Rub,
        availability,
        expected_date,
        source_url: fragment.source_url.clone(),
        captured_at: fragment.captured_at,
        raw_price_text: price.raw_text,
        match_group: None,
    }
}

pub fn normalize_all(fragments: &[RawFragment]) -> Vec<CanonicalProduct> {
    fragments.iter().map(normalize_fragment).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn fragment(price: &str, availability: &str) -> RawFragment {
        RawFragment {
            site: "prist".to_string(),
            product_id: None,
            name: "  АКИП-4204/1\u{a0}TG   осциллограф ".to_string(),
            brand: None,
            price_text: price.to_string(),
            availability_text: availability.to_string(),
            source_url: "https://prist.ru/akip_4204_1_tg/".to_string(),
            captured_at: Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn composes_all_parsers() {
        let product = normalize_fragment(&fragment("47 910 ₽", "В наличии"));
        assert_eq!(product.name, "АКИП-4204/1 TG осциллограф");
        assert_eq!(product.price, Some(47910.0));
        assert_eq!(product.currency, Currency::Rub);
        assert_eq!(product.availability, AvailabilityState::InStock);
        assert_eq!(product.expected_date, None);
        assert_eq!(product.brand, None);
        assert_eq!(product.match_group, None);
    }

    #[test]
    fn pre_order_carries_expected_date() {
        let product = normalize_fragment(&fragment("", "поступление 11.01.2026 г."));
        assert_eq!(product.availability, AvailabilityState::PreOrder);
        assert_eq!(product.expected_date, NaiveDate::from_ymd_opt(2026, 1, 11));
    }

    #[test]
    fn dates_ignored_outside_pre_order() {
        let product = normalize_fragment(&fragment("100 ₽", "В наличии с 11.01.2026"));
        assert_eq!(product.availability, AvailabilityState::InStock);
        assert_eq!(product.expected_date, None);
    }

    #[test]
    fn price_on_request_fills_unknown_availability() {
        let product = normalize_fragment(&fragment("Цена по запросу", ""));
        assert_eq!(product.price, None);
        assert_eq!(product.availability, AvailabilityState::RequestPrice);

        let product = normalize_fragment(&fragment("по запросу", "Нет в наличии"));
        assert_eq!(product.availability, AvailabilityState::OutOfStock);
    }

    #[test]
    fn garbage_still_yields_a_record() {
        let product = normalize_fragment(&fragment("???", "!!!"));
        assert_eq!(product.price, None);
        assert_eq!(product.availability, AvailabilityState::Unknown);
        assert_eq!(product.raw_price_text, "???");
    }

    #[test]
    fn raw_price_text_survives_successful_parse() {
        let product = normalize_fragment(&fragment(" 47\u{a0}910 ₽ ", ""));
        assert_eq!(product.price, Some(47910.0));
        assert_eq!(product.raw_price_text, " 47\u{a0}910 ₽ ");
    }

    #[test]
    fn supplied_brand_and_id_are_trimmed() {
        let mut raw = fragment("1 ₽", "");
        raw.brand = Some(" АКИП ".to_string());
        raw.product_id = Some("  ".to_string());
        let product = normalize_fragment(&raw);
        assert_eq!(product.brand.as_deref(), Some("АКИП"));
        assert_eq!(product.product_id, None);
    }
}
