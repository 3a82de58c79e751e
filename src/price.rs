use crate::model::is_valid_price;
use regex::Regex;
use std::sync::LazyLock;

static ON_REQUEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)по\s+запросу|уточняйте|запросить\s+цену|уточнить\s+цену|цена\s+договорная|договорная",
    )
    .expect("price-on-request regex must be valid")
});

// First currency-terminated amount. A trailing range bound ("100–200 ₽",
// "от 100 до 200 ₽") is consumed but only the lower bound is captured.
static PRICE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:^|[^\w.,])(?P<sign>[-−])?(?P<num>(?:\d{1,3}(?: \d{3})+|\d+)(?:[.,]\d{1,2})?)(?:\s*(?:[-–—]|до)\s*(?:\d{1,3}(?: \d{3})+|\d+)(?:[.,]\d{1,2})?)?\s*(?:₽|руб|р\.)",
    )
    .expect("price token regex must be valid")
});

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedPrice {
    pub value: Option<f64>,
    pub on_request: bool,
    pub raw_text: String,
}

/// Parses a free-form price fragment such as `"47 910 ₽ (с НДС)"`.
///
/// A missing price is an ordinary outcome: price-on-request phrasing, no
/// currency-marked amount, or a negative amount all yield `value: None`.
/// The raw text is returned untouched in every branch.
pub fn parse_price(text: &str) -> ParsedPrice {
    if is_price_on_request(text) {
        return ParsedPrice {
            value: None,
            on_request: true,
            raw_text: text.to_string(),
        };
    }

    ParsedPrice {
        value: first_price_token(&normalize_whitespace(text)),
        on_request: false,
        raw_text: text.to_string(),
    }
}

/// True when the text asks the buyer to inquire instead of quoting a price.
pub fn is_price_on_request(text: &str) -> bool {
    ON_REQUEST.is_match(&normalize_whitespace(text))
}

fn first_price_token(text: &str) -> Option<f64> {
    let caps = PRICE_TOKEN.captures(text)?;
    if caps.name("sign").is_some() {
        return None;
    }

    let digits = caps
        .name("num")?
        .as_str()
        .replace(' ', "")
        .replace(',', ".");
    let value = digits.parse::<f64>().ok()?;
    is_valid_price(value).then_some(value)
}

/// Collapses every run of whitespace (including non-breaking and thin spaces
/// used as thousands separators) into a single ASCII space.
pub fn normalize_whitespace(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '\u{a0}' || c == '\u{202f}')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_grouped_digits_with_ruble_sign() {
        assert_eq!(parse_price("47 910 ₽").value, Some(47910.0));
        assert_eq!(parse_price("360 ₽").value, Some(360.0));
    }

    #[test]
    fn collapses_non_breaking_separators() {
        assert_eq!(parse_price("49\u{a0}000\u{a0}₽").value, Some(49000.0));
        assert_eq!(parse_price("1\u{202f}250\u{202f}000 ₽").value, Some(1_250_000.0));
    }

    #[test]
    fn accepts_word_currency_markers() {
        assert_eq!(parse_price("303 174 руб.").value, Some(303174.0));
        assert_eq!(parse_price("1 200 РУБ").value, Some(1200.0));
        assert_eq!(parse_price("850 р.").value, Some(850.0));
    }

    #[test]
    fn keeps_fractional_part() {
        assert_eq!(parse_price("1 234,50 ₽").value, Some(1234.5));
    }

    #[test]
    fn ignores_vat_suffix() {
        assert_eq!(parse_price("23500 ₽ (с НДС)").value, Some(23500.0));
    }

    #[test]
    fn price_on_request_short_circuits_numbers() {
        let parsed = parse_price("Цена по запросу, от 10 000 ₽");
        assert_eq!(parsed.value, None);
        assert!(parsed.on_request);

        let parsed = parse_price("УТОЧНЯЙТЕ цену: 500 ₽");
        assert_eq!(parsed.value, None);
        assert!(parsed.on_request);
    }

    #[test]
    fn only_first_currency_token_is_honored() {
        assert_eq!(parse_price("49 000 ₽ 52 000 ₽").value, Some(49000.0));
        assert_eq!(
            parse_price("191 045 ₽ поверка 9 210 ₽").value,
            Some(191045.0)
        );
    }

    #[test]
    fn ranges_take_lower_bound() {
        assert_eq!(parse_price("100–200 ₽").value, Some(100.0));
        assert_eq!(parse_price("от 1 000 до 2 000 ₽").value, Some(1000.0));
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert_eq!(parse_price("-500 ₽").value, None);
        assert_eq!(parse_price("скидка −1 200 ₽").value, None);
        assert_eq!(parse_price("Цена: -500 ₽").value, None);
    }

    #[test]
    fn spaced_dash_after_label_is_not_a_sign() {
        assert_eq!(parse_price("Цена - 47 910 ₽").value, Some(47910.0));
        assert_eq!(parse_price("Стоимость — 1 200 руб.").value, Some(1200.0));
    }

    #[test]
    fn hyphenated_article_is_not_a_sign() {
        assert_eq!(parse_price("АКИП-500 ₽").value, Some(500.0));
    }

    #[test]
    fn text_without_currency_is_absent() {
        assert_eq!(parse_price("").value, None);
        assert_eq!(parse_price("12345").value, None);
        assert_eq!(parse_price("нет цены").value, None);
    }

    #[test]
    fn raw_text_is_preserved_verbatim() {
        for raw in ["  47\u{a0}910 ₽ ", "по запросу", "мусор", "-5 ₽"] {
            assert_eq!(parse_price(raw).raw_text, raw);
        }
    }

    #[test]
    fn whitespace_normalization_trims_and_collapses() {
        assert_eq!(normalize_whitespace("  a \t\n b\u{a0}\u{a0}c "), "a b c");
    }
}
