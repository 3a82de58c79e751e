use crate::model::AvailabilityState;
use crate::price::normalize_whitespace;
use regex::Regex;
use std::sync::LazyLock;

struct Rule {
    state: AvailabilityState,
    pattern: Regex,
}

// Order matters: "не в наличии" contains "в наличии", and arrival notices
// often mention stock as well.
static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule(
            AvailabilityState::OutOfStock,
            r"\bнет?\s+(?:в\s+наличии|в\s+продаже|на\s+складе)|ничего\s+нет|отсутствует|закончил(?:ся|ась|ось|ись)|распродан|снят\w*\s+с\s+производства|поставка\s+прекращена|не\s+поставляется|недоступ",
        ),
        rule(
            AvailabilityState::PreOrder,
            r"ожида\w*|поступлени\w*|предзаказ|под\s+заказ|в\s+пути|скоро\s+в\s+продаже",
        ),
        rule(
            AvailabilityState::InStock,
            r"в\s+наличии|на\s+складе|в\s+продаже|есть\s+в\s+магазин|доступ(?:ен|на|но)\s+к\s+заказу",
        ),
        rule(
            AvailabilityState::RequestPrice,
            r"по\s+запросу|уточняйте|запросить\s+цену|уточнить\s+цену",
        ),
    ]
});

fn rule(state: AvailabilityState, pattern: &str) -> Rule {
    Rule {
        state,
        pattern: Regex::new(&format!("(?i){pattern}"))
            .expect("availability rule regex must be valid"),
    }
}

/// Maps free-form availability text onto the closed state set. The first
/// matching rule wins; text matching nothing, including the empty string, is
/// `Unknown`.
pub fn classify_availability(text: &str) -> AvailabilityState {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return AvailabilityState::Unknown;
    }

    RULES
        .iter()
        .find(|rule| rule.pattern.is_match(&normalized))
        .map(|rule| rule.state)
        .unwrap_or(AvailabilityState::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_unrecognized_text_is_unknown() {
        assert_eq!(classify_availability(""), AvailabilityState::Unknown);
        assert_eq!(classify_availability("   "), AvailabilityState::Unknown);
        assert_eq!(classify_availability("артикул 4204"), AvailabilityState::Unknown);
    }

    #[test]
    fn out_of_stock_wins_over_in_stock_substring() {
        assert_eq!(
            classify_availability("Нет в наличии"),
            AvailabilityState::OutOfStock
        );
        assert_eq!(
            classify_availability("Товара нет на складе, но в продаже скоро"),
            AvailabilityState::OutOfStock
        );
    }

    #[test]
    fn negated_stock_and_sale_phrases_are_out_of_stock() {
        assert_eq!(classify_availability("Не в наличии"), AvailabilityState::OutOfStock);
        assert_eq!(
            classify_availability("Товар не в наличии"),
            AvailabilityState::OutOfStock
        );
        assert_eq!(classify_availability("Нет в продаже"), AvailabilityState::OutOfStock);
        assert_eq!(classify_availability("не на складе"), AvailabilityState::OutOfStock);
        assert_eq!(classify_availability("Есть в продаже"), AvailabilityState::InStock);
    }

    #[test]
    fn discontinued_is_out_of_stock() {
        assert_eq!(
            classify_availability("Снят с производства"),
            AvailabilityState::OutOfStock
        );
        assert_eq!(
            classify_availability("Поставка прекращена"),
            AvailabilityState::OutOfStock
        );
    }

    #[test]
    fn arrival_wins_over_in_stock() {
        assert_eq!(
            classify_availability("Ожидается поступление, скоро будет в наличии"),
            AvailabilityState::PreOrder
        );
        assert_eq!(
            classify_availability("поступление 11.01.2026 г."),
            AvailabilityState::PreOrder
        );
        assert_eq!(classify_availability("Под заказ"), AvailabilityState::PreOrder);
    }

    #[test]
    fn in_stock_phrases() {
        assert_eq!(classify_availability("В наличии"), AvailabilityState::InStock);
        assert_eq!(
            classify_availability("есть на  складе: 5 шт."),
            AvailabilityState::InStock
        );
    }

    #[test]
    fn price_on_request_is_last_specific_rule() {
        assert_eq!(
            classify_availability("Цена по запросу"),
            AvailabilityState::RequestPrice
        );
        assert_eq!(
            classify_availability("В наличии, цена по запросу"),
            AvailabilityState::InStock
        );
    }

    #[test]
    fn case_insensitive_matching() {
        assert_eq!(classify_availability("НЕТ В НАЛИЧИИ"), AvailabilityState::OutOfStock);
        assert_eq!(classify_availability("в НАЛИЧИИ"), AvailabilityState::InStock);
    }
}
