use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

static NUMERIC_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[./](\d{1,2})[./](\d{4}|\d{2})\b")
        .expect("numeric date regex must be valid")
});

static MONTH_NAME_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s+([а-яё]+)\s+(\d{4})\b")
        .expect("month name date regex must be valid")
});

const GENITIVE_MONTHS: [&str; 12] = [
    "января",
    "февраля",
    "марта",
    "апреля",
    "мая",
    "июня",
    "июля",
    "августа",
    "сентября",
    "октября",
    "ноября",
    "декабря",
];

/// Finds an expected-arrival date in text like `"поступление 11.01.2026 г."`
/// or `"ожидается 5 марта 2026"`. Numeric `dd.mm.yyyy` tokens are tried
/// before month names; candidates that fail calendar validation are skipped.
pub fn extract_date(text: &str) -> Option<NaiveDate> {
    numeric_date(text).or_else(|| month_name_date(text))
}

fn numeric_date(text: &str) -> Option<NaiveDate> {
    NUMERIC_DATE.captures_iter(text).find_map(|caps| {
        let day = caps.get(1)?.as_str().parse::<u32>().ok()?;
        let month = caps.get(2)?.as_str().parse::<u32>().ok()?;
        let year = expand_year(caps.get(3)?.as_str())?;
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

fn month_name_date(text: &str) -> Option<NaiveDate> {
    MONTH_NAME_DATE.captures_iter(text).find_map(|caps| {
        let day = caps.get(1)?.as_str().parse::<u32>().ok()?;
        let month = month_from_genitive(caps.get(2)?.as_str())?;
        let year = caps.get(3)?.as_str().parse::<i32>().ok()?;
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

fn month_from_genitive(word: &str) -> Option<u32> {
    let lowered = word.to_lowercase();
    GENITIVE_MONTHS
        .iter()
        .position(|m| *m == lowered)
        .map(|idx| idx as u32 + 1)
}

fn expand_year(value: &str) -> Option<i32> {
    let year = value.parse::<i32>().ok()?;
    if value.len() == 2 {
        Some(2000 + year)
    } else {
        Some(year)
    }
}
