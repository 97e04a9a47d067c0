//! Locale-tolerant price parsing.
//!
//! Handles symbol-prefixed (`$9.99`, `¥1,200`), symbol-suffixed (`1,200円`,
//! `12,50 €`), and ISO-code (`USD 12.00`) forms, with either comma or dot as
//! the decimal separator.

use std::sync::LazyLock;

use regex::Regex;

/// A parsed monetary amount.
#[derive(Debug, Clone, PartialEq)]
pub struct Price {
    pub amount: f64,
    /// ISO 4217 code when a symbol or code was present.
    pub currency: Option<String>,
}

const ISO_CODES: &[&str] = &[
    "USD", "EUR", "GBP", "JPY", "KRW", "INR", "CNY", "CAD", "AUD", "CHF", "SEK", "NZD",
];

/// Currencies quoted without minor units, where `1.200` means twelve hundred.
const ZERO_DECIMAL: &[&str] = &["JPY", "KRW"];

static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        (?P<pre>US\$|C\$|A\$|[$€£¥￥₩₹]|\b(?:USD|EUR|GBP|JPY|KRW|INR|CNY|CAD|AUD|CHF|SEK|NZD)\b)?
        \s*
        (?P<num>\d{1,3}(?:[,.\u{00a0}\u{202f}\x20]\d{3})+(?:[.,]\d{1,2})?|\d+(?:[.,]\d{1,2})?)
        \s*
        (?P<suf>円|€|₩|\b(?:USD|EUR|GBP|JPY|KRW|INR|CNY|CAD|AUD|CHF|SEK|NZD)\b)?
        ",
    )
    .expect("valid regex")
});

/// Map a symbol or ISO code to its ISO 4217 code.
pub fn currency_code(token: &str) -> Option<&'static str> {
    match token.trim() {
        "$" | "US$" => Some("USD"),
        "C$" => Some("CAD"),
        "A$" => Some("AUD"),
        "€" => Some("EUR"),
        "£" => Some("GBP"),
        "¥" | "￥" | "円" => Some("JPY"),
        "₩" => Some("KRW"),
        "₹" => Some("INR"),
        other => {
            let upper = other.to_ascii_uppercase();
            ISO_CODES.iter().copied().find(|code| *code == upper)
        }
    }
}

/// Parse the first price in `text`, with or without a currency marker.
///
/// Use for structured values such as JSON-LD `price` fields.
pub fn parse_price(text: &str) -> Option<Price> {
    PRICE_RE
        .captures_iter(text)
        .find_map(|caps| price_from_captures(&caps))
}

/// Find the first price in free text that carries an explicit currency marker.
///
/// Bare numbers are ignored so that counts and dates are not mistaken for prices.
pub fn find_price(text: &str) -> Option<Price> {
    PRICE_RE.captures_iter(text).find_map(|caps| {
        let has_marker = caps.name("pre").is_some() || caps.name("suf").is_some();
        if has_marker {
            price_from_captures(&caps)
        } else {
            None
        }
    })
}

fn price_from_captures(caps: &regex::Captures<'_>) -> Option<Price> {
    let currency = caps
        .name("pre")
        .or_else(|| caps.name("suf"))
        .and_then(|m| currency_code(m.as_str()))
        .map(str::to_string);
    let amount = parse_amount(caps.name("num")?.as_str(), currency.as_deref())?;
    Some(Price { amount, currency })
}

/// Normalize a localized number string into an `f64`.
pub fn parse_amount(raw: &str, currency: Option<&str>) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{00a0}' && *c != '\u{202f}')
        .collect();

    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');

    let normalized = match (last_comma, last_dot) {
        (Some(c), Some(d)) => {
            if c > d {
                // 1.234,56
                cleaned.replace('.', "").replace(',', ".")
            } else {
                // 1,234.56
                cleaned.replace(',', "")
            }
        }
        (Some(_), None) => {
            if is_grouped(&cleaned, ',') {
                cleaned.replace(',', "")
            } else {
                cleaned.replace(',', ".")
            }
        }
        (None, Some(_)) => {
            let zero_decimal = currency.is_some_and(|c| ZERO_DECIMAL.contains(&c));
            let groups = cleaned.matches('.').count();
            if is_grouped(&cleaned, '.') && (groups > 1 || zero_decimal) {
                cleaned.replace('.', "")
            } else {
                cleaned
            }
        }
        (None, None) => cleaned,
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// `1,234,567`-style thousands grouping with `sep`.
fn is_grouped(s: &str, sep: char) -> bool {
    let mut parts = s.split(sep);
    let Some(head) = parts.next() else {
        return false;
    };
    if head.is_empty() || head.len() > 3 {
        return false;
    }
    let mut saw_group = false;
    for part in parts {
        if part.len() != 3 || !part.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        saw_group = true;
    }
    saw_group
}
