//! Field formatters: salary, description, location and filename slugs
//!
//! These are pure functions over raw job-record fields. They never fail; a
//! missing input resolves to `None` or an empty string.

use crate::model::{Location, SalaryRange};

const ELLIPSIS: &str = "...";

/// Format a salary range as `"$50,000 - $70,000 per year"`.
///
/// Returns `None` when neither bound is present (zero counts as absent).
/// Currency defaults to USD and the interval to yearly.
pub fn format_salary(range: &SalaryRange) -> Option<String> {
    let min = range.min_amount.filter(|n| *n != 0.0 && n.is_finite());
    let max = range.max_amount.filter(|n| *n != 0.0 && n.is_finite());

    let currency = range
        .currency
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or("USD");
    let interval = range.interval.as_deref().unwrap_or("yearly");

    let amounts = bounds(min, max, |n| format_currency(n, currency))?;
    Some(format!("{} {}", amounts, interval_phrase(interval)))
}

/// Format flat `salary_min`/`salary_max` fields. These carry no currency or
/// interval, so dollars are assumed and no interval phrase is appended.
pub fn format_flat_salary(min: Option<f64>, max: Option<f64>) -> Option<String> {
    bounds(min, max, |n| format_currency(n, "USD"))
}

fn bounds(min: Option<f64>, max: Option<f64>, fmt: impl Fn(f64) -> String) -> Option<String> {
    match (min, max) {
        (Some(lo), Some(hi)) => Some(format!("{} - {}", fmt(lo), fmt(hi))),
        (Some(lo), None) => Some(format!("{}+", fmt(lo))),
        (None, Some(hi)) => Some(format!("Up to {}", fmt(hi))),
        (None, None) => None,
    }
}

/// Map a pay interval to its display phrase. Unknown intervals read as yearly.
pub fn interval_phrase(interval: &str) -> &'static str {
    match interval.trim().to_ascii_lowercase().as_str() {
        "monthly" => "per month",
        "weekly" => "per week",
        "daily" => "per day",
        "hourly" => "per hour",
        _ => "per year",
    }
}

/// Format an amount as en-US currency with no fractional digits.
pub fn format_currency(amount: f64, currency: &str) -> String {
    let code = currency.to_ascii_uppercase();
    let sign = if amount < 0.0 { "-" } else { "" };
    // f64 -> u64 saturates, which is fine for display purposes
    let digits = group_thousands(amount.abs().round() as u64);
    match currency_symbol(&code) {
        Some(symbol) => format!("{}{}{}", sign, symbol, digits),
        None => format!("{}{} {}", sign, code, digits),
    }
}

fn currency_symbol(code: &str) -> Option<&'static str> {
    let symbol = match code {
        "USD" => "$",
        "EUR" => "€",
        "GBP" => "£",
        "JPY" => "¥",
        "INR" => "₹",
        "KRW" => "₩",
        "ILS" => "₪",
        "VND" => "₫",
        "PHP" => "₱",
        "NGN" => "₦",
        "CAD" => "CA$",
        "AUD" => "A$",
        "NZD" => "NZ$",
        "HKD" => "HK$",
        "MXN" => "MX$",
        "BRL" => "R$",
        "CNY" => "CN¥",
        "TWD" => "NT$",
        _ => return None,
    };
    Some(symbol)
}

fn group_thousands(n: u64) -> String {
    let raw = n.to_string();
    let mut out = String::with_capacity(raw.len() + raw.len() / 3);
    for (i, ch) in raw.chars().enumerate() {
        if i > 0 && (raw.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Keep the first `max_words` whitespace-separated words of `text`.
///
/// Text at or under the limit is returned unchanged; longer text is rejoined
/// with single spaces and gets a trailing `...`.
pub fn truncate_description(text: &str, max_words: usize) -> String {
    if text.is_empty() {
        return String::new();
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return text.to_string();
    }

    let mut out = words[..max_words].join(" ");
    out.push_str(ELLIPSIS);
    out
}

/// Character based truncation, used for log lines.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}{}", head.trim_end(), ELLIPSIS)
}

/// Compose the display location.
///
/// Free text wins over structured fields; structured fields are joined with
/// `", "` skipping absent parts. Remote jobs get a ` (Remote)` suffix, or
/// read just `Remote` when there is no other location.
pub fn format_location(location: Option<&Location>, is_remote: bool) -> String {
    let base = match location {
        Some(Location::Text(text)) => text.trim().to_string(),
        Some(Location::Structured(loc)) => [&loc.city, &loc.state, &loc.country]
            .into_iter()
            .filter_map(|part| part.as_deref().map(str::trim).filter(|p| !p.is_empty()))
            .collect::<Vec<_>>()
            .join(", "),
        None => String::new(),
    };

    match (is_remote, base.is_empty()) {
        (true, true) => "Remote".to_string(),
        (true, false) => format!("{} (Remote)", base),
        (false, _) => base,
    }
}

/// Lowercase ASCII slug: runs of anything outside `[a-z0-9]` become one `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for ch in text.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }
    slug
}
