//! Display helpers for money, percentages and follower counts.
use once_cell::sync::Lazy;
use regex::Regex;

static FOLLOWERS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([0-9][0-9,]*(?:\.[0-9]+)?)\s*([kKmMbB]?)\s*$").expect("valid followers regex")
});

fn group_thousands(whole: u64) -> String {
    let digits = whole.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `$1,234` for whole amounts, `$1,234.50` when there are cents.
pub fn format_currency(amount: f64) -> String {
    let amount = if amount.is_finite() { amount } else { 0.0 };
    let cents = (amount.abs() * 100.0).round() as u64;
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    let whole = group_thousands(cents / 100);
    match cents % 100 {
        0 => format!("{sign}${whole}"),
        frac => format!("{sign}${whole}.{frac:02}"),
    }
}

/// Percentage with one decimal place. A zero denominator yields `0.0%`.
pub fn format_percent(part: f64, whole: f64) -> String {
    format!("{:.1}%", percent(part, whole))
}

pub fn percent(part: f64, whole: f64) -> f64 {
    if whole == 0.0 || !whole.is_finite() || !part.is_finite() {
        return 0.0;
    }
    part / whole * 100.0
}

pub fn format_followers(count: i64) -> String {
    let abs = count.unsigned_abs() as f64;
    let sign = if count < 0 { "-" } else { "" };
    let (value, suffix) = if abs >= 1_000_000_000.0 {
        (abs / 1_000_000_000.0, "B")
    } else if abs >= 1_000_000.0 {
        (abs / 1_000_000.0, "M")
    } else if abs >= 1_000.0 {
        (abs / 1_000.0, "K")
    } else {
        return count.to_string();
    };
    let text = format!("{value:.1}");
    let text = text.strip_suffix(".0").unwrap_or(&text);
    format!("{sign}{text}{suffix}")
}

/// Parse follower counts typed as `12,500`, `12.5k` or `1.2M`.
pub fn parse_followers(input: &str) -> Option<i64> {
    let caps = FOLLOWERS_RE.captures(input)?;
    let number: f64 = caps[1].replace(',', "").parse().ok()?;
    let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()).as_deref() {
        Some("k") => 1_000.0,
        Some("m") => 1_000_000.0,
        Some("b") => 1_000_000_000.0,
        _ => 1.0,
    };
    Some((number * multiplier).round() as i64)
}
