// src/services/normalize.rs
//! Field cleaning for raw model output: brace-trimmed JSON parse, date
//! normalization to `YYYY-MM-DD`, customer-name label stripping, brand
//! mapping and the discount business rule.

use crate::errors::ProviderError;
use crate::models::{Brand, RawExtraction, RawItem, ReceiptAnalysis, ReceiptItem};
use regex::Regex;

/// Parse a model response into a cleaned [`ReceiptAnalysis`].
///
/// Models occasionally wrap the object in prose or markdown fencing despite
/// instructions, so everything outside the first `{` and the last `}` is
/// discarded before parsing.
pub fn parse_receipt_json(text: &str) -> Result<ReceiptAnalysis, ProviderError> {
    let object = trim_to_json(text)
        .ok_or_else(|| ProviderError::Parse("no JSON object in response".to_string()))?;
    let raw: RawExtraction =
        serde_json::from_str(object).map_err(|e| ProviderError::Parse(e.to_string()))?;
    Ok(clean_extraction(raw))
}

fn trim_to_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Uniform cleaning pass, regardless of which provider produced the raw JSON.
pub fn clean_extraction(raw: RawExtraction) -> ReceiptAnalysis {
    ReceiptAnalysis {
        invoice_number: raw
            .invoice_number
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        date: raw
            .date
            .map(|d| normalize_date(&d))
            .filter(|s| !s.is_empty()),
        customer_name: raw
            .customer_name
            .map(|n| clean_customer_name(&n))
            .filter(|s| !s.is_empty()),
        items: raw.items.into_iter().map(clean_item).collect(),
    }
}

fn clean_item(item: RawItem) -> ReceiptItem {
    ReceiptItem {
        brand: Brand::normalize(item.brand.as_deref().unwrap_or("")),
        price: discounted_price(item.price, item.discount),
    }
}

/// Discounts of magnitude <= 1.00 are promotional-accessory noise (chips),
/// not real price adjustments, and are never applied.
fn discounted_price(price: f64, discount: Option<f64>) -> f64 {
    match discount {
        Some(d) if d.abs() > 1.0 => price - d.abs(),
        _ => price,
    }
}

/// Best-effort normalization of a printed receipt date to `YYYY-MM-DD`.
///
/// Tries, in order: ISO passthrough, `DD-MMM-YY(YY)` with an abbreviated
/// Spanish month name, then pure-numeric `DD-MM-YY(YY)`. Separators may be
/// `-`, `/` or a space. Unrecognized text is returned unchanged.
pub fn normalize_date(raw: &str) -> String {
    lazy_static::lazy_static! {
        static ref ISO_RE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
        static ref NAMED_RE: Regex =
            Regex::new(r"(\d{1,2})[-/ ]([A-Za-z]{3,})[-/ ](\d{2,4})").unwrap();
        static ref NUMERIC_RE: Regex =
            Regex::new(r"(\d{1,2})[-/ ](\d{1,2})[-/ ](\d{2,4})").unwrap();
    }

    let trimmed = raw.trim();
    if ISO_RE.is_match(trimmed) {
        return trimmed.to_string();
    }

    if let Some(caps) = NAMED_RE.captures(trimmed) {
        if let Some(month) = month_number(&caps[2]) {
            return format!(
                "{}-{}-{:0>2}",
                expand_year(&caps[3]),
                month,
                &caps[1]
            );
        }
    }

    if let Some(caps) = NUMERIC_RE.captures(trimmed) {
        return format!(
            "{}-{:0>2}-{:0>2}",
            expand_year(&caps[3]),
            &caps[2],
            &caps[1]
        );
    }

    raw.to_string()
}

/// Spanish month names as printed on tickets; the 3-letter prefix covers
/// both the abbreviation ("jun") and the full name ("junio").
fn month_number(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    let prefix: String = lower.chars().take(3).collect();
    let month = match prefix.as_str() {
        "ene" => "01",
        "feb" => "02",
        "mar" => "03",
        "abr" => "04",
        "may" => "05",
        "jun" => "06",
        "jul" => "07",
        "ago" => "08",
        "sep" => "09",
        "oct" => "10",
        "nov" => "11",
        "dic" => "12",
        _ => return None,
    };
    Some(month)
}

fn expand_year(raw: &str) -> String {
    if raw.len() == 2 {
        format!("20{raw}")
    } else {
        raw.to_string()
    }
}

/// Strip the "Nombre:" label line down to the bare customer name.
pub fn clean_customer_name(raw: &str) -> String {
    lazy_static::lazy_static! {
        static ref NEWLINES_RE: Regex = Regex::new(r"[\r\n]+").unwrap();
        static ref NAME_LABEL_RE: Regex =
            Regex::new(r"(?i)^.*?(?:nombre|cliente|name)\s*[:.]?\s*").unwrap();
        static ref CLIENT_NO_RE: Regex =
            Regex::new(r"(?i)\s*No\.?\s*de\s*Cliente.*$").unwrap();
    }

    let flat = NEWLINES_RE.replace_all(raw, " ");
    let no_label = NAME_LABEL_RE.replace(&flat, "");
    let no_tail = CLIENT_NO_RE.replace(&no_label, "");
    no_tail.trim().to_string()
}
