use regex_lite::Regex;
use std::sync::OnceLock;

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+\.?\d*)").expect("static capacity pattern"))
}

/// Parses a capacity cell such as `"1,250 MW"`, `"300.5"` or `"approx. 450MW (summer)"`.
///
/// Returns `None` for blank cells and for capacities below `min_capacity_mw`.
pub fn extract_capacity(value: &str, min_capacity_mw: f64) -> Option<f64> {
    let text = value.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("nan") || text.eq_ignore_ascii_case("none") {
        return None;
    }

    let mut cleaned = text.replace(',', "").to_ascii_uppercase();
    for suffix in ["MEGAWATTS", "MEGAWATT", "MW"] {
        cleaned = cleaned.replace(suffix, "");
    }
    let cleaned = cleaned.trim();

    let capacity = match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => number_pattern()
            .captures(cleaned)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())?,
    };

    (capacity >= min_capacity_mw).then_some(capacity)
}

/// Deduplication key shared by every source: MD5 over name, capacity, state and utility.
pub fn data_hash(project_name: &str, capacity_mw: f64, state: &str, utility: &str) -> String {
    let key = format!("{project_name}_{capacity_mw:?}_{state}_{utility}").to_lowercase();
    format!("{:x}", md5::compute(key.as_bytes()))
}

/// Renders a JSON scalar the way a spreadsheet cell would read.
pub fn json_text(value: Option<&serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}

/// First non-empty value among several JSON keys.
pub fn json_first(object: &serde_json::Value, keys: &[&str]) -> String {
    keys.iter()
        .map(|k| json_text(object.get(*k)))
        .find(|v| !v.is_empty())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_numbers_above_threshold() {
        assert_eq!(extract_capacity("250", 100.0), Some(250.0));
        assert_eq!(extract_capacity("1,250.5", 100.0), Some(1250.5));
        assert_eq!(extract_capacity("100", 100.0), Some(100.0));
    }

    #[test]
    fn below_threshold_and_blank_are_rejected() {
        assert_eq!(extract_capacity("99.9", 100.0), None);
        assert_eq!(extract_capacity("", 100.0), None);
        assert_eq!(extract_capacity("   ", 100.0), None);
        assert_eq!(extract_capacity("NaN", 100.0), None);
        assert_eq!(extract_capacity("TBD", 100.0), None);
    }

    #[test]
    fn unit_suffixes_are_stripped() {
        assert_eq!(extract_capacity("300 MW", 100.0), Some(300.0));
        assert_eq!(extract_capacity("300mw", 100.0), Some(300.0));
        assert_eq!(extract_capacity("2 Megawatts", 1.0), Some(2.0));
    }

    #[test]
    fn falls_back_to_first_number_in_text() {
        assert_eq!(extract_capacity("approx. 450MW (summer)", 100.0), Some(450.0));
        assert_eq!(extract_capacity("Phase 1: 120 / Phase 2: 300", 100.0), Some(120.0));
        assert_eq!(extract_capacity("Phase 1: 50 / Phase 2: 300", 100.0), None);
    }

    #[test]
    fn hash_is_case_insensitive_and_keeps_decimal_point() {
        let a = data_hash("Loudoun Campus", 250.0, "VA", "PJM");
        let b = data_hash("LOUDOUN CAMPUS", 250.0, "va", "pjm");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);

        let expected = format!("{:x}", md5::compute("loudoun campus_250.0_va_pjm".as_bytes()));
        assert_eq!(a, expected);
        assert_ne!(a, data_hash("Loudoun Campus", 251.0, "VA", "PJM"));
    }

    #[test]
    fn json_values_render_as_text() {
        let v = serde_json::json!({"a": 12.5, "b": null, "c": " x ", "d": ""});
        assert_eq!(json_text(v.get("a")), "12.5");
        assert_eq!(json_text(v.get("b")), "");
        assert_eq!(json_text(v.get("missing")), "");
        assert_eq!(json_first(&v, &["d", "b", "c"]), "x");
    }
}
