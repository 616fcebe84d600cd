use chrono::NaiveDate;

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d-%m-%Y", "%m/%d/%Y", "%Y/%m/%d", "%d/%m/%Y"];

/// 解析金額欄位，無法解析時回傳 0
pub fn parse_amount(value: Option<&str>) -> f64 {
    let Some(raw) = value.filter(|v| !v.is_empty()) else {
        return 0.0;
    };

    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .map(|c| if c == '\u{2212}' { '-' } else { c })
        .collect();

    // NaN 與 inf 無法寫入 JSON 快照，視為無法解析
    match cleaned.parse::<f64>() {
        Ok(amount) if amount.is_finite() => amount,
        _ => {
            tracing::warn!("Could not parse amount: {:?}", raw);
            0.0
        }
    }
}

/// Formats are tried in order, so `03/04/2024` reads month-first.
pub fn parse_date(value: Option<&str>) -> Option<NaiveDate> {
    let raw = value.filter(|v| !v.is_empty())?;

    let parsed = DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok());

    if parsed.is_none() {
        tracing::warn!("Could not parse date: {:?}", raw);
    }
    parsed
}

pub fn parse_bool(value: Option<&str>) -> bool {
    value
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "yes" | "true" | "1"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(Some("$1,250,000")), 1_250_000.0);
        assert_eq!(parse_amount(Some("-500.25")), -500.25);
        assert_eq!(parse_amount(Some("\u{2212}75,000")), -75_000.0);
        assert_eq!(parse_amount(Some("$ 10 000")), 10_000.0);
        assert_eq!(parse_amount(Some("n/a")), 0.0);
        assert_eq!(parse_amount(Some("")), 0.0);
        assert_eq!(parse_amount(None), 0.0);
    }

    #[test]
    fn test_parse_amount_rejects_non_finite() {
        assert_eq!(parse_amount(Some("NaN")), 0.0);
        assert_eq!(parse_amount(Some("inf")), 0.0);
        assert_eq!(parse_amount(Some("-Infinity")), 0.0);
        assert_eq!(parse_amount(Some("1e400")), 0.0);
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15);
        assert_eq!(parse_date(Some("2024-03-15")), expected);
        assert_eq!(parse_date(Some("15-03-2024")), expected);
        assert_eq!(parse_date(Some("03/15/2024")), expected);
        assert_eq!(parse_date(Some("2024/03/15")), expected);
        assert_eq!(parse_date(Some("15/03/2024")), expected);
    }

    #[test]
    fn test_parse_date_prefers_month_first() {
        assert_eq!(
            parse_date(Some("03/04/2024")),
            NaiveDate::from_ymd_opt(2024, 3, 4)
        );
    }

    #[test]
    fn test_parse_date_invalid() {
        assert_eq!(parse_date(Some("Q3 2024")), None);
        assert_eq!(parse_date(Some("")), None);
        assert_eq!(parse_date(None), None);
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool(Some("Yes")));
        assert!(parse_bool(Some(" true ")));
        assert!(parse_bool(Some("1")));
        assert!(!parse_bool(Some("no")));
        assert!(!parse_bool(Some("")));
        assert!(!parse_bool(None));
    }
}
