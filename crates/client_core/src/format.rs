use chrono::{DateTime, Utc};

pub const CURRENCY_SYMBOL: &str = "₮";

/// Whole-tugrik amount with thousands separators, e.g. `1,250,000₮`.
pub fn format_currency(amount: f64) -> String {
    if !amount.is_finite() {
        return format!("0{CURRENCY_SYMBOL}");
    }
    let rounded = amount.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if rounded < 0 { "-" } else { "" };
    format!("{sign}{grouped}{CURRENCY_SYMBOL}")
}

pub fn format_optional_currency(amount: Option<f64>) -> String {
    format_currency(amount.unwrap_or(0.0))
}

pub fn format_date(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|ts| ts.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

pub fn format_date_time(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

/// `99112233` becomes `9911-2233`; anything else is returned untouched.
pub fn format_phone(phone: &str) -> String {
    let phone = phone.trim();
    if phone.len() == 8 && phone.chars().all(|c| c.is_ascii_digit()) {
        format!("{}-{}", &phone[..4], &phone[4..])
    } else {
        phone.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_thousands_and_appends_symbol() {
        assert_eq!(format_currency(0.0), "0₮");
        assert_eq!(format_currency(999.0), "999₮");
        assert_eq!(format_currency(10000.0), "10,000₮");
        assert_eq!(format_currency(5_000_000.0), "5,000,000₮");
        assert_eq!(format_currency(1234.6), "1,235₮");
        assert_eq!(format_currency(-25000.0), "-25,000₮");
        assert_eq!(format_optional_currency(None), "0₮");
    }

    #[test]
    fn formats_dates_and_skips_missing() {
        let ts: DateTime<Utc> = "2024-03-05T14:07:00Z".parse().expect("timestamp");
        assert_eq!(format_date(Some(ts)), "2024-03-05");
        assert_eq!(format_date_time(Some(ts)), "2024-03-05 14:07");
        assert_eq!(format_date(None), "");
    }

    #[test]
    fn splits_eight_digit_phone_numbers() {
        assert_eq!(format_phone("99112233"), "9911-2233");
        assert_eq!(format_phone("+97699112233"), "+97699112233");
        assert_eq!(format_phone(""), "");
    }
}
