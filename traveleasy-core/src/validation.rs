use std::fmt::Display;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use serde::{de, Deserialize, Deserializer};

use crate::{CoreError, CoreResult};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText<T> {
    Number(T),
    Text(String),
}

/// Accepts `4` as well as `"4"`. Blank strings count as missing.
pub(crate) fn number_or_string<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Deserialize<'de>,
    T::Err: Display,
{
    match Option::<NumberOrText<T>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrText::Number(n)) => Ok(Some(n)),
        Some(NumberOrText::Text(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            s.parse().map(Some).map_err(de::Error::custom)
        }
    }
}

/// Trimmed, non-empty value of an optional request field.
pub(crate) fn required(value: Option<String>, field: &str) -> CoreResult<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(CoreError::required(field)),
    }
}

pub(crate) fn required_number<T: Copy>(value: Option<T>, field: &str) -> CoreResult<T> {
    value.ok_or_else(|| CoreError::required(field))
}

/// `local@domain.tld`, no whitespace, exactly one `@`.
pub(crate) fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = value.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    if local.is_empty() {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

/// 10 to 15 ASCII digits.
pub(crate) fn is_phone(value: &str) -> bool {
    (10..=15).contains(&value.len()) && value.bytes().all(|b| b.is_ascii_digit())
}

pub(crate) fn is_person_name(value: &str) -> bool {
    let len = value.chars().count();
    (2..=50).contains(&len)
        && value
            .chars()
            .all(|c| c.is_ascii_alphabetic() || c.is_whitespace())
}

/// Registration number once whitespace is removed: upper-case letters and digits.
pub(crate) fn is_vehicle_number(value: &str) -> bool {
    let mut seen = false;
    for c in value.chars().filter(|c| !c.is_whitespace()) {
        if !(c.is_ascii_uppercase() || c.is_ascii_digit()) {
            return false;
        }
        seen = true;
    }
    seen
}

/// Indian PAN: five letters, four digits, one letter (`ABCDE1234F`).
pub(crate) fn is_pan(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 10
        && bytes[..5].iter().all(u8::is_ascii_uppercase)
        && bytes[5..9].iter().all(u8::is_ascii_digit)
        && bytes[9].is_ascii_uppercase()
}

pub(crate) fn parse_date(value: &str, field: &str) -> CoreResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| CoreError::ValidationError(format!("Invalid {} (expected YYYY-MM-DD).", field)))
}

pub(crate) fn parse_time(value: &str, field: &str) -> CoreResult<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| CoreError::ValidationError(format!("Invalid {} (expected HH:MM).", field)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_shape() {
        assert!(is_email("rider@example.com"));
        assert!(is_email("a@b.c"));
        assert!(!is_email("rider@example"));
        assert!(!is_email("rider@@example.com"));
        assert!(!is_email("@example.com"));
        assert!(!is_email("rider @example.com"));
        assert!(!is_email("rider@example."));
    }

    #[test]
    fn test_phone_length_bounds() {
        assert!(is_phone("9876543210"));
        assert!(is_phone("987654321012345"));
        assert!(!is_phone("987654321"));
        assert!(!is_phone("9876543210123456"));
        assert!(!is_phone("98765-43210"));
    }

    #[test]
    fn test_pan_and_vehicle() {
        assert!(is_pan("ABCDE1234F"));
        assert!(!is_pan("ABCD12345F"));
        assert!(!is_pan("abcde1234f"));
        assert!(is_vehicle_number("MH 12 AB 1234"));
        assert!(!is_vehicle_number("MH-12"));
        assert!(!is_vehicle_number("   "));
    }

    #[test]
    fn test_required_trims() {
        assert_eq!(required(Some("  Pune ".into()), "source").unwrap(), "Pune");
        assert_eq!(
            required(Some("   ".into()), "source").unwrap_err(),
            CoreError::ValidationError("source is required.".into())
        );
        assert!(required(None, "source").is_err());
    }

    #[test]
    fn test_schedule_formats() {
        assert!(parse_date("2025-03-14", "date").is_ok());
        assert!(parse_date("14/03/2025", "date").is_err());
        assert!(parse_time("07:45", "time").is_ok());
        assert!(parse_time("7.45pm", "time").is_err());
    }
}
