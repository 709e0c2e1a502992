//! Telemetry response decoder.
//!
//! Wire format (one response):
//! ```text
//! NAME&unit:<unit>&value:<int>#NAME&unit:<unit>&value:<int>#...
//! ```
//!
//! Callers probe one metric name at a time against the same response
//! text. A record matches only when its leading name equals the token
//! exactly (`TEMP` does not match `TEMPX`). The value is an optional `-`
//! followed by decimal digits, with no surrounding whitespace; a leading
//! `+` is malformed. Unknown records and unknown
//! fields inside a matching record are ignored.

use crate::error::DecodeError;
use crate::sensors::Metric;

pub const RECORD_SEPARATOR: char = '#';
const FIELD_SEPARATOR: char = '&';
const UNIT_PREFIX: &str = "unit:";
const VALUE_PREFIX: &str = "value:";

/// Unit strings longer than this are rejected as malformed.
pub const MAX_UNIT_LEN: usize = 20;

pub type Unit = heapless::String<MAX_UNIT_LEN>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    pub unit: Unit,
    pub value: i32,
}

/// Find the record named `token` in `text` and extract its unit and value.
pub fn decode(text: &str, token: &str) -> Result<Reading, DecodeError> {
    let record = text
        .split(RECORD_SEPARATOR)
        .find(|r| r.split(FIELD_SEPARATOR).next() == Some(token))
        .ok_or(DecodeError::TokenNotFound)?;

    let mut unit = None;
    let mut value = None;
    for field in record.split(FIELD_SEPARATOR).skip(1) {
        if unit.is_none() {
            if let Some(u) = field.strip_prefix(UNIT_PREFIX) {
                unit = Some(u);
                continue;
            }
        }
        if value.is_none() {
            if let Some(v) = field.strip_prefix(VALUE_PREFIX) {
                value = Some(v);
            }
        }
    }

    let unit = parse_unit(unit.ok_or(DecodeError::MalformedUnit)?)?;
    let value = parse_value(value.ok_or(DecodeError::MalformedValue)?)?;

    Ok(Reading { unit, value })
}

fn parse_value(raw: &str) -> Result<i32, DecodeError> {
    // `i32::from_str` would also take `+20`.
    if raw.starts_with('+') {
        return Err(DecodeError::MalformedValue);
    }
    raw.parse::<i32>().map_err(|_| DecodeError::MalformedValue)
}

/// Convenience wrapper probing the wire token of `metric`.
pub fn decode_metric(text: &str, metric: Metric) -> Result<Reading, DecodeError> {
    decode(text, metric.token())
}

fn parse_unit(raw: &str) -> Result<Unit, DecodeError> {
    if raw.is_empty() {
        return Err(DecodeError::MalformedUnit);
    }
    let mut unit = Unit::new();
    unit.push_str(raw).map_err(|_| DecodeError::MalformedUnit)?;
    Ok(unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "TEMP&unit:celsius&value:20#HUM&unit:percentage&value:80";

    #[test]
    fn decodes_temperature() {
        let r = decode(SAMPLE, "TEMP").unwrap();
        assert_eq!(r.unit.as_str(), "celsius");
        assert_eq!(r.value, 20);
    }

    #[test]
    fn decodes_humidity() {
        let r = decode(SAMPLE, "HUM").unwrap();
        assert_eq!(r.unit.as_str(), "percentage");
        assert_eq!(r.value, 80);
    }

    #[test]
    fn unknown_token_is_not_found() {
        assert_eq!(decode(SAMPLE, "PRESSURE"), Err(DecodeError::TokenNotFound));
    }

    #[test]
    fn name_must_match_exactly() {
        assert_eq!(decode(SAMPLE, "TEM"), Err(DecodeError::TokenNotFound));
        assert_eq!(
            decode("TEMPX&unit:c&value:1", "TEMP"),
            Err(DecodeError::TokenNotFound)
        );
    }

    #[test]
    fn negative_values_parse() {
        let r = decode("TEMP&unit:celsius&value:-12", "TEMP").unwrap();
        assert_eq!(r.value, -12);
    }

    #[test]
    fn whitespace_around_value_is_rejected() {
        assert_eq!(
            decode("TEMP&unit:celsius&value: 20", "TEMP"),
            Err(DecodeError::MalformedValue)
        );
        assert_eq!(
            decode("TEMP&unit:celsius&value:20 ", "TEMP"),
            Err(DecodeError::MalformedValue)
        );
    }

    #[test]
    fn explicit_plus_sign_is_rejected() {
        assert_eq!(
            decode("TEMP&unit:celsius&value:+20", "TEMP"),
            Err(DecodeError::MalformedValue)
        );
        assert_eq!(
            decode("TEMP&unit:celsius&value:-+20", "TEMP"),
            Err(DecodeError::MalformedValue)
        );
    }

    #[test]
    fn missing_fields_are_malformed() {
        assert_eq!(decode("TEMP&value:20", "TEMP"), Err(DecodeError::MalformedUnit));
        assert_eq!(decode("TEMP&unit:celsius", "TEMP"), Err(DecodeError::MalformedValue));
        assert_eq!(decode("TEMP&unit:&value:1", "TEMP"), Err(DecodeError::MalformedUnit));
    }

    #[test]
    fn overflowing_value_is_malformed() {
        assert_eq!(
            decode("TEMP&unit:c&value:99999999999", "TEMP"),
            Err(DecodeError::MalformedValue)
        );
    }

    #[test]
    fn oversized_unit_is_malformed() {
        let text = format!("HUM&unit:{}&value:1", "x".repeat(MAX_UNIT_LEN + 1));
        assert_eq!(decode(&text, "HUM"), Err(DecodeError::MalformedUnit));
    }

    #[test]
    fn status_responses_carry_no_metrics() {
        for text in [super::super::RESPONSE_OFF, super::super::RESPONSE_INVALID, ""] {
            assert_eq!(decode(text, "TEMP"), Err(DecodeError::TokenNotFound));
        }
    }

    #[test]
    fn record_order_does_not_matter() {
        let text = "HUM&unit:percentage&value:41#NOISE#TEMP&unit:celsius&value:22";
        assert_eq!(decode_metric(text, Metric::Temperature).unwrap().value, 22);
        assert_eq!(decode_metric(text, Metric::Humidity).unwrap().value, 41);
    }
}
