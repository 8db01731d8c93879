//! Canonical timestamp handling.
//!
//! Every timestamp that reaches serialized bytes is UTC with millisecond
//! precision and rendered as `YYYY-MM-DDTHH:MM:SS.mmmZ`, so a vault that is
//! parsed and written again produces the same text.

use chrono::{DateTime, SecondsFormat, Utc};

use lockbox_common::{Error, Result};

/// Current time truncated to whole milliseconds.
pub fn now() -> DateTime<Utc> {
    truncate(Utc::now())
}

/// Drop sub-millisecond precision.
pub fn truncate(value: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(value.timestamp_millis()).unwrap_or(value)
}

/// Render in the canonical form.
pub fn format(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse any RFC 3339 timestamp, converting to UTC milliseconds.
pub fn parse(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .map(|dt| truncate(dt.with_timezone(&Utc)))
        .map_err(|e| Error::Serialization(format!("Invalid timestamp '{}': {}", text, e)))
}

/// Serde adapter for `DateTime<Utc>` fields.
pub mod canonical {
    use chrono::{DateTime, Utc};
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse(&text).map_err(D::Error::custom)
    }
}

/// Serde adapter for `Option<DateTime<Utc>>` fields.
pub mod canonical_option {
    use chrono::{DateTime, Utc};
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_some(&super::format(value)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) => super::parse(&text).map(Some).map_err(D::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_is_fixed_width_millis() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        assert_eq!(format(&dt), "2024-03-05T07:08:09.000Z");
    }

    #[test]
    fn test_parse_normalizes_offset_and_precision() {
        let dt = parse("2024-03-05T09:08:09.123456+02:00").unwrap();
        assert_eq!(format(&dt), "2024-03-05T07:08:09.123Z");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("yesterday").is_err());
    }

    #[test]
    fn test_now_has_no_sub_millis() {
        let value = now();
        assert_eq!(parse(&format(&value)).unwrap(), value);
    }
}
