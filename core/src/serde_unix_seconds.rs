//! `Option<DateTime<Utc>>` persisted as fractional unix seconds.
//!
//! Older documents carry a bare float (`1718000000.25`); integers and RFC 3339
//! strings are accepted too so hand-edited files still load.

use chrono::{DateTime, TimeZone, Utc};
use serde::de::Error;
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(ts) => serializer.serialize_f64(ts.timestamp_millis() as f64 / 1000.0),
        None => serializer.serialize_none(),
    }
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TimestampInput {
        Seconds(f64),
        Text(String),
    }

    match Option::<TimestampInput>::deserialize(deserializer)? {
        None => Ok(None),
        Some(TimestampInput::Seconds(secs)) => {
            if !secs.is_finite() {
                return Err(D::Error::custom("timestamp is not finite"));
            }
            let millis = (secs * 1000.0).round() as i64;
            Utc.timestamp_millis_opt(millis)
                .single()
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {secs}")))
        }
        Some(TimestampInput::Text(raw)) => DateTime::parse_from_rfc3339(&raw)
            .map(|ts| Some(ts.with_timezone(&Utc)))
            .map_err(D::Error::custom),
    }
}
