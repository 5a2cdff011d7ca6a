// crates/otto-bgp-core/src/time.rs
// ============================================================================
// Module: Timestamp
// Description: ISO-8601 wall-clock timestamp shared by every dated entity.
// Dependencies: time, serde
// ============================================================================

//! ## Overview
//! All entity timestamps (`generated_at`, `recorded_at`, `created_at`, ...)
//! share one representation so comparisons and serialization are consistent
//! across crates.

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// A UTC wall-clock instant, serialized as RFC 3339 / ISO-8601.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(#[serde(with = "rfc3339")] OffsetDateTime);

impl Timestamp {
    /// Wrap a given instant.
    #[must_use]
    pub fn new(instant: OffsetDateTime) -> Self {
        Self(instant)
    }

    /// The current instant.
    #[must_use]
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// The wrapped instant.
    #[must_use]
    pub fn as_offset_date_time(&self) -> OffsetDateTime {
        self.0
    }

    /// Elapsed whole seconds from `self` to `other`, saturating at zero when
    /// `other` precedes `self`.
    #[must_use]
    pub fn seconds_until(&self, other: Timestamp) -> i64 {
        (other.0 - self.0).whole_seconds().max(0)
    }

    /// Format as RFC 3339, e.g. `2026-07-28T00:00:00Z`.
    ///
    /// # Panics
    /// Never: `OffsetDateTime` is always formattable as RFC 3339.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
    }

    /// Render a checkpoint-id-style compact stamp: `YYYYMMDD_HHMMSS`.
    #[must_use]
    pub fn to_compact_stamp(&self) -> String {
        let d = self.0;
        format!(
            "{:04}{:02}{:02}_{:02}{:02}{:02}",
            d.year(),
            u8::from(d.month()),
            d.day(),
            d.hour(),
            d.minute(),
            d.second()
        )
    }
}

mod rfc3339 {
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;
    use time::OffsetDateTime;
    use time::format_description::well_known::Rfc3339;

    pub fn serialize<S: Serializer>(value: &OffsetDateTime, ser: S) -> Result<S::Ok, S::Error> {
        let text = value
            .format(&Rfc3339)
            .map_err(serde::ser::Error::custom)?;
        ser.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<OffsetDateTime, D::Error> {
        let text = String::deserialize(de)?;
        OffsetDateTime::parse(&text, &Rfc3339).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::Timestamp;

    #[test]
    fn round_trips_through_json() {
        let ts = Timestamp::now();
        let json = serde_json::to_string(&ts).expect("serialize");
        let back: Timestamp = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(ts, back);
    }

    #[test]
    fn seconds_until_saturates_at_zero() {
        let ts = Timestamp::now();
        assert_eq!(ts.seconds_until(ts), 0);
    }

    #[test]
    fn compact_stamp_has_expected_shape() {
        let ts = Timestamp::now();
        let stamp = ts.to_compact_stamp();
        assert_eq!(stamp.len(), 15);
        assert_eq!(stamp.as_bytes()[8], b'_');
    }
}
