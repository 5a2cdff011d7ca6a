// crates/otto-bgp-rpki/src/parser.rs
// ============================================================================
// Module: VRP source parsers
// Description: Normalize rpki-client, Routinator, and Otto BGP's own cached
// VRP JSON shapes into `Vec<VrpEntry>` (section 4.2).
// Purpose: Keep the three upstream wire shapes isolated from the rest of
// the crate, which only ever sees `VrpEntry`/`VrpDataset`.
// Dependencies: serde_json, ipnet, otto-bgp-core
// ============================================================================

use ipnet::Ipv4Net;
use otto_bgp_core::Asn;
use otto_bgp_core::Timestamp;
use otto_bgp_core::VrpDataset;
use otto_bgp_core::VrpEntry;
use otto_bgp_core::VrpSourceFormat;
use serde::Deserialize;
use serde_json::Value;

use crate::error::RpkiError;

/// Accepts either a bare integer ASN or an `"ASxxxx"` string, matching the
/// leniency upstream RPKI tooling shows in practice.
fn parse_asn_value(value: &Value) -> Option<Asn> {
    match value {
        Value::Number(n) => n.as_u64().map(|v| Asn::new(v as u32)),
        Value::String(s) => {
            let trimmed = s.strip_prefix("AS").unwrap_or(s);
            trimmed.parse::<u32>().ok().map(Asn::new)
        }
        _ => None,
    }
}

fn build_entry(prefix_str: &str, asn: Asn, max_length: Option<u8>, trust_anchor: &str) -> Option<VrpEntry> {
    let prefix: Ipv4Net = prefix_str.parse().ok()?;
    let max_length = max_length.unwrap_or_else(|| prefix.prefix_len());
    VrpEntry::new(asn, prefix, max_length, trust_anchor).ok()
}

fn trust_anchor_of(value: &Value) -> &str {
    value.get("ta").and_then(Value::as_str).unwrap_or("")
}

/// Auto-detect which upstream shape a VRP document uses, by the top-level
/// key it carries (§4.2; mirrors the original's `roas` / cached-marker
/// detection order).
#[must_use]
pub fn detect_format(document: &Value) -> Option<VrpSourceFormat> {
    if document.get("roas").is_some() {
        Some(VrpSourceFormat::RpkiClient)
    } else if document.get("validated-roa-payloads").is_some() {
        Some(VrpSourceFormat::Routinator)
    } else if document.get("vrp_entries").is_some() {
        Some(VrpSourceFormat::Cached)
    } else {
        None
    }
}

/// Parse an rpki-client `{"roas": [...]}` document.
#[must_use]
pub fn parse_rpki_client(document: &Value, generated_time: Timestamp) -> VrpDataset {
    let entries = document
        .get("roas")
        .and_then(Value::as_array)
        .map(|roas| {
            roas.iter()
                .filter_map(|roa| {
                    let prefix = roa.get("prefix")?.as_str()?;
                    let asn = parse_asn_value(roa.get("asn")?)?;
                    let max_length = roa.get("maxLength").and_then(Value::as_u64).map(|v| v as u8);
                    build_entry(prefix, asn, max_length, trust_anchor_of(roa))
                })
                .collect()
        })
        .unwrap_or_default();
    VrpDataset::new(entries, generated_time, VrpSourceFormat::RpkiClient, None)
}

/// Parse a Routinator `{"validated-roa-payloads": [...]}` document.
#[must_use]
pub fn parse_routinator(document: &Value, generated_time: Timestamp) -> VrpDataset {
    let entries = document
        .get("validated-roa-payloads")
        .and_then(Value::as_array)
        .map(|vrps| {
            vrps.iter()
                .filter_map(|vrp| {
                    let prefix = vrp.get("prefix")?.as_str()?;
                    let asn = parse_asn_value(vrp.get("asn")?)?;
                    let max_length = vrp
                        .get("max-length")
                        .or_else(|| vrp.get("max_length"))
                        .and_then(Value::as_u64)
                        .map(|v| v as u8);
                    build_entry(prefix, asn, max_length, trust_anchor_of(vrp))
                })
                .collect()
        })
        .unwrap_or_default();
    VrpDataset::new(entries, generated_time, VrpSourceFormat::Routinator, None)
}

#[derive(Deserialize)]
struct CachedEntry {
    asn: u32,
    prefix: String,
    max_length: u8,
    #[serde(default, rename = "ta")]
    trust_anchor: String,
}

#[derive(Deserialize)]
struct CachedDataset {
    vrp_entries: Vec<CachedEntry>,
    #[serde(default)]
    generated_time: Option<String>,
    #[serde(default)]
    expires_time: Option<String>,
}

fn parse_rfc3339(text: &str) -> Option<time::OffsetDateTime> {
    time::OffsetDateTime::parse(text, &time::format_description::well_known::Rfc3339).ok()
}

/// Parse Otto BGP's own canonical cache shape, produced by
/// [`crate::store::VrpStore::persist`].
///
/// # Errors
/// Returns [`RpkiError::Json`] if the document does not match the cached
/// schema.
pub fn parse_cached(document: &Value, fallback_generated: Timestamp) -> Result<VrpDataset, RpkiError> {
    let cached: CachedDataset =
        serde_json::from_value(document.clone()).map_err(|source| RpkiError::Json {
            path: "<cached vrp document>".to_owned(),
            source,
        })?;
    let entries = cached
        .vrp_entries
        .into_iter()
        .filter_map(|entry| {
            let prefix: Ipv4Net = entry.prefix.parse().ok()?;
            VrpEntry::new(Asn::new(entry.asn), prefix, entry.max_length, entry.trust_anchor).ok()
        })
        .collect();
    let generated_time = cached
        .generated_time
        .as_deref()
        .and_then(parse_rfc3339)
        .map(Timestamp::new)
        .unwrap_or(fallback_generated);
    let expires_time = cached
        .expires_time
        .as_deref()
        .and_then(parse_rfc3339)
        .map(Timestamp::new);
    Ok(VrpDataset::new(
        entries,
        generated_time,
        VrpSourceFormat::Cached,
        expires_time,
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detects_rpki_client_by_roas_key() {
        let doc = json!({"roas": []});
        assert_eq!(detect_format(&doc), Some(VrpSourceFormat::RpkiClient));
    }

    #[test]
    fn detects_routinator_by_payloads_key() {
        let doc = json!({"validated-roa-payloads": []});
        assert_eq!(detect_format(&doc), Some(VrpSourceFormat::Routinator));
    }

    #[test]
    fn unknown_shape_detects_as_none() {
        let doc = json!({"something_else": []});
        assert_eq!(detect_format(&doc), None);
    }

    #[test]
    fn rpki_client_parses_string_asn_and_defaults_max_length() {
        let doc = json!({
            "roas": [
                {"asn": "AS13335", "prefix": "1.1.1.0/24", "ta": "ripe"},
                {"asn": 64512, "prefix": "10.0.0.0/8", "maxLength": 16},
            ]
        });
        let dataset = parse_rpki_client(&doc, Timestamp::now());
        assert_eq!(dataset.entries().len(), 2);
        let first = &dataset.entries()[0];
        assert_eq!(first.asn().value(), 13335);
        assert_eq!(first.max_length(), 24);
        assert_eq!(first.trust_anchor(), "ripe");
        assert_eq!(dataset.entries()[1].trust_anchor(), "");
    }

    #[test]
    fn routinator_parses_hyphenated_max_length_key() {
        let doc = json!({
            "validated-roa-payloads": [
                {"asn": "AS64500", "prefix": "192.0.2.0/24", "max-length": 24, "ta": "arin"}
            ]
        });
        let dataset = parse_routinator(&doc, Timestamp::now());
        assert_eq!(dataset.entries().len(), 1);
        assert_eq!(dataset.entries()[0].max_length(), 24);
        assert_eq!(dataset.entries()[0].trust_anchor(), "arin");
    }

    #[test]
    fn malformed_roa_entries_are_skipped_not_fatal() {
        let doc = json!({
            "roas": [
                {"asn": "not-a-number", "prefix": "1.1.1.0/24"},
                {"asn": 13335, "prefix": "not-a-prefix"},
                {"asn": 13335, "prefix": "1.1.1.0/24"},
            ]
        });
        let dataset = parse_rpki_client(&doc, Timestamp::now());
        assert_eq!(dataset.entries().len(), 1);
    }

    #[test]
    fn cached_round_trips_generated_time() {
        let doc = json!({
            "vrp_entries": [{"asn": 13335, "prefix": "1.1.1.0/24", "max_length": 24, "ta": "apnic"}],
            "generated_time": "2024-01-01T00:00:00Z",
        });
        let dataset = parse_cached(&doc, Timestamp::now()).unwrap();
        assert_eq!(dataset.entries().len(), 1);
        assert_eq!(dataset.entries()[0].trust_anchor(), "apnic");
    }
}
