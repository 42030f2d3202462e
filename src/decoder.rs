//! Sensor payload decoder
//!
//! Turns the JSON envelope into an [`OrderedRecord`]: keys are read from the
//! framing tokens, the body is de-obfuscated twice, and the field separator is
//! recovered from the decrypted content itself.

use regex::bytes::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

use crate::error::DecodeError;
use crate::transform::{ByteTransform, CharSubstitution, FieldShuffle};
use crate::types::{FieldValue, OrderedRecord, ENCRYPTED, KEY, RAW, SENSOR_VALUE};

/// Second top-level field of every decrypted payload, framed by the separator tail
const SEPARATOR_MARKER: &str = ",2,";

/// Leading chunks consumed by separator discovery
const FRAMING_CHUNKS: usize = 2;

#[derive(Debug, Deserialize)]
struct Envelope {
    sensor_data: String,
}

fn framing_prefix() -> &'static Regex {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    PREFIX.get_or_init(|| {
        Regex::new(r"^\d+;\d+;\d+;[\d,]+;").expect("framing prefix pattern is valid")
    })
}

/// Decode with the reference transform pair (stateless, one-shot).
pub fn decode_payload(payload: &str) -> Result<OrderedRecord, DecodeError> {
    SensorDecoder::default().decode(payload)
}

/// Extract the sensor blob from a JSON envelope
pub fn parse_envelope(payload: &str) -> Result<String, DecodeError> {
    let envelope: Envelope = serde_json::from_str(payload)?;
    Ok(envelope.sensor_data)
}

/// Read key1 and key2 from the 2nd and 3rd `;` tokens of the blob.
///
/// Non-numeric tokens give a zero key instead of an error; payloads relying on
/// this still decode, just with the wrong keys.
pub fn parse_keys(blob: &str) -> Result<(u32, u32), DecodeError> {
    let tokens: Vec<&str> = blob.split(';').collect();
    if tokens.len() < 3 {
        return Err(DecodeError::MalformedKeys(tokens.len()));
    }
    Ok((lenient_key(tokens[1]), lenient_key(tokens[2])))
}

fn lenient_key(token: &str) -> u32 {
    // negative keys wrap like an unsigned 32-bit cast
    token.parse::<i64>().map(|k| k as u32).unwrap_or(0)
}

/// Recover the field separator from decrypted bytes.
///
/// The first byte is a sentinel and is skipped; the separator is everything up
/// to the first `,2,` plus a trailing comma.
pub fn discover_separator(raw: &[u8]) -> Result<String, DecodeError> {
    if raw.is_empty() {
        return Err(DecodeError::MalformedRecord("decrypted payload is empty".to_string()));
    }
    let body = &raw[1..];
    let end = body
        .windows(SEPARATOR_MARKER.len())
        .position(|w| w == SEPARATOR_MARKER.as_bytes())
        .ok_or_else(|| {
            DecodeError::MalformedRecord(format!(
                "no '{}' marker in decrypted payload",
                SEPARATOR_MARKER
            ))
        })?;
    let head = std::str::from_utf8(&body[..end])
        .map_err(|e| DecodeError::MalformedRecord(format!("separator is not UTF-8: {}", e)))?;
    Ok(format!("{},", head))
}

/// Chunks of `raw` after the two framing chunks: key, sensor value, then id/value pairs
pub fn split_chunks(raw: &[u8]) -> Result<Vec<String>, DecodeError> {
    let separator = discover_separator(raw)?;
    let text = std::str::from_utf8(raw).map_err(|e| {
        DecodeError::MalformedRecord(format!("decrypted payload is not UTF-8: {}", e))
    })?;
    Ok(text
        .split(separator.as_str())
        .skip(FRAMING_CHUNKS)
        .map(str::to_string)
        .collect())
}

/// Decoder parameterized over the two de-obfuscation passes
pub struct SensorDecoder<F, S> {
    first: F,
    second: S,
}

impl Default for SensorDecoder<CharSubstitution, FieldShuffle> {
    fn default() -> Self {
        Self::new(CharSubstitution, FieldShuffle)
    }
}

impl<F: ByteTransform, S: ByteTransform> SensorDecoder<F, S> {
    /// `first` runs with key1, `second` with key2 on the output of `first`
    pub fn new(first: F, second: S) -> Self {
        Self { first, second }
    }

    /// Decode a JSON envelope into an ordered record
    pub fn decode(&self, payload: &str) -> Result<OrderedRecord, DecodeError> {
        let blob = parse_envelope(payload)?;
        let (key1, key2) = parse_keys(&blob)?;
        log::debug!("sensor keys: key1={} key2={}", key1, key2);

        let encrypted = blob.into_bytes();
        let body = match framing_prefix().find(&encrypted) {
            Some(prefix) => {
                log::debug!("stripped {} byte framing prefix", prefix.end());
                &encrypted[prefix.end()..]
            }
            None => &encrypted[..],
        };

        let pass = self.first.transform(body, key1)?;
        let raw = self.second.transform(&pass, key2)?;

        let chunks = split_chunks(&raw)?;
        if chunks.len() < 2 {
            return Err(DecodeError::MalformedRecord(format!(
                "expected key and sensor value chunks, found {} chunk(s)",
                chunks.len()
            )));
        }
        log::debug!("decrypted payload split into {} chunks", chunks.len());

        let mut chunks = chunks.into_iter();
        let mut record = OrderedRecord::new();
        // len() >= 2 checked above
        record.push(KEY, FieldValue::Text(chunks.next().unwrap_or_default()));
        record.push(SENSOR_VALUE, FieldValue::Text(chunks.next().unwrap_or_default()));
        record.push(RAW, FieldValue::Bytes(raw));
        record.push(ENCRYPTED, FieldValue::Bytes(encrypted));

        while let Some(id) = chunks.next() {
            match chunks.next() {
                Some(value) => record.push(id, FieldValue::Text(value)),
                None => log::warn!("dropping field id {:?} without a value", id),
            }
        }

        Ok(record)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::TransformError;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    pub(crate) const KEY1: u32 = 1_234_567;
    pub(crate) const KEY2: u32 = 7_654_321;
    pub(crate) const SEP: &str = ",|~,";

    /// Raw decrypted bytes for the given dynamic pairs
    pub(crate) fn raw_payload(pairs: &[(&str, &str)]) -> String {
        let mut parts: Vec<String> = ["7", "2", "k3y", "0.5"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        for (id, value) in pairs {
            parts.push(id.to_string());
            parts.push(value.to_string());
        }
        parts.join(SEP)
    }

    /// Full JSON envelope whose sensor blob decrypts to `raw_payload(pairs)`
    pub(crate) fn envelope(pairs: &[(&str, &str)]) -> String {
        let raw = raw_payload(pairs);
        let shuffled = FieldShuffle.obfuscate(raw.as_bytes(), KEY2);
        let hidden = CharSubstitution.obfuscate(&shuffled, KEY1).unwrap();
        let blob = format!(
            "2;{};{};1600,1601,1602,1603,1604;{}",
            KEY1,
            KEY2,
            String::from_utf8(hidden).unwrap()
        );
        serde_json::json!({ "sensor_data": blob }).to_string()
    }

    #[test]
    fn test_separator_discovery() {
        for head in ["xq-9", "|~", "a,b", ",|~", "-94,", "é"] {
            let raw = format!("#{}{}tail,more", head, SEPARATOR_MARKER);
            assert_eq!(discover_separator(raw.as_bytes()).unwrap(), format!("{},", head));
        }
    }

    #[test]
    fn test_chunks_split_on_comma_separators() {
        // separators open and close with a comma so that ",2," follows the sentinel chunk
        for sep in [",|~,", ",a,b,", ",,"] {
            let raw = ["7", "2", "k3y", "0.5", "-1", "x"].join(sep);
            assert_eq!(discover_separator(raw.as_bytes()).unwrap(), sep);
            assert_eq!(
                split_chunks(raw.as_bytes()).unwrap(),
                vec!["k3y", "0.5", "-1", "x"]
            );
        }
    }

    #[test]
    fn test_invalid_utf8_is_rejected() {
        let raw = b"#ab,2,ab,k3y\xffab,0.5";
        assert!(matches!(
            split_chunks(raw),
            Err(DecodeError::MalformedRecord(msg)) if msg.contains("not UTF-8")
        ));
        assert!(matches!(
            discover_separator(b"#\xfe,2,tail"),
            Err(DecodeError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_separator_skips_sentinel_byte() {
        // a marker starting at offset 0 is not visible to the scan
        let raw = b",2,ab,2,cd";
        assert_eq!(discover_separator(raw).unwrap(), "2,ab,");
    }

    #[test]
    fn test_separator_missing_marker() {
        assert!(matches!(
            discover_separator(b"#nothing here"),
            Err(DecodeError::MalformedRecord(_))
        ));
        assert!(matches!(discover_separator(b""), Err(DecodeError::MalformedRecord(_))));
    }

    #[test]
    fn test_decode_field_order() {
        let pairs = [("-100", "ua,uaend"), ("-112", "https://example.com/"), ("-70", "fp;1")];
        let record = decode_payload(&envelope(&pairs)).unwrap();

        assert_eq!(record.len(), 4 + pairs.len());
        assert_eq!(&record.order()[..4], &[KEY, SENSOR_VALUE, RAW, ENCRYPTED]);
        assert_eq!(&record.order()[4..], &["-100", "-112", "-70"]);
        assert_eq!(record.text(KEY).unwrap(), "k3y");
        assert_eq!(record.text(SENSOR_VALUE).unwrap(), "0.5");
        assert_eq!(record.text("-112").unwrap(), "https://example.com/");
        assert_eq!(record.bytes(RAW).unwrap(), raw_payload(&pairs).as_bytes());
    }

    #[test]
    fn test_encrypted_keeps_prefix() {
        let payload = envelope(&[("-1", "x")]);
        let record = decode_payload(&payload).unwrap();
        let encrypted = String::from_utf8(record.bytes(ENCRYPTED).unwrap().to_vec()).unwrap();

        assert!(encrypted.starts_with(&format!("2;{};{};1600,", KEY1, KEY2)));
    }

    #[test]
    fn test_duplicate_id_keeps_last_value() {
        let record = decode_payload(&envelope(&[("5", "a"), ("6", "z"), ("5", "b")])).unwrap();

        assert_eq!(record.len(), 7);
        assert_eq!(&record.order()[4..], &["5", "6", "5"]);
        assert_eq!(record.text("5").unwrap(), "b");
    }

    #[test]
    fn test_dangling_id_is_dropped() {
        let raw = format!("{}{}-200", raw_payload(&[("-1", "x")]), SEP);
        let chunks = split_chunks(raw.as_bytes()).unwrap();
        assert_eq!(chunks, vec!["k3y", "0.5", "-1", "x", "-200"]);

        struct Identity;
        impl ByteTransform for Identity {
            fn transform(&self, input: &[u8], _key: u32) -> Result<Vec<u8>, TransformError> {
                Ok(input.to_vec())
            }
        }
        let payload = serde_json::json!({ "sensor_data": format!("0;0;0;1;{}", raw) }).to_string();
        let record = SensorDecoder::new(Identity, Identity).decode(&payload).unwrap();
        assert_eq!(record.len(), 5);
        assert!(!record.contains("-200"));
    }

    #[test]
    fn test_envelope_errors() {
        assert!(matches!(
            decode_payload("not json"),
            Err(DecodeError::MalformedEnvelope(_))
        ));
        assert!(matches!(
            decode_payload(r#"{"other": "x"}"#),
            Err(DecodeError::MalformedEnvelope(_))
        ));
        assert!(matches!(
            decode_payload(r#"{"sensor_data": 12}"#),
            Err(DecodeError::MalformedEnvelope(_))
        ));
    }

    #[test]
    fn test_too_few_key_tokens() {
        let err = decode_payload(r#"{"sensor_data": "2;5"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedKeys(2)));
        assert_eq!(err.stage(), "KEYS");
    }

    #[test]
    fn test_non_numeric_keys_fall_back_to_zero() {
        assert_eq!(parse_keys("2;abc;;rest").unwrap(), (0, 0));
        assert_eq!(parse_keys("2;-1;17;rest").unwrap(), (u32::MAX, 17));
    }

    #[test]
    fn test_zero_keys_still_decode() {
        struct Recording(RefCell<Vec<u32>>);
        impl ByteTransform for Recording {
            fn transform(&self, input: &[u8], key: u32) -> Result<Vec<u8>, TransformError> {
                self.0.borrow_mut().push(key);
                Ok(input.to_vec())
            }
        }

        // no framing prefix matches, so the key tokens stay in the body
        let blob = "2;k;k;,2,;k;k;,k3y;k;k;,0.5;k;k;,-1;k;k;,x";
        let payload = serde_json::json!({ "sensor_data": blob }).to_string();
        let recording = Recording(RefCell::new(Vec::new()));

        let record = SensorDecoder::new(&recording, &recording).decode(&payload).unwrap();
        assert_eq!(*recording.0.borrow(), vec![0, 0]);
        assert_eq!(record.text(KEY).unwrap(), "k3y");
        assert_eq!(record.text("-1").unwrap(), "x");
    }

    #[test]
    fn test_transform_failure_is_fatal() {
        struct Broken;
        impl ByteTransform for Broken {
            fn transform(&self, _input: &[u8], key: u32) -> Result<Vec<u8>, TransformError> {
                Err(TransformError {
                    transform: "broken",
                    key,
                    reason: "always fails".to_string(),
                })
            }
        }
        let decoder = SensorDecoder::new(CharSubstitution, Broken);
        let err = decoder.decode(&envelope(&[])).unwrap_err();
        assert_eq!(err.stage(), "TRANSFORM");
    }

    #[test]
    fn test_short_record_is_fatal() {
        let blob = format!("2;{};{};1;{}", KEY1, KEY2, "#,2,");
        let payload = serde_json::json!({ "sensor_data": blob }).to_string();
        let decoder = SensorDecoder::new(FieldShuffle, FieldShuffle);
        // whatever the shuffle produces, a 4-byte body cannot hold key and value chunks
        assert!(decoder.decode(&payload).is_err());
    }
}
