//! Coercions from the many shapes a tag value can take (text, locators,
//! raw byte payloads, base64 text) into canonical trimmed text or bytes.
//! Nothing in here returns an error: a value that can't be coerced is `None`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use lofty::tag::ItemValue;
use symphonia::core::meta::Value;

/// Trim a string, collapsing whitespace-only input to `None`. Every textual
/// field in the library goes through this, so `Some("")` can never escape.
pub fn clean_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Decode bytes as UTF-8, dropping invalid sequences rather than failing.
pub fn bytes_to_text(bytes: &[u8]) -> Option<String> {
    let decoded: String = String::from_utf8_lossy(bytes)
        .chars()
        .filter(|&c| c != char::REPLACEMENT_CHARACTER)
        .collect();
    clean_text(&decoded)
}

/// Coerce a lofty tag value to trimmed text.
pub fn coerce_text(value: &ItemValue) -> Option<String> {
    match value {
        ItemValue::Text(s) | ItemValue::Locator(s) => clean_text(s),
        ItemValue::Binary(bytes) => bytes_to_text(bytes),
    }
}

/// Coerce a lofty tag value to a binary payload. Text is treated as base64,
/// the convention for picture blocks smuggled through text-only tag schemes.
pub fn coerce_bytes(value: &ItemValue) -> Option<Vec<u8>> {
    match value {
        ItemValue::Binary(bytes) => {
            if bytes.is_empty() {
                None
            } else {
                Some(bytes.clone())
            }
        }
        ItemValue::Text(s) | ItemValue::Locator(s) => decode_base64(s),
    }
}

/// Coerce a symphonia metadata value to trimmed text.
pub fn coerce_value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => clean_text(s),
        Value::Binary(bytes) => bytes_to_text(bytes),
        Value::Boolean(_) | Value::Flag => None,
        other => clean_text(&other.to_string()),
    }
}

/// Base64-decode, tolerating surrounding whitespace. Failures yield `None`.
pub fn decode_base64(text: &str) -> Option<Vec<u8>> {
    let compact: String = text.split_whitespace().collect();
    if compact.is_empty() {
        return None;
    }
    match BASE64.decode(compact.as_bytes()) {
        Ok(bytes) if !bytes.is_empty() => Some(bytes),
        Ok(_) => None,
        Err(e) => {
            log::debug!("Base64 decode failed: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_never_returns_empty() {
        assert_eq!(clean_text("  Daft Punk  "), Some("Daft Punk".to_string()));
        assert_eq!(clean_text("   "), None);
        assert_eq!(clean_text(""), None);
    }

    #[test]
    fn binary_values_decode_as_utf8() {
        let value = ItemValue::Binary(b"  Digital Love ".to_vec());
        assert_eq!(coerce_text(&value), Some("Digital Love".to_string()));
    }

    #[test]
    fn invalid_utf8_sequences_are_dropped() {
        let value = ItemValue::Binary(vec![b'1', b'1', b'B', 0xFF, 0xFE]);
        assert_eq!(coerce_text(&value), Some("11B".to_string()));
    }

    #[test]
    fn all_invalid_bytes_yield_none() {
        assert_eq!(bytes_to_text(&[0xFF, 0xFE, 0xFD]), None);
    }

    #[test]
    fn text_values_decode_as_base64_bytes() {
        let value = ItemValue::Text("aGVsbG8=".to_string());
        assert_eq!(coerce_bytes(&value), Some(b"hello".to_vec()));
    }

    #[test]
    fn bad_base64_is_none_not_a_panic() {
        assert_eq!(coerce_bytes(&ItemValue::Text("not base64!!!".into())), None);
        assert_eq!(coerce_bytes(&ItemValue::Text(String::new())), None);
    }

    #[test]
    fn base64_tolerates_line_breaks() {
        assert_eq!(decode_base64("aGVs\nbG8="), Some(b"hello".to_vec()));
    }

    #[test]
    fn empty_binary_is_none() {
        assert_eq!(coerce_bytes(&ItemValue::Binary(Vec::new())), None);
    }

    #[test]
    fn symphonia_string_values_are_trimmed() {
        assert_eq!(
            coerce_value_text(&Value::String(" 125 ".into())),
            Some("125".to_string())
        );
        assert_eq!(coerce_value_text(&Value::Flag), None);
    }
}
