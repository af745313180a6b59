use anyhow::{Result, anyhow};
use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD},
};

/// Length of an uncompressed P-256 public key (0x04 || x || y).
pub const APPLICATION_SERVER_KEY_LEN: usize = 65;

/// Decode a VAPID public key from its URL-safe base64 transport form into the
/// raw bytes the push subscription API takes as `applicationServerKey`.
///
/// The key usually arrives without padding, so `=` is appended up to a
/// multiple of 4 and `-`/`_` are mapped back to `+`/`/` before a standard
/// base64 decode.
pub fn decode_vapid_key(encoded: &str) -> Result<Vec<u8>> {
    let trimmed = encoded.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("VAPID key is empty"));
    }

    let padding = (4 - trimmed.len() % 4) % 4;
    let mut standard = String::with_capacity(trimmed.len() + padding);
    for c in trimmed.chars() {
        standard.push(match c {
            '-' => '+',
            '_' => '/',
            other => other,
        });
    }
    standard.extend(std::iter::repeat_n('=', padding));

    BASE64
        .decode(standard.as_bytes())
        .map_err(|e| anyhow!("VAPID key is not valid base64: {}", e))
}

/// Encode raw key bytes to the unpadded URL-safe form servers hand out.
pub fn encode_vapid_key(key: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(key)
}

/// Whether `key` has the shape of an uncompressed P-256 point.
/// Push services reject any other application server key.
pub fn is_uncompressed_p256(key: &[u8]) -> bool {
    key.len() == APPLICATION_SERVER_KEY_LEN && key[0] == 0x04
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_safe_characters_are_translated() {
        let decoded = decode_vapid_key("abc-_123").unwrap();
        let expected = BASE64.decode("abc+/123").unwrap();
        assert_eq!(decoded.len(), expected.len());
        assert_eq!(decoded, expected);
    }

    #[test]
    fn missing_padding_is_restored() {
        assert_eq!(decode_vapid_key("AQ").unwrap(), vec![1]);
        assert_eq!(decode_vapid_key("AQI").unwrap(), vec![1, 2]);
        assert_eq!(decode_vapid_key("AQID").unwrap(), vec![1, 2, 3]);
        // Already padded input is left alone.
        assert_eq!(decode_vapid_key("AQ==").unwrap(), vec![1]);
    }

    #[test]
    fn full_length_key_decodes() {
        let mut key = [7u8; APPLICATION_SERVER_KEY_LEN];
        key[0] = 0x04;
        let encoded = encode_vapid_key(&key);
        assert!(!encoded.contains('='));

        let decoded = decode_vapid_key(&encoded).unwrap();
        assert!(is_uncompressed_p256(&decoded));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(decode_vapid_key("").is_err());
        assert!(decode_vapid_key("   ").is_err());
        assert!(decode_vapid_key("A").is_err());
        assert!(decode_vapid_key("ab$d").is_err());
    }

    #[test]
    fn short_keys_are_not_p256_points() {
        assert!(!is_uncompressed_p256(&decode_vapid_key("abc-_123").unwrap()));
        assert!(!is_uncompressed_p256(&[0x04; 33]));
    }
}
