// src/core/protocol/encoding.rs

//! The percent-style escaping pass applied to every wire payload.
//!
//! Both peers must use an identical escape table or the protocol
//! desynchronizes, so the set below reproduces the JavaScript `encodeURI`
//! table exactly: alphanumerics and `; , / ? : @ & = + $ - _ . ! ~ * ' ( ) #`
//! pass through, every other byte is percent-encoded (non-ASCII as the
//! percent-encoded bytes of its UTF-8 form).

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

/// Characters left intact by JavaScript's `encodeURI`.
const ENCODE_URI: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b';')
    .remove(b',')
    .remove(b'/')
    .remove(b'?')
    .remove(b':')
    .remove(b'@')
    .remove(b'&')
    .remove(b'=')
    .remove(b'+')
    .remove(b'$')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'#');

/// Escapes a serialized payload for the wire.
pub fn escape(text: &str) -> String {
    utf8_percent_encode(text, ENCODE_URI).to_string()
}

/// Reverses [`escape`]. Returns `None` when the percent sequences do not
/// decode to valid UTF-8; callers treat that as a malformed payload and
/// drop it silently.
pub fn unescape(text: &str) -> Option<String> {
    percent_decode_str(text)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_punctuation_is_escaped() {
        assert_eq!(escape(r#"{"a":1}"#), "%7B%22a%22:1%7D");
    }

    #[test]
    fn encode_uri_reserved_characters_pass_through() {
        let reserved = ";,/?:@&=+$-_.!~*'()#";
        assert_eq!(escape(reserved), reserved);
    }

    #[test]
    fn space_percent_and_backslash_are_escaped() {
        assert_eq!(escape(r"a b%c\d"), "a%20b%25c%5Cd");
    }

    #[test]
    fn non_ascii_encodes_utf8_bytes() {
        assert_eq!(escape("é"), "%C3%A9");
        assert_eq!(unescape("%C3%A9").as_deref(), Some("é"));
    }

    #[test]
    fn round_trip() {
        let payload = r#"{"command":true,"type":"event","event":"chat","data":"hi there"}"#;
        assert_eq!(unescape(&escape(payload)).as_deref(), Some(payload));
    }

    #[test]
    fn invalid_utf8_sequence_is_rejected() {
        assert!(unescape("%FF%FE").is_none());
    }
}
