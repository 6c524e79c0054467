//! Object-key decoding at the store boundary.
//!
//! Store notifications carry keys form-encoded: spaces arrive as `+` and
//! everything else non-trivial as `%XX` UTF-8 octets. The decoded key is the
//! metadata table's primary key, so the rules here must not drift:
//!
//! 1. every `+` becomes a space (before percent-decoding, so `%2B` survives
//!    as a literal `+`);
//! 2. `%XX` sequences are decoded as UTF-8 bytes;
//! 3. a truncated or non-hex escape, or bytes that are not valid UTF-8,
//!    make the whole key malformed.

use percent_encoding::percent_decode_str;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyDecodeError {
    #[error("malformed percent escape at byte {position} in object key {raw:?}")]
    BadEscape { raw: String, position: usize },

    #[error("object key {raw:?} does not decode to UTF-8")]
    InvalidUtf8 { raw: String },
}

pub fn decode_object_key(raw: &str) -> Result<String, KeyDecodeError> {
    if let Some(position) = first_bad_escape(raw.as_bytes()) {
        return Err(KeyDecodeError::BadEscape {
            raw: raw.to_string(),
            position,
        });
    }

    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| KeyDecodeError::InvalidUtf8 {
            raw: raw.to_string(),
        })
}

// percent_decode_str passes malformed escapes through untouched; keys must fail instead.
fn first_bad_escape(bytes: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let well_formed = bytes
                .get(i + 1..i + 3)
                .is_some_and(|pair| pair.iter().all(u8::is_ascii_hexdigit));
            if !well_formed {
                return Some(i);
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    None
}
