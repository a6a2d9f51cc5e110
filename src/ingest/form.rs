//! Binary-safe `application/x-www-form-urlencoded` decoding
//!
//! Compressed `logText` payloads are arbitrary bytes, so field values are
//! percent-decoded into `Bytes` instead of `String`.

use bytes::Bytes;
use percent_encoding::percent_decode;
use std::borrow::Cow;

/// Form field names of the log endpoint
pub const BIZ_TYPE: &str = "bizType";
pub const ZIP_TYPE: &str = "zipType";
pub const LOG_TEXT: &str = "logText";

/// Fields of one log batch request
///
/// A field is `None` when absent. When a field repeats, the first
/// occurrence wins.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LogForm {
    pub biz_type: Option<String>,
    pub zip_type: Option<String>,
    pub log_text: Option<Bytes>,
}

impl LogForm {
    /// Decode a urlencoded request body
    pub fn parse(body: &[u8]) -> Self {
        let mut form = LogForm::default();

        for pair in body.split(|&b| b == b'&') {
            if pair.is_empty() {
                continue;
            }
            let (name, value) = match pair.iter().position(|&b| b == b'=') {
                Some(i) => (&pair[..i], &pair[i + 1..]),
                None => (pair, &[][..]),
            };

            let name = decode(name);
            match name.as_slice() {
                n if n == BIZ_TYPE.as_bytes() && form.biz_type.is_none() => {
                    form.biz_type = Some(String::from_utf8_lossy(&decode(value)).into_owned());
                }
                n if n == ZIP_TYPE.as_bytes() && form.zip_type.is_none() => {
                    form.zip_type = Some(String::from_utf8_lossy(&decode(value)).into_owned());
                }
                n if n == LOG_TEXT.as_bytes() && form.log_text.is_none() => {
                    form.log_text = Some(Bytes::from(decode(value)));
                }
                _ => {}
            }
        }

        form
    }
}

/// Percent-decode one component, treating `+` as space
fn decode(raw: &[u8]) -> Vec<u8> {
    let spaced: Cow<'_, [u8]> = if raw.contains(&b'+') {
        Cow::Owned(
            raw.iter()
                .map(|&b| if b == b'+' { b' ' } else { b })
                .collect(),
        )
    } else {
        Cow::Borrowed(raw)
    };
    percent_decode(&spaced).collect()
}
