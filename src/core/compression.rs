//! Payload compression schemes accepted on the HTTP endpoint
//!
//! The `zipType` form field selects one of a closed set of codecs.
//! There is no fallback between codecs: a payload that fails to decode
//! with the requested codec is rejected. Decoded output is capped so a
//! small compressed body cannot inflate without bound.

use flate2::read::{GzDecoder, ZlibDecoder};
use std::io::{self, Read};
use thiserror::Error;

/// Compression scheme of an HTTP `logText` payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Compression {
    /// Raw text
    #[default]
    None,
    /// zlib stream (`zipType=zip`)
    Zlib,
    /// gzip member (`zipType=gzip`)
    Gzip,
}

/// Decompression failure
#[derive(Debug, Error)]
#[error("{codec} decode failed: {source}")]
pub struct DecodeError {
    codec: &'static str,
    #[source]
    source: io::Error,
}

impl Compression {
    /// Map the `zipType` form value onto a codec
    ///
    /// Unknown values are treated as uncompressed.
    pub fn from_zip_type(zip_type: &str) -> Self {
        match zip_type {
            "zip" => Self::Zlib,
            "gzip" => Self::Gzip,
            _ => Self::None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Zlib => "zip",
            Self::Gzip => "gzip",
        }
    }

    /// Decode `data` with this codec, producing at most `limit` bytes
    ///
    /// `None` returns the input unchanged. Output longer than `limit` is an
    /// `InvalidData` error.
    pub fn decode(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, DecodeError> {
        match self {
            Self::None if data.len() > limit => Err(DecodeError {
                codec: self.name(),
                source: too_large(limit),
            }),
            Self::None => Ok(data.to_vec()),
            Self::Zlib => read_bounded(ZlibDecoder::new(data), "zlib", limit),
            Self::Gzip => read_bounded(GzDecoder::new(data), "gzip", limit),
        }
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn read_bounded<R: Read>(
    reader: R,
    codec: &'static str,
    limit: usize,
) -> Result<Vec<u8>, DecodeError> {
    let mut out = Vec::new();
    // One byte past the limit tells "exactly limit" apart from "too long"
    reader
        .take((limit as u64).saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|source| DecodeError { codec, source })?;
    if out.len() > limit {
        return Err(DecodeError {
            codec,
            source: too_large(limit),
        });
    }
    Ok(out)
}

fn too_large(limit: usize) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("decoded payload exceeds {} bytes", limit),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use std::io::Write;

    const LIMIT: usize = 1 << 20;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_from_zip_type() {
        assert_eq!(Compression::from_zip_type(""), Compression::None);
        assert_eq!(Compression::from_zip_type("zip"), Compression::Zlib);
        assert_eq!(Compression::from_zip_type("gzip"), Compression::Gzip);
        assert_eq!(Compression::from_zip_type("lz4"), Compression::None);
    }

    #[test]
    fn test_zlib_decode() {
        let text = b"line one\nline two\n".repeat(20);
        assert_eq!(Compression::Zlib.decode(&zlib(&text), LIMIT).unwrap(), text);
    }

    #[test]
    fn test_gzip_decode() {
        let text = b"line one\nline two\n".repeat(20);
        assert_eq!(Compression::Gzip.decode(&gzip(&text), LIMIT).unwrap(), text);
    }

    #[test]
    fn test_none_passthrough() {
        assert_eq!(Compression::None.decode(b"a\nb", LIMIT).unwrap(), b"a\nb");
    }

    #[test]
    fn test_no_codec_fallback() {
        // A gzip payload labelled as zlib must fail, not be retried as gzip
        let payload = gzip(b"hello");
        assert!(Compression::Zlib.decode(&payload, LIMIT).is_err());

        let payload = zlib(b"hello");
        assert!(Compression::Gzip.decode(&payload, LIMIT).is_err());
    }

    #[test]
    fn test_garbage_is_error() {
        let err = Compression::Gzip.decode(b"definitely not gzip", LIMIT).unwrap_err();
        assert!(err.to_string().starts_with("gzip decode failed"));
    }

    #[test]
    fn test_decoded_size_is_capped() {
        let text = vec![b'x'; 64 * 1024];
        let zipped = zlib(&text);
        assert!(zipped.len() < 1024);

        let err = Compression::Zlib.decode(&zipped, 4096).unwrap_err();
        assert!(err.to_string().contains("exceeds 4096 bytes"));
        assert!(Compression::Gzip.decode(&gzip(&text), 4096).is_err());

        // Exactly at the limit is accepted
        assert_eq!(Compression::Zlib.decode(&zipped, text.len()).unwrap().len(), text.len());
        assert!(Compression::None.decode(&text, text.len() - 1).is_err());
    }
}
