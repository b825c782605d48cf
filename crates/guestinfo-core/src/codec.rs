//! Payload encodings used by guestinfo keys.
//!
//! Operators declare the encoding of `guestinfo.<key>` in the sibling key
//! `guestinfo.<key>.encoding`. Anything we do not recognise is passed
//! through untouched.

use std::io::{Read, Write};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tracing::debug;

use crate::error::{Error, Result};

/// Declared encoding of a raw guestinfo value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Plain,
    Base64,
    GzipBase64,
}

impl Encoding {
    /// Map an encoding tag to an [`Encoding`]. Absent, empty and unknown
    /// tags all mean plain text.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag.map(str::trim) {
            Some("gzip+base64") | Some("gz+b64") => Encoding::GzipBase64,
            Some("base64") | Some("b64") => Encoding::Base64,
            _ => Encoding::Plain,
        }
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Encoding::Plain => write!(f, "plain"),
            Encoding::Base64 => write!(f, "base64"),
            Encoding::GzipBase64 => write!(f, "gzip+base64"),
        }
    }
}

/// Decode `data` according to the encoding tag `enc`.
///
/// `key` only identifies the payload in log lines and errors.
pub fn decode(key: &str, enc: Option<&str>, data: &str) -> Result<String> {
    let encoding = Encoding::from_tag(enc);
    debug!(key, enc = ?enc, %encoding, "decoding guestinfo payload");

    let bytes = match encoding {
        Encoding::Plain => return Ok(data.to_string()),
        Encoding::Base64 => b64_decode(key, data)?,
        Encoding::GzipBase64 => {
            let compressed = b64_decode(key, data)?;
            let mut out = Vec::new();
            GzDecoder::new(compressed.as_slice())
                .read_to_end(&mut out)
                .map_err(|e| Error::decode(key, format!("gzip: {}", e)))?;
            out
        }
    };

    String::from_utf8(bytes).map_err(|e| Error::decode(key, format!("utf-8: {}", e)))
}

/// Encode `text` so that [`decode`] with the same tag returns it.
pub fn encode(enc: Option<&str>, text: &str) -> Result<String> {
    match Encoding::from_tag(enc) {
        Encoding::Plain => Ok(text.to_string()),
        Encoding::Base64 => Ok(STANDARD.encode(text)),
        Encoding::GzipBase64 => {
            let mut gz = GzEncoder::new(Vec::new(), Compression::default());
            gz.write_all(text.as_bytes())
                .and_then(|_| gz.finish())
                .map(|compressed| STANDARD.encode(compressed))
                .map_err(|e| Error::decode("encode", format!("gzip: {}", e)))
        }
    }
}

/// Line breaks and indentation are dropped first: `base64` and YAML block
/// scalars both wrap long payloads.
fn b64_decode(key: &str, data: &str) -> Result<Vec<u8>> {
    let compact: String = data.split_ascii_whitespace().collect();
    STANDARD
        .decode(compact)
        .map_err(|e| Error::decode(key, format!("base64: {}", e)))
}
