//! Incremental text decoding of child stdio chunks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Text encoding used for child stdio.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    /// UTF-8; invalid sequences decode to U+FFFD.
    #[default]
    #[serde(rename = "utf-8", alias = "utf8", alias = "UTF-8")]
    Utf8,
    /// ISO-8859-1, one byte per character.
    #[serde(rename = "latin1", alias = "iso-8859-1", alias = "binary")]
    Latin1,
}

impl Encoding {
    /// The canonical label for this encoding.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Latin1 => "latin1",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when an encoding label is not recognized.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unsupported encoding: {0}")]
pub struct EncodingError(pub String);

impl FromStr for Encoding {
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "latin1" | "iso-8859-1" | "binary" => Ok(Self::Latin1),
            _ => Err(EncodingError(s.to_string())),
        }
    }
}

/// Stateful decoder that never splits a multi-byte character across chunks.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    encoding: Encoding,
    pending: Vec<u8>,
}

impl Decoder {
    #[must_use]
    pub fn new(encoding: Encoding) -> Self {
        Self {
            encoding,
            pending: Vec::new(),
        }
    }

    #[must_use]
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Decode a chunk, holding back an incomplete trailing sequence.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        match self.encoding {
            Encoding::Utf8 => self.decode_utf8(bytes),
            Encoding::Latin1 => bytes.iter().copied().map(char::from).collect(),
        }
    }

    /// Flush bytes held back from previous chunks.
    pub fn finish(&mut self) -> String {
        let pending = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&pending).into_owned()
    }

    fn decode_utf8(&mut self, bytes: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(bytes);

        let mut out = String::with_capacity(input.len());
        let mut rest = input.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    if let Some(len) = err.error_len() {
                        out.push(char::REPLACEMENT_CHARACTER);
                        rest = &after[len..];
                    } else {
                        self.pending = after.to_vec();
                        break;
                    }
                }
            }
        }
        out
    }
}
