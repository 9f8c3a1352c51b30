//! Decoding template content into a character reader

use crate::error::LoaderError;
use std::io::{self, BufRead, Cursor, Read};

/// Character encodings a template can be read with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Ascii,
    Latin1,
}

impl Encoding {
    /// Look an encoding up by its usual label, ignoring case
    pub fn for_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Some(Encoding::Utf8),
            "us-ascii" | "ascii" => Some(Encoding::Ascii),
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" => Some(Encoding::Latin1),
            _ => None,
        }
    }

    pub fn decode(self, bytes: &[u8]) -> Result<String, LoaderError> {
        match self {
            Encoding::Utf8 => {
                let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
                String::from_utf8(bytes.to_vec()).map_err(|e| LoaderError::Encoding {
                    encoding: "UTF-8".into(),
                    reason: e.to_string(),
                })
            }
            Encoding::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                Some(offset) => Err(LoaderError::Encoding {
                    encoding: "US-ASCII".into(),
                    reason: format!("non-ASCII byte at offset {}", offset),
                }),
                None => Ok(bytes.iter().map(|&b| b as char).collect()),
            },
            Encoding::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
        }
    }
}

/// Owned reader over a decoded template
///
/// Holds the whole decoded text, so nothing stays open on the store once
/// the reader exists; dropping it releases everything.
#[derive(Debug)]
pub struct TemplateReader {
    inner: Cursor<String>,
}

impl TemplateReader {
    /// Decode `bytes` with the encoding named by `encoding`
    pub fn decode(bytes: &[u8], encoding: &str) -> Result<Self, LoaderError> {
        let codec = Encoding::for_label(encoding).ok_or_else(|| LoaderError::Encoding {
            encoding: encoding.to_string(),
            reason: "unsupported encoding".into(),
        })?;
        Ok(Self {
            inner: Cursor::new(codec.decode(bytes)?),
        })
    }

    /// Remaining text, consuming the reader
    pub fn into_string(self) -> String {
        let position = self.inner.position() as usize;
        let text = self.inner.into_inner();
        match text.get(position..) {
            Some(rest) => rest.to_string(),
            // stopped inside a multi-byte character
            None => String::from_utf8_lossy(&text.as_bytes()[position.min(text.len())..]).into_owned(),
        }
    }
}

impl Read for TemplateReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl BufRead for TemplateReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt)
    }
}
