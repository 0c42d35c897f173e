//! File content, text encodings and per-call write options.

use crate::error::{Result, StateError};

use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Permission bits given to newly created files when no mode is requested.
pub const DEFAULT_MODE: u32 = 0o644;

/// Text encodings understood by the atomic primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Encoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
    /// ISO-8859-1: one byte per code point up to U+00FF.
    Latin1,
    Ascii,
}

impl Encoding {
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf-8",
            Encoding::Utf16Le => "utf-16le",
            Encoding::Utf16Be => "utf-16be",
            Encoding::Latin1 => "latin1",
            Encoding::Ascii => "ascii",
        }
    }

    /// Encodes `text` byte-exactly. No BOM is emitted.
    pub fn encode(self, text: &str) -> Result<Vec<u8>> {
        match self {
            Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
            Encoding::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
            Encoding::Utf16Be => Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
            Encoding::Latin1 | Encoding::Ascii => {
                let limit = if self == Encoding::Latin1 { 0xFF } else { 0x7F };
                text.chars()
                    .map(|ch| match u8::try_from(u32::from(ch)) {
                        Ok(byte) if u32::from(byte) <= limit => Ok(byte),
                        _ => Err(StateError::Encode { encoding: self, ch }),
                    })
                    .collect()
            }
        }
    }

    /// Decodes bytes read from `path`. Malformed input is an error, never replaced.
    pub fn decode(self, bytes: &[u8], path: &Path) -> Result<String> {
        let malformed = || StateError::Decode {
            path: path.to_path_buf(),
            encoding: self,
        };

        match self {
            Encoding::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|_| malformed()),
            Encoding::Utf16Le | Encoding::Utf16Be => {
                if bytes.len() % 2 != 0 {
                    return Err(malformed());
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| {
                        let pair = [pair[0], pair[1]];
                        if self == Encoding::Utf16Le {
                            u16::from_le_bytes(pair)
                        } else {
                            u16::from_be_bytes(pair)
                        }
                    })
                    .collect();
                String::from_utf16(&units).map_err(|_| malformed())
            }
            Encoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            Encoding::Ascii => {
                if bytes.is_ascii() {
                    Ok(bytes.iter().map(|&b| char::from(b)).collect())
                } else {
                    Err(malformed())
                }
            }
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Encoding::Utf8),
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Ok(Encoding::Utf16Le),
            "utf16be" | "utf-16be" => Ok(Encoding::Utf16Be),
            "latin1" | "binary" | "iso-8859-1" => Ok(Encoding::Latin1),
            "ascii" => Ok(Encoding::Ascii),
            other => Err(format!("unsupported encoding '{other}'")),
        }
    }
}

impl TryFrom<String> for Encoding {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// Content of a file: text to be encoded, or raw bytes written verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Bytes(Vec<u8>),
}

impl Content {
    /// Serializes to the bytes that land on disk.
    pub fn to_bytes(&self, encoding: Encoding) -> Result<Vec<u8>> {
        match self {
            Content::Text(text) => encoding.encode(text),
            Content::Bytes(bytes) => Ok(bytes.clone()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            Content::Bytes(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Content::Text(text) => text.is_empty(),
            Content::Bytes(bytes) => bytes.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Content::Text(text) => text.len(),
            Content::Bytes(bytes) => bytes.len(),
        }
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::Text(text)
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Content {
    fn from(bytes: Vec<u8>) -> Self {
        Content::Bytes(bytes)
    }
}

impl From<&[u8]> for Content {
    fn from(bytes: &[u8]) -> Self {
        Content::Bytes(bytes.to_vec())
    }
}

/// Options for a single atomic write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Encoding applied to [`Content::Text`].
    pub encoding: Encoding,
    /// Permission bits for the final file. `None` keeps the existing file's
    /// bits, or [`DEFAULT_MODE`] for a new file.
    pub mode: Option<u32>,
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }
}

/// Options for an atomic read-modify-write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Encoding used for both the read and the write. `None` passes raw
    /// bytes to the update function.
    pub encoding: Option<Encoding>,
    pub mode: Option<u32>,
    /// Treat a missing file as empty instead of failing with `FileNotFound`.
    pub create_if_missing: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        Self {
            encoding: Some(Encoding::Utf8),
            mode: None,
            create_if_missing: false,
        }
    }
}

impl UpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn binary(mut self) -> Self {
        self.encoding = None;
        self
    }

    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Options for the write half of the update.
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            encoding: self.encoding.unwrap_or_default(),
            mode: self.mode,
        }
    }

    /// Decodes what was read, or hands bytes through when no encoding is set.
    pub(crate) fn decode(&self, bytes: Vec<u8>, path: &Path) -> Result<Content> {
        match self.encoding {
            Some(encoding) => encoding.decode(&bytes, path).map(Content::Text),
            None => Ok(Content::Bytes(bytes)),
        }
    }
}

/// Parses permission bits written in octal, with or without a `0o`/`0` prefix.
pub fn parse_mode(s: &str) -> std::result::Result<u32, String> {
    let digits = s.trim_start_matches("0o");
    let mode =
        u32::from_str_radix(digits, 8).map_err(|_| format!("invalid octal mode '{s}'"))?;
    if mode > 0o7777 {
        return Err(format!("mode '{s}' is out of range"));
    }
    Ok(mode)
}
