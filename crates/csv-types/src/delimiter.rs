//! Field delimiter of a delimited file.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use sync_core::RequestError;

/// Single-byte field delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delimiter {
    #[default]
    Comma,
    Tab,
    Semicolon,
    Pipe,
    /// Any other single ASCII punctuation character
    Other(u8),
}

impl Delimiter {
    pub fn as_byte(&self) -> u8 {
        match self {
            Self::Comma => b',',
            Self::Tab => b'\t',
            Self::Semicolon => b';',
            Self::Pipe => b'|',
            Self::Other(b) => *b,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self, RequestError> {
        match byte {
            b',' => Ok(Self::Comma),
            b'\t' => Ok(Self::Tab),
            b';' => Ok(Self::Semicolon),
            b'|' => Ok(Self::Pipe),
            b'"' => Err(RequestError::new("The quote character cannot be a delimiter")),
            b if b.is_ascii_punctuation() => Ok(Self::Other(b)),
            b => Err(RequestError::new(format!(
                "Unsupported delimiter byte 0x{b:02x}: expected comma, tab, semicolon, pipe or another ASCII punctuation character"
            ))),
        }
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tab => f.write_str("\\t"),
            other => write!(f, "{}", other.as_byte() as char),
        }
    }
}

impl FromStr for Delimiter {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "comma" => Ok(Self::Comma),
            "tab" | "\\t" => Ok(Self::Tab),
            "semicolon" => Ok(Self::Semicolon),
            "pipe" => Ok(Self::Pipe),
            _ => match s.as_bytes() {
                [byte] => Self::from_byte(*byte),
                _ => Err(RequestError::new(format!(
                    "Delimiter must be a single character, got '{s}'"
                ))),
            },
        }
    }
}

impl Serialize for Delimiter {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Delimiter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
