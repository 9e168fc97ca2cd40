//! Text encodings a backend may be configured with.
//!
//! Only single-byte Latin encodings and UTF-8 are transcoded. Other encodings
//! a server can report are recognized and carried as [`TextEncoding::Unsupported`]
//! so that the error surfaces where text actually has to be converted.

use std::fmt;

use crate::error::{Error, Result};

/// Canonical text encoding of a backend connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    Ascii,
    #[default]
    Utf8,
    /// ISO 8859-1
    Latin1,
    /// ISO 8859-15
    Latin9,
    /// A known encoding without a transcoder.
    Unsupported(String),
}

/// Code points that ISO 8859-15 places differently from ISO 8859-1.
const LATIN9_OVERRIDES: [(u8, char); 8] = [
    (0xA4, '\u{20AC}'),
    (0xA6, '\u{0160}'),
    (0xA8, '\u{0161}'),
    (0xB4, '\u{017D}'),
    (0xB8, '\u{017E}'),
    (0xBC, '\u{0152}'),
    (0xBD, '\u{0153}'),
    (0xBE, '\u{0178}'),
];

impl TextEncoding {
    /// Resolve a canonical codec name such as `utf-8` or `iso8859-1`.
    pub fn from_name(name: &str) -> Self {
        let normalized = name.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "ascii" | "us-ascii" => TextEncoding::Ascii,
            "utf-8" | "utf8" => TextEncoding::Utf8,
            "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" => TextEncoding::Latin1,
            "iso-8859-15" | "iso8859-15" | "latin9" | "latin-9" => TextEncoding::Latin9,
            _ => TextEncoding::Unsupported(normalized),
        }
    }

    /// Canonical name.
    pub fn name(&self) -> &str {
        match self {
            TextEncoding::Ascii => "ascii",
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "iso-8859-1",
            TextEncoding::Latin9 => "iso-8859-15",
            TextEncoding::Unsupported(name) => name,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, TextEncoding::Unsupported(_))
    }

    fn encode_char(&self, c: char) -> Option<u8> {
        let cp = u32::from(c);
        match self {
            TextEncoding::Ascii => (cp < 0x80).then_some(cp as u8),
            TextEncoding::Latin1 => (cp < 0x100).then_some(cp as u8),
            TextEncoding::Latin9 => {
                if let Some((byte, _)) = LATIN9_OVERRIDES.iter().find(|(_, ch)| *ch == c) {
                    return Some(*byte);
                }
                let displaced = LATIN9_OVERRIDES.iter().any(|(byte, _)| u32::from(*byte) == cp);
                (cp < 0x100 && !displaced).then_some(cp as u8)
            }
            TextEncoding::Utf8 | TextEncoding::Unsupported(_) => None,
        }
    }

    /// True if every character of `text` has a representation.
    pub fn can_encode(&self, text: &str) -> bool {
        match self {
            TextEncoding::Utf8 => true,
            TextEncoding::Unsupported(_) => false,
            _ => text.chars().all(|c| self.encode_char(c).is_some()),
        }
    }

    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        match self {
            TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
            TextEncoding::Unsupported(name) => Err(unsupported(name)),
            _ => text
                .chars()
                .map(|c| {
                    self.encode_char(c).ok_or_else(|| {
                        Error::Encoding(format!(
                            "character {c:?} cannot be encoded as {}",
                            self.name()
                        ))
                    })
                })
                .collect(),
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        match self {
            TextEncoding::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| Error::Encoding(format!("invalid utf-8 data: {e}"))),
            TextEncoding::Ascii => {
                if let Some(pos) = bytes.iter().position(|b| !b.is_ascii()) {
                    return Err(Error::Encoding(format!(
                        "byte 0x{:02x} at position {pos} is not ascii",
                        bytes[pos]
                    )));
                }
                Ok(bytes.iter().map(|b| char::from(*b)).collect())
            }
            TextEncoding::Latin1 => Ok(bytes.iter().map(|b| char::from(*b)).collect()),
            TextEncoding::Latin9 => Ok(bytes
                .iter()
                .map(|b| {
                    LATIN9_OVERRIDES
                        .iter()
                        .find(|(byte, _)| byte == b)
                        .map_or(char::from(*b), |(_, c)| *c)
                })
                .collect()),
            TextEncoding::Unsupported(name) => Err(unsupported(name)),
        }
    }
}

fn unsupported(name: &str) -> Error {
    Error::Encoding(format!("no transcoder for backend encoding {name}"))
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_normalizes_spelling() {
        assert_eq!(TextEncoding::from_name("UTF8"), TextEncoding::Utf8);
        assert_eq!(TextEncoding::from_name("iso8859-1"), TextEncoding::Latin1);
        assert_eq!(TextEncoding::from_name("ISO_8859_15"), TextEncoding::Latin9);
        assert_eq!(
            TextEncoding::from_name("koi8-r"),
            TextEncoding::Unsupported("koi8-r".to_string())
        );
    }

    #[test]
    fn test_latin1_encoding() {
        let enc = TextEncoding::Latin1;
        assert_eq!(enc.encode("Müller").unwrap(), b"M\xfcller".to_vec());
        assert_eq!(enc.decode(b"M\xfcller").unwrap(), "Müller");
        assert!(!enc.can_encode("€"));
    }

    #[test]
    fn test_latin9_euro_sign() {
        let enc = TextEncoding::Latin9;
        assert!(enc.can_encode("5 €"));
        assert_eq!(enc.encode("€").unwrap(), vec![0xA4]);
        assert_eq!(enc.decode(&[0xA4]).unwrap(), "€");
        // ¤ is displaced by the euro sign
        assert!(!enc.can_encode("\u{a4}"));
    }

    #[test]
    fn test_ascii_rejects_high_bytes() {
        assert!(TextEncoding::Ascii.decode(b"caf\xe9").is_err());
        assert!(!TextEncoding::Ascii.can_encode("café"));
    }

    #[test]
    fn test_unsupported_fails_on_use() {
        let enc = TextEncoding::from_name("euc-jp");
        assert!(!enc.is_supported());
        assert!(matches!(enc.encode("x"), Err(Error::Encoding(_))));
        assert!(matches!(enc.decode(b"x"), Err(Error::Encoding(_))));
    }
}
