use crate::util::escape_and_elide;
use core::borrow::Borrow;
use core::fmt::{Display, Formatter};
use std::ops::Deref;

/// Wraps a [`String`] that contains only US-ASCII chars.
///
/// HTTP header names and values must be US-ASCII
/// ([RFC 7230 section 3.2.4](https://datatracker.ietf.org/doc/html/rfc7230#section-3.2.4)),
/// so the response serializer accepts only this type.
///
/// Implements [`Deref`] so you can access the internal string directly.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct AsciiString(String);
impl AsciiString {
    #[must_use]
    pub fn new() -> Self {
        Self(String::new())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}
impl AsRef<[u8]> for AsciiString {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}
impl AsRef<str> for AsciiString {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}
impl Borrow<str> for AsciiString {
    fn borrow(&self) -> &str {
        self.0.as_str()
    }
}
impl Default for AsciiString {
    fn default() -> Self {
        Self::new()
    }
}
impl Deref for AsciiString {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
impl Display for AsciiString {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        write!(f, "{}", self.0)
    }
}
impl From<AsciiString> for String {
    fn from(ascii_string: AsciiString) -> Self {
        ascii_string.0
    }
}
impl From<u16> for AsciiString {
    fn from(n: u16) -> Self {
        Self(n.to_string())
    }
}
impl From<u64> for AsciiString {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}
impl From<usize> for AsciiString {
    fn from(n: usize) -> Self {
        Self(n.to_string())
    }
}

fn try_from_error(bytes: impl AsRef<[u8]>) -> String {
    format!(
        "`AsciiString::try_from` called with non-ASCII value: \"{}\"",
        escape_and_elide(bytes.as_ref(), 100)
    )
}

impl TryFrom<String> for AsciiString {
    type Error = String;

    fn try_from(string: String) -> Result<Self, Self::Error> {
        if string.is_ascii() {
            Ok(Self(string))
        } else {
            Err(try_from_error(string))
        }
    }
}

impl TryFrom<&str> for AsciiString {
    type Error = String;

    fn try_from(str: &str) -> Result<Self, Self::Error> {
        if str.is_ascii() {
            Ok(Self(str.to_string()))
        } else {
            Err(try_from_error(str))
        }
    }
}
