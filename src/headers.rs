use crate::util::escape_and_elide;
use core::fmt::{Debug, Display, Formatter};
use std::ops::{Deref, DerefMut};

/// Header names outside this list are exposed under the `HTTP_` prefix so
/// they cannot collide with the server-identity variables.
const CONTENT_METADATA_NAMES: [&str; 2] = ["CONTENT_TYPE", "CONTENT_LENGTH"];

/// Converts a wire header name to its canonical variable form:
/// ASCII-uppercase with `-` replaced by `_`, prefixed with `HTTP_` unless the
/// name is one of the content-metadata fields.
/// `X-Test` becomes `HTTP_X_TEST` and `Content-Type` becomes `CONTENT_TYPE`.
#[must_use]
pub fn canonical_name(wire_name: &str) -> String {
    let name: String = wire_name
        .chars()
        .map(|c| match c {
            '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect();
    if CONTENT_METADATA_NAMES.contains(&name.as_str()) {
        name
    } else {
        format!("HTTP_{name}")
    }
}

#[derive(Clone, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Header {
    pub name: String,
    pub value: String,
}
impl Header {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}
impl Debug for Header {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        write!(
            f,
            "Header({}:{})",
            escape_and_elide(self.name.as_bytes(), 30),
            escape_and_elide(self.value.as_bytes(), 1000)
        )
    }
}
impl Display for Header {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        write!(f, "{}:{}", self.name, self.value)
    }
}

/// An ordered list of headers, in the order the parser delivered them.
/// Duplicate names are preserved.
#[derive(Clone, Eq, PartialEq)]
pub struct HeaderList(pub Vec<Header>);
impl HeaderList {
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Adds a header.
    ///
    /// You can call this multiple times to add multiple headers with the same name.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push(Header::new(name, value));
    }

    /// Searches for headers that match `name` with a case-insensitive
    /// comparison. Returns the value of the last match, the same value the
    /// flattened lookup map keeps.
    pub fn get_last(&self, name: impl AsRef<str>) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|header| header.name.eq_ignore_ascii_case(name.as_ref()))
            .map(|header| header.value.as_str())
    }

    /// Looks for headers with names that match `name`.
    /// Uses a case-insensitive comparison.
    /// Returns the values of the matching headers, in delivery order.
    pub fn get_all(&self, name: impl AsRef<str>) -> Vec<&str> {
        self.0
            .iter()
            .filter(|header| header.name.eq_ignore_ascii_case(name.as_ref()))
            .map(|header| header.value.as_str())
            .collect()
    }
}
impl Debug for HeaderList {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), core::fmt::Error> {
        let strings: Vec<String> = self
            .iter()
            .map(|h| format!("{}: {:?}", h.name, h.value))
            .collect();
        write!(f, "{{{}}}", strings.join(", "))
    }
}
impl Default for HeaderList {
    fn default() -> Self {
        Self::new()
    }
}
impl Deref for HeaderList {
    type Target = Vec<Header>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
impl DerefMut for HeaderList {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
impl<'x> IntoIterator for &'x HeaderList {
    type Item = &'x Header;
    type IntoIter = core::slice::Iter<'x, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::{canonical_name, HeaderList};

    #[test]
    fn test_canonical_name() {
        assert_eq!("HTTP_X_TEST", canonical_name("X-Test"));
        assert_eq!("HTTP_HOST", canonical_name("host"));
        assert_eq!("CONTENT_TYPE", canonical_name("Content-Type"));
        assert_eq!("CONTENT_LENGTH", canonical_name("content-length"));
        assert_eq!("HTTP_EXPECT", canonical_name("Expect"));
    }

    #[test]
    fn test_get_last_keeps_last_seen() {
        let mut headers = HeaderList::new();
        headers.add("HTTP_X_TEST", "first");
        headers.add("HTTP_X_TEST", "second");
        assert_eq!(Some("second"), headers.get_last("http_x_test"));
        assert_eq!(vec!["first", "second"], headers.get_all("HTTP_X_TEST"));
        assert_eq!(None, headers.get_last("HTTP_OTHER"));
    }
}
