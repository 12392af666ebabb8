//! HTTP header table with case-insensitive name lookup.
//!
//! Names are folded to lowercase on the way in and their original case is not
//! retained. Each distinct name maps to an ordered list of values, and names
//! enumerate in the order they were first inserted ([RFC 9110 §5]).
//!
//! [RFC 9110 §5]: https://www.rfc-editor.org/rfc/rfc9110#section-5

use std::fmt;

use super::MessageError;

/// A case-insensitive, multi-value HTTP header table.
///
/// # Examples
///
/// ```
/// use httpmsg::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.set("Content-Type", vec!["text/html".to_owned()]);
/// headers.append("X-Custom", vec!["first".to_owned()]);
/// headers.append("x-custom", vec!["second".to_owned()]);
///
/// assert_eq!(headers.get("content-type"), ["text/html"]);
/// assert_eq!(headers.line("X-CUSTOM"), "first, second");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    inner: Vec<(String, Vec<String>)>,
}

impl Headers {
    /// Creates an empty header table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a header table with room for `capacity` distinct names.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Vec::with_capacity(capacity),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.inner
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Replaces every value for `name`, keeping the name's enumeration slot.
    pub fn set(&mut self, name: &str, values: Vec<String>) {
        match self.position(name) {
            Some(i) => self.inner[i].1 = values,
            None => self.inner.push((name.to_ascii_lowercase(), values)),
        }
    }

    /// Replaces every value for `name` and moves it to the front.
    pub fn set_first(&mut self, name: &str, values: Vec<String>) {
        if let Some(i) = self.position(name) {
            self.inner.remove(i);
        }
        self.inner.insert(0, (name.to_ascii_lowercase(), values));
    }

    /// Appends values after any existing ones for `name`.
    pub fn append(&mut self, name: &str, values: Vec<String>) {
        match self.position(name) {
            Some(i) => self.inner[i].1.extend(values),
            None => self.inner.push((name.to_ascii_lowercase(), values)),
        }
    }

    /// Returns every value for `name`, or an empty slice.
    pub fn get(&self, name: &str) -> &[String] {
        self.position(name)
            .map(|i| self.inner[i].1.as_slice())
            .unwrap_or_default()
    }

    /// Returns every value for `name` joined with `", "`, or an empty string.
    pub fn line(&self, name: &str) -> String {
        self.get(name).join(", ")
    }

    /// Removes `name`. Returns `true` if it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(i) => {
                self.inner.remove(i);
                true
            }
            None => false,
        }
    }

    /// Returns `true` if the table has an entry for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Returns the number of distinct names.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterates `(lowercase name, values)` in first-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, values) in &self.inner {
            write!(f, "{name}: {}\r\n", values.join(", "))?;
        }
        Ok(())
    }
}

/// A header value argument: either one string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValues {
    Single(String),
    List(Vec<String>),
}

impl HeaderValues {
    /// Validates the values and flattens them into a list.
    ///
    /// # Errors
    ///
    /// - [`MessageError::EmptyHeader`]: an empty list, or a single empty string.
    /// - [`MessageError::InvalidHeaderChar`]: a value contains CR or LF.
    pub fn validate(self, name: &str) -> Result<Vec<String>, MessageError> {
        let values = match self {
            Self::Single(value) if value.is_empty() => None,
            Self::Single(value) => Some(vec![value]),
            Self::List(values) if values.is_empty() => None,
            Self::List(values) => Some(values),
        }
        .ok_or_else(|| MessageError::EmptyHeader {
            name: name.to_owned(),
        })?;
        check_chars(name, values)
    }

    /// Flattens the values for bulk construction, where empty values are kept.
    ///
    /// An empty list becomes a single empty value.
    ///
    /// # Errors
    ///
    /// [`MessageError::InvalidHeaderChar`]: a value contains CR or LF.
    pub fn validate_lenient(self, name: &str) -> Result<Vec<String>, MessageError> {
        let values = match self {
            Self::Single(value) => vec![value],
            Self::List(values) if values.is_empty() => vec![String::new()],
            Self::List(values) => values,
        };
        check_chars(name, values)
    }
}

fn check_chars(name: &str, values: Vec<String>) -> Result<Vec<String>, MessageError> {
    if values.iter().any(|v| v.contains(['\r', '\n'])) {
        return Err(MessageError::InvalidHeaderChar {
            name: name.to_owned(),
        });
    }
    Ok(values)
}

/// Conversion into [`HeaderValues`], so header mutators accept `"v"`,
/// `String`, `vec!["a", "b"]`, `["a", "b"]` and friends.
pub trait IntoHeaderValues {
    fn into_header_values(self) -> HeaderValues;
}

impl IntoHeaderValues for HeaderValues {
    fn into_header_values(self) -> HeaderValues {
        self
    }
}

impl IntoHeaderValues for &str {
    fn into_header_values(self) -> HeaderValues {
        HeaderValues::Single(self.to_owned())
    }
}

impl IntoHeaderValues for String {
    fn into_header_values(self) -> HeaderValues {
        HeaderValues::Single(self)
    }
}

impl IntoHeaderValues for &String {
    fn into_header_values(self) -> HeaderValues {
        HeaderValues::Single(self.clone())
    }
}

impl<S: Into<String>> IntoHeaderValues for Vec<S> {
    fn into_header_values(self) -> HeaderValues {
        HeaderValues::List(self.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>, const N: usize> IntoHeaderValues for [S; N] {
    fn into_header_values(self) -> HeaderValues {
        HeaderValues::List(self.into_iter().map(Into::into).collect())
    }
}

impl<S: AsRef<str>> IntoHeaderValues for &[S] {
    fn into_header_values(self) -> HeaderValues {
        HeaderValues::List(self.iter().map(|s| s.as_ref().to_owned()).collect())
    }
}

/// Returns `true` if `c` may appear in an HTTP token (RFC 9110 §5.6.2).
pub(crate) fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '!' | '#' | '$' | '%' | '&' | '\'' | '*' | '+' | '-' | '.' | '^' | '_' | '`' | '|' | '~'
        )
}

/// Checks that `name` is a non-empty HTTP token.
pub(crate) fn validate_name(name: &str) -> Result<(), MessageError> {
    if name.is_empty() || !name.chars().all(is_token_char) {
        return Err(MessageError::InvalidHeaderName {
            name: name.to_owned(),
        });
    }
    Ok(())
}
