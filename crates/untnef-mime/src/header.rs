//! MIME header handling.

use crate::error::{Error, Result};
use std::fmt;

/// Preferred longest header line, excluding the CRLF (RFC 5322 section 2.1.1).
pub const FOLD_LINE_LENGTH: usize = 78;

/// One header field.
///
/// `raw` keeps the unfolded value bytes when they are not valid UTF-8, so
/// 8-bit headers from legacy mailers are written back unchanged. `value`
/// then holds a lossy rendition for lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    name: String,
    value: String,
    raw: Option<Vec<u8>>,
}

impl Field {
    fn new(name: String, value: String) -> Self {
        Self {
            name,
            value,
            raw: None,
        }
    }

    fn from_bytes(name: &[u8], value: &[u8]) -> Self {
        let name = String::from_utf8_lossy(name).trim().to_string();
        match std::str::from_utf8(value) {
            Ok(text) => Self::new(name, text.to_string()),
            Err(_) => Self {
                name,
                value: String::from_utf8_lossy(value).into_owned(),
                raw: Some(value.to_vec()),
            },
        }
    }

    fn value_bytes(&self) -> &[u8] {
        self.raw.as_deref().unwrap_or(self.value.as_bytes())
    }

    fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Ordered collection of email headers.
///
/// Names are matched case-insensitively but keep the spelling they were added
/// with, and headers are written back in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<Field>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push(Field::new(name.into(), value.into()));
    }

    /// Sets a header value, replacing any existing values.
    ///
    /// The new value takes the position of the first existing occurrence, so
    /// rewriting a header does not reorder the block.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();

        match self.position(&name) {
            Some(idx) => {
                let field = &mut self.fields[idx];
                field.value = value;
                field.raw = None;
                let mut seen = 0usize;
                self.fields.retain(|f| {
                    if f.is(&name) {
                        seen += 1;
                        seen == 1
                    } else {
                        true
                    }
                });
            }
            None => self.fields.push(Field::new(name, value)),
        }
    }

    /// Gets the first value for a header.
    ///
    /// Bytes that are not valid UTF-8 show up as U+FFFD here; see
    /// [`Headers::get_raw`] for the exact value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.is(name))
            .map(|f| f.value.as_str())
    }

    /// Gets the exact bytes of the first value for a header.
    #[must_use]
    pub fn get_raw(&self, name: &str) -> Option<&[u8]> {
        self.fields
            .iter()
            .find(|f| f.is(name))
            .map(Field::value_bytes)
    }

    /// Gets all values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.is(name))
            .map(|f| f.value.as_str())
            .collect()
    }

    /// Checks whether at least one value exists for a header.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Removes all values for a header.
    pub fn remove(&mut self, name: &str) {
        self.fields.retain(|f| !f.is(name));
    }

    /// Returns the number of header lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Checks whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns an iterator over all headers in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|f| (f.name.as_str(), f.value.as_str()))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.is(name))
    }

    /// Parses a header block.
    ///
    /// Headers are in the format:
    /// ```text
    /// Header-Name: value
    ///  continuation
    /// ```
    ///
    /// Parsing stops at the first empty line. Folded values are unfolded by
    /// removing the line break only, so the whitespace that started the
    /// continuation line is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if a non-continuation line has no colon.
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_bytes(text.as_bytes())
    }

    /// Parses a header block given as raw bytes.
    ///
    /// Values that are not valid UTF-8 are kept byte for byte and written
    /// back unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if a non-continuation line has no colon.
    pub fn parse_bytes(raw: &[u8]) -> Result<Self> {
        let mut headers = Self::new();
        let mut current: Option<(&[u8], Vec<u8>)> = None;

        for line in raw.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.is_empty() {
                break;
            }

            // Continuation line (starts with space or tab)
            if line.starts_with(b" ") || line.starts_with(b"\t") {
                if let Some((_, value)) = current.as_mut() {
                    value.extend_from_slice(line);
                }
                continue;
            }

            if let Some((name, value)) = current.take() {
                headers.fields.push(Field::from_bytes(name, value.trim_ascii()));
            }

            let colon = line.iter().position(|&b| b == b':').ok_or_else(|| {
                Error::InvalidHeader(String::from_utf8_lossy(line).into_owned())
            })?;
            current = Some((&line[..colon], line[colon + 1..].to_vec()));
        }

        if let Some((name, value)) = current {
            headers.fields.push(Field::from_bytes(name, value.trim_ascii()));
        }

        Ok(headers)
    }

    /// Writes the header block with CRLF line endings, folding long values.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        for field in &self.fields {
            out.extend_from_slice(field.name.as_bytes());
            out.extend_from_slice(b": ");
            fold_into(out, field.name.len() + 2, field.value_bytes());
            out.extend_from_slice(b"\r\n");
        }
    }

    /// Serializes the header block to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }
}

/// Appends `value`, breaking the line before whitespace once a line would
/// pass [`FOLD_LINE_LENGTH`]. `column` is where the value starts.
///
/// A break is only made before a run of whitespace that is followed by other
/// text, so unfolding (removing the inserted CRLF) restores `value` exactly.
/// Text without whitespace cannot be folded and is written as is.
fn fold_into(out: &mut Vec<u8>, mut column: usize, value: &[u8]) {
    let mut line_has_text = false;

    for chunk in fold_chunks(value) {
        if line_has_text && column + chunk.len() > FOLD_LINE_LENGTH {
            out.extend_from_slice(b"\r\n");
            column = 0;
        }
        out.extend_from_slice(chunk);
        column += chunk.len();
        line_has_text = true;
    }
}

/// Splits `value` into chunks that each start with their leading whitespace
/// run and end before the next whitespace run that is followed by text.
fn fold_chunks(value: &[u8]) -> Vec<&[u8]> {
    let is_wsp = |b: u8| b == b' ' || b == b'\t';
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut idx = 0;

    while idx < value.len() {
        if idx > start && is_wsp(value[idx]) && !is_wsp(value[idx - 1]) {
            let text_follows = value[idx..].iter().any(|&b| !is_wsp(b));
            if text_follows {
                chunks.push(&value[start..idx]);
                start = idx;
            }
        }
        idx += 1;
    }
    if start < value.len() {
        chunks.push(&value[start..]);
    }

    chunks
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_bytes()))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_new() {
        let headers = Headers::new();
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain")); // Case insensitive
    }

    #[test]
    fn test_headers_set_keeps_position() {
        let mut headers = Headers::new();
        headers.add("From", "a@example.com");
        headers.add("To", "alice@example.com");
        headers.add("Subject", "Hi");
        headers.add("to", "bob@example.com");
        assert_eq!(headers.get_all("To").len(), 2);

        headers.set("TO", "charlie@example.com");
        assert_eq!(headers.get_all("To"), vec!["charlie@example.com"]);

        let names: Vec<&str> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["From", "To", "Subject"]);
    }

    #[test]
    fn test_headers_set_appends_when_missing() {
        let mut headers = Headers::new();
        headers.add("From", "a@example.com");
        headers.set("Subject", "New");
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("subject"), Some("New"));
    }

    #[test]
    fn test_headers_remove() {
        let mut headers = Headers::new();
        headers.add("Subject", "Test");
        headers.add("X-MS-TNEF-Correlator", "<abc>");
        assert!(headers.contains("x-ms-tnef-correlator"));

        headers.remove("X-MS-TNEF-CORRELATOR");
        assert!(!headers.contains("X-MS-TNEF-Correlator"));
        assert_eq!(headers.get("Subject"), Some("Test"));
    }

    #[test]
    fn test_headers_parse() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "To: recipient@example.com\r\n",
            "Subject: Test Message\r\n",
            "Content-Type: text/plain;\r\n",
            " charset=utf-8\r\n",
            "\r\n",
            "Body: not a header\r\n"
        );

        let headers = Headers::parse(text).unwrap();
        assert_eq!(headers.len(), 4);
        assert_eq!(headers.get("From"), Some("sender@example.com"));
        assert_eq!(headers.get("Subject"), Some("Test Message"));
        assert_eq!(
            headers.get("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
        assert!(headers.get("Body").is_none());
    }

    #[test]
    fn test_headers_parse_rejects_missing_colon() {
        assert!(Headers::parse("From sender@example.com\r\n").is_err());
    }

    #[test]
    fn test_headers_parse_keeps_folding_whitespace() {
        let headers = Headers::parse("Content-Type: multipart/mixed;\r\n\tboundary=b\r\n").unwrap();
        assert_eq!(headers.get("Content-Type"), Some("multipart/mixed;\tboundary=b"));
    }

    #[test]
    fn test_headers_eight_bit_value_is_kept() {
        let headers = Headers::parse_bytes(b"Subject: Gr\xfc\xdfe\r\nFrom: a@example.com\r\n").unwrap();

        assert_eq!(headers.get("Subject"), Some("Gr\u{fffd}\u{fffd}e"));
        assert_eq!(headers.get_raw("Subject"), Some(&b"Gr\xfc\xdfe"[..]));
        assert_eq!(headers.get_raw("From"), Some(&b"a@example.com"[..]));
        assert_eq!(
            headers.to_bytes(),
            b"Subject: Gr\xfc\xdfe\r\nFrom: a@example.com\r\n".to_vec()
        );
    }

    #[test]
    fn test_headers_set_drops_raw_bytes() {
        let mut headers = Headers::parse_bytes(b"Subject: Gr\xfc\xdfe\r\n").unwrap();
        headers.set("Subject", "Gruesse");
        assert_eq!(headers.to_bytes(), b"Subject: Gruesse\r\n".to_vec());
    }

    #[test]
    fn test_headers_long_value_is_folded() {
        let references: Vec<String> = (0..60)
            .map(|i| format!("<msg-{i:04}.thread@mail.example.com>"))
            .collect();
        let mut headers = Headers::new();
        headers.add("References", references.join(" "));

        let bytes = headers.to_bytes();
        let text = String::from_utf8(bytes.clone()).unwrap();
        let lines: Vec<&str> = text.trim_end_matches("\r\n").split("\r\n").collect();
        assert!(lines.len() > 20);
        assert!(lines.iter().all(|l| l.len() <= FOLD_LINE_LENGTH));
        assert!(lines[1..].iter().all(|l| l.starts_with(' ')));

        let reparsed = Headers::parse_bytes(&bytes).unwrap();
        assert_eq!(reparsed, headers);
        assert_eq!(reparsed.to_bytes(), bytes);
    }

    #[test]
    fn test_headers_unbreakable_value_is_not_split() {
        let token = "x".repeat(120);
        let mut headers = Headers::new();
        headers.add("X-Token", token.as_str());
        headers.add("X-Spaced", format!("{token}  tail"));

        let text = headers.to_string();
        assert!(text.starts_with(&format!("X-Token: {token}\r\n")));
        assert!(text.ends_with(&format!("X-Spaced: {token}\r\n  tail\r\n")));
        assert_eq!(Headers::parse(&text).unwrap(), headers);
    }

    #[test]
    fn test_headers_display_preserves_order_and_case() {
        let mut headers = Headers::new();
        headers.add("X-Mailer", "Outlook");
        headers.add("From", "sender@example.com");

        assert_eq!(
            headers.to_string(),
            "X-Mailer: Outlook\r\nFrom: sender@example.com\r\n"
        );
    }

    proptest::proptest! {
        #[test]
        fn prop_serialized_headers_reparse_identically(
            value in proptest::collection::vec(
                proptest::prop_oneof![
                    proptest::strategy::Just(b' '),
                    proptest::strategy::Just(b'\t'),
                    0x21_u8..=0x7e,
                    0x80_u8..=0xff,
                ],
                0..400,
            ),
        ) {
            let mut raw = b"X-Value: a".to_vec();
            raw.extend_from_slice(&value);
            raw.extend_from_slice(b"z\r\nSubject: fixed\r\n");

            let headers = Headers::parse_bytes(&raw).unwrap();
            let bytes = headers.to_bytes();
            let reparsed = Headers::parse_bytes(&bytes).unwrap();

            proptest::prop_assert_eq!(&reparsed, &headers);
            let expected = &raw[9..raw.len() - 18];
            proptest::prop_assert_eq!(reparsed.get_raw("X-Value").unwrap(), expected);
            proptest::prop_assert_eq!(reparsed.to_bytes(), bytes);
        }
    }
}
