//! MIME content type handling.

use crate::encoding::{
    decode_charset, decode_rfc2047, decode_rfc2231, encode_rfc2047, encode_rfc2231,
};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Characters that force a parameter value to be quoted (RFC 2045 tspecials).
const TSPECIALS: &str = "()<>@,;:\\\"/[]?=";

/// Longest percent-encoded piece written per RFC 2231 continuation section.
const EXTENDED_SECTION_LENGTH: usize = 60;

/// MIME content type with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type (e.g., "text", "application", "multipart").
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "ms-tnef").
    pub sub_type: String,
    /// Parameters (e.g., charset=utf-8, boundary=xxx), sorted by name.
    pub parameters: BTreeMap<String, String>,
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Creates a text/plain content type.
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain").with_parameter("charset", "utf-8")
    }

    /// Creates a text/html content type.
    #[must_use]
    pub fn text_html() -> Self {
        Self::new("text", "html").with_parameter("charset", "utf-8")
    }

    /// Creates an application/octet-stream content type.
    #[must_use]
    pub fn octet_stream() -> Self {
        Self::new("application", "octet-stream")
    }

    /// Creates a multipart/mixed content type with boundary.
    #[must_use]
    pub fn multipart_mixed(boundary: impl Into<String>) -> Self {
        Self::new("multipart", "mixed").with_parameter("boundary", boundary)
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Returns the charset parameter if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameters.get("charset").map(String::as_str)
    }

    /// Returns the boundary parameter if present.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameters.get("boundary").map(String::as_str)
    }

    /// Returns `type/subtype` without parameters.
    #[must_use]
    pub fn essence(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Checks whether `type/subtype` equals `media_type`, ignoring case.
    #[must_use]
    pub fn matches(&self, media_type: &str) -> bool {
        media_type.split_once('/').is_some_and(|(main, sub)| {
            self.main_type.eq_ignore_ascii_case(main.trim())
                && self.sub_type.eq_ignore_ascii_case(sub.trim())
        })
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("multipart")
    }

    /// Checks if this is a text content type.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("text")
    }

    /// Parses a content type string.
    ///
    /// Format: `type/subtype; param1=value1; param2=value2`
    ///
    /// # Errors
    ///
    /// Returns an error if the type or subtype is missing.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = split_params(s).into_iter();

        let type_str = parts.next().unwrap_or_default();
        let (main_type, sub_type) = type_str
            .trim()
            .split_once('/')
            .ok_or_else(|| Error::InvalidContentType(format!("Missing subtype: {s}")))?;

        let main_type = main_type.trim().to_lowercase();
        let sub_type = sub_type.trim().to_lowercase();
        if main_type.is_empty() || sub_type.is_empty() {
            return Err(Error::InvalidContentType(s.to_string()));
        }

        let mut content_type = Self::new(main_type, sub_type);
        content_type.parameters = parse_params(parts);

        Ok(content_type)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.sub_type)?;
        for (key, value) in &self.parameters {
            write_param(f, key, value)?;
        }
        Ok(())
    }
}

/// Splits a header value on `;` outside of quoted strings.
pub(crate) fn split_params(s: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in s.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ';' if !in_quotes => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);

    parts
}

/// Parses one `key=value` parameter, unquoting the value.
fn parse_param(param: &str) -> Option<(String, String)> {
    let (key, value) = param.trim().split_once('=')?;
    let key = key.trim().to_lowercase();
    if key.is_empty() {
        return None;
    }

    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .map_or_else(|| value.to_string(), |v| v.replace("\\\"", "\"").replace("\\\\", "\\"));

    Some((key, value))
}

/// Parses `key=value` parameters into decoded values.
///
/// Plain values that consist of RFC 2047 encoded words are decoded. RFC 2231
/// extended values (`key*=charset'lang'text`) and continuations
/// (`key*0*=...; key*1*=...`) are joined and decoded, and take precedence
/// over a plain value of the same name.
pub(crate) fn parse_params(params: impl IntoIterator<Item = String>) -> BTreeMap<String, String> {
    let mut plain = BTreeMap::new();
    let mut extended = BTreeMap::new();
    let mut sections: BTreeMap<String, Vec<(u32, bool, String)>> = BTreeMap::new();

    for (key, value) in params.into_iter().filter_map(|p| parse_param(&p)) {
        match key.split_once('*') {
            None => {
                let decoded = decode_rfc2047(&value).unwrap_or(value);
                plain.insert(key.clone(), decoded);
            }
            Some((name, "")) => {
                let (charset, text) = split_charset(&value);
                extended.insert(name.to_string(), decode_charset(&decode_rfc2231(text), charset));
            }
            Some((name, section)) => {
                let (index, encoded) = section
                    .strip_suffix('*')
                    .map_or((section, false), |index| (index, true));
                if let Ok(index) = index.parse::<u32>() {
                    sections
                        .entry(name.to_string())
                        .or_default()
                        .push((index, encoded, value));
                }
            }
        }
    }

    for (name, mut pieces) in sections {
        pieces.sort_by_key(|(index, _, _)| *index);

        let mut charset = "";
        let mut bytes = Vec::new();
        for (index, encoded, value) in &pieces {
            if !encoded {
                bytes.extend_from_slice(value.as_bytes());
                continue;
            }
            let text = if *index == 0 {
                let (cs, text) = split_charset(value);
                charset = cs;
                text
            } else {
                value.as_str()
            };
            bytes.extend(decode_rfc2231(text));
        }
        extended.insert(name, decode_charset(&bytes, charset));
    }

    plain.extend(extended);
    plain
}

/// Splits `charset'language'text`; values without the prefix have no charset.
fn split_charset(value: &str) -> (&str, &str) {
    let mut pieces = value.splitn(3, '\'');
    match (pieces.next(), pieces.next(), pieces.next()) {
        (Some(charset), Some(_language), Some(text)) => (charset, text),
        _ => ("", value),
    }
}

/// Writes `; key=value`.
///
/// Tokens are written bare and printable ASCII is quoted. Anything else
/// (control characters, non-ASCII text, or text that would read back as an
/// encoded word) is written as an RFC 2231 extended value, preceded by an
/// RFC 2047 form of the same value for older readers. No raw control
/// character ever reaches the output.
pub(crate) fn write_param(f: &mut fmt::Formatter<'_>, key: &str, value: &str) -> fmt::Result {
    if is_token(value) {
        return write!(f, "; {key}={value}");
    }

    let printable = value.chars().all(|c| c == ' ' || c.is_ascii_graphic());
    let reads_back = !decode_rfc2047(value).is_ok_and(|decoded| decoded != value);
    if printable && reads_back {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        return write!(f, "; {key}=\"{escaped}\"");
    }

    write!(f, "; {key}=\"{}\"", encode_rfc2047(value, "utf-8"))?;

    let encoded = encode_rfc2231(value);
    if encoded.len() <= EXTENDED_SECTION_LENGTH {
        return write!(f, "; {key}*=utf-8''{encoded}");
    }
    for (index, section) in extended_sections(&encoded).into_iter().enumerate() {
        let charset = if index == 0 { "utf-8''" } else { "" };
        write!(f, "; {key}*{index}*={charset}{section}")?;
    }
    Ok(())
}

fn is_token(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_graphic() && !TSPECIALS.contains(c))
}

/// Splits a percent-encoded value into continuation sections without
/// breaking a `%XX` escape.
fn extended_sections(encoded: &str) -> Vec<&str> {
    let bytes = encoded.as_bytes();
    let mut sections = Vec::new();
    let mut start = 0;

    while start < bytes.len() {
        let mut end = (start + EXTENDED_SECTION_LENGTH).min(bytes.len());
        if end < bytes.len() {
            if let Some(pct) = bytes[end - 2..end].iter().position(|&b| b == b'%') {
                end = end - 2 + pct;
            }
        }
        sections.push(&encoded[start..end]);
        start = end;
    }

    sections
}
