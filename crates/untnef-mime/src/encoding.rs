//! Transfer and header encodings.
//!
//! Base64 (with line folding for message bodies), Quoted-Printable decoding,
//! RFC 2047 encoded words and RFC 2231 extended parameter values.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

/// Bytes outside RFC 2231 `attribute-char`, which must be percent-encoded in
/// an extended parameter value. `CONTROLS` covers 0x00-0x1f, 0x7f and every
/// non-ASCII byte.
const ATTRIBUTE_CHAR_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*')
    .add(b',')
    .add(b'/')
    .add(b':')
    .add(b';')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'{')
    .add(b'}');

/// Longest RFC 2047 encoded word (RFC 2047 section 2).
const ENCODED_WORD_LENGTH: usize = 75;

/// Text bytes carried by one `=?utf-8?B?...?=` word: 45 bytes become 60
/// base64 characters, which with the 12 bytes of framing stays under
/// [`ENCODED_WORD_LENGTH`].
const ENCODED_WORD_TEXT_BYTES: usize = (ENCODED_WORD_LENGTH - 15) / 4 * 3;

/// Maximum encoded line length for base64 bodies (RFC 2045 section 6.8).
pub const BASE64_LINE_LENGTH: usize = 76;

/// Encodes data as a single line of Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 folded into CRLF-terminated lines of at most
/// [`BASE64_LINE_LENGTH`] characters.
///
/// Empty input yields an empty string.
#[must_use]
pub fn encode_base64_lines(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / BASE64_LINE_LENGTH * 2 + 2);

    // Base64 output is pure ASCII, so byte chunks are valid str boundaries.
    for chunk in encoded.as_bytes().chunks(BASE64_LINE_LENGTH) {
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push_str("\r\n");
    }

    out
}

/// Decodes Base64 data.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD.decode(data).map_err(Into::into)
}

/// Decodes Base64 data that may be folded across lines.
///
/// All ASCII whitespace is ignored before decoding.
///
/// # Errors
///
/// Returns an error if the remaining characters are not valid Base64.
pub fn decode_base64_lenient(data: &[u8]) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Decodes Quoted-Printable data (RFC 2045) into raw bytes.
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_quoted_printable(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        if byte != b'=' {
            result.push(byte);
            i += 1;
            continue;
        }

        // Soft line break
        match data.get(i + 1..) {
            Some([b'\r', b'\n', ..]) => {
                i += 3;
                continue;
            }
            Some([b'\n', ..]) => {
                i += 2;
                continue;
            }
            _ => {}
        }

        let hex = data
            .get(i + 1..i + 3)
            .ok_or_else(|| Error::InvalidEncoding("Incomplete escape sequence".to_string()))?;
        let hex = std::str::from_utf8(hex)
            .map_err(|_| Error::InvalidEncoding("Non-ASCII escape sequence".to_string()))?;
        let decoded = u8::from_str_radix(hex, 16)
            .map_err(|e| Error::InvalidEncoding(format!("Invalid hex: {e}")))?;
        result.push(decoded);
        i += 3;
    }

    Ok(result)
}

/// Encodes a header value using RFC 2047 encoding when it is not plain,
/// printable ASCII.
///
/// Long values are split at character boundaries into several encoded words
/// separated by a space, each at most 75 characters long.
///
/// Format: `=?charset?B?encoded-text?=`
#[must_use]
pub fn encode_rfc2047(text: &str, charset: &str) -> String {
    if text
        .chars()
        .all(|c| c.is_ascii() && !c.is_ascii_control() && c != '=' && c != '?')
    {
        return text.to_string();
    }

    let mut words = Vec::new();
    let mut start = 0;
    let mut end = 0;
    for (idx, c) in text.char_indices() {
        if idx + c.len_utf8() - start > ENCODED_WORD_TEXT_BYTES && end > start {
            words.push(&text[start..end]);
            start = end;
        }
        end = idx + c.len_utf8();
    }
    words.push(&text[start..end]);

    words
        .into_iter()
        .map(|word| format!("=?{charset}?B?{}?=", encode_base64(word.as_bytes())))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decodes an RFC 2047 encoded header value.
///
/// The value must consist of encoded words separated by whitespace; the
/// whitespace between them is dropped. Anything else is returned unchanged.
///
/// # Errors
///
/// Returns an error if an encoded word is malformed.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let words: Vec<&str> = text.split_ascii_whitespace().collect();
    let all_encoded = !words.is_empty()
        && words
            .iter()
            .all(|w| w.len() > 4 && w.starts_with("=?") && w.ends_with("?="));
    if !all_encoded {
        return Ok(text.to_string());
    }

    let mut bytes = Vec::new();
    for word in words {
        bytes.extend(decode_encoded_word(&word[2..word.len() - 2])?);
    }

    String::from_utf8(bytes).map_err(Into::into)
}

fn decode_encoded_word(inner: &str) -> Result<Vec<u8>> {
    let parts: Vec<&str> = inner.split('?').collect();
    let [_charset, encoding, encoded_text] = parts.as_slice() else {
        return Err(Error::InvalidEncoding(
            "Invalid RFC 2047 format".to_string(),
        ));
    };

    match encoding.to_ascii_uppercase().as_str() {
        "B" => decode_base64(encoded_text),
        // Q encoding uses underscore for space
        "Q" => decode_quoted_printable(encoded_text.replace('_', " ").as_bytes()),
        other => Err(Error::InvalidEncoding(format!(
            "Unknown encoding: {other}"
        ))),
    }
}

/// Percent-encodes UTF-8 text for an RFC 2231 extended parameter value.
///
/// The result carries no charset prefix; callers add `utf-8''`.
#[must_use]
pub fn encode_rfc2231(text: &str) -> String {
    utf8_percent_encode(text, ATTRIBUTE_CHAR_ESCAPES).to_string()
}

/// Reverses [`encode_rfc2231`] for one value or continuation segment.
///
/// Percent escapes are decoded to raw bytes; the caller applies the charset
/// once all segments are joined.
#[must_use]
pub fn decode_rfc2231(encoded: &str) -> Vec<u8> {
    percent_decode_str(encoded).collect()
}

/// Converts bytes in `charset` to text.
///
/// Latin-1 maps each byte to the code point of the same value; every other
/// charset is read as UTF-8, replacing invalid sequences.
#[must_use]
pub fn decode_charset(bytes: &[u8], charset: &str) -> String {
    match charset.trim().to_ascii_lowercase().as_str() {
        "iso-8859-1" | "latin1" | "latin-1" => bytes.iter().map(|&b| char::from(b)).collect(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}
