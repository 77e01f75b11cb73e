//! MIME message structure, parsing and serialization.

use crate::content_type::ContentType;
use crate::disposition::ContentDisposition;
use crate::encoding::{decode_base64_lenient, decode_quoted_printable, encode_base64_lines};
use crate::error::{Error, Result};
use crate::header::Headers;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit, // Default (includes "7bit")
        }
    }

    /// Picks the identity encoding label for `data`: 7bit for pure ASCII,
    /// 8bit otherwise.
    #[must_use]
    pub fn identity_for(data: &[u8]) -> Self {
        if data.is_ascii() {
            Self::SevenBit
        } else {
            Self::EightBit
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// MIME message part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Part body, still in its transfer encoding.
    pub body: Vec<u8>,
}

impl Part {
    /// Creates a new part.
    #[must_use]
    pub const fn new(headers: Headers, body: Vec<u8>) -> Self {
        Self { headers, body }
    }

    /// Creates a part whose body is stored unencoded (7bit or 8bit).
    #[must_use]
    pub fn text(content_type: &ContentType, body: Vec<u8>) -> Self {
        let mut headers = Headers::new();
        headers.add("Content-Type", content_type.to_string());
        headers.add(
            "Content-Transfer-Encoding",
            TransferEncoding::identity_for(&body).to_string(),
        );
        Self::new(headers, body)
    }

    /// Creates a base64 encoded attachment part named `filename`.
    #[must_use]
    pub fn attachment(content_type: &ContentType, filename: &str, data: &[u8]) -> Self {
        let mut headers = Headers::new();
        headers.add("Content-Type", content_type.to_string());
        headers.add("Content-Transfer-Encoding", TransferEncoding::Base64.to_string());
        headers.add(
            "Content-Disposition",
            ContentDisposition::attachment(filename).to_string(),
        );
        Self::new(headers, encode_base64_lines(data).into_bytes())
    }

    /// Sets the `Content-Disposition` header.
    #[must_use]
    pub fn with_disposition(mut self, disposition: &ContentDisposition) -> Self {
        self.headers
            .set("Content-Disposition", disposition.to_string());
        self
    }

    /// Gets the content type.
    ///
    /// # Errors
    ///
    /// Returns an error if content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Gets the content disposition, if the header is present.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is present but invalid.
    pub fn disposition(&self) -> Result<Option<ContentDisposition>> {
        self.headers
            .get("content-disposition")
            .map(ContentDisposition::parse)
            .transpose()
    }

    /// Gets the filename from the disposition, falling back to the
    /// content type `name` parameter.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        if let Ok(Some(cd)) = self.disposition() {
            if let Some(name) = cd.filename() {
                return Some(name);
            }
        }

        self.content_type()
            .ok()
            .and_then(|ct| ct.parameters.get("name").cloned())
    }

    /// Decodes the body according to the transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        match self.transfer_encoding() {
            TransferEncoding::Base64 => decode_base64_lenient(&self.body),
            TransferEncoding::QuotedPrintable => decode_quoted_printable(&self.body),
            _ => Ok(self.body.clone()),
        }
    }

    /// Gets the decoded body as a string.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding or UTF-8 conversion fails.
    pub fn body_text(&self) -> Result<String> {
        let decoded = self.decode_body()?;
        String::from_utf8(decoded).map_err(Into::into)
    }

    /// Parses a part from its raw bytes (headers, empty line, body).
    ///
    /// # Errors
    ///
    /// Returns an error if the header block is malformed.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let (head, body) = split_head(raw);
        let headers = Headers::parse_bytes(head)?;
        Ok(Self::new(headers, body.to_vec()))
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        self.headers.write_to(out);
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
    }
}

/// Message body: either a single payload or an ordered list of parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Body of a non-multipart message, in its transfer encoding.
    Single(Vec<u8>),
    /// Immediate parts of a multipart message.
    Multipart(Vec<Part>),
}

/// MIME message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message headers.
    pub headers: Headers,
    /// Message body.
    pub body: Body,
}

impl Message {
    /// Creates a single-part message.
    #[must_use]
    pub const fn single_part(headers: Headers, body: Vec<u8>) -> Self {
        Self {
            headers,
            body: Body::Single(body),
        }
    }

    /// Creates a multipart message.
    #[must_use]
    pub const fn multipart(headers: Headers, parts: Vec<Part>) -> Self {
        Self {
            headers,
            body: Body::Multipart(parts),
        }
    }

    /// Gets the content type.
    ///
    /// # Errors
    ///
    /// Returns an error if content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)
    }

    /// Checks if this is a multipart message.
    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        matches!(self.body, Body::Multipart(_))
    }

    /// Returns the immediate parts (empty for single-part messages).
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        match &self.body {
            Body::Multipart(parts) => parts,
            Body::Single(_) => &[],
        }
    }

    /// Gets the Subject header.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.headers.get("subject")
    }

    /// Gets the Message-ID header.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.headers.get("message-id")
    }

    /// Finds the first immediate part whose type is `media_type`.
    #[must_use]
    pub fn find_part(&self, media_type: &str) -> Option<&Part> {
        self.parts()
            .iter()
            .find(|part| part.content_type().is_ok_and(|ct| ct.matches(media_type)))
    }

    /// Parses a message.
    ///
    /// Only the immediate parts of a top-level multipart body are split out;
    /// nested multiparts stay as the raw body of their enclosing part. The
    /// preamble and epilogue are discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if headers are malformed, or a multipart content type
    /// has no boundary.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let (head, body) = split_head(raw);
        let headers = Headers::parse_bytes(head)?;

        let content_type = match headers.get("content-type") {
            Some(value) => Some(ContentType::parse(value)?),
            None => None,
        };

        match content_type {
            Some(ct) if ct.is_multipart() => {
                let boundary = ct.boundary().ok_or(Error::MissingBoundary)?;
                let parts = split_multipart(body, boundary)?;
                Ok(Self::multipart(headers, parts))
            }
            _ => Ok(Self::single_part(headers, body.to_vec())),
        }
    }

    /// Serializes the message with CRLF line endings.
    ///
    /// A multipart message reuses its boundary. When the content type has no
    /// boundary (or is not multipart at all), a `multipart/mixed` type with a
    /// generated boundary is written instead.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();

        match &self.body {
            Body::Single(body) => {
                self.headers.write_to(&mut out);
                out.extend_from_slice(b"\r\n");
                out.extend_from_slice(body);
            }
            Body::Multipart(parts) => {
                let existing = self
                    .content_type()
                    .ok()
                    .filter(ContentType::is_multipart)
                    .and_then(|ct| ct.boundary().map(str::to_string));

                let boundary = if let Some(boundary) = existing {
                    self.headers.write_to(&mut out);
                    boundary
                } else {
                    let boundary = generate_boundary(parts);
                    let mut headers = self.headers.clone();
                    headers.set(
                        "Content-Type",
                        ContentType::multipart_mixed(boundary.as_str()).to_string(),
                    );
                    headers.write_to(&mut out);
                    boundary
                };
                out.extend_from_slice(b"\r\n");

                for part in parts {
                    out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
                    part.write_to(&mut out);
                    out.extend_from_slice(b"\r\n");
                }
                out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
            }
        }

        out
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_bytes()))
    }
}

/// Splits raw bytes at the first empty line into (header block, body).
///
/// Input without an empty line is all headers.
fn split_head(raw: &[u8]) -> (&[u8], &[u8]) {
    let mut pos = 0;

    while pos < raw.len() {
        let end = raw[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(raw.len(), |i| pos + i);
        let line = &raw[pos..end];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let next = (end + 1).min(raw.len());

        if line.is_empty() {
            return (&raw[..pos], &raw[next..]);
        }
        pos = next;
    }

    (raw, &[])
}

/// Splits a multipart body into its immediate parts.
///
/// The line break before each delimiter line belongs to the delimiter.
fn split_multipart(body: &[u8], boundary: &str) -> Result<Vec<Part>> {
    let open = format!("--{boundary}");
    let close = format!("--{boundary}--");

    let mut parts = Vec::new();
    let mut current: Option<usize> = None;
    let mut pos = 0;

    while pos < body.len() {
        let end = body[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |i| pos + i);
        let next = (end + 1).min(body.len());
        let line = trim_line_end(&body[pos..end]);

        let is_close = line == close.as_bytes();
        if is_close || line == open.as_bytes() {
            if let Some(start) = current.take() {
                parts.push(Part::parse(&body[start..content_end(body, start, pos)])?);
            }
            if is_close {
                return Ok(parts);
            }
            current = Some(next);
        }
        pos = next;
    }

    // Missing close delimiter: keep what follows the last delimiter.
    if let Some(start) = current {
        parts.push(Part::parse(&body[start..])?);
    }

    Ok(parts)
}

/// End of a part's content that is followed by a delimiter line at `delimiter`.
fn content_end(body: &[u8], start: usize, delimiter: usize) -> usize {
    let mut end = delimiter;
    if end > start && body[end - 1] == b'\n' {
        end -= 1;
        if end > start && body[end - 1] == b'\r' {
            end -= 1;
        }
    }
    end
}

/// Strips the trailing CR and transport padding (spaces, tabs) from a line.
fn trim_line_end(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|&b| !matches!(b, b'\r' | b' ' | b'\t'))
        .map_or(0, |i| i + 1);
    &line[..end]
}

/// Generates a boundary that does not occur in any part.
fn generate_boundary(parts: &[Part]) -> String {
    let mut hasher = DefaultHasher::new();
    for part in parts {
        part.body.hash(&mut hasher);
    }

    let mut seed = hasher.finish();
    loop {
        let candidate = format!("----=_untnef_{seed:016x}");
        let collides = parts.iter().any(|part| {
            contains(&part.body, candidate.as_bytes())
                || part.headers.iter().any(|(_, v)| v.contains(&candidate))
        });
        if !collides {
            return candidate;
        }
        seed = seed.wrapping_add(1);
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
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
    use crate::header::FOLD_LINE_LENGTH;

    const MULTIPART: &str = concat!(
        "From: sender@example.com\r\n",
        "Subject: Test\r\n",
        "Content-Type: multipart/mixed; boundary=\"b1\"\r\n",
        "\r\n",
        "This is a preamble.\r\n",
        "--b1\r\n",
        "Content-Type: text/plain\r\n",
        "\r\n",
        "Part 1\r\n",
        "--b1\r\n",
        "Content-Type: application/ms-tnef; name=\"winmail.dat\"\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "\r\n",
        "eJ8+IgAB\r\n",
        "--b1--\r\n",
        "epilogue\r\n",
    );

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse(" BASE64 "), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("quoted-printable"),
            TransferEncoding::QuotedPrintable
        );
    }

    #[test]
    fn test_transfer_encoding_identity_for() {
        assert_eq!(TransferEncoding::identity_for(b"plain"), TransferEncoding::SevenBit);
        assert_eq!(
            TransferEncoding::identity_for("Grüße".as_bytes()),
            TransferEncoding::EightBit
        );
    }

    #[test]
    fn test_part_body_text() {
        let mut headers = Headers::new();
        headers.add("content-type", "text/plain; charset=utf-8");
        let part = Part::new(headers, b"Hello, World!".to_vec());

        assert_eq!(part.body_text().unwrap(), "Hello, World!");
    }

    #[test]
    fn test_part_attachment() {
        let part = Part::attachment(&ContentType::octet_stream(), "report.pdf", b"%PD");

        assert_eq!(part.transfer_encoding(), TransferEncoding::Base64);
        assert!(part.content_type().unwrap().matches("application/octet-stream"));
        assert!(part.disposition().unwrap().unwrap().is_attachment());
        assert_eq!(part.filename().as_deref(), Some("report.pdf"));
        assert_eq!(part.decode_body().unwrap(), b"%PD");
    }

    #[test]
    fn test_part_text_with_disposition() {
        let part = Part::text(&ContentType::text_html(), b"<p>hi</p>".to_vec())
            .with_disposition(&ContentDisposition::inline());

        assert_eq!(part.headers.get("Content-Transfer-Encoding"), Some("7bit"));
        assert_eq!(part.headers.get("Content-Disposition"), Some("inline"));
        assert_eq!(part.body, b"<p>hi</p>");
    }

    #[test]
    fn test_part_filename_falls_back_to_name() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "application/ms-tnef; name=\"winmail.dat\"");
        let part = Part::new(headers, Vec::new());
        assert_eq!(part.filename().as_deref(), Some("winmail.dat"));
    }

    #[test]
    fn test_message_parse_single_part() {
        let raw = b"From: sender@example.com\nSubject: Test\n\nHello, World!\n";
        let message = Message::parse(raw).unwrap();

        assert!(!message.is_multipart());
        assert!(message.parts().is_empty());
        assert_eq!(message.subject(), Some("Test"));
        assert_eq!(message.body, Body::Single(b"Hello, World!\n".to_vec()));
    }

    #[test]
    fn test_message_parse_multipart() {
        let message = Message::parse(MULTIPART.as_bytes()).unwrap();

        assert!(message.is_multipart());
        assert_eq!(message.parts().len(), 2);
        assert_eq!(message.parts()[0].body, b"Part 1");
        assert_eq!(message.parts()[1].body, b"eJ8+IgAB");

        let tnef = message.find_part("application/ms-tnef").unwrap();
        assert_eq!(tnef.decode_body().unwrap(), vec![0x78, 0x9f, 0x3e, 0x22, 0x00, 0x01]);
    }

    #[test]
    fn test_message_parse_lf_only() {
        let raw = MULTIPART.replace("\r\n", "\n");
        let message = Message::parse(raw.as_bytes()).unwrap();
        assert_eq!(message.parts().len(), 2);
        assert_eq!(message.parts()[0].body, b"Part 1");
    }

    #[test]
    fn test_message_parse_missing_boundary() {
        let raw = b"Content-Type: multipart/mixed\r\n\r\n--x\r\n\r\nbody\r\n--x--\r\n";
        assert!(matches!(Message::parse(raw), Err(Error::MissingBoundary)));
    }

    #[test]
    fn test_message_parse_unterminated_multipart() {
        let raw = b"Content-Type: multipart/mixed; boundary=x\r\n\r\n--x\r\n\r\nbody\r\n";
        let message = Message::parse(raw).unwrap();
        assert_eq!(message.parts().len(), 1);
        assert_eq!(message.parts()[0].body, b"body\r\n");
    }

    #[test]
    fn test_message_serialize_reparse_is_stable() {
        let message = Message::parse(MULTIPART.as_bytes()).unwrap();
        let first = message.to_bytes();
        assert_eq!(message.to_string().as_bytes(), first.as_slice());
        let reparsed = Message::parse(&first).unwrap();

        assert_eq!(reparsed, message);
        assert_eq!(reparsed.to_bytes(), first);

        let text = String::from_utf8(first).unwrap();
        assert!(text.contains("--b1\r\n"));
        assert!(text.ends_with("--b1--\r\n"));
        assert!(!text.contains("preamble"));
    }

    #[test]
    fn test_message_serialize_generates_boundary() {
        let mut headers = Headers::new();
        headers.add("Subject", "Built");
        let part = Part::text(&ContentType::text_plain(), b"body".to_vec());
        let message = Message::multipart(headers, vec![part]);

        let bytes = message.to_bytes();
        let reparsed = Message::parse(&bytes).unwrap();
        let ct = reparsed.content_type().unwrap();

        assert!(ct.is_multipart());
        assert!(ct.boundary().unwrap().starts_with("----=_untnef_"));
        assert_eq!(reparsed.parts(), message.parts());
        assert_eq!(reparsed.subject(), Some("Built"));
    }

    #[test]
    fn test_message_eight_bit_headers_survive() {
        let raw: &[u8] = b"Subject: Gr\xfc\xdfe aus K\xf6ln\r\n\
            Content-Type: multipart/mixed; boundary=b1\r\n\
            \r\n\
            --b1\r\n\
            Content-Type: text/plain; name=\"\xe4.txt\"\r\n\
            \r\n\
            hi\r\n\
            --b1--\r\n";
        let message = Message::parse(raw).unwrap();
        assert_eq!(
            message.headers.get_raw("Subject"),
            Some(&b"Gr\xfc\xdfe aus K\xf6ln"[..])
        );

        let bytes = message.to_bytes();
        assert_eq!(bytes, raw.to_vec());
        assert_eq!(Message::parse(&bytes).unwrap(), message);
    }

    #[test]
    fn test_message_long_folded_header_is_refolded() {
        let references: Vec<String> = (0..60)
            .map(|i| format!("<{i:03}.1234567890@outlook.example.com>"))
            .collect();
        let mut raw = String::from("References: ");
        raw.push_str(&references.join("\r\n "));
        raw.push_str("\r\nContent-Type: multipart/mixed; boundary=b1\r\n\r\n");
        raw.push_str("--b1\r\nContent-Type: text/plain\r\n\r\nhi\r\n--b1--\r\n");

        let message = Message::parse(raw.as_bytes()).unwrap();
        assert_eq!(
            message.headers.get("References").map(|r| r.split(' ').count()),
            Some(60)
        );

        let bytes = message.to_bytes();
        let longest = bytes.split(|&b| b == b'\n').map(<[u8]>::len).max().unwrap();
        assert!(longest <= FOLD_LINE_LENGTH + 1, "longest line is {longest} bytes");

        let reparsed = Message::parse(&bytes).unwrap();
        assert_eq!(reparsed, message);
        assert_eq!(reparsed.to_bytes(), bytes);
    }

    proptest::proptest! {
        #[test]
        fn prop_serialized_multipart_reparses_identically(
            bodies in proptest::collection::vec("[a-zA-Z0-9 .,\r\n-]{0,200}", 0..6),
            subject in "[a-zA-Z0-9 ]{0,40}",
        ) {
            let mut headers = Headers::new();
            headers.add("Subject", subject.trim());
            headers.add("Content-Type", "multipart/mixed; boundary=\"=_fixed_=\"");
            let parts: Vec<Part> = bodies
                .into_iter()
                .map(|b| Part::text(&ContentType::text_plain(), b.into_bytes()))
                .collect();
            let message = Message::multipart(headers, parts);

            let reparsed = Message::parse(&message.to_bytes()).unwrap();
            proptest::prop_assert_eq!(reparsed, message);
        }
    }

    #[test]
    fn test_split_head_without_body() {
        let (head, body) = split_head(b"Subject: only headers\r\n");
        assert_eq!(head, b"Subject: only headers\r\n");
        assert!(body.is_empty());
    }
}
