//! Decoded envelope contents and the decoder seam.

/// One file carried inside the envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRecord {
    /// Display filename. May be empty or shared with other records.
    pub filename: String,
    /// Raw file content.
    pub data: Vec<u8>,
}

impl AttachmentRecord {
    /// Creates a new attachment record.
    #[must_use]
    pub fn new(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }
}

/// Logical contents of a decoded envelope.
///
/// Every body kind is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedEnvelope {
    /// Plain-text body.
    pub body_text: Option<Vec<u8>>,
    /// HTML body.
    pub body_html: Option<Vec<u8>>,
    /// Rich-text (RTF) body.
    pub body_rtf: Option<Vec<u8>>,
    /// File attachments, in envelope order.
    pub attachments: Vec<AttachmentRecord>,
}

impl DecodedEnvelope {
    /// Creates an envelope with no content.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the plain-text body.
    #[must_use]
    pub fn with_text(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body_text = Some(body.into());
        self
    }

    /// Sets the HTML body.
    #[must_use]
    pub fn with_html(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body_html = Some(body.into());
        self
    }

    /// Sets the rich-text body.
    #[must_use]
    pub fn with_rtf(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body_rtf = Some(body.into());
        self
    }

    /// Appends an attachment.
    #[must_use]
    pub fn with_attachment(mut self, filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.attachments.push(AttachmentRecord::new(filename, data));
        self
    }
}

/// Turns raw envelope bytes into their logical contents.
///
/// The binary envelope format lives behind this trait; the converter only
/// needs the decoded fields. Any `Fn(&[u8]) -> Result<DecodedEnvelope, E>`
/// closure implements it.
pub trait EnvelopeDecoder {
    /// Error returned for malformed envelope bytes.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Decodes raw (transfer-decoded) envelope bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `raw` is not a well-formed envelope.
    fn decode(&self, raw: &[u8]) -> Result<DecodedEnvelope, Self::Error>;
}

impl<F, E> EnvelopeDecoder for F
where
    F: Fn(&[u8]) -> Result<DecodedEnvelope, E>,
    E: std::error::Error + Send + Sync + 'static,
{
    type Error = E;

    fn decode(&self, raw: &[u8]) -> Result<DecodedEnvelope, E> {
        self(raw)
    }
}
