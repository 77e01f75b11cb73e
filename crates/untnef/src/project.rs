//! Turning decoded envelope fields into MIME parts.
//!
//! Output order is fixed: plain text, HTML, rich text, then attachments in
//! envelope order. Reassembly and callers that report new attachment names
//! rely on it.

use crate::config::ConvertConfig;
use crate::envelope::DecodedEnvelope;
use untnef_mime::{ContentDisposition, ContentType, Part};

/// A part synthesized from the envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedPart {
    /// The new MIME part.
    pub part: Part,
    /// Attachment name to report, for parts that are new attachments.
    pub new_name: Option<String>,
}

/// Projects every present, non-empty envelope field into a MIME part.
///
/// - plain text: `text/plain`, unencoded, no disposition
/// - HTML: `text/html`, unencoded, inline
/// - rich text: configured RTF type, base64, attachment named
///   `rtf_body_filename`
/// - each attachment: configured attachment type, base64, attachment named
///   after the record (or `<placeholder_prefix>-<n>` when the name is blank)
///
/// Duplicate attachment names are passed through unchanged.
#[must_use]
pub fn project(envelope: DecodedEnvelope, config: &ConvertConfig) -> Vec<ProjectedPart> {
    let DecodedEnvelope {
        body_text,
        body_html,
        body_rtf,
        attachments,
    } = envelope;

    let mut projected = Vec::with_capacity(attachments.len() + 3);

    if let Some(text) = body_text.filter(|b| !b.is_empty()) {
        let ct = text_type(ContentType::new("text", "plain"), &text);
        projected.push(ProjectedPart {
            part: Part::text(&ct, text),
            new_name: None,
        });
    }

    if let Some(html) = body_html.filter(|b| !b.is_empty()) {
        let ct = text_type(ContentType::new("text", "html"), &html);
        projected.push(ProjectedPart {
            part: Part::text(&ct, html).with_disposition(&ContentDisposition::inline()),
            new_name: None,
        });
    }

    if let Some(rtf) = body_rtf.filter(|b| !b.is_empty()) {
        let ct = media_type(&config.rtf_media_type);
        let name = config.rtf_body_filename.clone();
        projected.push(ProjectedPart {
            part: Part::attachment(&ct, &name, &rtf),
            new_name: Some(name),
        });
    }

    let attachment_type = media_type(&config.attachment_content_type);
    for (idx, record) in attachments.into_iter().enumerate() {
        let name = if record.filename.trim().is_empty() {
            let placeholder = format!("{}-{}", config.placeholder_prefix, idx + 1);
            tracing::warn!("Attachment {} has no filename; using {}", idx + 1, placeholder);
            placeholder
        } else {
            record.filename
        };

        projected.push(ProjectedPart {
            part: Part::attachment(&attachment_type, &name, &record.data),
            new_name: Some(name),
        });
    }

    projected
}

/// Labels a text body as UTF-8 when it is valid UTF-8.
fn text_type(ct: ContentType, body: &[u8]) -> ContentType {
    if std::str::from_utf8(body).is_ok() {
        ct.with_parameter("charset", "utf-8")
    } else {
        ct
    }
}

fn media_type(value: &str) -> ContentType {
    ContentType::parse(value).unwrap_or_else(|_| {
        tracing::warn!("Invalid media type {:?}; using application/octet-stream", value);
        ContentType::octet_stream()
    })
}
