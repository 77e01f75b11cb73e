//! Building the converted message.

use crate::config::{ConvertConfig, Mode};
use untnef_mime::{ContentDisposition, ContentType, Message, Part};

/// Builds the converted message from `message` and the projected parts.
///
/// Every non-envelope part is kept unchanged and in order, followed by
/// `projected` in order. The part at `envelope_index` is relabeled as a
/// generic attachment (preserve mode) or dropped together with the correlator
/// header (strip mode). The input message is not modified.
#[must_use]
pub fn reassemble(
    message: &Message,
    envelope_index: usize,
    projected: Vec<Part>,
    mode: Mode,
    config: &ConvertConfig,
) -> Message {
    let mut headers = message.headers.clone();
    let mut parts = Vec::with_capacity(message.parts().len() + projected.len());

    for (idx, part) in message.parts().iter().enumerate() {
        if idx != envelope_index {
            parts.push(part.clone());
            continue;
        }
        match mode {
            Mode::Preserve => parts.push(relabel(part, config)),
            Mode::Strip => {}
        }
    }
    parts.extend(projected);

    if mode == Mode::Strip || config.strip_correlator_on_preserve {
        headers.remove(&config.correlator_header);
    }

    Message::multipart(headers, parts)
}

/// Relabels the envelope part as a generic attachment under the renamed
/// filename, keeping its body and transfer encoding.
fn relabel(part: &Part, config: &ConvertConfig) -> Part {
    let name = config.renamed_envelope_filename.as_str();
    let content_type = ContentType::parse(&config.attachment_content_type)
        .unwrap_or_else(|_| ContentType::octet_stream())
        .with_parameter("name", name);

    let mut relabeled = part.clone();
    relabeled
        .headers
        .set("Content-Type", content_type.to_string());
    relabeled
        .headers
        .set("Content-Disposition", ContentDisposition::attachment(name).to_string());
    relabeled
}
