//! Locating and decoding the envelope part.

use crate::config::ConvertConfig;
use crate::envelope::{DecodedEnvelope, EnvelopeDecoder};
use crate::error::{Error, Result};
use untnef_mime::{Message, Part};

/// An envelope found in a message, with the position of the part carrying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// Decoded envelope contents.
    pub envelope: DecodedEnvelope,
    /// Index of the envelope part among the message's immediate parts.
    pub part_index: usize,
}

/// Checks whether `part` carries the envelope media type.
///
/// Parts with an unparseable content type never match.
#[must_use]
pub fn is_envelope_part(part: &Part, config: &ConvertConfig) -> bool {
    part.content_type()
        .is_ok_and(|ct| ct.matches(&config.envelope_media_type))
}

/// Returns the index of the first immediate part carrying the envelope.
///
/// Non-multipart messages never carry an envelope.
#[must_use]
pub fn find_envelope_part(message: &Message, config: &ConvertConfig) -> Option<usize> {
    if !message.is_multipart() {
        return None;
    }

    let mut matches = message
        .parts()
        .iter()
        .enumerate()
        .filter(|(_, part)| is_envelope_part(part, config))
        .map(|(idx, _)| idx);

    let first = matches.next()?;
    let extra = matches.count();
    if extra > 0 {
        tracing::warn!(
            "Message has {} envelope parts; only part {} is converted",
            extra + 1,
            first
        );
    }

    Some(first)
}

/// Finds the first envelope part, reverses its transfer encoding and decodes it.
///
/// Returns `Ok(None)` when the message has no envelope part. The message is
/// only read.
///
/// # Errors
///
/// Returns [`Error::TransportDecode`] if the part body does not match its
/// declared transfer encoding, and [`Error::EnvelopeDecode`] if the decoder
/// rejects the bytes.
pub fn extract<D: EnvelopeDecoder>(
    message: &Message,
    decoder: &D,
    config: &ConvertConfig,
) -> Result<Option<Extracted>> {
    let Some(part_index) = find_envelope_part(message, config) else {
        return Ok(None);
    };

    let part = &message.parts()[part_index];
    let raw = part.decode_body().map_err(Error::TransportDecode)?;
    tracing::debug!(
        "Found envelope in part {} ({} bytes, {})",
        part_index,
        raw.len(),
        part.transfer_encoding()
    );

    let envelope = decoder
        .decode(&raw)
        .map_err(|e| Error::EnvelopeDecode(Box::new(e)))?;

    Ok(Some(Extracted {
        envelope,
        part_index,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use untnef_mime::encoding::encode_base64_lines;
    use untnef_mime::{ContentType, Headers};

    #[derive(Debug, thiserror::Error)]
    #[error("bad signature")]
    struct BadSignature;

    fn decoder(raw: &[u8]) -> std::result::Result<DecodedEnvelope, BadSignature> {
        raw.strip_prefix(b"TNEF")
            .map(|rest| DecodedEnvelope::new().with_text(rest))
            .ok_or(BadSignature)
    }

    fn part(content_type: &str, encoding: &str, body: &[u8]) -> Part {
        let mut headers = Headers::new();
        headers.add("Content-Type", content_type);
        headers.add("Content-Transfer-Encoding", encoding);
        Part::new(headers, body.to_vec())
    }

    fn tnef_part(payload: &[u8]) -> Part {
        part(
            "application/ms-tnef; name=\"winmail.dat\"",
            "base64",
            encode_base64_lines(payload).as_bytes(),
        )
    }

    fn multipart(parts: Vec<Part>) -> Message {
        let mut headers = Headers::new();
        headers.add("Content-Type", ContentType::multipart_mixed("b").to_string());
        Message::multipart(headers, parts)
    }

    #[test]
    fn test_single_part_has_no_envelope() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "application/ms-tnef");
        let message = Message::single_part(headers, b"TNEF".to_vec());

        let config = ConvertConfig::default();
        assert_eq!(find_envelope_part(&message, &config), None);
        assert!(extract(&message, &decoder, &config).unwrap().is_none());
    }

    #[test]
    fn test_no_envelope_part() {
        let message = multipart(vec![part("text/plain", "7bit", b"hi")]);
        let config = ConvertConfig::default();
        assert!(extract(&message, &decoder, &config).unwrap().is_none());
    }

    #[test]
    fn test_first_envelope_wins() {
        let message = multipart(vec![
            part("text/plain", "7bit", b"hi"),
            tnef_part(b"TNEFfirst"),
            tnef_part(b"TNEFsecond"),
        ]);

        let extracted = extract(&message, &decoder, &ConvertConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(extracted.part_index, 1);
        assert_eq!(extracted.envelope.body_text.as_deref(), Some(&b"first"[..]));
    }

    #[test]
    fn test_media_type_from_config() {
        let message = multipart(vec![part("application/vnd.ms-tnef", "binary", b"TNEFx")]);

        let mut config = ConvertConfig::default();
        assert!(find_envelope_part(&message, &config).is_none());

        config.envelope_media_type = "application/vnd.ms-tnef".to_string();
        let extracted = extract(&message, &decoder, &config).unwrap().unwrap();
        assert_eq!(extracted.envelope.body_text.as_deref(), Some(&b"x"[..]));
    }

    #[test]
    fn test_unparseable_content_type_is_skipped() {
        let message = multipart(vec![part("garbage", "7bit", b"TNEF"), tnef_part(b"TNEFok")]);
        let extracted = extract(&message, &decoder, &ConvertConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(extracted.part_index, 1);
    }

    #[test]
    fn test_transport_error() {
        let message = multipart(vec![part("application/ms-tnef", "base64", b"!!not base64!!")]);
        let err = extract(&message, &decoder, &ConvertConfig::default()).unwrap_err();
        assert!(matches!(err, Error::TransportDecode(_)));
        assert!(err.is_envelope_error());
    }

    #[test]
    fn test_envelope_error() {
        let message = multipart(vec![tnef_part(b"garbage")]);
        let err = extract(&message, &decoder, &ConvertConfig::default()).unwrap_err();
        assert!(matches!(err, Error::EnvelopeDecode(_)));
        assert_eq!(err.to_string(), "Envelope decode error: bad signature");
    }
}
