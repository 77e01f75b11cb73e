//! Property tests for pass-through and idempotence.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use untnef::{Converter, DecodedEnvelope, Message, Mode};
use untnef_mime::encoding::encode_base64_lines;
use untnef_mime::{ContentType, Headers, Part};

#[derive(Debug, thiserror::Error)]
#[error("never decodes")]
struct Never;

fn rejecting(_raw: &[u8]) -> Result<DecodedEnvelope, Never> {
    Err(Never)
}

fn non_envelope_part() -> impl Strategy<Value = Part> {
    (
        prop::sample::select(vec![
            "text/plain",
            "text/html",
            "image/png",
            "application/pdf",
            "application/octet-stream",
        ]),
        "[a-zA-Z0-9 .,]{0,120}",
    )
        .prop_map(|(media_type, body)| {
            let ct = ContentType::parse(media_type).unwrap();
            Part::text(&ct, body.into_bytes())
        })
}

/// Names mixing plain text with control characters, quotes, encoded-word
/// markers and non-ASCII text.
fn attachment_name() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9 ._-]{0,40}",
        "[ -~]{0,40}",
        prop::collection::vec(any::<char>(), 0..30).prop_map(String::from_iter),
        Just("=?utf-8?B?eA==?=".to_string()),
        Just("evil.txt\r\nX-Injected: yes".to_string()),
    ]
}

fn envelope_strategy() -> impl Strategy<Value = DecodedEnvelope> {
    (
        prop::option::of("[a-z ]{0,40}"),
        prop::option::of("[a-z<>/ ]{0,40}"),
        prop::option::of(prop::collection::vec(any::<u8>(), 0..64)),
        prop::collection::vec(
            (attachment_name(), prop::collection::vec(any::<u8>(), 0..64)),
            0..5,
        ),
    )
        .prop_map(|(text, html, rtf, attachments)| {
            let mut envelope = DecodedEnvelope::new();
            envelope.body_text = text.map(String::into_bytes);
            envelope.body_html = html.map(String::into_bytes);
            envelope.body_rtf = rtf;
            for (name, data) in attachments {
                envelope = envelope.with_attachment(name, data);
            }
            envelope
        })
}

fn multipart(parts: Vec<Part>) -> Message {
    let mut headers = Headers::new();
    headers.add("Subject", "generated");
    headers.add("Content-Type", "multipart/mixed; boundary=\"=_prop_=\"");
    Message::multipart(headers, parts)
}

fn envelope_part() -> Part {
    let mut headers = Headers::new();
    headers.add("Content-Type", "application/ms-tnef; name=\"winmail.dat\"");
    headers.add("Content-Transfer-Encoding", "base64");
    Part::new(headers, encode_base64_lines(b"TNEF").into_bytes())
}

fn non_empty(body: Option<&Vec<u8>>) -> usize {
    usize::from(body.is_some_and(|b| !b.is_empty()))
}

proptest! {
    #[test]
    fn single_part_messages_pass_through(body in "[ -~\r\n]{0,200}") {
        let mut headers = Headers::new();
        headers.add("Content-Type", "application/ms-tnef");
        let input = Message::single_part(headers, body.into_bytes());

        let result = Converter::new(rejecting).convert(&input, Mode::Strip).unwrap();
        prop_assert!(!result.envelope_found);
        prop_assert!(result.new_attachments.is_empty());
        prop_assert_eq!(result.message, input);
    }

    #[test]
    fn multipart_without_envelope_passes_through(
        parts in prop::collection::vec(non_envelope_part(), 0..6),
    ) {
        let input = multipart(parts);
        let result = Converter::new(rejecting).convert(&input, Mode::Preserve).unwrap();

        prop_assert!(!result.envelope_found);
        prop_assert_eq!(result.to_bytes(), input.to_bytes());
        prop_assert_eq!(result.message, input);
    }

    #[test]
    fn projected_part_counts_and_strip_fixed_point(
        before in prop::collection::vec(non_envelope_part(), 0..3),
        after in prop::collection::vec(non_envelope_part(), 0..3),
        envelope in envelope_strategy(),
    ) {
        let expected_parts = non_empty(envelope.body_text.as_ref())
            + non_empty(envelope.body_html.as_ref())
            + non_empty(envelope.body_rtf.as_ref())
            + envelope.attachments.len();
        let expected_names = non_empty(envelope.body_rtf.as_ref()) + envelope.attachments.len();

        let originals: Vec<Part> = before.iter().chain(after.iter()).cloned().collect();
        let mut parts = before;
        parts.push(envelope_part());
        parts.extend(after);
        let input = multipart(parts);

        let decoder = move |_raw: &[u8]| -> Result<DecodedEnvelope, Never> { Ok(envelope.clone()) };
        let converter = Converter::new(decoder);

        let stripped = converter.convert(&input, Mode::Strip).unwrap();
        prop_assert!(stripped.envelope_found);
        prop_assert_eq!(stripped.new_attachments.len(), expected_names);
        prop_assert_eq!(stripped.message.parts().len(), originals.len() + expected_parts);
        prop_assert_eq!(&stripped.message.parts()[..originals.len()], originals.as_slice());

        let bytes = stripped.to_bytes();
        let reparsed = Message::parse(&bytes).unwrap();
        prop_assert_eq!(reparsed.parts(), stripped.message.parts());
        let filenames: Vec<String> = reparsed.parts()[originals.len()..]
            .iter()
            .filter_map(Part::filename)
            .collect();
        prop_assert_eq!(&filenames, &stripped.new_attachments);

        let again = converter.convert_bytes(&bytes, Mode::Strip).unwrap();
        prop_assert!(!again.envelope_found);
        prop_assert_eq!(again.to_bytes(), bytes);

        let preserved = converter.convert(&input, Mode::Preserve).unwrap();
        prop_assert_eq!(preserved.message.parts().len(), originals.len() + 1 + expected_parts);
    }
}
