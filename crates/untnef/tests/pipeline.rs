//! End-to-end tests for the conversion pipeline.
//!
//! A fixture decoder stands in for the binary envelope format: it accepts one
//! known payload and rejects everything else.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use untnef::{ConvertConfig, Converter, DecodedEnvelope, EnvelopeDecoder, Error, Message, Mode};
use untnef_mime::Part;

/// Raw envelope payload carried (base64 encoded) by the fixtures below.
const PAYLOAD: &[u8] = &[0x78, 0x9f, 0x3e, 0x22, 0x00, 0x01, 0x06, 0x90];
const PAYLOAD_BASE64: &str = "eJ8+IgABBpA=";

const OUTLOOK_MESSAGE: &str = concat!(
    "From: Alice <alice@example.com>\r\n",
    "To: Bob <bob@example.com>\r\n",
    "Subject: Q3 numbers\r\n",
    "Message-ID: <q3@example.com>\r\n",
    "MIME-Version: 1.0\r\n",
    "X-MS-TNEF-Correlator: <00000000A1B2@example.com>\r\n",
    "Content-Type: multipart/mixed;\r\n",
    "\tboundary=\"----=_NextPart_000_0001\"\r\n",
    "\r\n",
    "This is a multi-part message in MIME format.\r\n",
    "\r\n",
    "------=_NextPart_000_0001\r\n",
    "Content-Type: text/plain; charset=\"us-ascii\"\r\n",
    "Content-Transfer-Encoding: 7bit\r\n",
    "\r\n",
    "Numbers attached.\r\n",
    "\r\n",
    "------=_NextPart_000_0001\r\n",
    "Content-Type: application/ms-tnef;\r\n",
    "\tname=\"winmail.dat\"\r\n",
    "Content-Transfer-Encoding: base64\r\n",
    "Content-Disposition: attachment;\r\n",
    "\tfilename=\"winmail.dat\"\r\n",
    "\r\n",
    "eJ8+IgABBpA=\r\n",
    "\r\n",
    "------=_NextPart_000_0001--\r\n",
);

const PLAIN_MESSAGE: &str = concat!(
    "From: alice@example.com\r\n",
    "Subject: hello\r\n",
    "Content-Type: text/plain\r\n",
    "\r\n",
    "Just text.\r\n",
);

#[derive(Debug, thiserror::Error)]
#[error("unrecognized envelope ({0} bytes)")]
struct Unrecognized(usize);

/// Decodes exactly [`PAYLOAD`] into a fixed envelope.
struct FixtureDecoder {
    envelope: DecodedEnvelope,
}

impl EnvelopeDecoder for FixtureDecoder {
    type Error = Unrecognized;

    fn decode(&self, raw: &[u8]) -> Result<DecodedEnvelope, Unrecognized> {
        if raw == PAYLOAD {
            Ok(self.envelope.clone())
        } else {
            Err(Unrecognized(raw.len()))
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn full_envelope() -> DecodedEnvelope {
    DecodedEnvelope::new()
        .with_text("Numbers attached.")
        .with_html("<p>Numbers attached.</p>")
        .with_rtf(b"{\\rtf1 Numbers attached.}".to_vec())
        .with_attachment("q3.xlsx", vec![0x50_u8, 0x4b, 0x03, 0x04])
        .with_attachment("notes.txt", b"see row 12".to_vec())
}

fn converter(envelope: DecodedEnvelope) -> Converter<FixtureDecoder> {
    init_tracing();
    Converter::new(FixtureDecoder { envelope })
}

fn parse(raw: &str) -> Message {
    Message::parse(raw.as_bytes()).unwrap()
}

fn replace_first(haystack: &[u8], needle: &str, with: &[u8]) -> Vec<u8> {
    let at = haystack
        .windows(needle.len())
        .position(|w| w == needle.as_bytes())
        .expect("needle present");
    [&haystack[..at], with, &haystack[at + needle.len()..]].concat()
}

fn longest_line(bytes: &[u8]) -> usize {
    bytes
        .split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line).len())
        .max()
        .unwrap_or(0)
}

fn types(parts: &[Part]) -> Vec<String> {
    parts
        .iter()
        .map(|p| p.content_type().unwrap().essence())
        .collect()
}

#[test]
fn fixture_payload_matches_base64() {
    let message = parse(OUTLOOK_MESSAGE);
    let envelope = message.find_part("application/ms-tnef").unwrap();
    assert_eq!(envelope.decode_body().unwrap(), PAYLOAD);
    assert_eq!(
        untnef_mime::encoding::encode_base64(PAYLOAD),
        PAYLOAD_BASE64
    );
}

#[test]
fn full_envelope_strip_mode() {
    let converter = converter(full_envelope());
    let input = parse(OUTLOOK_MESSAGE);
    assert!(converter.has_envelope(&input));

    let result = converter.convert(&input, Mode::Strip).unwrap();
    assert!(result.envelope_found);
    assert_eq!(result.new_attachments, ["mail-body.rtf", "q3.xlsx", "notes.txt"]);

    let parts = result.message.parts();
    // original text part + text, html, rtf + 2 attachments
    assert_eq!(parts.len(), 1 + 3 + 2);
    assert_eq!(parts[0], input.parts()[0]);
    assert_eq!(
        types(&parts[1..]),
        [
            "text/plain",
            "text/html",
            "application/rtf",
            "application/octet-stream",
            "application/octet-stream",
        ]
    );
    assert_eq!(parts[1].body_text().unwrap(), "Numbers attached.");
    assert_eq!(parts[3].decode_body().unwrap(), b"{\\rtf1 Numbers attached.}");
    assert_eq!(parts[4].filename().as_deref(), Some("q3.xlsx"));
    assert_eq!(parts[4].decode_body().unwrap(), [0x50, 0x4b, 0x03, 0x04]);
    assert_eq!(parts[5].body_text().unwrap(), "see row 12");

    assert!(!result.message.headers.contains("X-MS-TNEF-Correlator"));
    assert_eq!(result.message.subject(), Some("Q3 numbers"));
}

#[test]
fn full_envelope_preserve_mode_keeps_payload() {
    let converter = converter(full_envelope());
    let input = parse(OUTLOOK_MESSAGE);

    let result = converter.convert(&input, Mode::Preserve).unwrap();
    let parts = result.message.parts();
    assert_eq!(parts.len(), 2 + 3 + 2);

    let original = &parts[1];
    assert_eq!(original.filename().as_deref(), Some("original-winmail.dat"));
    assert!(original.content_type().unwrap().matches("application/octet-stream"));
    assert_eq!(original.decode_body().unwrap(), PAYLOAD);

    // Correlator is left in place in preserve mode by default.
    assert!(result.message.headers.contains("X-MS-TNEF-Correlator"));

    // The relabeled part is no longer an envelope.
    assert!(!converter.has_envelope(&result.message));
    let again = converter.convert(&result.message, Mode::Preserve).unwrap();
    assert!(!again.envelope_found);
}

#[test]
fn serialized_output_survives_reparse() {
    let converter = converter(full_envelope());
    let result = converter
        .convert_bytes(OUTLOOK_MESSAGE.as_bytes(), Mode::Preserve)
        .unwrap();

    let bytes = result.to_bytes();
    let text = String::from_utf8(bytes.clone()).unwrap();
    assert!(text.contains("Content-Disposition: attachment; filename=mail-body.rtf\r\n"));
    assert!(text.contains("Content-Disposition: attachment; filename=original-winmail.dat\r\n"));
    assert!(text.ends_with("------=_NextPart_000_0001--\r\n"));

    let reparsed = Message::parse(&bytes).unwrap();
    assert_eq!(reparsed.parts(), result.message.parts());
}

#[test]
fn strip_output_is_a_fixed_point() {
    let converter = converter(full_envelope());
    let first = converter
        .convert_bytes(OUTLOOK_MESSAGE.as_bytes(), Mode::Strip)
        .unwrap();
    let first_bytes = first.to_bytes();

    let second = converter.convert_bytes(&first_bytes, Mode::Strip).unwrap();
    assert!(!second.envelope_found);
    assert!(second.new_attachments.is_empty());
    assert_eq!(second.to_bytes(), first_bytes);
}

#[test]
fn rtf_and_single_attachment_example() {
    let converter = converter(
        DecodedEnvelope::new()
            .with_rtf(b"{\\rtf1 hi}".to_vec())
            .with_attachment("report.pdf", vec![1_u8, 2, 3]),
    );

    let result = converter
        .convert_bytes(OUTLOOK_MESSAGE.as_bytes(), Mode::Strip)
        .unwrap();
    assert_eq!(result.new_attachments, ["mail-body.rtf", "report.pdf"]);

    let added = &result.message.parts()[1..];
    assert_eq!(types(added), ["application/rtf", "application/octet-stream"]);
    assert_eq!(added[0].filename().as_deref(), Some("mail-body.rtf"));
    assert_eq!(added[1].filename().as_deref(), Some("report.pdf"));
    assert_eq!(added[1].decode_body().unwrap(), [1, 2, 3]);
}

#[test]
fn empty_envelope_only_handles_the_envelope_part() {
    let converter = converter(DecodedEnvelope::new());
    let input = parse(OUTLOOK_MESSAGE);

    let stripped = converter.convert(&input, Mode::Strip).unwrap();
    assert!(stripped.envelope_found);
    assert!(stripped.new_attachments.is_empty());
    assert_eq!(stripped.message.parts(), &input.parts()[..1]);

    let preserved = converter.convert(&input, Mode::Preserve).unwrap();
    assert_eq!(preserved.message.parts().len(), 2);
}

#[test]
fn non_multipart_passes_through() {
    let converter = converter(full_envelope());
    let input = parse(PLAIN_MESSAGE);

    assert!(!converter.has_envelope(&input));
    let result = converter.convert(&input, Mode::Strip).unwrap();
    assert!(!result.envelope_found);
    assert_eq!(result.message, input);
    assert_eq!(result.to_bytes(), PLAIN_MESSAGE.as_bytes());
}

#[test]
fn malformed_envelope_is_an_error() {
    let converter = converter(full_envelope());
    let corrupted = OUTLOOK_MESSAGE.replace(PAYLOAD_BASE64, "eJ8+IgAB");
    let input = parse(&corrupted);
    let before = input.clone();

    let err = converter.convert(&input, Mode::Strip).unwrap_err();
    assert!(matches!(err, Error::EnvelopeDecode(_)));
    assert!(err.to_string().contains("unrecognized envelope (6 bytes)"));
    assert_eq!(input, before);
}

#[test]
fn broken_transfer_encoding_is_an_error() {
    let converter = converter(full_envelope());
    let corrupted = OUTLOOK_MESSAGE.replace(PAYLOAD_BASE64, "eJ8+Ig@@BpA=");

    let err = converter
        .convert_bytes(corrupted.as_bytes(), Mode::Preserve)
        .unwrap_err();
    assert!(matches!(err, Error::TransportDecode(_)));
    assert!(err.is_envelope_error());
}

#[test]
fn custom_config_is_honored() {
    init_tracing();
    let config = ConvertConfig::from_json_str(
        r#"{
            "renamed_envelope_filename": "winmail-original.bin",
            "rtf_body_filename": "body.rtf",
            "strip_correlator_on_preserve": true
        }"#,
    )
    .unwrap();
    let converter = Converter::with_config(
        FixtureDecoder {
            envelope: full_envelope(),
        },
        config,
    );

    let result = converter
        .convert(&parse(OUTLOOK_MESSAGE), Mode::Preserve)
        .unwrap();
    assert_eq!(result.new_attachments[0], "body.rtf");
    assert_eq!(
        result.message.parts()[1].filename().as_deref(),
        Some("winmail-original.bin")
    );
    assert!(!result.message.headers.contains("X-MS-TNEF-Correlator"));
}

#[test]
fn converter_is_shared_across_threads() {
    let converter = converter(full_envelope());
    let inputs: Vec<Message> = (0..4).map(|_| parse(OUTLOOK_MESSAGE)).collect();

    let counts: Vec<usize> = std::thread::scope(|scope| {
        let handles: Vec<_> = inputs
            .iter()
            .map(|input| {
                let converter = &converter;
                scope.spawn(move || {
                    converter
                        .convert(input, Mode::Strip)
                        .expect("conversion succeeds")
                        .message
                        .parts()
                        .len()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("worker does not panic"))
            .collect()
    });

    assert_eq!(counts, vec![6; 4]);
}

#[test]
fn filenames_with_line_breaks_stay_inside_their_part() {
    let names = [
        "evil.txt\r\nX-Injected: yes",
        "x.txt\r\n\r\n------=_NextPart_000_0001\r\nContent-Type: text/html",
        "tab\there.txt",
    ];
    let mut envelope = DecodedEnvelope::new();
    for name in names {
        envelope = envelope.with_attachment(name, b"payload".to_vec());
    }
    let converter = converter(envelope);

    let result = converter
        .convert_bytes(OUTLOOK_MESSAGE.as_bytes(), Mode::Strip)
        .unwrap();
    assert_eq!(result.new_attachments, names);

    let bytes = result.to_bytes();
    let reparsed = Message::parse(&bytes).unwrap();
    assert_eq!(reparsed.parts(), result.message.parts());
    assert_eq!(reparsed.parts().len(), 1 + names.len());

    let filenames: Vec<String> = reparsed.parts()[1..]
        .iter()
        .map(|p| p.filename().unwrap())
        .collect();
    assert_eq!(filenames, names);
    assert!(
        reparsed
            .parts()
            .iter()
            .all(|p| !p.headers.contains("X-Injected"))
    );
    assert!(!reparsed.headers.contains("X-Injected"));
}

#[test]
fn eight_bit_headers_pass_through_unchanged() {
    let raw = replace_first(OUTLOOK_MESSAGE.as_bytes(), "Q3 numbers", b"Zahlen f\xfcr Q3");
    let raw = replace_first(
        &raw,
        "Content-Transfer-Encoding: 7bit\r\n",
        b"Content-Transfer-Encoding: 7bit\r\nContent-Description: \xdcbersicht\r\n",
    );
    let input = Message::parse(&raw).unwrap();
    let converter = converter(full_envelope());

    let result = converter.convert(&input, Mode::Strip).unwrap();
    assert_eq!(
        result.message.headers.get_raw("Subject"),
        Some(&b"Zahlen f\xfcr Q3"[..])
    );
    assert_eq!(result.message.parts()[0], input.parts()[0]);

    let bytes = result.to_bytes();
    let contains = |needle: &[u8]| bytes.windows(needle.len()).any(|w| w == needle);
    assert!(contains(&b"\r\nSubject: Zahlen f\xfcr Q3\r\n"[..]));
    assert!(contains(&b"\r\nContent-Description: \xdcbersicht\r\n"[..]));
    assert!(!contains("\u{fffd}".as_bytes()));

    let again = converter.convert_bytes(&bytes, Mode::Strip).unwrap();
    assert_eq!(again.to_bytes(), bytes);
}

#[test]
fn long_folded_headers_are_folded_on_output() {
    let references: Vec<String> = (0..60)
        .map(|i| format!("<{i:04}.A1B2C3D4E5F6@mail.example.com>"))
        .collect();
    let header = format!("References: {}\r\n", references.join("\r\n\t"));
    let raw = format!("{header}{OUTLOOK_MESSAGE}");
    assert!(raw.len() > 2000);

    let converter = converter(full_envelope());
    let result = converter.convert_bytes(raw.as_bytes(), Mode::Preserve).unwrap();
    assert_eq!(
        result
            .message
            .headers
            .get("References")
            .map(|r| r.split_whitespace().count()),
        Some(60)
    );

    let bytes = result.to_bytes();
    assert!(longest_line(&bytes) <= untnef_mime::FOLD_LINE_LENGTH);

    let reparsed = Message::parse(&bytes).unwrap();
    assert_eq!(reparsed.headers, result.message.headers);
}
