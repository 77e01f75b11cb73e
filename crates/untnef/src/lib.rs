//! # untnef
//!
//! Rewrites messages that carry a TNEF envelope (the `winmail.dat`
//! attachment) into plain MIME: the envelope's text, HTML and RTF bodies and
//! its files become ordinary parts that any mail client can show.
//!
//! The binary envelope format is decoded by an [`EnvelopeDecoder`] supplied
//! by the caller; this crate finds the envelope, projects the decoded fields
//! into parts and builds the converted message.
//!
//! ```
//! use untnef::{Converter, DecodedEnvelope, Mode};
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("malformed envelope")]
//! struct Malformed;
//!
//! let decoder = |_raw: &[u8]| -> Result<DecodedEnvelope, Malformed> {
//!     Ok(DecodedEnvelope::new()
//!         .with_rtf(b"{\\rtf1 hi}".to_vec())
//!         .with_attachment("report.pdf", b"%PD".to_vec()))
//! };
//!
//! let raw = concat!(
//!     "Subject: Report\r\n",
//!     "Content-Type: multipart/mixed; boundary=sep\r\n",
//!     "\r\n",
//!     "--sep\r\n",
//!     "Content-Type: application/ms-tnef; name=\"winmail.dat\"\r\n",
//!     "Content-Transfer-Encoding: base64\r\n",
//!     "\r\n",
//!     "eJ8+IgAB\r\n",
//!     "--sep--\r\n",
//! );
//!
//! let converter = Converter::new(decoder);
//! let result = converter.convert_bytes(raw.as_bytes(), Mode::Strip).unwrap();
//!
//! assert!(result.envelope_found);
//! assert_eq!(result.new_attachments, ["mail-body.rtf", "report.pdf"]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod envelope;
mod error;
pub mod extract;
pub mod pipeline;
pub mod project;
pub mod reassemble;

pub use config::{ConvertConfig, Mode};
pub use envelope::{AttachmentRecord, DecodedEnvelope, EnvelopeDecoder};
pub use error::{DecoderError, Error, Result};
pub use extract::{Extracted, extract};
pub use pipeline::{ConversionResult, Converter};
pub use project::{ProjectedPart, project};
pub use reassemble::reassemble;
pub use untnef_mime::Message;
