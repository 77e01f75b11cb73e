//! # untnef-mime
//!
//! MIME message model with a small parser and serializer.
//!
//! ## Features
//!
//! - **Message parsing**: headers plus the immediate parts of a multipart body
//! - **Serialization**: CRLF output that reuses (or generates) the boundary,
//!   folds long header lines and writes 8-bit header values back unchanged
//! - **Encoding/Decoding**: Base64, Quoted-Printable, RFC 2047 encoded words,
//!   RFC 2231 parameter values
//! - **Content types and dispositions**: parsing and deterministic rendering
//!
//! ## Quick Start
//!
//! ```
//! use untnef_mime::Message;
//!
//! let raw = concat!(
//!     "From: sender@example.com\r\n",
//!     "Content-Type: multipart/mixed; boundary=sep\r\n",
//!     "\r\n",
//!     "--sep\r\n",
//!     "Content-Type: text/plain\r\n",
//!     "\r\n",
//!     "Hello, World!\r\n",
//!     "--sep--\r\n",
//! );
//!
//! let message = Message::parse(raw.as_bytes()).unwrap();
//! assert!(message.is_multipart());
//! assert_eq!(message.parts()[0].body_text().unwrap(), "Hello, World!");
//! ```
//!
//! ### Building Parts
//!
//! ```
//! use untnef_mime::{ContentType, Part};
//!
//! let part = Part::attachment(&ContentType::octet_stream(), "report.pdf", b"%PDF");
//! assert_eq!(part.filename().as_deref(), Some("report.pdf"));
//! assert_eq!(part.decode_body().unwrap(), b"%PDF");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod disposition;
mod error;
mod header;
mod message;

pub mod encoding;

pub use content_type::ContentType;
pub use disposition::{ContentDisposition, DispositionKind};
pub use error::{Error, Result};
pub use header::{FOLD_LINE_LENGTH, Headers};
pub use message::{Body, Message, Part, TransferEncoding};
