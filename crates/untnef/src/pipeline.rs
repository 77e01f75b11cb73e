//! The conversion pipeline: extract, project, reassemble.

use crate::config::{ConvertConfig, Mode};
use crate::envelope::EnvelopeDecoder;
use crate::error::Result;
use crate::extract::{Extracted, extract, find_envelope_part};
use crate::project::project;
use crate::reassemble::reassemble;
use untnef_mime::Message;

/// Outcome of one conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    /// Converted message, or a copy of the input when no envelope was found.
    pub message: Message,
    /// Names of the attachments added to the message, in order.
    pub new_attachments: Vec<String>,
    /// Whether an envelope part was found.
    pub envelope_found: bool,
}

impl ConversionResult {
    fn unchanged(message: &Message) -> Self {
        Self {
            message: message.clone(),
            new_attachments: Vec::new(),
            envelope_found: false,
        }
    }

    /// Serializes the resulting message.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.message.to_bytes()
    }
}

/// Converts envelope-carrying messages into plain MIME.
///
/// Holds no per-message state; one converter can serve many messages, from
/// several threads if the decoder allows it.
#[derive(Debug, Clone)]
pub struct Converter<D> {
    decoder: D,
    config: ConvertConfig,
}

impl<D: EnvelopeDecoder> Converter<D> {
    /// Creates a converter with the default settings.
    #[must_use]
    pub fn new(decoder: D) -> Self {
        Self::with_config(decoder, ConvertConfig::default())
    }

    /// Creates a converter with explicit settings.
    #[must_use]
    pub const fn with_config(decoder: D, config: ConvertConfig) -> Self {
        Self { decoder, config }
    }

    /// Returns the active settings.
    #[must_use]
    pub const fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// Checks whether `message` carries an envelope part, without decoding it.
    #[must_use]
    pub fn has_envelope(&self, message: &Message) -> bool {
        find_envelope_part(message, &self.config).is_some()
    }

    /// Converts `message`.
    ///
    /// When no envelope part exists the result holds an unchanged copy and
    /// `envelope_found` is false. Otherwise the envelope contents are appended
    /// as standard parts and the envelope part is handled according to `mode`.
    /// The input is never modified, so a failure leaves nothing half-done.
    ///
    /// # Errors
    ///
    /// Returns an envelope error (see [`Error::is_envelope_error`]) when an
    /// envelope part exists but cannot be decoded.
    ///
    /// [`Error::is_envelope_error`]: crate::Error::is_envelope_error
    pub fn convert(&self, message: &Message, mode: Mode) -> Result<ConversionResult> {
        let Some(Extracted {
            envelope,
            part_index,
        }) = extract(message, &self.decoder, &self.config)?
        else {
            tracing::debug!("No envelope found; message passes through unchanged");
            return Ok(ConversionResult::unchanged(message));
        };

        let projected = project(envelope, &self.config);
        let (parts, new_attachments): (Vec<_>, Vec<_>) = projected
            .into_iter()
            .map(|p| (p.part, p.new_name))
            .unzip();
        let new_attachments: Vec<String> = new_attachments.into_iter().flatten().collect();
        let added = parts.len();

        let converted = reassemble(message, part_index, parts, mode, &self.config);

        tracing::info!(
            "Converted envelope of {} ({} mode): {} parts added, {} new attachments",
            message.message_id().unwrap_or("message without Message-ID"),
            mode,
            added,
            new_attachments.len()
        );

        Ok(ConversionResult {
            message: converted,
            new_attachments,
            envelope_found: true,
        })
    }

    /// Parses `raw` and converts it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Mime`](crate::Error::Mime) if `raw` cannot be parsed,
    /// or any error of [`Converter::convert`].
    pub fn convert_bytes(&self, raw: &[u8], mode: Mode) -> Result<ConversionResult> {
        let message = Message::parse(raw)?;
        self.convert(&message, mode)
    }
}
