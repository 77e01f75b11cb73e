//! Conversion settings.
//!
//! The media types, filenames and header names the converter reads and writes
//! are carried here rather than hard-coded, so callers can pass them explicitly
//! or load them from a JSON file.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// What happens to the original envelope part after its contents are extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Keep the envelope bytes, relabeled as a generic attachment.
    #[default]
    Preserve,
    /// Drop the envelope part and the correlator header.
    Strip,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preserve => write!(f, "preserve"),
            Self::Strip => write!(f, "strip"),
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preserve" => Ok(Self::Preserve),
            "strip" => Ok(Self::Strip),
            other => Err(Error::Config(format!(
                "Unknown mode '{other}' (expected 'preserve' or 'strip')"
            ))),
        }
    }
}

/// Wire constants and policy switches for a conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Media type that marks the envelope part.
    pub envelope_media_type: String,
    /// Filename given to the envelope part in preserve mode.
    pub renamed_envelope_filename: String,
    /// Filename of the attachment synthesized from the rich-text body.
    pub rtf_body_filename: String,
    /// Media type of the synthesized rich-text attachment.
    pub rtf_media_type: String,
    /// Content type for extracted file attachments and the relabeled envelope.
    pub attachment_content_type: String,
    /// Top-level header that ties the message to its envelope.
    pub correlator_header: String,
    /// Prefix for generated names of attachments without a filename.
    pub placeholder_prefix: String,
    /// Also remove the correlator header in preserve mode.
    pub strip_correlator_on_preserve: bool,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            envelope_media_type: "application/ms-tnef".to_string(),
            renamed_envelope_filename: "original-winmail.dat".to_string(),
            rtf_body_filename: "mail-body.rtf".to_string(),
            rtf_media_type: "application/rtf".to_string(),
            attachment_content_type: "application/octet-stream".to_string(),
            correlator_header: "X-MS-TNEF-Correlator".to_string(),
            placeholder_prefix: "attachment".to_string(),
            strip_correlator_on_preserve: false,
        }
    }
}

impl ConvertConfig {
    /// Parses settings from JSON. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is unusable.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its content is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;
        tracing::debug!("Loaded conversion settings from {:?}", path);
        Ok(config)
    }

    /// Checks that every media type has a subtype and every name is non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first bad field.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("envelope_media_type", &self.envelope_media_type),
            ("rtf_media_type", &self.rtf_media_type),
            ("attachment_content_type", &self.attachment_content_type),
        ] {
            if untnef_mime::ContentType::parse(value).is_err() {
                return Err(Error::Config(format!(
                    "{field} must be a type/subtype pair, got '{value}'"
                )));
            }
        }

        for (field, value) in [
            ("renamed_envelope_filename", &self.renamed_envelope_filename),
            ("rtf_body_filename", &self.rtf_body_filename),
            ("correlator_header", &self.correlator_header),
            ("placeholder_prefix", &self.placeholder_prefix),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{field} must not be empty")));
            }
        }

        Ok(())
    }
}
