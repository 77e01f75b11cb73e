//! Content-Disposition handling (RFC 2183).

use crate::content_type::{parse_params, split_params, write_param};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Disposition type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispositionKind {
    /// Displayed as part of the message body.
    Inline,
    /// Offered to the user as a separate file.
    Attachment,
    /// Any other token, kept verbatim (lowercased).
    Other(String),
}

impl fmt::Display for DispositionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline => write!(f, "inline"),
            Self::Attachment => write!(f, "attachment"),
            Self::Other(token) => write!(f, "{token}"),
        }
    }
}

/// Parsed `Content-Disposition` header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Disposition type.
    pub kind: DispositionKind,
    /// Parameters other than the type, sorted by name.
    pub parameters: BTreeMap<String, String>,
}

impl ContentDisposition {
    /// Creates an `inline` disposition with no parameters.
    #[must_use]
    pub const fn inline() -> Self {
        Self {
            kind: DispositionKind::Inline,
            parameters: BTreeMap::new(),
        }
    }

    /// Creates an `attachment` disposition carrying `filename`.
    ///
    /// Any filename is accepted. Names that are not printable ASCII are
    /// written as `filename*` (RFC 2231) next to an RFC 2047 `filename`, so
    /// control characters never reach the header line.
    #[must_use]
    pub fn attachment(filename: &str) -> Self {
        let mut parameters = BTreeMap::new();
        parameters.insert("filename".to_string(), filename.to_string());
        Self {
            kind: DispositionKind::Attachment,
            parameters,
        }
    }

    /// Checks whether this is an attachment disposition.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.kind == DispositionKind::Attachment
    }

    /// Returns the `filename` parameter, if any.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        self.parameters.get("filename").cloned()
    }

    /// Parses a `Content-Disposition` value.
    ///
    /// Encoded parameter values (RFC 2047 words, RFC 2231 extended values and
    /// continuations) are decoded.
    ///
    /// # Errors
    ///
    /// Returns an error if the disposition type is empty.
    pub fn parse(s: &str) -> Result<Self> {
        let mut parts = split_params(s).into_iter();
        let token = parts.next().unwrap_or_default().trim().to_lowercase();

        let kind = match token.as_str() {
            "" => return Err(Error::InvalidDisposition(s.to_string())),
            "inline" => DispositionKind::Inline,
            "attachment" => DispositionKind::Attachment,
            _ => DispositionKind::Other(token),
        };

        Ok(Self {
            kind,
            parameters: parse_params(parts),
        })
    }
}

impl fmt::Display for ContentDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for (key, value) in &self.parameters {
            write_param(f, key, value)?;
        }
        Ok(())
    }
}
