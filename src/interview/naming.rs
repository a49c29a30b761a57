//! # Artifact Naming
//!
//! Every file produced during one exchange carries the same timestamp:
//! `transcript_1717569998419.txt`, `response_1717569998419.mp3` and the
//! candidate's recording all join on `1717569998419`. This module is the only
//! place that parses and builds those names.
//!
//! ## Format:
//! `<prefix>_<timestamp>.<ext>` where the timestamp is all ASCII digits.

use std::fmt;
use thiserror::Error;

/// Reasons a file name cannot be used as a correlation source.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NamingError {
    #[error("file name '{0}' has no extension")]
    MissingExtension(String),

    #[error("file name '{0}' has no '_' between prefix and timestamp")]
    MissingDelimiter(String),

    #[error("file name '{0}' has an empty prefix")]
    EmptyPrefix(String),

    #[error("file name '{name}' has a non-numeric timestamp '{timestamp}'")]
    InvalidTimestamp { name: String, timestamp: String },

    #[error("file name '{0}' must not contain path separators")]
    PathSeparator(String),
}

/// A parsed `<prefix>_<timestamp>.<ext>` file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    prefix: String,
    timestamp: u64,
    /// Digits exactly as they appeared, so companions reuse them verbatim
    digits: String,
    extension: String,
}

impl ArtifactName {
    /// Parse a bare file name (no directories).
    ///
    /// ## Rules:
    /// - The extension is everything after the last `.`
    /// - The timestamp is everything between the last `_` and that `.`
    /// - The prefix is everything before the last `_` and must not be empty
    pub fn parse(file_name: &str) -> Result<Self, NamingError> {
        if file_name.contains('/') || file_name.contains('\\') {
            return Err(NamingError::PathSeparator(file_name.to_string()));
        }

        let (stem, extension) = file_name
            .rsplit_once('.')
            .filter(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
            .ok_or_else(|| NamingError::MissingExtension(file_name.to_string()))?;

        let (prefix, timestamp) = stem
            .rsplit_once('_')
            .ok_or_else(|| NamingError::MissingDelimiter(file_name.to_string()))?;

        if prefix.is_empty() {
            return Err(NamingError::EmptyPrefix(file_name.to_string()));
        }

        // `u64::from_str` accepts a leading '+', so check the digits ourselves
        if timestamp.is_empty() || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
            return Err(NamingError::InvalidTimestamp {
                name: file_name.to_string(),
                timestamp: timestamp.to_string(),
            });
        }

        let digits = timestamp;
        let timestamp = digits.parse::<u64>().map_err(|_| NamingError::InvalidTimestamp {
            name: file_name.to_string(),
            timestamp: digits.to_string(),
        })?;

        Ok(Self {
            prefix: prefix.to_string(),
            timestamp,
            digits: digits.to_string(),
            extension: extension.to_string(),
        })
    }

    #[cfg(test)]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The correlation key shared by every artifact of one exchange.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    #[cfg(test)]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Build the name of a sibling artifact for the same exchange.
    ///
    /// ## Example:
    /// `transcript_1717569998419.txt` with `("response", "mp3")` becomes
    /// `response_1717569998419.mp3`.
    pub fn companion(&self, prefix: &str, extension: &str) -> ArtifactName {
        ArtifactName {
            prefix: prefix.to_string(),
            timestamp: self.timestamp,
            digits: self.digits.clone(),
            extension: extension.to_string(),
        }
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}.{}", self.prefix, self.digits, self.extension)
    }
}

/// Shorthand used by the turn processor: name of the spoken reply for a transcript.
pub fn response_name_for(transcript_name: &str) -> Result<ArtifactName, NamingError> {
    Ok(ArtifactName::parse(transcript_name)?.companion("response", "mp3"))
}
