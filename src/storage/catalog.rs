//! Groups a flat bucket listing into one record per exchange.
//!
//! `transcripts/Transcript_17.txt`, `response/response_17.mp3` and
//! `audio/recording_17.mp3` all end up in the record for timestamp `17`.

use crate::interview::naming::ArtifactName;
use serde::Serialize;
use std::collections::BTreeMap;

/// Public URLs of everything archived for one exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExchangeFiles {
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

/// Build exchange records from bucket keys, oldest first.
///
/// Keys whose file name does not carry a numeric timestamp, or whose top-level
/// directory is not a known artifact type, are skipped.
pub fn build_catalog<I, S>(keys: I, public_base_url: &str) -> Vec<ExchangeFiles>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut exchanges: BTreeMap<u64, ExchangeFiles> = BTreeMap::new();

    for key in keys {
        let key = key.as_ref();
        let Some((kind, file_name)) = key.split_once('/') else {
            continue;
        };
        let Ok(name) = ArtifactName::parse(file_name.rsplit('/').next().unwrap_or(file_name)) else {
            continue;
        };

        let url = public_url(public_base_url, key);
        let entry = exchanges.entry(name.timestamp()).or_insert_with(|| ExchangeFiles {
            timestamp: name.timestamp(),
            ..ExchangeFiles::default()
        });

        if kind.contains("transcript") {
            entry.transcript = Some(url);
        } else if kind.contains("response") {
            entry.response = Some(url);
        } else if kind.contains("audio") {
            entry.audio = Some(url);
        }
    }

    exchanges
        .into_values()
        .filter(|files| files.transcript.is_some() || files.response.is_some() || files.audio.is_some())
        .collect()
}

/// Public object URL: the key is appended as a single path segment.
fn public_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.replace('/', "%2F"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://pub.example.r2.dev/";

    #[test]
    fn test_groups_by_timestamp_in_numeric_order() {
        let keys = [
            "response/response_900.mp3",
            "transcripts/Transcript_1000.txt",
            "audio/recording_1000.mp3",
            "transcripts/Transcript_900.txt",
            "response/response_1000.mp3",
        ];

        let catalog = build_catalog(keys, BASE);

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].timestamp, 900);
        assert_eq!(
            catalog[0].response.as_deref(),
            Some("https://pub.example.r2.dev/response%2Fresponse_900.mp3")
        );
        assert!(catalog[0].audio.is_none());

        assert_eq!(catalog[1].timestamp, 1000);
        assert_eq!(
            catalog[1].transcript.as_deref(),
            Some("https://pub.example.r2.dev/transcripts%2FTranscript_1000.txt")
        );
        assert!(catalog[1].audio.is_some());
        assert!(catalog[1].response.is_some());
    }

    #[test]
    fn test_skips_uncorrelated_keys() {
        let keys = vec![
            "notes.txt".to_string(),
            "transcripts/foo.txt".to_string(),
            "transcripts/Transcript_abc.txt".to_string(),
            "misc/thing_12.bin".to_string(),
        ];
        assert!(build_catalog(keys, BASE).is_empty());
    }

    #[test]
    fn test_serializes_without_missing_kinds() {
        let catalog = build_catalog(["audio/recording_5.mp3"], BASE);
        let json = serde_json::to_value(&catalog).unwrap();
        assert_eq!(json[0]["timestamp"], 5);
        assert!(json[0].get("transcript").is_none());
        assert!(json[0]["audio"].is_string());
    }
}
