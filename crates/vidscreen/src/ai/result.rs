//! Decoding of the `complete` event payload.

use serde_json::Value;

use super::AiError;

/// The plottable artifacts of an analysis, by their position in the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    VoiceAmplitude,
    Frames,
    Emotions,
    Sentiment,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 4] = [
        ArtifactKind::VoiceAmplitude,
        ArtifactKind::Frames,
        ArtifactKind::Emotions,
        ArtifactKind::Sentiment,
    ];

    /// Index of the artifact in the result array. Index 0 is the text.
    pub fn position(&self) -> usize {
        match self {
            ArtifactKind::VoiceAmplitude => 1,
            ArtifactKind::Frames => 2,
            ArtifactKind::Emotions => 3,
            ArtifactKind::Sentiment => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::VoiceAmplitude => "voice",
            ArtifactKind::Frames => "frames",
            ArtifactKind::Emotions => "emotions",
            ArtifactKind::Sentiment => "sentiment",
        }
    }
}

/// Where the backend left an artifact: a full URL or a server-side path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub location: String,
}

impl ArtifactRef {
    pub fn is_url(&self) -> bool {
        self.location.starts_with("http://") || self.location.starts_with("https://")
    }

    /// File name used when the artifact is re-uploaded.
    pub fn file_name(&self) -> &str {
        self.location
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("artifact")
    }
}

/// Recognized text plus up to four artifacts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalysisResult {
    pub text: String,
    pub artifacts: Vec<(ArtifactKind, ArtifactRef)>,
}

impl AnalysisResult {
    /// Decodes the JSON array carried by the `complete` event.
    pub fn from_payload(payload: &Value) -> Result<Self, AiError> {
        let items = payload
            .as_array()
            .ok_or_else(|| AiError::Protocol(format!("expected a JSON array, got {}", payload)))?;

        let text = match items.first() {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => {
                return Err(AiError::Protocol(format!(
                    "expected recognized text at position 0, got {}",
                    other
                )))
            }
        };

        let artifacts = ArtifactKind::ALL
            .iter()
            .filter_map(|kind| {
                items
                    .get(kind.position())
                    .and_then(artifact_location)
                    .map(|location| (*kind, ArtifactRef { location }))
            })
            .collect();

        Ok(Self { text, artifacts })
    }

    pub fn artifact(&self, kind: ArtifactKind) -> Option<&ArtifactRef> {
        self.artifacts
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, r)| r)
    }
}

fn artifact_location(item: &Value) -> Option<String> {
    match item {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => ["url", "path"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        _ => None,
    }
}
