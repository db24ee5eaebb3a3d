//! The per-applicant pipeline state machine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Status of a [`PipelineRecord`](super::PipelineRecord).
///
/// Records only move along the edges returned by [`PipelineStatus::successors`].
/// `Draft -> Regen` is the single deliberate step backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    NotSent,
    Sent,
    Answered,
    Done,
    Refuse,
    Draft,
    Regen,
    ScriptFailed,
    VideoSuggestSent,
    VideoTranscripted,
    VideoSemanticEvaluated,
    Filtered,
    Report,
}

impl PipelineStatus {
    pub const ALL: [PipelineStatus; 13] = [
        PipelineStatus::NotSent,
        PipelineStatus::Sent,
        PipelineStatus::Answered,
        PipelineStatus::Done,
        PipelineStatus::Refuse,
        PipelineStatus::Draft,
        PipelineStatus::Regen,
        PipelineStatus::ScriptFailed,
        PipelineStatus::VideoSuggestSent,
        PipelineStatus::VideoTranscripted,
        PipelineStatus::VideoSemanticEvaluated,
        PipelineStatus::Filtered,
        PipelineStatus::Report,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStatus::NotSent => "not_sent",
            PipelineStatus::Sent => "sent",
            PipelineStatus::Answered => "answered",
            PipelineStatus::Done => "done",
            PipelineStatus::Refuse => "refuse",
            PipelineStatus::Draft => "draft",
            PipelineStatus::Regen => "regen",
            PipelineStatus::ScriptFailed => "script_failed",
            PipelineStatus::VideoSuggestSent => "video_suggest_sent",
            PipelineStatus::VideoTranscripted => "video_transcripted",
            PipelineStatus::VideoSemanticEvaluated => "video_semantic_evaluated",
            PipelineStatus::Filtered => "filtered",
            PipelineStatus::Report => "report",
        }
    }

    /// Statuses reachable in one step from `self`.
    pub fn successors(&self) -> &'static [PipelineStatus] {
        use PipelineStatus::*;
        match self {
            NotSent => &[Sent],
            Sent => &[Answered],
            Answered => &[Done, Refuse],
            Done => &[Draft, ScriptFailed],
            Draft => &[Regen, VideoSuggestSent],
            Regen => &[Draft, ScriptFailed],
            ScriptFailed => &[Regen],
            VideoSuggestSent => &[VideoTranscripted],
            VideoTranscripted => &[VideoSemanticEvaluated],
            VideoSemanticEvaluated => &[Filtered],
            Filtered => &[Report],
            Refuse | Report => &[],
        }
    }

    pub fn can_transition_to(&self, next: PipelineStatus) -> bool {
        self.successors().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PipelineStatus::ALL
            .iter()
            .find(|status| status.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown pipeline status '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_round_trip() {
        for status in PipelineStatus::ALL {
            assert_eq!(status.as_str().parse::<PipelineStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<PipelineStatus>().is_err());
    }

    #[test]
    fn test_serde_matches_as_str() {
        let json = serde_json::to_string(&PipelineStatus::VideoSuggestSent).unwrap();
        assert_eq!(json, "\"video_suggest_sent\"");
    }

    #[test]
    fn test_main_path_is_linear() {
        use PipelineStatus::*;
        let path = [
            NotSent,
            Sent,
            Answered,
            Done,
            Draft,
            VideoSuggestSent,
            VideoTranscripted,
            VideoSemanticEvaluated,
            Filtered,
            Report,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_no_skipping() {
        use PipelineStatus::*;
        assert!(!NotSent.can_transition_to(Answered));
        assert!(!Draft.can_transition_to(VideoTranscripted));
        assert!(!VideoTranscripted.can_transition_to(Filtered));
        assert!(!Filtered.can_transition_to(Draft));
    }

    #[test]
    fn test_regeneration_edges() {
        use PipelineStatus::*;
        assert!(Draft.can_transition_to(Regen));
        assert!(Regen.can_transition_to(Draft));
        assert!(Regen.can_transition_to(ScriptFailed));
        assert!(ScriptFailed.can_transition_to(Regen));
        assert!(!ScriptFailed.can_transition_to(Draft));
    }

    #[test]
    fn test_terminal_states() {
        assert!(PipelineStatus::Refuse.is_terminal());
        assert!(PipelineStatus::Report.is_terminal());
        assert!(!PipelineStatus::Filtered.is_terminal());
    }
}
