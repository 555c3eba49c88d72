use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Idle,
    Speaking,
    Paused,
    Stopped,
}

impl PlaybackState {
    pub fn is_speaking(self) -> bool {
        matches!(self, PlaybackState::Speaking)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Speaking => "speaking",
            PlaybackState::Paused => "paused",
            PlaybackState::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    ReadingCompleted,
    EngineError(String),
}

/// What the controller asks its host to show after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum NarrationEffect {
    /// Highlight the sentence at this global index, or clear the highlight.
    Highlight(Option<usize>),
    /// Fraction of sentences already started, in `0.0..=1.0`.
    Progress(f32),
    Notice(Notice),
}
