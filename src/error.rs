//! Error taxonomy shared by loading, narration and editing.

use std::path::PathBuf;
use thiserror::Error;

/// The document could not be turned into fragments. Nothing is installed.
#[derive(Error, Debug)]
pub enum DocumentParseError {
    #[error("unsupported document type: {0}")]
    Unsupported(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("document could not be parsed: {0}")]
    Corrupt(String),

    #[error("document load cancelled at stage={stage}")]
    Cancelled { stage: &'static str },
}

/// A single utterance failed inside the narration engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NarrationEngineError {
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("audio playback failed: {0}")]
    Playback(String),

    #[error("narration engine unavailable: {0}")]
    Unavailable(String),
}

/// A UI-reachable request that does nothing in the current state.
///
/// These are never shown to the user; the session logs them at debug level.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidOperation {
    #[error("there are no sentences to narrate")]
    NoSentences,

    #[error("narration is locked while editing")]
    EditInProgress,

    #[error("narration is already speaking")]
    AlreadySpeaking,

    #[error("nothing is being spoken")]
    NotSpeaking,

    #[error("no edit session is active")]
    NotEditing,
}

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error(transparent)]
    DocumentParse(#[from] DocumentParseError),

    #[error(transparent)]
    Engine(#[from] NarrationEngineError),

    #[error(transparent)]
    InvalidOperation(#[from] InvalidOperation),
}
