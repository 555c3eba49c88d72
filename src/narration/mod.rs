//! Narration: the engine seam, the playback state machine and voice choice.

mod controller;
mod engine;
#[cfg(feature = "piper")]
mod piper;
mod state;
mod voices;

pub use controller::{NarrationController, NarrationSettings, SPEECH_PITCH, SPEECH_VOLUME};
pub use engine::{EngineEvent, EngineEventKind, EngineVoice, NarrationEngine, Utterance, UtteranceId};
#[cfg(feature = "piper")]
pub use piper::PiperEngine;
pub use state::{NarrationEffect, Notice, PlaybackState};
pub use voices::{VoiceCatalog, VoiceProfile, VoiceRanking};

#[cfg(test)]
pub(crate) use engine::testing;
