use crate::error::NarrationEngineError;
use serde::Serialize;
use std::fmt;
use std::ops::RangeInclusive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UtteranceId(pub u64);

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One sentence handed to the engine together with its speech parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub id: UtteranceId,
    pub text: String,
    /// `None` speaks with the engine's default voice.
    pub voice: Option<String>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

/// A voice as the engine reports it, before any ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineVoice {
    pub name: String,
    pub lang: String,
    pub is_local: bool,
}

impl EngineVoice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>, is_local: bool) -> Self {
        Self {
            name: name.into(),
            lang: lang.into(),
            is_local,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEventKind {
    Ended,
    Failed(String),
}

/// Terminal notification for a spoken utterance. Exactly one per `speak`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEvent {
    pub utterance: UtteranceId,
    pub kind: EngineEventKind,
}

impl EngineEvent {
    pub fn ended(utterance: UtteranceId) -> Self {
        Self {
            utterance,
            kind: EngineEventKind::Ended,
        }
    }

    pub fn failed(utterance: UtteranceId, message: impl Into<String>) -> Self {
        Self {
            utterance,
            kind: EngineEventKind::Failed(message.into()),
        }
    }
}

/// The speech backend the controller drives.
///
/// Completion is reported either by the host through
/// `ReaderSession::on_engine_event` or by the engine itself from `poll`.
pub trait NarrationEngine {
    fn speak(&mut self, utterance: Utterance) -> Result<(), NarrationEngineError>;
    fn pause(&mut self);
    fn resume(&mut self);
    fn cancel(&mut self);
    /// Adjust the rate of the utterance currently playing.
    fn set_rate(&mut self, rate: f32);
    fn is_speaking(&self) -> bool;
    fn is_paused(&self) -> bool;
    fn list_voices(&self) -> Vec<EngineVoice>;

    fn rate_range(&self) -> RangeInclusive<f32> {
        0.1..=10.0
    }

    fn poll(&mut self) -> Vec<EngineEvent> {
        Vec::new()
    }
}

impl<E: NarrationEngine + ?Sized> NarrationEngine for Box<E> {
    fn speak(&mut self, utterance: Utterance) -> Result<(), NarrationEngineError> {
        (**self).speak(utterance)
    }

    fn pause(&mut self) {
        (**self).pause()
    }

    fn resume(&mut self) {
        (**self).resume()
    }

    fn cancel(&mut self) {
        (**self).cancel()
    }

    fn set_rate(&mut self, rate: f32) {
        (**self).set_rate(rate)
    }

    fn is_speaking(&self) -> bool {
        (**self).is_speaking()
    }

    fn is_paused(&self) -> bool {
        (**self).is_paused()
    }

    fn list_voices(&self) -> Vec<EngineVoice> {
        (**self).list_voices()
    }

    fn rate_range(&self) -> RangeInclusive<f32> {
        (**self).rate_range()
    }

    fn poll(&mut self) -> Vec<EngineEvent> {
        (**self).poll()
    }
}
