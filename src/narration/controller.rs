//! Sentence-by-sentence playback over a [`NarrationEngine`].
//!
//! The controller never owns the text. Every call that may speak borrows the
//! current sentence slice, so a replaced document is picked up on the next
//! unit. Advances between sentences are deferred by the configured delay and
//! tagged with a generation counter; any user transition bumps the counter and
//! strands the deferred step.

use super::engine::{EngineEvent, EngineEventKind, NarrationEngine, Utterance, UtteranceId};
use super::state::{NarrationEffect, Notice, PlaybackState};
use crate::config::AppConfig;
use crate::error::InvalidOperation;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const SPEECH_PITCH: f32 = 1.0;
pub const SPEECH_VOLUME: f32 = 0.9;

#[derive(Debug, Clone, PartialEq)]
pub struct NarrationSettings {
    pub rate: f32,
    pub min_rate: f32,
    pub max_rate: f32,
    pub sentence_delay: Duration,
}

impl NarrationSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            rate: config.tts_rate,
            min_rate: config.min_tts_rate,
            max_rate: config.max_tts_rate,
            sentence_delay: Duration::from_millis(config.inter_sentence_delay_ms),
        }
    }
}

impl Default for NarrationSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingAdvance {
    generation: u64,
    due: Instant,
}

pub struct NarrationController<E> {
    engine: E,
    settings: NarrationSettings,
    state: PlaybackState,
    position: usize,
    in_flight: Option<UtteranceId>,
    /// The engine holds a paused utterance that `play` should resume.
    paused_in_flight: bool,
    pending: Option<PendingAdvance>,
    next_utterance: u64,
    generation: u64,
    locked: bool,
    rate: f32,
    voice: Option<String>,
}

fn progress(position: usize, total: usize) -> f32 {
    if total == 0 {
        0.0
    } else {
        position as f32 / total as f32
    }
}

impl<E: NarrationEngine> NarrationController<E> {
    pub fn new(engine: E, settings: NarrationSettings) -> Self {
        let mut controller = Self {
            engine,
            rate: settings.rate,
            settings,
            state: PlaybackState::Idle,
            position: 0,
            in_flight: None,
            paused_in_flight: false,
            pending: None,
            next_utterance: 0,
            generation: 0,
            locked: false,
            voice: None,
        };
        controller.rate = controller
            .clamp_rate(controller.rate)
            .unwrap_or(controller.settings.min_rate);
        controller
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn voice(&self) -> Option<&str> {
        self.voice.as_deref()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Engine paused mid-utterance, or held between sentences.
    pub fn is_paused(&self) -> bool {
        self.state == PlaybackState::Paused
    }

    /// When the host should call [`Self::tick`] next, if anything is scheduled.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.map(|pending| pending.due)
    }

    fn bump_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    fn clamp_rate(&self, rate: f32) -> Option<f32> {
        if !rate.is_finite() {
            return None;
        }
        let rate = rate.clamp(self.settings.min_rate, self.settings.max_rate);
        let range = self.engine.rate_range();
        let (lo, hi) = (*range.start(), *range.end());
        if lo.is_finite() && hi.is_finite() && lo <= hi {
            Some(rate.clamp(lo, hi))
        } else {
            Some(rate)
        }
    }

    pub fn play(&mut self, sentences: &[String]) -> Result<Vec<NarrationEffect>, InvalidOperation> {
        if self.locked {
            return Err(InvalidOperation::EditInProgress);
        }
        if sentences.is_empty() {
            return Err(InvalidOperation::NoSentences);
        }
        if self.state.is_speaking() {
            return Err(InvalidOperation::AlreadySpeaking);
        }

        self.bump_generation();
        self.pending = None;

        if self.state == PlaybackState::Paused && self.paused_in_flight && self.in_flight.is_some()
        {
            self.engine.resume();
            self.paused_in_flight = false;
            self.state = PlaybackState::Speaking;
            info!(position = self.position, "Resumed narration");
            return Ok(Vec::new());
        }

        if self.position >= sentences.len() {
            self.position = 0;
        }
        info!(
            position = self.position,
            total = sentences.len(),
            "Starting narration"
        );
        Ok(self.speak_current(sentences))
    }

    pub fn pause(&mut self) -> Result<(), InvalidOperation> {
        if !self.state.is_speaking() {
            return Err(InvalidOperation::NotSpeaking);
        }

        if self.in_flight.is_some() && self.engine.is_speaking() && !self.engine.is_paused() {
            self.engine.pause();
            self.paused_in_flight = true;
        } else if self.pending.take().is_some() {
            self.paused_in_flight = false;
        } else {
            return Err(InvalidOperation::NotSpeaking);
        }

        self.bump_generation();
        self.state = PlaybackState::Paused;
        info!(
            position = self.position,
            mid_sentence = self.paused_in_flight,
            "Paused narration"
        );
        Ok(())
    }

    pub fn stop(&mut self) -> Vec<NarrationEffect> {
        if self.in_flight.is_some() || self.engine.is_speaking() || self.engine.is_paused() {
            self.engine.cancel();
        }
        self.in_flight = None;
        self.pending = None;
        self.paused_in_flight = false;
        self.bump_generation();
        self.state = PlaybackState::Stopped;
        self.position = 0;
        debug!("Stopped narration");
        vec![
            NarrationEffect::Highlight(None),
            NarrationEffect::Progress(0.0),
        ]
    }

    pub fn reset(&mut self) -> Vec<NarrationEffect> {
        self.stop()
    }

    /// Stop and refuse `play` until [`Self::unlock`].
    pub fn lock(&mut self) -> Vec<NarrationEffect> {
        let effects = self.stop();
        self.locked = true;
        effects
    }

    pub fn unlock(&mut self) {
        self.locked = false;
    }

    /// Apply a new rate multiplier; an utterance in flight picks it up at once.
    pub fn set_rate(&mut self, rate: f32) -> f32 {
        let Some(clamped) = self.clamp_rate(rate) else {
            warn!(rate, "Ignoring non-finite narration rate");
            return self.rate;
        };
        self.rate = clamped;
        if self.in_flight.is_some() {
            self.engine.set_rate(clamped);
        }
        debug!(rate = clamped, "Narration rate updated");
        clamped
    }

    /// Voice for subsequent utterances; `None` uses the engine default.
    pub fn set_voice(&mut self, voice: Option<String>) {
        self.voice = voice;
    }

    pub fn on_engine_event(
        &mut self,
        event: EngineEvent,
        sentences: &[String],
        now: Instant,
    ) -> Vec<NarrationEffect> {
        if self.in_flight != Some(event.utterance) {
            debug!(
                utterance = %event.utterance,
                current = ?self.in_flight,
                "Ignoring stale utterance event"
            );
            return Vec::new();
        }
        self.in_flight = None;

        match event.kind {
            EngineEventKind::Ended => {
                if !self.state.is_speaking() {
                    self.paused_in_flight = false;
                    debug!(
                        position = self.position,
                        state = %self.state,
                        "Utterance ended while not speaking"
                    );
                    return Vec::new();
                }
                self.position += 1;
                if self.position >= sentences.len() {
                    return self.complete(sentences.len());
                }
                self.pending = Some(PendingAdvance {
                    generation: self.generation,
                    due: now + self.settings.sentence_delay,
                });
                Vec::new()
            }
            EngineEventKind::Failed(message) => {
                warn!(
                    utterance = %event.utterance,
                    position = self.position,
                    "Narration engine failed: {message}"
                );
                self.pending = None;
                self.paused_in_flight = false;
                self.state = if self.engine.is_paused() {
                    PlaybackState::Paused
                } else {
                    PlaybackState::Idle
                };
                vec![NarrationEffect::Notice(Notice::EngineError(message))]
            }
        }
    }

    /// Drain engine events, then run a deferred advance that has come due.
    pub fn tick(&mut self, sentences: &[String], now: Instant) -> Vec<NarrationEffect> {
        let mut effects = Vec::new();
        for event in self.engine.poll() {
            effects.extend(self.on_engine_event(event, sentences, now));
        }

        if let Some(pending) = self.pending {
            if now >= pending.due {
                self.pending = None;
                if pending.generation == self.generation && self.state.is_speaking() {
                    effects.extend(self.speak_current(sentences));
                } else {
                    debug!(
                        generation = pending.generation,
                        current = self.generation,
                        "Dropping stale sentence advance"
                    );
                }
            }
        }

        effects
    }

    fn speak_current(&mut self, sentences: &[String]) -> Vec<NarrationEffect> {
        let Some(text) = sentences.get(self.position) else {
            return self.complete(sentences.len());
        };

        let id = UtteranceId(self.next_utterance);
        self.next_utterance = self.next_utterance.wrapping_add(1);
        let utterance = Utterance {
            id,
            text: text.clone(),
            voice: self.voice.clone(),
            rate: self.rate,
            pitch: SPEECH_PITCH,
            volume: SPEECH_VOLUME,
        };

        match self.engine.speak(utterance) {
            Ok(()) => {
                self.in_flight = Some(id);
                self.paused_in_flight = false;
                self.state = PlaybackState::Speaking;
                debug!(utterance = %id, position = self.position, "Speaking sentence");
                vec![
                    NarrationEffect::Highlight(Some(self.position)),
                    NarrationEffect::Progress(progress(self.position, sentences.len())),
                ]
            }
            Err(err) => {
                warn!(position = self.position, "Narration engine rejected sentence: {err}");
                self.in_flight = None;
                self.state = PlaybackState::Idle;
                vec![NarrationEffect::Notice(Notice::EngineError(err.to_string()))]
            }
        }
    }

    fn complete(&mut self, total: usize) -> Vec<NarrationEffect> {
        info!(sentences = total, "Reading completed");
        self.in_flight = None;
        self.pending = None;
        self.paused_in_flight = false;
        self.bump_generation();
        self.state = PlaybackState::Stopped;
        self.position = 0;
        vec![
            NarrationEffect::Highlight(None),
            NarrationEffect::Progress(0.0),
            NarrationEffect::Notice(Notice::ReadingCompleted),
        ]
    }
}
