//! Local narration through `piper-rs` and `rodio`.
//!
//! Each sentence is synthesized once at natural speed into a WAV file under
//! the cache root and played through a fresh sink; rate and volume are applied
//! on the sink so they can change while a sentence plays.

use super::engine::{EngineEvent, EngineVoice, NarrationEngine, Utterance, UtteranceId};
use crate::error::NarrationEngineError;
use anyhow::{Context, Result};
use piper_rs::from_config_path;
use piper_rs::synth::PiperSpeechSynthesizer;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use sha2::{Digest, Sha256};
use std::env;
use std::fs::{self, File};
use std::io::BufReader;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct PiperEngine {
    model_path: PathBuf,
    cache_root: PathBuf,
    synth: PiperSpeechSynthesizer,
    voice: EngineVoice,
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Option<Sink>,
    current: Option<UtteranceId>,
}

impl PiperEngine {
    pub fn new(model_path: PathBuf, espeak_path: PathBuf, cache_root: PathBuf) -> Result<Self> {
        let espeak_path = sanitize_espeak_root(espeak_path);
        if env::var_os("PIPER_ESPEAKNG_DATA_DIRECTORY").is_none() {
            // Set once during startup, before any synthesis thread exists.
            unsafe {
                env::set_var("PIPER_ESPEAKNG_DATA_DIRECTORY", &espeak_path);
            }
        }

        let config_path = resolve_piper_config(&model_path);
        if !config_path.exists() {
            anyhow::bail!(
                "Piper config not found at {} (expected from {})",
                config_path.display(),
                model_path.display()
            );
        }
        let model = from_config_path(&config_path).context("Loading Piper model")?;
        let synth = PiperSpeechSynthesizer::new(model).context("Preparing Piper synthesizer")?;
        let (_stream, handle) = OutputStream::try_default().context("Opening audio output")?;

        let voice = voice_for_model(&model_path);
        info!(
            model = %model_path.display(),
            espeak_root = %espeak_path.display(),
            voice = %voice.name,
            "Initialized Piper narration engine"
        );

        Ok(Self {
            model_path,
            cache_root,
            synth,
            voice,
            _stream,
            handle,
            sink: None,
            current: None,
        })
    }

    fn synthesize(&self, text: &str) -> Result<PathBuf> {
        let path = cache_path(&self.cache_root, &self.model_path, text);
        if path.exists() {
            debug!(path = %path.display(), "Reusing cached sentence audio");
            return Ok(path);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Creating narration cache directory")?;
        }
        debug!(path = %path.display(), chars = text.len(), "Synthesizing sentence with Piper");
        self.synth
            .synthesize_to_file(&path, text.to_string(), None)
            .context("Synthesizing audio")?;
        Ok(path)
    }

    fn open_sink(&self, path: &Path, utterance: &Utterance) -> Result<Sink> {
        let reader = BufReader::new(File::open(path).context("Opening synthesized audio")?);
        let source = Decoder::new(reader).context("Decoding synthesized audio")?;
        let sink = Sink::try_new(&self.handle).context("Creating sink")?;
        sink.set_speed(utterance.rate);
        sink.set_volume(utterance.volume);
        sink.append(source);
        sink.play();
        Ok(sink)
    }
}

impl NarrationEngine for PiperEngine {
    fn speak(&mut self, utterance: Utterance) -> Result<(), NarrationEngineError> {
        self.cancel();
        if let Some(requested) = utterance.voice.as_deref() {
            if requested != self.voice.name {
                warn!(%requested, available = %self.voice.name, "Piper serves a single voice");
            }
        }

        let path = self
            .synthesize(&utterance.text)
            .map_err(|err| NarrationEngineError::Synthesis(format!("{err:#}")))?;
        let sink = self
            .open_sink(&path, &utterance)
            .map_err(|err| NarrationEngineError::Playback(format!("{err:#}")))?;

        self.sink = Some(sink);
        self.current = Some(utterance.id);
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            debug!("Pausing playback");
            sink.pause();
        }
    }

    fn resume(&mut self) {
        if let Some(sink) = &self.sink {
            debug!("Resuming playback");
            sink.play();
        }
    }

    fn cancel(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.current = None;
    }

    fn set_rate(&mut self, rate: f32) {
        if let Some(sink) = &self.sink {
            sink.set_speed(rate);
        }
    }

    fn is_speaking(&self) -> bool {
        self.current.is_some()
    }

    fn is_paused(&self) -> bool {
        self.sink.as_ref().is_some_and(|sink| sink.is_paused())
    }

    fn list_voices(&self) -> Vec<EngineVoice> {
        vec![self.voice.clone()]
    }

    fn rate_range(&self) -> RangeInclusive<f32> {
        0.5..=4.0
    }

    fn poll(&mut self) -> Vec<EngineEvent> {
        let finished = self.sink.as_ref().is_some_and(|sink| sink.empty());
        if !finished {
            return Vec::new();
        }
        self.sink = None;
        self.current.take().map(EngineEvent::ended).into_iter().collect()
    }
}

fn cache_path(base: &Path, model_path: &Path, sentence: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(model_path.as_os_str().to_string_lossy().as_bytes());
    hasher.update(sentence.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    base.join(format!("narration-{hash}.wav"))
}

/// Piper expects the directory containing `espeak-ng-data`, not the data
/// directory itself.
fn sanitize_espeak_root(path: PathBuf) -> PathBuf {
    if path.file_name().is_some_and(|n| n == "espeak-ng-data") {
        if let Some(parent) = path.parent() {
            return parent.to_path_buf();
        }
    }
    path
}

fn resolve_piper_config(model_path: &Path) -> PathBuf {
    if model_path.extension().is_some_and(|ext| ext == "onnx") {
        return model_path.with_extension("onnx.json");
    }
    model_path.to_path_buf()
}

/// Piper model files are named `<lang>_<REGION>-<speaker>-<quality>`.
fn voice_for_model(model_path: &Path) -> EngineVoice {
    let stem = model_path
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.trim_end_matches(".json").trim_end_matches(".onnx"))
        .unwrap_or("piper");
    let lang = stem.split('-').next().unwrap_or_default().replace('_', "-");
    EngineVoice::new(stem, lang, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_name_and_language_come_from_model_file() {
        let voice = voice_for_model(Path::new("/models/en_US-lessac-medium.onnx"));
        assert_eq!(voice.name, "en_US-lessac-medium");
        assert_eq!(voice.lang, "en-US");
        assert!(voice.is_local);
    }

    #[test]
    fn espeak_data_dir_is_trimmed_to_its_parent() {
        assert_eq!(
            sanitize_espeak_root(PathBuf::from("/opt/piper/espeak-ng-data")),
            PathBuf::from("/opt/piper")
        );
        assert_eq!(
            sanitize_espeak_root(PathBuf::from("/opt/piper")),
            PathBuf::from("/opt/piper")
        );
    }

    #[test]
    fn cache_path_depends_on_model_and_text() {
        let base = Path::new("/tmp/cache");
        let a = cache_path(base, Path::new("a.onnx"), "Hello.");
        let b = cache_path(base, Path::new("b.onnx"), "Hello.");
        assert_ne!(a, b);
        assert_eq!(a, cache_path(base, Path::new("a.onnx"), "Hello."));
        assert!(a.starts_with(base));
    }
}
