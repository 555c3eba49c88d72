use serde::Deserialize;
use std::collections::BTreeMap;

/// High-level reader configuration; deserializable from TOML.
#[derive(Debug, Clone, Deserialize, serde::Serialize, PartialEq)]
pub struct AppConfig {
    #[serde(default = "crate::config::defaults::default_log_level")]
    pub log_level: LogLevel,
    #[serde(default = "crate::config::defaults::default_line_tolerance")]
    pub line_tolerance: f32,
    #[serde(default)]
    pub paragraph_gap_factor: Option<f32>,
    #[serde(default = "crate::config::defaults::default_tts_rate")]
    pub tts_rate: f32,
    #[serde(default = "crate::config::defaults::default_min_tts_rate")]
    pub min_tts_rate: f32,
    #[serde(default = "crate::config::defaults::default_max_tts_rate")]
    pub max_tts_rate: f32,
    #[serde(default = "crate::config::defaults::default_inter_sentence_delay_ms")]
    pub inter_sentence_delay_ms: u64,
    #[serde(default = "crate::config::defaults::default_status_clear_secs")]
    pub status_clear_secs: f32,
    #[serde(default = "crate::config::defaults::default_voice_language_marker")]
    pub voice_language_marker: String,
    #[serde(default)]
    pub preferred_voice: Option<String>,
    #[serde(default = "crate::config::defaults::default_voice_quality_markers")]
    pub voice_quality_markers: BTreeMap<String, i32>,
    #[serde(default = "crate::config::defaults::default_voice_vendor_bonuses")]
    pub voice_vendor_bonuses: BTreeMap<String, i32>,
    #[serde(default = "crate::config::defaults::default_voice_penalties")]
    pub voice_penalties: BTreeMap<String, i32>,
    #[serde(default = "crate::config::defaults::default_remote_voice_bonus")]
    pub remote_voice_bonus: i32,
    #[serde(default = "crate::config::defaults::default_excluded_voices")]
    pub excluded_voices: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            log_level: crate::config::defaults::default_log_level(),
            line_tolerance: crate::config::defaults::default_line_tolerance(),
            paragraph_gap_factor: None,
            tts_rate: crate::config::defaults::default_tts_rate(),
            min_tts_rate: crate::config::defaults::default_min_tts_rate(),
            max_tts_rate: crate::config::defaults::default_max_tts_rate(),
            inter_sentence_delay_ms: crate::config::defaults::default_inter_sentence_delay_ms(),
            status_clear_secs: crate::config::defaults::default_status_clear_secs(),
            voice_language_marker: crate::config::defaults::default_voice_language_marker(),
            preferred_voice: None,
            voice_quality_markers: crate::config::defaults::default_voice_quality_markers(),
            voice_vendor_bonuses: crate::config::defaults::default_voice_vendor_bonuses(),
            voice_penalties: crate::config::defaults::default_voice_penalties(),
            remote_voice_bonus: crate::config::defaults::default_remote_voice_bonus(),
            excluded_voices: crate::config::defaults::default_excluded_voices(),
        }
    }
}

impl AppConfig {
    /// Pull numeric settings back into usable ranges after loading.
    pub fn clamped(mut self) -> Self {
        if !self.line_tolerance.is_finite() || self.line_tolerance <= 0.0 {
            self.line_tolerance = crate::config::defaults::default_line_tolerance();
        }
        self.paragraph_gap_factor = self
            .paragraph_gap_factor
            .filter(|factor| factor.is_finite() && *factor > 1.0);
        if self.min_tts_rate > self.max_tts_rate {
            std::mem::swap(&mut self.min_tts_rate, &mut self.max_tts_rate);
        }
        self.tts_rate = self.tts_rate.clamp(self.min_tts_rate, self.max_tts_rate);
        self.status_clear_secs = self.status_clear_secs.max(0.0);
        self
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Debug
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
