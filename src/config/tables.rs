use super::defaults;
use super::models::{AppConfig, LogLevel};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
#[serde(deny_unknown_fields)]
pub(super) struct ConfigTables {
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    reconstruction: ReconstructionConfig,
    #[serde(default)]
    narration: NarrationConfig,
    #[serde(default)]
    voices: VoicesConfig,
}

impl From<ConfigTables> for AppConfig {
    fn from(tables: ConfigTables) -> Self {
        AppConfig {
            log_level: tables.logging.log_level,
            line_tolerance: tables.reconstruction.line_tolerance,
            paragraph_gap_factor: tables.reconstruction.paragraph_gap_factor,
            tts_rate: tables.narration.tts_rate,
            min_tts_rate: tables.narration.min_tts_rate,
            max_tts_rate: tables.narration.max_tts_rate,
            inter_sentence_delay_ms: tables.narration.inter_sentence_delay_ms,
            status_clear_secs: tables.narration.status_clear_secs,
            voice_language_marker: tables.voices.language_marker,
            preferred_voice: tables.voices.preferred_voice,
            voice_quality_markers: tables.voices.quality_markers,
            voice_vendor_bonuses: tables.voices.vendor_bonuses,
            voice_penalties: tables.voices.penalties,
            remote_voice_bonus: tables.voices.remote_bonus,
            excluded_voices: tables.voices.excluded,
        }
    }
}

impl From<&AppConfig> for ConfigTables {
    fn from(config: &AppConfig) -> Self {
        ConfigTables {
            logging: LoggingConfig {
                log_level: config.log_level,
            },
            reconstruction: ReconstructionConfig {
                line_tolerance: config.line_tolerance,
                paragraph_gap_factor: config.paragraph_gap_factor,
            },
            narration: NarrationConfig {
                tts_rate: config.tts_rate,
                min_tts_rate: config.min_tts_rate,
                max_tts_rate: config.max_tts_rate,
                inter_sentence_delay_ms: config.inter_sentence_delay_ms,
                status_clear_secs: config.status_clear_secs,
            },
            voices: VoicesConfig {
                language_marker: config.voice_language_marker.clone(),
                preferred_voice: config.preferred_voice.clone(),
                quality_markers: config.voice_quality_markers.clone(),
                vendor_bonuses: config.voice_vendor_bonuses.clone(),
                penalties: config.voice_penalties.clone(),
                remote_bonus: config.remote_voice_bonus,
                excluded: config.excluded_voices.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: defaults::default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct ReconstructionConfig {
    #[serde(default = "defaults::default_line_tolerance")]
    line_tolerance: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    paragraph_gap_factor: Option<f32>,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        ReconstructionConfig {
            line_tolerance: defaults::default_line_tolerance(),
            paragraph_gap_factor: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct NarrationConfig {
    #[serde(default = "defaults::default_tts_rate")]
    tts_rate: f32,
    #[serde(default = "defaults::default_min_tts_rate")]
    min_tts_rate: f32,
    #[serde(default = "defaults::default_max_tts_rate")]
    max_tts_rate: f32,
    #[serde(default = "defaults::default_inter_sentence_delay_ms")]
    inter_sentence_delay_ms: u64,
    #[serde(default = "defaults::default_status_clear_secs")]
    status_clear_secs: f32,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        NarrationConfig {
            tts_rate: defaults::default_tts_rate(),
            min_tts_rate: defaults::default_min_tts_rate(),
            max_tts_rate: defaults::default_max_tts_rate(),
            inter_sentence_delay_ms: defaults::default_inter_sentence_delay_ms(),
            status_clear_secs: defaults::default_status_clear_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct VoicesConfig {
    #[serde(default = "defaults::default_voice_language_marker")]
    language_marker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preferred_voice: Option<String>,
    #[serde(default = "defaults::default_voice_quality_markers")]
    quality_markers: BTreeMap<String, i32>,
    #[serde(default = "defaults::default_voice_vendor_bonuses")]
    vendor_bonuses: BTreeMap<String, i32>,
    #[serde(default = "defaults::default_voice_penalties")]
    penalties: BTreeMap<String, i32>,
    #[serde(default = "defaults::default_remote_voice_bonus")]
    remote_bonus: i32,
    #[serde(default = "defaults::default_excluded_voices")]
    excluded: Vec<String>,
}

impl Default for VoicesConfig {
    fn default() -> Self {
        VoicesConfig {
            language_marker: defaults::default_voice_language_marker(),
            preferred_voice: None,
            quality_markers: defaults::default_voice_quality_markers(),
            vendor_bonuses: defaults::default_voice_vendor_bonuses(),
            penalties: defaults::default_voice_penalties(),
            remote_bonus: defaults::default_remote_voice_bonus(),
            excluded: defaults::default_excluded_voices(),
        }
    }
}
