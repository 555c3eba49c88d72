use std::collections::BTreeMap;

pub(crate) fn default_log_level() -> crate::config::LogLevel {
    crate::config::LogLevel::Debug
}

pub(crate) fn default_line_tolerance() -> f32 {
    2.0
}

pub(crate) fn default_tts_rate() -> f32 {
    1.0
}

pub(crate) fn default_min_tts_rate() -> f32 {
    0.5
}

pub(crate) fn default_max_tts_rate() -> f32 {
    2.0
}

pub(crate) fn default_inter_sentence_delay_ms() -> u64 {
    100
}

pub(crate) fn default_status_clear_secs() -> f32 {
    3.0
}

pub(crate) fn default_voice_language_marker() -> String {
    "en".to_string()
}

pub(crate) fn default_voice_quality_markers() -> BTreeMap<String, i32> {
    weighted(&[("neural", 10), ("premium", 8), ("enhanced", 6), ("natural", 5)])
}

pub(crate) fn default_voice_vendor_bonuses() -> BTreeMap<String, i32> {
    weighted(&[("google", 2), ("amazon", 2)])
}

pub(crate) fn default_voice_penalties() -> BTreeMap<String, i32> {
    weighted(&[("robotic", 5), ("zira", 3), ("david", 3)])
}

pub(crate) fn default_remote_voice_bonus() -> i32 {
    3
}

pub(crate) fn default_excluded_voices() -> Vec<String> {
    vec![
        "microsoft zira".to_string(),
        "microsoft david".to_string(),
        "espeak".to_string(),
    ]
}

fn weighted(entries: &[(&str, i32)]) -> BTreeMap<String, i32> {
    entries
        .iter()
        .map(|(marker, points)| (marker.to_string(), *points))
        .collect()
}
