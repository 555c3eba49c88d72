//! English voice filtering, ranking and selection.

use super::engine::EngineVoice;
use crate::config::AppConfig;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceProfile {
    pub name: String,
    pub lang: String,
    pub quality_score: i32,
}

/// Name markers and bonuses used to rank voices.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceRanking {
    language_marker: String,
    quality_markers: BTreeMap<String, i32>,
    vendor_bonuses: BTreeMap<String, i32>,
    penalties: BTreeMap<String, i32>,
    remote_bonus: i32,
    excluded: Vec<String>,
}

impl VoiceRanking {
    pub fn from_config(config: &AppConfig) -> Self {
        let lower_keys = |map: &BTreeMap<String, i32>| {
            map.iter()
                .map(|(k, v)| (k.to_lowercase(), *v))
                .collect::<BTreeMap<_, _>>()
        };
        Self {
            language_marker: config.voice_language_marker.to_lowercase(),
            quality_markers: lower_keys(&config.voice_quality_markers),
            vendor_bonuses: lower_keys(&config.voice_vendor_bonuses),
            penalties: lower_keys(&config.voice_penalties),
            remote_bonus: config.remote_voice_bonus,
            excluded: config
                .excluded_voices
                .iter()
                .map(|name| name.to_lowercase())
                .collect(),
        }
    }

    fn is_english(&self, voice: &EngineVoice) -> bool {
        voice.lang.to_lowercase().contains(&self.language_marker)
    }

    fn is_preferred(&self, voice: &EngineVoice) -> bool {
        let name = voice.name.to_lowercase();
        let excluded = self.excluded.iter().any(|marker| name.contains(marker));
        let marked = self.quality_markers.keys().any(|marker| name.contains(marker));
        !excluded && (marked || !voice.is_local)
    }

    pub fn score(&self, voice: &EngineVoice) -> i32 {
        let name = voice.name.to_lowercase();
        let sum_matching = |map: &BTreeMap<String, i32>| -> i32 {
            map.iter()
                .filter(|(marker, _)| name.contains(marker.as_str()))
                .map(|(_, points)| *points)
                .sum()
        };
        let mut score = sum_matching(&self.quality_markers) + sum_matching(&self.vendor_bonuses);
        if !voice.is_local {
            score += self.remote_bonus;
        }
        score - sum_matching(&self.penalties)
    }

    /// English voices, narrowed to the preferred subset when it is non-empty,
    /// best first. Equal scores keep the engine's order.
    pub fn rank(&self, available: &[EngineVoice]) -> Vec<VoiceProfile> {
        let english: Vec<&EngineVoice> = available.iter().filter(|v| self.is_english(v)).collect();
        let preferred: Vec<&EngineVoice> = english
            .iter()
            .copied()
            .filter(|v| self.is_preferred(v))
            .collect();
        let chosen = if preferred.is_empty() { english } else { preferred };

        let mut ranked: Vec<VoiceProfile> = chosen
            .into_iter()
            .map(|voice| VoiceProfile {
                name: voice.name.clone(),
                lang: voice.lang.clone(),
                quality_score: self.score(voice),
            })
            .collect();
        ranked.sort_by_key(|profile| Reverse(profile.quality_score));
        ranked
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoiceCatalog {
    ranking: VoiceRanking,
    configured: Option<String>,
    voices: Vec<VoiceProfile>,
    selected: Option<String>,
    user_choice: Option<String>,
}

impl VoiceCatalog {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            ranking: VoiceRanking::from_config(config),
            configured: config.preferred_voice.clone(),
            voices: Vec::new(),
            selected: None,
            user_choice: None,
        }
    }

    pub fn voices(&self) -> &[VoiceProfile] {
        &self.voices
    }

    /// Selected voice name, `None` for the engine default.
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected_profile(&self) -> Option<&VoiceProfile> {
        let name = self.selected.as_deref()?;
        self.voices.iter().find(|v| v.name == name)
    }

    fn offers(&self, name: &str) -> bool {
        self.voices.iter().any(|v| v.name == name)
    }

    /// Re-rank from the engine's current list. Returns true when the offered
    /// voices or the selection changed.
    pub fn refresh(&mut self, available: &[EngineVoice]) -> bool {
        let voices = self.ranking.rank(available);
        let before = (self.voices.clone(), self.selected.clone());
        self.voices = voices;

        self.selected = self
            .user_choice
            .clone()
            .filter(|name| self.offers(name))
            .or_else(|| self.configured.clone().filter(|name| self.offers(name)))
            .or_else(|| self.voices.first().map(|v| v.name.clone()));

        info!(
            available = available.len(),
            offered = self.voices.len(),
            selected = self.selected.as_deref().unwrap_or("<engine default>"),
            "Refreshed voice catalog"
        );
        before != (self.voices.clone(), self.selected.clone())
    }

    /// Pick a voice by name. Unknown names leave the selection untouched and
    /// return false.
    pub fn select(&mut self, name: &str) -> bool {
        if !self.offers(name) {
            debug!(%name, "Ignoring selection of a voice that is not offered");
            return false;
        }
        self.user_choice = Some(name.to_string());
        self.selected = Some(name.to_string());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> VoiceCatalog {
        VoiceCatalog::from_config(&AppConfig::default())
    }

    fn names(voices: &[VoiceProfile]) -> Vec<&str> {
        voices.iter().map(|v| v.name.as_str()).collect()
    }

    #[test]
    fn ranks_quality_markers_first() {
        let available = vec![
            EngineVoice::new("Google US English", "en-US", false),
            EngineVoice::new("Samantha Enhanced", "en-US", true),
            EngineVoice::new("Aria Neural", "en-US", true),
            EngineVoice::new("Thomas", "fr-FR", false),
        ];
        let mut catalog = catalog();
        assert!(catalog.refresh(&available));

        assert_eq!(
            names(catalog.voices()),
            vec!["Aria Neural", "Samantha Enhanced", "Google US English"]
        );
        assert_eq!(catalog.voices()[0].quality_score, 10);
        assert_eq!(catalog.voices()[2].quality_score, 5);
        assert_eq!(catalog.selected(), Some("Aria Neural"));
    }

    #[test]
    fn falls_back_to_all_english_voices() {
        let available = vec![
            EngineVoice::new("Microsoft David", "en-US", true),
            EngineVoice::new("Alex", "en-US", true),
            EngineVoice::new("Microsoft Zira", "en-GB", true),
        ];
        let mut catalog = catalog();
        catalog.refresh(&available);

        assert_eq!(
            names(catalog.voices()),
            vec!["Alex", "Microsoft David", "Microsoft Zira"]
        );
        assert_eq!(catalog.voices()[1].quality_score, -3);
    }

    #[test]
    fn excluded_voices_drop_out_of_the_preferred_set() {
        let available = vec![
            EngineVoice::new("eSpeak Natural", "en", true),
            EngineVoice::new("Daniel Premium", "en-GB", true),
        ];
        let mut catalog = catalog();
        catalog.refresh(&available);
        assert_eq!(names(catalog.voices()), vec!["Daniel Premium"]);
    }

    #[test]
    fn no_english_voices_means_engine_default() {
        let mut catalog = catalog();
        catalog.refresh(&[EngineVoice::new("Amelie", "fr-CA", true)]);
        assert!(catalog.voices().is_empty());
        assert_eq!(catalog.selected(), None);
    }

    #[test]
    fn user_choice_survives_refresh_while_offered() {
        let mut available = vec![
            EngineVoice::new("Aria Neural", "en-US", true),
            EngineVoice::new("Google UK English Female", "en-GB", false),
        ];
        let mut catalog = catalog();
        catalog.refresh(&available);
        assert!(catalog.select("Google UK English Female"));
        assert!(!catalog.select("Nobody"));

        available.push(EngineVoice::new("Jenny Neural Premium", "en-US", true));
        catalog.refresh(&available);
        assert_eq!(catalog.selected(), Some("Google UK English Female"));

        available.retain(|v| v.name != "Google UK English Female");
        catalog.refresh(&available);
        assert_eq!(catalog.selected(), Some("Jenny Neural Premium"));
    }

    #[test]
    fn configured_voice_wins_over_top_ranked() {
        let mut config = AppConfig::default();
        config.preferred_voice = Some("Google US English".to_string());
        let mut catalog = VoiceCatalog::from_config(&config);
        catalog.refresh(&[
            EngineVoice::new("Aria Neural", "en-US", true),
            EngineVoice::new("Google US English", "en-US", false),
        ]);
        assert_eq!(catalog.selected(), Some("Google US English"));
    }

    #[test]
    fn unchanged_refresh_reports_no_change() {
        let available = vec![EngineVoice::new("Aria Neural", "en-US", true)];
        let mut catalog = catalog();
        assert!(catalog.refresh(&available));
        assert!(!catalog.refresh(&available));
    }
}
