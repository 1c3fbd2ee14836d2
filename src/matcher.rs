//! Сопоставление языка игры с голосами поставщика
//!
//! Код языка игры переводится в ISO-код по статической таблице, затем из
//! каталога выбирается не больше одного голоса на пол: premium раньше
//! standard, при равенстве - лексикографически меньший идентификатор.

use std::collections::BTreeMap;

use crate::error::{PipelineError, Result};
use crate::model::{Gender, LanguageRecord, VoiceOption, VoiceSelection};

/// Нормализация кода языка для сравнения: нижний регистр, `_` -> `-`
pub fn normalize_language_code(code: &str) -> String {
    code.trim().to_ascii_lowercase().replace('_', "-")
}

/// Найти ISO-код для кода языка игры
pub fn resolve_language(
    in_game_code: &str,
    language_table: &BTreeMap<String, String>,
) -> Result<LanguageRecord> {
    let iso_code = language_table.get(in_game_code).or_else(|| {
        language_table
            .iter()
            .find(|(code, _)| code.eq_ignore_ascii_case(in_game_code))
            .map(|(_, iso)| iso)
    });

    match iso_code {
        Some(iso_code) => Ok(LanguageRecord {
            in_game_code: in_game_code.to_string(),
            iso_code: iso_code.clone(),
        }),
        None => Err(PipelineError::NoMappingFound(in_game_code.to_string())),
    }
}

/// Выбрать голоса для языка из каталога
pub fn select_voices(language: &LanguageRecord, catalog: &[VoiceOption]) -> Result<VoiceSelection> {
    let wanted = normalize_language_code(&language.iso_code);
    let matching: Vec<&VoiceOption> = catalog
        .iter()
        .filter(|voice| normalize_language_code(&voice.language_iso_code) == wanted)
        .collect();

    if matching.is_empty() {
        return Err(PipelineError::NoVoicesAvailable(language.iso_code.clone()));
    }

    let voices = Gender::ALL
        .iter()
        .filter_map(|gender| {
            matching
                .iter()
                .filter(|voice| voice.gender == *gender)
                .min_by(|a, b| a.tier.cmp(&b.tier).then_with(|| a.voice_id.cmp(&b.voice_id)))
                .map(|voice| (*voice).clone())
        })
        .collect();

    Ok(VoiceSelection {
        language: language.clone(),
        voices,
    })
}

pub fn match_voices(
    in_game_code: &str,
    language_table: &BTreeMap<String, String>,
    catalog: &[VoiceOption],
) -> Result<VoiceSelection> {
    let language = resolve_language(in_game_code, language_table)?;
    select_voices(&language, catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VoiceTier;

    fn table() -> BTreeMap<String, String> {
        [("af_za", "af-ZA"), ("de_de", "de-DE"), ("tlh_aa", "tlh")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn voice(id: &str, iso: &str, gender: Gender, tier: VoiceTier) -> VoiceOption {
        VoiceOption::new(id, iso, gender, tier)
    }

    #[test]
    fn test_standard_voices_only() {
        let catalog = vec![
            voice("af-ZA-Standard-A", "af-ZA", Gender::Female, VoiceTier::Standard),
            voice("af-ZA-Standard-B", "af-ZA", Gender::Male, VoiceTier::Standard),
        ];

        let selection = match_voices("af_za", &table(), &catalog).unwrap();
        assert_eq!(selection.language.iso_code, "af-ZA");
        assert_eq!(
            selection.voice_for(Gender::Female).unwrap().voice_id,
            "af-ZA-Standard-A"
        );
        assert_eq!(
            selection.voice_for(Gender::Male).unwrap().voice_id,
            "af-ZA-Standard-B"
        );
    }

    #[test]
    fn test_premium_preferred_and_ties_broken_by_id() {
        let catalog = vec![
            voice("de-DE-Standard-A", "de-DE", Gender::Female, VoiceTier::Standard),
            voice("de-DE-Wavenet-F", "de-DE", Gender::Female, VoiceTier::Premium),
            voice("de-DE-Neural2-G", "de-DE", Gender::Female, VoiceTier::Premium),
            voice("de-DE-Standard-B", "de-DE", Gender::Male, VoiceTier::Standard),
        ];

        let selection = match_voices("de_de", &table(), &catalog).unwrap();
        let ids: Vec<&str> = selection.voices.iter().map(|v| v.voice_id.as_str()).collect();
        assert_eq!(ids, vec!["de-DE-Neural2-G", "de-DE-Standard-B"]);
    }

    #[test]
    fn test_selection_is_deterministic_across_catalog_order() {
        let mut catalog = vec![
            voice("de-DE-Neural2-H", "de-DE", Gender::Female, VoiceTier::Premium),
            voice("de-DE-Neural2-C", "de-DE", Gender::Female, VoiceTier::Premium),
            voice("de-DE-Neural2-B", "de-DE", Gender::Male, VoiceTier::Premium),
        ];
        let first = match_voices("de_de", &table(), &catalog).unwrap();
        catalog.reverse();
        let second = match_voices("de_de", &table(), &catalog).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.voices[0].voice_id, "de-DE-Neural2-C");
    }

    #[test]
    fn test_missing_gender_is_omitted() {
        let catalog = vec![voice("af-ZA-Standard-A", "af_za", Gender::Female, VoiceTier::Standard)];
        let selection = match_voices("af_za", &table(), &catalog).unwrap();
        assert_eq!(selection.voices.len(), 1);
        assert!(selection.voice_for(Gender::Male).is_none());
    }

    #[test]
    fn test_no_mapping_and_no_voices() {
        let catalog = vec![voice("af-ZA-Standard-A", "af-ZA", Gender::Female, VoiceTier::Standard)];

        let err = match_voices("xx_yy", &table(), &catalog).unwrap_err();
        assert!(matches!(err, PipelineError::NoMappingFound(code) if code == "xx_yy"));

        let err = match_voices("tlh_aa", &table(), &catalog).unwrap_err();
        assert!(matches!(err, PipelineError::NoVoicesAvailable(iso) if iso == "tlh"));
    }

    #[test]
    fn test_case_insensitive_table_lookup() {
        let language = resolve_language("AF_ZA", &table()).unwrap();
        assert_eq!(language.iso_code, "af-ZA");
        assert_eq!(language.in_game_code, "AF_ZA");
    }
}
