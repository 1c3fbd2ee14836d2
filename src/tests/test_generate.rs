//! Тесты генерации отдельных задач

use std::sync::Arc;

use tempfile::tempdir;

use super::doubles::{CopyingConverter, MemoryStore, RecordingSynthesizer};
use crate::error::PipelineError;
use crate::generate::{GenerationDriver, TaskOutcome};
use crate::model::{AudioFormat, Gender, GenerationTask, TranslationEntry, VoiceOption, VoiceTier};
use crate::staging::StagingArea;
use crate::storage::ObjectLayout;

struct Fixture {
    synthesizer: RecordingSynthesizer,
    converter: CopyingConverter,
    store: MemoryStore,
    driver: GenerationDriver,
    _dir: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let dir = tempdir().unwrap();
    let synthesizer = RecordingSynthesizer::new();
    let converter = CopyingConverter::new();
    let store = MemoryStore::new();
    let driver = GenerationDriver::new(
        Arc::new(synthesizer.clone()),
        Arc::new(converter.clone()),
        Arc::new(store.clone()),
        ObjectLayout::new("AudioProject"),
        StagingArea::new(dir.path().join("staging")),
        24_000,
    );
    Fixture {
        synthesizer,
        converter,
        store,
        driver,
        _dir: dir,
    }
}

fn task(format: AudioFormat) -> GenerationTask {
    GenerationTask {
        entry: TranslationEntry::new("item.minecraft.apple", "Appel"),
        voice: VoiceOption::new("af-ZA-Standard-A", "af-ZA", Gender::Female, VoiceTier::Standard),
        format,
    }
}

#[tokio::test]
async fn test_wav_is_synthesized_into_staging() {
    let f = fixture();
    let outcome = f.driver.generate(&task(AudioFormat::Wav)).await.unwrap();

    let file = match outcome {
        TaskOutcome::Made(file) => file,
        other => panic!("expected a new file, got {:?}", other),
    };
    assert!(file.path.ends_with("af-ZA-Standard-A-female-WAV/item.minecraft.apple.wav"));
    let data = std::fs::read(&file.path).unwrap();
    assert!(data.starts_with(b"RIFF"));

    let requests = f.synthesizer.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].text, "Appel");
    assert_eq!(requests[0].language_code, "af-ZA");
    assert_eq!(requests[0].sample_rate_hertz, 24_000);
}

#[tokio::test]
async fn test_staged_wav_is_reused_without_synthesis() {
    let f = fixture();
    let path = f
        .driver
        .staging()
        .file_path(&task(AudioFormat::Wav).voice, AudioFormat::Wav, "item.minecraft.apple");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"RIFF").unwrap();

    let outcome = f.driver.generate(&task(AudioFormat::Wav)).await.unwrap();
    assert!(matches!(outcome, TaskOutcome::Reused(_)));
    assert_eq!(f.synthesizer.calls(), 0);
}

#[tokio::test]
async fn test_ogg_uses_local_wav() {
    let f = fixture();
    f.driver.generate(&task(AudioFormat::Wav)).await.unwrap();
    let outcome = f.driver.generate(&task(AudioFormat::Ogg)).await.unwrap();

    assert!(outcome.file().path.exists());
    assert_eq!(f.converter.calls(), 1);
    assert_eq!(f.synthesizer.calls(), 1);
}

#[tokio::test]
async fn test_ogg_fetches_remote_wav_when_not_local() {
    let f = fixture();
    f.store.insert(
        "AudioProject/af-ZA-Standard-A-female-WAV/item.minecraft.apple.wav",
        b"RIFFremote",
    );

    let outcome = f.driver.generate(&task(AudioFormat::Ogg)).await.unwrap();
    let ogg = std::fs::read(&outcome.file().path).unwrap();
    assert_eq!(ogg, b"OggSRIFFremote");
    assert_eq!(f.synthesizer.calls(), 0);

    // Временный WAV удален после конвертации
    let leftovers: Vec<_> = std::fs::read_dir(f.driver.staging().root())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_ogg_without_any_wav_is_conversion_error() {
    let f = fixture();
    let err = f.driver.generate(&task(AudioFormat::Ogg)).await.unwrap_err();
    assert!(matches!(err, PipelineError::Conversion { .. }));
    assert_eq!(f.converter.calls(), 0);
}

#[tokio::test]
async fn test_synthesis_failure_names_key_and_voice() {
    let f = fixture();
    f.synthesizer.fail_on("Appel");

    let err = f.driver.generate(&task(AudioFormat::Wav)).await.unwrap_err();
    match err {
        PipelineError::Synthesis { key, voice, .. } => {
            assert_eq!(key, "item.minecraft.apple");
            assert_eq!(voice, "af-ZA-Standard-A");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!f
        .driver
        .staging()
        .file_path(&task(AudioFormat::Wav).voice, AudioFormat::Wav, "item.minecraft.apple")
        .exists());
}

#[tokio::test]
async fn test_failed_conversion_leaves_nothing_staged() {
    let f = fixture();
    f.driver.generate(&task(AudioFormat::Wav)).await.unwrap();
    f.converter.set_truncating(true);

    let err = f.driver.generate(&task(AudioFormat::Ogg)).await.unwrap_err();
    assert!(matches!(err, PipelineError::Conversion { .. }));

    let ogg_dir = f.driver.staging().dir(&task(AudioFormat::Ogg).voice, AudioFormat::Ogg);
    let files: Vec<_> = std::fs::read_dir(&ogg_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .collect();
    assert!(files.is_empty());
    assert!(f.driver.staging().leftovers().unwrap().iter().all(|file| file.format == AudioFormat::Wav));

    // Следующая попытка конвертирует заново
    f.converter.set_truncating(false);
    let outcome = f.driver.generate(&task(AudioFormat::Ogg)).await.unwrap();
    assert!(matches!(outcome, TaskOutcome::Made(_)));
    assert!(std::fs::read(&outcome.file().path).unwrap().starts_with(b"OggSRIFF"));
}
