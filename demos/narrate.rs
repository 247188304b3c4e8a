use std::sync::Arc;
use std::time::Instant;

use tts_session::{
    engines::native::NativeEngine,
    store::{JsonFileStore, SettingsPatch},
    SessionConfig, SpeechOptions, TtsService,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let engine = Arc::new(NativeEngine::new()?);
    let store = Arc::new(JsonFileStore::new("tts-data"));
    let service = TtsService::new(engine, store, SessionConfig::default());
    service.initialize().await?;

    let voices = service.session().available_voices().await?;
    println!("Available voices: {}", voices.len());
    for voice in voices.iter().take(5) {
        println!("  {} ({}, {:?})", voice.name, voice.language, voice.quality);
    }

    service
        .save_settings(SettingsPatch {
            default_rate: Some(1.1),
            ..Default::default()
        })
        .await?;

    let start = Instant::now();
    service.speak("Hello! This is the speech session demo.", None).await?;
    println!("Spoke greeting in {:.2?}", start.elapsed());

    let text = "Long passages are split at sentence boundaries. \
                Each chunk is spoken only after the previous one has finished. \
                Stopping the session abandons whatever is left. \
                That keeps narration predictable on every platform.";
    let options = SpeechOptions::default().with_pitch(0.9);
    let summary = service.session().speak_long_text(text, Some(options)).await?;
    println!(
        "Narrated {}/{} chunks ({} failed)",
        summary.spoken, summary.chunks, summary.failed
    );

    match service.favorites().save(text, None).await {
        Ok(favorite) => println!("Saved favorite \"{}\"", favorite.title),
        Err(err) => println!("Not saved: {}", err.user_message()),
    }

    service.dispose().await;
    Ok(())
}
