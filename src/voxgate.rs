use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use voxgate::notify::NotificationLayer;
use voxgate::{
    ConfigManager, ConsolePrompter, CpalHardware, DEFAULT_LOG_LEVEL, RecognitionOptions,
    SessionController, SessionEvent, VERSION, WhisperEngine, WhisperEngineConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("VOXGATE_LOG")
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL)),
        )
        .finish()
        .with(NotificationLayer::new())
        .init();

    info!(version = VERSION, "Voxgate starting");

    // Load config
    let config_manager = ConfigManager::new()?;
    let config = config_manager.load()?;
    // save back the config to create the file if it doesn't exist
    config_manager.save(&config)?;

    // Load the model up front so the first utterance isn't delayed
    let engine = Arc::new(WhisperEngine::new(WhisperEngineConfig::from_config(&config)));
    let preload = engine.clone();
    tokio::task::spawn_blocking(move || preload.preload())
        .await
        .context("Model loading task failed")??;

    let options = RecognitionOptions::default().with_language(config.locale());
    let controller = SessionController::new(
        CpalHardware::new(),
        engine,
        Arc::new(ConsolePrompter::new()),
        options,
    );
    let mut events = controller.events();

    if let Err(e) = controller.request_capture().await {
        error!("Could not start capture: {}", e);
        return Ok(());
    }

    println!("Listening. Speak now, or press Ctrl-C to stop.");
    let mut states = controller.subscribe_state();
    loop {
        tokio::select! {
            state = states.recv() => match state {
                Some(state) if state.is_resting() => break,
                Some(_) => {}
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                controller.pause();
                break;
            }
        }
    }

    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::TranscriptReady(_) => {}
            SessionEvent::NoSpeechDetected => warn!("No speech detected"),
            other => warn!(event = ?other, "Attempt ended without a transcript"),
        }
    }

    let transcript = controller.transcript();
    if !transcript.is_empty() {
        println!("{}", transcript);
    }

    Ok(())
}
