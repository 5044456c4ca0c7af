mod alarm;
mod analysis;
mod audio;
mod db;
mod error;
mod models;
mod platform;
mod sensing;
mod session;
mod settings;
mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use log::warn;

pub use alarm::{next_occurrence, AlarmContext, AlarmPhase, AlarmScheduler, CHECK_INTERVAL_SECS};
pub use analysis::{classify, score_session, ClassifierConfig, QualityReport, ScorerConfig};
pub use audio::{AlarmSound, AudioEngineHandle, ALARM_MS, PREVIEW_MS};
pub use db::Database;
pub use error::{EngineError, PermissionError, PermissionKind};
pub use models::{
    PhaseKind, PhasePartition, QualityLabel, SleepPhase, SleepSample, SleepSession,
    DEFAULT_QUALITY_SCORE,
};
pub use platform::{NullNotifier, Notifier};
pub use sensing::{
    MotionStream, SampleBuffer, SampleRecorder, SignalSource, SoundStream, SAMPLE_INTERVAL_SECS,
};
pub use session::{SessionController, TrackerState, TrackerStatus, STALE_SESSION_HOURS};
pub use settings::{AlarmSettings, SettingsStore};

/// Where the engine keeps its database and settings files.
pub struct EngineConfig {
    pub data_dir: PathBuf,
}

/// The one-per-process monitoring engine. Owns storage, settings, the audio
/// engine, and the session controller; embedders hold it by handle and shut
/// it down explicitly. There is no ambient singleton.
pub struct Engine {
    db: Database,
    settings: Arc<SettingsStore>,
    audio: AudioEngineHandle,
    sessions: SessionController,
    recovered: Option<SleepSession>,
}

impl Engine {
    /// Opens storage under `config.data_dir` and runs stale-session recovery
    /// to completion before any lifecycle call is accepted.
    pub async fn new(
        config: EngineConfig,
        source: Arc<dyn SignalSource>,
        notifier: Arc<dyn Notifier>,
    ) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let db = Database::new(config.data_dir.join("nocturne.sqlite3"))?;
        let settings = Arc::new(SettingsStore::new(config.data_dir.join("settings.json"))?);
        let audio = AudioEngineHandle::new();

        let sessions = SessionController::new(
            db.clone(),
            settings.clone(),
            audio.clone(),
            source,
            notifier,
        );

        // Finalize whatever a dead process left behind before anything else.
        let recovered = sessions.recover_stale().await.map_err(anyhow::Error::from)?;
        if let Some(session) = &recovered {
            warn!("recovered stale session {} on startup", session.id);
        }

        Ok(Self {
            db,
            settings,
            audio,
            sessions,
            recovered,
        })
    }

    /// Initialize logging (reads RUST_LOG env var). Optional convenience for
    /// embedders that don't configure their own logger.
    pub fn init_logging() {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    }

    /// The session finalized by startup recovery, if there was one.
    pub fn recovered_session(&self) -> Option<&SleepSession> {
        self.recovered.as_ref()
    }

    pub async fn tracker_state(&self) -> TrackerState {
        self.sessions.snapshot().await
    }

    pub async fn start_session(&self) -> Result<String, EngineError> {
        self.sessions.start().await
    }

    pub async fn stop_session(&self) -> Result<SleepSession, EngineError> {
        self.sessions.stop().await
    }

    pub fn alarm_settings(&self) -> AlarmSettings {
        self.settings.alarm()
    }

    /// Persist new alarm settings and re-arm or cancel a live alarm to match.
    pub async fn update_alarm_settings(
        &self,
        settings: AlarmSettings,
    ) -> Result<(), EngineError> {
        self.settings
            .update_alarm(settings.clone())
            .map_err(EngineError::Internal)?;
        self.sessions.apply_settings_change(settings).await
    }

    pub fn preview_alarm_sound(&self, sound: AlarmSound) -> Result<(), EngineError> {
        self.audio.preview(sound).map_err(EngineError::Audio)
    }

    pub fn stop_audio(&self) -> Result<(), EngineError> {
        self.audio.stop().map_err(EngineError::Audio)
    }

    /// Finalized sessions, newest first.
    pub async fn list_sessions(&self) -> Result<Vec<SleepSession>, EngineError> {
        self.db.list_sessions().await.map_err(EngineError::Internal)
    }

    /// Stop any active session, silence audio, and release storage.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        match self.sessions.stop().await {
            Ok(session) => {
                log::info!("shutdown finalized active session {}", session.id);
            }
            Err(EngineError::NoActiveSession) => {}
            Err(err) => return Err(anyhow::Error::from(err)),
        }
        let _ = self.audio.stop();
        Ok(())
    }
}
