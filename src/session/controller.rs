use std::sync::Arc;

use anyhow::anyhow;
use chrono::{Duration as ChronoDuration, Local, Utc};
use log::{info, warn};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::alarm::{AlarmContext, AlarmScheduler};
use crate::analysis::{classify, score_session, ClassifierConfig, ScorerConfig};
use crate::audio::AudioEngineHandle;
use crate::db::Database;
use crate::error::EngineError;
use crate::models::{SleepSample, SleepSession};
use crate::platform::Notifier;
use crate::sensing::{SampleBuffer, SampleRecorder, SignalSource};
use crate::settings::{AlarmSettings, SettingsStore};

use super::state::TrackerState;

/// An active session older than this is treated as orphaned by a dead
/// process and force-finalized on startup.
pub const STALE_SESSION_HOURS: i64 = 24;

/// Owns the session lifecycle: the active-session invariant, the sample
/// buffer, and every timer that runs on its behalf. All state transitions
/// serialize through this controller's mutexes, so sample processing never
/// races classification or alarm checks for the same session.
#[derive(Clone)]
pub struct SessionController {
    state: Arc<Mutex<TrackerState>>,
    buffer: SampleBuffer,
    db: Database,
    settings: Arc<SettingsStore>,
    recorder: Arc<Mutex<SampleRecorder>>,
    alarm: Arc<Mutex<AlarmScheduler>>,
    audio: AudioEngineHandle,
    source: Arc<dyn SignalSource>,
    notifier: Arc<dyn Notifier>,
    classifier_config: ClassifierConfig,
    scorer_config: ScorerConfig,
}

impl SessionController {
    pub fn new(
        db: Database,
        settings: Arc<SettingsStore>,
        audio: AudioEngineHandle,
        source: Arc<dyn SignalSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(TrackerState::new())),
            buffer: Arc::new(Mutex::new(Vec::new())),
            db,
            settings,
            recorder: Arc::new(Mutex::new(SampleRecorder::new())),
            alarm: Arc::new(Mutex::new(AlarmScheduler::new())),
            audio,
            source,
            notifier,
            classifier_config: ClassifierConfig::default(),
            scorer_config: ScorerConfig::default(),
        }
    }

    pub async fn snapshot(&self) -> TrackerState {
        self.state.lock().await.clone()
    }

    /// Begin tracking a new night. Fails without side effects when a session
    /// is already active or a sensor cannot be acquired.
    pub async fn start(&self) -> Result<String, EngineError> {
        {
            let state = self.state.lock().await;
            if state.is_tracking() {
                return Err(EngineError::AlreadyActive);
            }
        }

        // Acquire both streams before touching any session state; a denied
        // permission leaves nothing behind to clean up.
        let sound = self.source.acquire_audio()?;
        let motion = match self.source.acquire_motion() {
            Ok(stream) => stream,
            Err(err) => {
                drop(sound);
                return Err(err.into());
            }
        };

        let session_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let date = Local::now().date_naive();
        let alarm_settings = self.settings.alarm();

        let session = SleepSession::begin(
            session_id.clone(),
            date,
            started_at,
            alarm_settings.window_minutes,
        );
        self.db
            .insert_session(&session)
            .await
            .map_err(EngineError::Internal)?;

        {
            let mut state = self.state.lock().await;
            state.begin_session(
                session_id.clone(),
                date,
                started_at,
                alarm_settings.window_minutes,
            );
        }
        self.buffer.lock().await.clear();

        self.recorder
            .lock()
            .await
            .start(sound, motion, self.buffer.clone())
            .map_err(EngineError::Internal)?;

        if alarm_settings.enabled {
            let mut alarm = self.alarm.lock().await;
            alarm
                .arm(self.alarm_context(alarm_settings))
                .map_err(EngineError::Internal)?;
        }

        info!("sleep session {session_id} started at {started_at}");
        Ok(session_id)
    }

    /// Finalize the active session: halt every timer, reduce the buffer to
    /// phases and a score, persist, and hand back the finished record. The
    /// only Active -> Finalized transition in the engine.
    pub async fn stop(&self) -> Result<SleepSession, EngineError> {
        {
            let state = self.state.lock().await;
            if !state.is_tracking() {
                return Err(EngineError::NoActiveSession);
            }
        }

        // Halt sampling first (releases the sensor streams), then cancel any
        // pending alarm timers, then silence a possibly ringing alarm.
        self.recorder.lock().await.stop().await;
        self.alarm.lock().await.disarm().await;
        if let Err(err) = self.audio.stop() {
            warn!("failed to silence audio engine: {err}");
        }

        // Snapshot only after every timer is down, so a last-moment alarm
        // trigger cannot slip in between.
        let stopped_at = Utc::now();
        let snapshot = self.state.lock().await.clone();

        let samples: Vec<SleepSample> = {
            let mut buffer = self.buffer.lock().await;
            std::mem::take(&mut *buffer)
        };

        let phases = classify(&samples, &self.classifier_config);
        let report = score_session(&samples, &self.scorer_config);

        let session_id = snapshot
            .session_id
            .ok_or_else(|| EngineError::Internal(anyhow!("tracking state missing session id")))?;
        let started_at = snapshot
            .started_at
            .ok_or_else(|| EngineError::Internal(anyhow!("tracking state missing start time")))?;
        let date = snapshot.date.unwrap_or_else(|| Local::now().date_naive());

        let session = SleepSession {
            id: session_id.clone(),
            date,
            started_at,
            stopped_at: Some(stopped_at),
            duration_minutes: Some((stopped_at - started_at).num_minutes()),
            quality_score: report.score,
            quality_label: report.label,
            movement_events: report.movement_events,
            avg_sound_level: report.avg_sound,
            phases,
            alarm_triggered_at: snapshot.alarm_triggered_at,
            alarm_did_trigger: snapshot.alarm_did_trigger,
            alarm_window_minutes: snapshot.alarm_window_minutes,
        };

        self.db
            .finalize_session(&session)
            .await
            .map_err(EngineError::Internal)?;

        self.state.lock().await.reset();

        info!(
            "sleep session {session_id} finalized: {} samples, score {}, {} phases",
            samples.len(),
            session.quality_score,
            session.phases.len()
        );
        Ok(session)
    }

    /// Startup-only crash recovery. An active session whose start is more
    /// than [`STALE_SESSION_HOURS`] old is finalized from wall clock alone:
    /// no samples survive the dead process, so phases stay empty and the
    /// score keeps its neutral seed.
    pub async fn recover_stale(&self) -> Result<Option<SleepSession>, EngineError> {
        let Some(mut session) = self
            .db
            .get_active_session()
            .await
            .map_err(EngineError::Internal)?
        else {
            return Ok(None);
        };

        let now = Utc::now();
        if now - session.started_at < ChronoDuration::hours(STALE_SESSION_HOURS) {
            return Ok(None);
        }

        session.stopped_at = Some(now);
        session.duration_minutes = Some((now - session.started_at).num_minutes());

        self.db
            .finalize_session(&session)
            .await
            .map_err(EngineError::Internal)?;

        warn!(
            "recovered stale session {} ({} minutes, no sample data)",
            session.id,
            session.duration_minutes.unwrap_or(0)
        );
        Ok(Some(session))
    }

    /// Re-arm or cancel a live alarm after a settings change. Disabling
    /// always cancels; enabling while tracking arms against the new target.
    pub async fn apply_settings_change(
        &self,
        settings: AlarmSettings,
    ) -> Result<(), EngineError> {
        let tracking = self.state.lock().await.is_tracking();

        let mut alarm = self.alarm.lock().await;
        alarm.disarm().await;
        if tracking && settings.enabled {
            alarm
                .arm(self.alarm_context(settings))
                .map_err(EngineError::Internal)?;
        }
        Ok(())
    }

    fn alarm_context(&self, settings: AlarmSettings) -> AlarmContext {
        AlarmContext {
            settings,
            buffer: self.buffer.clone(),
            state: self.state.clone(),
            db: self.db.clone(),
            audio: self.audio.clone(),
            notifier: self.notifier.clone(),
        }
    }
}
