use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use tempfile::TempDir;

use nocturne::{
    Database, Engine, EngineConfig, EngineError, MotionStream, NullNotifier, PermissionError,
    PermissionKind, QualityLabel, SignalSource, SleepSession, SoundStream,
};

struct ConstStream {
    value: f64,
    reads: Arc<AtomicUsize>,
}

impl SoundStream for ConstStream {
    fn level(&mut self) -> Option<f64> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Some(self.value)
    }
}

impl MotionStream for ConstStream {
    fn level(&mut self) -> Option<f64> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Some(self.value)
    }
}

struct FakeSource {
    deny_audio: AtomicBool,
    deny_motion: AtomicBool,
    movement: f64,
    sound: f64,
    reads: Arc<AtomicUsize>,
}

impl FakeSource {
    fn steady(movement: f64, sound: f64) -> Arc<Self> {
        Arc::new(Self {
            deny_audio: AtomicBool::new(false),
            deny_motion: AtomicBool::new(false),
            movement,
            sound,
            reads: Arc::new(AtomicUsize::new(0)),
        })
    }
}

impl SignalSource for FakeSource {
    fn acquire_audio(&self) -> Result<Box<dyn SoundStream>, PermissionError> {
        if self.deny_audio.load(Ordering::SeqCst) {
            return Err(PermissionError::Denied(PermissionKind::Microphone));
        }
        Ok(Box::new(ConstStream {
            value: self.sound,
            reads: self.reads.clone(),
        }))
    }

    fn acquire_motion(&self) -> Result<Box<dyn MotionStream>, PermissionError> {
        if self.deny_motion.load(Ordering::SeqCst) {
            return Err(PermissionError::Denied(PermissionKind::Motion));
        }
        Ok(Box::new(ConstStream {
            value: self.movement,
            reads: self.reads.clone(),
        }))
    }
}

async fn engine_with(source: Arc<FakeSource>) -> (TempDir, Engine) {
    let dir = TempDir::new().unwrap();
    let engine = Engine::new(
        EngineConfig {
            data_dir: dir.path().to_path_buf(),
        },
        source,
        Arc::new(NullNotifier),
    )
    .await
    .unwrap();
    (dir, engine)
}

async fn wait_for_reads(source: &FakeSource, at_least: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while source.reads.load(Ordering::SeqCst) < at_least {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("sampler never read the sensor streams");
}

#[tokio::test]
async fn start_twice_fails_with_already_active() {
    let source = FakeSource::steady(25.0, 40.0);
    let (_dir, engine) = engine_with(source).await;

    engine.start_session().await.unwrap();
    assert!(matches!(
        engine.start_session().await,
        Err(EngineError::AlreadyActive)
    ));
    assert!(matches!(
        engine.start_session().await,
        Err(EngineError::AlreadyActive)
    ));

    engine.stop_session().await.unwrap();
}

#[tokio::test]
async fn stop_without_session_fails() {
    let source = FakeSource::steady(25.0, 40.0);
    let (_dir, engine) = engine_with(source).await;

    assert!(matches!(
        engine.stop_session().await,
        Err(EngineError::NoActiveSession)
    ));
}

#[tokio::test]
async fn denied_microphone_leaves_no_partial_state() {
    let source = FakeSource::steady(25.0, 40.0);
    source.deny_audio.store(true, Ordering::SeqCst);
    let (_dir, engine) = engine_with(source.clone()).await;

    match engine.start_session().await {
        Err(EngineError::Permission(err)) => {
            assert_eq!(err.kind(), PermissionKind::Microphone);
        }
        other => panic!("expected permission error, got {other:?}"),
    }

    // No session was created anywhere.
    assert!(engine.list_sessions().await.unwrap().is_empty());
    assert!(!engine.tracker_state().await.is_tracking());

    // Granting the permission makes start work again.
    source.deny_audio.store(false, Ordering::SeqCst);
    engine.start_session().await.unwrap();
    engine.stop_session().await.unwrap();
}

#[tokio::test]
async fn denied_motion_releases_the_sound_stream() {
    let source = FakeSource::steady(25.0, 40.0);
    source.deny_motion.store(true, Ordering::SeqCst);
    let (_dir, engine) = engine_with(source).await;

    match engine.start_session().await {
        Err(EngineError::Permission(err)) => {
            assert_eq!(err.kind(), PermissionKind::Motion);
        }
        other => panic!("expected permission error, got {other:?}"),
    }
    assert!(!engine.tracker_state().await.is_tracking());
}

#[tokio::test]
async fn full_session_finalizes_with_phases_and_score() {
    // Steady movement 25 / sound 40 classifies as light sleep throughout.
    let source = FakeSource::steady(25.0, 40.0);
    let (_dir, engine) = engine_with(source.clone()).await;

    let session_id = engine.start_session().await.unwrap();
    assert!(engine.tracker_state().await.is_tracking());

    // The first sampling tick fires immediately; wait until both streams
    // have been read so at least one sample is in the buffer.
    wait_for_reads(&source, 2).await;

    let session = engine.stop_session().await.unwrap();
    assert_eq!(session.id, session_id);
    assert!(!session.is_active());
    assert_eq!(session.duration_minutes, Some(0));

    // One uniform-light buffer: a single phase run, tiling its own span.
    assert!(session.phases.awake.is_empty());
    assert!(session.phases.deep.is_empty());
    assert_eq!(session.phases.light.len(), 1);

    // 100 - 25*0.5 - 40*0.3 and no restless samples
    assert_eq!(session.quality_score, 76);
    assert_eq!(session.quality_label, QualityLabel::Good);
    assert_eq!(session.movement_events, 0);
    assert!(!session.alarm_did_trigger);

    // Finalized record is what reporting reads back.
    let listed = engine.list_sessions().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].quality_score, 76);

    // The lifecycle is reusable after finalization.
    engine.start_session().await.unwrap();
    engine.stop_session().await.unwrap();
}

#[tokio::test]
async fn stale_session_is_recovered_on_startup() {
    let dir = TempDir::new().unwrap();

    // Simulate a crash 30 hours ago: an active row with no samples.
    let started_at = Utc::now() - ChronoDuration::hours(30);
    {
        let db = Database::new(dir.path().join("nocturne.sqlite3")).unwrap();
        let session = SleepSession::begin(
            "orphan".into(),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            started_at,
            30,
        );
        db.insert_session(&session).await.unwrap();
    }

    let engine = Engine::new(
        EngineConfig {
            data_dir: dir.path().to_path_buf(),
        },
        FakeSource::steady(25.0, 40.0),
        Arc::new(NullNotifier),
    )
    .await
    .unwrap();

    let recovered = engine.recovered_session().expect("stale session recovered");
    assert_eq!(recovered.id, "orphan");
    let minutes = recovered.duration_minutes.unwrap();
    assert!((1799..=1801).contains(&minutes), "duration {minutes}");
    assert!(recovered.phases.is_empty());
    assert_eq!(recovered.quality_score, 50);
    assert_eq!(recovered.quality_label, QualityLabel::Fair);

    // The recovered row is finalized in storage too.
    let listed = engine.list_sessions().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(!listed[0].is_active());
}

#[tokio::test]
async fn fresh_active_session_is_not_recovered() {
    let dir = TempDir::new().unwrap();

    let started_at = Utc::now() - ChronoDuration::hours(2);
    {
        let db = Database::new(dir.path().join("nocturne.sqlite3")).unwrap();
        let session = SleepSession::begin(
            "tonight".into(),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            started_at,
            30,
        );
        db.insert_session(&session).await.unwrap();
    }

    let engine = Engine::new(
        EngineConfig {
            data_dir: dir.path().to_path_buf(),
        },
        FakeSource::steady(25.0, 40.0),
        Arc::new(NullNotifier),
    )
    .await
    .unwrap();

    assert!(engine.recovered_session().is_none());
}

#[tokio::test]
async fn settings_update_round_trips_through_engine() {
    let source = FakeSource::steady(25.0, 40.0);
    let (_dir, engine) = engine_with(source).await;

    let mut settings = engine.alarm_settings();
    assert!(!settings.enabled);
    assert_eq!(settings.window_minutes, 30);

    settings.enabled = true;
    settings.window_minutes = 45;
    engine.update_alarm_settings(settings.clone()).await.unwrap();

    assert_eq!(engine.alarm_settings(), settings);
}
