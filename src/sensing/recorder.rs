use anyhow::{bail, Result};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::models::SleepSample;

use super::source::{MotionStream, SoundStream};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_info, log_warn};

/// Fixed sampling cadence while a session is active.
pub const SAMPLE_INTERVAL_SECS: u64 = 30;

/// In-memory sample buffer shared by the recorder and the alarm scheduler.
/// The lifecycle manager owns its lifetime; it is cleared at finalization.
pub type SampleBuffer = Arc<Mutex<Vec<SleepSample>>>;

/// Pulls one sample per tick from the open sensor streams and appends it to
/// the session buffer. Start/stop pair owns the loop task and its token.
pub struct SampleRecorder {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl SampleRecorder {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn start(
        &mut self,
        sound: Box<dyn SoundStream>,
        motion: Box<dyn MotionStream>,
        buffer: SampleBuffer,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("sampling already active");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();

        let handle = tokio::spawn(sampling_loop(sound, motion, buffer, token_clone));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Cancels the loop and waits for it to drain. The sensor streams are
    /// dropped (released) inside the loop task before this returns.
    pub async fn stop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                log::error!("sampling loop task failed to join: {err}");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Default for SampleRecorder {
    fn default() -> Self {
        Self::new()
    }
}

async fn sampling_loop(
    mut sound: Box<dyn SoundStream>,
    mut motion: Box<dyn MotionStream>,
    buffer: SampleBuffer,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(SAMPLE_INTERVAL_SECS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                record_sample(sound.as_mut(), motion.as_mut(), &buffer).await;
            }
            _ = cancel_token.cancelled() => {
                log_info!("sampling loop shutting down");
                break;
            }
        }
    }
    // streams drop here, releasing the underlying devices
}

async fn record_sample(
    sound: &mut dyn SoundStream,
    motion: &mut dyn MotionStream,
    buffer: &SampleBuffer,
) {
    let timestamp = Utc::now();

    // A stream without a fresh frame skips this tick; the session carries on.
    let (Some(movement), Some(sound_level)) = (motion.level(), sound.level()) else {
        log_warn!("sensor frame missing at {timestamp}, skipping sample");
        return;
    };

    let sample = SleepSample::new(timestamp, movement, sound_level);
    let mut guard = buffer.lock().await;
    guard.push(sample);
    log_info!(
        "sample #{} movement={:.1} sound={:.1}",
        guard.len(),
        sample.movement,
        sample.sound_level
    );
}
