use std::sync::{Arc, Mutex as StdMutex};

use anyhow::{bail, Result};
use chrono::{DateTime, Days, Duration as ChronoDuration, Local, NaiveTime, TimeZone, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::audio::AudioEngineHandle;
use crate::db::Database;
use crate::platform::Notifier;
use crate::sensing::SampleBuffer;
use crate::session::TrackerState;
use crate::settings::AlarmSettings;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Cadence of light-sleep checks once inside the wake window.
pub const CHECK_INTERVAL_SECS: u64 = 30;

/// How many trailing samples the light-sleep check averages (~90 s of data).
const RECENT_SAMPLE_COUNT: usize = 3;

/// Mean movement strictly inside this band reads as light sleep.
const LIGHT_MOVEMENT_MIN: f64 = 20.0;
const LIGHT_MOVEMENT_MAX: f64 = 50.0;

const VIBRATE_PATTERN_MS: [u64; 5] = [500, 200, 500, 200, 500];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmPhase {
    Disarmed,
    ArmedWaitingForWindow,
    CheckingForLightSleep,
    Fired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FireReason {
    LightSleep,
    HardDeadline,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum WakeDecision {
    Fire(FireReason),
    Wait,
}

/// Everything a firing alarm touches. Handles are cheap clones; the context
/// moves into the scheduler task when armed.
pub struct AlarmContext {
    pub settings: AlarmSettings,
    pub buffer: SampleBuffer,
    pub state: Arc<Mutex<TrackerState>>,
    pub db: Database,
    pub audio: AudioEngineHandle,
    pub notifier: Arc<dyn Notifier>,
}

/// Owns the wake-window timer and the in-window check ticker as one
/// cancellable unit. Armed at session start when alarms are enabled;
/// disarmed by `stop()` or by disabling the alarm.
pub struct AlarmScheduler {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    phase: Arc<StdMutex<AlarmPhase>>,
}

impl AlarmScheduler {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
            phase: Arc::new(StdMutex::new(AlarmPhase::Disarmed)),
        }
    }

    /// Arm against the next local occurrence of the configured target time.
    pub fn arm(&mut self, ctx: AlarmContext) -> Result<()> {
        let target_local = next_occurrence(Local::now(), ctx.settings.target_time);
        let target = target_local.with_timezone(&Utc);
        let window_start = target - ChronoDuration::minutes(i64::from(ctx.settings.window_minutes));
        self.arm_at(ctx, target, window_start)
    }

    pub(crate) fn arm_at(
        &mut self,
        ctx: AlarmContext,
        target: DateTime<Utc>,
        window_start: DateTime<Utc>,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("alarm already armed");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();
        let phase = self.phase.clone();

        *phase.lock().unwrap() = AlarmPhase::ArmedWaitingForWindow;
        log_info!(
            "alarm armed: target {target}, window opens {window_start}"
        );

        let handle = tokio::spawn(alarm_loop(ctx, target, window_start, phase, token_clone));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Cancel both pending timers and wait for the task to wind down.
    /// Idempotent; no timer may fire after this returns.
    pub async fn disarm(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                log::error!("alarm task failed to join: {err}");
            }
        }

        let mut phase = self.phase.lock().unwrap();
        if *phase != AlarmPhase::Fired {
            *phase = AlarmPhase::Disarmed;
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    pub fn phase(&self) -> AlarmPhase {
        *self.phase.lock().unwrap()
    }
}

impl Default for AlarmScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Next wall-clock instant matching `target`, rolling to the following day
/// when today's occurrence has already passed. Skips wall-clock times a DST
/// gap makes unrepresentable.
pub fn next_occurrence(now: DateTime<Local>, target: NaiveTime) -> DateTime<Local> {
    for day_offset in 0..4 {
        let Some(date) = now.date_naive().checked_add_days(Days::new(day_offset)) else {
            continue;
        };
        let naive = date.and_time(target);
        let candidate = match Local.from_local_datetime(&naive) {
            chrono::LocalResult::Single(dt) => Some(dt),
            chrono::LocalResult::Ambiguous(earliest, _) => Some(earliest),
            chrono::LocalResult::None => None,
        };
        if let Some(dt) = candidate {
            if dt > now {
                return dt;
            }
        }
    }
    // Unreachable with a sane clock; fall back to a day from now.
    now + ChronoDuration::hours(24)
}

fn evaluate_wake(
    now: DateTime<Utc>,
    target: DateTime<Utc>,
    recent_mean: Option<f64>,
) -> WakeDecision {
    // Hard deadline first: never fire later than the configured target.
    if now >= target {
        return WakeDecision::Fire(FireReason::HardDeadline);
    }
    match recent_mean {
        Some(mean) if mean > LIGHT_MOVEMENT_MIN && mean < LIGHT_MOVEMENT_MAX => {
            WakeDecision::Fire(FireReason::LightSleep)
        }
        _ => WakeDecision::Wait,
    }
}

async fn recent_movement_mean(buffer: &SampleBuffer) -> Option<f64> {
    let samples = buffer.lock().await;
    if samples.is_empty() {
        return None;
    }
    let tail = &samples[samples.len().saturating_sub(RECENT_SAMPLE_COUNT)..];
    Some(tail.iter().map(|s| s.movement).sum::<f64>() / tail.len() as f64)
}

async fn alarm_loop(
    ctx: AlarmContext,
    target: DateTime<Utc>,
    window_start: DateTime<Utc>,
    phase: Arc<StdMutex<AlarmPhase>>,
    cancel_token: CancellationToken,
) {
    let until_window = (window_start - Utc::now()).to_std().unwrap_or(Duration::ZERO);

    tokio::select! {
        _ = tokio::time::sleep(until_window) => {}
        _ = cancel_token.cancelled() => {
            log_info!("alarm cancelled before the wake window opened");
            return;
        }
    }

    *phase.lock().unwrap() = AlarmPhase::CheckingForLightSleep;
    log_info!("wake window open, checking for light sleep until {target}");

    let mut ticker = tokio::time::interval(Duration::from_secs(CHECK_INTERVAL_SECS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Utc::now();
                let recent_mean = recent_movement_mean(&ctx.buffer).await;
                match evaluate_wake(now, target, recent_mean) {
                    WakeDecision::Fire(reason) => {
                        log_info!("alarm firing ({reason:?}) at {now}");
                        fire(&ctx, now).await;
                        *phase.lock().unwrap() = AlarmPhase::Fired;
                        break;
                    }
                    WakeDecision::Wait => {}
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("alarm cancelled inside the wake window");
                return;
            }
        }
    }
}

/// Best-effort fan-out: every branch runs even when an earlier one fails.
async fn fire(ctx: &AlarmContext, now: DateTime<Utc>) {
    let session_id = {
        let mut state = ctx.state.lock().await;
        state.mark_alarm_triggered(now);
        state.session_id.clone()
    };

    if let Some(id) = session_id {
        if let Err(err) = ctx.db.mark_alarm_triggered(&id, now).await {
            log_warn!("failed to persist alarm trigger for {id}: {err:?}");
        }
    }

    if let Err(err) = ctx.audio.play_alarm(ctx.settings.sound) {
        log_warn!("alarm audio failed to start: {err}");
    }

    if ctx.settings.vibrate {
        ctx.notifier.vibrate(&VIBRATE_PATTERN_MS);
    }

    ctx.notifier.notify(
        "Good morning",
        "Your smart alarm went off during light sleep.",
    );
}
