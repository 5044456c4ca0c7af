use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TrackerStatus {
    Idle,
    Tracking,
}

impl Default for TrackerStatus {
    fn default() -> Self {
        TrackerStatus::Idle
    }
}

/// Live view of the one session this process may be tracking. Owned behind
/// the controller's mutex; the alarm scheduler writes its trigger fields here
/// and `stop()` folds them into the persisted record.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TrackerState {
    pub status: TrackerStatus,
    pub session_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub started_at: Option<DateTime<Utc>>,
    pub alarm_triggered_at: Option<DateTime<Utc>>,
    pub alarm_did_trigger: bool,
    pub alarm_window_minutes: u32,
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_tracking(&self) -> bool {
        self.status == TrackerStatus::Tracking
    }

    pub fn begin_session(
        &mut self,
        session_id: String,
        date: NaiveDate,
        started_at: DateTime<Utc>,
        alarm_window_minutes: u32,
    ) {
        *self = Self {
            status: TrackerStatus::Tracking,
            session_id: Some(session_id),
            date: Some(date),
            started_at: Some(started_at),
            alarm_triggered_at: None,
            alarm_did_trigger: false,
            alarm_window_minutes,
        };
    }

    pub fn mark_alarm_triggered(&mut self, at: DateTime<Utc>) {
        self.alarm_triggered_at = Some(at);
        self.alarm_did_trigger = true;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
