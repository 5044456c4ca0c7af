use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One sensor reading taken during an active session. Samples live only in
/// the in-memory buffer; finalization reduces them to phases and a score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SleepSample {
    pub timestamp: DateTime<Utc>,
    /// Device motion level, 0-100.
    pub movement: f64,
    /// Ambient sound level, 0-100.
    pub sound_level: f64,
}

impl SleepSample {
    pub fn new(timestamp: DateTime<Utc>, movement: f64, sound_level: f64) -> Self {
        Self {
            timestamp,
            movement: movement.clamp(0.0, 100.0),
            sound_level: sound_level.clamp(0.0, 100.0),
        }
    }
}
