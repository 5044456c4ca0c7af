use crate::analysis::config::ScorerConfig;
use crate::models::{QualityLabel, SleepSample, DEFAULT_QUALITY_SCORE};

/// Outcome statistics reduced from one session's sample buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct QualityReport {
    pub score: u8,
    pub label: QualityLabel,
    pub avg_movement: f64,
    pub avg_sound: f64,
    pub restless_ratio: f64,
    /// Samples whose movement crossed the restless threshold.
    pub movement_events: u32,
}

/// Score a session from its sample buffer alone.
///
/// An empty buffer scores the same neutral 50/Fair a freshly started session
/// is seeded with, so "never sampled" and "default" are indistinguishable.
pub fn score_session(samples: &[SleepSample], config: &ScorerConfig) -> QualityReport {
    if samples.is_empty() {
        return QualityReport {
            score: DEFAULT_QUALITY_SCORE,
            label: QualityLabel::Fair,
            avg_movement: 0.0,
            avg_sound: 0.0,
            restless_ratio: 0.0,
            movement_events: 0,
        };
    }

    let count = samples.len() as f64;
    let avg_movement = samples.iter().map(|s| s.movement).sum::<f64>() / count;
    let avg_sound = samples.iter().map(|s| s.sound_level).sum::<f64>() / count;

    let movement_events = samples
        .iter()
        .filter(|s| s.movement > config.restless_movement)
        .count();
    let restless_ratio = movement_events as f64 / count;

    let raw = 100.0
        - avg_movement * config.weight_movement
        - avg_sound * config.weight_sound
        - restless_ratio * config.restless_penalty;
    let score = raw.clamp(0.0, 100.0).round() as u8;

    QualityReport {
        score,
        label: QualityLabel::from_score(score),
        avg_movement,
        avg_sound,
        restless_ratio,
        movement_events: movement_events as u32,
    }
}
