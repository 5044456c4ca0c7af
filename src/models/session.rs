use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Score a session is seeded with before any samples have been scored.
pub const DEFAULT_QUALITY_SCORE: u8 = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum PhaseKind {
    Light,
    Deep,
    Awake,
}

impl PhaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseKind::Light => "Light",
            PhaseKind::Deep => "Deep",
            PhaseKind::Awake => "Awake",
        }
    }
}

/// One classified interval of the night. Within a session the phases across
/// all three kinds tile `[started_at, stopped_at)` with no gaps or overlaps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SleepPhase {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub kind: PhaseKind,
}

impl SleepPhase {
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// Per-kind phase sequences produced by classification.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhasePartition {
    pub light: Vec<SleepPhase>,
    pub deep: Vec<SleepPhase>,
    pub awake: Vec<SleepPhase>,
}

impl PhasePartition {
    pub fn push(&mut self, phase: SleepPhase) {
        match phase.kind {
            PhaseKind::Light => self.light.push(phase),
            PhaseKind::Deep => self.deep.push(phase),
            PhaseKind::Awake => self.awake.push(phase),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.light.is_empty() && self.deep.is_empty() && self.awake.is_empty()
    }

    pub fn len(&self) -> usize {
        self.light.len() + self.deep.len() + self.awake.len()
    }

    /// All phases merged back into timeline order.
    pub fn chronological(&self) -> Vec<SleepPhase> {
        let mut phases: Vec<SleepPhase> = self
            .light
            .iter()
            .chain(self.deep.iter())
            .chain(self.awake.iter())
            .cloned()
            .collect();
        phases.sort_by_key(|phase| phase.start);
        phases
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum QualityLabel {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl QualityLabel {
    pub fn from_score(score: u8) -> Self {
        match score {
            80..=u8::MAX => QualityLabel::Excellent,
            60..=79 => QualityLabel::Good,
            40..=59 => QualityLabel::Fair,
            _ => QualityLabel::Poor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityLabel::Poor => "Poor",
            QualityLabel::Fair => "Fair",
            QualityLabel::Good => "Good",
            QualityLabel::Excellent => "Excellent",
        }
    }
}

/// One tracked night. Outcome fields are written exactly once, at
/// finalization; the record is read-only afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SleepSession {
    pub id: String,
    /// Local calendar date the night belongs to.
    pub date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub quality_score: u8,
    pub quality_label: QualityLabel,
    pub movement_events: u32,
    pub avg_sound_level: f64,
    pub phases: PhasePartition,
    pub alarm_triggered_at: Option<DateTime<Utc>>,
    pub alarm_did_trigger: bool,
    pub alarm_window_minutes: u32,
}

impl SleepSession {
    /// A freshly started session with the neutral outcome seed.
    pub fn begin(
        id: String,
        date: NaiveDate,
        started_at: DateTime<Utc>,
        alarm_window_minutes: u32,
    ) -> Self {
        Self {
            id,
            date,
            started_at,
            stopped_at: None,
            duration_minutes: None,
            quality_score: DEFAULT_QUALITY_SCORE,
            quality_label: QualityLabel::Fair,
            movement_events: 0,
            avg_sound_level: 0.0,
            phases: PhasePartition::default(),
            alarm_triggered_at: None,
            alarm_did_trigger: false,
            alarm_window_minutes,
        }
    }

    pub fn is_active(&self) -> bool {
        self.stopped_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn label_thresholds() {
        assert_eq!(QualityLabel::from_score(100), QualityLabel::Excellent);
        assert_eq!(QualityLabel::from_score(80), QualityLabel::Excellent);
        assert_eq!(QualityLabel::from_score(79), QualityLabel::Good);
        assert_eq!(QualityLabel::from_score(60), QualityLabel::Good);
        assert_eq!(QualityLabel::from_score(59), QualityLabel::Fair);
        assert_eq!(QualityLabel::from_score(40), QualityLabel::Fair);
        assert_eq!(QualityLabel::from_score(39), QualityLabel::Poor);
        assert_eq!(QualityLabel::from_score(0), QualityLabel::Poor);
    }

    #[test]
    fn partition_chronological_merges_kinds() {
        let t = |secs: i64| Utc.timestamp_opt(secs, 0).unwrap();
        let mut partition = PhasePartition::default();
        partition.push(SleepPhase {
            start: t(60),
            end: t(120),
            kind: PhaseKind::Awake,
        });
        partition.push(SleepPhase {
            start: t(0),
            end: t(60),
            kind: PhaseKind::Deep,
        });

        let ordered = partition.chronological();
        assert_eq!(ordered.len(), 2);
        assert_eq!(ordered[0].kind, PhaseKind::Deep);
        assert_eq!(ordered[1].kind, PhaseKind::Awake);
        assert_eq!(ordered[0].end, ordered[1].start);
    }

    #[test]
    fn fresh_session_is_active_with_neutral_seed() {
        let session = SleepSession::begin(
            "abc".into(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            30,
        );
        assert!(session.is_active());
        assert_eq!(session.quality_score, DEFAULT_QUALITY_SCORE);
        assert_eq!(session.quality_label, QualityLabel::Fair);
        assert!(session.phases.is_empty());
        assert!(session.duration_minutes.is_none());
    }
}
