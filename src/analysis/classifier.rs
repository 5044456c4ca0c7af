use crate::analysis::config::ClassifierConfig;
use crate::models::{PhaseKind, PhasePartition, SleepPhase, SleepSample};

/// Classify a sample buffer into phase intervals.
///
/// Samples are walked in timestamp order; consecutive samples of the same
/// instantaneous kind form one run, and each run closes at the timestamp of
/// its last sample, which is also where the next run starts. Every phase's
/// end therefore equals the next phase's start, so the output tiles the span
/// from the first to the last sample with no gaps and no overlaps.
///
/// An empty buffer yields an empty partition.
pub fn classify(samples: &[SleepSample], config: &ClassifierConfig) -> PhasePartition {
    let mut partition = PhasePartition::default();

    let Some(first) = samples.first() else {
        return partition;
    };

    let mut current = instantaneous_kind(first, config);
    let mut phase_start = first.timestamp;
    let mut prev_timestamp = first.timestamp;

    for sample in &samples[1..] {
        let kind = instantaneous_kind(sample, config);
        if kind != current {
            partition.push(SleepPhase {
                start: phase_start,
                end: prev_timestamp,
                kind: current,
            });
            phase_start = prev_timestamp;
            current = kind;
        }
        prev_timestamp = sample.timestamp;
    }

    partition.push(SleepPhase {
        start: phase_start,
        end: prev_timestamp,
        kind: current,
    });

    partition
}

/// Threshold rule, first match wins: loud or restless means awake, still and
/// quiet means deep, everything between is light sleep.
fn instantaneous_kind(sample: &SleepSample, config: &ClassifierConfig) -> PhaseKind {
    if sample.movement > config.awake_movement || sample.sound_level > config.awake_sound {
        PhaseKind::Awake
    } else if sample.movement < config.deep_movement && sample.sound_level < config.deep_sound {
        PhaseKind::Deep
    } else {
        PhaseKind::Light
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn sample(secs: i64, movement: f64, sound: f64) -> SleepSample {
        SleepSample::new(at(secs), movement, sound)
    }

    #[test]
    fn empty_buffer_yields_empty_partition() {
        let partition = classify(&[], &ClassifierConfig::default());
        assert!(partition.is_empty());
    }

    #[test]
    fn deep_then_awake_scenario() {
        let samples = vec![
            sample(0, 10.0, 10.0),
            sample(30, 10.0, 10.0),
            sample(60, 60.0, 70.0),
        ];
        let partition = classify(&samples, &ClassifierConfig::default());

        assert_eq!(partition.deep.len(), 1);
        assert_eq!(partition.awake.len(), 1);
        assert!(partition.light.is_empty());

        assert_eq!(partition.deep[0].start, at(0));
        assert_eq!(partition.deep[0].end, at(30));
        assert_eq!(partition.awake[0].start, at(30));
        assert_eq!(partition.awake[0].end, at(60));
    }

    #[test]
    fn uniform_buffer_yields_single_phase() {
        let samples: Vec<SleepSample> =
            (0..10).map(|i| sample(i * 30, 30.0, 40.0)).collect();
        let partition = classify(&samples, &ClassifierConfig::default());

        assert_eq!(partition.len(), 1);
        assert_eq!(partition.light.len(), 1);
        assert_eq!(partition.light[0].start, at(0));
        assert_eq!(partition.light[0].end, at(270));
    }

    #[test]
    fn single_sample_yields_zero_length_phase() {
        let samples = vec![sample(0, 5.0, 5.0)];
        let partition = classify(&samples, &ClassifierConfig::default());

        assert_eq!(partition.deep.len(), 1);
        assert_eq!(partition.deep[0].start, partition.deep[0].end);
    }

    #[test]
    fn sound_alone_can_mark_awake() {
        let samples = vec![sample(0, 10.0, 70.0), sample(30, 10.0, 70.0)];
        let partition = classify(&samples, &ClassifierConfig::default());
        assert_eq!(partition.awake.len(), 1);
        assert!(partition.deep.is_empty());
    }

    #[test]
    fn boundary_values_fall_into_light() {
        // Exactly at the thresholds: neither awake (needs >) nor deep (needs <).
        let samples = vec![sample(0, 50.0, 60.0), sample(30, 20.0, 30.0)];
        let partition = classify(&samples, &ClassifierConfig::default());
        assert_eq!(partition.light.len(), 1);
        assert!(partition.awake.is_empty());
        assert!(partition.deep.is_empty());
    }

    #[test]
    fn phases_tile_the_sample_span() {
        // Varied buffer cycling through all three kinds.
        let mut samples = Vec::new();
        for i in 0..30i64 {
            let (movement, sound) = match i % 5 {
                0 | 1 => (10.0, 10.0),
                2 => (35.0, 40.0),
                3 => (80.0, 20.0),
                _ => (25.0, 50.0),
            };
            samples.push(sample(i * 30, movement, sound));
        }

        let partition = classify(&samples, &ClassifierConfig::default());
        let ordered = partition.chronological();

        assert!(!ordered.is_empty());
        assert_eq!(ordered[0].start, samples[0].timestamp);
        assert_eq!(
            ordered.last().unwrap().end,
            samples.last().unwrap().timestamp
        );
        for pair in ordered.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "gap or overlap between phases");
        }
    }
}
