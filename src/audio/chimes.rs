use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rodio::Source;
use std::f32::consts::TAU;
use std::time::Duration;

use super::SAMPLE_RATE;

/// Five-tone pentatonic set the chimes pick from: C5 D5 E5 G5 A5.
const TONE_HZ: [f32; 5] = [523.25, 587.33, 659.25, 783.99, 880.00];

/// Each strike rings out over a 2 s exponential decay.
const DECAY_SECS: f32 = 2.0;
const MIN_GAP_SECS: f32 = 0.5;
const MAX_GAP_SECS: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Strike {
    /// Sample offset at which the strike begins
    pub start: usize,
    pub freq: f32,
}

/// Lay out strike times and tones for the whole duration up front, so the
/// per-sample path only mixes active strikes.
pub fn schedule_strikes(rng: &mut StdRng, duration_ms: u64) -> Vec<Strike> {
    let total_samples = duration_ms as usize * SAMPLE_RATE as usize / 1000;
    let mut strikes = Vec::new();
    let mut position = 0usize;

    while position < total_samples {
        let freq = TONE_HZ[rng.gen_range(0..TONE_HZ.len())];
        strikes.push(Strike {
            start: position,
            freq,
        });
        let gap = rng.gen_range(MIN_GAP_SECS..MAX_GAP_SECS);
        position += (gap * SAMPLE_RATE as f32) as usize;
    }

    strikes
}

/// Random chime strikes with overlapping decays.
pub struct Chimes {
    schedule: Vec<Strike>,
    next_strike: usize,
    active: Vec<Strike>,
    position: usize,
    total_samples: usize,
}

impl Chimes {
    pub fn new(duration_ms: u64) -> Self {
        Self::with_rng(StdRng::from_entropy(), duration_ms)
    }

    /// Deterministic variant for tests.
    pub fn with_seed(seed: u64, duration_ms: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), duration_ms)
    }

    fn with_rng(mut rng: StdRng, duration_ms: u64) -> Self {
        Self {
            schedule: schedule_strikes(&mut rng, duration_ms),
            next_strike: 0,
            active: Vec::new(),
            position: 0,
            total_samples: duration_ms as usize * SAMPLE_RATE as usize / 1000,
        }
    }
}

impl Iterator for Chimes {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.total_samples {
            return None;
        }

        let decay_samples = (DECAY_SECS * SAMPLE_RATE as f32) as usize;

        while self.next_strike < self.schedule.len()
            && self.schedule[self.next_strike].start <= self.position
        {
            self.active.push(self.schedule[self.next_strike]);
            self.next_strike += 1;
        }
        let position = self.position;
        self.active
            .retain(|strike| position - strike.start < decay_samples);

        let mut value = 0.0f32;
        for strike in &self.active {
            let age = (self.position - strike.start) as f32 / SAMPLE_RATE as f32;
            value += (TAU * strike.freq * age).sin() * (-1.5 * age).exp();
        }

        self.position += 1;
        Some(value * 0.2)
    }
}

impl Source for Chimes {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_millis(
            (self.total_samples * 1000 / SAMPLE_RATE as usize) as u64,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strike_gaps_stay_within_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let strikes = schedule_strikes(&mut rng, 10_000);

        assert!(!strikes.is_empty());
        let min_gap = (MIN_GAP_SECS * SAMPLE_RATE as f32) as usize;
        let max_gap = (MAX_GAP_SECS * SAMPLE_RATE as f32) as usize;
        for pair in strikes.windows(2) {
            let gap = pair[1].start - pair[0].start;
            assert!(gap >= min_gap && gap <= max_gap, "gap {gap} out of range");
        }
    }

    #[test]
    fn strikes_only_use_the_tone_set() {
        let mut rng = StdRng::seed_from_u64(42);
        for strike in schedule_strikes(&mut rng, 30_000) {
            assert!(TONE_HZ.contains(&strike.freq));
        }
    }

    #[test]
    fn same_seed_gives_same_schedule() {
        let a = schedule_strikes(&mut StdRng::seed_from_u64(9), 5_000);
        let b = schedule_strikes(&mut StdRng::seed_from_u64(9), 5_000);
        assert_eq!(a, b);
    }

    #[test]
    fn output_is_finite_and_audible() {
        let samples: Vec<f32> = Chimes::with_seed(3, 3_000).collect();
        assert_eq!(samples.len(), 3 * SAMPLE_RATE as usize);
        assert!(samples.iter().any(|s| s.abs() > 0.01));
    }
}
