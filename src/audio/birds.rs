use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rodio::Source;
use std::f32::consts::{PI, TAU};
use std::time::Duration;

use super::SAMPLE_RATE;

/// Chirp shape: 200 ms sweep from 2 kHz up to 4 kHz.
const CHIRP_SECS: f32 = 0.2;
const CHIRP_LOW_HZ: f32 = 2_000.0;
const CHIRP_HIGH_HZ: f32 = 4_000.0;

const MIN_GAP_SECS: f32 = 0.1;
const MAX_GAP_SECS: f32 = 0.4;

/// Probability that a chirp slot actually produces a chirp
const CHIRP_PROBABILITY: f64 = 0.7;

/// Pick chirp start offsets for the whole duration. Slots are separated by
/// random gaps and roughly 70% of them chirp, so the result is irregular but
/// never overlapping.
pub fn schedule_chirps(rng: &mut StdRng, duration_ms: u64) -> Vec<usize> {
    let total_samples = duration_ms as usize * SAMPLE_RATE as usize / 1000;
    let chirp_samples = (CHIRP_SECS * SAMPLE_RATE as f32) as usize;
    let mut starts = Vec::new();
    let mut position = 0usize;

    loop {
        let gap = rng.gen_range(MIN_GAP_SECS..MAX_GAP_SECS);
        position += (gap * SAMPLE_RATE as f32) as usize;
        if position >= total_samples {
            break;
        }
        if rng.gen_bool(CHIRP_PROBABILITY) {
            starts.push(position);
            position += chirp_samples;
        }
    }

    starts
}

/// Intermittent upward-sweeping chirps over silence.
pub struct Birds {
    schedule: Vec<usize>,
    next_chirp: usize,
    position: usize,
    total_samples: usize,
}

impl Birds {
    pub fn new(duration_ms: u64) -> Self {
        Self::with_rng(StdRng::from_entropy(), duration_ms)
    }

    /// Deterministic variant for tests.
    pub fn with_seed(seed: u64, duration_ms: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), duration_ms)
    }

    fn with_rng(mut rng: StdRng, duration_ms: u64) -> Self {
        Self {
            schedule: schedule_chirps(&mut rng, duration_ms),
            next_chirp: 0,
            position: 0,
            total_samples: duration_ms as usize * SAMPLE_RATE as usize / 1000,
        }
    }
}

impl Iterator for Birds {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.total_samples {
            return None;
        }

        let chirp_samples = (CHIRP_SECS * SAMPLE_RATE as f32) as usize;

        while self.next_chirp < self.schedule.len()
            && self.schedule[self.next_chirp] + chirp_samples <= self.position
        {
            self.next_chirp += 1;
        }

        let value = match self.schedule.get(self.next_chirp) {
            Some(&start) if start <= self.position => {
                let t = (self.position - start) as f32 / SAMPLE_RATE as f32;
                // Integrated phase of a linear 2k -> 4k sweep
                let sweep_rate = (CHIRP_HIGH_HZ - CHIRP_LOW_HZ) / CHIRP_SECS;
                let phase = TAU * (CHIRP_LOW_HZ * t + 0.5 * sweep_rate * t * t);
                let window = (PI * t / CHIRP_SECS).sin();
                phase.sin() * window
            }
            _ => 0.0,
        };

        self.position += 1;
        Some(value * 0.25)
    }
}

impl Source for Birds {
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
