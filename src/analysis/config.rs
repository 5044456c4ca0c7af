/// Tunable thresholds for phase classification.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Movement above this reads as awake
    pub awake_movement: f64,
    /// Sound above this reads as awake
    pub awake_sound: f64,
    /// Movement below this (together with quiet sound) reads as deep sleep
    pub deep_movement: f64,
    /// Sound below this (together with still movement) reads as deep sleep
    pub deep_sound: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            awake_movement: 50.0,
            awake_sound: 60.0,
            deep_movement: 20.0,
            deep_sound: 30.0,
        }
    }
}

/// Weights for the quality score formula.
#[derive(Debug, Clone)]
pub struct ScorerConfig {
    pub weight_movement: f64,
    pub weight_sound: f64,
    /// Penalty applied to the restless-sample ratio
    pub restless_penalty: f64,
    /// Movement above this counts a sample as restless
    pub restless_movement: f64,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            weight_movement: 0.5,
            weight_sound: 0.3,
            restless_penalty: 20.0,
            restless_movement: 40.0,
        }
    }
}
