pub mod classifier;
pub mod config;
pub mod scoring;

pub use classifier::classify;
pub use config::{ClassifierConfig, ScorerConfig};
pub use scoring::{score_session, QualityReport};
