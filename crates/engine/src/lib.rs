//! Signal Engine: feature engineering, outcome labeling and multi-timeframe
//! confluence decisions for crypto candle data
//!
//! Provides:
//! - Feature Engineer with separate training / inference entry points
//! - Forward-simulation Outcome Labeler (TP/SL race)
//! - Classifier wrapper over versioned, externally trained artifacts
//! - Per-timeframe Technical Scorer (composite score, MA crossover,
//!   candle-color run, 10-indicator vote)
//! - Confluence engine with swappable decision policies
//! - Binance public API client for market data

pub mod api;
pub mod classifier;
pub mod config;
pub mod confluence;
pub mod cooldown;
pub mod error;
pub mod features;
pub mod labeler;
pub mod scorer;
pub mod types;

// Re-exports for convenience
pub use api::BinanceClient;
pub use classifier::{
    load_artifact, Classifier, ModelArtifact, ModelStore, Probability, ProbabilityModel,
};
pub use config::{AtrTierTable, SignalConfig, TpSl};
pub use confluence::{
    evaluate, CandleSource, ConfluenceDecision, ConfluenceEngine, ConfluenceGrade, DecisionPolicy,
    MarketView, PolicyKind, TimeframeConfig,
};
pub use cooldown::SignalCooldown;
pub use error::{EngineError, EngineResult};
pub use features::{FeatureConfig, FeatureEngineer, FeatureMatrix, FeatureMode, FeatureRow};
pub use labeler::{Label, LabelerConfig, LabeledMatrix, OutcomeLabeler, TargetMode};
pub use scorer::{ScorerConfig, SignalClass, TechnicalScorer, TimeframeSnapshot};
pub use types::*;
