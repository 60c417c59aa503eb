//! Multi-timeframe confluence engine
//!
//! [`ConfluenceEngine::decide`] fetches candles for the primary and higher
//! timeframes, scores each one, asks the classifier for a probability on the
//! primary timeframe and hands the resulting [`MarketView`] to a
//! [`DecisionPolicy`].
//!
//! Only the primary timeframe is required. A higher timeframe that cannot be
//! fetched or scored is recorded as absent, costs confidence and adds a
//! warning; the decision still goes ahead.

pub mod decision;
pub mod levels;
pub mod policy;

use std::iter;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::classifier::{Probability, ProbabilityModel};
use crate::error::{EngineError, EngineResult};
use crate::features::FeatureEngineer;
use crate::scorer::{TechnicalScorer, TimeframeSnapshot};
use crate::types::Candle;

pub use decision::{advisory_warnings, ConfluenceDecision, ConfluenceGrade};
pub use levels::{LevelRule, PriceLevels};
pub use policy::{
    CandleColorPolicy, CrossoverVotePolicy, DecisionPolicy, PolicyKind, ScoreGatePolicy,
    StrictAlignmentPolicy, Verdict,
};

/// Confidence removed for each higher timeframe that is absent
pub const MISSING_TIMEFRAME_PENALTY: u8 = 10;

/// Timeframes to analyze. `higher` runs from intermediate to main, so the
/// last entry is the main trend timeframe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeframeConfig {
    pub primary: String,
    pub higher: Vec<String>,
    pub candle_limit: u32,
}

/// Candle data provider
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Closed candles, oldest first
    async fn get_candles(&self, symbol: &str, timeframe: &str, limit: u32) -> anyhow::Result<Vec<Candle>>;

    async fn get_current_price(&self, symbol: &str) -> anyhow::Result<f64>;
}

#[derive(Debug, Clone)]
pub struct HigherTimeframe {
    pub timeframe: String,
    /// `None` when the timeframe could not be fetched or scored
    pub snapshot: Option<TimeframeSnapshot>,
}

/// Everything a policy sees for one symbol
#[derive(Debug, Clone)]
pub struct MarketView {
    pub symbol: String,
    pub primary: TimeframeSnapshot,
    pub higher: Vec<HigherTimeframe>,
    pub probability: Probability,
}

impl MarketView {
    /// Main trend timeframe (last configured higher timeframe)
    pub fn main(&self) -> Option<&TimeframeSnapshot> {
        self.higher.last().and_then(|h| h.snapshot.as_ref())
    }

    pub fn main_timeframe(&self) -> Option<&str> {
        self.higher.last().map(|h| h.timeframe.as_str())
    }

    /// The higher timeframe just below the main one
    pub fn intermediate(&self) -> Option<&TimeframeSnapshot> {
        let n = self.higher.len();
        if n < 2 {
            return None;
        }
        self.higher[n - 2].snapshot.as_ref()
    }

    pub fn intermediate_timeframe(&self) -> Option<&str> {
        let n = self.higher.len();
        if n < 2 {
            return None;
        }
        Some(self.higher[n - 2].timeframe.as_str())
    }

    /// Primary then every present higher timeframe
    pub fn snapshots(&self) -> impl Iterator<Item = &TimeframeSnapshot> {
        iter::once(&self.primary).chain(self.higher.iter().filter_map(|h| h.snapshot.as_ref()))
    }

    /// Configured timeframes, present or not
    pub fn timeframe_count(&self) -> usize {
        1 + self.higher.len()
    }

    pub fn missing_timeframes(&self) -> Vec<String> {
        self.higher
            .iter()
            .filter(|h| h.snapshot.is_none())
            .map(|h| h.timeframe.clone())
            .collect()
    }
}

/// Apply a policy to a view. Pure: no I/O, same view gives the same decision.
pub fn evaluate(view: &MarketView, policy: &dyn DecisionPolicy) -> ConfluenceDecision {
    let verdict = policy.evaluate(view);
    let missing = view.missing_timeframes();

    let mut warnings = advisory_warnings(view);
    for tf in &missing {
        warnings.push(format!("{} data unavailable, decided without it", tf));
    }

    let penalty = MISSING_TIMEFRAME_PENALTY.saturating_mul(missing.len().min(u8::MAX as usize) as u8);
    let confidence = verdict.confidence.min(100).saturating_sub(penalty);

    let entry = view.primary.last_close;
    let levels = verdict
        .levels
        .as_ref()
        .filter(|_| verdict.should_trade)
        .and_then(|rule| rule.levels(verdict.direction, entry, view.primary.range_proxy));

    ConfluenceDecision {
        symbol: view.symbol.clone(),
        policy: policy.name().to_string(),
        should_trade: verdict.should_trade,
        direction: verdict.direction,
        confidence,
        reason: verdict.reason,
        warnings,
        entry_price: entry,
        stop_price: levels.as_ref().map(|l| l.stop),
        target_prices: levels.map(|l| l.targets).unwrap_or_default(),
        probability: view.probability,
        grade: verdict.grade,
        timeframes: view.snapshots().map(|s| s.timeframe.clone()).collect(),
        missing_timeframes: missing,
    }
}

/// Fetches, scores and decides for one symbol at a time.
///
/// Holds no per-call state, so one engine can serve many concurrent calls.
pub struct ConfluenceEngine {
    source: Arc<dyn CandleSource>,
    scorer: TechnicalScorer,
    features: FeatureEngineer,
    model: Option<Arc<dyn ProbabilityModel>>,
}

impl ConfluenceEngine {
    pub fn new(source: Arc<dyn CandleSource>, scorer: TechnicalScorer) -> Self {
        Self {
            source,
            scorer,
            features: FeatureEngineer::default(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: Arc<dyn ProbabilityModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_features(mut self, features: FeatureEngineer) -> Self {
        self.features = features;
        self
    }

    pub fn source(&self) -> &Arc<dyn CandleSource> {
        &self.source
    }

    pub async fn current_price(&self, symbol: &str) -> anyhow::Result<f64> {
        self.source.get_current_price(symbol).await
    }

    /// Decide for `symbol`.
    ///
    /// Errors only when the primary timeframe cannot be fetched
    /// ([`EngineError::Fetch`]) or fails validation
    /// ([`EngineError::Validation`]).
    pub async fn decide(
        &self,
        symbol: &str,
        timeframes: &TimeframeConfig,
        policy: &PolicyKind,
    ) -> EngineResult<ConfluenceDecision> {
        let candles = self
            .source
            .get_candles(symbol, &timeframes.primary, timeframes.candle_limit)
            .await
            .map_err(|e| EngineError::Fetch {
                symbol: symbol.to_string(),
                timeframe: timeframes.primary.clone(),
                reason: e.to_string(),
            })?;
        let primary = self.scorer.score(&timeframes.primary, &candles)?;
        let probability = self.probability(symbol, &candles);

        let mut higher = Vec::with_capacity(timeframes.higher.len());
        for tf in &timeframes.higher {
            let snapshot = match self.higher_snapshot(symbol, tf, timeframes.candle_limit).await {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    warn!(symbol, timeframe = %tf, error = %e, "Higher timeframe unavailable");
                    None
                }
            };
            higher.push(HigherTimeframe {
                timeframe: tf.clone(),
                snapshot,
            });
        }

        let view = MarketView {
            symbol: symbol.to_string(),
            primary,
            higher,
            probability,
        };
        let decision = evaluate(&view, policy.build().as_ref());

        info!(
            symbol,
            policy = %decision.policy,
            should_trade = decision.should_trade,
            direction = %decision.direction,
            confidence = decision.confidence,
            reason = %decision.reason,
            "Confluence decision"
        );
        Ok(decision)
    }

    async fn higher_snapshot(&self, symbol: &str, timeframe: &str, limit: u32) -> EngineResult<TimeframeSnapshot> {
        let partial = |reason: String| EngineError::PartialData {
            timeframe: timeframe.to_string(),
            reason,
        };
        let candles = self
            .source
            .get_candles(symbol, timeframe, limit)
            .await
            .map_err(|e| partial(e.to_string()))?;
        self.scorer
            .score(timeframe, &candles)
            .map_err(|e| partial(e.to_string()))
    }

    /// Classifier probability on the latest primary candle
    fn probability(&self, symbol: &str, candles: &[Candle]) -> Probability {
        let Some(model) = &self.model else {
            return Probability::Unavailable;
        };
        match self.features.compute_for_inference(candles) {
            Ok(matrix) => {
                let probability = model.probability(&matrix.latest_row());
                debug!(symbol, ?probability, "Classifier probability");
                probability
            }
            Err(e) => {
                warn!(symbol, error = %e, "Features unavailable for classifier");
                Probability::Unavailable
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::test_support::{snapshot, view};
    use super::*;
    use crate::scorer::crossover::MaCrossState;
    use crate::scorer::votes::VoteTally;
    use crate::types::test_support::random_walk;
    use crate::types::{Direction, Trend};

    fn bullish(timeframe: &str) -> TimeframeSnapshot {
        let mut s = snapshot(timeframe);
        s.trend_direction = Trend::Bullish;
        s.coarse_trend = Trend::Bullish;
        s
    }

    #[test]
    fn test_fresh_cross_with_seven_votes_end_to_end() {
        let mut primary = snapshot("15m");
        primary.ma_cross_state = Some(MaCrossState::Long);
        primary.vote_tally = VoteTally::counts(7, 2, 1);
        let close = primary.last_close;

        let v = view(primary, vec![("1h", Some(bullish("1h"))), ("4h", Some(bullish("4h")))]);
        let d = evaluate(&v, &CrossoverVotePolicy::default());

        assert!(d.should_trade);
        assert_eq!(d.direction, Direction::Long);
        assert_eq!(d.confidence, 70);
        assert!(d.reason.contains("7/10"));
        assert_eq!(d.entry_price, close);
        assert!((d.stop_price.unwrap() - close * 0.98).abs() < 1e-9);
        assert_eq!(d.target_prices.len(), 1);
        assert!((d.target_prices[0] - close * 1.04).abs() < 1e-9);
        assert!(d.missing_timeframes.is_empty());
        assert_eq!(d.timeframes, vec!["15m", "1h", "4h"]);
    }

    #[test]
    fn test_missing_higher_timeframe_costs_confidence() {
        let mut primary = snapshot("15m");
        primary.ma_cross_state = Some(MaCrossState::Long);
        primary.vote_tally = VoteTally::counts(8, 1, 1);

        let v = view(primary, vec![("1h", Some(bullish("1h"))), ("4h", None)]);
        let d = evaluate(&v, &CrossoverVotePolicy::default());

        assert!(d.should_trade);
        assert_eq!(d.confidence, 70);
        assert_eq!(d.missing_timeframes, vec!["4h"]);
        assert!(d.warnings.iter().any(|w| w.starts_with("4h data unavailable")));
    }

    #[test]
    fn test_no_trade_has_no_levels() {
        let mut primary = snapshot("15m");
        primary.ma_cross_state = Some(MaCrossState::LongTrend);
        primary.vote_tally = VoteTally::counts(6, 2, 2);

        let d = evaluate(&view(primary, vec![]), &CrossoverVotePolicy::default());
        assert!(!d.should_trade);
        assert_eq!(d.stop_price, None);
        assert!(d.target_prices.is_empty());
    }

    #[test]
    fn test_disagreeing_timeframes_warn_without_changing_outcome() {
        let mut primary = snapshot("15m");
        primary.ma_cross_state = Some(MaCrossState::Long);
        primary.vote_tally = VoteTally::counts(7, 2, 1);
        primary.trend_direction = Trend::Bullish;
        let mut bearish = snapshot("4h");
        bearish.trend_direction = Trend::Bearish;
        bearish.coarse_trend = Trend::Bearish;

        let d = evaluate(&view(primary, vec![("4h", Some(bearish))]), &CrossoverVotePolicy::default());
        assert!(d.should_trade);
        assert!(d.warnings.iter().any(|w| w.starts_with("Timeframes disagree")));
    }

    struct MemorySource {
        candles: HashMap<String, Vec<Candle>>,
    }

    #[async_trait]
    impl CandleSource for MemorySource {
        async fn get_candles(&self, _symbol: &str, timeframe: &str, _limit: u32) -> anyhow::Result<Vec<Candle>> {
            match self.candles.get(timeframe) {
                Some(c) => Ok(c.clone()),
                None => anyhow::bail!("no data for {}", timeframe),
            }
        }

        async fn get_current_price(&self, _symbol: &str) -> anyhow::Result<f64> {
            Ok(100.0)
        }
    }

    fn engine(timeframes: &[(&str, usize)]) -> ConfluenceEngine {
        let candles = timeframes
            .iter()
            .enumerate()
            .map(|(i, (tf, len))| (tf.to_string(), random_walk(*len, 40 + i as u64)))
            .collect();
        ConfluenceEngine::new(Arc::new(MemorySource { candles }), TechnicalScorer::default())
    }

    fn config() -> TimeframeConfig {
        TimeframeConfig {
            primary: "15m".to_string(),
            higher: vec!["1h".to_string(), "4h".to_string()],
            candle_limit: 200,
        }
    }

    #[tokio::test]
    async fn test_decide_degrades_missing_higher_timeframe() {
        let engine = engine(&[("15m", 200), ("1h", 200)]);
        let d = engine
            .decide("ETHUSDT", &config(), &PolicyKind::default())
            .await
            .unwrap();
        assert_eq!(d.symbol, "ETHUSDT");
        assert_eq!(d.timeframes, vec!["15m", "1h"]);
        assert_eq!(d.missing_timeframes, vec!["4h"]);
        assert!(d.warnings.iter().any(|w| w.contains("4h")));
        assert_eq!(d.probability, Probability::Unavailable);
    }

    #[tokio::test]
    async fn test_decide_short_higher_timeframe_is_partial_not_fatal() {
        let engine = engine(&[("15m", 200), ("1h", 200), ("4h", 20)]);
        let d = engine
            .decide("ETHUSDT", &config(), &PolicyKind::default())
            .await
            .unwrap();
        assert_eq!(d.missing_timeframes, vec!["4h"]);
    }

    #[tokio::test]
    async fn test_decide_primary_fetch_failure_is_fatal() {
        let engine = engine(&[("1h", 200), ("4h", 200)]);
        let err = engine
            .decide("ETHUSDT", &config(), &PolicyKind::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Fetch { .. }));
    }

    #[tokio::test]
    async fn test_decide_short_primary_is_validation_error() {
        let engine = engine(&[("15m", 30), ("1h", 200), ("4h", 200)]);
        let err = engine
            .decide("ETHUSDT", &config(), &PolicyKind::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}
