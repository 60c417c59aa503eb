//! Per-timeframe technical scoring
//!
//! [`TechnicalScorer::score`] turns one candle window into a
//! [`TimeframeSnapshot`]: weighted composite score and signal class, MA
//! crossover state, candle-color run and the ten-indicator vote tally.

pub mod candles;
pub mod crossover;
pub mod indicators;
pub mod subscores;
pub mod votes;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EngineResult;
use crate::types::{validate_candles, Candle, Direction, Trend};
use candles::{color_run, detect_patterns, CandleColorRun, Pattern};
use crossover::{coarse_trend, MaCrossState};
use subscores::SubScore;
use votes::VoteTally;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerConfig {
    /// Minimum candles per timeframe
    pub min_candles: usize,
    pub fast_ma: usize,
    pub slow_ma: usize,
    pub long_ma: usize,
    /// Window inspected for the candle-color run
    pub candle_lookback: usize,
    /// Candles in the high-low range proxy
    pub range_window: usize,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            min_candles: 50,
            fast_ma: 7,
            slow_ma: 25,
            long_ma: 99,
            candle_lookback: 6,
            range_window: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalClass {
    StrongBuy,
    Buy,
    Neutral,
    Sell,
    StrongSell,
}

impl SignalClass {
    /// Thresholds are asymmetric around 50: buys need 55, sells 45.
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            SignalClass::StrongBuy
        } else if score >= 55.0 {
            SignalClass::Buy
        } else if score <= 30.0 {
            SignalClass::StrongSell
        } else if score <= 45.0 {
            SignalClass::Sell
        } else {
            SignalClass::Neutral
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            SignalClass::StrongBuy | SignalClass::Buy => Direction::Long,
            SignalClass::StrongSell | SignalClass::Sell => Direction::Short,
            SignalClass::Neutral => Direction::Neutral,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub trend: SubScore,
    pub momentum: SubScore,
    pub volatility: SubScore,
    pub volume: SubScore,
    pub patterns: Vec<Pattern>,
    pub pattern_score: f64,
}

/// Latest values of the indicators the decision policies read.
///
/// Warming-up indicators are NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndicatorReadings {
    pub rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
    pub atr: f64,
    pub atr_percent: f64,
    pub volume_ratio: f64,
    pub bb_upper: f64,
    pub bb_middle: f64,
    pub bb_lower: f64,
    pub fast_ma: f64,
    pub slow_ma: f64,
    pub stoch_k: f64,
    pub stoch_d: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TimeframeSnapshot {
    pub timeframe: String,
    pub composite_score: f64,
    pub signal_class: SignalClass,
    pub trend_direction: Trend,
    /// `None` until both averages have a full window
    pub ma_cross_state: Option<MaCrossState>,
    pub coarse_trend: Trend,
    pub candle_color_run: CandleColorRun,
    pub vote_tally: VoteTally,
    pub breakdown: ScoreBreakdown,
    pub indicators: IndicatorReadings,
    pub last_close: f64,
    /// Mean per-candle high-low range over the recent window
    pub range_proxy: f64,
}

impl TimeframeSnapshot {
    /// Bias used when this timeframe confirms another. Either the trend
    /// label or the fast/slow MA side can make it bullish; bullish is
    /// checked first.
    pub fn bias(&self) -> Trend {
        if self.trend_direction == Trend::Bullish || self.coarse_trend == Trend::Bullish {
            Trend::Bullish
        } else if self.trend_direction == Trend::Bearish || self.coarse_trend == Trend::Bearish {
            Trend::Bearish
        } else {
            Trend::Neutral
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TechnicalScorer {
    config: ScorerConfig,
}

impl TechnicalScorer {
    pub fn new(config: ScorerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    pub fn score(&self, timeframe: &str, candles: &[Candle]) -> EngineResult<TimeframeSnapshot> {
        // crossover state reads the previous candle
        validate_candles(candles, self.config.min_candles.max(2))?;

        let series = indicators::compute(candles, &self.config)?;
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let i = closes.len() - 1;
        let last_close = closes[i];

        let trend = subscores::trend(&closes, &series);
        let momentum = subscores::momentum(&closes, &series);
        let volatility = subscores::volatility(&closes, &series);
        let volume = subscores::volume(&closes, &series);
        let patterns = detect_patterns(candles);
        let pattern_score = subscores::pattern_score(&patterns);

        let composite_score = subscores::composite(
            trend.score,
            momentum.score,
            volatility.score,
            volume.score,
            pattern_score,
        );
        let signal_class = SignalClass::from_score(composite_score);

        let trend_direction = match trend.state {
            "bullish" => Trend::Bullish,
            "bearish" => Trend::Bearish,
            _ => Trend::Neutral,
        };

        let (fast, slow) = (series.fast_ma[i], series.slow_ma[i]);
        let ma_cross_state =
            MaCrossState::classify(series.fast_ma[i - 1], series.slow_ma[i - 1], fast, slow);

        let indicators = IndicatorReadings {
            rsi: series.rsi[i],
            macd: series.macd[i],
            macd_signal: series.macd_signal[i],
            adx: series.adx[i],
            plus_di: series.plus_di[i],
            minus_di: series.minus_di[i],
            atr: series.atr[i],
            atr_percent: if last_close > 0.0 {
                series.atr[i] / last_close * 100.0
            } else {
                f64::NAN
            },
            volume_ratio: series.volume_ratio[i],
            bb_upper: series.bb_upper[i],
            bb_middle: series.bb_middle[i],
            bb_lower: series.bb_lower[i],
            fast_ma: fast,
            slow_ma: slow,
            stoch_k: series.stoch_k[i],
            stoch_d: series.stoch_d[i],
        };

        let snapshot = TimeframeSnapshot {
            timeframe: timeframe.to_string(),
            composite_score,
            signal_class,
            trend_direction,
            ma_cross_state,
            coarse_trend: coarse_trend(fast, slow),
            candle_color_run: color_run(candles, self.config.candle_lookback),
            vote_tally: votes::tally(&closes, &series),
            breakdown: ScoreBreakdown {
                trend,
                momentum,
                volatility,
                volume,
                patterns,
                pattern_score,
            },
            indicators,
            last_close,
            range_proxy: range_proxy(candles, self.config.range_window),
        };

        debug!(
            timeframe,
            bars = candles.len(),
            score = snapshot.composite_score,
            class = ?snapshot.signal_class,
            long_votes = snapshot.vote_tally.long,
            short_votes = snapshot.vote_tally.short,
            "Scored timeframe"
        );
        Ok(snapshot)
    }
}

/// `(max high - min low) / window` over the last `window` candles; 2% of the
/// close when that range is degenerate.
pub fn range_proxy(candles: &[Candle], window: usize) -> f64 {
    let Some(last) = candles.last() else {
        return 0.0;
    };
    let recent = &candles[candles.len().saturating_sub(window)..];
    let high = recent.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let low = recent.iter().map(|c| c.low).fold(f64::MAX, f64::min);
    let proxy = (high - low) / window.max(1) as f64;
    if proxy > 0.0 && proxy.is_finite() {
        proxy
    } else {
        last.close * 0.02
    }
}
