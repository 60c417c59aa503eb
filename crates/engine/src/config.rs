//! Tunables for the signal pipeline
//!
//! Defaults mirror the values the system was calibrated with. `from_env`
//! overlays `SIGNAL_*` environment variables (the binary loads `.env` first).

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

use crate::confluence::TimeframeConfig;

/// A take-profit / stop-loss pair, both in percent of entry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TpSl {
    pub tp_pct: f64,
    pub sl_pct: f64,
}

impl TpSl {
    pub const fn new(tp_pct: f64, sl_pct: f64) -> Self {
        Self { tp_pct, sl_pct }
    }
}

/// Three-tier tp/sl table bucketed by ATR% (low / medium / high volatility)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtrTierTable {
    /// ATR% below this is the low-volatility tier
    pub low_threshold: f64,
    /// ATR% at or above this is the high-volatility tier
    pub high_threshold: f64,
    pub low: TpSl,
    pub medium: TpSl,
    pub high: TpSl,
}

impl Default for AtrTierTable {
    fn default() -> Self {
        Self {
            low_threshold: 0.5,
            high_threshold: 1.5,
            low: TpSl::new(0.25, 0.15),
            medium: TpSl::new(0.35, 0.20),
            high: TpSl::new(0.50, 0.25),
        }
    }
}

impl AtrTierTable {
    /// Pick the tier for an ATR% reading.
    ///
    /// A missing reading (NaN, warm-up rows) falls through both comparisons
    /// and lands in the high tier.
    pub fn for_atr_percent(&self, atr_percent: f64) -> TpSl {
        if atr_percent < self.low_threshold {
            self.low
        } else if atr_percent < self.high_threshold {
            self.medium
        } else {
            self.high
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    /// Minimum classifier probability for gated policies
    pub probability_threshold: f64,
    /// Minimum composite score for the score-gate policy
    pub technical_score_min: f64,
    pub atr_tiers: AtrTierTable,
    /// Candles examined by the outcome labeler
    pub lookahead: usize,
    /// Candles fetched per timeframe
    pub candle_limit: u32,
    pub primary_timeframe: String,
    pub higher_timeframes: Vec<String>,
    /// Minutes before the same symbol may signal again
    pub cooldown_minutes: i64,
    /// Symbols analyzed concurrently per scan batch
    pub batch_size: usize,
    /// Pause between scan batches
    pub batch_delay_ms: u64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            probability_threshold: 0.90,
            technical_score_min: 65.0,
            atr_tiers: AtrTierTable::default(),
            lookahead: 50,
            candle_limit: 200,
            primary_timeframe: "15m".to_string(),
            higher_timeframes: vec!["1h".to_string(), "4h".to_string()],
            cooldown_minutes: 60,
            batch_size: 10,
            batch_delay_ms: 500,
        }
    }
}

impl SignalConfig {
    /// Defaults overlaid with any `SIGNAL_*` environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        overlay(&mut config.probability_threshold, "SIGNAL_PROBABILITY_THRESHOLD");
        overlay(&mut config.technical_score_min, "SIGNAL_TECHNICAL_SCORE_MIN");
        overlay(&mut config.atr_tiers.low.tp_pct, "SIGNAL_TP_LOW_VOL");
        overlay(&mut config.atr_tiers.low.sl_pct, "SIGNAL_SL_LOW_VOL");
        overlay(&mut config.atr_tiers.medium.tp_pct, "SIGNAL_TP_MED_VOL");
        overlay(&mut config.atr_tiers.medium.sl_pct, "SIGNAL_SL_MED_VOL");
        overlay(&mut config.atr_tiers.high.tp_pct, "SIGNAL_TP_HIGH_VOL");
        overlay(&mut config.atr_tiers.high.sl_pct, "SIGNAL_SL_HIGH_VOL");
        overlay(&mut config.lookahead, "SIGNAL_LOOKAHEAD_CANDLES");
        overlay(&mut config.candle_limit, "SIGNAL_CANDLE_LIMIT");
        overlay(&mut config.primary_timeframe, "SIGNAL_PRIMARY_TIMEFRAME");
        overlay(&mut config.cooldown_minutes, "SIGNAL_COOLDOWN_MINUTES");
        overlay(&mut config.batch_size, "SIGNAL_BATCH_SIZE");
        overlay(&mut config.batch_delay_ms, "SIGNAL_BATCH_DELAY_MS");

        if let Ok(raw) = std::env::var("SIGNAL_HIGHER_TIMEFRAMES") {
            config.higher_timeframes = parse_list(&raw);
        }

        config
    }

    pub fn timeframes(&self) -> TimeframeConfig {
        TimeframeConfig {
            primary: self.primary_timeframe.clone(),
            higher: self.higher_timeframes.clone(),
            candle_limit: self.candle_limit,
        }
    }
}

fn overlay<T: FromStr>(slot: &mut T, key: &str) {
    let Ok(raw) = std::env::var(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => warn!(key, value = %raw, "Ignoring unparsable config value"),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atr_tiers_bucket_boundaries() {
        let tiers = AtrTierTable::default();
        assert_eq!(tiers.for_atr_percent(0.2), tiers.low);
        assert_eq!(tiers.for_atr_percent(0.5), tiers.medium);
        assert_eq!(tiers.for_atr_percent(1.49), tiers.medium);
        assert_eq!(tiers.for_atr_percent(1.5), tiers.high);
    }

    #[test]
    fn test_missing_atr_falls_into_high_tier() {
        let tiers = AtrTierTable::default();
        assert_eq!(tiers.for_atr_percent(f64::NAN), tiers.high);
    }

    #[test]
    fn test_parse_list_trims_and_skips_empty() {
        assert_eq!(parse_list(" 1h, 4h ,,1d"), vec!["1h", "4h", "1d"]);
    }

    #[test]
    fn test_default_timeframes() {
        let tf = SignalConfig::default().timeframes();
        assert_eq!(tf.primary, "15m");
        assert_eq!(tf.higher, vec!["1h", "4h"]);
        assert_eq!(tf.candle_limit, 200);
    }
}
