//! Fast/slow moving-average crossover state

use serde::{Deserialize, Serialize};

use crate::types::{Direction, Trend};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaCrossState {
    /// Fast crossed above slow on this candle
    Long,
    /// Fast crossed below slow on this candle
    Short,
    LongTrend,
    ShortTrend,
}

impl MaCrossState {
    pub fn is_fresh(self) -> bool {
        matches!(self, MaCrossState::Long | MaCrossState::Short)
    }

    pub fn label(self) -> &'static str {
        match self {
            MaCrossState::Long => "LONG",
            MaCrossState::Short => "SHORT",
            MaCrossState::LongTrend => "LONG_TREND",
            MaCrossState::ShortTrend => "SHORT_TREND",
        }
    }

    pub fn direction(self) -> Direction {
        match self {
            MaCrossState::Long | MaCrossState::LongTrend => Direction::Long,
            MaCrossState::Short | MaCrossState::ShortTrend => Direction::Short,
        }
    }

    /// State at one candle given fast/slow at it and the candle before.
    ///
    /// A fresh cross needs the previous pair on the other side (or touching)
    /// and the current pair strictly across. `None` while either average is
    /// still warming up.
    pub fn classify(prev_fast: f64, prev_slow: f64, fast: f64, slow: f64) -> Option<Self> {
        if fast.is_nan() || slow.is_nan() {
            return None;
        }
        if !(prev_fast.is_nan() || prev_slow.is_nan()) {
            if prev_fast <= prev_slow && fast > slow {
                return Some(MaCrossState::Long);
            }
            if prev_fast >= prev_slow && fast < slow {
                return Some(MaCrossState::Short);
            }
        }
        Some(if fast > slow {
            MaCrossState::LongTrend
        } else {
            MaCrossState::ShortTrend
        })
    }
}

/// Crossover state at every candle
pub fn cross_states(fast: &[f64], slow: &[f64]) -> Vec<Option<MaCrossState>> {
    (0..fast.len().min(slow.len()))
        .map(|i| {
            let (pf, ps) = if i == 0 {
                (f64::NAN, f64::NAN)
            } else {
                (fast[i - 1], slow[i - 1])
            };
            MaCrossState::classify(pf, ps, fast[i], slow[i])
        })
        .collect()
}

/// Coarse bias of a timeframe from the fast MA's side of the slow MA
pub fn coarse_trend(fast: f64, slow: f64) -> Trend {
    if fast > slow {
        Trend::Bullish
    } else if fast < slow {
        Trend::Bearish
    } else {
        Trend::Neutral
    }
}
