//! Core types shared by every stage of the signal pipeline

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// A single candlestick (OHLCV)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time in milliseconds since the epoch
    pub start_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(start_time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            start_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn upper_wick(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_wick(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    fn check(&self, index: usize) -> EngineResult<()> {
        let fields = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(EngineError::Validation(format!(
                    "candle {} has no usable {} value",
                    index, name
                )));
            }
        }
        if self.low > self.open.min(self.close) || self.high < self.open.max(self.close) {
            return Err(EngineError::Validation(format!(
                "candle {} violates low <= open/close <= high",
                index
            )));
        }
        if self.volume < 0.0 {
            return Err(EngineError::Validation(format!(
                "candle {} has negative volume",
                index
            )));
        }
        Ok(())
    }
}

// The `ta` indicators consume anything exposing OHLCV accessors.
impl ta::Open for Candle {
    fn open(&self) -> f64 {
        self.open
    }
}

impl ta::High for Candle {
    fn high(&self) -> f64 {
        self.high
    }
}

impl ta::Low for Candle {
    fn low(&self) -> f64 {
        self.low
    }
}

impl ta::Close for Candle {
    fn close(&self) -> f64 {
        self.close
    }
}

impl ta::Volume for Candle {
    fn volume(&self) -> f64 {
        self.volume
    }
}

/// Check that a candle series is long enough, strictly time-ordered and
/// internally consistent.
///
/// Rolling computations over an unordered series silently produce wrong
/// numbers, so every public entry point runs this first.
pub fn validate_candles(candles: &[Candle], min_len: usize) -> EngineResult<()> {
    if candles.len() < min_len {
        return Err(EngineError::Validation(format!(
            "need at least {} candles, got {}",
            min_len,
            candles.len()
        )));
    }
    for (i, candle) in candles.iter().enumerate() {
        candle.check(i)?;
        if i > 0 && candle.start_time <= candles[i - 1].start_time {
            return Err(EngineError::Validation(format!(
                "candle {} is not strictly after candle {} ({} <= {})",
                i,
                i - 1,
                candle.start_time,
                candles[i - 1].start_time
            )));
        }
    }
    Ok(())
}

/// Trade direction of a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
    Neutral,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
            Direction::Neutral => 0.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
            Direction::Neutral => Direction::Neutral,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
            Direction::Neutral => "NEUTRAL",
        };
        f.write_str(s)
    }
}

/// Bullish / bearish / neutral reading of a single timeframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

impl Trend {
    pub fn agrees_with(self, direction: Direction) -> bool {
        matches!(
            (self, direction),
            (Trend::Bullish, Direction::Long) | (Trend::Bearish, Direction::Short)
        )
    }

    pub fn opposes(self, direction: Direction) -> bool {
        matches!(
            (self, direction),
            (Trend::Bullish, Direction::Short) | (Trend::Bearish, Direction::Long)
        )
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Trend::Bullish => "bullish",
            Trend::Bearish => "bearish",
            Trend::Neutral => "neutral",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Candle;

    const STEP_MS: i64 = 15 * 60 * 1000;

    /// Candles whose close follows `prices`; open is the previous close so
    /// candle color tracks the direction of each step.
    pub fn make_candles(prices: &[f64]) -> Vec<Candle> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let open = if i == 0 { close } else { prices[i - 1] };
                let high = open.max(close) * 1.001;
                let low = open.min(close) * 0.999;
                Candle::new(i as i64 * STEP_MS, open, high, low, close, 100.0 + (i % 7) as f64)
            })
            .collect()
    }

    /// Candles with explicit open/close pairs and a fixed volume
    pub fn make_colored(pairs: &[(f64, f64)]) -> Vec<Candle> {
        pairs
            .iter()
            .enumerate()
            .map(|(i, &(open, close))| {
                let high = open.max(close) + 0.5;
                let low = open.min(close) - 0.5;
                Candle::new(i as i64 * STEP_MS, open, high, low, close, 100.0)
            })
            .collect()
    }

    /// Deterministic pseudo random walk
    pub fn random_walk(len: usize, seed: u64) -> Vec<Candle> {
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let mut price = 100.0;
        let mut prices = Vec::with_capacity(len);
        for _ in 0..len {
            price *= 1.0 + rng.gen_range(-0.02..0.02);
            prices.push(price);
        }
        let mut candles = make_candles(&prices);
        for c in candles.iter_mut() {
            c.volume = rng.gen_range(10.0..1000.0);
        }
        candles
    }
}
