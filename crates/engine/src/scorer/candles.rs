//! Candle-color runs and classic reversal patterns

use serde::{Deserialize, Serialize};

use crate::types::{Candle, Direction};

/// A run this long counts as a change of color trend
pub const CONFIRMING_RUN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandleColor {
    Green,
    Red,
    /// close == open
    Flat,
}

impl CandleColor {
    pub fn of(candle: &Candle) -> Self {
        if candle.is_bullish() {
            CandleColor::Green
        } else if candle.is_bearish() {
            CandleColor::Red
        } else {
            CandleColor::Flat
        }
    }

    fn opposite(self) -> Option<Self> {
        match self {
            CandleColor::Green => Some(CandleColor::Red),
            CandleColor::Red => Some(CandleColor::Green),
            CandleColor::Flat => None,
        }
    }

    fn glyph(self) -> char {
        match self {
            CandleColor::Green => 'G',
            CandleColor::Red => 'R',
            CandleColor::Flat => '-',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// At least three same-colored candles after an opposite one
    ConfirmedReversal,
    /// Three or more, but the whole window has one color
    Continuation,
    /// One or two same-colored candles so far
    Pending,
    NoSignal,
}

/// Consecutive same-colored candles ending at the latest candle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandleColorRun {
    pub color: CandleColor,
    pub length: usize,
    pub state: RunState,
    /// Window rendered oldest to newest, e.g. `RRGGG`
    pub pattern: String,
}

impl CandleColorRun {
    pub fn confirmed(&self) -> bool {
        self.state == RunState::ConfirmedReversal
    }

    /// Direction implied by the run color
    pub fn direction(&self) -> Direction {
        match self.color {
            CandleColor::Green if self.length > 0 => Direction::Long,
            CandleColor::Red if self.length > 0 => Direction::Short,
            _ => Direction::Neutral,
        }
    }
}

/// Inspect the last `lookback` candles
pub fn color_run(candles: &[Candle], lookback: usize) -> CandleColorRun {
    let window = &candles[candles.len().saturating_sub(lookback)..];
    let colors: Vec<CandleColor> = window.iter().map(CandleColor::of).collect();
    let pattern: String = colors.iter().map(|c| c.glyph()).collect();

    let Some(&latest) = colors.last() else {
        return CandleColorRun {
            color: CandleColor::Flat,
            length: 0,
            state: RunState::NoSignal,
            pattern,
        };
    };
    if latest == CandleColor::Flat {
        return CandleColorRun {
            color: latest,
            length: 0,
            state: RunState::NoSignal,
            pattern,
        };
    }

    let length = colors.iter().rev().take_while(|c| **c == latest).count();
    let earlier = &colors[..colors.len() - length];
    let saw_opposite = latest
        .opposite()
        .is_some_and(|opp| earlier.contains(&opp));

    let state = if length >= CONFIRMING_RUN {
        if saw_opposite {
            RunState::ConfirmedReversal
        } else {
            RunState::Continuation
        }
    } else {
        RunState::Pending
    };

    CandleColorRun {
        color: latest,
        length,
        state,
        pattern,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    Doji,
    Hammer,
    HangingMan,
    ShootingStar,
    BullishEngulfing,
    BearishEngulfing,
    MorningStar,
    EveningStar,
}

impl Pattern {
    pub fn score(self) -> f64 {
        match self {
            Pattern::Doji => 0.0,
            Pattern::Hammer => 15.0,
            Pattern::HangingMan => -10.0,
            Pattern::ShootingStar => -15.0,
            Pattern::BullishEngulfing => 20.0,
            Pattern::BearishEngulfing => -20.0,
            Pattern::MorningStar => 25.0,
            Pattern::EveningStar => -25.0,
        }
    }
}

/// Patterns completed by the latest candle
pub fn detect_patterns(candles: &[Candle]) -> Vec<Pattern> {
    let n = candles.len();
    if n < 3 {
        return Vec::new();
    }
    let (first, prev, last) = (&candles[n - 3], &candles[n - 2], &candles[n - 1]);
    let mut found = Vec::new();

    let body = last.body();
    let upper = last.upper_wick();
    let lower = last.lower_wick();

    if body < last.range() * 0.1 {
        found.push(Pattern::Doji);
    }

    if lower > body * 2.0 && upper < body * 0.3 {
        if prev.is_bearish() {
            found.push(Pattern::Hammer);
        } else {
            found.push(Pattern::HangingMan);
        }
    }

    if upper > body * 2.0 && lower < body * 0.3 && prev.is_bullish() {
        found.push(Pattern::ShootingStar);
    }

    if prev.is_bearish() && last.is_bullish() && last.open < prev.close && last.close > prev.open {
        found.push(Pattern::BullishEngulfing);
    }
    if prev.is_bullish() && last.is_bearish() && last.open > prev.close && last.close < prev.open {
        found.push(Pattern::BearishEngulfing);
    }

    // Star patterns: a small middle body next to the first candle's body
    let small_middle = prev.body() < first.body() * 0.3;
    let first_mid = (first.open + first.close) / 2.0;
    if first.is_bearish() && small_middle && last.is_bullish() && last.close > first_mid {
        found.push(Pattern::MorningStar);
    }
    if first.is_bullish() && small_middle && last.is_bearish() && last.close < first_mid {
        found.push(Pattern::EveningStar);
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::make_colored;

    const G: (f64, f64) = (100.0, 101.0);
    const R: (f64, f64) = (101.0, 100.0);

    #[test]
    fn test_two_green_is_pending() {
        let run = color_run(&make_colored(&[R, R, R, R, G, G]), 6);
        assert_eq!(run.length, 2);
        assert_eq!(run.state, RunState::Pending);
        assert!(!run.confirmed());
    }

    #[test]
    fn test_three_green_after_red_confirms() {
        let run = color_run(&make_colored(&[R, R, R, G, G, G]), 6);
        assert_eq!(run.length, 3);
        assert!(run.confirmed());
        assert_eq!(run.direction(), Direction::Long);
        assert_eq!(run.pattern, "RRRGGG");
    }

    #[test]
    fn test_three_green_without_red_is_continuation() {
        let run = color_run(&make_colored(&[G, G, G, G, G, G]), 6);
        assert_eq!(run.state, RunState::Continuation);
        assert!(!run.confirmed());
    }

    #[test]
    fn test_red_outside_lookback_does_not_count() {
        let run = color_run(&make_colored(&[R, G, G, G, G, G, G]), 6);
        assert_eq!(run.state, RunState::Continuation);
    }

    #[test]
    fn test_flat_latest_candle_is_no_signal() {
        let run = color_run(&make_colored(&[R, G, G, (100.0, 100.0)]), 6);
        assert_eq!(run.state, RunState::NoSignal);
        assert_eq!(run.direction(), Direction::Neutral);
    }

    #[test]
    fn test_bullish_engulfing() {
        let patterns = detect_patterns(&make_colored(&[G, (102.0, 100.0), (99.5, 102.5)]));
        assert!(patterns.contains(&Pattern::BullishEngulfing));
    }

    #[test]
    fn test_morning_star() {
        let patterns = detect_patterns(&make_colored(&[(110.0, 100.0), (100.0, 100.5), (100.5, 107.0)]));
        assert!(patterns.contains(&Pattern::MorningStar));
    }
}
