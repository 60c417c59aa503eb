//! Decision record and advisory warnings

use serde::{Deserialize, Serialize};

use super::MarketView;
use crate::classifier::Probability;
use crate::types::{Direction, Trend};

/// Agreement between classifier probability and technical strength
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfluenceGrade {
    UltraHigh,
    High,
    Medium,
    Low,
}

impl ConfluenceGrade {
    /// `score` is the technical strength in the trade's direction
    pub fn from_readings(probability: f64, score: f64) -> Self {
        if probability >= 0.95 && score >= 80.0 {
            ConfluenceGrade::UltraHigh
        } else if probability >= 0.90 && score >= 70.0 {
            ConfluenceGrade::High
        } else if probability >= 0.80 && score >= 60.0 {
            ConfluenceGrade::Medium
        } else {
            ConfluenceGrade::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfluenceDecision {
    pub symbol: String,
    pub policy: String,
    pub should_trade: bool,
    pub direction: Direction,
    /// 0..=100
    pub confidence: u8,
    pub reason: String,
    /// Advisory only, never change `should_trade`
    pub warnings: Vec<String>,
    pub entry_price: f64,
    pub stop_price: Option<f64>,
    pub target_prices: Vec<f64>,
    pub probability: Probability,
    pub grade: Option<ConfluenceGrade>,
    /// Timeframes that produced a snapshot, primary first
    pub timeframes: Vec<String>,
    pub missing_timeframes: Vec<String>,
}

/// Conditions worth flagging whatever the policy decided
pub fn advisory_warnings(view: &MarketView) -> Vec<String> {
    let mut warnings = Vec::new();
    let primary = &view.primary;

    let biased: Vec<(&str, Trend)> = view
        .snapshots()
        .map(|s| (s.timeframe.as_str(), s.bias()))
        .filter(|(_, t)| *t != Trend::Neutral)
        .collect();
    let bullish = biased.iter().any(|(_, t)| *t == Trend::Bullish);
    let bearish = biased.iter().any(|(_, t)| *t == Trend::Bearish);
    if bullish && bearish {
        let detail: Vec<String> = biased
            .iter()
            .map(|(tf, t)| format!("{} {}", tf, t))
            .collect();
        warnings.push(format!("Timeframes disagree ({})", detail.join(", ")));
    }

    let rsi = primary.indicators.rsi;
    if rsi > 70.0 {
        warnings.push(format!("RSI overbought on {} ({:.1})", primary.timeframe, rsi));
    } else if rsi < 30.0 {
        warnings.push(format!("RSI oversold on {} ({:.1})", primary.timeframe, rsi));
    }

    let volume_ratio = primary.indicators.volume_ratio;
    if volume_ratio < 0.5 {
        warnings.push(format!("Thin volume ({:.2}x average)", volume_ratio));
    }

    let adx = primary.indicators.adx;
    if adx < 20.0 {
        warnings.push(format!("Weak trend strength (ADX {:.1})", adx));
    }

    let tally = &primary.vote_tally;
    if tally.is_divided() {
        warnings.push(format!(
            "Divided indicator vote ({} long / {} short)",
            tally.long, tally.short
        ));
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_thresholds() {
        assert_eq!(ConfluenceGrade::from_readings(0.96, 85.0), ConfluenceGrade::UltraHigh);
        assert_eq!(ConfluenceGrade::from_readings(0.96, 75.0), ConfluenceGrade::High);
        assert_eq!(ConfluenceGrade::from_readings(0.90, 70.0), ConfluenceGrade::High);
        assert_eq!(ConfluenceGrade::from_readings(0.85, 90.0), ConfluenceGrade::Medium);
        assert_eq!(ConfluenceGrade::from_readings(0.79, 90.0), ConfluenceGrade::Low);
    }
}
