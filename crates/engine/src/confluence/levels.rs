//! Entry, stop and target derivation

use serde::{Deserialize, Serialize};

use crate::types::Direction;

/// How a policy places its stop and targets around the entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LevelRule {
    /// Percent distances from entry
    FixedPercent { stop_pct: f64, target_pcts: Vec<f64> },
    /// Multiples of the timeframe's high-low range proxy
    RangeMultiple {
        stop_multiple: f64,
        target_multiples: Vec<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceLevels {
    pub entry: f64,
    pub stop: f64,
    pub targets: Vec<f64>,
}

impl LevelRule {
    /// Levels for a trade in `direction`. Neutral has none.
    pub fn levels(&self, direction: Direction, entry: f64, range_proxy: f64) -> Option<PriceLevels> {
        let side = match direction {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
            Direction::Neutral => return None,
        };
        let (stop, targets) = match self {
            LevelRule::FixedPercent {
                stop_pct,
                target_pcts,
            } => (
                entry * (1.0 - side * stop_pct / 100.0),
                target_pcts
                    .iter()
                    .map(|pct| entry * (1.0 + side * pct / 100.0))
                    .collect(),
            ),
            LevelRule::RangeMultiple {
                stop_multiple,
                target_multiples,
            } => (
                entry - side * stop_multiple * range_proxy,
                target_multiples
                    .iter()
                    .map(|m| entry + side * m * range_proxy)
                    .collect(),
            ),
        };
        Some(PriceLevels {
            entry,
            stop,
            targets,
        })
    }
}
