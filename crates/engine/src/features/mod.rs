//! Feature engineering over candle windows
//!
//! Turns an ordered candle series into a column-major feature matrix: order
//! flow (volume delta, CVD), structure (gaps, zones, swings), regime
//! (volatility, Bollinger, Hurst), VWAP and momentum.
//!
//! Two entry points exist because zone and swing detection look forward in
//! time. [`FeatureEngineer::compute_for_training`] keeps the look-ahead
//! alignment used to build labeled datasets; [`FeatureEngineer::compute_for_inference`]
//! only uses candles at or before each row.

mod flow;
mod momentum;
mod regime;
pub mod rolling;
mod structure;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::error::EngineResult;
use crate::types::{validate_candles, Candle};

pub use regime::hurst_exponent;

/// Sentinel for "no zone seen yet" in the `distance_to_*` columns
pub const NO_SIGNAL_DISTANCE: f64 = 999.0;

/// Hurst value for windows too short to estimate (random walk)
pub const HURST_DEFAULT: f64 = 0.5;

/// Whether non-causal columns may use future candles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureMode {
    Training,
    Inference,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Closes per Hurst estimate
    pub hurst_window: usize,
    /// Candles in the rolling VWAP
    pub vwap_window: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            hurst_window: 100,
            vwap_window: 50,
        }
    }
}

impl FeatureConfig {
    /// Shortest series accepted: the largest rolling window in use
    pub fn min_candles(&self) -> usize {
        self.hurst_window.max(self.vwap_window).max(regime::VOL_ZSCORE_WARMUP + 1)
    }
}

/// One named feature series
#[derive(Debug, Clone)]
pub struct FeatureColumn {
    pub name: &'static str,
    /// Leading rows that hold `missing` instead of a computed value
    pub warmup: usize,
    /// Value used for warm-up rows (NaN unless the column documents otherwise)
    pub missing: f64,
    /// True when training-mode values depend on later candles
    pub non_causal: bool,
    /// False for intermediate series the model never sees
    pub model_input: bool,
    pub values: Vec<f64>,
}

impl FeatureColumn {
    /// Whether `value` is this column's missing sentinel
    pub fn is_missing(&self, value: f64) -> bool {
        if self.missing.is_nan() {
            value.is_nan()
        } else {
            value == self.missing
        }
    }
}

/// Accumulates columns in catalogue order
#[derive(Default)]
pub(crate) struct ColumnSet {
    columns: Vec<FeatureColumn>,
}

impl ColumnSet {
    fn push(&mut self, name: &'static str, warmup: usize, values: Vec<f64>) {
        self.columns.push(FeatureColumn {
            name,
            warmup,
            missing: f64::NAN,
            non_causal: false,
            model_input: true,
            values,
        });
    }

    fn push_intermediate(&mut self, name: &'static str, warmup: usize, values: Vec<f64>) {
        self.push(name, warmup, values);
        if let Some(col) = self.columns.last_mut() {
            col.model_input = false;
        }
    }

    fn push_non_causal(&mut self, name: &'static str, warmup: usize, missing: f64, values: Vec<f64>) {
        self.push(name, warmup, values);
        if let Some(col) = self.columns.last_mut() {
            col.non_causal = true;
            col.missing = missing;
        }
    }

    fn push_with_default(&mut self, name: &'static str, warmup: usize, missing: f64, values: Vec<f64>) {
        self.push(name, warmup, values);
        if let Some(col) = self.columns.last_mut() {
            col.missing = missing;
        }
    }
}

/// Feature values of a single candle, keyed by column name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    values: HashMap<String, f64>,
}

impl FeatureRow {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, f64)> for FeatureRow {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Per-candle feature matrix, stored column-major
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    mode: FeatureMode,
    candles: Vec<Candle>,
    columns: Vec<FeatureColumn>,
}

impl FeatureMatrix {
    pub fn mode(&self) -> FeatureMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&FeatureColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn values(&self, name: &str) -> Option<&[f64]> {
        self.column(name).map(|c| c.values.as_slice())
    }

    /// Ordered names of the columns a classifier consumes
    pub fn model_feature_names(&self) -> Vec<&'static str> {
        self.columns
            .iter()
            .filter(|c| c.model_input)
            .map(|c| c.name)
            .collect()
    }

    /// Model inputs at `index`. Missing (NaN) values are left out so the
    /// classifier applies its own default.
    pub fn row(&self, index: usize) -> FeatureRow {
        self.columns
            .iter()
            .filter(|c| c.model_input)
            .filter_map(|c| {
                let value = *c.values.get(index)?;
                value.is_finite().then(|| (c.name.to_string(), value))
            })
            .collect()
    }

    /// Model inputs of the most recent candle
    pub fn latest_row(&self) -> FeatureRow {
        match self.len() {
            0 => FeatureRow::default(),
            n => self.row(n - 1),
        }
    }
}

/// Computes feature matrices from candle series
#[derive(Debug, Clone, Default)]
pub struct FeatureEngineer {
    config: FeatureConfig,
}

impl FeatureEngineer {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Features with look-ahead alignment, for offline dataset construction
    pub fn compute_for_training(&self, candles: &[Candle]) -> EngineResult<FeatureMatrix> {
        self.compute(candles, FeatureMode::Training)
    }

    /// Strictly causal features, for live scoring
    pub fn compute_for_inference(&self, candles: &[Candle]) -> EngineResult<FeatureMatrix> {
        self.compute(candles, FeatureMode::Inference)
    }

    pub fn compute(&self, candles: &[Candle], mode: FeatureMode) -> EngineResult<FeatureMatrix> {
        validate_candles(candles, self.config.min_candles())?;

        let mut cols = ColumnSet::default();
        flow::order_flow(candles, &mut cols);
        flow::volume_profile(candles, &mut cols);
        structure::gaps(candles, &mut cols);
        structure::zones(candles, mode, &mut cols);
        structure::swings(candles, mode, &mut cols);
        regime::volatility(candles, &mut cols);
        regime::hurst(candles, self.config.hurst_window, &mut cols);
        flow::vwap(candles, self.config.vwap_window, &mut cols);
        momentum::price_momentum(candles, &mut cols);

        debug!(
            bars = candles.len(),
            columns = cols.columns.len(),
            ?mode,
            "Computed feature matrix"
        );

        Ok(FeatureMatrix {
            mode,
            candles: candles.to_vec(),
            columns: cols.columns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::types::test_support::{make_candles, random_walk};

    #[test]
    fn test_rejects_short_series() {
        let engineer = FeatureEngineer::default();
        let candles = random_walk(50, 1);
        assert!(matches!(
            engineer.compute_for_inference(&candles),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_warmup_rows_hold_missing_sentinel() {
        let engineer = FeatureEngineer::default();
        for seed in 0..5 {
            let candles = random_walk(300, seed);
            let matrix = engineer.compute_for_training(&candles).unwrap();
            for col in matrix.columns() {
                assert_eq!(col.values.len(), candles.len(), "{}", col.name);
                for (i, v) in col.values.iter().enumerate() {
                    if i < col.warmup {
                        assert!(col.is_missing(*v), "{} row {} = {}", col.name, i, v);
                    } else {
                        assert!(v.is_finite(), "{} row {} = {}", col.name, i, v);
                    }
                }
            }
        }
    }

    #[test]
    fn test_hurst_column_bounded() {
        let engineer = FeatureEngineer::default();
        let candles = random_walk(400, 9);
        let matrix = engineer.compute_for_inference(&candles).unwrap();
        let hurst = matrix.values("hurst").unwrap();
        assert!(hurst.iter().all(|h| (0.0..=1.0).contains(h)));
        assert!(hurst[..99].iter().all(|h| *h == HURST_DEFAULT));
    }

    #[test]
    fn test_latest_row_excludes_intermediate_columns() {
        let engineer = FeatureEngineer::default();
        let matrix = engineer.compute_for_inference(&random_walk(200, 4)).unwrap();
        let row = matrix.latest_row();
        assert!(row.get("cvd").is_some());
        assert!(row.get("hurst").is_some());
        for hidden in ["delta", "cvd_ma20", "volume_ma20", "bb_upper", "bb_lower", "vwap_rolling"] {
            assert!(row.get(hidden).is_none(), "{} leaked into model row", hidden);
            assert!(!matrix.model_feature_names().contains(&hidden));
        }
        assert_eq!(row.len(), matrix.model_feature_names().len());
    }

    #[test]
    fn test_inference_mode_never_reads_future_candles() {
        let engineer = FeatureEngineer::default();
        let full = random_walk(260, 11);
        let cut = 220;
        let whole = engineer.compute_for_inference(&full).unwrap();
        let prefix = engineer.compute_for_inference(&full[..cut]).unwrap();
        for col in prefix.columns() {
            let later = whole.values(col.name).unwrap();
            for i in 0..cut {
                let (a, b) = (col.values[i], later[i]);
                assert!(
                    (a.is_nan() && b.is_nan()) || (a - b).abs() < 1e-9,
                    "{} differs at {}",
                    col.name,
                    i
                );
            }
        }
    }

    #[test]
    fn test_training_mode_flags_non_causal_columns() {
        let engineer = FeatureEngineer::default();
        let matrix = engineer.compute_for_training(&random_walk(200, 2)).unwrap();
        let non_causal: Vec<_> = matrix
            .columns()
            .iter()
            .filter(|c| c.non_causal)
            .map(|c| c.name)
            .collect();
        assert_eq!(
            non_causal,
            vec![
                "ob_bullish",
                "ob_bearish",
                "distance_to_ob_bull",
                "distance_to_ob_bear",
                "swing_high",
                "swing_low",
                "swing_high_count",
                "swing_low_count",
            ]
        );

        let live = engineer.compute_for_inference(&random_walk(200, 2)).unwrap();
        assert!(live.columns().iter().all(|c| !c.non_causal));
    }

    #[test]
    fn test_flat_series_resolves_to_defaults() {
        let engineer = FeatureEngineer::default();
        let candles = make_candles(&vec![100.0; 150]);
        let matrix = engineer.compute_for_inference(&candles).unwrap();
        let last = matrix.len() - 1;
        assert_eq!(matrix.values("bb_position").unwrap()[last], 0.5);
        assert_eq!(matrix.values("hurst").unwrap()[last], HURST_DEFAULT);
        assert_eq!(matrix.values("roc_10").unwrap()[last], 0.0);
    }
}
