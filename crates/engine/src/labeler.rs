//! Outcome labeling for supervised training data
//!
//! Every candle is treated as a hypothetical entry in both directions. The
//! next `lookahead` candles are replayed and a direction succeeds when its
//! take-profit is touched before its stop-loss (a same-candle touch counts
//! for the take-profit). A candle is labeled positive when either direction
//! succeeds. The last `lookahead` candles cannot be simulated and stay
//! unlabeled.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::sanitize;
use crate::config::{AtrTierTable, TpSl};
use crate::error::{EngineError, EngineResult};
use crate::features::{FeatureMatrix, FeatureRow};
use crate::types::Candle;

/// Outcome of the forward simulation for one candle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Positive,
    Negative,
    Unlabeled,
}

impl Label {
    /// Training class (1 / 0), `None` for unlabeled rows
    pub fn class(self) -> Option<u8> {
        match self {
            Label::Positive => Some(1),
            Label::Negative => Some(0),
            Label::Unlabeled => None,
        }
    }
}

/// How take-profit / stop-loss distances are chosen per candle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TargetMode {
    /// Same tp/sl for every candle
    Fixed(TpSl),
    /// Bucketed by the candle's ATR%
    AtrTiered(AtrTierTable),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelerConfig {
    pub lookahead: usize,
    pub targets: TargetMode,
}

impl Default for LabelerConfig {
    fn default() -> Self {
        Self {
            lookahead: 50,
            targets: TargetMode::AtrTiered(AtrTierTable::default()),
        }
    }
}

/// Positive / negative / unlabeled counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassBalance {
    pub positive: usize,
    pub negative: usize,
    pub unlabeled: usize,
}

impl ClassBalance {
    /// Share of labeled rows that are positive
    pub fn positive_rate(&self) -> f64 {
        let labeled = self.positive + self.negative;
        if labeled == 0 {
            0.0
        } else {
            self.positive as f64 / labeled as f64
        }
    }
}

/// Dense, sanitized training inputs in model feature order
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub feature_names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<u8>,
}

/// A feature matrix with one label per candle
#[derive(Debug, Clone)]
pub struct LabeledMatrix {
    features: FeatureMatrix,
    labels: Vec<Label>,
}

impl LabeledMatrix {
    pub fn features(&self) -> &FeatureMatrix {
        &self.features
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn class_balance(&self) -> ClassBalance {
        let mut balance = ClassBalance::default();
        for label in &self.labels {
            match label {
                Label::Positive => balance.positive += 1,
                Label::Negative => balance.negative += 1,
                Label::Unlabeled => balance.unlabeled += 1,
            }
        }
        balance
    }

    /// Labeled rows in time order; unlabeled rows are dropped
    pub fn training_rows(&self) -> Vec<(FeatureRow, u8)> {
        self.labels
            .iter()
            .enumerate()
            .filter_map(|(i, label)| label.class().map(|class| (self.features.row(i), class)))
            .collect()
    }

    /// Labeled rows as dense vectors. Missing values become 0 and infinities
    /// are clamped, matching what the classifier does at inference.
    pub fn training_set(&self) -> TrainingSet {
        let names = self.features.model_feature_names();
        let columns: Vec<&[f64]> = names
            .iter()
            .filter_map(|name| self.features.values(name))
            .collect();

        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for (i, label) in self.labels.iter().enumerate() {
            if let Some(class) = label.class() {
                rows.push(columns.iter().map(|col| sanitize(col[i])).collect());
                labels.push(class);
            }
        }

        TrainingSet {
            feature_names: names.into_iter().map(str::to_string).collect(),
            rows,
            labels,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OutcomeLabeler {
    config: LabelerConfig,
}

impl OutcomeLabeler {
    pub fn new(config: LabelerConfig) -> Self {
        Self { config }
    }

    pub fn label(&self, matrix: &FeatureMatrix) -> EngineResult<LabeledMatrix> {
        self.label_with(matrix, None, None)
    }

    /// Label with optional overrides: `targets` fixes tp/sl for every row,
    /// `lookahead` replaces the configured horizon.
    pub fn label_with(
        &self,
        matrix: &FeatureMatrix,
        targets: Option<TpSl>,
        lookahead: Option<usize>,
    ) -> EngineResult<LabeledMatrix> {
        let lookahead = lookahead.unwrap_or(self.config.lookahead);
        if lookahead == 0 {
            return Err(EngineError::Validation("lookahead must be at least 1".into()));
        }
        let mode = match targets {
            Some(tp_sl) => TargetMode::Fixed(tp_sl),
            None => self.config.targets.clone(),
        };

        let candles = matrix.candles();
        let atr_percent = match &mode {
            TargetMode::AtrTiered(_) => Some(matrix.values("atr_percent").ok_or_else(|| {
                EngineError::Validation("feature matrix has no atr_percent column".into())
            })?),
            TargetMode::Fixed(_) => None,
        };

        let labelable = candles.len().saturating_sub(lookahead);
        let mut labels = vec![Label::Unlabeled; candles.len()];
        for (i, slot) in labels.iter_mut().enumerate().take(labelable) {
            let tp_sl = match (&mode, atr_percent) {
                (TargetMode::Fixed(fixed), _) => *fixed,
                (TargetMode::AtrTiered(tiers), Some(atr)) => tiers.for_atr_percent(atr[i]),
                (TargetMode::AtrTiered(tiers), None) => tiers.high,
            };
            let future = &candles[i + 1..=i + lookahead];
            let entry = candles[i].close;
            *slot = if long_succeeds(entry, tp_sl, future) || short_succeeds(entry, tp_sl, future) {
                Label::Positive
            } else {
                Label::Negative
            };
        }

        let labeled = LabeledMatrix {
            features: matrix.clone(),
            labels,
        };
        let balance = labeled.class_balance();
        debug!(
            lookahead,
            positive = balance.positive,
            negative = balance.negative,
            unlabeled = balance.unlabeled,
            "Labeled dataset"
        );
        Ok(labeled)
    }
}

/// First index in `future` where `hit` holds
fn first_touch(future: &[Candle], hit: impl Fn(&Candle) -> bool) -> Option<usize> {
    future.iter().position(hit)
}

/// Take-profit must be touched, and no later than the stop
fn race(tp_idx: Option<usize>, sl_idx: Option<usize>) -> bool {
    match (tp_idx, sl_idx) {
        (Some(tp), Some(sl)) => tp <= sl,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

pub(crate) fn long_succeeds(entry: f64, tp_sl: TpSl, future: &[Candle]) -> bool {
    let tp = entry * (1.0 + tp_sl.tp_pct / 100.0);
    let sl = entry * (1.0 - tp_sl.sl_pct / 100.0);
    race(
        first_touch(future, |c| c.high >= tp),
        first_touch(future, |c| c.low <= sl),
    )
}

pub(crate) fn short_succeeds(entry: f64, tp_sl: TpSl, future: &[Candle]) -> bool {
    let tp = entry * (1.0 - tp_sl.tp_pct / 100.0);
    let sl = entry * (1.0 + tp_sl.sl_pct / 100.0);
    race(
        first_touch(future, |c| c.low <= tp),
        first_touch(future, |c| c.high >= sl),
    )
}
