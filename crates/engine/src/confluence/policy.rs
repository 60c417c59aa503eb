//! Decision policies
//!
//! Every policy reads the same [`MarketView`] and returns a [`Verdict`]. The
//! engine adds price levels, warnings and the partial-data penalty, so a
//! policy only decides direction, confidence and the level rule.

use serde::{Deserialize, Serialize};

use super::decision::ConfluenceGrade;
use super::levels::LevelRule;
use super::MarketView;
use crate::config::{AtrTierTable, SignalConfig};
use crate::scorer::candles::{RunState, CONFIRMING_RUN};
use crate::scorer::votes::VOTE_COUNT;
use crate::types::{Direction, Trend};

/// What a policy concluded before levels and warnings are attached
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub should_trade: bool,
    pub direction: Direction,
    pub confidence: u8,
    pub reason: String,
    /// Level placement when `should_trade`
    pub levels: Option<LevelRule>,
    pub grade: Option<ConfluenceGrade>,
}

impl Verdict {
    pub fn trade(direction: Direction, confidence: u8, reason: String, levels: LevelRule) -> Self {
        Self {
            should_trade: true,
            direction,
            confidence,
            reason,
            levels: Some(levels),
            grade: None,
        }
    }

    pub fn pass(direction: Direction, confidence: u8, reason: String) -> Self {
        Self {
            should_trade: false,
            direction,
            confidence,
            reason,
            levels: None,
            grade: None,
        }
    }

    fn with_grade(mut self, grade: ConfluenceGrade) -> Self {
        self.grade = Some(grade);
        self
    }
}

/// Strategy interface shared by all policies
pub trait DecisionPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    fn evaluate(&self, view: &MarketView) -> Verdict;
}

fn percent(x: f64) -> u8 {
    (x * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Fresh MA crossover or a vote-confirmed MA trend on the primary timeframe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossoverVotePolicy {
    /// Matching votes a steady trend needs
    pub min_votes: usize,
    /// Matching votes reported as under-confirmed
    pub under_confirmed_votes: usize,
    pub stop_pct: f64,
    pub target_pct: f64,
}

impl Default for CrossoverVotePolicy {
    fn default() -> Self {
        Self {
            min_votes: 7,
            under_confirmed_votes: 5,
            stop_pct: 2.0,
            target_pct: 4.0,
        }
    }
}

impl DecisionPolicy for CrossoverVotePolicy {
    fn name(&self) -> &'static str {
        "crossover_vote"
    }

    fn evaluate(&self, view: &MarketView) -> Verdict {
        let primary = &view.primary;
        let Some(state) = primary.ma_cross_state else {
            return Verdict::pass(
                Direction::Neutral,
                0,
                "Moving averages still warming up".to_string(),
            );
        };
        let direction = state.direction();
        let votes = primary.vote_tally.matching(direction);
        let confidence = percent(votes as f64 / VOTE_COUNT as f64);
        let levels = LevelRule::FixedPercent {
            stop_pct: self.stop_pct,
            target_pcts: vec![self.target_pct],
        };

        if state.is_fresh() {
            Verdict::trade(
                direction,
                confidence,
                format!(
                    "Fresh {} crossover on {} with {}/{} indicators agreeing",
                    state.label(),
                    primary.timeframe,
                    votes,
                    VOTE_COUNT
                ),
                levels,
            )
        } else if votes >= self.min_votes {
            Verdict::trade(
                direction,
                confidence,
                format!(
                    "{} on {} confirmed by {}/{} indicators",
                    state.label(),
                    primary.timeframe,
                    votes,
                    VOTE_COUNT
                ),
                levels,
            )
        } else if votes >= self.under_confirmed_votes {
            Verdict::pass(
                direction,
                confidence,
                format!(
                    "{} under-confirmed: {}/{} indicators, need {}",
                    state.label(),
                    votes,
                    VOTE_COUNT,
                    self.min_votes
                ),
            )
        } else {
            Verdict::pass(
                Direction::Neutral,
                confidence,
                format!(
                    "No confluence: {} with only {}/{} indicators",
                    state.label(),
                    votes,
                    VOTE_COUNT
                ),
            )
        }
    }
}

/// Confirmed candle-color reversal on the primary timeframe, weighted by
/// agreement of the main and intermediate higher timeframes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleColorPolicy {
    pub confirmed_weight: u8,
    pub main_weight: u8,
    pub intermediate_weight: u8,
    /// Deducted when only the main timeframe agrees
    pub main_only_penalty: u8,
    /// Deducted when only the intermediate timeframe agrees
    pub intermediate_only_penalty: u8,
    pub unconfirmed_penalty: u8,
    pub stop_pct: f64,
    pub target_pcts: Vec<f64>,
}

impl Default for CandleColorPolicy {
    fn default() -> Self {
        Self {
            confirmed_weight: 40,
            main_weight: 35,
            intermediate_weight: 25,
            main_only_penalty: 15,
            intermediate_only_penalty: 20,
            unconfirmed_penalty: 30,
            stop_pct: 5.0,
            target_pcts: vec![5.0, 10.0, 15.0],
        }
    }
}

impl DecisionPolicy for CandleColorPolicy {
    fn name(&self) -> &'static str {
        "candle_color"
    }

    fn evaluate(&self, view: &MarketView) -> Verdict {
        let run = &view.primary.candle_color_run;

        if !run.confirmed() {
            if run.state == RunState::Pending {
                return Verdict::pass(
                    Direction::Neutral,
                    20,
                    format!(
                        "Waiting: {}/{} {:?} candles on {}",
                        run.length, CONFIRMING_RUN, run.color, view.primary.timeframe
                    )
                    .to_lowercase(),
                );
            }
            return Verdict::pass(
                Direction::Neutral,
                10,
                format!("No candle-color reversal ({})", run.pattern),
            );
        }

        let direction = run.direction();
        let agrees = |trend: Option<Trend>| trend.is_some_and(|t| t.agrees_with(direction));
        let main = agrees(view.main().map(|s| s.bias()));
        let intermediate = agrees(view.intermediate().map(|s| s.bias()));

        let mut alignment = self.confirmed_weight;
        if main {
            alignment = alignment.saturating_add(self.main_weight);
        }
        if intermediate {
            alignment = alignment.saturating_add(self.intermediate_weight);
        }
        let alignment = alignment.min(100);

        let levels = LevelRule::FixedPercent {
            stop_pct: self.stop_pct,
            target_pcts: self.target_pcts.clone(),
        };
        let candles = format!("{} {:?} candles", run.length, run.color).to_lowercase();
        let main_tf = view.main_timeframe().unwrap_or("main");
        let inter_tf = view.intermediate_timeframe().unwrap_or("intermediate");

        match (main, intermediate) {
            (true, true) => Verdict::trade(
                direction,
                alignment,
                format!("{} confirmed: {} and {} agree, {}", direction, main_tf, inter_tf, candles),
                levels,
            ),
            (true, false) => Verdict::trade(
                direction,
                alignment.saturating_sub(self.main_only_penalty),
                format!("{} with {} trend only, {}", direction, main_tf, candles),
                levels,
            ),
            (false, true) => Verdict::trade(
                direction,
                alignment.saturating_sub(self.intermediate_only_penalty),
                format!("{} with {} trend only, {}", direction, inter_tf, candles),
                levels,
            ),
            (false, false) => Verdict::pass(
                direction,
                alignment.saturating_sub(self.unconfirmed_penalty),
                format!(
                    "{} reversal on {} not confirmed by higher timeframes",
                    direction, view.primary.timeframe
                ),
            ),
        }
    }
}

/// All-timeframe trend alignment gated by a classifier probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrictAlignmentPolicy {
    pub probability_threshold: f64,
    /// Share of configured timeframes that must agree
    pub min_alignment: f64,
    pub min_atr_percent: f64,
    pub max_atr_percent: f64,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub min_adx: f64,
    pub min_volume_ratio: f64,
    pub base_confidence: u8,
    pub full_alignment_bonus: u8,
    pub strength_bonus: u8,
    pub stop_multiple: f64,
    pub target_multiples: Vec<f64>,
}

impl Default for StrictAlignmentPolicy {
    fn default() -> Self {
        Self {
            probability_threshold: 0.90,
            min_alignment: 0.75,
            min_atr_percent: 0.3,
            max_atr_percent: 6.0,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            min_adx: 20.0,
            min_volume_ratio: 1.0,
            base_confidence: 80,
            full_alignment_bonus: 10,
            strength_bonus: 5,
            stop_multiple: 1.5,
            target_multiples: vec![1.5, 2.5, 4.0],
        }
    }
}

impl StrictAlignmentPolicy {
    pub fn from_config(config: &SignalConfig) -> Self {
        Self {
            probability_threshold: config.probability_threshold,
            ..Self::default()
        }
    }
}

impl DecisionPolicy for StrictAlignmentPolicy {
    fn name(&self) -> &'static str {
        "strict_alignment"
    }

    fn evaluate(&self, view: &MarketView) -> Verdict {
        let probability = view.probability.value_or_zero();
        if !view.probability.is_available() {
            return Verdict::pass(
                Direction::Neutral,
                0,
                "No classifier probability available".to_string(),
            );
        }
        if probability < self.probability_threshold {
            return Verdict::pass(
                Direction::Neutral,
                percent(probability),
                format!(
                    "Probability {:.1}% below {:.1}%",
                    probability * 100.0,
                    self.probability_threshold * 100.0
                ),
            );
        }

        // Absent timeframes count against alignment
        let total = view.timeframe_count() as f64;
        let bullish = view.snapshots().filter(|s| s.bias() == Trend::Bullish).count() as f64;
        let bearish = view.snapshots().filter(|s| s.bias() == Trend::Bearish).count() as f64;
        let (direction, aligned) = if bullish >= bearish {
            (Direction::Long, bullish)
        } else {
            (Direction::Short, bearish)
        };
        let alignment = aligned / total;
        if alignment < self.min_alignment {
            return Verdict::pass(
                Direction::Neutral,
                percent(alignment),
                format!(
                    "Trend alignment {:.0}% below {:.0}%",
                    alignment * 100.0,
                    self.min_alignment * 100.0
                ),
            );
        }

        let primary = &view.primary.indicators;
        let atr_percent = primary.atr_percent;
        if atr_percent.is_nan() || atr_percent < self.min_atr_percent {
            return Verdict::pass(
                direction,
                0,
                format!("Volatility too low (ATR {:.2}%)", atr_percent),
            );
        }
        if atr_percent > self.max_atr_percent {
            return Verdict::pass(
                direction,
                0,
                format!("Volatility extreme (ATR {:.2}%)", atr_percent),
            );
        }

        let extended = match direction {
            Direction::Long => primary.rsi > self.rsi_overbought,
            Direction::Short => primary.rsi < self.rsi_oversold,
            Direction::Neutral => false,
        };
        if extended {
            return Verdict::pass(
                direction,
                0,
                format!("{} already extended (RSI {:.1})", direction, primary.rsi),
            );
        }

        let adx_ok = view
            .higher
            .iter()
            .filter_map(|h| h.snapshot.as_ref())
            .any(|s| s.indicators.adx > self.min_adx);
        let volume_ok = primary.volume_ratio > self.min_volume_ratio;
        if !(adx_ok || volume_ok) {
            return Verdict::pass(
                direction,
                0,
                "No trend strength: ADX weak and volume below average".to_string(),
            );
        }

        let mut confidence = self.base_confidence;
        if alignment >= 1.0 {
            confidence = confidence.saturating_add(self.full_alignment_bonus);
        }
        if adx_ok && volume_ok {
            confidence = confidence.saturating_add(self.strength_bonus);
        }

        let directional_score = match direction {
            Direction::Short => 100.0 - view.primary.composite_score,
            _ => view.primary.composite_score,
        };
        Verdict::trade(
            direction,
            confidence.min(100),
            format!(
                "{} aligned on {:.0}% of timeframes, probability {:.1}%",
                direction,
                alignment * 100.0,
                probability * 100.0
            ),
            LevelRule::RangeMultiple {
                stop_multiple: self.stop_multiple,
                target_multiples: self.target_multiples.clone(),
            },
        )
        .with_grade(ConfluenceGrade::from_readings(probability, directional_score))
    }
}

/// Classifier probability plus a technical score floor on the primary
/// timeframe, with ATR%-tiered levels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreGatePolicy {
    pub probability_threshold: f64,
    pub technical_score_min: f64,
    pub atr_tiers: AtrTierTable,
}

impl Default for ScoreGatePolicy {
    fn default() -> Self {
        Self::from_config(&SignalConfig::default())
    }
}

impl ScoreGatePolicy {
    pub fn from_config(config: &SignalConfig) -> Self {
        Self {
            probability_threshold: config.probability_threshold,
            technical_score_min: config.technical_score_min,
            atr_tiers: config.atr_tiers.clone(),
        }
    }
}

impl DecisionPolicy for ScoreGatePolicy {
    fn name(&self) -> &'static str {
        "score_gate"
    }

    fn evaluate(&self, view: &MarketView) -> Verdict {
        let primary = &view.primary;
        let probability = view.probability.value_or_zero();
        let score = primary.composite_score;
        let direction = primary.signal_class.direction();
        let directional_score = match direction {
            Direction::Short => 100.0 - score,
            _ => score,
        };
        let grade = ConfluenceGrade::from_readings(probability, directional_score);

        if probability < self.probability_threshold {
            let reason = if view.probability.is_available() {
                format!(
                    "Probability {:.1}% below {:.1}%",
                    probability * 100.0,
                    self.probability_threshold * 100.0
                )
            } else {
                "No classifier probability available".to_string()
            };
            return Verdict::pass(Direction::Neutral, percent(probability), reason).with_grade(grade);
        }

        let passes_score = match direction {
            Direction::Long => score >= self.technical_score_min,
            Direction::Short => score <= 100.0 - self.technical_score_min,
            Direction::Neutral => false,
        };
        if !passes_score {
            return Verdict::pass(
                Direction::Neutral,
                percent(probability),
                format!(
                    "Technical score {:.1} ({:?}) does not clear {:.0}",
                    score, primary.signal_class, self.technical_score_min
                ),
            )
            .with_grade(grade);
        }

        let tp_sl = self.atr_tiers.for_atr_percent(primary.indicators.atr_percent);
        Verdict::trade(
            direction,
            percent(probability),
            format!(
                "{} with probability {:.1}% and score {:.1}",
                direction,
                probability * 100.0,
                score
            ),
            LevelRule::FixedPercent {
                stop_pct: tp_sl.sl_pct,
                target_pcts: vec![tp_sl.tp_pct],
            },
        )
        .with_grade(grade)
    }
}

/// Serializable policy selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum PolicyKind {
    CrossoverVote(CrossoverVotePolicy),
    CandleColor(CandleColorPolicy),
    StrictAlignment(StrictAlignmentPolicy),
    ScoreGate(ScoreGatePolicy),
}

impl PolicyKind {
    /// Policy by name with defaults, thresholds taken from `config`
    pub fn from_name(name: &str, config: &SignalConfig) -> Option<Self> {
        match name.replace('-', "_").as_str() {
            "crossover_vote" => Some(PolicyKind::CrossoverVote(CrossoverVotePolicy::default())),
            "candle_color" => Some(PolicyKind::CandleColor(CandleColorPolicy::default())),
            "strict_alignment" => Some(PolicyKind::StrictAlignment(
                StrictAlignmentPolicy::from_config(config),
            )),
            "score_gate" => Some(PolicyKind::ScoreGate(ScoreGatePolicy::from_config(config))),
            _ => None,
        }
    }

    pub fn build(&self) -> Box<dyn DecisionPolicy> {
        match self {
            PolicyKind::CrossoverVote(p) => Box::new(p.clone()),
            PolicyKind::CandleColor(p) => Box::new(p.clone()),
            PolicyKind::StrictAlignment(p) => Box::new(p.clone()),
            PolicyKind::ScoreGate(p) => Box::new(p.clone()),
        }
    }
}

impl Default for PolicyKind {
    fn default() -> Self {
        PolicyKind::CrossoverVote(CrossoverVotePolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Probability;
    use crate::confluence::test_support::{snapshot, view};
    use crate::scorer::candles::{CandleColor, CandleColorRun};
    use crate::scorer::crossover::MaCrossState;
    use crate::scorer::votes::VoteTally;
    use crate::scorer::{SignalClass, TimeframeSnapshot};

    fn trending(timeframe: &str, trend: Trend) -> TimeframeSnapshot {
        let mut s = snapshot(timeframe);
        s.trend_direction = trend;
        s.coarse_trend = trend;
        s
    }

    fn green_run(length: usize, state: RunState) -> CandleColorRun {
        CandleColorRun {
            color: CandleColor::Green,
            length,
            state,
            pattern: "RRRGGG".to_string(),
        }
    }

    #[test]
    fn test_steady_trend_needs_seven_votes() {
        let policy = CrossoverVotePolicy::default();
        let mut primary = snapshot("15m");
        primary.ma_cross_state = Some(MaCrossState::LongTrend);

        primary.vote_tally = VoteTally::counts(6, 3, 1);
        let six = policy.evaluate(&view(primary.clone(), vec![]));
        assert!(!six.should_trade);
        assert_eq!(six.direction, Direction::Long);
        assert!(six.reason.contains("under-confirmed"));

        primary.vote_tally = VoteTally::counts(7, 2, 1);
        let seven = policy.evaluate(&view(primary, vec![]));
        assert!(seven.should_trade);
        assert_eq!(seven.confidence, 70);
    }

    #[test]
    fn test_weak_vote_is_neutral() {
        let mut primary = snapshot("15m");
        primary.ma_cross_state = Some(MaCrossState::ShortTrend);
        primary.vote_tally = VoteTally::counts(4, 4, 2);
        let v = CrossoverVotePolicy::default().evaluate(&view(primary, vec![]));
        assert!(!v.should_trade);
        assert_eq!(v.direction, Direction::Neutral);
    }

    #[test]
    fn test_fresh_short_cross_trades_regardless_of_votes() {
        let mut primary = snapshot("15m");
        primary.ma_cross_state = Some(MaCrossState::Short);
        primary.vote_tally = VoteTally::counts(5, 3, 2);
        let v = CrossoverVotePolicy::default().evaluate(&view(primary, vec![]));
        assert!(v.should_trade);
        assert_eq!(v.direction, Direction::Short);
        assert_eq!(v.confidence, 30);
    }

    #[test]
    fn test_candle_color_confidence_by_agreement() {
        let policy = CandleColorPolicy::default();
        let mut primary = snapshot("15m");
        primary.candle_color_run = green_run(3, RunState::ConfirmedReversal);

        let both = policy.evaluate(&view(
            primary.clone(),
            vec![
                ("1h", Some(trending("1h", Trend::Bullish))),
                ("4h", Some(trending("4h", Trend::Bullish))),
            ],
        ));
        assert!(both.should_trade);
        assert_eq!(both.direction, Direction::Long);
        assert_eq!(both.confidence, 100);

        let main_only = policy.evaluate(&view(
            primary.clone(),
            vec![
                ("1h", Some(trending("1h", Trend::Bearish))),
                ("4h", Some(trending("4h", Trend::Bullish))),
            ],
        ));
        assert!(main_only.should_trade);
        assert_eq!(main_only.confidence, 60);

        let intermediate_only = policy.evaluate(&view(
            primary.clone(),
            vec![("1h", Some(trending("1h", Trend::Bullish))), ("4h", None)],
        ));
        assert!(intermediate_only.should_trade);
        assert_eq!(intermediate_only.confidence, 45);

        let neither = policy.evaluate(&view(
            primary,
            vec![
                ("1h", Some(trending("1h", Trend::Bearish))),
                ("4h", Some(trending("4h", Trend::Bearish))),
            ],
        ));
        assert!(!neither.should_trade);
        assert_eq!(neither.confidence, 10);
    }

    #[test]
    fn test_candle_color_pending_and_continuation() {
        let policy = CandleColorPolicy::default();
        let mut primary = snapshot("15m");

        primary.candle_color_run = green_run(2, RunState::Pending);
        let pending = policy.evaluate(&view(primary.clone(), vec![]));
        assert!(!pending.should_trade);
        assert_eq!(pending.confidence, 20);
        assert!(pending.reason.contains("2/3"));

        primary.candle_color_run = green_run(6, RunState::Continuation);
        let continuation = policy.evaluate(&view(primary, vec![]));
        assert!(!continuation.should_trade);
        assert_eq!(continuation.direction, Direction::Neutral);
        assert_eq!(continuation.confidence, 10);
    }

    fn strict_view(probability: Probability) -> MarketView {
        let mut primary = trending("15m", Trend::Bullish);
        primary.indicators.atr_percent = 1.0;
        primary.indicators.rsi = 55.0;
        primary.indicators.volume_ratio = 1.4;
        let mut one_hour = trending("1h", Trend::Bullish);
        one_hour.indicators.adx = 28.0;
        let mut v = view(
            primary,
            vec![("1h", Some(one_hour)), ("4h", Some(trending("4h", Trend::Bullish)))],
        );
        v.probability = probability;
        v
    }

    #[test]
    fn test_strict_alignment_full_house() {
        let v = StrictAlignmentPolicy::default().evaluate(&strict_view(Probability::Available(0.93)));
        assert!(v.should_trade);
        assert_eq!(v.direction, Direction::Long);
        assert_eq!(v.confidence, 95);
        assert!(matches!(v.levels, Some(LevelRule::RangeMultiple { .. })));
    }

    #[test]
    fn test_strict_alignment_gates() {
        let policy = StrictAlignmentPolicy::default();
        assert!(!policy.evaluate(&strict_view(Probability::Unavailable)).should_trade);
        assert!(!policy.evaluate(&strict_view(Probability::Available(0.5))).should_trade);

        let mut dead = strict_view(Probability::Available(0.95));
        dead.primary.indicators.atr_percent = 0.2;
        assert!(!policy.evaluate(&dead).should_trade);

        let mut extreme = strict_view(Probability::Available(0.95));
        extreme.primary.indicators.atr_percent = 7.5;
        assert!(!policy.evaluate(&extreme).should_trade);

        let mut extended = strict_view(Probability::Available(0.95));
        extended.primary.indicators.rsi = 74.0;
        assert!(!policy.evaluate(&extended).should_trade);

        // An absent timeframe counts against alignment: 2 of 3 is below 75%
        let mut partial = strict_view(Probability::Available(0.95));
        partial.higher[1].snapshot = None;
        assert!(!policy.evaluate(&partial).should_trade);
    }

    #[test]
    fn test_strict_alignment_needs_adx_or_volume() {
        let policy = StrictAlignmentPolicy::default();
        let mut v = strict_view(Probability::Available(0.95));
        v.primary.indicators.volume_ratio = 0.8;
        let adx_only = policy.evaluate(&v);
        assert!(adx_only.should_trade);
        assert_eq!(adx_only.confidence, 90);

        for h in v.higher.iter_mut().filter_map(|h| h.snapshot.as_mut()) {
            h.indicators.adx = 12.0;
        }
        assert!(!policy.evaluate(&v).should_trade);
    }

    #[test]
    fn test_score_gate() {
        let policy = ScoreGatePolicy::default();
        let mut primary = snapshot("15m");
        primary.composite_score = 72.0;
        primary.signal_class = SignalClass::StrongBuy;
        primary.indicators.atr_percent = 0.8;

        let mut v = view(primary, vec![]);
        v.probability = Probability::Available(0.92);
        let verdict = policy.evaluate(&v);
        assert!(verdict.should_trade);
        assert_eq!(verdict.direction, Direction::Long);
        assert_eq!(verdict.confidence, 92);
        assert_eq!(verdict.grade, Some(ConfluenceGrade::High));
        assert_eq!(
            verdict.levels,
            Some(LevelRule::FixedPercent {
                stop_pct: 0.20,
                target_pcts: vec![0.35],
            })
        );

        v.probability = Probability::Unavailable;
        assert!(!policy.evaluate(&v).should_trade);

        v.probability = Probability::Available(0.95);
        v.primary.composite_score = 60.0;
        v.primary.signal_class = SignalClass::Buy;
        assert!(!policy.evaluate(&v).should_trade);
    }

    #[test]
    fn test_score_gate_short_mirrors_threshold() {
        let mut primary = snapshot("15m");
        primary.composite_score = 30.0;
        primary.signal_class = SignalClass::StrongSell;
        let mut v = view(primary, vec![]);
        v.probability = Probability::Available(0.91);
        let verdict = ScoreGatePolicy::default().evaluate(&v);
        assert!(verdict.should_trade);
        assert_eq!(verdict.direction, Direction::Short);
    }

    #[test]
    fn test_policy_kind_by_name() {
        let config = SignalConfig::default();
        for name in ["crossover-vote", "candle_color", "strict-alignment", "score_gate"] {
            let kind = PolicyKind::from_name(name, &config).unwrap();
            assert_eq!(kind.build().name(), name.replace('-', "_"));
        }
        assert!(PolicyKind::from_name("martingale", &config).is_none());
    }

    #[test]
    fn test_policy_kind_serde_tag() {
        let json = serde_json::to_value(PolicyKind::default()).unwrap();
        assert_eq!(json["policy"], "crossover_vote");
        assert_eq!(json["min_votes"], 7);
    }
}
