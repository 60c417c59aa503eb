//! Price structure: three-candle gaps, order-block zones and swing points.
//!
//! Zones and swings are confirmed by later candles (3 and 2 respectively).
//! Training mode stamps them on the candle that formed them; inference mode
//! stamps them on the candle that confirmed them.

use super::rolling::{distance_since, pct_change, rolling_sum};
use super::{ColumnSet, FeatureMode, NO_SIGNAL_DISTANCE};
use crate::types::Candle;

/// Candles after a zone candle that must confirm the move
const ZONE_CONFIRM: usize = 3;
/// Minimum close-to-close move over the confirmation span
const ZONE_MOVE: f64 = 0.01;
/// Neighbours on each side a swing point must exceed
const SWING_RADIUS: usize = 2;

fn as_f64(flags: &[bool]) -> Vec<f64> {
    flags.iter().map(|&f| if f { 1.0 } else { 0.0 }).collect()
}

pub(super) fn gaps(candles: &[Candle], cols: &mut ColumnSet) {
    let n = candles.len();
    let mut bull = vec![0.0; n];
    let mut bear = vec![0.0; n];
    let mut bull_size = vec![0.0; n];
    let mut bear_size = vec![0.0; n];

    for i in 2..n {
        let (c, two_back) = (&candles[i], &candles[i - 2]);
        if c.low > two_back.high && c.is_bullish() {
            bull[i] = 1.0;
            bull_size[i] = pct_of_close(c.low - two_back.high, c.close);
        }
        if c.high < two_back.low && c.is_bearish() {
            bear[i] = 1.0;
            bear_size[i] = pct_of_close(two_back.low - c.high, c.close);
        }
    }

    let bull_count = rolling_sum(&bull, 20);
    let bear_count = rolling_sum(&bear, 20);

    cols.push("fvg_bullish", 0, bull);
    cols.push("fvg_bearish", 0, bear);
    cols.push("fvg_bullish_size", 0, bull_size);
    cols.push("fvg_bearish_size", 0, bear_size);
    cols.push("fvg_bullish_count", 19, bull_count);
    cols.push("fvg_bearish_count", 19, bear_count);
}

fn pct_of_close(value: f64, close: f64) -> f64 {
    if close == 0.0 {
        0.0
    } else {
        value / close * 100.0
    }
}

/// Last opposite-colored candle before a >1% move over the next 3 closes
pub(super) fn zones(candles: &[Candle], mode: FeatureMode, cols: &mut ColumnSet) {
    let n = candles.len();
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let change = pct_change(&closes, ZONE_CONFIRM);

    // Indexed by the zone candle itself
    let mut bull = vec![false; n];
    let mut bear = vec![false; n];
    for i in 0..n.saturating_sub(ZONE_CONFIRM) {
        let ahead = change[i + ZONE_CONFIRM];
        bull[i] = candles[i].is_bearish() && ahead > ZONE_MOVE;
        bear[i] = candles[i].is_bullish() && ahead < -ZONE_MOVE;
    }

    price_change(&closes, cols);

    match mode {
        FeatureMode::Training => {
            let dist_bull = distance_since(&bull, NO_SIGNAL_DISTANCE);
            let dist_bear = distance_since(&bear, NO_SIGNAL_DISTANCE);
            cols.push_non_causal("ob_bullish", 0, f64::NAN, as_f64(&bull));
            cols.push_non_causal("ob_bearish", 0, f64::NAN, as_f64(&bear));
            cols.push_non_causal("distance_to_ob_bull", 0, NO_SIGNAL_DISTANCE, dist_bull);
            cols.push_non_causal("distance_to_ob_bear", 0, NO_SIGNAL_DISTANCE, dist_bear);
        }
        FeatureMode::Inference => {
            let confirmed_bull = delay(&bull, ZONE_CONFIRM);
            let confirmed_bear = delay(&bear, ZONE_CONFIRM);
            let dist_bull = confirmed_distance(&bull, ZONE_CONFIRM);
            let dist_bear = confirmed_distance(&bear, ZONE_CONFIRM);
            cols.push("ob_bullish", 0, as_f64(&confirmed_bull));
            cols.push("ob_bearish", 0, as_f64(&confirmed_bear));
            cols.push_with_default("distance_to_ob_bull", 0, NO_SIGNAL_DISTANCE, dist_bull);
            cols.push_with_default("distance_to_ob_bear", 0, NO_SIGNAL_DISTANCE, dist_bear);
        }
    }
}

fn price_change(closes: &[f64], cols: &mut ColumnSet) {
    cols.push("price_change", 1, pct_change(closes, 1));
}

/// Strict local extrema over a +/-2 candle neighbourhood
pub(super) fn swings(candles: &[Candle], mode: FeatureMode, cols: &mut ColumnSet) {
    let n = candles.len();
    let mut high = vec![false; n];
    let mut low = vec![false; n];
    for i in SWING_RADIUS..n.saturating_sub(SWING_RADIUS) {
        let neighbours = (i - SWING_RADIUS..=i + SWING_RADIUS).filter(|&j| j != i);
        let (mut is_high, mut is_low) = (true, true);
        for j in neighbours {
            is_high &= candles[i].high > candles[j].high;
            is_low &= candles[i].low < candles[j].low;
        }
        high[i] = is_high;
        low[i] = is_low;
    }

    match mode {
        FeatureMode::Training => {
            let high_count = rolling_sum(&as_f64(&high), 20);
            let low_count = rolling_sum(&as_f64(&low), 20);
            cols.push_non_causal("swing_high", 0, f64::NAN, as_f64(&high));
            cols.push_non_causal("swing_low", 0, f64::NAN, as_f64(&low));
            cols.push_non_causal("swing_high_count", 19, f64::NAN, high_count);
            cols.push_non_causal("swing_low_count", 19, f64::NAN, low_count);
        }
        FeatureMode::Inference => {
            let high = as_f64(&delay(&high, SWING_RADIUS));
            let low = as_f64(&delay(&low, SWING_RADIUS));
            let high_count = rolling_sum(&high, 20);
            let low_count = rolling_sum(&low, 20);
            cols.push("swing_high", 0, high);
            cols.push("swing_low", 0, low);
            cols.push("swing_high_count", 19, high_count);
            cols.push("swing_low_count", 19, low_count);
        }
    }
}

/// Move each flag `lag` candles later, to where it becomes observable
fn delay(flags: &[bool], lag: usize) -> Vec<bool> {
    (0..flags.len())
        .map(|i| i >= lag && flags[i - lag])
        .collect()
}

/// Candles since the most recent zone candle whose confirmation has
/// already closed.
fn confirmed_distance(flags: &[bool], lag: usize) -> Vec<f64> {
    let mut last: Option<usize> = None;
    (0..flags.len())
        .map(|i| {
            if i >= lag && flags[i - lag] {
                last = Some(i - lag);
            }
            match last {
                Some(j) => (i - j) as f64,
                None => NO_SIGNAL_DISTANCE,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::make_colored;

    fn column<'a>(cols: &'a ColumnSet, name: &str) -> &'a [f64] {
        &cols.columns.iter().find(|c| c.name == name).unwrap().values
    }

    #[test]
    fn test_bullish_gap_detected() {
        // third candle's low clears the first candle's high
        let candles = make_colored(&[(100.0, 101.0), (101.0, 103.0), (103.0, 105.0)]);
        let mut cols = ColumnSet::default();
        gaps(&candles, &mut cols);
        assert_eq!(column(&cols, "fvg_bullish")[2], 1.0);
        let expected = (102.5 - 101.5) / 105.0 * 100.0;
        assert!((column(&cols, "fvg_bullish_size")[2] - expected).abs() < 1e-9);
        assert_eq!(column(&cols, "fvg_bearish")[2], 0.0);
    }

    fn zone_series() -> Vec<Candle> {
        // red candle at 1, then a >1% rally over the following three closes
        make_colored(&[
            (100.0, 100.0),
            (100.5, 100.0),
            (100.0, 100.6),
            (100.6, 101.0),
            (101.0, 101.5),
            (101.5, 101.5),
            (101.5, 101.5),
        ])
    }

    #[test]
    fn test_training_zone_stamped_on_formation_candle() {
        let mut cols = ColumnSet::default();
        zones(&zone_series(), FeatureMode::Training, &mut cols);
        let flags = column(&cols, "ob_bullish");
        assert_eq!(flags[1], 1.0);
        assert_eq!(column(&cols, "distance_to_ob_bull")[0], NO_SIGNAL_DISTANCE);
        assert_eq!(column(&cols, "distance_to_ob_bull")[1], 0.0);
        assert_eq!(column(&cols, "distance_to_ob_bull")[3], 2.0);
    }

    #[test]
    fn test_inference_zone_waits_for_confirmation() {
        let mut cols = ColumnSet::default();
        zones(&zone_series(), FeatureMode::Inference, &mut cols);
        let flags = column(&cols, "ob_bullish");
        assert_eq!(flags[1], 0.0);
        assert_eq!(flags[4], 1.0);
        let dist = column(&cols, "distance_to_ob_bull");
        assert_eq!(dist[3], NO_SIGNAL_DISTANCE);
        // distance still counts from the zone candle once confirmed
        assert_eq!(dist[4], 3.0);
    }

    #[test]
    fn test_swing_high_needs_strict_neighbourhood() {
        let candles = make_colored(&[
            (100.0, 101.0),
            (101.0, 102.0),
            (102.0, 105.0),
            (104.0, 103.0),
            (103.0, 101.0),
            (101.0, 100.0),
        ]);
        let mut cols = ColumnSet::default();
        swings(&candles, FeatureMode::Training, &mut cols);
        assert_eq!(column(&cols, "swing_high"), &[0.0, 0.0, 1.0, 0.0, 0.0, 0.0]);

        let mut live = ColumnSet::default();
        swings(&candles, FeatureMode::Inference, &mut live);
        assert_eq!(column(&live, "swing_high"), &[0.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    }
}
