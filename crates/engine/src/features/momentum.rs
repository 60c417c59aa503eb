//! Rate of change, momentum acceleration and candle shape ratios.

use super::rolling::{diff, pct_change, EPSILON};
use super::ColumnSet;
use crate::types::Candle;

fn pct_of(value: f64, close: f64) -> f64 {
    if close == 0.0 {
        0.0
    } else {
        value / close * 100.0
    }
}

pub(super) fn price_momentum(candles: &[Candle], cols: &mut ColumnSet) {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let roc = |period: usize| -> Vec<f64> {
        pct_change(&closes, period).iter().map(|r| r * 100.0).collect()
    };

    let roc_5 = roc(5);
    let accel = diff(&roc_5, 3);

    let body: Vec<f64> = candles.iter().map(|c| pct_of(c.body(), c.close)).collect();
    let upper: Vec<f64> = candles.iter().map(|c| pct_of(c.upper_wick(), c.close)).collect();
    let lower: Vec<f64> = candles.iter().map(|c| pct_of(c.lower_wick(), c.close)).collect();
    let wick_body: Vec<f64> = (0..candles.len())
        .map(|i| (upper[i] + lower[i]) / (body[i] + EPSILON))
        .collect();

    cols.push("roc_5", 5, roc_5);
    cols.push("roc_10", 10, roc(10));
    cols.push("roc_20", 20, roc(20));
    cols.push("momentum_accel", 8, accel);
    cols.push("body_size", 0, body);
    cols.push("upper_wick_pct", 0, upper);
    cols.push("lower_wick_pct", 0, lower);
    cols.push("wick_body_ratio", 0, wick_body);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::make_colored;

    #[test]
    fn test_candle_shape_percentages() {
        // body 2, wicks 0.5 each on a close of 100
        let candles = make_colored(&[(98.0, 100.0)]);
        let mut cols = ColumnSet::default();
        price_momentum(&candles, &mut cols);
        let get = |name: &str| cols.columns.iter().find(|c| c.name == name).unwrap().values[0];
        assert!((get("body_size") - 2.0).abs() < 1e-9);
        assert!((get("upper_wick_pct") - 0.5).abs() < 1e-9);
        assert!((get("wick_body_ratio") - 0.5).abs() < 1e-6);
        assert!(get("roc_5").is_nan());
    }

    #[test]
    fn test_roc_and_acceleration() {
        let pairs: Vec<(f64, f64)> = (0..12).map(|i| (100.0, 100.0 + i as f64)).collect();
        let candles = make_colored(&pairs);
        let mut cols = ColumnSet::default();
        price_momentum(&candles, &mut cols);
        let roc_5 = &cols.columns.iter().find(|c| c.name == "roc_5").unwrap().values;
        assert!((roc_5[5] - 5.0).abs() < 1e-9);
        let accel = &cols.columns.iter().find(|c| c.name == "momentum_accel").unwrap().values;
        assert!(accel[7].is_nan());
        assert!((accel[8] - (roc_5[8] - roc_5[5])).abs() < 1e-12);
    }
}
