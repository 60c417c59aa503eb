//! Order flow: signed volume delta, CVD, buy/sell pressure, relative volume
//! and the rolling VWAP.

use super::rolling::{diff, flag, ratio_or, rolling_mean, rolling_sum, EPSILON};
use super::ColumnSet;
use crate::types::Candle;

/// Body smaller than this share of the range counts as a doji
const DOJI_BODY_RATIO: f64 = 0.1;

/// Volume signed by who won the candle.
///
/// Near-doji candles carry no clear winner, so they are signed by the close
/// relative to the previous close instead.
pub(super) fn volume_delta(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let is_doji = c.body() < c.range() * DOJI_BODY_RATIO;
            let buying = if is_doji {
                i > 0 && c.close > candles[i - 1].close
            } else {
                c.is_bullish()
            };
            if buying {
                c.volume
            } else {
                -c.volume
            }
        })
        .collect()
}

pub(super) fn order_flow(candles: &[Candle], cols: &mut ColumnSet) {
    let delta = volume_delta(candles);

    let cvd: Vec<f64> = delta
        .iter()
        .scan(0.0, |acc, d| {
            *acc += d;
            Some(*acc)
        })
        .collect();
    let cvd_momentum = diff(&cvd, 5);
    let cvd_ma20 = rolling_mean(&cvd, 20);
    let cvd_deviation: Vec<f64> = cvd.iter().zip(&cvd_ma20).map(|(c, m)| c - m).collect();

    let buys: Vec<f64> = delta.iter().map(|d| d.max(0.0)).collect();
    let sells: Vec<f64> = delta.iter().map(|d| (-d).max(0.0)).collect();
    let buy_sell_ratio: Vec<f64> = rolling_sum(&buys, 10)
        .iter()
        .zip(rolling_sum(&sells, 10))
        .map(|(b, s)| b / (s + EPSILON))
        .collect();

    cols.push_intermediate("delta", 0, delta);
    cols.push("cvd", 0, cvd);
    cols.push("cvd_momentum", 5, cvd_momentum);
    cols.push_intermediate("cvd_ma20", 19, cvd_ma20);
    cols.push("cvd_deviation", 19, cvd_deviation);
    cols.push("buy_sell_ratio", 9, buy_sell_ratio);
}

pub(super) fn volume_profile(candles: &[Candle], cols: &mut ColumnSet) {
    let volume: Vec<f64> = candles.iter().map(|c| c.volume).collect();
    let ma20 = rolling_mean(&volume, 20);
    let ma5 = rolling_mean(&volume, 5);

    let ratio: Vec<f64> = volume.iter().zip(&ma20).map(|(v, m)| v / (m + EPSILON)).collect();
    let trend: Vec<f64> = ma5.iter().zip(&ma20).map(|(s, l)| ratio_or(*s, *l, 1.0)).collect();
    let high: Vec<f64> = volume
        .iter()
        .zip(&ma20)
        .map(|(v, m)| flag(m.is_nan(), *v > 2.0 * m))
        .collect();

    cols.push_intermediate("volume_ma20", 19, ma20);
    cols.push("volume_ratio", 19, ratio);
    cols.push("volume_trend", 19, trend);
    cols.push("high_volume", 19, high);
}

/// Rolling VWAP over typical price. No session boundaries are known, so a
/// fixed trailing window stands in for a daily reset.
pub(super) fn vwap(candles: &[Candle], window: usize, cols: &mut ColumnSet) {
    let typical: Vec<f64> = candles
        .iter()
        .map(|c| (c.high + c.low + c.close) / 3.0)
        .collect();
    let pv: Vec<f64> = typical.iter().zip(candles).map(|(t, c)| t * c.volume).collect();
    let volume: Vec<f64> = candles.iter().map(|c| c.volume).collect();

    let pv_sum = rolling_sum(&pv, window);
    let vol_sum = rolling_sum(&volume, window);

    // A window with no traded volume has no VWAP; fall back to the close.
    let vwap: Vec<f64> = pv_sum
        .iter()
        .zip(&vol_sum)
        .zip(candles)
        .map(|((p, v), c)| ratio_or(*p, *v, c.close))
        .collect();
    let deviation: Vec<f64> = vwap
        .iter()
        .zip(candles)
        .map(|(w, c)| ratio_or(c.close - w, *w, 0.0) * 100.0)
        .collect();
    let above: Vec<f64> = vwap
        .iter()
        .zip(candles)
        .map(|(w, c)| flag(w.is_nan(), c.close > *w))
        .collect();

    let warmup = window.saturating_sub(1);
    cols.push_intermediate("vwap_rolling", warmup, vwap);
    cols.push("vwap_deviation", warmup, deviation);
    cols.push("above_vwap", warmup, above);
}
