//! Volatility and regime features: ATR, realized volatility and its z-score,
//! Bollinger geometry and the rolling Hurst exponent.

use super::rolling::{
    pct_change, population_std, ratio_or, rolling_mean, rolling_std, EPSILON,
};
use super::{ColumnSet, HURST_DEFAULT};
use crate::types::Candle;

const ATR_PERIOD: usize = 14;
const VOL_WINDOW: usize = 20;
const VOL_ZSCORE_WINDOW: usize = 50;
const BB_PERIOD: usize = 20;
const BB_STD: f64 = 2.0;

/// First row with a defined volatility z-score
pub(super) const VOL_ZSCORE_WARMUP: usize = VOL_WINDOW + VOL_ZSCORE_WINDOW - 1;

/// Hurst above this reads as trending
const TRENDING_HURST: f64 = 0.55;
/// Hurst below this reads as mean-reverting
const RANGING_HURST: f64 = 0.45;
/// Shortest series a Hurst estimate is attempted on
const HURST_MIN_SAMPLES: usize = 20;
const HURST_MAX_LAG: usize = 20;

pub(super) fn true_range(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let hl = c.high - c.low;
            if i == 0 {
                return hl;
            }
            let prev = candles[i - 1].close;
            hl.max((c.high - prev).abs()).max((c.low - prev).abs())
        })
        .collect()
}

pub(super) fn volatility(candles: &[Candle], cols: &mut ColumnSet) {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

    let atr = rolling_mean(&true_range(candles), ATR_PERIOD);
    let atr_percent: Vec<f64> = atr
        .iter()
        .zip(&closes)
        .map(|(a, c)| ratio_or(*a, *c, 0.0) * 100.0)
        .collect();

    let returns = pct_change(&closes, 1);
    let vol: Vec<f64> = rolling_std(&returns, VOL_WINDOW)
        .iter()
        .map(|s| s * (VOL_WINDOW as f64).sqrt())
        .collect();
    let vol_mean = rolling_mean(&vol, VOL_ZSCORE_WINDOW);
    let vol_std = rolling_std(&vol, VOL_ZSCORE_WINDOW);
    let zscore: Vec<f64> = vol
        .iter()
        .zip(vol_mean.iter().zip(&vol_std))
        .map(|(v, (m, s))| (v - m) / (s + EPSILON))
        .collect();

    let mid = rolling_mean(&closes, BB_PERIOD);
    let std = rolling_std(&closes, BB_PERIOD);
    let upper: Vec<f64> = mid.iter().zip(&std).map(|(m, s)| m + BB_STD * s).collect();
    let lower: Vec<f64> = mid.iter().zip(&std).map(|(m, s)| m - BB_STD * s).collect();
    let width: Vec<f64> = (0..closes.len())
        .map(|i| ratio_or(upper[i] - lower[i], mid[i], 0.0))
        .collect();
    // Collapsed bands put the close in the middle
    let position: Vec<f64> = (0..closes.len())
        .map(|i| ratio_or(closes[i] - lower[i], upper[i] - lower[i], 0.5))
        .collect();

    let bb_warmup = BB_PERIOD - 1;
    cols.push("atr", ATR_PERIOD - 1, atr);
    cols.push("atr_percent", ATR_PERIOD - 1, atr_percent);
    cols.push("volatility", VOL_WINDOW, vol);
    cols.push("volatility_zscore", VOL_ZSCORE_WARMUP, zscore);
    cols.push_intermediate("bb_upper", bb_warmup, upper);
    cols.push_intermediate("bb_lower", bb_warmup, lower);
    cols.push("bb_width", bb_warmup, width);
    cols.push("bb_position", bb_warmup, position);
}

/// Hurst exponent of a price series from the scaling of lagged differences.
///
/// Returns 0.5 when the series is shorter than 20 samples or the log-log fit
/// is degenerate; otherwise the fitted slope clipped to [0, 1].
pub fn hurst_exponent(prices: &[f64]) -> f64 {
    let n = prices.len();
    if n < HURST_MIN_SAMPLES {
        return HURST_DEFAULT;
    }

    let max_lag = HURST_MAX_LAG.min(n / 2);
    let mut xs = Vec::with_capacity(max_lag);
    let mut ys = Vec::with_capacity(max_lag);
    for lag in 2..max_lag {
        let diffs: Vec<f64> = (lag..n).map(|i| prices[i] - prices[i - lag]).collect();
        let tau = population_std(&diffs);
        if !(tau.is_finite() && tau > 0.0) {
            return HURST_DEFAULT;
        }
        xs.push((lag as f64).ln());
        ys.push(tau.ln());
    }

    match slope(&xs, &ys) {
        Some(h) if h.is_finite() => h.clamp(0.0, 1.0),
        _ => HURST_DEFAULT,
    }
}

/// Least-squares slope of y on x
fn slope(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mx = xs.iter().sum::<f64>() / n;
    let my = ys.iter().sum::<f64>() / n;
    let sxy: f64 = xs.iter().zip(ys).map(|(x, y)| (x - mx) * (y - my)).sum();
    let sxx: f64 = xs.iter().map(|x| (x - mx).powi(2)).sum();
    if sxx == 0.0 {
        None
    } else {
        Some(sxy / sxx)
    }
}

pub(super) fn hurst(candles: &[Candle], window: usize, cols: &mut ColumnSet) {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let warmup = window.saturating_sub(1);

    let values: Vec<f64> = (0..closes.len())
        .map(|i| {
            if i < warmup {
                HURST_DEFAULT
            } else {
                hurst_exponent(&closes[i + 1 - window.max(1)..=i])
            }
        })
        .collect();
    let trending: Vec<f64> = values
        .iter()
        .map(|h| if *h > TRENDING_HURST { 1.0 } else { 0.0 })
        .collect();
    let ranging: Vec<f64> = values
        .iter()
        .map(|h| if *h < RANGING_HURST { 1.0 } else { 0.0 })
        .collect();

    cols.push_with_default("hurst", warmup, HURST_DEFAULT, values);
    cols.push("regime_trending", 0, trending);
    cols.push("regime_ranging", 0, ranging);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::{make_candles, random_walk};

    #[test]
    fn test_hurst_short_window_is_random_walk() {
        let prices: Vec<f64> = (0..19).map(|i| 100.0 + i as f64).collect();
        assert_eq!(hurst_exponent(&prices), 0.5);
    }

    #[test]
    fn test_hurst_flat_window_is_default() {
        assert_eq!(hurst_exponent(&[42.0; 100]), 0.5);
    }

    #[test]
    fn test_hurst_accelerating_trend_is_persistent() {
        // Spread of lagged differences grows linearly with the lag
        let prices: Vec<f64> = (0..100).map(|i| 100.0 + 0.01 * (i * i) as f64).collect();
        assert!(hurst_exponent(&prices) > 0.8);
    }

    #[test]
    fn test_hurst_degenerate_lag_spread_is_default() {
        let prices: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { 101.0 } else { 99.0 }).collect();
        // Even lags have zero spread, so the fit is degenerate
        assert_eq!(hurst_exponent(&prices), 0.5);
    }

    #[test]
    fn test_hurst_always_bounded() {
        for seed in 0..20 {
            let closes: Vec<f64> = random_walk(150, seed).iter().map(|c| c.close).collect();
            for end in [20, 37, 64, 100, 150] {
                let h = hurst_exponent(&closes[..end]);
                assert!((0.0..=1.0).contains(&h), "seed {} end {}: {}", seed, end, h);
            }
        }
    }

    #[test]
    fn test_true_range_uses_previous_close() {
        let mut candles = make_candles(&[100.0, 110.0]);
        candles[1].low = 105.0;
        let tr = true_range(&candles);
        assert!((tr[0] - (candles[0].high - candles[0].low)).abs() < 1e-9);
        assert!((tr[1] - (candles[1].high - 100.0)).abs() < 1e-9);
    }
}
