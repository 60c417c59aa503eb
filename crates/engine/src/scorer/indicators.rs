//! Indicator series for one timeframe
//!
//! Everything the sub-scores, votes and policies read is computed here in a
//! single pass per indicator. Oscillators and averages come from the `ta`
//! crate; ADX and the strict-window SMAs are computed directly.

use ta::indicators::{
    AverageTrueRange, BollingerBands, ExponentialMovingAverage, FastStochastic,
    MovingAverageConvergenceDivergence, OnBalanceVolume, RateOfChange, RelativeStrengthIndex,
    SimpleMovingAverage,
};
use ta::Next;

use super::ScorerConfig;
use crate::error::EngineResult;
use crate::features::rolling::rolling_mean;
use crate::types::Candle;

/// Aligned indicator series, one value per candle
#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub ema_9: Vec<f64>,
    pub ema_21: Vec<f64>,
    pub ema_50: Vec<f64>,
    pub ema_200: Vec<f64>,
    pub macd: Vec<f64>,
    pub macd_signal: Vec<f64>,
    pub rsi: Vec<f64>,
    pub stoch_k: Vec<f64>,
    pub stoch_d: Vec<f64>,
    pub bb_upper: Vec<f64>,
    pub bb_middle: Vec<f64>,
    pub bb_lower: Vec<f64>,
    pub bb_width: Vec<f64>,
    pub atr: Vec<f64>,
    pub obv: Vec<f64>,
    pub volume_ratio: Vec<f64>,
    pub roc_10: Vec<f64>,
    /// Strict-window SMAs used by the crossover detector and votes
    pub fast_ma: Vec<f64>,
    pub slow_ma: Vec<f64>,
    pub long_ma: Vec<f64>,
    pub adx: Vec<f64>,
    pub plus_di: Vec<f64>,
    pub minus_di: Vec<f64>,
}

fn run<I: Next<f64, Output = f64>>(mut indicator: I, closes: &[f64]) -> Vec<f64> {
    closes.iter().map(|c| indicator.next(*c)).collect()
}

pub fn compute(candles: &[Candle], config: &ScorerConfig) -> EngineResult<IndicatorSeries> {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();

    let mut macd_ind = MovingAverageConvergenceDivergence::new(12, 26, 9)?;
    let (macd, macd_signal): (Vec<f64>, Vec<f64>) = closes
        .iter()
        .map(|c| {
            let out = macd_ind.next(*c);
            (out.macd, out.signal)
        })
        .unzip();

    // %K raw, %D as SMA(3) of %K
    let mut stoch = FastStochastic::new(14)?;
    let stoch_k: Vec<f64> = candles.iter().map(|c| stoch.next(c)).collect();
    let stoch_d = run(SimpleMovingAverage::new(3)?, &stoch_k);

    let mut bb = BollingerBands::new(20, 2.0)?;
    let mut bb_upper = Vec::with_capacity(closes.len());
    let mut bb_middle = Vec::with_capacity(closes.len());
    let mut bb_lower = Vec::with_capacity(closes.len());
    for c in &closes {
        let out = bb.next(*c);
        bb_upper.push(out.upper);
        bb_middle.push(out.average);
        bb_lower.push(out.lower);
    }
    let bb_width: Vec<f64> = (0..closes.len())
        .map(|i| {
            if bb_middle[i] == 0.0 {
                0.0
            } else {
                (bb_upper[i] - bb_lower[i]) / bb_middle[i]
            }
        })
        .collect();

    let mut atr_ind = AverageTrueRange::new(14)?;
    let atr: Vec<f64> = candles.iter().map(|c| atr_ind.next(c)).collect();

    let mut obv_ind = OnBalanceVolume::new();
    let obv: Vec<f64> = candles.iter().map(|c| obv_ind.next(c)).collect();

    let volume_ma = rolling_mean(&volumes, 20);
    let volume_ratio: Vec<f64> = volumes
        .iter()
        .zip(&volume_ma)
        .map(|(v, m)| if *m > 0.0 { v / m } else { f64::NAN })
        .collect();

    let (adx, plus_di, minus_di) = directional_index(candles, 14);

    Ok(IndicatorSeries {
        ema_9: run(ExponentialMovingAverage::new(9)?, &closes),
        ema_21: run(ExponentialMovingAverage::new(21)?, &closes),
        ema_50: run(ExponentialMovingAverage::new(50)?, &closes),
        ema_200: run(ExponentialMovingAverage::new(200)?, &closes),
        macd,
        macd_signal,
        rsi: run(RelativeStrengthIndex::new(14)?, &closes),
        stoch_k,
        stoch_d,
        bb_upper,
        bb_middle,
        bb_lower,
        bb_width,
        atr,
        obv,
        volume_ratio,
        roc_10: run(RateOfChange::new(10)?, &closes),
        fast_ma: rolling_mean(&closes, config.fast_ma),
        slow_ma: rolling_mean(&closes, config.slow_ma),
        long_ma: rolling_mean(&closes, config.long_ma),
        adx,
        plus_di,
        minus_di,
    })
}

/// ADX with +DI / -DI, Wilder smoothing (alpha = 1/period).
///
/// Values before `2 * period` candles are NaN.
pub fn directional_index(candles: &[Candle], period: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let n = candles.len();
    let mut adx = vec![f64::NAN; n];
    let mut plus = vec![f64::NAN; n];
    let mut minus = vec![f64::NAN; n];
    if period == 0 {
        return (adx, plus, minus);
    }

    let alpha = 1.0 / period as f64;
    let (mut tr_s, mut plus_s, mut minus_s, mut adx_s) = (0.0, 0.0, 0.0, 0.0);

    for i in 1..n {
        let (c, prev) = (&candles[i], &candles[i - 1]);
        let tr = (c.high - c.low)
            .max((c.high - prev.close).abs())
            .max((c.low - prev.close).abs());
        let up_move = c.high - prev.high;
        let down_move = prev.low - c.low;
        let plus_dm = if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 };
        let minus_dm = if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 };

        if i == 1 {
            tr_s = tr;
            plus_s = plus_dm;
            minus_s = minus_dm;
        } else {
            tr_s = tr_s * (1.0 - alpha) + tr * alpha;
            plus_s = plus_s * (1.0 - alpha) + plus_dm * alpha;
            minus_s = minus_s * (1.0 - alpha) + minus_dm * alpha;
        }

        let (pdi, mdi) = if tr_s > 0.0 {
            (plus_s / tr_s * 100.0, minus_s / tr_s * 100.0)
        } else {
            (0.0, 0.0)
        };
        let di_sum = pdi + mdi;
        let dx = if di_sum > 0.0 { (pdi - mdi).abs() / di_sum * 100.0 } else { 0.0 };
        adx_s = if i == 1 { dx } else { adx_s * (1.0 - alpha) + dx * alpha };

        if i + 1 >= period * 2 {
            adx[i] = adx_s;
            plus[i] = pdi;
            minus[i] = mdi;
        }
    }
    (adx, plus, minus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_support::make_candles;

    #[test]
    fn test_series_are_aligned() {
        let prices: Vec<f64> = (0..120).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let candles = make_candles(&prices);
        let s = compute(&candles, &ScorerConfig::default()).unwrap();
        for series in [&s.ema_9, &s.macd, &s.rsi, &s.stoch_d, &s.bb_width, &s.obv, &s.adx, &s.long_ma] {
            assert_eq!(series.len(), candles.len());
        }
        assert!(s.slow_ma[23].is_nan());
        assert!(!s.slow_ma[24].is_nan());
    }

    #[test]
    fn test_adx_rises_in_steady_trend() {
        let prices: Vec<f64> = (0..80).map(|i| 100.0 + i as f64).collect();
        let (adx, plus, minus) = directional_index(&make_candles(&prices), 14);
        assert!(adx[26].is_nan());
        assert!(adx[79] > 20.0);
        assert!(plus[79] > minus[79]);
    }
}
