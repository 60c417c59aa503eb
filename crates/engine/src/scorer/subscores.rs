//! Signed sub-scores feeding the composite
//!
//! Each reads the latest (and where needed previous) values of the indicator
//! series. Sub-scores are unbounded; only the composite is clamped.

use serde::Serialize;

use super::candles::Pattern;
use super::indicators::IndicatorSeries;

/// One component of the composite with its state label and the rules that
/// fired.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubScore {
    pub score: f64,
    pub state: &'static str,
    pub signals: Vec<&'static str>,
}

/// Average one-step change over the last `window` values
fn mean_diff(xs: &[f64], window: usize) -> f64 {
    let n = xs.len();
    if n < window || window < 2 {
        return 0.0;
    }
    (xs[n - 1] - xs[n - window]) / (window - 1) as f64
}

pub fn trend(closes: &[f64], s: &IndicatorSeries) -> SubScore {
    let i = closes.len() - 1;
    let price = closes[i];
    let (e9, e21, e50, e200) = (s.ema_9[i], s.ema_21[i], s.ema_50[i], s.ema_200[i]);
    let mut score = 0.0;
    let mut signals = Vec::new();

    if e9 > e21 && e21 > e50 && e50 > e200 {
        score += 25.0;
        signals.push("ema stack bullish");
    } else if e9 > e21 && e21 > e50 {
        score += 15.0;
        signals.push("short emas bullish");
    } else if e21 > e50 && e50 > e200 {
        score += 10.0;
        signals.push("long emas bullish");
    } else if e9 < e21 && e21 < e50 && e50 < e200 {
        score -= 25.0;
        signals.push("ema stack bearish");
    } else if e9 < e21 && e21 < e50 {
        score -= 15.0;
        signals.push("short emas bearish");
    } else if e21 < e50 && e50 < e200 {
        score -= 10.0;
        signals.push("long emas bearish");
    }

    score += if price > e9 { 5.0 } else { -5.0 };
    if price > e200 {
        score += 10.0;
        signals.push("above ema200");
    } else {
        score -= 10.0;
        signals.push("below ema200");
    }

    if i > 0 && s.macd[i].is_finite() && s.macd_signal[i].is_finite() {
        let diff = s.macd[i] - s.macd_signal[i];
        let prev = s.macd[i - 1] - s.macd_signal[i - 1];
        if diff > 0.0 && prev <= 0.0 {
            score += 15.0;
            signals.push("macd crossed up");
        } else if diff > 0.0 {
            score += 8.0;
            signals.push("macd bullish");
        } else if diff < 0.0 && prev >= 0.0 {
            score -= 15.0;
            signals.push("macd crossed down");
        } else if diff < 0.0 {
            score -= 8.0;
            signals.push("macd bearish");
        }
    }

    let state = if score > 15.0 {
        "bullish"
    } else if score < -15.0 {
        "bearish"
    } else {
        "lateral"
    };
    SubScore { score, state, signals }
}

pub fn momentum(closes: &[f64], s: &IndicatorSeries) -> SubScore {
    let i = closes.len() - 1;
    let rsi = s.rsi[i];
    if !rsi.is_finite() {
        return SubScore {
            score: 0.0,
            state: "neutral",
            signals: vec!["rsi unavailable"],
        };
    }
    let mut score = 0.0;
    let mut signals = Vec::new();

    if rsi < 30.0 {
        score += 20.0;
        signals.push("rsi oversold");
    } else if rsi < 40.0 {
        score += 10.0;
        signals.push("rsi low");
    } else if rsi > 70.0 {
        score -= 20.0;
        signals.push("rsi overbought");
    } else if rsi > 60.0 {
        score -= 10.0;
        signals.push("rsi high");
    }

    let rsi_trend = mean_diff(&s.rsi, 5);
    let price_trend = mean_diff(closes, 5);
    if rsi_trend > 0.0 && price_trend < 0.0 {
        score += 15.0;
        signals.push("bullish rsi divergence");
    } else if rsi_trend < 0.0 && price_trend > 0.0 {
        score -= 15.0;
        signals.push("bearish rsi divergence");
    }

    let (k, d) = (s.stoch_k[i], s.stoch_d[i]);
    if i > 0 && k.is_finite() && d.is_finite() {
        if k < 20.0 {
            score += 10.0;
            signals.push("stochastic oversold");
        } else if k > 80.0 {
            score -= 10.0;
            signals.push("stochastic overbought");
        }
        let (pk, pd) = (s.stoch_k[i - 1], s.stoch_d[i - 1]);
        if k > d && pk <= pd && k < 50.0 {
            score += 15.0;
            signals.push("stochastic crossed up");
        } else if k < d && pk >= pd && k > 50.0 {
            score -= 15.0;
            signals.push("stochastic crossed down");
        }
    }

    let state = if score > 15.0 {
        "strong_bullish"
    } else if score > 5.0 {
        "bullish"
    } else if score < -15.0 {
        "strong_bearish"
    } else if score < -5.0 {
        "bearish"
    } else {
        "neutral"
    };
    SubScore { score, state, signals }
}

pub fn volatility(closes: &[f64], s: &IndicatorSeries) -> SubScore {
    let i = closes.len() - 1;
    let price = closes[i];
    let (upper, lower) = (s.bb_upper[i], s.bb_lower[i]);
    let band = upper - lower;
    if !(upper.is_finite() && lower.is_finite()) {
        return SubScore {
            score: 0.0,
            state: "normal",
            signals: vec!["bollinger unavailable"],
        };
    }
    let mut score = 0.0;
    let mut signals = Vec::new();

    let position = if band > 0.0 { (price - lower) / band } else { 0.5 };
    if price <= lower {
        score += 20.0;
        signals.push("at lower band");
    } else if position < 0.3 {
        score += 10.0;
        signals.push("near lower band");
    } else if price >= upper {
        score -= 20.0;
        signals.push("at upper band");
    } else if position > 0.7 {
        score -= 10.0;
        signals.push("near upper band");
    }

    let recent = &s.bb_width[s.bb_width.len().saturating_sub(20)..];
    let avg_width = recent.iter().sum::<f64>() / recent.len() as f64;
    if s.bb_width[i] < avg_width * 0.7 {
        score += 5.0;
        signals.push("squeeze");
    }

    let state = if score > 10.0 {
        "oversold"
    } else if score < -10.0 {
        "overbought"
    } else {
        "normal"
    };
    SubScore { score, state, signals }
}

pub fn volume(closes: &[f64], s: &IndicatorSeries) -> SubScore {
    let i = closes.len() - 1;
    let ratio = if s.volume_ratio[i].is_finite() { s.volume_ratio[i] } else { 1.0 };
    let mut score = 0.0;
    let mut signals = Vec::new();

    if ratio > 2.0 {
        score += 15.0;
        signals.push("extreme volume");
    } else if ratio > 1.5 {
        score += 10.0;
        signals.push("high volume");
    } else if ratio < 0.5 {
        score -= 5.0;
        signals.push("low volume");
    }

    let obv_trend = mean_diff(&s.obv, 5);
    let price_trend = mean_diff(closes, 5);
    if obv_trend > 0.0 && price_trend > 0.0 {
        score += 10.0;
        signals.push("obv confirms uptrend");
    } else if obv_trend < 0.0 && price_trend < 0.0 {
        score -= 10.0;
        signals.push("obv confirms downtrend");
    } else if obv_trend > 0.0 && price_trend < 0.0 {
        score += 15.0;
        signals.push("bullish obv divergence");
    } else if obv_trend < 0.0 && price_trend > 0.0 {
        score -= 15.0;
        signals.push("bearish obv divergence");
    }

    let state = if score > 10.0 {
        "accumulation"
    } else if score < -10.0 {
        "distribution"
    } else {
        "neutral"
    };
    SubScore { score, state, signals }
}

pub fn pattern_score(patterns: &[Pattern]) -> f64 {
    patterns.iter().map(|p| p.score()).sum()
}

/// Weighted sum shifted by +50 and clamped. Raw magnitudes past +/-50
/// saturate at the bounds.
pub fn composite(trend: f64, momentum: f64, volatility: f64, volume: f64, patterns: f64) -> f64 {
    let raw = trend * 0.35 + momentum * 0.30 + volatility * 0.15 + volume * 0.15 + patterns * 0.05;
    (raw + 50.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_offset_and_saturation() {
        assert_eq!(composite(0.0, 0.0, 0.0, 0.0, 0.0), 50.0);
        assert!((composite(40.0, 20.0, 0.0, 0.0, 0.0) - 70.0).abs() < 1e-9);
        assert_eq!(composite(200.0, 100.0, 50.0, 50.0, 100.0), 100.0);
        assert_eq!(composite(-200.0, -100.0, -50.0, -50.0, -100.0), 0.0);
    }

    #[test]
    fn test_mean_diff_uses_window_endpoints() {
        // last five are [9, 2, 3, 4, 5]: steps -7, 1, 1, 1
        assert_eq!(mean_diff(&[1.0, 9.0, 2.0, 3.0, 4.0, 5.0], 5), -1.0);
        // zig-zag middle values cancel, only the endpoints count
        let steps = [0.0, 10.0, -4.0, 7.0, 2.0];
        let naive: f64 = steps.windows(2).map(|w| w[1] - w[0]).sum::<f64>() / 4.0;
        assert_eq!(mean_diff(&steps, 5), 0.5);
        assert_eq!(mean_diff(&steps, 5), naive);
        assert_eq!(mean_diff(&[1.0], 5), 0.0);
    }
}
