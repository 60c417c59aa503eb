//! Series helpers with trailing-window semantics.
//!
//! Every helper returns a vector the same length as its input. Rows without a
//! full window (or whose window contains a NaN) are `f64::NAN`.

/// Guard added to denominators that may legitimately be zero
pub const EPSILON: f64 = 1e-10;

fn windows_map(xs: &[f64], window: usize, f: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let mut out = vec![f64::NAN; xs.len()];
    if window == 0 || xs.len() < window {
        return out;
    }
    for end in (window - 1)..xs.len() {
        let slice = &xs[end + 1 - window..=end];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        out[end] = f(slice);
    }
    out
}

pub fn rolling_sum(xs: &[f64], window: usize) -> Vec<f64> {
    windows_map(xs, window, |w| w.iter().sum())
}

pub fn rolling_mean(xs: &[f64], window: usize) -> Vec<f64> {
    windows_map(xs, window, |w| w.iter().sum::<f64>() / w.len() as f64)
}

/// Sample standard deviation (n - 1 denominator)
pub fn rolling_std(xs: &[f64], window: usize) -> Vec<f64> {
    windows_map(xs, window, sample_std)
}

pub fn sample_std(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return f64::NAN;
    }
    let mean = xs.iter().sum::<f64>() / xs.len() as f64;
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (xs.len() - 1) as f64;
    var.sqrt()
}

/// Population standard deviation (n denominator)
pub fn population_std(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    let mean = xs.iter().sum::<f64>() / xs.len() as f64;
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / xs.len() as f64;
    var.sqrt()
}

/// `xs[i] - xs[i - lag]`
pub fn diff(xs: &[f64], lag: usize) -> Vec<f64> {
    (0..xs.len())
        .map(|i| if i >= lag { xs[i] - xs[i - lag] } else { f64::NAN })
        .collect()
}

/// `xs[i] / xs[i - lag] - 1`, zero when the base is zero
pub fn pct_change(xs: &[f64], lag: usize) -> Vec<f64> {
    (0..xs.len())
        .map(|i| {
            if i < lag {
                f64::NAN
            } else if xs[i - lag] == 0.0 {
                0.0
            } else {
                xs[i] / xs[i - lag] - 1.0
            }
        })
        .collect()
}

/// `a / b`, or `fallback` when `b` is zero. NaN operands propagate.
pub fn ratio_or(a: f64, b: f64, fallback: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if b == 0.0 {
        fallback
    } else {
        a / b
    }
}

/// 1.0 / 0.0 indicator for a condition, NaN if the inputs are missing
pub fn flag(missing: bool, condition: bool) -> f64 {
    if missing {
        f64::NAN
    } else if condition {
        1.0
    } else {
        0.0
    }
}

/// Candles since the most recent set flag, 0 on the flag itself and
/// `no_signal` before the first one.
pub fn distance_since(flags: &[bool], no_signal: f64) -> Vec<f64> {
    let mut last: Option<usize> = None;
    flags
        .iter()
        .enumerate()
        .map(|(i, &set)| {
            if set {
                last = Some(i);
            }
            match last {
                Some(j) => (i - j) as f64,
                None => no_signal,
            }
        })
        .collect()
}
