//! Ten-indicator vote tally
//!
//! Each indicator casts +1 (long), -1 (short) or 0 on the latest candle.

use serde::Serialize;

use super::indicators::IndicatorSeries;
use crate::types::Direction;

pub const VOTE_COUNT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndicatorVote {
    pub name: &'static str,
    pub vote: i8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    pub long: usize,
    pub short: usize,
    pub neutral: usize,
    pub votes: Vec<IndicatorVote>,
}

impl VoteTally {
    pub fn from_votes(votes: Vec<IndicatorVote>) -> Self {
        let long = votes.iter().filter(|v| v.vote > 0).count();
        let short = votes.iter().filter(|v| v.vote < 0).count();
        Self {
            long,
            short,
            neutral: votes.len() - long - short,
            votes,
        }
    }

    /// Tally with bare counts, no per-indicator detail
    pub fn counts(long: usize, short: usize, neutral: usize) -> Self {
        Self {
            long,
            short,
            neutral,
            votes: Vec::new(),
        }
    }

    pub fn matching(&self, direction: Direction) -> usize {
        match direction {
            Direction::Long => self.long,
            Direction::Short => self.short,
            Direction::Neutral => self.neutral,
        }
    }

    /// Both sides hold a sizeable share of the votes
    pub fn is_divided(&self) -> bool {
        self.long.min(self.short) >= 3
    }
}

fn sign(value: f64) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

/// +1 when `value` is below `low`, -1 above `high`
fn band(value: f64, low: f64, high: f64) -> i8 {
    if value < low {
        1
    } else if value > high {
        -1
    } else {
        0
    }
}

pub fn tally(closes: &[f64], s: &IndicatorSeries) -> VoteTally {
    let n = closes.len();
    if n < 2 {
        return VoteTally::from_votes(Vec::new());
    }
    let (i, p) = (n - 1, n - 2);
    let close = closes[i];

    let stoch = {
        let (k, d, pk, pd) = (s.stoch_k[i], s.stoch_d[i], s.stoch_k[p], s.stoch_d[p]);
        if k < 20.0 || (pk <= pd && k > d) {
            1
        } else if k > 80.0 || (pk >= pd && k < d) {
            -1
        } else {
            0
        }
    };

    let adx = if s.adx[i] > 20.0 {
        sign(s.plus_di[i] - s.minus_di[i])
    } else {
        0
    };

    let bb_position = {
        let width = s.bb_upper[i] - s.bb_lower[i];
        if width > 0.0 {
            band((close - s.bb_lower[i]) / width, 0.2, 0.8)
        } else {
            0
        }
    };

    let obv = if n >= 5 { sign(s.obv[i] - s.obv[n - 5]) } else { 0 };

    // NaN comparisons are false, so warming-up indicators vote neutral
    let votes = vec![
        IndicatorVote { name: "price_vs_ma7", vote: sign(close - s.fast_ma[i]) },
        IndicatorVote { name: "price_vs_ma25", vote: sign(close - s.slow_ma[i]) },
        IndicatorVote { name: "price_vs_ma99", vote: sign(close - s.long_ma[i]) },
        IndicatorVote { name: "rsi", vote: band(s.rsi[i], 40.0, 60.0) },
        IndicatorVote { name: "macd", vote: sign(s.macd[i] - s.macd_signal[i]) },
        IndicatorVote { name: "stochastic", vote: stoch },
        IndicatorVote { name: "adx", vote: adx },
        IndicatorVote { name: "bollinger", vote: bb_position },
        IndicatorVote { name: "obv", vote: obv },
        IndicatorVote { name: "roc", vote: sign(s.roc_10[i]) },
    ];
    VoteTally::from_votes(votes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::indicators::compute;
    use crate::scorer::ScorerConfig;
    use crate::types::test_support::{make_candles, random_walk};

    #[test]
    fn test_tally_always_has_ten_votes() {
        for seed in 0..10 {
            let candles = random_walk(150, seed);
            let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
            let s = compute(&candles, &ScorerConfig::default()).unwrap();
            let t = tally(&closes, &s);
            assert_eq!(t.votes.len(), VOTE_COUNT);
            assert_eq!(t.long + t.short + t.neutral, VOTE_COUNT);
        }
    }

    #[test]
    fn test_steady_uptrend_trend_votes_long() {
        let prices: Vec<f64> = (0..150).map(|i| 100.0 + i as f64 * 0.5).collect();
        let candles = make_candles(&prices);
        let s = compute(&candles, &ScorerConfig::default()).unwrap();
        let t = tally(&prices, &s);
        let vote = |name: &str| t.votes.iter().find(|v| v.name == name).unwrap().vote;
        assert_eq!(vote("price_vs_ma7"), 1);
        assert_eq!(vote("price_vs_ma25"), 1);
        assert_eq!(vote("price_vs_ma99"), 1);
        assert_eq!(vote("adx"), 1);
        assert_eq!(vote("roc"), 1);
        // oscillators read the same trend as stretched
        assert_eq!(vote("rsi"), -1);
    }

    #[test]
    fn test_divided_vote() {
        assert!(VoteTally::counts(4, 3, 3).is_divided());
        assert!(!VoteTally::counts(7, 2, 1).is_divided());
    }
}
