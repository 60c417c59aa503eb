//! Binance public API client for market data (no authentication required)

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tracing::debug;

use crate::confluence::CandleSource;
use crate::types::Candle;

const DEFAULT_BASE_URL: &str = "https://api.binance.com";
const MAX_KLINES_PER_REQUEST: u32 = 1000;

/// Binance public market data client
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

/// Raw kline data from Binance API (array of arrays)
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct RawKline(
    i64,    // 0: Open time
    String, // 1: Open
    String, // 2: High
    String, // 3: Low
    String, // 4: Close
    String, // 5: Volume
    i64,    // 6: Close time
    String, // 7: Quote asset volume
    u64,    // 8: Number of trades
    String, // 9: Taker buy base
    String, // 10: Taker buy quote
    String, // 11: Ignore
);

/// Binance ticker price response
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct TickerPrice {
    symbol: String,
    price: String,
}

fn decimal_f64(raw: &str) -> Option<f64> {
    Decimal::from_str(raw).ok()?.to_f64()
}

impl RawKline {
    /// `None` when any price or volume string is not a number
    fn into_candle(self) -> Option<Candle> {
        Some(Candle {
            start_time: self.0,
            open: decimal_f64(&self.1)?,
            high: decimal_f64(&self.2)?,
            low: decimal_f64(&self.3)?,
            close: decimal_f64(&self.4)?,
            volume: decimal_f64(&self.5)?,
        })
    }
}

impl BinanceClient {
    /// Create a new Binance client with default base URL
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Fetch the most recent `limit` klines for a symbol, oldest first
    pub async fn get_klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Candle>> {
        let limit = limit.min(MAX_KLINES_PER_REQUEST);
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, interval, limit
        );

        debug!(symbol, interval, limit, "Fetching klines from Binance");

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Binance API error {}: {}", status, body);
        }

        let raw_klines: Vec<RawKline> = response.json().await?;
        let candles: Vec<Candle> = raw_klines.into_iter().filter_map(RawKline::into_candle).collect();

        debug!(symbol, interval, count = candles.len(), "Fetched klines");
        Ok(candles)
    }

    /// Get current price for a symbol
    pub async fn get_price(&self, symbol: &str) -> Result<f64> {
        let url = format!("{}/api/v3/ticker/price?symbol={}", self.base_url, symbol);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Binance API error {}: {}", status, body);
        }

        let ticker: TickerPrice = response.json().await?;
        decimal_f64(&ticker.price)
            .with_context(|| format!("Unparsable price {:?} for {}", ticker.price, symbol))
    }
}

#[async_trait]
impl CandleSource for BinanceClient {
    async fn get_candles(&self, symbol: &str, timeframe: &str, limit: u32) -> Result<Vec<Candle>> {
        self.get_klines(symbol, timeframe, limit).await
    }

    async fn get_current_price(&self, symbol: &str) -> Result<f64> {
        self.get_price(symbol).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        [1700000000000, "37000.10", "37100.00", "36950.50", "37050.25", "123.456",
         1700000899999, "4570000.0", 1500, "60.0", "2220000.0", "0"],
        [1700000900000, "37050.25", "bad", "37000.00", "37010.00", "80.0",
         1700001799999, "2960000.0", 900, "40.0", "1480000.0", "0"]
    ]"#;

    #[test]
    fn test_kline_parsing_skips_bad_rows() {
        let raw: Vec<RawKline> = serde_json::from_str(SAMPLE).unwrap();
        let candles: Vec<Candle> = raw.into_iter().filter_map(RawKline::into_candle).collect();
        assert_eq!(candles.len(), 1);
        let c = &candles[0];
        assert_eq!(c.start_time, 1_700_000_000_000);
        let approx = |a: f64, b: f64| (a - b).abs() < 1e-9;
        assert!(approx(c.open, 37000.10));
        assert!(approx(c.high, 37100.0));
        assert!(approx(c.low, 36950.5));
        assert!(approx(c.close, 37050.25));
        assert!(approx(c.volume, 123.456));
    }

    #[test]
    fn test_decimal_strings() {
        let tiny = decimal_f64("0.00001234").unwrap();
        assert!((tiny - 0.00001234).abs() < 1e-15);
        assert_eq!(decimal_f64("n/a"), None);
    }
}
