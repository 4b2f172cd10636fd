use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use common::{Candle, Error, MarketData, Result, Series};

const BASE_URL: &str = "https://api.binance.com";

/// REST client for Binance spot market data. Only public endpoints are
/// used, so no credentials or request signing are involved.
pub struct BinanceData {
    http: Client,
}

impl BinanceData {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            http: Client::builder()
                .use_rustls_tls()
                .timeout(request_timeout)
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::DataUnavailable(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::DataUnavailable(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::DataUnavailable(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }
}

#[async_trait]
impl MarketData for BinanceData {
    async fn get_series(&self, symbol: &str, timeframe: &str, lookback: usize) -> Result<Series> {
        let url =
            format!("{BASE_URL}/api/v3/klines?symbol={symbol}&interval={timeframe}&limit={lookback}");
        let body = self.get_text(&url).await?;

        let rows: Vec<KlineRow> =
            serde_json::from_str(&body).map_err(|e| Error::DataUnavailable(e.to_string()))?;
        if rows.is_empty() {
            return Err(Error::DataUnavailable(format!(
                "no candles returned for {symbol} {timeframe}"
            )));
        }

        let candles = rows
            .iter()
            .map(candle_from_row)
            .collect::<Result<Vec<Candle>>>()?;
        debug!(symbol, timeframe, count = candles.len(), "fetched klines");

        let series = Series::new(symbol, timeframe, candles);
        if !series.is_well_formed() {
            return Err(Error::DataUnavailable(format!(
                "malformed candle data for {symbol} {timeframe}"
            )));
        }
        Ok(series)
    }

    async fn current_price(&self, symbol: &str) -> Result<f64> {
        let url = format!("{BASE_URL}/api/v3/ticker/price?symbol={symbol}");
        let body = self.get_text(&url).await?;

        let ticker: PriceTicker =
            serde_json::from_str(&body).map_err(|e| Error::DataUnavailable(e.to_string()))?;
        ticker
            .price
            .parse::<f64>()
            .map_err(|e| Error::DataUnavailable(e.to_string()))
    }
}

// ─── Response types ───────────────────────────────────────────────────────────

/// One kline as Binance returns it: a positional array of open time,
/// OHLCV strings and fields we ignore.
#[derive(Debug, Deserialize)]
struct KlineRow(
    i64,    // open time (ms)
    String, // open
    String, // high
    String, // low
    String, // close
    String, // volume
    #[serde(default)] serde_json::Value,
    #[serde(default)] serde_json::Value,
    #[serde(default)] serde_json::Value,
    #[serde(default)] serde_json::Value,
    #[serde(default)] serde_json::Value,
    #[serde(default)] serde_json::Value,
);

#[derive(Deserialize)]
struct PriceTicker {
    price: String,
}

fn candle_from_row(row: &KlineRow) -> Result<Candle> {
    let timestamp = Utc
        .timestamp_millis_opt(row.0)
        .single()
        .ok_or_else(|| Error::DataUnavailable(format!("invalid kline timestamp {}", row.0)))?;
    Ok(Candle {
        timestamp,
        open: parse_price(&row.1)?,
        high: parse_price(&row.2)?,
        low: parse_price(&row.3)?,
        close: parse_price(&row.4)?,
    })
}

fn parse_price(raw: &str) -> Result<f64> {
    raw.parse::<f64>()
        .map_err(|_| Error::DataUnavailable(format!("unparseable price '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_kline_row() {
        let body = r#"[
            [1699920000000, "36500.1", "36750.5", "36420.0", "36600.2", "123.4",
             1699923599999, "0", 0, "0", "0", "0"]
        ]"#;
        let rows: Vec<KlineRow> = serde_json::from_str(body).unwrap();
        let candle = candle_from_row(&rows[0]).unwrap();
        assert_eq!(candle.open, 36500.1);
        assert_eq!(candle.high, 36750.5);
        assert_eq!(candle.low, 36420.0);
        assert_eq!(candle.close, 36600.2);
        assert_eq!(candle.timestamp.timestamp_millis(), 1_699_920_000_000);
    }

    #[test]
    fn garbage_price_is_a_data_error() {
        assert!(matches!(parse_price("n/a"), Err(Error::DataUnavailable(_))));
    }
}
