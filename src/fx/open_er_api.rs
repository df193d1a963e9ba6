//! open.er-api.com rate client
//!
//! `GET {base_url}{FROM}` returns every quote for one base currency, so one
//! response serves all targets. Responses are cached per URL for an hour.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use cached::proc_macro::cached;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{CurrencyConverter, unavailable};
use crate::config::FxConfig;
use crate::error::WalletError;
use crate::money::Currency;

#[derive(Debug, Deserialize)]
struct LatestRates {
    result: String,
    /// Decoded straight into `Decimal`, never through `f64`
    #[serde(default)]
    rates: HashMap<String, Decimal>,
    #[serde(rename = "error-type", default)]
    error_type: Option<String>,
}

fn into_quotes(body: LatestRates) -> Result<HashMap<String, Decimal>, String> {
    if body.result != "success" {
        return Err(format!(
            "provider error: {}",
            body.error_type.as_deref().unwrap_or("unknown")
        ));
    }
    Ok(body
        .rates
        .into_iter()
        .filter(|(_, rate)| *rate > Decimal::ZERO)
        .map(|(code, rate)| (code.to_ascii_uppercase(), rate))
        .collect())
}

/// Fetch all quotes for one base currency with caching
#[cached(
    time = 3600,
    key = "String",
    convert = r#"{ url.clone() }"#,
    result = true
)]
async fn fetch_quotes(client: reqwest::Client, url: String) -> Result<HashMap<String, Decimal>, String> {
    tracing::debug!(url = %url, "[fx] Fetching exchange rates");
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| format!("request failed: {}", e))?
        .error_for_status()
        .map_err(|e| format!("bad status: {}", e))?;
    let body: LatestRates = response
        .json()
        .await
        .map_err(|e| format!("invalid body: {}", e))?;
    into_quotes(body)
}

pub struct OpenErApiConverter {
    client: reqwest::Client,
    base_url: String,
}

impl OpenErApiConverter {
    pub fn new(config: &FxConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    fn url_for(&self, base: &str) -> String {
        format!("{}{}", self.base_url, base)
    }
}

#[async_trait]
impl CurrencyConverter for OpenErApiConverter {
    fn name(&self) -> &'static str {
        "open-er-api"
    }

    async fn rate(&self, from: Currency, to: Currency) -> Result<Decimal, WalletError> {
        if from == to {
            return Ok(Decimal::ONE);
        }
        let quotes = fetch_quotes(self.client.clone(), self.url_for(from.as_str()))
            .await
            .map_err(|reason| unavailable(from, to, reason))?;
        quotes
            .get(to.as_str())
            .copied()
            .ok_or_else(|| unavailable(from, to, "currency not quoted"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_body_parsed() {
        let body: LatestRates = serde_json::from_str(
            r#"{"result":"success","base_code":"PEN","rates":{"PEN":1,"USD":0.2667,"BAD":0}}"#,
        )
        .unwrap();
        let quotes = into_quotes(body).unwrap();
        assert_eq!(quotes.get("PEN"), Some(&Decimal::ONE));
        assert_eq!(quotes.get("USD"), Some(&Decimal::new(2667, 4)));
        assert!(!quotes.contains_key("BAD"));
    }

    #[test]
    fn test_error_body_reported() {
        let body: LatestRates =
            serde_json::from_str(r#"{"result":"error","error-type":"unsupported-code"}"#).unwrap();
        let err = into_quotes(body).unwrap_err();
        assert!(err.contains("unsupported-code"));
    }

    #[test]
    fn test_long_fraction_kept_exact() {
        let body: LatestRates = serde_json::from_str(
            r#"{"result":"success","rates":{"EUR":0.1,"JPY":39.123456789012}}"#,
        )
        .unwrap();
        let quotes = into_quotes(body).unwrap();
        assert_eq!(quotes["EUR"], Decimal::new(1, 1));
        assert_eq!(quotes["JPY"].to_string(), "39.123456789012");
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_live_rate_lookup() {
        let converter = OpenErApiConverter::new(&FxConfig::default()).unwrap();
        let usd = Currency::parse("USD").unwrap();
        let pen = Currency::parse("PEN").unwrap();
        let rate = converter.rate(usd, pen).await.unwrap();
        assert!(rate > Decimal::ZERO);
    }
}
