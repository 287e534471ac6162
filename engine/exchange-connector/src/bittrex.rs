//! Bittrex v1.1 REST adapter
//!
//! Every call is a GET. Private calls carry `apikey` and `nonce` in the query
//! string and an `apisign` header holding the HMAC-SHA512 of the full URL.
//! Responses are wrapped in a `{success, message, result}` envelope.

use crate::error::{ExchangeError, Result};
use crate::exchange::Exchange;
use crate::signing::{hmac_sha512_hex, nonce_millis};
use crate::types::{f64_from_number_or_string, f64_or_zero, Side, Ticker};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const BITTREX_API: &str = "https://bittrex.com/api/v1.1";

/// `{success, message, result}` wrapper used by Bittrex-style venues
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

/// Unwrap an envelope body into its `result`, turning `success: false` into an API error
pub(crate) fn decode_envelope<T: DeserializeOwned>(body: &str) -> Result<T> {
    let envelope: Envelope = serde_json::from_str(body)?;
    if !envelope.success {
        let message = envelope.message.unwrap_or_else(|| "unknown error".to_string());
        return Err(ExchangeError::from_api_message(message));
    }
    let result = envelope.result.unwrap_or(serde_json::Value::Null);
    serde_json::from_value(result).map_err(|e| ExchangeError::decode(format!("result: {e}")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TickerResult {
    #[serde(deserialize_with = "f64_from_number_or_string")]
    bid: f64,
    #[serde(deserialize_with = "f64_from_number_or_string")]
    ask: f64,
    #[serde(deserialize_with = "f64_from_number_or_string")]
    last: f64,
}

#[derive(Debug, Deserialize)]
struct OpenOrder {
    #[serde(rename = "OrderUuid")]
    order_uuid: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct BalanceEntry {
    pub currency: String,
    #[serde(default, deserialize_with = "f64_or_zero")]
    pub available: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlacedOrder {
    pub uuid: String,
}

pub(crate) fn find_available(balances: &[BalanceEntry], asset: &str) -> f64 {
    balances.iter().find(|b| b.currency == asset).map(|b| b.available).unwrap_or(0.0)
}

/// Bittrex venue adapter
///
/// v1.1 `buylimit`/`selllimit` take no post-only flag, so orders placed here can
/// take liquidity if the book has moved through their rate.
pub struct BittrexClient {
    api_key: String,
    secret: String,
    base_url: String,
    client: Client,
}

impl BittrexClient {
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_key: api_key.into(),
            secret: secret.into(),
            base_url: BITTREX_API.to_string(),
            client,
        })
    }

    /// Point the adapter at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn public_url(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        Url::parse_with_params(&format!("{}/{}", self.base_url, path), params)
            .map_err(|e| ExchangeError::decode(format!("invalid url: {e}")))
    }

    fn private_url(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut all = vec![("apikey", self.api_key.clone()), ("nonce", nonce_millis().to_string())];
        all.extend(params.iter().cloned());
        self.public_url(path, &all)
    }

    pub(crate) fn order_url(&self, side: Side, market: &str, quantity: f64, rate: f64) -> Result<Url> {
        let path = match side {
            Side::Buy => "market/buylimit",
            Side::Sell => "market/selllimit",
        };
        self.private_url(
            path,
            &[
                ("market", market.to_string()),
                ("quantity", quantity.to_string()),
                ("rate", rate.to_string()),
            ],
        )
    }

    async fn send<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!("Bittrex request: {}", url.path());
        let sign = hmac_sha512_hex(self.secret.as_bytes(), url.as_str().as_bytes())?;
        let body = self.client.get(url).header("apisign", sign).send().await?.text().await?;
        decode_envelope(&body)
    }
}

#[async_trait]
impl Exchange for BittrexClient {
    fn name(&self) -> &'static str {
        "bittrex"
    }

    async fn place_order(&self, side: Side, market: &str, quantity: f64, rate: f64) -> Result<String> {
        let url = self.order_url(side, market, quantity, rate)?;
        let placed: PlacedOrder = self.send(url).await?;
        Ok(placed.uuid)
    }

    async fn open_orders(&self, market: &str) -> Result<HashSet<String>> {
        let url = self.private_url("market/getopenorders", &[("market", market.to_string())])?;
        let orders: Option<Vec<OpenOrder>> = self.send(url).await?;
        Ok(orders.unwrap_or_default().into_iter().map(|o| o.order_uuid).collect())
    }

    async fn cancel_order(&self, order_id: &str) -> Result<()> {
        let url = self.private_url("market/cancel", &[("uuid", order_id.to_string())])?;
        let _: serde_json::Value = self.send(url).await?;
        Ok(())
    }

    async fn ticker(&self, market: &str) -> Result<Ticker> {
        let url = self.public_url("public/getticker", &[("market", market.to_string())])?;
        let t: TickerResult = self.send(url).await?;
        Ok(Ticker { bid: t.bid, ask: t.ask, last: t.last })
    }

    async fn available_balance(&self, asset: &str) -> Result<f64> {
        let url = self.private_url("account/getbalances", &[])?;
        let balances: Option<Vec<BalanceEntry>> = self.send(url).await?;
        Ok(find_available(&balances.unwrap_or_default(), asset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> BittrexClient {
        BittrexClient::new("key123", "secret", Duration::from_secs(5))
            .unwrap()
            .with_base_url("https://api.test/v1.1")
    }

    #[test]
    fn test_decode_ticker() {
        let body = r#"{"success":true,"message":"","result":{"Bid":0.0123,"Ask":0.0125,"Last":0.0124}}"#;
        let t: TickerResult = decode_envelope(body).unwrap();
        assert_eq!(t.bid, 0.0123);
        assert_eq!(t.ask, 0.0125);
        assert_eq!(t.last, 0.0124);
    }

    #[test]
    fn test_decode_failure_envelope() {
        let body = r#"{"success":false,"message":"INVALID_MARKET","result":null}"#;
        let err = decode_envelope::<TickerResult>(body).unwrap_err();
        assert!(matches!(err, ExchangeError::Api { ref message } if message == "INVALID_MARKET"));
    }

    #[test]
    fn test_decode_post_only_failure() {
        let body = r#"{"success":false,"message":"POST_ONLY_FAILED","result":null}"#;
        let err = decode_envelope::<PlacedOrder>(body).unwrap_err();
        assert!(err.is_post_only_rejection());
    }

    #[test]
    fn test_decode_malformed_body() {
        let err = decode_envelope::<TickerResult>("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, ExchangeError::Decode(_)));
    }

    #[test]
    fn test_decode_open_orders_and_balances() {
        let body = r#"{"success":true,"message":"","result":[{"OrderUuid":"a-1","Exchange":"BTC-LTC"},{"OrderUuid":"b-2"}]}"#;
        let orders: Vec<OpenOrder> = decode_envelope(body).unwrap();
        let ids: Vec<_> = orders.into_iter().map(|o| o.order_uuid).collect();
        assert_eq!(ids, vec!["a-1", "b-2"]);

        let body = r#"{"success":true,"message":"","result":[{"Currency":"BTC","Balance":2.0,"Available":1.5},{"Currency":"LTC","Balance":3.0,"Available":null}]}"#;
        let balances: Vec<BalanceEntry> = decode_envelope(body).unwrap();
        assert_eq!(find_available(&balances, "BTC"), 1.5);
        assert_eq!(find_available(&balances, "LTC"), 0.0);
        assert_eq!(find_available(&balances, "DOGE"), 0.0);
    }

    #[test]
    fn test_decode_cancel_null_result() {
        let body = r#"{"success":true,"message":"","result":null}"#;
        let value: serde_json::Value = decode_envelope(body).unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn test_order_url() {
        let url = client().order_url(Side::Buy, "BTC-LTC", 0.5, 0.0123).unwrap();
        assert_eq!(url.path(), "/v1.1/market/buylimit");
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("apikey".to_string(), "key123".to_string())));
        assert!(query.contains(&("market".to_string(), "BTC-LTC".to_string())));
        assert!(query.contains(&("quantity".to_string(), "0.5".to_string())));
        assert!(query.contains(&("rate".to_string(), "0.0123".to_string())));
        assert!(query.iter().any(|(k, _)| k == "nonce"));
        assert!(!query.iter().any(|(k, _)| k.eq_ignore_ascii_case("postonly")));

        let url = client().order_url(Side::Sell, "BTC-LTC", 1.0, 2.0).unwrap();
        assert_eq!(url.path(), "/v1.1/market/selllimit");
    }
}
