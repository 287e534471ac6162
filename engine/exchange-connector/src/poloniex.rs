//! Poloniex REST adapter
//!
//! Public data comes from `GET /public`. Trading calls are form-encoded
//! `POST /tradingApi` requests signed with HMAC-SHA512 over the body and sent
//! with `Key`/`Sign` headers. Failures come back as `{"error": "..."}`.

use crate::error::{ExchangeError, Result};
use crate::exchange::Exchange;
use crate::signing::{hmac_sha512_hex, nonce_nanos};
use crate::types::{f64_from_number_or_string, Side, Ticker};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::debug;

pub const POLONIEX_API: &str = "https://poloniex.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickerEntry {
    #[serde(deserialize_with = "f64_from_number_or_string")]
    highest_bid: f64,
    #[serde(deserialize_with = "f64_from_number_or_string")]
    lowest_ask: f64,
    #[serde(deserialize_with = "f64_from_number_or_string")]
    last: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderEntry {
    order_number: serde_json::Value,
}

impl OrderEntry {
    /// Poloniex has sent order numbers both as strings and as integers
    fn id(&self) -> String {
        match &self.order_number {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Decode a Poloniex body, surfacing `{"error": ...}` as an API error
fn decode_response<T: DeserializeOwned>(body: &str) -> Result<T> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    if let Some(message) = value.get("error").and_then(|e| e.as_str()) {
        return Err(ExchangeError::from_api_message(message));
    }
    serde_json::from_value(value).map_err(|e| ExchangeError::decode(format!("response: {e}")))
}

fn ticker_for(tickers: &HashMap<String, TickerEntry>, market: &str) -> Result<Ticker> {
    let t = tickers
        .get(market)
        .ok_or_else(|| ExchangeError::Api { message: format!("unknown market {market}") })?;
    Ok(Ticker { bid: t.highest_bid, ask: t.lowest_ask, last: t.last })
}

fn balance_for(balances: &HashMap<String, String>, asset: &str) -> Result<f64> {
    match balances.get(asset) {
        Some(raw) => raw
            .parse::<f64>()
            .map_err(|e| ExchangeError::decode(format!("balance {asset}={raw}: {e}"))),
        None => Ok(0.0),
    }
}

/// Poloniex venue adapter
pub struct PoloniexClient {
    api_key: String,
    secret: Vec<u8>,
    base_url: String,
    client: Client,
}

impl PoloniexClient {
    pub fn new(api_key: impl Into<String>, secret: impl AsRef<[u8]>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_key: api_key.into(),
            secret: secret.as_ref().to_vec(),
            base_url: POLONIEX_API.to_string(),
            client,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Form body for a trading command, nonce included
    pub(crate) fn trading_body(command: &str, params: &[(&str, String)]) -> String {
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        form.append_pair("nonce", &nonce_nanos().to_string());
        for (k, v) in params {
            form.append_pair(k, v);
        }
        form.append_pair("command", command);
        form.finish()
    }

    pub(crate) fn order_body(side: Side, market: &str, quantity: f64, rate: f64) -> String {
        let command = match side {
            Side::Buy => "buy",
            Side::Sell => "sell",
        };
        Self::trading_body(
            command,
            &[
                ("currencyPair", market.to_string()),
                ("amount", quantity.to_string()),
                ("rate", rate.to_string()),
                ("postOnly", "1".to_string()),
            ],
        )
    }

    async fn public_get<T: DeserializeOwned>(&self, command: &str) -> Result<T> {
        let url = format!("{}/public", self.base_url);
        debug!("Poloniex public request: {}", command);
        let body = self
            .client
            .get(url)
            .query(&[("command", command)])
            .header("Accept", "application/json")
            .send()
            .await?
            .text()
            .await?;
        decode_response(&body)
    }

    async fn trading_post<T: DeserializeOwned>(&self, body: String) -> Result<T> {
        let url = format!("{}/tradingApi", self.base_url);
        let sign = hmac_sha512_hex(&self.secret, body.as_bytes())?;
        let text = self
            .client
            .post(url)
            .header("Key", &self.api_key)
            .header("Sign", sign)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Accept", "application/json")
            .body(body)
            .send()
            .await?
            .text()
            .await?;
        decode_response(&text)
    }
}

#[async_trait]
impl Exchange for PoloniexClient {
    fn name(&self) -> &'static str {
        "poloniex"
    }

    async fn place_order(&self, side: Side, market: &str, quantity: f64, rate: f64) -> Result<String> {
        let entry: OrderEntry = self.trading_post(Self::order_body(side, market, quantity, rate)).await?;
        debug!("Poloniex placed {} order on {}", side, market);
        Ok(entry.id())
    }

    async fn open_orders(&self, market: &str) -> Result<HashSet<String>> {
        let body = Self::trading_body("returnOpenOrders", &[("currencyPair", market.to_string())]);
        let orders: Vec<OrderEntry> = self.trading_post(body).await?;
        Ok(orders.iter().map(OrderEntry::id).collect())
    }

    async fn cancel_order(&self, order_id: &str) -> Result<()> {
        let body = Self::trading_body("cancelOrder", &[("orderNumber", order_id.to_string())]);
        let _: serde_json::Value = self.trading_post(body).await?;
        Ok(())
    }

    async fn ticker(&self, market: &str) -> Result<Ticker> {
        let tickers: HashMap<String, TickerEntry> = self.public_get("returnTicker").await?;
        ticker_for(&tickers, market)
    }

    async fn available_balance(&self, asset: &str) -> Result<f64> {
        let balances: HashMap<String, String> =
            self.trading_post(Self::trading_body("returnBalances", &[])).await?;
        balance_for(&balances, asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ticker_map() {
        let body = r#"{"BTC_LTC":{"last":"0.0251","lowestAsk":"0.02589999","highestBid":"0.0251","percentChange":"0.02390438"},
                       "BTC_XMR":{"last":"0.00468","lowestAsk":"0.00469","highestBid":"0.00467"}}"#;
        let tickers: HashMap<String, TickerEntry> = decode_response(body).unwrap();
        let t = ticker_for(&tickers, "BTC_LTC").unwrap();
        assert_eq!(t.bid, 0.0251);
        assert_eq!(t.ask, 0.02589999);
        assert!(ticker_for(&tickers, "BTC_DOGE").is_err());
    }

    #[test]
    fn test_decode_error_object() {
        let err = decode_response::<Vec<OrderEntry>>(r#"{"error":"Invalid API key/secret pair."}"#).unwrap_err();
        assert!(matches!(err, ExchangeError::Api { .. }));

        let err = decode_response::<OrderEntry>(r#"{"error":"Unable to place post-only order at this price."}"#)
            .unwrap_err();
        assert!(err.is_post_only_rejection());
    }

    #[test]
    fn test_decode_orders_and_balances() {
        let body = r#"[{"orderNumber":"120466","type":"sell","rate":"0.025","amount":"100"},{"orderNumber":120467}]"#;
        let orders: Vec<OrderEntry> = decode_response(body).unwrap();
        let ids: HashSet<String> = orders.iter().map(OrderEntry::id).collect();
        assert!(ids.contains("120466"));
        assert!(ids.contains("120467"));

        let balances: HashMap<String, String> =
            decode_response(r#"{"BTC":"0.59098578","LTC":"3.31117268"}"#).unwrap();
        assert_eq!(balance_for(&balances, "LTC").unwrap(), 3.31117268);
        assert_eq!(balance_for(&balances, "XMR").unwrap(), 0.0);
    }

    #[test]
    fn test_order_body_is_post_only_on_both_sides() {
        for side in [Side::Buy, Side::Sell] {
            let body = PoloniexClient::order_body(side, "BTC_LTC", 2.5, 0.025);
            let pairs: HashMap<String, String> =
                url::form_urlencoded::parse(body.as_bytes()).into_owned().collect();
            assert_eq!(pairs["postOnly"], "1");
            assert_eq!(pairs["currencyPair"], "BTC_LTC");
            assert_eq!(pairs["amount"], "2.5");
            assert_eq!(pairs["command"], if side.is_buy() { "buy" } else { "sell" });
            assert!(pairs.contains_key("nonce"));
        }
    }
}
