//! Vertpig REST adapter
//!
//! Vertpig speaks the Bittrex v1.1 dialect with two differences: numbers come
//! back as decimal strings and limit orders accept an explicit `postonly` flag.

use crate::bittrex::{decode_envelope, find_available, BalanceEntry, PlacedOrder};
use crate::error::{ExchangeError, Result};
use crate::exchange::Exchange;
use crate::signing::{hmac_sha512_hex, nonce_millis};
use crate::types::{f64_from_number_or_string, Side, Ticker};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const VERTPIG_API: &str = "https://www.vertpig.com/api/v1.1";

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
    #[serde(rename = "OrderUUID")]
    order_uuid: String,
}

/// Vertpig venue adapter
pub struct VertpigClient {
    api_key: String,
    secret: String,
    base_url: String,
    client: Client,
}

impl VertpigClient {
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_key: api_key.into(),
            secret: secret.into(),
            base_url: VERTPIG_API.to_string(),
            client,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        Url::parse_with_params(&format!("{}/{}", self.base_url, path), params)
            .map_err(|e| ExchangeError::decode(format!("invalid url: {e}")))
    }

    fn private_url(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut all = vec![("apikey", self.api_key.clone()), ("nonce", nonce_millis().to_string())];
        all.extend(params.iter().cloned());
        self.url(path, &all)
    }

    pub(crate) fn order_url(&self, side: Side, market: &str, quantity: f64, rate: f64) -> Result<Url> {
        let path = if side.is_buy() { "market/buylimit" } else { "market/selllimit" };
        self.private_url(
            path,
            &[
                ("postonly", "1".to_string()),
                ("market", market.to_string()),
                ("quantity", quantity.to_string()),
                ("rate", rate.to_string()),
            ],
        )
    }

    async fn send<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!("Vertpig request: {}", url.path());
        let sign = hmac_sha512_hex(self.secret.as_bytes(), url.as_str().as_bytes())?;
        let body = self.client.get(url).header("apisign", sign).send().await?.text().await?;
        decode_envelope(&body)
    }
}

#[async_trait]
impl Exchange for VertpigClient {
    fn name(&self) -> &'static str {
        "vertpig"
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
        let url = self.url("public/getticker", &[("market", market.to_string())])?;
        let t: TickerResult = self.send(url).await?;
        Ok(Ticker { bid: t.bid, ask: t.ask, last: t.last })
    }

    async fn available_balance(&self, asset: &str) -> Result<f64> {
        let url = self.private_url("account/getbalances", &[])?;
        let balances: Option<Vec<BalanceEntry>> = self.send(url).await?;
        Ok(find_available(&balances.unwrap_or_default(), asset))
    }
}
