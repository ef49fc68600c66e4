// =============================================================================
// Bithumb Exchange Client (C1) — typed public + HMAC-signed private access
// =============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::error::ExchangeError;
use crate::market_data::candle::Candle;

use super::rate_limit::RateLimiter;
use super::signing::{self, NonceGenerator};

const CALL_DEADLINE: Duration = Duration::from_secs(15);
const BACKOFF_SCHEDULE: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickerStats {
    pub price: f64,
    pub change_24h_pct: f64,
    pub volume_24h: f64,
}

#[derive(Debug, Clone)]
pub struct OrderAck {
    pub order_id: String,
    pub coin: String,
    pub side: String,
}

pub struct ExchangeClient {
    api_key: String,
    secret: String,
    base_url: String,
    client: reqwest::Client,
    nonce: NonceGenerator,
    limiter: RateLimiter,
}

impl ExchangeClient {
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(CALL_DEADLINE)
            .build()
            .expect("failed to build reqwest client");

        Self {
            api_key: api_key.into(),
            secret: secret.into(),
            base_url: "https://api.bithumb.com".to_string(),
            client,
            nonce: NonceGenerator::new(),
            limiter: RateLimiter::default(),
        }
    }

    // -------------------------------------------------------------------------
    // Public endpoints
    // -------------------------------------------------------------------------

    #[instrument(skip(self), name = "exchange::get_ticker")]
    pub async fn get_ticker(&self, coin: &str) -> Result<TickerStats, ExchangeError> {
        let url = format!("{}/public/ticker/{}_KRW", self.base_url, coin);
        let body = self.get_public(&url).await?;

        let data = &body["data"];
        let price = parse_str_f64(&data["closing_price"]).unwrap_or(0.0);
        let change_24h_pct = parse_str_f64(&data["fluctate_rate_24H"]).unwrap_or(0.0);
        let volume_24h = parse_str_f64(&data["units_traded_24H"]).unwrap_or(0.0);

        Ok(TickerStats {
            price,
            change_24h_pct,
            volume_24h,
        })
    }

    /// GET candlesticks, coerced to the Indicator-expected schema (oldest
    /// first). `interval` must be one of the supported candle-interval buckets.
    #[instrument(skip(self), name = "exchange::get_candles")]
    pub async fn get_candles(
        &self,
        coin: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let url = format!("{}/public/candlestick/{}_KRW/{}", self.base_url, coin, interval);
        let body = self.get_public(&url).await?;

        let raw = body["data"].as_array().cloned().unwrap_or_default();
        let mut candles: Vec<Candle> = raw
            .iter()
            .filter_map(|entry| {
                let arr = entry.as_array()?;
                if arr.len() < 6 {
                    warn!(len = arr.len(), "skipping malformed candle entry");
                    return None;
                }
                let open_time = arr[0].as_i64().unwrap_or(0);
                let open = parse_str_f64(&arr[1])?;
                let close = parse_str_f64(&arr[2])?;
                let high = parse_str_f64(&arr[3])?;
                let low = parse_str_f64(&arr[4])?;
                let volume = parse_str_f64(&arr[5])?;
                Some(Candle {
                    open_time,
                    close_time: open_time,
                    open,
                    high,
                    low,
                    close,
                    volume,
                    quote_volume: volume * close,
                    trades_count: 0,
                    taker_buy_volume: 0.0,
                    taker_buy_quote_volume: 0.0,
                    is_closed: true,
                })
            })
            .collect();

        candles.truncate(limit.min(candles.len()));
        debug!(coin, interval, count = candles.len(), "candles fetched");
        Ok(candles)
    }

    // -------------------------------------------------------------------------
    // Private endpoints
    // -------------------------------------------------------------------------

    #[instrument(skip(self), name = "exchange::get_balance")]
    pub async fn get_balance(&self, coin: &str) -> Result<f64, ExchangeError> {
        let endpoint = "/info/balance";
        let mut params = BTreeMap::new();
        params.insert("currency".to_string(), coin.to_string());

        let body = self.post_private(endpoint, params).await?;
        let key = format!("available_{}", coin.to_lowercase());
        let free = parse_str_f64(&body["data"][key]).unwrap_or(0.0);
        Ok(free)
    }

    #[instrument(skip(self), name = "exchange::market_buy")]
    pub async fn market_buy(&self, coin: &str, krw_amount: f64) -> Result<OrderAck, ExchangeError> {
        let endpoint = "/trade/market_buy";
        let mut params = BTreeMap::new();
        params.insert("order_currency".to_string(), coin.to_string());
        params.insert("payment_currency".to_string(), "KRW".to_string());
        params.insert("units".to_string(), format!("{:.8}", krw_amount));

        let body = self.post_private(endpoint, params).await?;
        let order_id = body["order_id"].as_str().unwrap_or("UNKNOWN").to_string();
        Ok(OrderAck {
            order_id,
            coin: coin.to_string(),
            side: "buy".to_string(),
        })
    }

    #[instrument(skip(self), name = "exchange::market_sell")]
    pub async fn market_sell(&self, coin: &str, qty: f64) -> Result<OrderAck, ExchangeError> {
        let endpoint = "/trade/market_sell";
        let mut params = BTreeMap::new();
        params.insert("order_currency".to_string(), coin.to_string());
        params.insert("payment_currency".to_string(), "KRW".to_string());
        params.insert("units".to_string(), format!("{:.8}", qty));

        let body = self.post_private(endpoint, params).await?;
        let order_id = body["order_id"].as_str().unwrap_or("UNKNOWN").to_string();
        Ok(OrderAck {
            order_id,
            coin: coin.to_string(),
            side: "sell".to_string(),
        })
    }

    // -------------------------------------------------------------------------
    // Internal transport with retry/backoff and rate limiting
    // -------------------------------------------------------------------------

    async fn get_public(&self, url: &str) -> Result<serde_json::Value, ExchangeError> {
        self.with_retry(|| async {
            if !self.limiter.acquire(CALL_DEADLINE).await {
                return Err(ExchangeError::Timeout {
                    deadline_secs: CALL_DEADLINE.as_secs(),
                });
            }

            let resp = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| transient_from_reqwest(&e))?;

            let status = resp.status();
            let body: serde_json::Value = resp.json().await.map_err(|e| ExchangeError::Transient {
                status: Some(status.as_u16()),
                message: format!("failed to parse response: {e}"),
            })?;

            check_status(&body, status.as_u16())?;
            Ok(body)
        })
        .await
    }

    async fn post_private(
        &self,
        endpoint: &str,
        mut params: BTreeMap<String, String>,
    ) -> Result<serde_json::Value, ExchangeError> {
        params.insert("endpoint".to_string(), endpoint.to_string());

        self.with_retry(|| async {
            if !self.limiter.acquire(CALL_DEADLINE).await {
                return Err(ExchangeError::Timeout {
                    deadline_secs: CALL_DEADLINE.as_secs(),
                });
            }

            let nonce = self.nonce.next();
            let signature = signing::sign(&self.secret, endpoint, &params, nonce);
            let url = format!("{}{}", self.base_url, endpoint);

            let resp = self
                .client
                .post(&url)
                .header("Api-Key", &self.api_key)
                .header("Api-Sign", signature)
                .header("Api-Nonce", nonce.to_string())
                .form(&params)
                .send()
                .await
                .map_err(|e| transient_from_reqwest(&e))?;

            let status = resp.status();
            let body: serde_json::Value = resp.json().await.map_err(|e| ExchangeError::Transient {
                status: Some(status.as_u16()),
                message: format!("failed to parse response: {e}"),
            })?;

            check_status(&body, status.as_u16())?;
            Ok(body)
        })
        .await
    }

    async fn with_retry<F, Fut>(&self, mut call: F) -> Result<serde_json::Value, ExchangeError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<serde_json::Value, ExchangeError>>,
    {
        let mut last_err = None;
        for (attempt, delay) in std::iter::once(Duration::ZERO)
            .chain(BACKOFF_SCHEDULE.iter().copied())
            .enumerate()
        {
            if attempt > 0 {
                tokio::time::sleep(delay).await;
            }
            match call().await {
                Ok(body) => return Ok(body),
                Err(e) if e.retryable() && attempt < BACKOFF_SCHEDULE.len() => {
                    warn!(attempt, error = %e, "exchange call failed, retrying");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.expect("loop always runs at least once"))
    }
}

impl std::fmt::Debug for ExchangeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeClient")
            .field("api_key", &"<redacted>")
            .field("secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

fn transient_from_reqwest(e: &reqwest::Error) -> ExchangeError {
    if e.is_timeout() {
        ExchangeError::Timeout {
            deadline_secs: CALL_DEADLINE.as_secs(),
        }
    } else {
        ExchangeError::Transient {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }
}

/// Bithumb's own JSON envelope carries `status: "0000"` on success and a
/// documented numeric code otherwise, independent of the HTTP status line.
fn check_status(body: &serde_json::Value, http_status: u16) -> Result<(), ExchangeError> {
    if let Some(status_str) = body["status"].as_str() {
        if status_str != "0000" {
            let code: u32 = status_str.parse().unwrap_or(9999);
            let message = body["message"].as_str().unwrap_or("unknown error").to_string();
            return Err(ExchangeError::from_code(code, message));
        }
    } else if !(200..300).contains(&http_status) {
        return Err(ExchangeError::Transient {
            status: Some(http_status),
            message: format!("unexpected HTTP status {http_status}"),
        });
    }
    Ok(())
}

fn parse_str_f64(val: &serde_json::Value) -> Option<f64> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>().ok()
    } else {
        val.as_f64()
    }
}
