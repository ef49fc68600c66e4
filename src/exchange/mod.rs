// =============================================================================
// Exchange module — Bithumb REST client, HMAC signing, rate limiting
// =============================================================================

pub mod client;
pub mod rate_limit;
pub mod signing;

pub use client::{ExchangeClient, OrderAck, TickerStats};
pub use rate_limit::RateLimiter;
