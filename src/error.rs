// =============================================================================
// Error taxonomy — typed boundaries around the exchange and the cycle pipeline
// =============================================================================
//
// Call sites that only need to propagate an error upward keep using
// `anyhow::Result` with `.context(...)`. The two enums here exist for the
// boundaries that need to branch on error *kind*: retry-vs-skip-vs-fatal for
// exchange calls, and recovered-vs-surfaced-vs-fatal for the cycle pipeline.
// =============================================================================

use thiserror::Error;

/// Errors returned by the exchange client, classified by retryability.
#[derive(Debug, Error, Clone)]
pub enum ExchangeError {
    #[error("transient exchange error: {message} (status {status:?})")]
    Transient {
        status: Option<u16>,
        message: String,
    },

    #[error("exchange auth error {code}: {message}")]
    Auth { code: u32, message: String },

    #[error("exchange rejected request {code}: {message}")]
    Rejected { code: u32, message: String },

    #[error("exchange call timed out after {deadline_secs}s")]
    Timeout { deadline_secs: u64 },
}

/// Non-retryable Bithumb error codes: auth / signature / nonce / permission.
pub const NON_RETRYABLE_CODES: &[u32] = &[5100, 5200, 5300, 5600];

impl ExchangeError {
    /// Whether the caller should retry this error per the backoff policy
    /// (1s, 2s, 4s / max 3 attempts).
    pub fn retryable(&self) -> bool {
        match self {
            ExchangeError::Transient { .. } => true,
            ExchangeError::Timeout { .. } => true,
            ExchangeError::Auth { .. } => false,
            ExchangeError::Rejected { code, .. } => !NON_RETRYABLE_CODES.contains(code),
        }
    }

    /// Build an `ExchangeError` from a documented Bithumb numeric error code.
    pub fn from_code(code: u32, message: impl Into<String>) -> Self {
        if NON_RETRYABLE_CODES.contains(&code) {
            ExchangeError::Auth {
                code,
                message: message.into(),
            }
        } else {
            ExchangeError::Rejected {
                code,
                message: message.into(),
            }
        }
    }
}

/// Cycle-pipeline error taxonomy.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("transient exchange error for {coin}: {source}")]
    TransientExchange {
        coin: String,
        #[source]
        source: ExchangeError,
    },

    #[error("auth error: {source}")]
    Auth {
        #[source]
        source: ExchangeError,
    },

    #[error("validation error for {coin}: {message}")]
    Validation { coin: String, message: String },

    #[error("state corruption loading {path}: {message}")]
    StateCorruption { path: String, message: String },

    #[error("indicators not warmed up for {coin}: have {have} bars, need {need}")]
    IndicatorWarmup {
        coin: String,
        have: usize,
        need: usize,
    },

    #[error("cycle step panicked for {coin}: {message}")]
    Panic { coin: String, message: String },
}

impl CoreError {
    /// Whether this error is recovered locally (does not abort the cycle or
    /// require surfacing a persistent alert).
    pub fn recovered_locally(&self) -> bool {
        matches!(
            self,
            CoreError::TransientExchange { .. }
                | CoreError::Validation { .. }
                | CoreError::IndicatorWarmup { .. }
        )
    }

    /// Whether this error must be surfaced as a persistent alert (auth,
    /// state corruption).
    pub fn surfaced(&self) -> bool {
        matches!(self, CoreError::Auth { .. } | CoreError::StateCorruption { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_retryable_codes_are_not_retryable() {
        for &code in NON_RETRYABLE_CODES {
            let e = ExchangeError::from_code(code, "nope");
            assert!(!e.retryable(), "code {code} should not be retryable");
        }
    }

    #[test]
    fn other_codes_are_retryable() {
        let e = ExchangeError::from_code(9999, "unknown");
        assert!(e.retryable());
    }

    #[test]
    fn transient_and_timeout_are_retryable() {
        assert!(ExchangeError::Transient {
            status: Some(503),
            message: "bad gateway".into()
        }
        .retryable());
        assert!(ExchangeError::Timeout { deadline_secs: 15 }.retryable());
    }

    #[test]
    fn core_error_classification() {
        let warmup = CoreError::IndicatorWarmup {
            coin: "BTC".into(),
            have: 5,
            need: 20,
        };
        assert!(warmup.recovered_locally());
        assert!(!warmup.surfaced());

        let auth = CoreError::Auth {
            source: ExchangeError::from_code(5100, "bad sig"),
        };
        assert!(!auth.recovered_locally());
        assert!(auth.surfaced());
    }
}
