//! Rate-limited admission for menu dispatches.
//!
//! Every menu rendered in reply to a message costs one token. The gate only
//! sequences the acquire before the wrapped call; capacity and refill belong
//! to the [`TokenSource`].

use anyhow::Result;
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Source of admission tokens.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Wait until a token is available and consume it.
    async fn acquire_token(&self) -> Result<()>;
}

/// Token source backed by a `governor` direct rate limiter.
pub struct GovernorTokenSource {
    limiter: DirectRateLimiter,
}

impl GovernorTokenSource {
    /// Create a limiter allowing `per_second` tokens with bursts of `burst`.
    ///
    /// Zero values are raised to one.
    #[must_use]
    pub fn new(per_second: u32, burst: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: RateLimiter::direct(quota),
        }
    }
}

#[async_trait]
impl TokenSource for GovernorTokenSource {
    async fn acquire_token(&self) -> Result<()> {
        self.limiter.until_ready().await;
        Ok(())
    }
}

/// Runs work only after a token has been granted.
#[derive(Clone)]
pub struct AdmissionGate {
    source: Arc<dyn TokenSource>,
}

impl AdmissionGate {
    /// Wrap a token source.
    #[must_use]
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self { source }
    }

    /// Acquire a token, then run `work`.
    ///
    /// # Errors
    ///
    /// Returns the acquire error without running `work`, or the error of `work`.
    pub async fn admit<F, Fut, T>(&self, work: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.source.acquire_token().await?;
        debug!("Admission token granted");
        work().await
    }
}
