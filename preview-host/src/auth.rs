//! Authentication token provider seam.
//!
//! The socket handshake carries a token obtained from an external provider.
//! [`CachedToken`] wraps any provider and caches a successful answer for a
//! fixed validity window so rapid reconnects do not hammer the provider.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Asynchronous source of authentication tokens.
///
/// `None` is a valid answer (anonymous session); the handshake is sent
/// either way.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Fetch the current token.
    async fn token(&self) -> Option<String>;
}

#[async_trait]
impl<P: TokenProvider + ?Sized> TokenProvider for std::sync::Arc<P> {
    async fn token(&self) -> Option<String> {
        (**self).token().await
    }
}

/// A fixed token, mostly for tests and anonymous sessions.
#[derive(Debug, Default)]
pub struct StaticToken(pub Option<String>);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Caches the inner provider's answer for a fixed validity window.
///
/// Only successful answers are cached; a `None` is retried on the next call.
pub struct CachedToken<P> {
    inner: P,
    validity: Duration,
    cached: Mutex<Option<(String, Instant)>>,
}

impl<P: TokenProvider> CachedToken<P> {
    /// Wrap `inner`, caching its tokens for `validity`.
    pub fn new(inner: P, validity: Duration) -> Self {
        Self {
            inner,
            validity,
            cached: Mutex::new(None),
        }
    }

    /// Drop the cached token.
    pub fn invalidate(&self) {
        *self.cached.lock().unwrap() = None;
    }
}

#[async_trait]
impl<P: TokenProvider> TokenProvider for CachedToken<P> {
    async fn token(&self) -> Option<String> {
        {
            let cached = self.cached.lock().unwrap();
            if let Some((token, fetched_at)) = cached.as_ref() {
                if fetched_at.elapsed() < self.validity {
                    return Some(token.clone());
                }
            }
        }

        let fresh = self.inner.token().await;
        if let Some(token) = &fresh {
            *self.cached.lock().unwrap() = Some((token.clone(), Instant::now()));
        }
        fresh
    }
}
