//! In-memory one-time token store
//!
//! Uses `DashMap` so that redemption is a single atomic remove: two concurrent
//! upgrades presenting the same key can never both succeed.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// A freshly issued one-time token
#[derive(Debug, Clone)]
pub struct Token {
    key: String,
}

impl Token {
    /// The opaque key handed to the client
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Stores issued tokens until they are redeemed or expire
pub struct TokenStore {
    /// Key -> issue time
    tokens: DashMap<String, Instant>,
    retention: Duration,
}

impl TokenStore {
    /// Create a store whose tokens are valid for `retention`
    #[must_use]
    pub fn new(retention: Duration) -> Self {
        Self {
            tokens: DashMap::new(),
            retention,
        }
    }

    /// Create a store wrapped in Arc
    #[must_use]
    pub fn new_shared(retention: Duration) -> Arc<Self> {
        Arc::new(Self::new(retention))
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Issue a new token
    pub fn generate(&self) -> Token {
        let token = Token {
            key: uuid::Uuid::new_v4().to_string(),
        };

        self.tokens.insert(token.key.clone(), Instant::now());

        tracing::trace!(outstanding = self.tokens.len(), "One-time token issued");

        token
    }

    /// Redeem a token
    ///
    /// Returns `true` exactly once per issued key, and only while the key is
    /// inside its retention window. The key is gone afterwards either way.
    pub fn verify(&self, key: &str) -> bool {
        match self.tokens.remove(key) {
            Some((_, created_at)) => {
                let fresh = created_at.elapsed() < self.retention;
                if !fresh {
                    tracing::debug!("Rejected expired one-time token");
                }
                fresh
            }
            None => false,
        }
    }

    /// Remove every token older than the retention window
    ///
    /// Returns the number of tokens removed.
    pub fn sweep(&self) -> usize {
        let mut removed = 0;

        self.tokens.retain(|_, created_at| {
            let keep = created_at.elapsed() < self.retention;
            if !keep {
                removed += 1;
            }
            keep
        });

        removed
    }

    /// Sweep on a fixed interval until `cancel` fires
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let store = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        tracing::debug!("Token sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = store.sweep();
                        if removed > 0 {
                            tracing::debug!(removed = removed, "Expired one-time tokens swept");
                        }
                    }
                }
            }
        })
    }

    /// Number of outstanding tokens (including expired, unswept ones)
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("outstanding", &self.tokens.len())
            .field("retention", &self.retention)
            .finish()
    }
}
