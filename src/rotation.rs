use std::sync::Arc;

use rand::rngs::OsRng;
use rand::RngCore;
use tokio::sync::{watch, Mutex};

use crate::errors::AppError;
use crate::feed::Feed;
use crate::models::SecurityToken;
use crate::store::DocumentStore;

/// Bytes of OS randomness in each token (hex-encoded to 32 chars).
const TOKEN_BYTES: usize = 16;

/// Owns the active kiosk token and rotates it on demand.
///
/// The token is persisted before it is published: a failed write leaves the
/// previous token active and subscribers never see the new value. Writes and
/// reloads hold `write_lock` from the store call through the publish, so the
/// published token is always the last one this instance wrote or read.
pub struct TokenManager {
    store: Arc<dyn DocumentStore>,
    feed: Feed<Option<SecurityToken>>,
    write_lock: Mutex<()>,
}

impl TokenManager {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            feed: Feed::new(None),
            write_lock: Mutex::new(()),
        }
    }

    /// Load the persisted token, creating the first one on a fresh deployment.
    pub async fn bootstrap(&self) -> Result<SecurityToken, AppError> {
        let guard = self.write_lock.lock().await;
        match self.store.load_token().await? {
            Some(token) => {
                self.feed.publish(Some(token.clone()));
                tracing::info!(rotated_at = %token.rotated_at, "loaded active security token");
                Ok(token)
            }
            None => {
                drop(guard);
                tracing::info!("no security token found, issuing the first one");
                self.rotate().await
            }
        }
    }

    /// Replace the active token. Every code carrying the old value stops
    /// authorizing new evaluations as soon as this returns.
    pub async fn rotate(&self) -> Result<SecurityToken, AppError> {
        let _guard = self.write_lock.lock().await;
        let token = SecurityToken {
            value: generate_token_value(),
            rotated_at: self.store.now(),
        };

        self.store.save_token(&token).await.map_err(|e| {
            tracing::error!("token rotation failed, previous token stays active: {}", e);
            e
        })?;

        self.feed.publish(Some(token.clone()));
        tracing::info!(
            rotated_at = %token.rotated_at,
            sessions = self.feed.subscriber_count(),
            "security token rotated; previously distributed codes are void"
        );
        Ok(token)
    }

    pub fn current(&self) -> Option<SecurityToken> {
        self.feed.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<SecurityToken>> {
        self.feed.subscribe()
    }

    pub fn feed(&self) -> &Feed<Option<SecurityToken>> {
        &self.feed
    }

    /// Re-read the persisted token and publish it if another writer changed it.
    pub async fn refresh(&self) -> Result<bool, AppError> {
        let _guard = self.write_lock.lock().await;
        let token = self.store.load_token().await?;
        Ok(self.feed.publish(token))
    }
}

pub fn generate_token_value() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// URL a kiosk scans to open an authorized session.
pub fn distributable_url(base: &str, token: &SecurityToken) -> String {
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{}{}token={}", base, sep, urlencoding::encode(&token.value))
}
