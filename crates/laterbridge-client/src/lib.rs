//! Laterbridge provider client
//!
//! Wraps the read-later provider's private API:
//! - `executor`: bearer-authenticated calls with single-shot refresh and retry
//! - `refresher`: provider token refresh
//! - `feed` / `locator` / `saver`: reading-list operations built on the executor
//! - `qr`: QR login trigger and bounded polling
//! - `normalize`: maps every provider response shape onto the core types
//! - `observer`: hooks for persisting rotated tokens

pub mod executor;
pub mod feed;
pub mod locator;
pub mod normalize;
pub mod observer;
pub mod qr;
pub mod refresher;
pub mod saver;

use std::sync::Arc;

use laterbridge_core::{CredentialPair, Item, ProviderConfig, ProviderError, SaveResult};
use url::Url;

pub use executor::{build_http_client, AuthedExecutor};
pub use feed::{FeedCollection, FeedWalk};
pub use locator::IdMatch;
pub use observer::{LoggingObserver, TokenFileObserver, TokenObserver};
pub use qr::{
    ExchangeStatus, HttpQrLoginApi, QrChallenge, QrLoginApi, QrLoginBridge, QrLoginError,
    QrOutcome, QrTrigger,
};
pub use refresher::TokenRefresher;

/// Reading-list operations for one logical session.
///
/// Wraps a single [`AuthedExecutor`], so every operation shares the same
/// live credential pair and sees tokens rotated by earlier calls.
pub struct ReadLaterClient {
    executor: AuthedExecutor,
}

impl ReadLaterClient {
    pub fn new(
        http: reqwest::Client,
        config: Arc<ProviderConfig>,
        credentials: CredentialPair,
    ) -> Self {
        Self {
            executor: AuthedExecutor::new(http, config, credentials),
        }
    }

    pub fn from_executor(executor: AuthedExecutor) -> Self {
        Self { executor }
    }

    pub fn with_observer(self, observer: Arc<dyn TokenObserver>) -> Self {
        Self {
            executor: self.executor.with_observer(observer),
        }
    }

    pub fn credentials(&self) -> &CredentialPair {
        self.executor.credentials()
    }

    /// Up to `limit` items starting at `cursor` (or the top of the feed)
    pub async fn list_articles(
        &mut self,
        limit: usize,
        cursor: Option<&str>,
    ) -> Result<FeedCollection, ProviderError> {
        feed::collect(&mut self.executor, limit, cursor).await
    }

    /// Full item with highlights; `Ok(None)` when the feed has no such id
    pub async fn find_article(&mut self, identifier: &str) -> Result<Option<Item>, ProviderError> {
        locator::find(&mut self.executor, identifier).await
    }

    pub async fn save_article(&mut self, url: &Url) -> Result<SaveResult, ProviderError> {
        saver::save(&mut self.executor, url).await
    }
}
