//! Remote API collaborators
//!
//! The pipeline only sees the two fetcher traits. [`GithubClient`] is the
//! production implementation of both.

use crate::config::{ConfigHandle, GithubConfig};
use crate::error::FetchError;
use crate::model::{Item, Member, NormalizedItem};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Returned by [`ItemEmitter::push`] once the rest of the chain has stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("downstream stage closed")]
pub struct DownstreamClosed;

/// Push side of the producer stage.
///
/// `push` waits while the next stage is busy.
#[derive(Debug, Clone)]
pub struct ItemEmitter {
    tx: mpsc::Sender<Item>,
    pushed: Arc<AtomicUsize>,
}

impl ItemEmitter {
    pub(crate) fn new(tx: mpsc::Sender<Item>) -> Self {
        Self {
            tx,
            pushed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub async fn push(&self, item: Item) -> Result<(), DownstreamClosed> {
        self.tx.send(item).await.map_err(|_| DownstreamClosed)?;
        self.pushed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Items accepted downstream so far
    pub fn pushed(&self) -> usize {
        self.pushed.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Primary collection fetcher, invoked once per FIRST attempt.
///
/// Push zero or more items, then return `Ok(())` for end-of-input or an error.
#[async_trait]
pub trait PrimaryFetcher: Send + Sync {
    async fn fetch_items(&self, emitter: &ItemEmitter) -> Result<(), FetchError>;
}

/// Dependent fetcher, invoked once per normalized item during enrichment.
#[async_trait]
pub trait DependentFetcher: Send + Sync {
    async fn fetch_members(&self, item: &NormalizedItem) -> Result<Vec<Member>, FetchError>;
}

/// GitHub REST client: repositories of a user, contributors of a repository
pub struct GithubClient {
    http: reqwest::Client,
    config: ConfigHandle,
}

impl GithubClient {
    pub fn new(config: ConfigHandle) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http, config })
    }

    pub fn with_client(http: reqwest::Client, config: ConfigHandle) -> Self {
        Self { http, config }
    }

    fn repos_url(github: &GithubConfig) -> String {
        format!(
            "{}/users/{}/repos",
            github.api_base_url.trim_end_matches('/'),
            github.user_name
        )
    }

    fn contributors_url(github: &GithubConfig, repository: &str) -> String {
        format!(
            "{}/repos/{}/{}/contributors",
            github.api_base_url.trim_end_matches('/'),
            github.user_name,
            repository
        )
    }

    /// GET one page; `None` when the API answers 204 (nothing to list).
    async fn get_page<T: DeserializeOwned>(
        &self,
        github: &GithubConfig,
        url: &str,
        page: u32,
    ) -> Result<Option<Vec<T>>, FetchError> {
        let mut request = self
            .http
            .get(url)
            .header(USER_AGENT, &github.user_agent)
            .header(ACCEPT, "application/vnd.github+json")
            .query(&[("per_page", github.per_page), ("page", page)]);
        if let Some(token) = &github.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }
}

#[async_trait]
impl PrimaryFetcher for GithubClient {
    async fn fetch_items(&self, emitter: &ItemEmitter) -> Result<(), FetchError> {
        let github = self.config.snapshot().github;
        let url = Self::repos_url(&github);
        info!("Fetching {} repositories", github.user_name);

        let mut page = 1;
        let mut total = 0;
        loop {
            let items: Vec<Item> = self
                .get_page(&github, &url, page)
                .await?
                .unwrap_or_default();
            let count = items.len();

            for item in items {
                if emitter.push(item).await.is_err() {
                    return Ok(());
                }
            }
            total += count;

            if count < github.per_page as usize {
                break;
            }
            page += 1;
        }

        info!("Fetched {} repositories", total);
        Ok(())
    }
}

#[async_trait]
impl DependentFetcher for GithubClient {
    async fn fetch_members(&self, item: &NormalizedItem) -> Result<Vec<Member>, FetchError> {
        let github = self.config.snapshot().github;
        let url = Self::contributors_url(&github, &item.name);
        info!("Fetching {} contributors", item.name);

        let mut members = Vec::new();
        let mut page = 1;
        loop {
            let batch: Vec<Member> = match self.get_page(&github, &url, page).await? {
                Some(batch) => batch,
                None => break,
            };
            let count = batch.len();
            members.extend(batch);

            if count < github.per_page as usize {
                break;
            }
            page += 1;
        }
        Ok(members)
    }
}
