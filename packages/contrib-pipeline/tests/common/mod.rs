//! Shared fetchers for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use contrib_pipeline::{
    ConfigHandle, DependentFetcher, FetchError, Item, ItemEmitter, Member, NormalizedItem,
    PipelineConfig, PrimaryFetcher,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;
use tokio::sync::Notify;

pub fn config_in(dir: &TempDir) -> ConfigHandle {
    let mut config = PipelineConfig::default();
    config.storage.data_dir = dir.path().to_path_buf();
    ConfigHandle::new(config)
}

pub fn repo(name: &str) -> Item {
    Item::new(name, "2011-01-26T19:01:12Z")
}

/// Primary fetcher scripted per call: each call pops the next outcome.
pub struct ScriptedRepos {
    script: Mutex<Vec<Result<Vec<Item>, String>>>,
    pub calls: AtomicUsize,
    /// When set, every call waits for a notification before pushing.
    gate: Option<Notify>,
}

impl ScriptedRepos {
    pub fn new(script: Vec<Result<Vec<Item>, String>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().rev().collect()),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Notify::new());
        self
    }

    pub fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }
}

#[async_trait]
impl PrimaryFetcher for ScriptedRepos {
    async fn fetch_items(&self, emitter: &ItemEmitter) -> Result<(), FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let next = self.script.lock().unwrap().pop().unwrap_or(Ok(Vec::new()));
        match next {
            Ok(items) => {
                for item in items {
                    if emitter.push(item).await.is_err() {
                        break;
                    }
                }
                Ok(())
            }
            Err(message) => Err(FetchError::Upstream(message)),
        }
    }
}

/// Dependent fetcher with a fixed contributor list per repository.
#[derive(Default)]
pub struct Contributors {
    by_repo: HashMap<String, Vec<String>>,
    fail_on: Mutex<Option<String>>,
    pub calls: AtomicUsize,
}

impl Contributors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, repo: &str, logins: &[&str]) -> Self {
        self.by_repo.insert(
            repo.to_string(),
            logins.iter().map(|l| l.to_string()).collect(),
        );
        self
    }

    /// Fail on `repo` until [`Contributors::heal`] is called.
    pub fn failing_on(self, repo: &str) -> Self {
        *self.fail_on.lock().unwrap() = Some(repo.to_string());
        self
    }

    pub fn heal(&self) {
        *self.fail_on.lock().unwrap() = None;
    }
}

#[async_trait]
impl DependentFetcher for Contributors {
    async fn fetch_members(&self, item: &NormalizedItem) -> Result<Vec<Member>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on.lock().unwrap().as_deref() == Some(item.name.as_str()) {
            return Err(FetchError::Status {
                status: 403,
                body: "API rate limit exceeded.".to_string(),
            });
        }
        Ok(self
            .by_repo
            .get(&item.name)
            .map(|logins| logins.iter().map(Member::new).collect())
            .unwrap_or_default())
    }
}
