//! In-memory fetchers for unit tests

use crate::error::FetchError;
use crate::fetch::{DependentFetcher, ItemEmitter, PrimaryFetcher};
use crate::model::{Item, Member, NormalizedItem};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Pushes a fixed list of items, then ends.
pub struct StaticItems {
    items: Vec<Item>,
    pub calls: AtomicUsize,
}

impl StaticItems {
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            items,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PrimaryFetcher for StaticItems {
    async fn fetch_items(&self, emitter: &ItemEmitter) -> Result<(), FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for item in &self.items {
            if emitter.push(item.clone()).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}

/// Pushes some items, then fails.
pub struct FailingPrimary {
    items: Vec<Item>,
    message: String,
}

impl FailingPrimary {
    pub fn after(items: Vec<Item>, message: &str) -> Self {
        Self {
            items,
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl PrimaryFetcher for FailingPrimary {
    async fn fetch_items(&self, emitter: &ItemEmitter) -> Result<(), FetchError> {
        for item in &self.items {
            emitter.push(item.clone()).await.map_err(FetchError::upstream)?;
        }
        Err(FetchError::upstream(&self.message))
    }
}

/// Same member list for every item unless the item has its own entry.
pub struct StaticMembers {
    default: Vec<Member>,
    per_item: HashMap<String, Vec<Member>>,
    pub calls: AtomicUsize,
}

impl StaticMembers {
    pub fn new(logins: &[&str]) -> Self {
        Self {
            default: logins.iter().map(|l| Member::new(*l)).collect(),
            per_item: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, name: &str, logins: &[&str]) -> Self {
        self.per_item.insert(
            name.to_string(),
            logins.iter().map(|l| Member::new(*l)).collect(),
        );
        self
    }
}

#[async_trait]
impl DependentFetcher for StaticMembers {
    async fn fetch_members(&self, item: &NormalizedItem) -> Result<Vec<Member>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .per_item
            .get(&item.name)
            .unwrap_or(&self.default)
            .clone())
    }
}

/// Fails on one named item, succeeds with no members otherwise.
pub struct FailingDependent {
    fail_on: String,
    message: String,
    pub calls: AtomicUsize,
}

impl FailingDependent {
    pub fn on(name: &str, message: &str) -> Self {
        Self {
            fail_on: name.to_string(),
            message: message.to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DependentFetcher for FailingDependent {
    async fn fetch_members(&self, item: &NormalizedItem) -> Result<Vec<Member>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if item.name == self.fail_on {
            return Err(FetchError::upstream(&self.message));
        }
        Ok(Vec::new())
    }
}
