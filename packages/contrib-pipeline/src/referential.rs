use crate::model::Member;
use std::collections::HashSet;
use tracing::debug;

/// Logins already counted during the current attempt.
///
/// Only grows between two `reset` calls.
#[derive(Debug, Default)]
pub struct DedupReferential {
    seen: HashSet<String>,
}

impl DedupReferential {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.seen.clear();
    }

    pub fn contains(&self, login: &str) -> bool {
        self.seen.contains(login)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Record every login and return how many had not been seen before.
    pub fn count_new(&mut self, members: &[Member]) -> u64 {
        let mut count = 0;
        for member in members {
            if self.seen.insert(member.login.clone()) {
                count += 1;
            } else {
                debug!("{} already contributed", member.login);
            }
        }
        count
    }
}
