use std::collections::VecDeque;

use chrono::{DateTime, Duration, Local};
use serde::Serialize;

use crate::sync::ApiError;

const MAX_NOTICES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    /// A submit the user is waiting on failed
    Error,
    /// A background write failed; stays until dismissed or retried
    SyncFailure,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    pub created: DateTime<Local>,
}

/// Toast-style message queue, oldest first
#[derive(Debug, Clone, Default)]
pub struct Notices {
    items: VecDeque<Notice>,
}

impl Notices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, level: NoticeLevel, text: impl Into<String>) {
        if self.items.len() == MAX_NOTICES {
            self.items.pop_front();
        }
        self.items.push_back(Notice {
            level,
            text: text.into(),
            created: Local::now(),
        });
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.push(NoticeLevel::Info, text);
    }

    /// Record a failed submit as "{status}: {message}"
    pub fn api_error(&mut self, error: &ApiError) {
        self.push(NoticeLevel::Error, error.to_string());
    }

    pub fn sync_failure(&mut self, text: impl Into<String>) {
        self.push(NoticeLevel::SyncFailure, text);
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.items.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_sync_failures(&self) -> bool {
        self.items.iter().any(|n| n.level == NoticeLevel::SyncFailure)
    }

    /// Drop the newest notice
    pub fn dismiss(&mut self) -> Option<Notice> {
        self.items.pop_back()
    }

    pub fn clear_sync_failures(&mut self) {
        self.items.retain(|n| n.level != NoticeLevel::SyncFailure);
    }

    /// Drop info and error notices older than `ttl`; sync failures stay
    pub fn expire(&mut self, now: DateTime<Local>, ttl: Duration) {
        self.items
            .retain(|n| n.level == NoticeLevel::SyncFailure || now - n.created < ttl);
    }
}
