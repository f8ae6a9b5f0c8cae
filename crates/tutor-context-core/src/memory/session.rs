use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::Message;

/// A conversation's mutable state.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub session_id: String,
    pub student_id: Option<String>,
    pub messages: VecDeque<Message>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

/// Read-only overview of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub student_id: Option<String>,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl Session {
    pub(crate) fn new(session_id: String, student_id: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            session_id,
            student_id,
            messages: VecDeque::new(),
            created_at: now,
            last_active_at: now,
        }
    }

    /// Strictly older than `ttl`: a session idle for exactly `ttl` is live.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_active_at > ttl
    }

    /// Append a message and drop the oldest ones beyond `max_history`.
    pub(crate) fn push(&mut self, message: Message, max_history: usize, now: DateTime<Utc>) {
        self.messages.push_back(message);
        while self.messages.len() > max_history {
            self.messages.pop_front();
        }
        self.last_active_at = now;
    }

    /// The most recent `n` messages in chronological order.
    pub fn recent(&self, n: usize) -> Vec<Message> {
        let skip = self.messages.len().saturating_sub(n);
        self.messages.iter().skip(skip).cloned().collect()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id.clone(),
            student_id: self.student_id.clone(),
            message_count: self.messages.len(),
            created_at: self.created_at,
            last_active_at: self.last_active_at,
            last_message_at: self.messages.back().map(|m| m.timestamp),
        }
    }
}
