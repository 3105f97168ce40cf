use crate::render::{colors, Envelope};
use crate::session::Session;
use crate::utils::strip_ansi;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use std::collections::VecDeque;
use std::sync::Arc;

/// A message retained for replay to newly joined sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacklogEntry {
    pub timestamp: DateTime<Utc>,
    pub sender: Option<String>,
    pub text: String,
}

#[derive(Debug)]
struct Backlog {
    capacity: usize,
    entries: VecDeque<BacklogEntry>,
}

/// A named set of sessions that receive each other's messages.
///
/// Membership changes and broadcasts are serialised by the member lock, so
/// a session that is a member for the duration of a broadcast sees the
/// message exactly once and one that isn't doesn't see it at all.
pub struct Room {
    name: String,
    members: Mutex<Vec<Arc<Session>>>,
    backlog: Option<Mutex<Backlog>>,
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("name", &self.name)
            .field("members", &self.member_count())
            .finish()
    }
}

impl Room {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Mutex::new(Vec::new()),
            backlog: None,
        }
    }

    /// A room that keeps its last `capacity` broadcasts for replay.
    pub fn with_backlog(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            backlog: Some(Mutex::new(Backlog {
                capacity,
                entries: VecDeque::with_capacity(capacity),
            })),
            ..Self::new(name)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> Vec<Arc<Session>> {
        self.members.lock().clone()
    }

    pub fn member_count(&self) -> usize {
        self.members.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.lock().is_empty()
    }

    /// Plain names of the current members, in join order.
    pub fn member_names(&self) -> Vec<String> {
        self.members.lock().iter().map(|s| s.plain_name()).collect()
    }

    pub fn find_member(&self, plain_name: &str) -> Option<Arc<Session>> {
        self.members
            .lock()
            .iter()
            .find(|s| s.plain_name() == plain_name)
            .cloned()
    }

    pub fn contains(&self, session: &Session) -> bool {
        self.members.lock().iter().any(|s| std::ptr::eq(Arc::as_ptr(s), session))
    }

    /// Add `session` unless another member already uses its plain name.
    pub(crate) fn try_add_member(&self, session: &Arc<Session>) -> bool {
        let mut members = self.members.lock();
        let plain = session.plain_name();
        if members
            .iter()
            .any(|s| !Arc::ptr_eq(s, session) && s.plain_name() == plain)
        {
            return false;
        }
        if !members.iter().any(|s| Arc::ptr_eq(s, session)) {
            members.push(Arc::clone(session));
        }
        true
    }

    pub(crate) fn remove_member(&self, session: &Session) -> bool {
        let mut members = self.members.lock();
        let before = members.len();
        members.retain(|s| !std::ptr::eq(Arc::as_ptr(s), session));
        members.len() != before
    }

    pub fn backlog(&self) -> Vec<BacklogEntry> {
        match &self.backlog {
            Some(backlog) => backlog.lock().entries.iter().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Substitute mentions in `text` for every member: `@name` becomes the
    /// styled name, and a backslash-escaped styled name becomes a literal
    /// `@name`. Members are processed in join order.
    fn substitute_mentions(members: &[Arc<Session>], text: &str) -> String {
        let mut text = text.replace("@everyone", &colors::green("everyone\x07"));
        for member in members {
            let styled = member.name();
            let plain = strip_ansi(&styled);
            text = text.replace(&format!("@{}", plain), &styled);
            text = text.replace(&format!("\\{}", styled), &format!("@{}", plain));
        }
        text
    }

    /// Send `text` from `sender` (a styled name, or `None` for unlabelled
    /// output) to every member. Members whose delivery fails are closed
    /// once the broadcast has finished.
    pub fn broadcast(&self, sender: Option<&str>, text: &str) {
        if text.is_empty() {
            return;
        }

        let failed: Vec<_> = {
            let members = self.members.lock();
            let text = Self::substitute_mentions(&members, text);
            let envelope = Envelope::broadcast(sender, text.as_str());

            let failed = members
                .iter()
                .filter_map(|member| member.deliver(&envelope).err().map(|e| (Arc::clone(member), e)))
                .collect();

            if let Some(backlog) = &self.backlog {
                let mut backlog = backlog.lock();
                backlog.entries.push_back(BacklogEntry {
                    timestamp: Utc::now(),
                    sender: sender.map(str::to_owned),
                    text,
                });
                while backlog.entries.len() > backlog.capacity {
                    backlog.entries.pop_front();
                }
            }
            failed
        };

        for (member, error) in failed {
            tracing::debug!(session = %member.id(), room = %self.name, %error, "Delivery failed");
            member.close(format!("{} has left the chat due to an error: {}", member.name(), error));
        }
    }
}
