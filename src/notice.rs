use std::time::Duration;

use chrono::{DateTime, Local};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeAction {
    RetryLoad,
}

impl NoticeAction {
    pub fn label(self) -> &'static str {
        match self {
            NoticeAction::RetryLoad => "Retry",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub id: u64,
    pub message: String,
    pub raised_at: DateTime<Local>,
    pub duration: Duration,
    pub action: Option<NoticeAction>,
}

impl Notice {
    pub fn is_expired(&self, now: DateTime<Local>) -> bool {
        let Ok(duration) = chrono::Duration::from_std(self.duration) else {
            return false;
        };
        now - self.raised_at >= duration
    }
}

/// Dismissible error notifications, newest last.
#[derive(Debug, Default)]
pub struct Notices {
    items: Vec<Notice>,
    next_id: u64,
}

impl Notices {
    pub fn raise(
        &mut self,
        message: impl Into<String>,
        duration: Duration,
        action: Option<NoticeAction>,
    ) -> u64 {
        self.next_id += 1;
        self.items.push(Notice {
            id: self.next_id,
            message: message.into(),
            raised_at: Local::now(),
            duration,
            action,
        });
        self.next_id
    }

    pub fn dismiss(&mut self, id: u64) -> Option<Notice> {
        let index = self.items.iter().position(|notice| notice.id == id)?;
        Some(self.items.remove(index))
    }

    pub fn expire(&mut self, now: DateTime<Local>) {
        self.items.retain(|notice| !notice.is_expired(now));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.items.iter()
    }

    pub fn latest(&self) -> Option<&Notice> {
        self.items.last()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
