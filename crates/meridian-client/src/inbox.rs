use std::collections::HashSet;

use uuid::Uuid;

use meridian_types::models::Notification;

/// Cached notifications plus the unread badge count.
///
/// The count is derived from the read flags it tracks, so replaying a live
/// event or marking the same notification twice never skews it.
#[derive(Debug, Clone, Default)]
pub struct Inbox {
    items: Vec<Notification>,
    unread: HashSet<Uuid>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from `GET /notifications` (newest first).
    pub fn from_server(rows: Vec<Notification>) -> Self {
        let mut inbox = Self::new();
        for row in rows {
            if inbox.contains(row.id) {
                continue;
            }
            if !row.read {
                inbox.unread.insert(row.id);
            }
            inbox.items.push(row);
        }
        inbox
    }

    /// Merge a notification pushed by the relay. Duplicates are ignored.
    pub fn push_live(&mut self, notification: Notification) -> bool {
        if self.contains(notification.id) {
            return false;
        }
        if !notification.read {
            self.unread.insert(notification.id);
        }
        self.items.insert(0, notification);
        true
    }

    /// Returns `true` only when this call flipped the notification to read.
    pub fn mark_read(&mut self, id: Uuid) -> bool {
        if !self.unread.remove(&id) {
            return false;
        }
        if let Some(item) = self.items.iter_mut().find(|n| n.id == id) {
            item.read = true;
        }
        true
    }

    /// Returns how many notifications changed.
    pub fn mark_all_read(&mut self) -> usize {
        let changed = self.unread.len();
        self.unread.clear();
        for item in &mut self.items {
            item.read = true;
        }
        changed
    }

    pub fn unread_count(&self) -> usize {
        self.unread.len()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.items.iter().any(|n| n.id == id)
    }

    pub fn items(&self) -> &[Notification] {
        &self.items
    }
}
