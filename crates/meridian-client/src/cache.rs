//! Optimistic list cache.
//!
//! A mutation is shown immediately as a placeholder under a temporary id.
//! When the server answers, the placeholder is swapped for the real row; if
//! the real row already arrived through a live event, the placeholder is
//! simply dropped. A failed mutation removes the placeholder and marks the
//! list stale so the caller refetches.

use uuid::Uuid;

use meridian_types::models::{Comment, Connection, Message, Notification, Post};

/// Rows with a stable server id.
pub trait Identified {
    fn id(&self) -> Uuid;
}

macro_rules! identified {
    ($($ty:ty),+ $(,)?) => {
        $(impl Identified for $ty {
            fn id(&self) -> Uuid {
                self.id
            }
        })+
    };
}

identified!(Post, Comment, Connection, Message, Notification);

#[derive(Debug, Clone)]
enum Entry<T> {
    Placeholder { temp_id: Uuid, value: T },
    Confirmed(T),
}

impl<T> Entry<T> {
    fn value(&self) -> &T {
        match self {
            Self::Placeholder { value, .. } | Self::Confirmed(value) => value,
        }
    }
}

/// Newest-first list of server rows plus in-flight placeholders.
#[derive(Debug, Clone)]
pub struct OptimisticList<T> {
    entries: Vec<Entry<T>>,
    stale: bool,
}

impl<T> Default for OptimisticList<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            stale: false,
        }
    }
}

impl<T: Identified> OptimisticList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_server(rows: Vec<T>) -> Self {
        let mut list = Self::new();
        list.replace_all(rows);
        list
    }

    /// Replace everything with a fresh server read. In-flight placeholders
    /// are kept at the front; the list is no longer stale.
    pub fn replace_all(&mut self, rows: Vec<T>) {
        self.entries
            .retain(|entry| matches!(entry, Entry::Placeholder { .. }));
        let mut seen = std::collections::HashSet::new();
        self.entries.extend(
            rows.into_iter()
                .filter(|row| seen.insert(row.id()))
                .map(Entry::Confirmed),
        );
        self.stale = false;
    }

    /// Show `value` before the server confirms it. Returns the temporary id
    /// to pass to [`confirm`](Self::confirm) or [`rollback`](Self::rollback).
    pub fn insert_placeholder(&mut self, value: T) -> Uuid {
        let temp_id = Uuid::new_v4();
        self.entries.insert(0, Entry::Placeholder { temp_id, value });
        temp_id
    }

    /// Swap the placeholder for the server row. Returns `false` when the
    /// placeholder is unknown (already confirmed or rolled back).
    pub fn confirm(&mut self, temp_id: Uuid, row: T) -> bool {
        let Some(index) = self.placeholder_index(temp_id) else {
            return false;
        };
        if self.contains(row.id()) {
            self.entries.remove(index);
        } else {
            self.entries[index] = Entry::Confirmed(row);
        }
        true
    }

    /// Drop a placeholder whose mutation failed and mark the list stale.
    pub fn rollback(&mut self, temp_id: Uuid) -> bool {
        let Some(index) = self.placeholder_index(temp_id) else {
            return false;
        };
        self.entries.remove(index);
        self.stale = true;
        true
    }

    /// Prepend a row pushed by the relay, unless it is already present.
    pub fn merge_live(&mut self, row: T) -> bool {
        if self.contains(row.id()) {
            return false;
        }
        self.entries.insert(0, Entry::Confirmed(row));
        true
    }

    /// Replace a confirmed row in place, e.g. after a status change.
    pub fn update(&mut self, row: T) -> bool {
        let id = row.id();
        match self
            .entries
            .iter_mut()
            .find(|entry| matches!(entry, Entry::Confirmed(value) if value.id() == id))
        {
            Some(entry) => {
                *entry = Entry::Confirmed(row);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|entry| !matches!(entry, Entry::Confirmed(value) if value.id() == id));
        before != self.entries.len()
    }

    /// Whether a confirmed row with this server id is present.
    pub fn contains(&self, id: Uuid) -> bool {
        self.entries
            .iter()
            .any(|entry| matches!(entry, Entry::Confirmed(value) if value.id() == id))
    }

    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(Entry::value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry, Entry::Placeholder { .. }))
            .count()
    }

    /// A rollback happened since the last [`replace_all`](Self::replace_all).
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    fn placeholder_index(&self, temp_id: Uuid) -> Option<usize> {
        self.entries.iter().position(
            |entry| matches!(entry, Entry::Placeholder { temp_id: t, .. } if *t == temp_id),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: Uuid,
        text: &'static str,
    }

    impl Identified for Row {
        fn id(&self) -> Uuid {
            self.id
        }
    }

    fn row(text: &'static str) -> Row {
        Row {
            id: Uuid::new_v4(),
            text,
        }
    }

    fn texts(list: &OptimisticList<Row>) -> Vec<&'static str> {
        list.items().map(|r| r.text).collect()
    }

    #[test]
    fn placeholder_is_replaced_by_server_row() {
        let mut list = OptimisticList::from_server(vec![row("old")]);
        let temp = list.insert_placeholder(row("draft"));
        assert_eq!(texts(&list), ["draft", "old"]);
        assert_eq!(list.pending(), 1);

        assert!(list.confirm(temp, row("saved")));
        assert_eq!(texts(&list), ["saved", "old"]);
        assert_eq!(list.pending(), 0);

        // Confirming twice is a no-op
        assert!(!list.confirm(temp, row("again")));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn live_echo_before_confirm_drops_the_placeholder() {
        let mut list = OptimisticList::new();
        let temp = list.insert_placeholder(row("draft"));
        let saved = row("saved");

        assert!(list.merge_live(saved.clone()));
        assert!(list.confirm(temp, saved.clone()));
        assert_eq!(texts(&list), ["saved"]);

        // And a late duplicate live event changes nothing
        assert!(!list.merge_live(saved));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn rollback_removes_and_marks_stale() {
        let mut list = OptimisticList::from_server(vec![row("old")]);
        let temp = list.insert_placeholder(row("draft"));

        assert!(list.rollback(temp));
        assert_eq!(texts(&list), ["old"]);
        assert!(list.is_stale());
        assert!(!list.rollback(temp));

        list.replace_all(vec![row("fresh")]);
        assert!(!list.is_stale());
        assert_eq!(texts(&list), ["fresh"]);
    }

    #[test]
    fn refetch_keeps_in_flight_placeholders_and_dedups() {
        let mut list = OptimisticList::new();
        list.insert_placeholder(row("draft"));
        let dup = row("dup");
        list.replace_all(vec![dup.clone(), dup.clone()]);
        assert_eq!(texts(&list), ["draft", "dup"]);
    }

    #[test]
    fn update_and_remove_by_id() {
        let original = row("pending");
        let mut list = OptimisticList::from_server(vec![original.clone()]);
        let changed = Row {
            id: original.id,
            text: "accepted",
        };
        assert!(list.update(changed));
        assert_eq!(texts(&list), ["accepted"]);
        assert!(!list.update(row("missing")));
        assert!(list.remove(original.id));
        assert!(list.is_empty());
    }
}
