use std::collections::HashMap;

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params, params_from_iter};
use uuid::Uuid;

use meridian_types::models::{ConversationSummary, Message, MessagePreview, UserSummary};

use super::{now, placeholders, summary_at, summary_columns, time_at, uuid_at};
use crate::Database;

impl Database {
    /// Store a message from `sender` to `receiver`, creating their
    /// conversation on first contact and bumping its `updated_at`.
    pub fn send_message(&self, sender: Uuid, receiver: Uuid, content: &str) -> Result<Message> {
        let id = Uuid::new_v4();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let ts = now();

            let conversation_id = match find_conversation(&tx, sender, receiver)? {
                Some(existing) => existing,
                None => {
                    let created = Uuid::new_v4();
                    tx.execute(
                        "INSERT INTO conversations (id, created_at, updated_at) VALUES (?1, ?2, ?2)",
                        params![created.to_string(), ts],
                    )?;
                    for participant in [sender, receiver] {
                        tx.execute(
                            "INSERT INTO conversation_participants (conversation_id, user_id)
                             VALUES (?1, ?2)",
                            params![created.to_string(), participant.to_string()],
                        )?;
                    }
                    created
                }
            };

            tx.execute(
                "INSERT INTO messages (id, conversation_id, sender_id, receiver_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.to_string(),
                    conversation_id.to_string(),
                    sender.to_string(),
                    receiver.to_string(),
                    content,
                    ts,
                ],
            )?;
            tx.execute(
                "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
                params![ts, conversation_id.to_string()],
            )?;

            let sql = format!("{} WHERE m.id = ?1", select_messages());
            let message = tx.query_row(&sql, [id.to_string()], message_at)?;
            tx.commit()?;
            Ok(message)
        })
    }

    /// Conversations of `user_id`, most recently active first, each with the
    /// other participants and the latest message.
    pub fn list_conversations(&self, user_id: Uuid) -> Result<Vec<ConversationSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.updated_at, m.content, m.read, m.created_at
                 FROM conversations c
                 JOIN conversation_participants me
                   ON me.conversation_id = c.id AND me.user_id = ?1
                 LEFT JOIN messages m ON m.id = (
                     SELECT id FROM messages
                     WHERE conversation_id = c.id
                     ORDER BY created_at DESC, id DESC
                     LIMIT 1
                 )
                 ORDER BY c.updated_at DESC, c.id DESC",
            )?;
            let mut conversations = stmt
                .query_map([user_id.to_string()], |row| {
                    let content: Option<String> = row.get(2)?;
                    let last_message = match content {
                        Some(content) => Some(MessagePreview {
                            content,
                            read: row.get(3)?,
                            created_at: time_at(row, 4)?,
                        }),
                        None => None,
                    };
                    Ok(ConversationSummary {
                        id: uuid_at(row, 0)?,
                        updated_at: time_at(row, 1)?,
                        participants: Vec::new(),
                        last_message,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            if conversations.is_empty() {
                return Ok(conversations);
            }

            // Batch-fetch the other participants of every conversation
            let ids: Vec<String> = conversations.iter().map(|c| c.id.to_string()).collect();
            let sql = format!(
                "SELECT cp.conversation_id, {}
                 FROM conversation_participants cp
                 JOIN users u ON u.id = cp.user_id
                 WHERE cp.user_id <> ?1 AND cp.conversation_id IN ({})",
                summary_columns("u"),
                placeholders(ids.len(), 2),
            );
            let mut stmt = conn.prepare(&sql)?;
            let bind = std::iter::once(user_id.to_string()).chain(ids);
            let mut others: HashMap<Uuid, Vec<UserSummary>> = HashMap::new();
            let rows = stmt.query_map(params_from_iter(bind), |row| {
                Ok((uuid_at(row, 0)?, summary_at(row, 1)?))
            })?;
            for row in rows {
                let (conversation_id, summary) = row?;
                others.entry(conversation_id).or_default().push(summary);
            }

            for conversation in &mut conversations {
                conversation.participants = others.remove(&conversation.id).unwrap_or_default();
            }
            Ok(conversations)
        })
    }

    /// Open a conversation as `viewer`: messages addressed to the viewer are
    /// flipped to read, then the latest `limit` messages are returned newest
    /// first. Returns `None` when the viewer is not a participant.
    pub fn open_conversation(
        &self,
        viewer: Uuid,
        conversation_id: Uuid,
        limit: u32,
    ) -> Result<Option<Vec<Message>>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if !is_participant(&tx, conversation_id, viewer)? {
                return Ok(None);
            }

            tx.execute(
                "UPDATE messages SET read = 1
                 WHERE conversation_id = ?1 AND receiver_id = ?2 AND read = 0",
                params![conversation_id.to_string(), viewer.to_string()],
            )?;

            let sql = format!(
                "{} WHERE m.conversation_id = ?1
                 ORDER BY m.created_at DESC, m.id DESC
                 LIMIT ?2",
                select_messages()
            );
            let messages = {
                let mut stmt = tx.prepare(&sql)?;
                stmt.query_map(params![conversation_id.to_string(), limit], message_at)?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            };
            tx.commit()?;
            Ok(Some(messages))
        })
    }

    /// Mark specific messages read. Only messages received by `viewer` and
    /// still unread are touched; returns how many changed.
    pub fn mark_messages_read(&self, viewer: Uuid, message_ids: &[Uuid]) -> Result<usize> {
        if message_ids.is_empty() {
            return Ok(0);
        }
        self.with_conn_mut(|conn| {
            let sql = format!(
                "UPDATE messages SET read = 1
                 WHERE receiver_id = ?1 AND read = 0 AND id IN ({})",
                placeholders(message_ids.len(), 2)
            );
            let bind = std::iter::once(viewer.to_string())
                .chain(message_ids.iter().map(|id| id.to_string()));
            let changed = conn.execute(&sql, params_from_iter(bind))?;
            Ok(changed)
        })
    }

    pub fn unread_message_count(&self, user_id: Uuid) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE receiver_id = ?1 AND read = 0",
                [user_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }
}

fn find_conversation(conn: &Connection, a: Uuid, b: Uuid) -> Result<Option<Uuid>> {
    let id = conn
        .query_row(
            "SELECT x.conversation_id
             FROM conversation_participants x
             JOIN conversation_participants y ON y.conversation_id = x.conversation_id
             WHERE x.user_id = ?1 AND y.user_id = ?2
             LIMIT 1",
            params![a.to_string(), b.to_string()],
            |row| uuid_at(row, 0),
        )
        .optional()?;
    Ok(id)
}

fn is_participant(conn: &Connection, conversation_id: Uuid, user_id: Uuid) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM conversation_participants WHERE conversation_id = ?1 AND user_id = ?2",
            params![conversation_id.to_string(), user_id.to_string()],
            |_| Ok(()),
        )
        .optional()?
        .is_some();
    Ok(found)
}

fn select_messages() -> String {
    format!(
        "SELECT m.id, m.conversation_id, m.sender_id, m.receiver_id, m.content, m.read,
                m.created_at, {}
         FROM messages m
         JOIN users s ON s.id = m.sender_id",
        summary_columns("s")
    )
}

fn message_at(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: uuid_at(row, 0)?,
        conversation_id: uuid_at(row, 1)?,
        sender_id: uuid_at(row, 2)?,
        receiver_id: uuid_at(row, 3)?,
        content: row.get(4)?,
        read: row.get(5)?,
        created_at: time_at(row, 6)?,
        sender: summary_at(row, 7)?,
    })
}
