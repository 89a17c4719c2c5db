use std::collections::HashMap;

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params, params_from_iter};
use uuid::Uuid;

use meridian_types::models::{Comment, Post, Role};

use super::{enum_at, now, placeholders, summary_at, summary_columns, time_at, uuid_at};
use crate::models::{Guarded, NewPost};
use crate::Database;

const POST_COLUMNS: &str = "p.id, p.title, p.content, p.summary, p.category, p.featured_image,
    p.video_url, p.metadata, p.upvote_count,
    (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id),
    p.created_at";

impl Database {
    // -- Posts --

    pub fn create_post(&self, author_id: Uuid, post: &NewPost) -> Result<Post> {
        let id = Uuid::new_v4();
        let metadata = post.metadata.as_ref().map(serde_json::to_string).transpose()?;
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            tx.execute(
                "INSERT INTO posts (id, author_id, title, content, summary, category,
                                    featured_image, video_url, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    id.to_string(),
                    author_id.to_string(),
                    post.title,
                    post.content,
                    post.summary,
                    post.category.as_str(),
                    post.featured_image,
                    post.video_url,
                    metadata,
                    now(),
                ],
            )?;
            for tag in &post.tags {
                tx.execute(
                    "INSERT OR IGNORE INTO post_tags (post_id, name) VALUES (?1, ?2)",
                    params![id.to_string(), tag],
                )?;
            }
            let created = query_post(&tx, id)?
                .ok_or_else(|| anyhow::anyhow!("post {} vanished after insert", id))?;
            tx.commit()?;
            Ok(created)
        })
    }

    pub fn get_post(&self, id: Uuid) -> Result<Option<Post>> {
        self.with_conn(|conn| query_post(conn, id))
    }

    /// Newest-first page of posts, optionally restricted to one author.
    /// `cursor` is the id of the last post of the previous page; the page
    /// starts strictly after it. Returns the posts and the cursor for the
    /// next page, if there is one.
    pub fn list_posts(
        &self,
        author_id: Option<Uuid>,
        cursor: Option<Uuid>,
        limit: u32,
    ) -> Result<(Vec<Post>, Option<Uuid>)> {
        self.with_conn(|conn| {
            let anchor: Option<(String, String)> = match cursor {
                Some(cursor) => {
                    let anchor = conn
                        .query_row(
                            "SELECT created_at, id FROM posts WHERE id = ?1",
                            [cursor.to_string()],
                            |row| Ok((row.get(0)?, row.get(1)?)),
                        )
                        .optional()?;
                    match anchor {
                        Some(anchor) => Some(anchor),
                        // Unknown cursor: the page it pointed into no longer exists
                        None => return Ok((Vec::new(), None)),
                    }
                }
                None => None,
            };
            let (anchor_time, anchor_id) = anchor.unzip();

            let sql = format!(
                "SELECT {}, {}
                 FROM posts p
                 JOIN users a ON a.id = p.author_id
                 WHERE (?1 IS NULL OR p.author_id = ?1)
                   AND (?2 IS NULL OR (p.created_at, p.id) < (?2, ?3))
                 ORDER BY p.created_at DESC, p.id DESC
                 LIMIT ?4",
                POST_COLUMNS,
                summary_columns("a"),
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut posts = stmt
                .query_map(
                    params![
                        author_id.map(|id| id.to_string()),
                        anchor_time,
                        anchor_id,
                        i64::from(limit) + 1,
                    ],
                    post_at,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let next_cursor = if posts.len() > limit as usize {
                posts.truncate(limit as usize);
                posts.last().map(|p| p.id)
            } else {
                None
            };

            attach_tags(conn, &mut posts)?;
            Ok((posts, next_cursor))
        })
    }

    /// Delete a post with its comments, tags and upvotes. Only the author
    /// or an admin may do this.
    pub fn delete_post(&self, actor: Uuid, actor_role: Role, post_id: Uuid) -> Result<Guarded<()>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let author: Option<String> = tx
                .query_row(
                    "SELECT author_id FROM posts WHERE id = ?1",
                    [post_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(author) = author else {
                return Ok(Guarded::NotFound);
            };
            if author != actor.to_string() && actor_role != Role::Admin {
                return Ok(Guarded::Forbidden);
            }
            tx.execute("DELETE FROM comments WHERE post_id = ?1", [post_id.to_string()])?;
            tx.execute("DELETE FROM posts WHERE id = ?1", [post_id.to_string()])?;
            tx.commit()?;
            Ok(Guarded::Done(()))
        })
    }

    // -- Upvotes --

    /// Toggle `user_id`'s upvote on a post: removes it if present, adds it
    /// otherwise. Returns `(upvoted, upvote_count)`, or `None` when the post
    /// does not exist.
    pub fn toggle_upvote(&self, post_id: Uuid, user_id: Uuid) -> Result<Option<(bool, i64)>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let exists = tx
                .query_row("SELECT 1 FROM posts WHERE id = ?1", [post_id.to_string()], |_| Ok(()))
                .optional()?
                .is_some();
            if !exists {
                return Ok(None);
            }

            let removed = tx.execute(
                "DELETE FROM upvotes WHERE post_id = ?1 AND user_id = ?2",
                params![post_id.to_string(), user_id.to_string()],
            )?;
            let upvoted = if removed > 0 {
                tx.execute(
                    "UPDATE posts SET upvote_count = upvote_count - 1 WHERE id = ?1",
                    [post_id.to_string()],
                )?;
                false
            } else {
                tx.execute(
                    "INSERT INTO upvotes (post_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                    params![post_id.to_string(), user_id.to_string(), now()],
                )?;
                tx.execute(
                    "UPDATE posts SET upvote_count = upvote_count + 1 WHERE id = ?1",
                    [post_id.to_string()],
                )?;
                true
            };

            let count: i64 = tx.query_row(
                "SELECT upvote_count FROM posts WHERE id = ?1",
                [post_id.to_string()],
                |row| row.get(0),
            )?;
            tx.commit()?;
            Ok(Some((upvoted, count)))
        })
    }

    // -- Comments --

    /// Newest-first comments on a post.
    pub fn list_comments(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT c.id, c.post_id, c.content, c.created_at, {}
                 FROM comments c
                 JOIN users a ON a.id = c.author_id
                 WHERE c.post_id = ?1
                 ORDER BY c.created_at DESC, c.id DESC",
                summary_columns("a"),
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([post_id.to_string()], comment_at)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns `None` when the post does not exist.
    pub fn create_comment(&self, post_id: Uuid, author_id: Uuid, content: &str) -> Result<Option<Comment>> {
        let id = Uuid::new_v4();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let exists = tx
                .query_row("SELECT 1 FROM posts WHERE id = ?1", [post_id.to_string()], |_| Ok(()))
                .optional()?
                .is_some();
            if !exists {
                return Ok(None);
            }
            tx.execute(
                "INSERT INTO comments (id, post_id, author_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id.to_string(), post_id.to_string(), author_id.to_string(), content, now()],
            )?;

            let sql = format!(
                "SELECT c.id, c.post_id, c.content, c.created_at, {}
                 FROM comments c
                 JOIN users a ON a.id = c.author_id
                 WHERE c.id = ?1",
                summary_columns("a"),
            );
            let comment = tx.query_row(&sql, [id.to_string()], comment_at)?;
            tx.commit()?;
            Ok(Some(comment))
        })
    }
}

fn query_post(conn: &Connection, id: Uuid) -> Result<Option<Post>> {
    let sql = format!(
        "SELECT {}, {}
         FROM posts p
         JOIN users a ON a.id = p.author_id
         WHERE p.id = ?1",
        POST_COLUMNS,
        summary_columns("a"),
    );
    let post = conn.query_row(&sql, [id.to_string()], post_at).optional()?;
    match post {
        Some(post) => {
            let mut posts = vec![post];
            attach_tags(conn, &mut posts)?;
            Ok(posts.pop())
        }
        None => Ok(None),
    }
}

fn post_at(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    let metadata: Option<String> = row.get(7)?;
    Ok(Post {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        summary: row.get(3)?,
        category: enum_at(row, 4)?,
        featured_image: row.get(5)?,
        video_url: row.get(6)?,
        metadata: metadata.and_then(|raw| serde_json::from_str(&raw).ok()),
        upvote_count: row.get(8)?,
        comment_count: row.get(9)?,
        created_at: time_at(row, 10)?,
        author: summary_at(row, 11)?,
        tags: Vec::new(),
    })
}

fn comment_at(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: uuid_at(row, 0)?,
        post_id: uuid_at(row, 1)?,
        content: row.get(2)?,
        created_at: time_at(row, 3)?,
        author: summary_at(row, 4)?,
    })
}

/// Batch-fetch tags for a page of posts (one query, not one per post).
fn attach_tags(conn: &Connection, posts: &mut [Post]) -> Result<()> {
    if posts.is_empty() {
        return Ok(());
    }

    let ids: Vec<String> = posts.iter().map(|p| p.id.to_string()).collect();
    let sql = format!(
        "SELECT post_id, name FROM post_tags WHERE post_id IN ({}) ORDER BY name",
        placeholders(ids.len(), 1)
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut tags: HashMap<String, Vec<String>> = HashMap::new();
    let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (post_id, name) = row?;
        tags.entry(post_id).or_default().push(name);
    }

    for post in posts.iter_mut() {
        post.tags = tags.remove(&post.id.to_string()).unwrap_or_default();
    }
    Ok(())
}
