use anyhow::Result;
use rusqlite::{Connection as SqlConnection, OptionalExtension, TransactionBehavior, params};
use uuid::Uuid;

use meridian_types::connection::{
    ConnectionAction, Edge, RequestPlan, TransitionError, may_delete, plan_request, plan_response,
};
use meridian_types::models::{Connection, ConnectionStatus};

use super::{enum_at, now, summary_at, summary_columns, time_at, uuid_at};
use crate::models::{ConnectionOutcome, Guarded};
use crate::Database;

impl Database {
    /// The connection between two users, in either direction.
    pub fn get_connection_between(&self, a: Uuid, b: Uuid) -> Result<Option<Connection>> {
        self.with_conn(|conn| match find_edge(conn, a, b)? {
            Some(edge) => query_connection(conn, edge.id),
            None => Ok(None),
        })
    }

    /// `actor` asks `target` to connect. A rejected row between the pair is
    /// replaced; any other existing row refuses the request.
    pub fn request_connection(&self, actor: Uuid, target: Uuid) -> Result<ConnectionOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let existing = find_edge(&tx, actor, target)?;
            let plan = match plan_request(actor, target, existing.as_ref()) {
                Ok(plan) => plan,
                Err(refusal) => return Ok(ConnectionOutcome::Refused(refusal)),
            };

            if let RequestPlan::ReplaceRejected(old_id) = plan {
                tx.execute("DELETE FROM connections WHERE id = ?1", [old_id.to_string()])?;
            }

            let id = Uuid::new_v4();
            let ts = now();
            tx.execute(
                "INSERT INTO connections (id, sender_id, receiver_id, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![
                    id.to_string(),
                    actor.to_string(),
                    target.to_string(),
                    ConnectionStatus::Pending.as_str(),
                    ts,
                ],
            )?;

            let created = query_connection(&tx, id)?
                .ok_or_else(|| anyhow::anyhow!("connection {} vanished after insert", id))?;
            tx.commit()?;
            Ok(ConnectionOutcome::Applied(created))
        })
    }

    /// `actor` accepts or rejects the pending request sent by `counterpart`.
    /// The status only moves if the row is still PENDING when written.
    pub fn respond_connection(
        &self,
        actor: Uuid,
        counterpart: Uuid,
        action: ConnectionAction,
    ) -> Result<ConnectionOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let existing = find_edge(&tx, actor, counterpart)?;
            let status = match plan_response(actor, counterpart, existing.as_ref(), action) {
                Ok(status) => status,
                Err(refusal) => return Ok(ConnectionOutcome::Refused(refusal)),
            };
            let Some(edge) = existing else {
                return Ok(ConnectionOutcome::Refused(TransitionError::NoConnection));
            };

            let outcome = answer(&tx, &edge, status)?;
            tx.commit()?;
            Ok(outcome)
        })
    }

    /// Either participant may delete a connection, whatever its status.
    pub fn delete_connection(&self, actor: Uuid, connection_id: Uuid) -> Result<Guarded<Connection>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let Some(existing) = query_connection(&tx, connection_id)? else {
                return Ok(Guarded::NotFound);
            };
            if !may_delete(actor, &edge_of(&existing)) {
                return Ok(Guarded::Forbidden);
            }
            tx.execute("DELETE FROM connections WHERE id = ?1", [connection_id.to_string()])?;
            tx.commit()?;
            Ok(Guarded::Done(existing))
        })
    }

    /// Every connection involving `user_id`, most recently changed first.
    pub fn list_connections(
        &self,
        user_id: Uuid,
        status: Option<ConnectionStatus>,
    ) -> Result<Vec<Connection>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE (c.sender_id = ?1 OR c.receiver_id = ?1)
                   AND (?2 IS NULL OR c.status = ?2)
                 ORDER BY c.updated_at DESC, c.id DESC",
                select_connections()
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    params![user_id.to_string(), status.map(|s| s.as_str())],
                    connection_at,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn find_edge(conn: &SqlConnection, a: Uuid, b: Uuid) -> Result<Option<Edge>> {
    let edge = conn
        .query_row(
            "SELECT id, sender_id, receiver_id, status FROM connections
             WHERE (sender_id = ?1 AND receiver_id = ?2)
                OR (sender_id = ?2 AND receiver_id = ?1)",
            params![a.to_string(), b.to_string()],
            |row| {
                Ok(Edge {
                    id: uuid_at(row, 0)?,
                    sender_id: uuid_at(row, 1)?,
                    receiver_id: uuid_at(row, 2)?,
                    status: enum_at(row, 3)?,
                })
            },
        )
        .optional()?;
    Ok(edge)
}

/// Move `edge` out of PENDING. Compare-and-swap: a row answered since `edge`
/// was read is left alone and reported as `AlreadyAnswered`.
fn answer(conn: &SqlConnection, edge: &Edge, status: ConnectionStatus) -> Result<ConnectionOutcome> {
    let changed = conn.execute(
        "UPDATE connections SET status = ?1, updated_at = ?2
         WHERE id = ?3 AND status = ?4",
        params![
            status.as_str(),
            now(),
            edge.id.to_string(),
            ConnectionStatus::Pending.as_str(),
        ],
    )?;
    if changed == 0 {
        return Ok(ConnectionOutcome::Refused(TransitionError::AlreadyAnswered));
    }
    let updated = query_connection(conn, edge.id)?
        .ok_or_else(|| anyhow::anyhow!("connection {} vanished after update", edge.id))?;
    Ok(ConnectionOutcome::Applied(updated))
}

fn edge_of(connection: &Connection) -> Edge {
    Edge {
        id: connection.id,
        sender_id: connection.sender_id,
        receiver_id: connection.receiver_id,
        status: connection.status,
    }
}

fn select_connections() -> String {
    format!(
        "SELECT c.id, c.status, c.created_at, c.updated_at, {}, {}
         FROM connections c
         JOIN users s ON s.id = c.sender_id
         JOIN users r ON r.id = c.receiver_id",
        summary_columns("s"),
        summary_columns("r"),
    )
}

fn query_connection(conn: &SqlConnection, id: Uuid) -> Result<Option<Connection>> {
    let sql = format!("{} WHERE c.id = ?1", select_connections());
    let row = conn
        .query_row(&sql, [id.to_string()], connection_at)
        .optional()?;
    Ok(row)
}

fn connection_at(row: &rusqlite::Row<'_>) -> rusqlite::Result<Connection> {
    let sender = summary_at(row, 4)?;
    let receiver = summary_at(row, 9)?;
    Ok(Connection {
        id: uuid_at(row, 0)?,
        status: enum_at(row, 1)?,
        created_at: time_at(row, 2)?,
        updated_at: time_at(row, 3)?,
        sender_id: sender.id,
        receiver_id: receiver.id,
        sender,
        receiver,
    })
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Barrier;

    use super::*;
    use crate::queries::test_support;

    fn applied(outcome: ConnectionOutcome) -> Connection {
        match outcome {
            ConnectionOutcome::Applied(c) => c,
            ConnectionOutcome::Refused(e) => panic!("transition refused: {}", e),
        }
    }

    fn refused(outcome: ConnectionOutcome) -> TransitionError {
        match outcome {
            ConnectionOutcome::Refused(e) => e,
            ConnectionOutcome::Applied(c) => panic!("transition applied: {:?}", c.status),
        }
    }

    #[test]
    fn request_is_visible_to_both_users_as_one_pending_row() {
        let db = test_support::db();
        let a = test_support::user(&db, "Ann");
        let b = test_support::user(&db, "Ben");

        let created = applied(db.request_connection(a, b).unwrap());
        assert_eq!(created.status, ConnectionStatus::Pending);

        for user in [a, b] {
            let pending = db.list_connections(user, Some(ConnectionStatus::Pending)).unwrap();
            assert_eq!(pending.len(), 1);
            assert_eq!(pending[0].id, created.id);
        }
        assert!(db.list_connections(a, Some(ConnectionStatus::Accepted)).unwrap().is_empty());
    }

    #[test]
    fn self_and_duplicate_requests_are_refused() {
        let db = test_support::db();
        let a = test_support::user(&db, "Ann");
        let b = test_support::user(&db, "Ben");

        assert_eq!(refused(db.request_connection(a, a).unwrap()), TransitionError::SelfConnection);
        applied(db.request_connection(a, b).unwrap());
        assert_eq!(refused(db.request_connection(a, b).unwrap()), TransitionError::AlreadyExists);
        assert_eq!(refused(db.request_connection(b, a).unwrap()), TransitionError::AlreadyExists);
    }

    #[test]
    fn only_receiver_answers_and_only_once() {
        let db = test_support::db();
        let a = test_support::user(&db, "Ann");
        let b = test_support::user(&db, "Ben");
        applied(db.request_connection(a, b).unwrap());

        assert_eq!(
            refused(db.respond_connection(a, b, ConnectionAction::Accept).unwrap()),
            TransitionError::NoPendingRequest
        );
        let accepted = applied(db.respond_connection(b, a, ConnectionAction::Accept).unwrap());
        assert_eq!(accepted.status, ConnectionStatus::Accepted);
        assert_eq!(
            refused(db.respond_connection(b, a, ConnectionAction::Reject).unwrap()),
            TransitionError::NoPendingRequest
        );
    }

    #[test]
    fn rejected_then_deleted_allows_exactly_one_new_request() {
        let db = test_support::db();
        let a = test_support::user(&db, "Ann");
        let b = test_support::user(&db, "Ben");
        let first = applied(db.request_connection(a, b).unwrap());
        applied(db.respond_connection(b, a, ConnectionAction::Reject).unwrap());

        let deleted = db.delete_connection(b, first.id).unwrap();
        assert!(matches!(deleted, Guarded::Done(_)));

        let second = applied(db.request_connection(a, b).unwrap());
        assert_ne!(second.id, first.id);
        assert_eq!(refused(db.request_connection(a, b).unwrap()), TransitionError::AlreadyExists);
    }

    #[test]
    fn request_over_rejected_row_replaces_it() {
        let db = test_support::db();
        let a = test_support::user(&db, "Ann");
        let b = test_support::user(&db, "Ben");
        let first = applied(db.request_connection(a, b).unwrap());
        applied(db.respond_connection(b, a, ConnectionAction::Reject).unwrap());

        let again = applied(db.request_connection(b, a).unwrap());
        assert_eq!(again.sender_id, b);
        assert_eq!(again.status, ConnectionStatus::Pending);
        assert!(db.list_connections(a, None).unwrap().iter().all(|c| c.id != first.id));
    }

    /// Two handles on one database file, as two server processes would have.
    fn shared_file() -> (PathBuf, Database, Database) {
        let path = std::env::temp_dir().join(format!("meridian-cas-{}.db", Uuid::new_v4()));
        let first = Database::open(&path).unwrap();
        let second = Database::open(&path).unwrap();
        (path, first, second)
    }

    fn remove_db_files(path: &Path) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }

    #[test]
    fn stale_answer_loses_the_compare_and_swap() {
        let (path, first, second) = shared_file();
        let a = test_support::user(&first, "Ann");
        let b = test_support::user(&first, "Ben");
        applied(first.request_connection(a, b).unwrap());

        // Both handles read the row while it is still pending
        let read = |db: &Database| db.with_conn(|conn| find_edge(conn, b, a)).unwrap().unwrap();
        let (seen_first, seen_second) = (read(&first), read(&second));

        let write = |db: &Database, edge: Edge, status| {
            db.with_conn(|conn| answer(conn, &edge, status)).unwrap()
        };
        let won = applied(write(&first, seen_first, ConnectionStatus::Accepted));
        assert_eq!(won.status, ConnectionStatus::Accepted);
        assert_eq!(
            refused(write(&second, seen_second, ConnectionStatus::Rejected)),
            TransitionError::AlreadyAnswered
        );
        assert_eq!(
            second.get_connection_between(a, b).unwrap().map(|c| c.status),
            Some(ConnectionStatus::Accepted)
        );

        drop((first, second));
        remove_db_files(&path);
    }

    #[test]
    fn concurrent_answers_have_exactly_one_winner() {
        let (path, first, second) = shared_file();
        let a = test_support::user(&first, "Ann");
        let b = test_support::user(&first, "Ben");
        applied(first.request_connection(a, b).unwrap());

        let barrier = Barrier::new(2);
        let outcomes: Vec<ConnectionOutcome> = std::thread::scope(|scope| {
            let answers = [(&first, ConnectionAction::Accept), (&second, ConnectionAction::Reject)];
            let handles: Vec<_> = answers
                .into_iter()
                .map(|(db, action)| {
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        db.respond_connection(b, a, action).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners = outcomes
            .iter()
            .filter(|o| matches!(o, ConnectionOutcome::Applied(_)))
            .count();
        assert_eq!(winners, 1);
        assert!(outcomes.iter().any(|o| matches!(
            o,
            ConnectionOutcome::Refused(TransitionError::NoPendingRequest | TransitionError::AlreadyAnswered)
        )));

        drop((first, second));
        remove_db_files(&path);
    }

    #[test]
    fn outsiders_cannot_delete() {
        let db = test_support::db();
        let a = test_support::user(&db, "Ann");
        let b = test_support::user(&db, "Ben");
        let c = test_support::user(&db, "Cat");
        let row = applied(db.request_connection(a, b).unwrap());

        assert!(matches!(db.delete_connection(c, row.id).unwrap(), Guarded::Forbidden));
        assert!(matches!(db.delete_connection(c, Uuid::new_v4()).unwrap(), Guarded::NotFound));
        assert_eq!(db.get_connection_between(b, a).unwrap().map(|r| r.id), Some(row.id));
    }
}
