use anyhow::Result;
use rusqlite::{Connection, ErrorCode, OptionalExtension, TransactionBehavior, params};
use uuid::Uuid;

use meridian_types::models::{Role, SocialLinks, UserProfile, UserSummary};

use super::{enum_at, now, summary_at, summary_columns, time_at, uuid_at};
use crate::models::{ProfileChanges, UserRow};
use crate::Database;

impl Database {
    /// Insert a user together with an empty profile row. `None` when the
    /// email is already registered.
    pub fn create_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<Option<UserProfile>> {
        let id = Uuid::new_v4();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let inserted = tx.execute(
                "INSERT INTO users (id, name, email, password, role, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id.to_string(), name, email, password_hash, role.as_str(), now()],
            );
            match inserted {
                Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                    return Ok(None);
                }
                other => other?,
            };
            tx.execute(
                "INSERT INTO profiles (user_id) VALUES (?1)",
                [id.to_string()],
            )?;
            let profile = query_profile(&tx, id)?
                .ok_or_else(|| anyhow::anyhow!("user {} vanished after insert", id))?;
            tx.commit()?;
            Ok(Some(profile))
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, name, email, password, role FROM users WHERE email = ?1",
                    [email],
                    |row| {
                        Ok(UserRow {
                            id: uuid_at(row, 0)?,
                            name: row.get(1)?,
                            email: row.get(2)?,
                            password: row.get(3)?,
                            role: enum_at(row, 4)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn email_taken(&self, email: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let taken = conn
                .query_row("SELECT 1 FROM users WHERE email = ?1", [email], |_| Ok(()))
                .optional()?
                .is_some();
            Ok(taken)
        })
    }

    pub fn get_user_summary(&self, id: Uuid) -> Result<Option<UserSummary>> {
        self.with_conn(|conn| query_summary(conn, id))
    }

    pub fn get_profile(&self, id: Uuid) -> Result<Option<UserProfile>> {
        self.with_conn(|conn| query_profile(conn, id))
    }

    /// Apply profile edits. Returns `None` when the user does not exist.
    pub fn update_profile(&self, id: Uuid, changes: &ProfileChanges) -> Result<Option<UserProfile>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if query_summary(&tx, id)?.is_none() {
                return Ok(None);
            }

            let user_columns = [
                ("name", &changes.name),
                ("business_name", &changes.business_name),
            ];
            for (column, value) in user_columns {
                if let Some(value) = value {
                    tx.execute(
                        &format!("UPDATE users SET {} = ?1 WHERE id = ?2", column),
                        params![value, id.to_string()],
                    )?;
                }
            }

            tx.execute(
                "INSERT OR IGNORE INTO profiles (user_id) VALUES (?1)",
                [id.to_string()],
            )?;
            let profile_columns = [
                ("bio", &changes.bio),
                ("location", &changes.location),
                ("occupation", &changes.occupation),
                ("website", &changes.website),
                ("facebook", &changes.facebook),
                ("twitter", &changes.twitter),
                ("linkedin", &changes.linkedin),
                ("instagram", &changes.instagram),
            ];
            for (column, value) in profile_columns {
                if let Some(value) = value {
                    tx.execute(
                        &format!("UPDATE profiles SET {} = ?1 WHERE user_id = ?2", column),
                        params![value, id.to_string()],
                    )?;
                }
            }

            let profile = query_profile(&tx, id)?;
            tx.commit()?;
            Ok(profile)
        })
    }

    /// Set the profile image URL. Returns the updated summary, or `None`
    /// when the user does not exist.
    pub fn set_user_image(&self, id: Uuid, image: &str) -> Result<Option<UserSummary>> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE users SET image = ?1 WHERE id = ?2",
                params![image, id.to_string()],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_summary(conn, id)
        })
    }
}

pub(crate) fn query_summary(conn: &Connection, id: Uuid) -> Result<Option<UserSummary>> {
    let sql = format!("SELECT {} FROM users u WHERE u.id = ?1", summary_columns("u"));
    let row = conn
        .query_row(&sql, [id.to_string()], |row| summary_at(row, 0))
        .optional()?;
    Ok(row)
}

fn query_profile(conn: &Connection, id: Uuid) -> Result<Option<UserProfile>> {
    let row = conn
        .query_row(
            "SELECT u.id, u.name, u.email, u.role, u.image, u.business_name, u.created_at,
                    p.bio, p.location, p.occupation, p.website,
                    p.facebook, p.twitter, p.linkedin, p.instagram
             FROM users u
             LEFT JOIN profiles p ON p.user_id = u.id
             WHERE u.id = ?1",
            [id.to_string()],
            |row| {
                let links = SocialLinks {
                    facebook: row.get(11)?,
                    twitter: row.get(12)?,
                    linkedin: row.get(13)?,
                    instagram: row.get(14)?,
                };
                Ok(UserProfile {
                    id: uuid_at(row, 0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    role: enum_at(row, 3)?,
                    image: row.get(4)?,
                    business_name: row.get(5)?,
                    created_at: time_at(row, 6)?,
                    bio: row.get(7)?,
                    location: row.get(8)?,
                    occupation: row.get(9)?,
                    website: row.get(10)?,
                    social_links: (!links.is_empty()).then_some(links),
                })
            },
        )
        .optional()?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support;

    #[test]
    fn new_user_has_empty_profile() {
        let db = test_support::db();
        let profile = db
            .create_user("Ada", "ada@example.com", "hash", Role::Founder)
            .unwrap()
            .unwrap();

        assert_eq!(profile.name.as_deref(), Some("Ada"));
        assert_eq!(profile.role, Role::Founder);
        assert!(profile.bio.is_none());
        assert!(profile.social_links.is_none());
        assert!(db.email_taken("ada@example.com").unwrap());
        assert!(!db.email_taken("bob@example.com").unwrap());
    }

    #[test]
    fn duplicate_email_is_reported_not_raised() {
        let db = test_support::db();
        test_support::user(&db, "Ada");

        let again = db.create_user("Ada Two", "ada@example.com", "hash", Role::User).unwrap();
        assert!(again.is_none());
        let total: i64 = db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM profiles", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(total, 1);
    }

    #[test]
    fn profile_changes_set_clear_and_skip() {
        let db = test_support::db();
        let id = test_support::user(&db, "Grace");

        let set = ProfileChanges {
            bio: Some(Some("Compilers".into())),
            location: Some(Some("Arlington".into())),
            twitter: Some(Some("https://twitter.com/grace".into())),
            ..Default::default()
        };
        let profile = db.update_profile(id, &set).unwrap().unwrap();
        assert_eq!(profile.bio.as_deref(), Some("Compilers"));
        assert_eq!(
            profile.social_links.unwrap().twitter.as_deref(),
            Some("https://twitter.com/grace")
        );

        let clear = ProfileChanges {
            location: Some(None),
            twitter: Some(None),
            ..Default::default()
        };
        let profile = db.update_profile(id, &clear).unwrap().unwrap();
        assert_eq!(profile.bio.as_deref(), Some("Compilers"));
        assert!(profile.location.is_none());
        assert!(profile.social_links.is_none());
    }

    #[test]
    fn missing_user_updates_return_none() {
        let db = test_support::db();
        let ghost = Uuid::new_v4();
        assert!(db.update_profile(ghost, &ProfileChanges::default()).unwrap().is_none());
        assert!(db.set_user_image(ghost, "/uploads/x.png").unwrap().is_none());
    }
}
