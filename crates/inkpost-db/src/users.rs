use rusqlite::{Connection, OptionalExtension};

use inkpost_types::models::User;

use crate::error::is_unique_violation;
use crate::migrations::NOW;
use crate::models::{USER_COLUMNS, USER_COLUMN_COUNT, UserRow, read_user};
use crate::{Database, Error, Result};

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub nickname: &'a str,
}

/// Profile fields to overwrite. `None` leaves the stored value alone.
#[derive(Debug, Default)]
pub struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub nickname: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<String>,
}

impl Database {
    pub fn create_user(&self, new: &NewUser<'_>) -> Result<User> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (username, email, password_hash, first_name, last_name, nickname)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                (
                    new.username,
                    new.email,
                    new.password_hash,
                    new.first_name,
                    new.last_name,
                    new.nickname,
                ),
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    return Err(Error::Conflict("username or email".into()));
                }
                Err(e) => return Err(e.into()),
            }
            let id = conn.last_insert_rowid();
            query_user(conn, id)?.ok_or_else(|| Error::NotFound("user".into()))
        })
    }

    pub fn username_taken(&self, username: &str) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row("SELECT 1 FROM users WHERE username = ?1", [username], |_| Ok(()))
                .optional()?
                .is_some())
        })
    }

    pub fn email_taken(&self, email: &str) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row("SELECT 1 FROM users WHERE email = ?1", [email], |_| Ok(()))
                .optional()?
                .is_some())
        })
    }

    /// Looks an account up by email or username, returning the credential too.
    pub fn find_login(&self, identifier: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS}, u.password_hash FROM users u
                 WHERE u.email = ?1 OR u.username = ?1
                 ORDER BY u.id LIMIT 1"
            );
            let row = conn
                .query_row(&sql, [identifier], |row| {
                    Ok(UserRow {
                        user: read_user(row, 0)?,
                        password_hash: row.get(USER_COLUMN_COUNT)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_user(&self, id: u64) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, id as i64))
    }

    pub fn update_profile(&self, id: u64, changes: &ProfileChanges) -> Result<User> {
        self.with_conn(|conn| {
            let sql = format!(
                "UPDATE users SET
                    first_name = COALESCE(?2, first_name),
                    last_name  = COALESCE(?3, last_name),
                    nickname   = COALESCE(?4, nickname),
                    bio        = COALESCE(?5, bio),
                    avatar     = COALESCE(?6, avatar),
                    updated_at = {NOW}
                 WHERE id = ?1"
            );
            let updated = conn.execute(
                &sql,
                rusqlite::params![
                    id as i64,
                    changes.first_name,
                    changes.last_name,
                    changes.nickname,
                    changes.bio,
                    changes.avatar,
                ],
            )?;
            if updated == 0 {
                return Err(Error::NotFound("user".into()));
            }
            query_user(conn, id as i64)?.ok_or_else(|| Error::NotFound("user".into()))
        })
    }
}

pub(crate) fn query_user(conn: &Connection, id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = ?1");
    Ok(conn.query_row(&sql, [id], |row| read_user(row, 0)).optional()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::new_user;

    #[test]
    fn create_and_fetch_user() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user(&new_user("alice", "alice@example.com")).unwrap();
        assert_eq!(user.username, "alice");
        assert!(user.bio.is_none());

        let fetched = db.get_user(user.id).unwrap().unwrap();
        assert_eq!(fetched, user);
        assert!(db.get_user(user.id + 100).unwrap().is_none());
    }

    #[test]
    fn duplicate_username_or_email_conflicts() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("alice", "alice@example.com")).unwrap();

        let dup_name = db.create_user(&new_user("alice", "other@example.com"));
        assert!(matches!(dup_name, Err(Error::Conflict(_))));

        let dup_mail = db.create_user(&new_user("alicia", "alice@example.com"));
        assert!(matches!(dup_mail, Err(Error::Conflict(_))));

        assert!(db.username_taken("alice").unwrap());
        assert!(db.email_taken("alice@example.com").unwrap());
        assert!(!db.username_taken("bob").unwrap());
    }

    #[test]
    fn login_lookup_matches_email_or_username() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("alice", "alice@example.com")).unwrap();

        let by_name = db.find_login("alice").unwrap().unwrap();
        let by_mail = db.find_login("alice@example.com").unwrap().unwrap();
        assert_eq!(by_name.user.id, by_mail.user.id);
        assert_eq!(by_name.password_hash, "$argon2id$placeholder");
        assert!(db.find_login("nobody").unwrap().is_none());
    }

    #[test]
    fn profile_update_only_touches_supplied_fields() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user(&new_user("alice", "alice@example.com")).unwrap();

        let updated = db
            .update_profile(
                user.id,
                &ProfileChanges {
                    nickname: Some("ally".into()),
                    bio: Some("writes things".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.nickname, "ally");
        assert_eq!(updated.bio.as_deref(), Some("writes things"));
        assert_eq!(updated.first_name, "First");
        assert!(updated.updated_at >= user.updated_at);

        let missing = db.update_profile(999, &ProfileChanges::default());
        assert!(matches!(missing, Err(Error::NotFound(_))));
    }
}
