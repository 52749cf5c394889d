//! Row types and row readers.
//!
//! Public wire models live in `inkpost-types`; only rows that carry
//! storage-private data (the password hash, raw foreign keys) are defined here.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;

use inkpost_types::models::User;

/// Column list matching [`read_user`], for a `users` table aliased as `u`.
pub const USER_COLUMNS: &str = "u.id, u.username, u.email, u.first_name, u.last_name, u.nickname, \
     u.bio, u.avatar, u.created_at, u.updated_at";

/// Number of columns in [`USER_COLUMNS`].
pub const USER_COLUMN_COUNT: usize = 10;

/// A user row including the credential, used only by login.
pub struct UserRow {
    pub user: User,
    pub password_hash: String,
}

pub struct ArticleRow {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub author_id: i64,
    pub category_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct CommentRow {
    pub id: i64,
    pub article_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Reads a [`User`] from `row`, starting at column `start`.
pub fn read_user(row: &Row<'_>, start: usize) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get::<_, i64>(start)? as u64,
        username: row.get(start + 1)?,
        email: row.get(start + 2)?,
        first_name: row.get(start + 3)?,
        last_name: row.get(start + 4)?,
        nickname: row.get(start + 5)?,
        bio: row.get(start + 6)?,
        avatar: row.get(start + 7)?,
        created_at: read_timestamp(row, start + 8)?,
        updated_at: read_timestamp(row, start + 9)?,
    })
}

pub fn read_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parses the stored RFC 3339 form, falling back to SQLite's bare
/// `YYYY-MM-DD HH:MM:SS` for rows written by hand.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    raw.parse::<DateTime<Utc>>().or_else(|_| {
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_both_timestamp_forms() {
        let rfc = parse_timestamp("2025-03-01T12:30:45.123Z").unwrap();
        assert_eq!(rfc.timestamp_subsec_millis(), 123);

        let bare = parse_timestamp("2025-03-01 12:30:45").unwrap();
        assert_eq!((bare.year(), bare.hour(), bare.second()), (2025, 12, 45));

        assert!(parse_timestamp("yesterday").is_err());
    }
}
