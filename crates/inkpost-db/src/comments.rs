use rusqlite::{Connection, OptionalExtension, Row};
use tracing::info;

use inkpost_types::models::Comment;

use crate::migrations::NOW;
use crate::models::{CommentRow, USER_COLUMNS, read_timestamp, read_user};
use crate::{Database, Error, Result};

/// Reads `c.id, c.article_id, c.content, c.created_at, c.updated_at` followed
/// by [`USER_COLUMNS`].
pub(crate) fn read_comment(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get::<_, i64>(0)? as u64,
        article_id: row.get::<_, i64>(1)? as u64,
        content: row.get(2)?,
        created_at: read_timestamp(row, 3)?,
        updated_at: read_timestamp(row, 4)?,
        user: read_user(row, 5)?,
    })
}

fn query_comment(conn: &Connection, id: i64) -> Result<Option<Comment>> {
    let sql = format!(
        "SELECT c.id, c.article_id, c.content, c.created_at, c.updated_at, {USER_COLUMNS}
         FROM comments c JOIN users u ON u.id = c.user_id
         WHERE c.id = ?1"
    );
    Ok(conn.query_row(&sql, [id], read_comment).optional()?)
}

impl Database {
    /// Comments on one article, newest first.
    pub fn list_comments(&self, article_id: u64) -> Result<Vec<Comment>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT c.id, c.article_id, c.content, c.created_at, c.updated_at, {USER_COLUMNS}
                 FROM comments c JOIN users u ON u.id = c.user_id
                 WHERE c.article_id = ?1
                 ORDER BY c.created_at DESC, c.id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let comments = stmt
                .query_map([article_id as i64], read_comment)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(comments)
        })
    }

    pub fn create_comment(&self, article_id: u64, user_id: u64, content: &str) -> Result<Comment> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (article_id, user_id, content) VALUES (?1, ?2, ?3)",
                (article_id as i64, user_id as i64, content),
            )?;
            let id = conn.last_insert_rowid();
            info!(comment_id = id, article_id, user_id, "comment created");
            query_comment(conn, id)?.ok_or_else(|| Error::NotFound("comment".into()))
        })
    }

    pub fn comment_row(&self, id: u64) -> Result<Option<CommentRow>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, article_id, user_id, content, created_at, updated_at
                     FROM comments WHERE id = ?1",
                    [id as i64],
                    |row| {
                        Ok(CommentRow {
                            id: row.get(0)?,
                            article_id: row.get(1)?,
                            user_id: row.get(2)?,
                            content: row.get(3)?,
                            created_at: read_timestamp(row, 4)?,
                            updated_at: read_timestamp(row, 5)?,
                        })
                    },
                )
                .optional()?)
        })
    }

    pub fn update_comment(&self, id: u64, content: &str) -> Result<Comment> {
        self.with_conn(|conn| {
            let sql = format!("UPDATE comments SET content = ?2, updated_at = {NOW} WHERE id = ?1");
            if conn.execute(&sql, (id as i64, content))? == 0 {
                return Err(Error::NotFound("comment".into()));
            }
            query_comment(conn, id as i64)?.ok_or_else(|| Error::NotFound("comment".into()))
        })
    }

    pub fn delete_comment(&self, id: u64) -> Result<()> {
        self.with_conn(|conn| {
            if conn.execute("DELETE FROM comments WHERE id = ?1", [id as i64])? == 0 {
                return Err(Error::NotFound("comment".into()));
            }
            info!(comment_id = id, "comment deleted");
            Ok(())
        })
    }
}
