//! Find-or-create for categories and tags.
//!
//! Both tables carry a UNIQUE name. A lookup miss is followed by an insert;
//! if the insert loses a race against another writer the unique violation is
//! treated as "already exists" and the lookup is repeated once.

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use inkpost_types::models::{Category, Tag};

use crate::error::is_unique_violation;
use crate::{Database, Error, Result, placeholders};

#[derive(Clone, Copy)]
enum Taxonomy {
    Category,
    Tag,
}

impl Taxonomy {
    fn table(self) -> &'static str {
        match self {
            Taxonomy::Category => "categories",
            Taxonomy::Tag => "tags",
        }
    }
}

fn lookup(conn: &Connection, kind: Taxonomy, name: &str) -> Result<Option<i64>> {
    let sql = format!("SELECT id FROM {} WHERE name = ?1", kind.table());
    Ok(conn.query_row(&sql, [name], |r| r.get(0)).optional()?)
}

fn find_or_create(conn: &Connection, kind: Taxonomy, raw: &str) -> Result<(i64, String)> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(Error::EmptyName);
    }

    if let Some(id) = lookup(conn, kind, name)? {
        return Ok((id, name.to_string()));
    }

    let sql = format!("INSERT INTO {} (name) VALUES (?1)", kind.table());
    match conn.execute(&sql, [name]) {
        Ok(_) => {
            debug!(table = kind.table(), name, "created taxonomy entry");
            Ok((conn.last_insert_rowid(), name.to_string()))
        }
        Err(e) if is_unique_violation(&e) => match lookup(conn, kind, name)? {
            Some(id) => Ok((id, name.to_string())),
            None => Err(e.into()),
        },
        Err(e) => Err(e.into()),
    }
}

pub fn find_or_create_category(conn: &Connection, name: &str) -> Result<Category> {
    let (id, name) = find_or_create(conn, Taxonomy::Category, name)?;
    Ok(Category {
        id: id as u64,
        name,
    })
}

/// Resolves every non-blank name in order. Blank entries are skipped;
/// repeated names resolve to the same row each time they appear.
pub fn find_or_create_tags<S: AsRef<str>>(conn: &Connection, names: &[S]) -> Result<Vec<Tag>> {
    let mut tags = Vec::with_capacity(names.len());
    for raw in names {
        match find_or_create(conn, Taxonomy::Tag, raw.as_ref()) {
            Ok((id, name)) => tags.push(Tag {
                id: id as u64,
                name,
            }),
            Err(Error::EmptyName) => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(tags)
}

/// Case-insensitive tag lookup with full Unicode case folding.
pub fn find_tag_ignore_case(conn: &Connection, name: &str) -> Result<Option<Tag>> {
    Ok(conn
        .query_row(
            "SELECT id, name FROM tags WHERE ulower(name) = ulower(?1) ORDER BY id LIMIT 1",
            [name.trim()],
            |r| {
                Ok(Tag {
                    id: r.get::<_, i64>(0)? as u64,
                    name: r.get(1)?,
                })
            },
        )
        .optional()?)
}

/// Creates a tag by exact name, returning the existing row on a clash.
pub fn create_tag(conn: &Connection, name: &str) -> Result<Tag> {
    let (id, name) = find_or_create(conn, Taxonomy::Tag, name)?;
    Ok(Tag {
        id: id as u64,
        name,
    })
}

pub fn category_exists(conn: &Connection, id: u64) -> Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM categories WHERE id = ?1", [id as i64], |_| Ok(()))
        .optional()?
        .is_some())
}

/// Returns the subset of `ids` that have no tag row, in input order.
pub fn missing_tag_ids(conn: &Connection, ids: &[u64]) -> Result<Vec<u64>> {
    if ids.is_empty() {
        return Ok(vec![]);
    }
    let sql = format!("SELECT id FROM tags WHERE id IN ({})", placeholders(ids.len()));
    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<i64> = ids.iter().map(|&id| id as i64).collect();
    let found = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), |r| r.get::<_, i64>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids
        .iter()
        .copied()
        .filter(|id| !found.contains(&(*id as i64)))
        .collect())
}

impl Database {
    pub fn find_or_create_category(&self, name: &str) -> Result<Category> {
        self.with_conn(|conn| find_or_create_category(conn, name))
    }

    pub fn find_or_create_tags<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Tag>> {
        self.with_tx(|tx| find_or_create_tags(tx, names))
    }

    pub fn list_categories(&self) -> Result<Vec<Category>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY name")?;
            let rows = stmt
                .query_map([], |r| {
                    Ok(Category {
                        id: r.get::<_, i64>(0)? as u64,
                        name: r.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_tags(&self) -> Result<Vec<Tag>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id, name FROM tags ORDER BY name")?;
            let rows = stmt
                .query_map([], |r| {
                    Ok(Tag {
                        id: r.get::<_, i64>(0)? as u64,
                        name: r.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_find_or_create_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let first = db.find_or_create_category("  Tech ").unwrap();
        let second = db.find_or_create_category("Tech").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.name, "Tech");
        assert_eq!(db.list_categories().unwrap().len(), 1);
    }

    #[test]
    fn category_names_are_case_sensitive() {
        let db = Database::open_in_memory().unwrap();
        let lower = db.find_or_create_category("tech").unwrap();
        let upper = db.find_or_create_category("Tech").unwrap();
        assert_ne!(lower.id, upper.id);
    }

    #[test]
    fn blank_category_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(db.find_or_create_category("   "), Err(Error::EmptyName)));
        assert!(db.list_categories().unwrap().is_empty());
    }

    #[test]
    fn tags_keep_input_order_and_skip_blanks() {
        let db = Database::open_in_memory().unwrap();
        db.find_or_create_tags(&["api"]).unwrap();

        let tags = db.find_or_create_tags(&["go", " ", "api", "go", ""]).unwrap();
        let names: Vec<_> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["go", "api", "go"]);
        assert_eq!(tags[0].id, tags[2].id);
        assert_eq!(db.list_tags().unwrap().len(), 2);
    }

    #[test]
    fn case_insensitive_tag_lookup() {
        let db = Database::open_in_memory().unwrap();
        db.find_or_create_tags(&["Go"]).unwrap();
        db.with_conn(|conn| {
            let found = find_tag_ignore_case(conn, "gO")?.unwrap();
            assert_eq!(found.name, "Go");
            assert!(find_tag_ignore_case(conn, "rust")?.is_none());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn non_ascii_tag_lookup_ignores_case() {
        let db = Database::open_in_memory().unwrap();
        db.find_or_create_tags(&["Über", "Ёлка"]).unwrap();
        db.with_conn(|conn| {
            assert_eq!(find_tag_ignore_case(conn, "über")?.unwrap().name, "Über");
            assert_eq!(find_tag_ignore_case(conn, "ÜBER")?.unwrap().name, "Über");
            assert_eq!(find_tag_ignore_case(conn, "ёЛКА")?.unwrap().name, "Ёлка");
            assert!(find_tag_ignore_case(conn, "uber")?.is_none());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn reports_unknown_tag_ids() {
        let db = Database::open_in_memory().unwrap();
        let tags = db.find_or_create_tags(&["a", "b"]).unwrap();
        db.with_conn(|conn| {
            let missing = missing_tag_ids(conn, &[tags[0].id, 404, tags[1].id, 405])?;
            assert_eq!(missing, vec![404, 405]);
            Ok(())
        })
        .unwrap();
    }
}
