use std::collections::HashMap;

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::{debug, info};

use inkpost_types::models::{Article, Category, Comment, Tag, User};

use crate::error::is_unique_violation;
use crate::migrations::NOW;
use crate::models::{ArticleRow, USER_COLUMNS, read_timestamp, read_user};
use crate::taxonomy::{
    category_exists, create_tag, find_or_create_category, find_or_create_tags,
    find_tag_ignore_case, missing_tag_ids,
};
use crate::{Database, Error, Result, placeholders};

const ARTICLE_COLUMNS: &str =
    "a.id, a.title, a.slug, a.content, a.author_id, a.category_id, a.created_at, a.updated_at";

pub struct NewArticle<'a> {
    pub title: &'a str,
    pub slug: &'a str,
    pub content: &'a str,
    pub author_id: u64,
    pub category_name: &'a str,
    pub tag_names: &'a [String],
}

pub enum CategoryRef {
    Id(u64),
    Name(String),
}

/// Field changes for an existing article. `None` means "leave as is".
#[derive(Default)]
pub struct ArticlePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<CategoryRef>,
    pub tag_ids: Option<Vec<u64>>,
    pub new_tags: Option<Vec<String>>,
}

/// What an update does to an article's tag association.
#[derive(Debug, PartialEq, Eq)]
pub enum TagChange {
    Untouched,
    Replace(Vec<u64>),
    Clear,
}

/// Decides the tag outcome of an update.
///
/// `supplied` is the caller's `tag_ids` (absent vs. present matters, even when
/// empty) and `created` the ids of tags newly created from `new_tags`. The
/// association is only touched when the caller sent `tag_ids` or a new tag was
/// created; then it is replaced by the union, or cleared if the union is empty.
pub fn plan_tag_change(supplied: Option<&[u64]>, created: &[u64]) -> TagChange {
    if supplied.is_none() && created.is_empty() {
        return TagChange::Untouched;
    }
    let mut union: Vec<u64> = supplied.unwrap_or_default().to_vec();
    for id in created {
        if !union.contains(id) {
            union.push(*id);
        }
    }
    if union.is_empty() {
        TagChange::Clear
    } else {
        TagChange::Replace(union)
    }
}

#[derive(Debug, Default, Clone)]
pub struct ArticleFilter {
    /// Whitespace-separated keywords; each must hit title, content or a tag name.
    pub search: Option<String>,
    pub category_id: Option<u64>,
    pub author_id: Option<u64>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl Database {
    pub fn create_article(&self, new: &NewArticle<'_>) -> Result<Article> {
        self.with_tx(|tx| {
            if title_taken(tx, new.title, None)? {
                return Err(Error::Conflict("title".into()));
            }
            if find_row_by_slug(tx, new.slug)?.is_some() {
                return Err(Error::Conflict("slug".into()));
            }

            let category = find_or_create_category(tx, new.category_name)?;
            let tags = find_or_create_tags(tx, new.tag_names)?;

            let inserted = tx.execute(
                "INSERT INTO articles (title, slug, content, author_id, category_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (
                    new.title,
                    new.slug,
                    new.content,
                    new.author_id as i64,
                    category.id as i64,
                ),
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => {
                    return Err(Error::Conflict("title or slug".into()));
                }
                Err(e) => return Err(e.into()),
            }
            let id = tx.last_insert_rowid();

            let tag_ids: Vec<u64> = tags.iter().map(|t| t.id).collect();
            link_tags(tx, id, &tag_ids)?;

            info!(article_id = id, slug = new.slug, author_id = new.author_id, "article created");
            load_article(tx, id)
        })
    }

    pub fn article_by_slug(&self, slug: &str) -> Result<Option<Article>> {
        self.with_conn(|conn| match find_row_by_slug(conn, slug)? {
            Some(row) => Ok(load_articles(conn, vec![row])?.pop()),
            None => Ok(None),
        })
    }

    /// Bare row (no expansion), used for ownership checks before mutating.
    pub fn article_row_by_slug(&self, slug: &str) -> Result<Option<ArticleRow>> {
        self.with_conn(|conn| find_row_by_slug(conn, slug))
    }

    pub fn list_articles(&self, filter: &ArticleFilter) -> Result<Vec<Article>> {
        self.with_conn(|conn| {
            let rows = query_rows(conn, filter)?;
            load_articles(conn, rows)
        })
    }

    /// Applies `patch` atomically: field changes and the tag association
    /// either all commit or none do.
    pub fn update_article(&self, id: i64, patch: &ArticlePatch) -> Result<Article> {
        self.with_tx(|tx| {
            if find_row_by_id(tx, id)?.is_none() {
                return Err(Error::NotFound("article".into()));
            }

            if let Some(title) = &patch.title {
                if title_taken(tx, title, Some(id))? {
                    return Err(Error::Conflict("title".into()));
                }
            }

            let category_id = match &patch.category {
                Some(CategoryRef::Id(cid)) => {
                    if !category_exists(tx, *cid)? {
                        return Err(Error::UnknownCategory(*cid));
                    }
                    Some(*cid as i64)
                }
                Some(CategoryRef::Name(name)) => Some(find_or_create_category(tx, name)?.id as i64),
                None => None,
            };

            let sql = format!(
                "UPDATE articles SET
                    title       = COALESCE(?2, title),
                    content     = COALESCE(?3, content),
                    category_id = COALESCE(?4, category_id),
                    updated_at  = {NOW}
                 WHERE id = ?1"
            );
            match tx.execute(&sql, rusqlite::params![id, patch.title, patch.content, category_id]) {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => return Err(Error::Conflict("title".into())),
                Err(e) => return Err(e.into()),
            }

            if let Some(ids) = &patch.tag_ids {
                if let Some(&unknown) = missing_tag_ids(tx, ids)?.first() {
                    return Err(Error::UnknownTag(unknown));
                }
            }

            let mut created = Vec::new();
            for name in patch.new_tags.iter().flatten() {
                let name = name.trim();
                if name.is_empty() || find_tag_ignore_case(tx, name)?.is_some() {
                    continue;
                }
                created.push(create_tag(tx, name)?.id);
            }

            match plan_tag_change(patch.tag_ids.as_deref(), &created) {
                TagChange::Untouched => {}
                TagChange::Clear => {
                    clear_tags(tx, id)?;
                    debug!(article_id = id, "tags cleared");
                }
                TagChange::Replace(ids) => {
                    clear_tags(tx, id)?;
                    link_tags(tx, id, &ids)?;
                    debug!(article_id = id, count = ids.len(), "tags replaced");
                }
            }

            load_article(tx, id)
        })
    }

    /// Drops the tag links, then the article; comments go with it by cascade.
    pub fn delete_article(&self, id: i64) -> Result<()> {
        self.with_tx(|tx| {
            clear_tags(tx, id)?;
            let deleted = tx.execute("DELETE FROM articles WHERE id = ?1", [id])?;
            if deleted == 0 {
                return Err(Error::NotFound("article".into()));
            }
            info!(article_id = id, "article deleted");
            Ok(())
        })
    }
}

fn read_article_row(row: &Row<'_>) -> rusqlite::Result<ArticleRow> {
    Ok(ArticleRow {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        content: row.get(3)?,
        author_id: row.get(4)?,
        category_id: row.get(5)?,
        created_at: read_timestamp(row, 6)?,
        updated_at: read_timestamp(row, 7)?,
    })
}

pub(crate) fn find_row_by_slug(conn: &Connection, slug: &str) -> Result<Option<ArticleRow>> {
    let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles a WHERE a.slug = ?1");
    Ok(conn.query_row(&sql, [slug], read_article_row).optional()?)
}

fn find_row_by_id(conn: &Connection, id: i64) -> Result<Option<ArticleRow>> {
    let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles a WHERE a.id = ?1");
    Ok(conn.query_row(&sql, [id], read_article_row).optional()?)
}

fn title_taken(conn: &Connection, title: &str, except: Option<i64>) -> Result<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM articles WHERE title = ?1 AND id IS NOT ?2",
            rusqlite::params![title, except],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

fn clear_tags(conn: &Connection, article_id: i64) -> Result<()> {
    conn.execute("DELETE FROM article_tags WHERE article_id = ?1", [article_id])?;
    Ok(())
}

fn link_tags(conn: &Connection, article_id: i64, tag_ids: &[u64]) -> Result<()> {
    let mut stmt =
        conn.prepare("INSERT OR IGNORE INTO article_tags (article_id, tag_id) VALUES (?1, ?2)")?;
    for &tag_id in tag_ids {
        stmt.execute((article_id, tag_id as i64))?;
    }
    Ok(())
}

/// Escapes LIKE wildcards so a keyword only ever matches literally.
fn like_pattern(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len() + 2);
    escaped.push('%');
    for ch in keyword.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn query_rows(conn: &Connection, filter: &ArticleFilter) -> Result<Vec<ArticleRow>> {
    let mut sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles a WHERE 1 = 1");
    let mut params: Vec<Value> = Vec::new();

    if let Some(category_id) = filter.category_id {
        params.push(Value::Integer(category_id as i64));
        sql.push_str(&format!(" AND a.category_id = ?{}", params.len()));
    }

    if let Some(author_id) = filter.author_id {
        params.push(Value::Integer(author_id as i64));
        sql.push_str(&format!(" AND a.author_id = ?{}", params.len()));
    }

    let search = filter.search.as_deref().unwrap_or_default().to_lowercase();
    for keyword in search.split_whitespace() {
        params.push(Value::Text(like_pattern(keyword)));
        let n = params.len();
        sql.push_str(&format!(
            " AND (ulower(a.title) LIKE ?{n} ESCAPE '\\'
                OR ulower(a.content) LIKE ?{n} ESCAPE '\\'
                OR EXISTS (
                    SELECT 1 FROM article_tags atg JOIN tags t ON t.id = atg.tag_id
                    WHERE atg.article_id = a.id AND ulower(t.name) LIKE ?{n} ESCAPE '\\'))"
        ));
    }

    sql.push_str(" ORDER BY a.created_at DESC, a.id DESC");

    if filter.limit.is_some() || filter.offset.is_some() {
        params.push(Value::Integer(filter.limit.map_or(-1, i64::from)));
        params.push(Value::Integer(filter.offset.map_or(0, i64::from)));
        sql.push_str(&format!(" LIMIT ?{} OFFSET ?{}", params.len() - 1, params.len()));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), read_article_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn load_article(conn: &Connection, id: i64) -> Result<Article> {
    let row = find_row_by_id(conn, id)?.ok_or_else(|| Error::NotFound("article".into()))?;
    load_articles(conn, vec![row])?
        .pop()
        .ok_or_else(|| Error::NotFound("article".into()))
}

/// Expands rows with author, category, tags and comments, batching each
/// relation into one `IN (...)` query. Output order follows `rows`.
fn load_articles(conn: &Connection, rows: Vec<ArticleRow>) -> Result<Vec<Article>> {
    if rows.is_empty() {
        return Ok(vec![]);
    }

    let article_ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let author_ids: Vec<i64> = rows.iter().map(|r| r.author_id).collect();
    let category_ids: Vec<i64> = rows.iter().filter_map(|r| r.category_id).collect();

    let authors = users_by_id(conn, &author_ids)?;
    let categories = categories_by_id(conn, &category_ids)?;
    let mut tags = tags_by_article(conn, &article_ids)?;
    let mut comments = comments_by_article(conn, &article_ids)?;

    let mut articles = Vec::with_capacity(rows.len());
    for row in rows {
        let author = authors
            .get(&row.author_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("author {}", row.author_id)))?;
        articles.push(Article {
            id: row.id as u64,
            title: row.title,
            slug: row.slug,
            content: row.content,
            author,
            category: row.category_id.and_then(|cid| categories.get(&cid).cloned()),
            tags: tags.remove(&row.id).unwrap_or_default(),
            comments: comments.remove(&row.id).unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        });
    }
    Ok(articles)
}

fn dedup(ids: &[i64]) -> Vec<i64> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn users_by_id(conn: &Connection, ids: &[i64]) -> Result<HashMap<i64, User>> {
    let ids = dedup(ids);
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users u WHERE u.id IN ({})",
        placeholders(ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let users = stmt
        .query_map(rusqlite::params_from_iter(ids.iter()), |row| read_user(row, 0))?
        .map(|u| u.map(|u| (u.id as i64, u)))
        .collect::<std::result::Result<HashMap<_, _>, _>>()?;
    Ok(users)
}

fn categories_by_id(conn: &Connection, ids: &[i64]) -> Result<HashMap<i64, Category>> {
    let ids = dedup(ids);
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let sql = format!(
        "SELECT id, name FROM categories WHERE id IN ({})",
        placeholders(ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let categories = stmt
        .query_map(rusqlite::params_from_iter(ids.iter()), |r| {
            let id: i64 = r.get(0)?;
            Ok((
                id,
                Category {
                    id: id as u64,
                    name: r.get(1)?,
                },
            ))
        })?
        .collect::<std::result::Result<HashMap<_, _>, _>>()?;
    Ok(categories)
}

fn tags_by_article(conn: &Connection, article_ids: &[i64]) -> Result<HashMap<i64, Vec<Tag>>> {
    let sql = format!(
        "SELECT atg.article_id, t.id, t.name
         FROM article_tags atg JOIN tags t ON t.id = atg.tag_id
         WHERE atg.article_id IN ({})
         ORDER BY t.name",
        placeholders(article_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut grouped: HashMap<i64, Vec<Tag>> = HashMap::new();
    let rows = stmt.query_map(rusqlite::params_from_iter(article_ids.iter()), |r| {
        Ok((
            r.get::<_, i64>(0)?,
            Tag {
                id: r.get::<_, i64>(1)? as u64,
                name: r.get(2)?,
            },
        ))
    })?;
    for row in rows {
        let (article_id, tag) = row?;
        grouped.entry(article_id).or_default().push(tag);
    }
    Ok(grouped)
}

fn comments_by_article(conn: &Connection, article_ids: &[i64]) -> Result<HashMap<i64, Vec<Comment>>> {
    let sql = format!(
        "SELECT c.id, c.article_id, c.content, c.created_at, c.updated_at, {USER_COLUMNS}
         FROM comments c JOIN users u ON u.id = c.user_id
         WHERE c.article_id IN ({})
         ORDER BY c.created_at DESC, c.id DESC",
        placeholders(article_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut grouped: HashMap<i64, Vec<Comment>> = HashMap::new();
    let rows = stmt.query_map(
        rusqlite::params_from_iter(article_ids.iter()),
        crate::comments::read_comment,
    )?;
    for row in rows {
        let comment = row?;
        grouped.entry(comment.article_id as i64).or_default().push(comment);
    }
    Ok(grouped)
}
