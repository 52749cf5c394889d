use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use tracing::info;

use inkpost_db::Database;
use inkpost_db::models::CommentRow;
use inkpost_types::api::{CommentRequest, not_blank};
use inkpost_types::models::Comment;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::middleware::RequestContext;
use crate::ownership::ensure_owner;
use crate::response::ApiResponse;

fn article_id(db: &Database, slug: &str) -> Result<i64, ApiError> {
    db.article_row_by_slug(slug)?
        .map(|row| row.id)
        .ok_or_else(|| ApiError::NotFound("Article not found".into()))
}

/// Loads a comment that must hang off the article named by `slug`.
fn comment_on(db: &Database, slug: &str, comment_id: u64) -> Result<CommentRow, ApiError> {
    let not_found = || ApiError::NotFound("Comment not found".into());
    let comment = db.comment_row(comment_id)?.ok_or_else(not_found)?;
    if comment.article_id != article_id(db, slug)? {
        return Err(not_found());
    }
    Ok(comment)
}

fn content_of(req: CommentRequest) -> Result<String, ApiError> {
    not_blank(&req.content).map_err(|_| ApiError::field("content", "Comment content is required"))?;
    Ok(req.content.trim().to_string())
}

pub async fn list(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<ApiResponse<Vec<Comment>>, ApiError> {
    let comments = blocking(&state, move |db| {
        let article_id = article_id(db, &slug)?;
        Ok(db.list_comments(article_id as u64)?)
    })
    .await?;
    Ok(ApiResponse::ok("Comments retrieved successfully", comments))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(slug): Path<String>,
    JsonBody(req): JsonBody<CommentRequest>,
) -> Result<ApiResponse<Comment>, ApiError> {
    let user_id = ctx.user_id();
    let comment = blocking(&state, move |db| {
        let article_id = article_id(db, &slug)?;
        let content = content_of(req)?;
        Ok(db.create_comment(article_id as u64, user_id, &content)?)
    })
    .await?;

    info!(comment_id = comment.id, article_id = comment.article_id, user_id, "comment posted");
    Ok(ApiResponse::created("Comment created successfully", comment))
}

pub async fn update(
    State(state): State<AppState>,
    ctx: RequestContext,
    path: Result<Path<(String, u64)>, PathRejection>,
    JsonBody(req): JsonBody<CommentRequest>,
) -> Result<ApiResponse<Comment>, ApiError> {
    let Path((slug, comment_id)) = path?;
    let caller = ctx.user_id();
    let comment = blocking(&state, move |db| {
        let row = comment_on(db, &slug, comment_id)?;
        ensure_owner(row.user_id as u64, caller, "comment")?;
        let content = content_of(req)?;
        Ok(db.update_comment(comment_id, &content)?)
    })
    .await?;
    Ok(ApiResponse::ok("Comment updated successfully", comment))
}

pub async fn delete(
    State(state): State<AppState>,
    ctx: RequestContext,
    path: Result<Path<(String, u64)>, PathRejection>,
) -> Result<ApiResponse<()>, ApiError> {
    let Path((slug, comment_id)) = path?;
    let caller = ctx.user_id();
    blocking(&state, move |db| {
        let row = comment_on(db, &slug, comment_id)?;
        ensure_owner(row.user_id as u64, caller, "comment")?;
        Ok(db.delete_comment(comment_id)?)
    })
    .await?;

    info!(comment_id, user_id = caller, "comment deleted");
    Ok(ApiResponse::ok("Comment deleted successfully", ()))
}
