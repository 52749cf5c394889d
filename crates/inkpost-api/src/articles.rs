use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::extract::rejection::QueryRejection;
use tracing::info;
use validator::Validate;

use inkpost_db::articles::{ArticleFilter, ArticlePatch, CategoryRef, NewArticle};
use inkpost_types::api::{
    ArticleQuery, CreateArticleRequest, UpdateArticleRequest, field_messages, not_blank,
};
use inkpost_types::models::Article;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::middleware::RequestContext;
use crate::ownership::ensure_owner;
use crate::response::ApiResponse;

pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<ArticleQuery>, QueryRejection>,
) -> Result<ApiResponse<Vec<Article>>, ApiError> {
    let Query(query) = query?;
    let filter = ArticleFilter {
        search: query.search,
        category_id: query.category_id,
        author_id: None,
        limit: query.limit,
        offset: query.offset,
    };
    let articles = blocking(&state, move |db| Ok(db.list_articles(&filter)?)).await?;
    Ok(ApiResponse::ok("Articles retrieved successfully", articles))
}

pub async fn mine(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<ApiResponse<Vec<Article>>, ApiError> {
    let filter = ArticleFilter {
        author_id: Some(ctx.user_id()),
        ..Default::default()
    };
    let articles = blocking(&state, move |db| Ok(db.list_articles(&filter)?)).await?;
    Ok(ApiResponse::ok("Articles retrieved successfully", articles))
}

pub async fn get(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<ApiResponse<Article>, ApiError> {
    let article = blocking(&state, move |db| {
        db.article_by_slug(&slug)?
            .ok_or_else(|| ApiError::NotFound("Article not found".into()))
    })
    .await?;
    Ok(ApiResponse::ok("Article retrieved successfully", article))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    JsonBody(req): JsonBody<CreateArticleRequest>,
) -> Result<ApiResponse<Article>, ApiError> {
    if let Err(errors) = req.validate() {
        return Err(ApiError::InvalidFields(field_messages(&errors)));
    }

    let author_id = ctx.user_id();
    let article = blocking(&state, move |db| {
        Ok(db.create_article(&NewArticle {
            title: req.title.trim(),
            slug: req.slug.trim(),
            content: &req.content,
            author_id,
            category_name: &req.category_name,
            tag_names: &req.tag_names,
        })?)
    })
    .await?;

    info!(article_id = article.id, slug = %article.slug, author_id, "article published");
    Ok(ApiResponse::created("Article created successfully", article))
}

pub async fn update(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(slug): Path<String>,
    JsonBody(req): JsonBody<UpdateArticleRequest>,
) -> Result<ApiResponse<Article>, ApiError> {
    let caller = ctx.user_id();
    let article = blocking(&state, move |db| {
        let row = db
            .article_row_by_slug(&slug)?
            .ok_or_else(|| ApiError::NotFound("Article not found".into()))?;
        ensure_owner(row.author_id as u64, caller, "article")?;

        let patch = validate_patch(req)?;
        Ok(db.update_article(row.id, &patch)?)
    })
    .await?;

    info!(article_id = article.id, user_id = caller, "article updated");
    Ok(ApiResponse::ok("Article updated successfully", article))
}

pub async fn delete(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(slug): Path<String>,
) -> Result<ApiResponse<()>, ApiError> {
    let caller = ctx.user_id();
    blocking(&state, move |db| {
        let row = db
            .article_row_by_slug(&slug)?
            .ok_or_else(|| ApiError::NotFound("Article not found".into()))?;
        ensure_owner(row.author_id as u64, caller, "article")?;
        Ok(db.delete_article(row.id)?)
    })
    .await?;

    Ok(ApiResponse::ok("Article deleted successfully", ()))
}

/// Rejects supplied-but-blank fields and resolves the category reference.
/// An explicit `category_id` wins over `category_name`.
fn validate_patch(req: UpdateArticleRequest) -> Result<ArticlePatch, ApiError> {
    let mut invalid = BTreeMap::new();
    for (field, value) in [
        ("title", req.title.as_deref()),
        ("content", req.content.as_deref()),
        ("category_name", req.category_name.as_deref()),
    ] {
        if let Some(Err(e)) = value.map(not_blank) {
            let message = e.message.map(|m| m.to_string()).unwrap_or_default();
            invalid.insert(field.to_string(), message);
        }
    }
    if !invalid.is_empty() {
        return Err(ApiError::InvalidFields(invalid));
    }

    let category = match (req.category_id, req.category_name) {
        (Some(id), _) => Some(CategoryRef::Id(id)),
        (None, Some(name)) => Some(CategoryRef::Name(name)),
        (None, None) => None,
    };

    Ok(ArticlePatch {
        title: req.title.map(|t| t.trim().to_string()),
        content: req.content,
        category,
        tag_ids: req.tag_ids,
        new_tags: req.new_tags,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_supplied_fields_are_rejected() {
        let err = validate_patch(UpdateArticleRequest {
            title: Some("   ".into()),
            content: Some("".into()),
            ..Default::default()
        })
        .err()
        .unwrap();
        match err {
            ApiError::InvalidFields(fields) => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields["title"], "This field is required");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn category_id_takes_precedence() {
        let patch = validate_patch(UpdateArticleRequest {
            category_id: Some(4),
            category_name: Some("Health".into()),
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(patch.category, Some(CategoryRef::Id(4))));

        let untouched = validate_patch(UpdateArticleRequest::default()).unwrap();
        assert!(untouched.category.is_none());
        assert!(untouched.tag_ids.is_none());
    }
}
