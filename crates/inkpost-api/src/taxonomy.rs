use axum::extract::State;

use inkpost_types::models::{Category, Tag};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::response::ApiResponse;

pub async fn categories(
    State(state): State<AppState>,
) -> Result<ApiResponse<Vec<Category>>, ApiError> {
    let categories = blocking(&state, |db| Ok(db.list_categories()?)).await?;
    Ok(ApiResponse::ok("Categories retrieved successfully", categories))
}

pub async fn tags(State(state): State<AppState>) -> Result<ApiResponse<Vec<Tag>>, ApiError> {
    let tags = blocking(&state, |db| Ok(db.list_tags()?)).await?;
    Ok(ApiResponse::ok("Tags retrieved successfully", tags))
}
