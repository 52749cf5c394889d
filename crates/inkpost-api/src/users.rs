use std::path::{Path, PathBuf};

use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header;
use tracing::{debug, info, warn};
use uuid::Uuid;

use inkpost_db::users::ProfileChanges;
use inkpost_types::api::UpdateProfileRequest;
use inkpost_types::models::User;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiError;
use crate::extract::JsonBody;
use crate::middleware::RequestContext;
use crate::response::ApiResponse;

/// Public URL prefix under which `upload_dir` is served.
pub const UPLOADS_URL: &str = "/uploads";

pub async fn me(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<ApiResponse<User>, ApiError> {
    let user_id = ctx.user_id();
    let user = blocking(&state, move |db| {
        db.get_user(user_id)?
            .ok_or_else(|| ApiError::NotFound("User not found".into()))
    })
    .await?;
    Ok(ApiResponse::ok("User retrieved successfully", user))
}

/// Avatar part of a multipart profile update, held until the text fields
/// have all been accepted.
struct AvatarUpload {
    extension: String,
    bytes: Vec<u8>,
}

/// Accepts either a JSON body or `multipart/form-data` (the only way to
/// send an avatar).
pub async fn update_me(
    State(state): State<AppState>,
    ctx: RequestContext,
    req: Request,
) -> Result<ApiResponse<User>, ApiError> {
    let user_id = ctx.user_id();
    let is_multipart = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let (mut changes, avatar) = if is_multipart {
        let multipart = Multipart::from_request(req, &state).await?;
        read_multipart(multipart).await?
    } else {
        let JsonBody(body) = JsonBody::<UpdateProfileRequest>::from_request(req, &state).await?;
        let changes = ProfileChanges {
            first_name: non_empty(body.first_name),
            last_name: non_empty(body.last_name),
            nickname: non_empty(body.nickname),
            bio: non_empty(body.bio),
            avatar: None,
        };
        (changes, None)
    };

    let mut stored = None;
    if let Some(avatar) = avatar {
        let (url, path) = save_avatar(&state.upload_dir, user_id, avatar).await?;
        changes.avatar = Some(url);
        stored = Some(path);
    }

    let result = blocking(&state, move |db| Ok(db.update_profile(user_id, &changes)?)).await;
    let user = match result {
        Ok(user) => user,
        Err(e) => {
            if let Some(path) = stored {
                discard_avatar(&path).await;
            }
            return Err(e);
        }
    };
    info!(user_id, "profile updated");
    Ok(ApiResponse::ok("Profile updated successfully", user))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn read_multipart(
    mut multipart: Multipart,
) -> Result<(ProfileChanges, Option<AvatarUpload>), ApiError> {
    let mut changes = ProfileChanges::default();
    let mut avatar = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "avatar" => {
                let is_image = field
                    .content_type()
                    .is_some_and(|ct| ct.starts_with("image/"));
                let extension = field
                    .file_name()
                    .and_then(|f| Path::new(f).extension())
                    .and_then(|e| e.to_str())
                    .map(|e| format!(".{}", e.to_ascii_lowercase()))
                    .unwrap_or_default();
                let bytes = field.bytes().await?;
                // Browsers send an empty part when no file was picked.
                if bytes.is_empty() {
                    continue;
                }
                if !is_image {
                    return Err(ApiError::Validation("Invalid image format".into()));
                }
                avatar = Some(AvatarUpload {
                    extension,
                    bytes: bytes.to_vec(),
                });
            }
            "first_name" | "last_name" | "nickname" | "bio" => {
                let value = non_empty(Some(field.text().await?));
                match name.as_str() {
                    "first_name" => changes.first_name = value,
                    "last_name" => changes.last_name = value,
                    "nickname" => changes.nickname = value,
                    _ => changes.bio = value,
                }
            }
            other => debug!(field = other, "ignoring unknown profile field"),
        }
    }

    Ok((changes, avatar))
}

/// Writes the avatar under `<upload_dir>/avatars/`. Returns the public URL
/// and the path on disk.
async fn save_avatar(
    upload_dir: &Path,
    user_id: u64,
    avatar: AvatarUpload,
) -> Result<(String, PathBuf), ApiError> {
    let dir = upload_dir.join("avatars");
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| ApiError::Storage(format!("create {}: {e}", dir.display())))?;

    let file_name = format!("user_{user_id}_{}{}", Uuid::new_v4(), avatar.extension);
    let path = dir.join(&file_name);
    tokio::fs::write(&path, &avatar.bytes)
        .await
        .map_err(|e| ApiError::Storage(format!("write {}: {e}", path.display())))?;

    debug!(user_id, file = %file_name, bytes = avatar.bytes.len(), "avatar stored");
    Ok((format!("{UPLOADS_URL}/avatars/{file_name}"), path))
}

/// Removes an avatar that no profile row ended up referencing.
async fn discard_avatar(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(file = %path.display(), "unreferenced avatar removed"),
        Err(e) => warn!(file = %path.display(), error = %e, "failed to remove unreferenced avatar"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_fields_are_ignored() {
        assert_eq!(non_empty(Some("  ".into())), None);
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some(" Ada ".into())).as_deref(), Some("Ada"));
    }
}
