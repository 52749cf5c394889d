use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::models::User;

// -- Auth --

/// Identity and name fields arrive trimmed, so the length rules see the
/// value that gets stored. Passwords are taken verbatim.
#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 3, message = "Minimum 3 characters"))]
    pub username: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(email(message = "Invalid email"))]
    pub email: String,
    #[validate(length(min = 6, message = "Minimum 6 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(custom(function = "not_blank"))]
    pub first_name: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(custom(function = "not_blank"))]
    pub last_name: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(custom(function = "not_blank"))]
    pub nickname: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(alias = "email")]
    #[validate(custom(function = "not_blank"))]
    pub email_or_username: String,
    #[validate(custom(function = "not_blank"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// JSON form of a profile update. Blank fields are ignored, not cleared.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub nickname: Option<String>,
    pub bio: Option<String>,
}

// -- Articles --

#[derive(Debug, Deserialize, Validate)]
pub struct CreateArticleRequest {
    #[validate(custom(function = "not_blank"))]
    pub title: String,
    #[validate(custom(function = "not_blank"))]
    pub slug: String,
    #[validate(custom(function = "not_blank"))]
    pub content: String,
    #[validate(custom(function = "not_blank"))]
    pub category_name: String,
    #[serde(default)]
    pub tag_names: Vec<String>,
}

/// Partial article update.
///
/// `tag_ids` distinguishes "absent" (`None`, association untouched) from an
/// explicit empty list (`Some(vec![])`, association cleared).
#[derive(Debug, Default, Deserialize)]
pub struct UpdateArticleRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category_id: Option<u64>,
    pub category_name: Option<String>,
    pub tag_ids: Option<Vec<u64>>,
    pub new_tags: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ArticleQuery {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub search: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub category_id: Option<u64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub limit: Option<u32>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub offset: Option<u32>,
}

// -- Comments --

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

// -- Validation helpers --

pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("required");
        err.message = Some("This field is required".into());
        return Err(err);
    }
    Ok(())
}

/// Flattens validator output to one message per field, keyed by field name.
pub fn field_messages(errors: &ValidationErrors) -> BTreeMap<String, String> {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let message = errs
                .first()
                .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| "Invalid data".to_string());
            (field.to_string(), message)
        })
        .collect()
}

fn trimmed<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(String::deserialize(de)?.trim().to_string())
}

/// Query strings from HTML forms send `?category_id=` for "no filter".
fn empty_string_as_none<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let opt = Option::<String>::deserialize(de)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn register(overrides: serde_json::Value) -> RegisterRequest {
        let mut base = json!({
            "username": "alice",
            "email": "alice@example.com",
            "password": "hunter22",
            "confirm_password": "hunter22",
            "first_name": "Alice",
            "last_name": "Liddell",
            "nickname": "al"
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), overrides.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(base).unwrap()
    }

    #[test]
    fn valid_registration_passes() {
        assert!(register(json!({})).validate().is_ok());
    }

    #[test]
    fn registration_reports_each_bad_field() {
        let req = register(json!({
            "username": "al",
            "email": "nope",
            "confirm_password": "different",
            "nickname": "   "
        }));
        let errors = req.validate().unwrap_err();
        let fields = field_messages(&errors);
        assert_eq!(fields["username"], "Minimum 3 characters");
        assert_eq!(fields["email"], "Invalid email");
        assert_eq!(fields["confirm_password"], "Passwords do not match");
        assert_eq!(fields["nickname"], "This field is required");
        assert!(!fields.contains_key("password"));
    }

    #[test]
    fn username_length_counts_after_trimming() {
        let req = register(json!({"username": "  ab ", "email": " alice@example.com "}));
        assert_eq!(req.username, "ab");
        assert_eq!(req.email, "alice@example.com");
        let fields = field_messages(&req.validate().unwrap_err());
        assert_eq!(fields["username"], "Minimum 3 characters");
        assert!(!fields.contains_key("email"));

        let padded = register(json!({
            "username": "  bob  ",
            "password": " pw123 ",
            "confirm_password": " pw123 "
        }));
        assert!(padded.validate().is_ok());
        assert_eq!(padded.username, "bob");
        assert_eq!(padded.password, " pw123 ");
    }

    #[test]
    fn login_accepts_legacy_email_key() {
        let req: LoginRequest =
            serde_json::from_value(json!({"email": "alice", "password": "x"})).unwrap();
        assert_eq!(req.email_or_username, "alice");
    }

    #[test]
    fn update_request_distinguishes_absent_and_empty_tags() {
        let absent: UpdateArticleRequest = serde_json::from_value(json!({"title": "t"})).unwrap();
        assert!(absent.tag_ids.is_none());
        assert!(absent.new_tags.is_none());

        let empty: UpdateArticleRequest = serde_json::from_value(json!({"tag_ids": []})).unwrap();
        assert_eq!(empty.tag_ids, Some(vec![]));
    }
}
