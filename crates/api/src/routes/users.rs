//! User profile routes

use axum::{
    extract::{Extension, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use supportdesk_shared::User;

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

const MAX_DISPLAY_NAME_LENGTH: usize = 100;
const MAX_PHONE_LENGTH: usize = 32;
const MAX_ADDRESS_LENGTH: usize = 500;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Profile update; omitted fields are left unchanged, empty strings clear them
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<User>,
    pub total: i64,
}

/// Profile columns after an update has been applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileFields {
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

// =============================================================================
// Helper Functions
// =============================================================================

fn apply_field(
    name: &str,
    current: Option<String>,
    update: Option<String>,
    max_len: usize,
) -> ApiResult<Option<String>> {
    let Some(value) = update else {
        return Ok(current);
    };

    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    if value.chars().count() > max_len {
        return Err(ApiError::BadRequest(format!(
            "{} too long (max {} characters)",
            name, max_len
        )));
    }
    Ok(Some(value.to_string()))
}

fn is_valid_phone(phone: &str) -> bool {
    phone.chars().any(|c| c.is_ascii_digit())
        && phone
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')' | '.'))
}

/// Merge a profile update into the stored values
pub fn apply_profile_update(user: &User, req: UpdateProfileRequest) -> ApiResult<ProfileFields> {
    let fields = ProfileFields {
        display_name: apply_field(
            "Display name",
            user.display_name.clone(),
            req.display_name,
            MAX_DISPLAY_NAME_LENGTH,
        )?,
        phone: apply_field("Phone", user.phone.clone(), req.phone, MAX_PHONE_LENGTH)?,
        address: apply_field("Address", user.address.clone(), req.address, MAX_ADDRESS_LENGTH)?,
    };

    if let Some(phone) = &fields.phone {
        if !is_valid_phone(phone) {
            return Err(ApiError::BadRequest("Invalid phone number".into()));
        }
    }

    Ok(fields)
}

async fn fetch_user(state: &AppState, auth_user: &AuthUser) -> ApiResult<User> {
    sqlx::query_as(
        r#"
        SELECT id, firebase_uid, email, display_name, phone, address, is_admin,
               created_at, last_seen_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(auth_user.user_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(ApiError::NotFound)
}

// =============================================================================
// Handlers
// =============================================================================

/// Current user's profile
pub async fn get_me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<User>> {
    Ok(Json(fetch_user(&state, &auth_user).await?))
}

/// Update the current user's profile
pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<User>> {
    let current = fetch_user(&state, &auth_user).await?;
    let fields = apply_profile_update(&current, req)?;

    let user: User = sqlx::query_as(
        r#"
        UPDATE users
        SET display_name = $2, phone = $3, address = $4
        WHERE id = $1
        RETURNING id, firebase_uid, email, display_name, phone, address, is_admin,
                  created_at, last_seen_at
        "#,
    )
    .bind(auth_user.user_id)
    .bind(&fields.display_name)
    .bind(&fields.phone)
    .bind(&fields.address)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(user_id = %auth_user.user_id, "Profile updated");

    Ok(Json(user))
}

/// List users (admin only)
pub async fn admin_list_users(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<ListUsersQuery>,
) -> ApiResult<Json<UserListResponse>> {
    auth_user.require_admin()?;

    let limit = query.limit.unwrap_or(50).clamp(1, 100);

    let users: Vec<User> = sqlx::query_as(
        r#"
        SELECT id, firebase_uid, email, display_name, phone, address, is_admin,
               created_at, last_seen_at
        FROM users
        ORDER BY created_at DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(&state.pool)
    .await?;

    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(&state.pool)
        .await?;

    Ok(Json(UserListResponse { users, total }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_user, db_state, FixedModel};
    use std::sync::Arc;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            firebase_uid: "uid-1".to_string(),
            email: Some("jo@example.com".to_string()),
            display_name: Some("Jo".to_string()),
            phone: Some("+1 555 0100".to_string()),
            address: None,
            is_admin: false,
            created_at: OffsetDateTime::now_utc(),
            last_seen_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn test_omitted_fields_are_kept() {
        let fields = apply_profile_update(
            &user(),
            UpdateProfileRequest {
                address: Some(" 12 Market St ".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(fields.display_name.as_deref(), Some("Jo"));
        assert_eq!(fields.phone.as_deref(), Some("+1 555 0100"));
        assert_eq!(fields.address.as_deref(), Some("12 Market St"));
    }

    #[test]
    fn test_empty_string_clears_field() {
        let fields = apply_profile_update(
            &user(),
            UpdateProfileRequest {
                phone: Some("  ".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(fields.phone, None);
    }

    #[test]
    fn test_invalid_phone_rejected() {
        let result = apply_profile_update(
            &user(),
            UpdateProfileRequest {
                phone: Some("call me maybe".to_string()),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_long_display_name_rejected() {
        let result = apply_profile_update(
            &user(),
            UpdateProfileRequest {
                display_name: Some("n".repeat(MAX_DISPLAY_NAME_LENGTH + 1)),
                ..Default::default()
            },
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_update_me_persists_profile() {
        let state = db_state(Arc::new(FixedModel(String::new()))).await;
        let caller = create_user(&state.pool, false).await;

        let Json(updated) = update_me(
            State(state.clone()),
            Extension(caller.clone()),
            Json(UpdateProfileRequest {
                display_name: Some("Jo Shopper".to_string()),
                phone: Some("+1 555 0100".to_string()),
                address: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(updated.display_name.as_deref(), Some("Jo Shopper"));

        let Json(fetched) = get_me(State(state), Extension(caller)).await.unwrap();
        assert_eq!(fetched.display_name.as_deref(), Some("Jo Shopper"));
        assert_eq!(fetched.phone.as_deref(), Some("+1 555 0100"));
        assert_eq!(fetched.address, None);
        assert!(!fetched.is_admin);
    }

    #[tokio::test]
    #[ignore] // Requires database
    async fn test_admin_list_users_requires_admin() {
        let state = db_state(Arc::new(FixedModel(String::new()))).await;
        let caller = create_user(&state.pool, false).await;
        let admin = create_user(&state.pool, true).await;

        let result = admin_list_users(
            State(state.clone()),
            Extension(caller),
            Query(ListUsersQuery { limit: None }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Forbidden)));

        let Json(list) = admin_list_users(
            State(state),
            Extension(admin),
            Query(ListUsersQuery { limit: Some(100) }),
        )
        .await
        .unwrap();
        assert!(list.total >= 2);
        assert!(!list.users.is_empty());
    }
}
