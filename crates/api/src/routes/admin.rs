//! Admin routes

use axum::{Extension, Json};
use serde::Serialize;

use crate::auth::AuthUser;

#[derive(Debug, Serialize)]
pub struct AdminCheckResponse {
    #[serde(rename = "isAdmin")]
    pub is_admin: bool,
}

/// Whether the caller may use the admin dashboard
///
/// Runs behind `require_auth`, so a missing or invalid token never reaches here.
pub async fn check_admin(Extension(auth_user): Extension<AuthUser>) -> Json<AdminCheckResponse> {
    tracing::debug!(user_id = %auth_user.user_id, is_admin = auth_user.is_admin, "Admin check");

    Json(AdminCheckResponse {
        is_admin: auth_user.is_admin,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_check_admin_serializes_camel_case() {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            firebase_uid: "uid".to_string(),
            email: None,
            is_admin: true,
        };

        let Json(body) = check_admin(Extension(user)).await;
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({ "isAdmin": true })
        );
    }
}
