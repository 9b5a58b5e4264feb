//! Authentication middleware
//!
//! Verifies the Firebase ID token in the `Authorization` header, mirrors the
//! identity into `users`, and exposes it to handlers as an [`AuthUser`]
//! extension.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use sqlx::PgPool;
use uuid::Uuid;

use super::firebase::{AuthError, FirebaseClaims, FirebaseVerifier};
use crate::error::{ApiError, ApiResult};

/// State needed by the auth middleware
#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<FirebaseVerifier>,
    pub pool: PgPool,
}

/// Authenticated caller, inserted as a request extension
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Row id in `users`
    pub user_id: Uuid,
    pub firebase_uid: String,
    pub email: Option<String>,
    pub is_admin: bool,
}

impl AuthUser {
    /// Fail with 403 unless the caller carries the admin flag
    pub fn require_admin(&self) -> ApiResult<()> {
        if self.is_admin {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.user_id, "Admin route called by non-admin user");
            Err(ApiError::Forbidden)
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| {
            v.strip_prefix("Bearer ")
                .or_else(|| v.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Verify the bearer token and return the mirrored user
pub async fn authenticate(auth: &AuthState, headers: &HeaderMap) -> ApiResult<AuthUser> {
    let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;
    authenticate_token(auth, token).await
}

/// Verify a raw ID token and return the mirrored user
pub async fn authenticate_token(auth: &AuthState, token: &str) -> ApiResult<AuthUser> {
    let claims = auth.verifier.verify(token).await?;
    mirror_user(&auth.pool, &claims).await
}

/// Require a valid Firebase ID token
pub async fn require_auth(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(&auth, req.headers()).await?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Attach the caller if a token is present; anonymous requests pass through
///
/// A token that is present but invalid is still rejected.
pub async fn optional_auth(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if bearer_token(req.headers()).is_some() {
        let user = authenticate(&auth, req.headers()).await?;
        req.extensions_mut().insert(user);
    }
    Ok(next.run(req).await)
}

/// Upsert the Firebase identity and load its admin flag
pub(crate) async fn mirror_user(pool: &PgPool, claims: &FirebaseClaims) -> ApiResult<AuthUser> {
    let (user_id, email, is_admin): (Uuid, Option<String>, bool) = sqlx::query_as(
        r#"
        INSERT INTO users (id, firebase_uid, email, display_name)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (firebase_uid) DO UPDATE SET
          email = COALESCE(EXCLUDED.email, users.email),
          display_name = COALESCE(users.display_name, EXCLUDED.display_name),
          last_seen_at = NOW()
        RETURNING id, email, is_admin
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&claims.sub)
    .bind(&claims.email)
    .bind(&claims.name)
    .fetch_one(pool)
    .await?;

    Ok(AuthUser {
        user_id,
        firebase_uid: claims.sub.clone(),
        email,
        is_admin,
    })
}
