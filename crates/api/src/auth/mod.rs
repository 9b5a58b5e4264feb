//! Authentication module
//!
//! Firebase stays the identity provider; this module only verifies the ID
//! tokens it issues.

pub mod firebase;
pub mod middleware;

pub use firebase::{AuthError, FirebaseClaims, FirebaseVerifier};
pub use middleware::{
    authenticate, authenticate_token, bearer_token, optional_auth, require_auth, AuthState,
    AuthUser,
};
