//! Firebase ID token verification
//!
//! Firebase signs ID tokens with rotating RSA keys published as a JWK set.
//! Keys are cached and refetched when they expire or an unknown `kid` shows up.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;

/// How long a fetched key set is trusted before refetching
const KEY_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Minimum gap between refetches triggered by unknown key ids
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Timeout for the JWKS request
const JWKS_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Claims carried by a Firebase ID token
#[derive(Debug, Clone, Deserialize)]
pub struct FirebaseClaims {
    /// Firebase uid
    pub sub: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,
    #[error("Malformed token: {0}")]
    Malformed(String),
    #[error("Unsupported signing algorithm")]
    UnsupportedAlgorithm,
    #[error("Unknown signing key: {0}")]
    UnknownKey(String),
    #[error("Token rejected: {0}")]
    Invalid(String),
    #[error("Failed to fetch signing keys: {0}")]
    KeyFetch(String),
}

#[derive(Default)]
struct KeyCache {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Option<Instant>,
}

impl KeyCache {
    fn is_fresh(&self) -> bool {
        self.fetched_at
            .map(|at| at.elapsed() < KEY_CACHE_TTL)
            .unwrap_or(false)
    }

    fn recently_fetched(&self) -> bool {
        self.fetched_at
            .map(|at| at.elapsed() < MIN_REFRESH_INTERVAL)
            .unwrap_or(false)
    }
}

/// Verifies Firebase ID tokens for a single project
pub struct FirebaseVerifier {
    project_id: String,
    jwks_url: String,
    http: reqwest::Client,
    cache: RwLock<KeyCache>,
}

impl FirebaseVerifier {
    pub fn new(project_id: impl Into<String>, jwks_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(JWKS_REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            project_id: project_id.into(),
            jwks_url: jwks_url.into(),
            http,
            cache: RwLock::new(KeyCache::default()),
        }
    }

    /// Expected `iss` claim for this project
    pub fn issuer(&self) -> String {
        format!("https://securetoken.google.com/{}", self.project_id)
    }

    /// Verify a raw ID token and return its claims
    pub async fn verify(&self, token: &str) -> Result<FirebaseClaims, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::Malformed(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::UnsupportedAlgorithm);
        }
        let kid = header
            .kid
            .ok_or_else(|| AuthError::Malformed("missing kid".to_string()))?;

        let key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[self.issuer()]);

        let data = decode::<FirebaseClaims>(token, &key, &validation)
            .map_err(|e| AuthError::Invalid(e.to_string()))?;

        if data.claims.sub.trim().is_empty() {
            return Err(AuthError::Invalid("empty subject".to_string()));
        }

        Ok(data.claims)
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        {
            let cache = self.cache.read().await;
            if cache.is_fresh() {
                if let Some(key) = cache.keys.get(kid) {
                    return Ok(key.clone());
                }
                if cache.recently_fetched() {
                    return Err(AuthError::UnknownKey(kid.to_string()));
                }
            }
        }

        self.refresh_keys().await?;

        let cache = self.cache.read().await;
        cache
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| AuthError::UnknownKey(kid.to_string()))
    }

    async fn refresh_keys(&self) -> Result<(), AuthError> {
        let set: JwkSet = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        let mut keys = HashMap::new();
        for jwk in &set.keys {
            let Some(kid) = jwk.common.key_id.clone() else {
                continue;
            };
            match DecodingKey::from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(kid, key);
                }
                Err(e) => {
                    tracing::warn!(kid = %kid, error = %e, "Skipping unusable signing key");
                }
            }
        }

        tracing::debug!(key_count = keys.len(), "Refreshed Firebase signing keys");

        let mut cache = self.cache.write().await;
        cache.keys = keys;
        cache.fetched_at = Some(Instant::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    const TEST_KEY_PEM: &str = include_str!("../../testdata/firebase_test_key.pem");
    const TEST_JWKS: &str = include_str!("../../testdata/firebase_test_jwks.json");
    const PROJECT: &str = "storefront-test";

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        aud: String,
        iss: String,
        email: String,
        exp: i64,
        iat: i64,
    }

    fn sign(kid: &str, aud: &str, exp_offset: i64) -> String {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        let claims = TestClaims {
            sub: "firebase-uid-1".to_string(),
            aud: aud.to_string(),
            iss: format!("https://securetoken.google.com/{}", aud),
            email: "shopper@example.com".to_string(),
            exp: now + exp_offset,
            iat: now,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        let key = EncodingKey::from_rsa_pem(TEST_KEY_PEM.as_bytes()).unwrap();
        encode(&header, &claims, &key).unwrap()
    }

    async fn verifier_with_jwks(server: &mut mockito::ServerGuard) -> (FirebaseVerifier, mockito::Mock) {
        let mock = server
            .mock("GET", "/jwks")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(TEST_JWKS)
            .create_async()
            .await;
        let verifier = FirebaseVerifier::new(PROJECT, format!("{}/jwks", server.url()));
        (verifier, mock)
    }

    #[tokio::test]
    async fn test_valid_token_is_accepted() {
        let mut server = mockito::Server::new_async().await;
        let (verifier, _mock) = verifier_with_jwks(&mut server).await;

        let claims = verifier.verify(&sign("test-key-1", PROJECT, 3600)).await.unwrap();
        assert_eq!(claims.sub, "firebase-uid-1");
        assert_eq!(claims.email.as_deref(), Some("shopper@example.com"));
    }

    #[tokio::test]
    async fn test_keys_are_cached_between_verifications() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/jwks")
            .with_status(200)
            .with_body(TEST_JWKS)
            .expect(1)
            .create_async()
            .await;
        let verifier = FirebaseVerifier::new(PROJECT, format!("{}/jwks", server.url()));

        let token = sign("test-key-1", PROJECT, 3600);
        verifier.verify(&token).await.unwrap();
        verifier.verify(&token).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_wrong_audience_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let (verifier, _mock) = verifier_with_jwks(&mut server).await;

        let result = verifier.verify(&sign("test-key-1", "another-project", 3600)).await;
        assert!(matches!(result, Err(AuthError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let (verifier, _mock) = verifier_with_jwks(&mut server).await;

        let result = verifier.verify(&sign("test-key-1", PROJECT, -3600)).await;
        assert!(matches!(result, Err(AuthError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_unknown_kid_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let (verifier, _mock) = verifier_with_jwks(&mut server).await;

        let result = verifier.verify(&sign("rotated-away", PROJECT, 3600)).await;
        assert!(matches!(result, Err(AuthError::UnknownKey(kid)) if kid == "rotated-away"));
    }

    #[tokio::test]
    async fn test_garbage_token_is_malformed() {
        let verifier = FirebaseVerifier::new(PROJECT, "http://127.0.0.1:9/jwks");
        let result = verifier.verify("not-a-jwt").await;
        assert!(matches!(result, Err(AuthError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_jwks_outage_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("GET", "/jwks").with_status(500).create_async().await;
        let verifier = FirebaseVerifier::new(PROJECT, format!("{}/jwks", server.url()));

        let result = verifier.verify(&sign("test-key-1", PROJECT, 3600)).await;
        assert!(matches!(result, Err(AuthError::KeyFetch(_))));
    }
}
