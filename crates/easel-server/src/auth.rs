use std::time::Duration;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use easel_types::validate_segment;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

/// The authenticated party behind a request. `owner_id` scopes every canvas
/// operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub owner_id: String,
    pub login: String,
    pub name: String,
    pub avatar_url: String,
}

impl Identity {
    pub fn new(owner_id: impl Into<String>) -> Self {
        let owner_id = owner_id.into();
        Self {
            login: owner_id.clone(),
            owner_id,
            name: String::new(),
            avatar_url: String::new(),
        }
    }

    pub fn with_login(mut self, login: impl Into<String>) -> Self {
        self.login = login.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
    Anonymous,
}

impl Credentials {
    /// Parse an `Authorization` header value.
    pub fn from_header(value: Option<&str>) -> Self {
        match value.and_then(|v| v.strip_prefix("Bearer ")) {
            Some(token) if !token.trim().is_empty() => Self::Bearer(token.trim().to_string()),
            _ => Self::Anonymous,
        }
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> ServerResult<Identity>;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Claims {
    sub: String,
    #[serde(default)]
    login: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    avatar_url: String,
    iat: i64,
    exp: i64,
}

/// HS256 bearer tokens carrying an [`Identity`].
pub struct JwtAuth {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtAuth {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    /// Mint a token for `identity`, valid from now for the configured TTL.
    pub fn issue(&self, identity: &Identity) -> ServerResult<String> {
        self.issue_at(identity, Utc::now())
    }

    fn issue_at(&self, identity: &Identity, issued_at: DateTime<Utc>) -> ServerResult<String> {
        validate_segment(&identity.owner_id)
            .map_err(|e| ServerError::BadRequest(e.to_string()))?;
        let ttl = i64::try_from(self.ttl.as_secs())
            .map_err(|_| ServerError::Config("token ttl out of range".into()))?;
        let claims = Claims {
            sub: identity.owner_id.clone(),
            login: identity.login.clone(),
            name: identity.name.clone(),
            avatar_url: identity.avatar_url.clone(),
            iat: issued_at.timestamp(),
            exp: issued_at.timestamp().saturating_add(ttl),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ServerError::Internal(format!("token signing failed: {e}")))
    }

    /// Check signature and expiry, then recover the identity.
    pub fn verify(&self, token: &str) -> ServerResult<Identity> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| ServerError::AuthFailed(e.to_string()))?;
        let claims = data.claims;
        // The subject becomes a storage key segment.
        validate_segment(&claims.sub).map_err(|e| ServerError::AuthFailed(e.to_string()))?;
        Ok(Identity {
            owner_id: claims.sub,
            login: claims.login,
            name: claims.name,
            avatar_url: claims.avatar_url,
        })
    }
}

#[async_trait]
impl AuthProvider for JwtAuth {
    async fn authenticate(&self, credentials: &Credentials) -> ServerResult<Identity> {
        match credentials {
            Credentials::Bearer(token) => self.verify(token),
            Credentials::Anonymous => Err(ServerError::AuthFailed("missing bearer token".into())),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Identity {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        state.auth.authenticate(&Credentials::from_header(header)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> JwtAuth {
        JwtAuth::new("test-secret", Duration::from_secs(3600))
    }

    #[test]
    fn credentials_from_header() {
        assert_eq!(
            Credentials::from_header(Some("Bearer abc")),
            Credentials::Bearer("abc".into())
        );
        assert_eq!(Credentials::from_header(Some("Basic abc")), Credentials::Anonymous);
        assert_eq!(Credentials::from_header(Some("Bearer ")), Credentials::Anonymous);
        assert_eq!(Credentials::from_header(None), Credentials::Anonymous);
    }

    #[test]
    fn issue_then_verify() {
        let auth = auth();
        let identity = Identity::new("12345").with_login("octocat").with_name("Mona");
        let token = auth.issue(&identity).unwrap();
        assert_eq!(auth.verify(&token).unwrap(), identity);
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = auth().issue(&Identity::new("12345")).unwrap();
        let other = JwtAuth::new("other-secret", Duration::from_secs(3600));
        assert!(matches!(other.verify(&token), Err(ServerError::AuthFailed(_))));
    }

    #[test]
    fn expired_token_rejected() {
        let auth = auth();
        let issued = Utc::now() - chrono::Duration::days(2);
        let token = auth.issue_at(&Identity::new("12345"), issued).unwrap();
        assert!(matches!(auth.verify(&token), Err(ServerError::AuthFailed(_))));
    }

    #[test]
    fn hostile_subject_rejected() {
        let auth = auth();
        let claims = Claims {
            sub: "../admin".into(),
            login: String::new(),
            name: String::new(),
            avatar_url: String::new(),
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + 600,
        };
        let token = encode(&Header::default(), &claims, &auth.encoding).unwrap();
        assert!(matches!(auth.verify(&token), Err(ServerError::AuthFailed(_))));
        assert!(auth.issue(&Identity::new("a/b")).is_err());
    }

    #[tokio::test]
    async fn anonymous_is_rejected() {
        let err = auth().authenticate(&Credentials::Anonymous).await.unwrap_err();
        assert!(matches!(err, ServerError::AuthFailed(_)));
    }
}
