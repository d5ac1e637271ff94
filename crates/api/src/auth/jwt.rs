//! JWT token issuance, validation and rotation

use std::sync::Arc;

use helpdesk_shared::Identity;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::revocation::RevocationStore;

/// Issuer stamped into every token
pub const ISSUER: &str = "helpdesk";

/// JWT claims structure for helpdesk-issued tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject identity
    pub data: Identity,
    /// Issued at
    pub iat: i64,
    /// Expiration
    pub exp: i64,
    /// Issuer
    pub iss: String,
    /// Token kind (access or refresh)
    pub sub: TokenKind,
    /// JWT ID, unique per issued token
    pub jti: String,
}

impl Claims {
    /// Time left before natural expiry, zero once expired
    pub fn remaining_lifetime(&self) -> std::time::Duration {
        let left = self.exp - OffsetDateTime::now_utc().unix_timestamp();
        std::time::Duration::from_secs(u64::try_from(left).unwrap_or(0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Access token plus its paired refresh token
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// JWT manager for token operations
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
    revocations: Arc<dyn RevocationStore>,
    revocation_fail_open: bool,
}

impl JwtManager {
    /// Create a new JWT manager. The secret is fixed for the life of the process.
    pub fn new(
        secret: &str,
        access_token_ttl: Duration,
        refresh_token_ttl: Duration,
        revocations: Arc<dyn RevocationStore>,
    ) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_ttl,
            refresh_token_ttl,
            revocations,
            revocation_fail_open: false,
        }
    }

    /// Treat an unreachable revocation store as "not revoked" instead of rejecting
    pub fn with_revocation_fail_open(mut self, fail_open: bool) -> Self {
        self.revocation_fail_open = fail_open;
        self
    }

    pub fn access_token_ttl(&self) -> Duration {
        self.access_token_ttl
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        self.refresh_token_ttl
    }

    pub fn revocations(&self) -> &Arc<dyn RevocationStore> {
        &self.revocations
    }

    /// Sign a token for `identity` that expires `lifetime` from now
    pub fn issue(
        &self,
        identity: &Identity,
        lifetime: Duration,
        kind: TokenKind,
    ) -> Result<String, JwtError> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            data: identity.clone(),
            iat: now.unix_timestamp(),
            exp: (now + lifetime).unix_timestamp(),
            iss: ISSUER.to_string(),
            sub: kind,
            jti: Uuid::new_v4().to_string(),
        };

        // Explicit algorithm prevents algorithm confusion attacks
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::Encoding(e.to_string()))
    }

    pub fn issue_access(&self, identity: &Identity) -> Result<String, JwtError> {
        self.issue(identity, self.access_token_ttl, TokenKind::Access)
    }

    pub fn issue_refresh(&self, identity: &Identity) -> Result<String, JwtError> {
        self.issue(identity, self.refresh_token_ttl, TokenKind::Refresh)
    }

    pub fn issue_pair(&self, identity: &Identity) -> Result<TokenPair, JwtError> {
        Ok(TokenPair {
            access_token: self.issue_access(identity)?,
            refresh_token: self.issue_refresh(identity)?,
        })
    }

    /// Signature and time-claim checks only
    fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub"]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidAlgorithmName
                | ErrorKind::ImmatureSignature => JwtError::InvalidSignature,
                _ => JwtError::MalformedClaims(e.to_string()),
            })
    }

    /// Validate a token of either kind.
    ///
    /// Signature and expiry are checked first; only a cryptographically valid
    /// token costs a revocation store lookup.
    pub async fn validate(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.verify(token)?;

        match self.revocations.is_revoked(token).await {
            Ok(false) => Ok(claims),
            Ok(true) => {
                tracing::debug!(jti = %claims.jti, "Rejected revoked token");
                Err(JwtError::Revoked)
            }
            Err(e) if self.revocation_fail_open => {
                tracing::warn!(error = %e, jti = %claims.jti, "Revocation lookup failed, accepting token");
                Ok(claims)
            }
            Err(e) => {
                tracing::error!(error = %e, jti = %claims.jti, "Revocation lookup failed, rejecting token");
                Err(JwtError::RevocationUnavailable)
            }
        }
    }

    /// Validate an access token specifically
    pub async fn validate_access(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.validate(token).await?;
        if claims.sub != TokenKind::Access {
            return Err(JwtError::WrongTokenType);
        }
        Ok(claims)
    }

    /// Validate a refresh token specifically
    pub async fn validate_refresh(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.validate(token).await?;
        if claims.sub != TokenKind::Refresh {
            return Err(JwtError::WrongTokenType);
        }
        Ok(claims)
    }

    /// Revocation entry lifetime for a validated token: its remaining lifetime,
    /// never longer than the TTL this manager issues tokens of that kind with
    pub fn revocation_ttl(&self, claims: &Claims) -> std::time::Duration {
        let issued_ttl = match claims.sub {
            TokenKind::Access => self.access_token_ttl,
            TokenKind::Refresh => self.refresh_token_ttl,
        };
        let cap = std::time::Duration::try_from(issued_ttl).unwrap_or_default();
        claims.remaining_lifetime().min(cap)
    }

    /// Read claims without checking signature or expiry.
    ///
    /// The result is NOT authenticated. Only use it to recover identity for
    /// rotation once the paired refresh token has been validated.
    pub fn decode_unverified(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .map_err(|e| JwtError::MalformedClaims(e.to_string()))
    }

    /// Mint a fresh access token from an expired one and a valid refresh token.
    ///
    /// Only an access token that fails with exactly `Expired` is renewed. A forged,
    /// revoked or still-valid access token is rejected, as is any refresh failure.
    pub async fn rotate(&self, access_token: &str, refresh_token: &str) -> Result<String, JwtError> {
        let refresh = self.validate_refresh(refresh_token).await?;

        match self.validate_access(access_token).await {
            Ok(_) => Err(JwtError::RotationNotNeeded),
            Err(JwtError::Expired) => {
                let stale = self.decode_unverified(access_token)?;
                if stale.sub != TokenKind::Access {
                    return Err(JwtError::WrongTokenType);
                }
                if stale.data.id != refresh.data.id {
                    tracing::warn!(
                        access_subject = %stale.data.id,
                        refresh_subject = %refresh.data.id,
                        "Rotation rejected: token pair belongs to different subjects"
                    );
                    return Err(JwtError::IdentityMismatch);
                }

                let token = self.issue_access(&refresh.data)?;
                tracing::info!(user_id = %refresh.data.id, "Access token rotated");
                Ok(token)
            }
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Invalid token signature")]
    InvalidSignature,
    #[error("Token has expired")]
    Expired,
    #[error("Token has been revoked")]
    Revoked,
    #[error("Malformed token claims: {0}")]
    MalformedClaims(String),
    #[error("Wrong token type")]
    WrongTokenType,
    #[error("Token pair belongs to different subjects")]
    IdentityMismatch,
    #[error("Access token is still valid")]
    RotationNotNeeded,
    #[error("Revocation store unavailable")]
    RevocationUnavailable,
    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::revocation::{MemoryRevocationStore, RevocationError};
    use async_trait::async_trait;
    use helpdesk_shared::Role;

    const SECRET: &str = "test-secret-key-at-least-32-chars!";

    fn identity() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            role: Role::Technician,
            belong: vec!["tenant-a".to_string()],
        }
    }

    fn manager() -> JwtManager {
        JwtManager::new(
            SECRET,
            Duration::minutes(60),
            Duration::days(7),
            Arc::new(MemoryRevocationStore::new()),
        )
    }

    struct BrokenStore;

    #[async_trait]
    impl RevocationStore for BrokenStore {
        async fn revoke(&self, _: &str, _: std::time::Duration) -> Result<(), RevocationError> {
            Err(RevocationError::Unavailable("down".into()))
        }
        async fn is_revoked(&self, _: &str) -> Result<bool, RevocationError> {
            Err(RevocationError::Unavailable("down".into()))
        }
        async fn ping(&self) -> Result<(), RevocationError> {
            Err(RevocationError::Unavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn test_token_generation_and_validation() {
        let jwt = manager();
        let user = identity();

        let pair = jwt.issue_pair(&user).unwrap();

        let access = jwt.validate_access(&pair.access_token).await.unwrap();
        assert_eq!(access.data, user);
        assert_eq!(access.sub, TokenKind::Access);
        assert_eq!(access.exp - access.iat, 60 * 60);

        let refresh = jwt.validate_refresh(&pair.refresh_token).await.unwrap();
        assert_eq!(refresh.data, user);
        assert_eq!(refresh.exp - refresh.iat, 7 * 24 * 60 * 60);
        assert_ne!(access.jti, refresh.jti);
    }

    #[tokio::test]
    async fn test_wrong_token_type() {
        let jwt = manager();
        let pair = jwt.issue_pair(&identity()).unwrap();

        assert!(matches!(
            jwt.validate_refresh(&pair.access_token).await,
            Err(JwtError::WrongTokenType)
        ));
        assert!(matches!(
            jwt.validate_access(&pair.refresh_token).await,
            Err(JwtError::WrongTokenType)
        ));
    }

    #[tokio::test]
    async fn test_expired_and_forged_tokens() {
        let jwt = manager();
        let expired = jwt
            .issue(&identity(), Duration::minutes(-5), TokenKind::Access)
            .unwrap();
        assert!(matches!(jwt.validate(&expired).await, Err(JwtError::Expired)));

        let other = JwtManager::new(
            "another-secret-key-at-least-32-chars",
            Duration::minutes(60),
            Duration::days(7),
            Arc::new(MemoryRevocationStore::new()),
        );
        let forged = other.issue_access(&identity()).unwrap();
        assert!(matches!(
            jwt.validate(&forged).await,
            Err(JwtError::InvalidSignature)
        ));

        // Expired AND forged reports the signature failure
        let forged_expired = other
            .issue(&identity(), Duration::minutes(-5), TokenKind::Access)
            .unwrap();
        assert!(matches!(
            jwt.validate(&forged_expired).await,
            Err(JwtError::InvalidSignature)
        ));

        assert!(matches!(
            jwt.validate("not-a-jwt").await,
            Err(JwtError::MalformedClaims(_))
        ));
    }

    #[tokio::test]
    async fn test_forged_token_skips_revocation_lookup() {
        // A broken store would fail closed; a forged token must never reach it
        let jwt = JwtManager::new(SECRET, Duration::minutes(60), Duration::days(7), Arc::new(BrokenStore));
        let forged = manager_with_secret("another-secret-key-at-least-32-chars")
            .issue_access(&identity())
            .unwrap();
        assert!(matches!(
            jwt.validate(&forged).await,
            Err(JwtError::InvalidSignature)
        ));
    }

    fn manager_with_secret(secret: &str) -> JwtManager {
        JwtManager::new(
            secret,
            Duration::minutes(60),
            Duration::days(7),
            Arc::new(MemoryRevocationStore::new()),
        )
    }

    #[tokio::test]
    async fn test_revoked_token_rejected_before_expiry() {
        let jwt = manager();
        let token = jwt.issue_access(&identity()).unwrap();
        let claims = jwt.validate(&token).await.unwrap();

        jwt.revocations()
            .revoke(&token, claims.remaining_lifetime())
            .await
            .unwrap();

        for _ in 0..3 {
            assert!(matches!(jwt.validate(&token).await, Err(JwtError::Revoked)));
        }
    }

    #[tokio::test]
    async fn test_store_failure_policy() {
        let closed = JwtManager::new(SECRET, Duration::minutes(60), Duration::days(7), Arc::new(BrokenStore));
        let token = closed.issue_access(&identity()).unwrap();
        assert!(matches!(
            closed.validate(&token).await,
            Err(JwtError::RevocationUnavailable)
        ));

        let open = closed.with_revocation_fail_open(true);
        assert!(open.validate(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_decode_unverified_ignores_signature_and_expiry() {
        let jwt = manager();
        let user = identity();
        let expired = manager_with_secret("another-secret-key-at-least-32-chars")
            .issue(&user, Duration::minutes(-5), TokenKind::Access)
            .unwrap();

        let claims = jwt.decode_unverified(&expired).unwrap();
        assert_eq!(claims.data, user);
        assert!(jwt.decode_unverified("garbage").is_err());
    }

    #[tokio::test]
    async fn test_rotation_of_expired_access_token() {
        let jwt = manager();
        let user = identity();
        let expired = jwt
            .issue(&user, Duration::minutes(-1), TokenKind::Access)
            .unwrap();
        let refresh = jwt.issue_refresh(&user).unwrap();

        let before = OffsetDateTime::now_utc().unix_timestamp();
        let rotated = jwt.rotate(&expired, &refresh).await.unwrap();
        assert_ne!(rotated, expired);

        let claims = jwt.validate_access(&rotated).await.unwrap();
        assert_eq!(claims.data, user);
        let expected_exp = before + jwt.access_token_ttl().whole_seconds();
        assert!((claims.exp - expected_exp).abs() <= 1);
    }

    #[tokio::test]
    async fn test_rotation_rejections() {
        let jwt = manager();
        let user = identity();
        let refresh = jwt.issue_refresh(&user).unwrap();

        // Still-valid access token is not silently renewed
        let live = jwt.issue_access(&user).unwrap();
        assert!(matches!(
            jwt.rotate(&live, &refresh).await,
            Err(JwtError::RotationNotNeeded)
        ));

        // Forged access token
        let forged = manager_with_secret("another-secret-key-at-least-32-chars")
            .issue(&user, Duration::minutes(-1), TokenKind::Access)
            .unwrap();
        assert!(matches!(
            jwt.rotate(&forged, &refresh).await,
            Err(JwtError::InvalidSignature)
        ));

        // Revoked refresh token
        let expired = jwt
            .issue(&user, Duration::minutes(-1), TokenKind::Access)
            .unwrap();
        let revoked_refresh = jwt.issue_refresh(&user).unwrap();
        jwt.revocations()
            .revoke(&revoked_refresh, std::time::Duration::from_secs(60))
            .await
            .unwrap();
        assert!(matches!(
            jwt.rotate(&expired, &revoked_refresh).await,
            Err(JwtError::Revoked)
        ));

        // Refresh token belonging to someone else
        let stranger = jwt.issue_refresh(&identity()).unwrap();
        assert!(matches!(
            jwt.rotate(&expired, &stranger).await,
            Err(JwtError::IdentityMismatch)
        ));

        // Expired refresh token
        let stale_refresh = jwt
            .issue(&user, Duration::minutes(-1), TokenKind::Refresh)
            .unwrap();
        assert!(matches!(
            jwt.rotate(&expired, &stale_refresh).await,
            Err(JwtError::Expired)
        ));
    }

    #[tokio::test]
    async fn test_wrong_issuer_is_malformed_claims() {
        let jwt = manager();
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            data: identity(),
            iat: now.unix_timestamp(),
            exp: (now + Duration::minutes(5)).unix_timestamp(),
            iss: "someone-else".to_string(),
            sub: TokenKind::Access,
            jti: Uuid::new_v4().to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            jwt.validate(&token).await,
            Err(JwtError::MalformedClaims(_))
        ));
    }

    #[test]
    fn test_revocation_ttl_is_capped_by_issued_lifetime() {
        let jwt = manager();
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let mut claims = jwt
            .decode_unverified(&jwt.issue_refresh(&identity()).unwrap())
            .unwrap();

        let week = 7 * 24 * 60 * 60;
        assert!(jwt.revocation_ttl(&claims).as_secs() <= week);

        claims.exp = now + 10 * 365 * 24 * 60 * 60;
        assert_eq!(jwt.revocation_ttl(&claims).as_secs(), week);

        claims.sub = TokenKind::Access;
        assert_eq!(jwt.revocation_ttl(&claims).as_secs(), 60 * 60);

        claims.exp = now - 1;
        assert_eq!(jwt.revocation_ttl(&claims).as_secs(), 0);
    }

    #[test]
    fn test_remaining_lifetime() {
        let jwt = manager();
        let token = jwt.issue_access(&identity()).unwrap();
        let claims = jwt.decode_unverified(&token).unwrap();
        let left = claims.remaining_lifetime().as_secs();
        assert!(left > 59 * 60 && left <= 60 * 60);

        let expired = jwt
            .issue(&identity(), Duration::minutes(-1), TokenKind::Access)
            .unwrap();
        let claims = jwt.decode_unverified(&expired).unwrap();
        assert_eq!(claims.remaining_lifetime().as_secs(), 0);
    }
}
