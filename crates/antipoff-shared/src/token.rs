//! Session tokens: HMAC-signed JWTs carrying the user id.
//!
//! Access and refresh tokens share one signing key and differ only in the
//! `kind` claim, which [`TokenSigner::verify`] checks so that a refresh token
//! can never stand in for an access token.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TokenError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User id, as a decimal string.
    pub sub: String,
    pub kind: TokenKind,
    /// Unique per issued token.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, TokenError> {
        self.sub
            .parse()
            .map_err(|_| TokenError::Invalid(format!("non-numeric subject: {}", self.sub)))
    }
}

/// Parse an algorithm name from configuration, accepting the HMAC family only.
pub fn parse_algorithm(name: &str) -> Result<Algorithm, TokenError> {
    let algorithm: Algorithm = name
        .trim()
        .parse()
        .map_err(|_| TokenError::UnsupportedAlgorithm(name.to_string()))?;
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        _ => Err(TokenError::UnsupportedAlgorithm(name.to_string())),
    }
}

#[derive(Clone)]
pub struct TokenSigner {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(secret: &[u8], algorithm: Algorithm) -> Result<Self, TokenError> {
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(TokenError::UnsupportedAlgorithm(format!("{algorithm:?}")));
        }
        Ok(Self {
            algorithm,
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        })
    }

    pub fn issue(&self, user_id: i64, kind: TokenKind, ttl: Duration) -> Result<String, TokenError> {
        let now = Utc::now();
        let expires = now
            .checked_add_signed(ttl)
            .ok_or_else(|| TokenError::Encode(format!("token lifetime {ttl} out of range")))?;
        let claims = Claims {
            sub: user_id.to_string(),
            kind,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
        };
        encode(&Header::new(self.algorithm), &claims, &self.encoding)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(e.to_string()),
        })?;

        if data.claims.kind != expected {
            return Err(TokenError::WrongKind);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new(b"test-secret", Algorithm::HS256).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let signer = signer();
        let token = signer.issue(42, TokenKind::Access, Duration::minutes(5)).unwrap();
        let claims = signer.verify(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[test]
    fn test_refresh_token_not_accepted_as_access() {
        let signer = signer();
        let token = signer.issue(1, TokenKind::Refresh, Duration::days(1)).unwrap();
        assert!(matches!(
            signer.verify(&token, TokenKind::Access),
            Err(TokenError::WrongKind)
        ));
    }

    #[test]
    fn test_expired_token() {
        let signer = signer();
        let token = signer.issue(1, TokenKind::Access, Duration::minutes(-5)).unwrap();
        assert!(matches!(
            signer.verify(&token, TokenKind::Access),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_out_of_range_lifetime_is_error() {
        let signer = signer();
        assert!(matches!(
            signer.issue(1, TokenKind::Refresh, Duration::days(100_000_000)),
            Err(TokenError::Encode(_))
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = signer().issue(1, TokenKind::Access, Duration::minutes(5)).unwrap();
        let other = TokenSigner::new(b"another-secret", Algorithm::HS256).unwrap();
        assert!(matches!(
            other.verify(&token, TokenKind::Access),
            Err(TokenError::Invalid(_))
        ));
    }

    #[test]
    fn test_tokens_are_unique() {
        let signer = signer();
        let a = signer.issue(1, TokenKind::Access, Duration::minutes(5)).unwrap();
        let b = signer.issue(1, TokenKind::Access, Duration::minutes(5)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_algorithm() {
        assert_eq!(parse_algorithm("HS256").unwrap(), Algorithm::HS256);
        assert_eq!(parse_algorithm(" HS512 ").unwrap(), Algorithm::HS512);
        assert!(parse_algorithm("RS256").is_err());
        assert!(parse_algorithm("none").is_err());
    }
}
