use crate::application_port::{ConfigError, SignedToken, TokenCodec, TokenError, TokenKind};
use crate::domain_model::UserId;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub access_secret: Vec<u8>,
    pub refresh_secret: Vec<u8>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    iat: i64,
    exp: i64,
    /// Unique per issuance. Two pairs signed for the same subject in the
    /// same second must still differ, or slot rotation could not tell the
    /// old refresh token from the new one.
    jti: String,
}

struct KindKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

/// HS256 codec with a distinct secret per token kind, so an access token can
/// never pass verification as a refresh token or vice versa.
pub struct JwtTokenCodec {
    access: KindKeys,
    refresh: KindKeys,
}

impl JwtTokenCodec {
    /// Fails fast on an absent secret or on `access_ttl > refresh_ttl`;
    /// no per-call configuration checks after this point.
    pub fn new(cfg: TokenConfig) -> Result<Self, ConfigError> {
        if cfg.access_secret.is_empty() {
            return Err(ConfigError::MissingSecret(TokenKind::Access));
        }
        if cfg.refresh_secret.is_empty() {
            return Err(ConfigError::MissingSecret(TokenKind::Refresh));
        }
        if cfg.access_ttl > cfg.refresh_ttl {
            return Err(ConfigError::TtlOrdering);
        }

        Ok(JwtTokenCodec {
            access: KindKeys {
                encoding: EncodingKey::from_secret(&cfg.access_secret),
                decoding: DecodingKey::from_secret(&cfg.access_secret),
                ttl: cfg.access_ttl,
            },
            refresh: KindKeys {
                encoding: EncodingKey::from_secret(&cfg.refresh_secret),
                decoding: DecodingKey::from_secret(&cfg.refresh_secret),
                ttl: cfg.refresh_ttl,
            },
        })
    }

    fn keys(&self, kind: TokenKind) -> &KindKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }
}

#[async_trait::async_trait]
impl TokenCodec for JwtTokenCodec {
    async fn sign(&self, kind: TokenKind, subject: UserId) -> Result<SignedToken, TokenError> {
        let keys = self.keys(kind);
        let iat_dt = Utc::now();
        let exp_dt = iat_dt + keys.ttl;
        let claims = Claims {
            sub: subject.to_string(),
            iat: iat_dt.timestamp(),
            exp: exp_dt.timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;
        Ok(SignedToken {
            token,
            expires_at: exp_dt,
        })
    }

    async fn verify(&self, kind: TokenKind, token: &str) -> Result<UserId, TokenError> {
        let keys = self.keys(kind);
        let mut v = Validation::new(Algorithm::HS256);
        v.validate_exp = true;
        let data = decode::<Claims>(token, &keys.decoding, &v).map_err(|_| TokenError::Invalid)?;
        data.claims
            .sub
            .parse::<UserId>()
            .map_err(|_| TokenError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TokenConfig {
        TokenConfig {
            access_secret: b"access-test-secret".to_vec(),
            refresh_secret: b"refresh-test-secret".to_vec(),
            access_ttl: Duration::from_secs(24 * 60 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }

    fn subject() -> UserId {
        UserId(uuid::Uuid::new_v4())
    }

    #[test]
    fn missing_access_secret_fails_construction() {
        let cfg = TokenConfig {
            access_secret: Vec::new(),
            ..config()
        };
        assert!(matches!(
            JwtTokenCodec::new(cfg),
            Err(ConfigError::MissingSecret(TokenKind::Access))
        ));
    }

    #[test]
    fn missing_refresh_secret_fails_construction() {
        let cfg = TokenConfig {
            refresh_secret: Vec::new(),
            ..config()
        };
        assert!(matches!(
            JwtTokenCodec::new(cfg),
            Err(ConfigError::MissingSecret(TokenKind::Refresh))
        ));
    }

    #[test]
    fn access_ttl_must_not_exceed_refresh_ttl() {
        let cfg = TokenConfig {
            access_ttl: Duration::from_secs(8 * 24 * 60 * 60),
            ..config()
        };
        assert!(matches!(
            JwtTokenCodec::new(cfg),
            Err(ConfigError::TtlOrdering)
        ));
    }

    #[tokio::test]
    async fn sign_then_verify_round_trips_subject() {
        let codec = JwtTokenCodec::new(config()).unwrap();
        let uid = subject();

        let signed = codec.sign(TokenKind::Access, uid).await.unwrap();
        let decoded = codec.verify(TokenKind::Access, &signed.token).await.unwrap();

        assert_eq!(decoded, uid);
        assert!(signed.expires_at > Utc::now());
    }

    #[tokio::test]
    async fn back_to_back_signatures_differ() {
        let codec = JwtTokenCodec::new(config()).unwrap();
        let uid = subject();

        let first = codec.sign(TokenKind::Refresh, uid).await.unwrap();
        let second = codec.sign(TokenKind::Refresh, uid).await.unwrap();
        assert_ne!(first.token, second.token);
    }

    #[tokio::test]
    async fn access_token_is_not_a_refresh_token() {
        let codec = JwtTokenCodec::new(config()).unwrap();
        let signed = codec.sign(TokenKind::Access, subject()).await.unwrap();

        let err = codec
            .verify(TokenKind::Refresh, &signed.token)
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::Invalid));
    }

    #[tokio::test]
    async fn garbage_is_rejected() {
        let codec = JwtTokenCodec::new(config()).unwrap();
        let err = codec
            .verify(TokenKind::Access, "not-a-token")
            .await
            .unwrap_err();
        assert!(matches!(err, TokenError::Invalid));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let codec = JwtTokenCodec::new(config()).unwrap();
        let uid = subject();

        // Hand-craft a token whose expiry is far enough in the past to clear
        // the library's default leeway.
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: uid.to_string(),
            iat: now - 7200,
            exp: now - 3600,
            jti: uuid::Uuid::new_v4().to_string(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"access-test-secret"),
        )
        .unwrap();

        let err = codec.verify(TokenKind::Access, &token).await.unwrap_err();
        assert!(matches!(err, TokenError::Invalid));
    }
}
