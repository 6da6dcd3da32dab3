use chrono::{Duration, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Claims of an access token issued by the auth provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Claims {
    pub fn new(sub: impl Into<String>, expires_in: Duration) -> Self {
        Self {
            sub: sub.into(),
            exp: (Utc::now() + expires_in).timestamp(),
            email: None,
            user_metadata: UserMetadata::default(),
        }
    }
}

/// Who the caller is according to a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub email: Option<String>,
    pub username_hint: Option<String>,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            subject: claims.sub,
            email: claims.email,
            username_hint: claims.user_metadata.username,
        }
    }
}

/// Verifies HS256 access tokens signed with the provider's shared secret.
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        // Provider tokens carry an audience we do not pin.
        validation.validate_aud = false;
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Identity, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding_key, &self.validation).map(|data| data.claims.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &[u8] = b"test-secret";

    fn mint(claims: &Claims, secret: &[u8]) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    #[test]
    fn verifies_and_extracts_identity() {
        let mut claims = Claims::new("sub-123", Duration::hours(1));
        claims.email = Some("lifter@example.com".into());
        claims.user_metadata.username = Some("lifter".into());

        let identity = TokenVerifier::new(SECRET).verify(&mint(&claims, SECRET)).unwrap();
        assert_eq!(identity.subject, "sub-123");
        assert_eq!(identity.email.as_deref(), Some("lifter@example.com"));
        assert_eq!(identity.username_hint.as_deref(), Some("lifter"));
    }

    #[test]
    fn rejects_wrong_secret() {
        let claims = Claims::new("sub-123", Duration::hours(1));
        let token = mint(&claims, b"other-secret");
        assert!(TokenVerifier::new(SECRET).verify(&token).is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let claims = Claims::new("sub-123", Duration::hours(-2));
        assert!(TokenVerifier::new(SECRET).verify(&mint(&claims, SECRET)).is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(TokenVerifier::new(SECRET).verify("not.a.jwt").is_err());
    }
}
