use crate::config::Config;
use crate::user::User;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

pub mod api;

/// Represents the currently authenticated user, as carried by their token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: String,
    pub id: String,
}

impl CurrentUser {
    /// Creates a new CurrentUser instance.
    pub fn new(user_id: String, id: String) -> Self {
        Self { user_id, id }
    }
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        Self::new(claims.user_id, claims.id)
    }
}

/// Authentication state containing the JWT secret and token lifetime.
#[derive(Clone)]
pub struct AuthState {
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
}

impl AuthState {
    pub fn new(jwt_secret: impl Into<String>, token_ttl: chrono::Duration) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            token_ttl,
        }
    }

    /// Creates a new AuthState from the application config.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.jwt_secret.clone(),
            chrono::Duration::minutes(config.token_ttl_minutes),
        )
    }

    /// Issues a signed token bound to `user`.
    pub fn issue_token(&self, user: &User) -> anyhow::Result<IssuedToken> {
        let token = encode_jwt(
            user.user_id().to_string(),
            user.id().to_string(),
            &self.jwt_secret,
            self.token_ttl,
        )?;
        Ok(IssuedToken {
            token,
            expires_in: self.token_ttl.num_seconds(),
        })
    }

    /// Verifies a token's signature and expiry.
    pub fn verify_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode_jwt(token, &self.jwt_secret)
    }
}

/// A freshly signed token and its lifetime in seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: i64,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub exp: usize,      // Expiry time of the token
    pub iat: usize,      // Issued at time of the token
    pub user_id: String, // Email identifier of the user
    pub id: String,      // Generated ID of the user record
}

pub fn encode_jwt(
    user_id: String,
    id: String,
    jwt_secret: &str,
    ttl: chrono::Duration,
) -> anyhow::Result<String> {
    let now = chrono::Utc::now();
    let exp = (now + ttl).timestamp() as usize;
    let iat = now.timestamp() as usize;
    let claims = Claims {
        exp,
        iat,
        user_id,
        id,
    };
    let jwt = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )?;
    Ok(jwt)
}

pub fn decode_jwt(token: &str, jwt_secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}
