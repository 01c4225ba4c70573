//! Access token handling.
//!
//! The store platform authenticates players upstream; this server only needs to know who is
//! calling and what they are allowed to do. Access tokens are HS256 JWTs carrying the user id and
//! the granted roles, signed with the shared secret in [`crate::config::AuthConfig`]. The
//! [`crate::middleware::AclMiddlewareFactory`] validates the token on every protected route and
//! stores the claims in the request extensions, where handlers pick them up via the `FromRequest`
//! implementation below.

use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use arena_payment_engine::db_types::Role;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{config::AuthConfig, errors::AuthError};

pub const AUTH_HEADER: &str = "Authorization";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The user id of the caller.
    pub sub: String,
    pub roles: Vec<Role>,
    /// Expiry, as a unix timestamp.
    pub exp: i64,
}

impl JwtClaims {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

impl FromRequest for JwtClaims {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req
            .extensions()
            .get::<JwtClaims>()
            .cloned()
            .ok_or_else(|| crate::errors::ServerError::AuthenticationError(AuthError::MissingToken).into());
        ready(claims)
    }
}

/// Issues and validates access tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.reveal().as_bytes();
        Self { encoding_key: EncodingKey::from_secret(secret), decoding_key: DecodingKey::from_secret(secret) }
    }

    pub fn issue_token(&self, user_id: &str, roles: &[Role], valid_for: Duration) -> Result<String, AuthError> {
        let exp = (Utc::now() + valid_for).timestamp();
        let claims = JwtClaims { sub: user_id.to_string(), roles: roles.to_vec(), exp };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::ValidationError(e.to_string()))
    }

    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<JwtClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::ValidationError(e.to_string()))
    }
}

/// Pulls the bearer token out of the `Authorization` header.
pub fn extract_bearer_token(req: &HttpRequest) -> Result<String, AuthError> {
    let header = req.headers().get(AUTH_HEADER).ok_or(AuthError::MissingToken)?;
    let value = header
        .to_str()
        .map_err(|e| AuthError::PoorlyFormattedToken(format!("Header is not valid UTF-8: {e}")))?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::PoorlyFormattedToken("Expected a Bearer token".to_string()))?;
    Ok(token.trim().to_string())
}
