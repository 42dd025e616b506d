/// Token validation and issuance
///
/// Bearer tokens are HMAC-signed JWTs: either Auth0 id_tokens signed with the
/// application's client secret, or API keys re-signed by the webtask with its
/// own secret after login.
use async_trait::async_trait;
use axum::http::request::Parts;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, dangerous::insecure_decode, decode, encode,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

use super::error::LoginError;
use super::params::{AuthParams, ParamFn, ParamSources};
use crate::context::WebtaskContext;
use crate::routing::RoutingInfo;

/// Verifies the bearer token of a request and returns the caller's claims
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(
        &self,
        ctx: &WebtaskContext,
        parts: &Parts,
        routing: &RoutingInfo,
        token: &str,
    ) -> Result<Value, LoginError>;
}

/// Tokens obtained from the code exchange, handed to `create_token`
#[derive(Debug, Clone, Copy)]
pub struct LoginTokens<'a> {
    pub id_token: &'a str,
    pub access_token: Option<&'a str>,
    pub claims: &'a Map<String, Value>,
    pub base_url: &'a str,
}

/// Computes the token handed to the caller after login
pub type CreateTokenFn =
    Arc<dyn Fn(&WebtaskContext, &Parts, &LoginTokens<'_>) -> Result<String, LoginError> + Send + Sync>;

/// Verifies Auth0 id_tokens against the client secret, audience and issuer
pub struct JwtTokenValidator {
    sources: ParamSources,
}

impl JwtTokenValidator {
    pub fn new(sources: ParamSources) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl TokenValidator for JwtTokenValidator {
    async fn validate(
        &self,
        ctx: &WebtaskContext,
        parts: &Parts,
        _routing: &RoutingInfo,
        token: &str,
    ) -> Result<Value, LoginError> {
        let params = AuthParams::resolve(&self.sources, ctx, parts).ok_or_else(|| {
            LoginError::config("Auth0 Client ID, Client Secret, and Auth0 Domain must be specified.")
        })?;
        let key = params.secret_bytes().map_err(LoginError::from)?;

        verify_token(token, &key, Some(&params.audience), &params.issuer()).map_err(|e| {
            warn!("Rejected access token: {}", e);
            LoginError::unauthorized(format!("Unauthorized: {}", e))
        })
    }
}

/// Verifies API keys issued by [`api_key_creator`]
pub struct ApiKeyValidator {
    webtask_secret: ParamFn,
}

impl ApiKeyValidator {
    pub fn new(webtask_secret: ParamFn) -> Self {
        Self { webtask_secret }
    }
}

#[async_trait]
impl TokenValidator for ApiKeyValidator {
    async fn validate(
        &self,
        ctx: &WebtaskContext,
        parts: &Parts,
        routing: &RoutingInfo,
        token: &str,
    ) -> Result<Value, LoginError> {
        let secret = (self.webtask_secret)(ctx, parts)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LoginError::config("The webtask secret must be provided to validate apiKeys."))?;

        verify_token(token, secret.as_bytes(), None, &routing.base_url).map_err(|e| {
            warn!("Rejected API key: {}", e);
            LoginError::unauthorized(format!("Unauthorized: {}", e))
        })
    }
}

/// Verify an HMAC-signed JWT. `iss` is always required and `aud` is required
/// when an audience is given; `exp`/`nbf` are checked only when present.
pub fn verify_token(
    token: &str,
    key: &[u8],
    audience: Option<&str>,
    issuer: &str,
) -> Result<Value, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
    match audience {
        Some(audience) => {
            validation.set_audience(&[audience]);
            validation.set_required_spec_claims(&["aud", "iss"]);
        }
        None => {
            validation.validate_aud = false;
            validation.set_required_spec_claims(&["iss"]);
        }
    }
    validation.set_issuer(&[issuer]);

    let data = decode::<Value>(token, &DecodingKey::from_secret(key), &validation)?;
    Ok(data.claims)
}

/// Read the claims of a JWT without verifying its signature
pub fn decode_claims(token: &str) -> Result<Map<String, Value>, jsonwebtoken::errors::Error> {
    insecure_decode::<Map<String, Value>>(token).map(|data| data.claims)
}

/// Re-sign login claims as a webtask API key with `iss` set to the webtask base URL
pub fn issue_api_key(
    claims: &Map<String, Value>,
    base_url: &str,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let mut claims = claims.clone();
    claims.insert("iss".to_string(), Value::String(base_url.to_string()));
    claims
        .entry("iat")
        .or_insert_with(|| Value::from(chrono::Utc::now().timestamp()));

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// `create_token` hook issuing API keys signed with the webtask secret
pub fn api_key_creator(webtask_secret: ParamFn) -> CreateTokenFn {
    Arc::new(move |ctx: &WebtaskContext, parts: &Parts, tokens: &LoginTokens<'_>| -> Result<String, LoginError> {
        let secret = webtask_secret(ctx, parts).filter(|s| !s.is_empty()).ok_or_else(|| {
            LoginError::config("The webtask secret must be provided to allow for issuing apiKeys.")
        })?;

        issue_api_key(tokens.claims, tokens.base_url, &secret)
            .map_err(|e| LoginError::config(format!("Cannot issue apiKey: {}", e)))
    })
}
