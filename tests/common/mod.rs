#![allow(dead_code)]

use axum::{
    body::{Body, to_bytes},
    http::{Method, Request},
    response::Response,
};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::Value;
use webtask_tools::{UrlFormat, WebtaskClaims, WebtaskContext};

pub const CONTAINER: &str = "mycontainer";
pub const JTN: &str = "myjob";
pub const HOST: &str = "webtask.example.com";
pub const BASE_URL: &str = "https://webtask.example.com/api/run/mycontainer/myjob";

pub const CLIENT_ID: &str = "client";
/// base64 of `secret`
pub const CLIENT_SECRET: &str = "c2VjcmV0";
pub const CLIENT_SECRET_BYTES: &[u8] = b"secret";
pub const DOMAIN: &str = "tenant.auth0.com";

pub fn claims() -> WebtaskClaims {
    WebtaskClaims::new(CONTAINER, Some(JTN), UrlFormat::SharedDomain)
}

/// Request as delivered by the platform: full route prefix, Host and claims
pub fn request(method: Method, path: &str) -> Request<Body> {
    request_with(method, path, None, Body::empty())
}

pub fn request_with(
    method: Method,
    path: &str,
    bearer: Option<&str>,
    body: Body,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(format!("/api/run/{}/{}{}", CONTAINER, JTN, path))
        .header("Host", HOST);
    if let Some(token) = bearer {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }

    let mut request = builder.body(body).unwrap();
    request.extensions_mut().insert(claims());
    request
}

pub fn context(secrets: &[(&str, &str)]) -> WebtaskContext {
    WebtaskContext::new(
        secrets
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

/// Secrets of a fully configured Auth0 application on `domain`
pub fn auth0_context(domain: &str) -> WebtaskContext {
    context(&[
        ("AUTH0_CLIENT_ID", CLIENT_ID),
        ("AUTH0_CLIENT_SECRET", CLIENT_SECRET),
        ("AUTH0_DOMAIN", domain),
    ])
}

pub fn sign(claims: &Value, key: &[u8]) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(key),
    )
    .unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}
