// Authentication Module
// Auth0 login gateway wrapping any webtask

pub mod config;
pub mod error;
pub mod middleware;
pub mod params;
pub mod responses;
pub mod routes;
pub mod token;

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::Method,
    response::{IntoResponse, Response},
};
use std::fmt;
use tracing::debug;

use crate::Webtask;
use crate::context::{WebtaskClaims, WebtaskContext};
use crate::error::WebtaskError;
use crate::routing::RoutingInfo;
use config::ResolvedOptions;

pub use config::{Auth0Options, Authorized, Exclude};
pub use error::LoginError;
pub use middleware::AuthenticatedUser;
pub use params::AuthParams;
pub use token::{
    ApiKeyValidator, JwtTokenValidator, LoginTokens, TokenValidator, decode_claims, verify_token,
};

/// A webtask behind the Auth0 gateway
pub struct Auth0Webtask<W> {
    webtask: W,
    options: ResolvedOptions,
}

impl<W> fmt::Debug for Auth0Webtask<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth0Webtask").finish_non_exhaustive()
    }
}

/// Wrap a webtask with Auth0 authentication. Option errors are reported here,
/// before any request is served.
pub fn auth0<W: Webtask>(webtask: W, options: Auth0Options) -> Result<Auth0Webtask<W>, WebtaskError> {
    Ok(Auth0Webtask {
        webtask,
        options: options.resolve()?,
    })
}

#[async_trait]
impl<W: Webtask> Webtask for Auth0Webtask<W> {
    async fn call(&self, context: WebtaskContext, request: Request) -> Response {
        let Some(claims) = request
            .extensions()
            .get::<WebtaskClaims>()
            .filter(|claims| claims.is_named())
            .cloned()
        else {
            return WebtaskError::config("Auth0 authentication can only be used with named webtasks.")
                .into_response();
        };

        let (parts, body) = request.into_parts();
        let Some(routing) = RoutingInfo::from_request(&parts, &claims) else {
            debug!("No webtask route matches {}", parts.uri);
            return WebtaskError::config("Error processing request URL path.").into_response();
        };

        let is_get = parts.method == Method::GET;
        match routing.app_path.as_str() {
            "/login" if is_get => {
                debug!("Login requested for {}", routing.base_url);
                routes::login(&self.options, &context, &parts, &routing)
            }
            "/callback" if is_get => {
                debug!("Login callback for {}", routing.base_url);
                routes::callback(&self.options, context, parts, &routing).await
            }
            _ => {
                let request = Request::from_parts(parts, body);
                middleware::app_endpoint(&self.webtask, &self.options, context, request, &routing)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::UrlFormat;
    use axum::body::Body;
    use axum::http::StatusCode;

    async fn ok(_ctx: WebtaskContext, _req: Request) -> Response {
        StatusCode::OK.into_response()
    }

    fn request(uri: &str, claims: Option<WebtaskClaims>) -> Request {
        let mut request = Request::builder()
            .uri(uri)
            .header("Host", "h")
            .body(Body::empty())
            .unwrap();
        if let Some(claims) = claims {
            request.extensions_mut().insert(claims);
        }
        request
    }

    #[test]
    fn test_invalid_options_fail_construction() {
        assert!(auth0(ok, Auth0Options::new().exclude("relative")).is_err());
    }

    #[tokio::test]
    async fn test_unnamed_webtask_rejected() {
        let task = auth0(ok, Auth0Options::new()).unwrap();
        let claims = WebtaskClaims::new("c", None, UrlFormat::SharedDomain);
        let response = task
            .call(WebtaskContext::default(), request("/api/run/c/x", Some(claims)))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = task.call(WebtaskContext::default(), request("/", None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_path_shape_rejected() {
        let task = auth0(ok, Auth0Options::new()).unwrap();
        let claims = WebtaskClaims::new("c", Some("j"), UrlFormat::SharedDomain);
        let response = task
            .call(WebtaskContext::default(), request("/somewhere/else", Some(claims)))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
