/// App Endpoint Handler
///
/// Authenticates requests to every path other than `/login` and `/callback`,
/// injecting the caller's claims into the context and request extensions
/// before handing the request to the wrapped webtask.
use axum::{
    extract::Request,
    http::{HeaderValue, Method, header, request::Parts},
    response::Response,
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::Value;
use tracing::{debug, warn};

use super::config::ResolvedOptions;
use super::error::LoginError;
use crate::Webtask;
use crate::context::WebtaskContext;
use crate::routing::RoutingInfo;

const STATE_MAX_AGE: u64 = 3600;

/// Claims of the authenticated caller, inserted into request extensions
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser(pub Value);

pub(crate) async fn app_endpoint<W: Webtask>(
    webtask: &W,
    options: &ResolvedOptions,
    mut ctx: WebtaskContext,
    request: Request,
    routing: &RoutingInfo,
) -> Response {
    let (mut parts, body) = request.into_parts();

    if let Some(exclude) = &options.exclude {
        if exclude(&ctx, &parts, &routing.app_path) {
            debug!("Path {} excluded from authentication", routing.app_path);
            return webtask.call(ctx, Request::from_parts(parts, body)).await;
        }
    }

    let Some(token) = (options.get_access_token)(&ctx, &parts) else {
        return missing_token(options, &ctx, &parts, routing);
    };

    let user = match options
        .validate_token
        .validate(&ctx, &parts, routing, &token)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            debug!("Access token rejected with {}: {}", e.code, e.message);
            let error = LoginError::new(e.code, e.message);
            return (options.login_error)(error, &ctx, &parts, &routing.base_url);
        }
    };

    ctx.access_token = Some(token);
    ctx.user = Some(user.clone());
    parts.extensions.insert(AuthenticatedUser(user));

    if let Some(authorized) = &options.authorized {
        if !authorized(&ctx, &parts) {
            warn!("Authenticated caller is not authorized for {}", routing.app_path);
            return (options.login_error)(LoginError::forbidden(), &ctx, &parts, &routing.base_url);
        }
    }

    webtask.call(ctx, Request::from_parts(parts, body)).await
}

/// 401 pointing at the login route; GET requests may persist return state first
fn missing_token(
    options: &ResolvedOptions,
    ctx: &WebtaskContext,
    parts: &Parts,
    routing: &RoutingInfo,
) -> Response {
    let state = if parts.method == Method::GET {
        options.return_state.as_ref().and_then(|return_state| {
            let name = uuid::Uuid::new_v4().simple().to_string();
            return_state(ctx, parts, routing, &name).map(|value| (name, value))
        })
    } else {
        None
    };

    let redirect = match &state {
        Some((name, _)) => format!("{}/login?state={}", routing.base_url, name),
        None => format!("{}/login", routing.base_url),
    };
    let error = LoginError::unauthorized("Unauthorized.")
        .with_error("Missing access token.")
        .with_redirect(redirect);

    let mut response = (options.login_error)(error, ctx, parts, &routing.base_url);
    if let Some((name, value)) = state {
        match HeaderValue::from_str(&state_cookie(&name, &value)) {
            Ok(cookie) => {
                response.headers_mut().append(header::SET_COOKIE, cookie);
            }
            Err(e) => warn!("Cannot set return state cookie: {}", e),
        }
    }
    response
}

/// `{name}={base64url(json)}; Max-Age=3600; HttpOnly`
pub fn state_cookie(name: &str, value: &Value) -> String {
    format!(
        "{}={}; Max-Age={}; HttpOnly",
        name,
        URL_SAFE_NO_PAD.encode(value.to_string()),
        STATE_MAX_AGE
    )
}
