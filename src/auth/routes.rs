/// Authentication Routes
///
/// `GET /login` starts the authorization code flow against the Auth0 tenant;
/// `GET /callback` exchanges the returned code for tokens and hands the
/// resulting access token to `login_success`.
use axum::{
    http::request::Parts,
    response::Response,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::config::ResolvedOptions;
use super::error::LoginError;
use super::middleware::AuthenticatedUser;
use super::params::AuthParams;
use super::responses::{error_response, found};
use super::token::{LoginTokens, decode_claims};
use crate::HTTP_CLIENT;
use crate::context::WebtaskContext;
use crate::routing::RoutingInfo;

const BASE_SCOPE: &str = "openid name email email_verified";
const CODE_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(15);

/// Token endpoint response fields used after login
#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: Option<String>,
    access_token: Option<String>,
}

/// Authorize URL for the tenant; `state` is forwarded when the login request carries one
pub fn authorize_url(
    params: &AuthParams,
    base_url: &str,
    scope: Option<&str>,
    state: Option<&str>,
) -> String {
    let scope = format!("{} {}", BASE_SCOPE, scope.unwrap_or_default());

    let mut url = format!(
        "{}/authorize?response_type=code&scope={}&client_id={}&redirect_uri={}",
        params.domain_url(),
        urlencoding::encode(scope.trim()),
        urlencoding::encode(&params.client_id),
        urlencoding::encode(&format!("{}/callback", base_url)),
    );
    if let Some(state) = state.filter(|s| !s.is_empty()) {
        url.push_str("&state=");
        url.push_str(&urlencoding::encode(state));
    }
    url
}

pub(crate) fn login(
    options: &ResolvedOptions,
    ctx: &WebtaskContext,
    parts: &Parts,
    routing: &RoutingInfo,
) -> Response {
    let Some(params) = AuthParams::resolve(&options.sources, ctx, parts) else {
        let error = LoginError::config(
            "You must specify Auth0 client ID, client secret, and domain when creating the webtask.",
        );
        return (options.login_error)(error, ctx, parts, &routing.base_url);
    };

    let state = routing.query.get("state").map(String::as_str);
    let location = authorize_url(&params, &routing.base_url, options.scope.as_deref(), state);
    debug!("Redirecting to {}", location);
    found(&location)
}

pub(crate) async fn callback(
    options: &ResolvedOptions,
    mut ctx: WebtaskContext,
    mut parts: Parts,
    routing: &RoutingInfo,
) -> Response {
    let Some(code) = routing.query.get("code").filter(|c| !c.is_empty()) else {
        let error = LoginError::unauthorized("Authentication error.")
            .with_detail("callbackQuery", query_value(routing));
        return (options.login_error)(error, &ctx, &parts, &routing.base_url);
    };

    let Some(params) = AuthParams::resolve(&options.sources, &ctx, &parts) else {
        return error_response(LoginError::config(
            "Auth0 Client ID, Client Secret, and Auth0 Domain must be specified.",
        ));
    };

    let tokens = match exchange_code(&params, code, &routing.base_url).await {
        Ok(tokens) => tokens,
        Err(error) => return (options.login_error)(error, &ctx, &parts, &routing.base_url),
    };

    let id_token = tokens.id_token.unwrap_or_default();
    let claims = match decode_claims(&id_token) {
        Ok(claims) => claims,
        Err(e) => {
            warn!("Cannot parse id_token: {}", e);
            let error = LoginError::new(502, "Cannot parse id_token returned from Auth0.")
                .with_error(e.to_string())
                .with_detail("id_token", id_token.clone());
            return (options.login_error)(error, &ctx, &parts, &routing.base_url);
        }
    };

    let user = Value::Object(claims.clone());
    ctx.user = Some(user.clone());
    parts.extensions.insert(AuthenticatedUser(user));

    let login_tokens = LoginTokens {
        id_token: &id_token,
        access_token: tokens.access_token.as_deref(),
        claims: &claims,
        base_url: &routing.base_url,
    };
    let token = match (options.create_token)(&ctx, &parts, &login_tokens) {
        Ok(token) => token,
        Err(error) => return error_response(error),
    };

    ctx.access_token = Some(token);
    (options.login_success)(&ctx, &parts, &routing.base_url)
}

async fn exchange_code(
    params: &AuthParams,
    code: &str,
    base_url: &str,
) -> Result<TokenResponse, LoginError> {
    let redirect_uri = format!("{}/callback", base_url);
    let form = [
        ("client_id", params.client_id.as_str()),
        ("client_secret", params.client_secret.as_str()),
        ("redirect_uri", redirect_uri.as_str()),
        ("code", code),
        ("grant_type", "authorization_code"),
    ];
    let failed = || LoginError::new(502, "OAuth code exchange completed with error.");

    let response = HTTP_CLIENT
        .post(format!("{}/oauth/token", params.domain_url()))
        .form(&form)
        .timeout(CODE_EXCHANGE_TIMEOUT)
        .send()
        .await
        .map_err(|e| {
            warn!("OAuth code exchange failed: {}", e);
            failed().with_error(e.to_string())
        })?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
        warn!("OAuth code exchange returned {}", status);
        return Err(failed()
            .with_error(format!("Token endpoint responded with {}", status))
            .with_detail("auth0Status", status.as_u16())
            .with_detail("auth0Response", body));
    }

    // An unreadable body surfaces as a missing id_token
    Ok(response.json::<TokenResponse>().await.unwrap_or(TokenResponse {
        id_token: None,
        access_token: None,
    }))
}

fn query_value(routing: &RoutingInfo) -> Value {
    let query: Map<String, Value> = routing
        .query
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    Value::Object(query)
}
