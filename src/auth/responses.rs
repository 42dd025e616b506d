// Default Login Responders
// Redirect on success, JSON/HTML error pages on failure

use axum::{
    Json,
    http::{HeaderValue, Method, StatusCode, header, request::Parts},
    response::{Html, IntoResponse, Response},
};

use super::error::LoginError;
use crate::context::WebtaskContext;

const ERROR_HEADER: &str = "x-wt-error";

/// 302 to `{base_url}?access_token={token}`
pub fn default_login_success(ctx: &WebtaskContext, _parts: &Parts, base_url: &str) -> Response {
    let token = ctx.access_token.as_deref().unwrap_or_default();
    let location = format!("{}?access_token={}", base_url, urlencoding::encode(token));
    found(&location)
}

/// 302 Found; `Redirect::to` answers with 303
pub fn found(location: &str) -> Response {
    let mut response = StatusCode::FOUND.into_response();
    if let Ok(value) = HeaderValue::from_str(location) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    response
}

/// Browsers get redirected or an HTML page; API clients get the JSON error
pub fn default_login_error(
    error: LoginError,
    _ctx: &WebtaskContext,
    parts: &Parts,
    base_url: &str,
) -> Response {
    if parts.method != Method::GET {
        return error_response(error);
    }

    if let Some(redirect) = error.redirect.clone() {
        let mut response = (StatusCode::FOUND, Json(&error)).into_response();
        let headers = response.headers_mut();
        if let Ok(location) = HeaderValue::from_str(&redirect) {
            headers.insert(header::LOCATION, location);
        }
        insert_error_header(headers, &error.message);
        return response;
    }

    if error.code == 400 {
        return error_response(error);
    }

    let status = status_of(&error);
    let mut response = (
        status,
        [(header::CACHE_CONTROL, "no-cache")],
        Html(error_page(base_url)),
    )
        .into_response();
    insert_error_header(response.headers_mut(), &error.message);
    response
}

/// Render a login error as `{"code", "message", ...}` JSON
pub fn error_response(error: LoginError) -> Response {
    (
        status_of(&error),
        [(header::CACHE_CONTROL, "no-cache")],
        Json(error),
    )
        .into_response()
}

fn status_of(error: &LoginError) -> StatusCode {
    StatusCode::from_u16(error.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn insert_error_header(headers: &mut axum::http::HeaderMap, message: &str) {
    if let Ok(value) = HeaderValue::from_str(message) {
        headers.insert(ERROR_HEADER, value);
    }
}

fn error_page(base_url: &str) -> String {
    let login_url = html_escape::encode_double_quoted_attribute(&format!("{}/login", base_url))
        .into_owned();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8"/>
  <meta http-equiv="X-UA-Compatible" content="IE=edge"/>
  <meta name="viewport" content="width=device-width, initial-scale=1"/>
  <link href="https://cdn.auth0.com/styleguide/latest/index.css" rel="stylesheet" />
  <title>Access denied</title>
</head>
<body>
  <div class="container">
    <div class="row text-center">
      <h1><a href="https://auth0.com" title="Go to Auth0!"><img src="https://cdn.auth0.com/styleguide/1.0.0/img/badge.svg" alt="Auth0 badge" /></a></h1>
      <h1>Not authorized</h1>
      <p><a href="{login_url}">Try again</a></p>
    </div>
  </div>
</body>
</html>
"#,
        login_url = login_url,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::Value;

    fn parts(method: Method) -> Parts {
        Request::builder()
            .method(method)
            .uri("/")
            .body(Body::empty())
            .unwrap()
            .into_parts()
            .0
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_login_success_redirects_with_token() {
        let ctx = WebtaskContext {
            access_token: Some("a.b.c".to_string()),
            ..Default::default()
        };
        let response = default_login_success(&ctx, &parts(Method::GET), "https://h/api/run/c/j");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://h/api/run/c/j?access_token=a.b.c"
        );
    }

    #[tokio::test]
    async fn test_get_with_redirect() {
        let error = LoginError::unauthorized("Unauthorized.")
            .with_error("Missing access token.")
            .with_redirect("https://h/base/login");
        let response = default_login_error(
            error,
            &WebtaskContext::default(),
            &parts(Method::GET),
            "https://h/base",
        );

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "https://h/base/login");
        assert_eq!(response.headers()[ERROR_HEADER], "Unauthorized.");
        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["error"], "Missing access token.");
    }

    #[tokio::test]
    async fn test_get_without_redirect_renders_page() {
        let response = default_login_error(
            LoginError::forbidden(),
            &WebtaskContext::default(),
            &parts(Method::GET),
            "https://h/base",
        );

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/html")
        );
        let html = body_string(response).await;
        assert!(html.contains("<title>Access denied</title>"));
        assert!(html.contains("cdn.auth0.com/styleguide"));
        assert!(html.contains("Not authorized"));
        assert!(html.contains(r#"href="https://h/base/login""#));
    }

    #[test]
    fn test_error_page_escapes_login_url() {
        let html = error_page(r#"https://h/"><script>"#);
        assert!(!html.contains("<script>"));
        assert!(html.contains("https://h/&quot;&gt;&lt;script&gt;/login"));
    }

    #[tokio::test]
    async fn test_config_error_is_json() {
        let response = default_login_error(
            LoginError::config("Auth0 Client ID, Client Secret, and Auth0 Domain must be specified."),
            &WebtaskContext::default(),
            &parts(Method::GET),
            "https://h/base",
        );
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["code"], 400);
    }

    #[tokio::test]
    async fn test_non_get_is_json() {
        let error = LoginError::unauthorized("Unauthorized.").with_redirect("https://h/base/login");
        let response = default_login_error(
            error,
            &WebtaskContext::default(),
            &parts(Method::POST),
            "https://h/base",
        );
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::LOCATION).is_none());
        let body: Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(body["redirect"], "https://h/base/login");
    }
}
