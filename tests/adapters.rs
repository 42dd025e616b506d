use axum::{
    Extension, Router,
    body::Body,
    extract::{OriginalUri, Request},
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
};
use std::time::Duration;
use webtask_tools::{
    Auth0Options, Webtask, WebtaskContext, WebtaskExt, from_connect, from_express, from_hapi,
    from_restify, from_server, request_channel,
};

mod common;

use common::{body_json, body_text, context, request};

async fn echo_uri(uri: Uri, OriginalUri(original): OriginalUri) -> String {
    format!("{} <- {}", uri, original)
}

async fn echo_name(Extension(ctx): Extension<WebtaskContext>) -> String {
    ctx.secret("NAME").unwrap_or("none").to_string()
}

/// Waits on a per-request delay before answering, so concurrent calls overlap
async fn slow_name(Extension(ctx): Extension<WebtaskContext>) -> String {
    let delay = ctx
        .secret("DELAY_MS")
        .and_then(|d| d.parse().ok())
        .unwrap_or(0);
    tokio::time::sleep(Duration::from_millis(delay)).await;
    ctx.secret("NAME").unwrap_or("none").to_string()
}

fn router() -> Router {
    Router::new()
        .route("/foo", get(echo_uri))
        .route("/name", get(echo_name))
        .route("/slow", get(slow_name))
        .route("/", get(|| async { "root" }))
}

#[tokio::test]
async fn test_connect_strips_route_prefix() {
    let webtask = from_connect(router());
    let response = webtask
        .call(context(&[]), request(Method::GET, "/foo?x=1"))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_text(response).await,
        "/foo?x=1 <- /api/run/mycontainer/myjob/foo?x=1"
    );
}

#[tokio::test]
async fn test_connect_root_and_context() {
    let webtask = from_express(router());

    let response = webtask.call(context(&[]), request(Method::GET, "")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "root");

    let response = webtask
        .call(context(&[("NAME", "alice")]), request(Method::GET, "/name"))
        .await;
    assert_eq!(body_text(response).await, "alice");
}

#[tokio::test]
async fn test_connect_requires_claims() {
    let webtask = from_connect(router());
    let request = Request::builder()
        .uri("/api/run/mycontainer/myjob/foo")
        .body(Body::empty())
        .unwrap();

    let response = webtask.call(context(&[]), request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Webtask claims are missing from the request.");
}

#[tokio::test]
async fn test_hapi_routes_rewritten_path() {
    let webtask = from_hapi(router());

    let response = webtask
        .call(context(&[]), request(Method::GET, "/foo?x=1"))
        .await;
    assert_eq!(
        body_text(response).await,
        "/foo?x=1 <- /api/run/mycontainer/myjob/foo?x=1"
    );

    let response = webtask
        .call(context(&[]), request(Method::GET, "/missing"))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_hapi_concurrent_requests_keep_their_context() {
    let webtask = from_hapi(router());

    // earlier requests wait longest, so every call is in flight at once
    let names: Vec<String> = (0..5).map(|i| format!("caller-{}", i)).collect();
    let calls = names.iter().enumerate().map(|(i, name)| {
        let delay = ((5 - i) * 20).to_string();
        webtask.call(
            context(&[("NAME", name.as_str()), ("DELAY_MS", delay.as_str())]),
            request(Method::GET, "/slow"),
        )
    });
    let responses = futures::future::join_all(calls).await;

    for (name, response) in names.iter().zip(responses) {
        assert_eq!(&body_text(response).await, name);
    }
}

#[tokio::test]
async fn test_server_round_trip() {
    let (emitter, mut requests) = request_channel(8);
    tokio::spawn(async move {
        while let Some(event) = requests.recv().await {
            let name = event
                .request()
                .extensions()
                .get::<WebtaskContext>()
                .and_then(|ctx| ctx.secret("NAME"))
                .unwrap_or("none")
                .to_string();
            let path = event.request().uri().to_string();
            event.respond((StatusCode::CREATED, format!("{} {}", path, name)));
        }
    });

    let webtask = from_server(emitter);
    let response = webtask
        .call(context(&[("NAME", "bob")]), request(Method::POST, "/items?id=2"))
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_text(response).await, "/items?id=2 bob");
}

#[tokio::test]
async fn test_server_not_listening() {
    let (emitter, requests) = request_channel(1);
    drop(requests);

    let response = from_restify(emitter)
        .call(context(&[]), request(Method::GET, "/"))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_plain_function_webtask() {
    let webtask = |ctx: WebtaskContext, req: Request| async move {
        let _ = req;
        ctx.secret("NAME").unwrap_or("none").to_string().into_response()
    };

    let response = Webtask::call(&webtask, context(&[("NAME", "fn")]), request(Method::GET, "/")).await;
    assert_eq!(body_text(response).await, "fn");
}

#[tokio::test]
async fn test_adapter_behind_auth0_excluded_path() {
    let webtask = from_connect(router())
        .auth0(Auth0Options::new().exclude("/name"))
        .unwrap();

    let response = webtask
        .call(context(&[("NAME", "public")]), request(Method::GET, "/name"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "public");

    let response: Response = webtask
        .call(context(&[]), request(Method::GET, "/foo"))
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
}
