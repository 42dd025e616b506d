use async_trait::async_trait;
use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use tower::ServiceExt;
use tracing::debug;

use super::normalize_request;
use crate::Webtask;
use crate::context::WebtaskContext;
use crate::storage::attach_storage_helpers;

/// Context handed from the adapter to the `onRequest` extension of one request
#[derive(Clone)]
struct DispatchContext(WebtaskContext);

/// Hapi-style adapter: the route rewrite runs as a server extension ahead of routing
#[derive(Debug, Clone)]
pub struct HapiAdapter {
    server: Router,
}

/// Serve a router as a webtask, performing the prefix rewrite in an
/// `onRequest` extension layered around the whole server.
///
/// The context rides on the request it belongs to, so concurrent requests
/// through one adapter never observe each other's context.
pub fn from_hapi(server: Router) -> HapiAdapter {
    // layered on the fallback so it runs before the inner router matches
    let server = Router::new()
        .fallback_service(server)
        .layer(middleware::from_fn(on_request));

    HapiAdapter { server }
}

async fn on_request(request: Request, next: Next) -> Response {
    let mut request = match normalize_request(request) {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };

    if let Some(DispatchContext(context)) = request.extensions_mut().remove::<DispatchContext>() {
        request.extensions_mut().insert(context);
    }

    next.run(request).await
}

#[async_trait]
impl Webtask for HapiAdapter {
    async fn call(&self, context: WebtaskContext, mut request: Request) -> Response {
        request
            .extensions_mut()
            .insert(DispatchContext(attach_storage_helpers(context)));

        debug!("Dispatching {} {} to hapi server", request.method(), request.uri());
        match self.server.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}
