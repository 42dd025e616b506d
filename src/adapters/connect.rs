use async_trait::async_trait;
use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use std::convert::Infallible;
use tower::{Service, ServiceExt};
use tracing::debug;

use super::prepare_request;
use crate::Webtask;
use crate::context::WebtaskContext;

/// Connect/Express-style adapter over any tower service, e.g. an `axum::Router`
#[derive(Debug, Clone)]
pub struct ConnectAdapter<S> {
    service: S,
}

/// Serve a tower service as a webtask.
///
/// The service sees the request with the platform prefix removed; the
/// context is available to handlers as `Extension<WebtaskContext>` and the
/// untouched URI as `OriginalUri`.
pub fn from_connect<S>(service: S) -> ConnectAdapter<S>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
{
    ConnectAdapter { service }
}

/// Alias of [`from_connect`]
pub fn from_express<S>(service: S) -> ConnectAdapter<S>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
{
    from_connect(service)
}

#[async_trait]
impl<S> Webtask for ConnectAdapter<S>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
{
    async fn call(&self, context: WebtaskContext, request: Request) -> Response {
        let request = match prepare_request(context, request) {
            Ok(request) => request,
            Err(e) => return e.into_response(),
        };

        debug!("Dispatching {} {} to connect service", request.method(), request.uri());
        match self.service.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}
