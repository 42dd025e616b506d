/// Framework Adapters
///
/// Each adapter closes over a dispatch entry point and exposes it as a
/// [`Webtask`](crate::Webtask): the platform route prefix is stripped from
/// the request URI, storage helpers are attached to the context and the
/// context travels with the request as an extension.
use axum::extract::{OriginalUri, Request};

use crate::context::{WebtaskClaims, WebtaskContext};
use crate::error::WebtaskError;
use crate::routing::rewrite_uri;
use crate::storage::attach_storage_helpers;

mod connect;
mod hapi;
mod server;

pub use connect::{ConnectAdapter, from_connect, from_express};
pub use hapi::{HapiAdapter, from_hapi};
pub use server::{
    IncomingRequest, RequestEmitter, Responder, ServerAdapter, from_restify, from_server,
    request_channel,
};

/// Claims inserted by the host, required by every adapter
pub(crate) fn request_claims(request: &Request) -> Result<WebtaskClaims, WebtaskError> {
    request
        .extensions()
        .get::<WebtaskClaims>()
        .cloned()
        .ok_or_else(|| WebtaskError::config("Webtask claims are missing from the request."))
}

/// Strip the platform prefix, remembering the original URI
pub(crate) fn normalize_request(mut request: Request) -> Result<Request, WebtaskError> {
    let claims = request_claims(&request)?;
    let original = request.uri().clone();
    let rewritten = rewrite_uri(&original, &claims)?;

    if request.extensions().get::<OriginalUri>().is_none() {
        request.extensions_mut().insert(OriginalUri(original));
    }
    *request.uri_mut() = rewritten;

    Ok(request)
}

/// Rewrite the URI and attach the decorated context to the request
pub(crate) fn prepare_request(
    context: WebtaskContext,
    request: Request,
) -> Result<Request, WebtaskError> {
    let mut request = normalize_request(request)?;
    request
        .extensions_mut()
        .insert(attach_storage_helpers(context));

    Ok(request)
}
