//! Run axum/tower services as webtasks.
//!
//! A webtask is a function invoked by the host with an execution context and
//! the inbound request. The adapters in [`adapters`] strip the platform route
//! prefix and attach storage helpers so an ordinary router can serve the
//! request, and [`auth::auth0`] wraps any webtask with an Auth0 login gateway.

use async_trait::async_trait;
use axum::extract::Request;
use axum::response::Response;
use lazy_static::lazy_static;
use std::future::Future;

pub mod adapters;
pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod routing;
pub mod storage;

pub use adapters::{
    IncomingRequest, RequestEmitter, Responder, from_connect, from_express, from_hapi,
    from_restify, from_server, request_channel,
};
pub use auth::{Auth0Options, Auth0Webtask, AuthenticatedUser, LoginError, auth0};
pub use context::{UrlFormat, WebtaskClaims, WebtaskContext};
pub use error::WebtaskError;
pub use routing::RoutingInfo;
pub use storage::{ReadOptions, Storage, WriteOptions, attach_storage_helpers};

lazy_static! {
    /// Shared client for storage and OAuth calls
    pub(crate) static ref HTTP_CLIENT: reqwest::Client = reqwest::Client::new();
}

/// A serverless function invoked with `(context, request)` and producing the response.
#[async_trait]
pub trait Webtask: Send + Sync + 'static {
    async fn call(&self, context: WebtaskContext, request: Request) -> Response;
}

#[async_trait]
impl<F, Fut> Webtask for F
where
    F: Fn(WebtaskContext, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    async fn call(&self, context: WebtaskContext, request: Request) -> Response {
        self(context, request).await
    }
}

/// Attaches `.auth0(options)` to every webtask, adapters included
pub trait WebtaskExt: Webtask + Sized {
    fn auth0(self, options: Auth0Options) -> Result<Auth0Webtask<Self>, WebtaskError> {
        auth::auth0(self, options)
    }
}

impl<W: Webtask> WebtaskExt for W {}
