use async_trait::async_trait;
use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::prepare_request;
use crate::Webtask;
use crate::context::WebtaskContext;
use crate::error::WebtaskError;

/// A `'request'` event: the inbound request and the handle used to answer it
#[derive(Debug)]
pub struct IncomingRequest {
    request: Request,
    responder: Responder,
}

impl IncomingRequest {
    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn into_parts(self) -> (Request, Responder) {
        (self.request, self.responder)
    }

    /// Answer the request directly
    pub fn respond(self, response: impl IntoResponse) -> bool {
        self.responder.send(response)
    }
}

/// Write side of a request event; dropping it unanswered fails the request
#[derive(Debug)]
pub struct Responder {
    tx: oneshot::Sender<Response>,
}

impl Responder {
    /// Returns false when the adapter stopped waiting for the response
    pub fn send(self, response: impl IntoResponse) -> bool {
        self.tx.send(response.into_response()).is_ok()
    }
}

/// Emitting end of a server's request event stream
#[derive(Debug, Clone)]
pub struct RequestEmitter {
    tx: mpsc::Sender<IncomingRequest>,
}

impl RequestEmitter {
    /// Emit a `'request'` event and wait for the server's response
    pub async fn emit(&self, request: Request) -> Result<Response, WebtaskError> {
        let (tx, rx) = oneshot::channel();
        let event = IncomingRequest {
            request,
            responder: Responder { tx },
        };

        self.tx.send(event).await.map_err(|_| WebtaskError::Upstream {
            status: 502,
            message: "The server is not listening for requests.".to_string(),
        })?;

        rx.await.map_err(|_| WebtaskError::Upstream {
            status: 502,
            message: "The server dropped the request without responding.".to_string(),
        })
    }
}

/// Create a request event stream. The server loop receives [`IncomingRequest`]s
/// from the receiver; the emitter is wrapped with [`from_server`].
pub fn request_channel(buffer: usize) -> (RequestEmitter, mpsc::Receiver<IncomingRequest>) {
    let (tx, rx) = mpsc::channel(buffer);
    (RequestEmitter { tx }, rx)
}

/// Node `http.Server`/Restify-style adapter
#[derive(Debug, Clone)]
pub struct ServerAdapter {
    emitter: RequestEmitter,
}

/// Serve a request event stream as a webtask
pub fn from_server(emitter: RequestEmitter) -> ServerAdapter {
    ServerAdapter { emitter }
}

/// Alias of [`from_server`]
pub fn from_restify(emitter: RequestEmitter) -> ServerAdapter {
    from_server(emitter)
}

#[async_trait]
impl Webtask for ServerAdapter {
    async fn call(&self, context: WebtaskContext, request: Request) -> Response {
        let request = match prepare_request(context, request) {
            Ok(request) => request,
            Err(e) => return e.into_response(),
        };

        debug!("Emitting request event for {} {}", request.method(), request.uri());
        match self.emitter.emit(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Request event failed: {}", e);
                e.into_response()
            }
        }
    }
}
