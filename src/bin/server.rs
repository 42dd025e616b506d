use anyhow::Context;
use axum::{
    Extension, Json, Router,
    extract::{Request, State},
    http::request::Parts,
    response::{IntoResponse, Response},
    routing::get,
};
use clap::Parser;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use webtask_tools::{
    Auth0Options, AuthenticatedUser, ReadOptions, Webtask, WebtaskContext, WebtaskExt,
    config::HostConfig, from_connect,
};

/// Serve a demo webtask locally the way the platform would invoke it
#[derive(Parser, Debug)]
#[command(name = "webtask-host", version)]
struct Args {
    /// Host configuration file (defaults to webtask.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Put the webtask behind the Auth0 login gateway
    #[arg(long)]
    auth0: bool,

    /// Extra scopes requested at login
    #[arg(long, requires = "auth0")]
    scope: Option<String>,

    /// E-mail addresses or @domains allowed in
    #[arg(long, requires = "auth0", num_args = 1..)]
    authorized: Vec<String>,
}

const COUNTER_PATH: &str = "/demo/counter";

struct Host {
    config: HostConfig,
    webtask: Arc<dyn Webtask>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().compact())
        .init();

    let args = Args::parse();
    let config = HostConfig::load(args.config.as_deref()).context("loading host configuration")?;
    let addr = config.server_addr()?;

    let demo = from_connect(demo_router());
    let webtask: Arc<dyn Webtask> = if args.auth0 {
        let mut options = Auth0Options::new();
        if let Some(scope) = args.scope {
            options = options.scope(scope);
        }
        if !args.authorized.is_empty() {
            options = options.authorized(args.authorized);
        }
        Arc::new(demo.auth0(options)?)
    } else {
        Arc::new(demo)
    };

    info!(
        "Serving webtask {}/{} ({}) on {}",
        config.claims.container,
        config.claims.jtn.as_deref().unwrap_or("-"),
        config.claims.url_format,
        addr
    );

    let host = Arc::new(Host { config, webtask });
    let app = Router::new()
        .fallback(invoke)
        .with_state(host)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for shutdown signal: {}", e);
            }
            info!("shutdown requested, stopping server...");
        })
        .await?;

    info!("server stopped");
    Ok(())
}

/// Invoke the webtask with a fresh context and the configured claims
async fn invoke(State(host): State<Arc<Host>>, mut request: Request) -> Response {
    request.extensions_mut().insert(host.config.claims.clone());
    host.webtask.call(host.config.context(), request).await
}

fn demo_router() -> Router {
    Router::new()
        .route("/", get(|| async { "Hello from webtask" }))
        .route("/whoami", get(whoami))
        .route("/counter", get(counter))
}

async fn whoami(Extension(ctx): Extension<WebtaskContext>, parts: Parts) -> Json<Value> {
    Json(json!({
        "user": ctx.user,
        "authenticated": parts.extensions.get::<AuthenticatedUser>().is_some(),
    }))
}

async fn counter(Extension(ctx): Extension<WebtaskContext>) -> Response {
    let current = match ctx
        .storage
        .read_with(COUNTER_PATH, ReadOptions::with_default(json!({"count": 0})))
        .await
    {
        Ok(data) => data["count"].as_i64().unwrap_or_default(),
        Err(e) => return e.into_response(),
    };

    let data = json!({"count": current + 1});
    match ctx.storage.write(COUNTER_PATH, data.to_string()).await {
        Ok(()) => Json(data).into_response(),
        Err(e) => e.into_response(),
    }
}
