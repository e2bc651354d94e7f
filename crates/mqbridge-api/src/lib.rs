pub mod handlers;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::GatewayState;

/// Routes served by the request gateway.
pub fn gateway_router(state: GatewayState) -> Router {
    Router::new()
        .route("/ping", get(handlers::handle_ping))
        .route("/request", post(handlers::handle_request))
        .route("/status", get(handlers::handle_status))
        .with_state(state)
        .layer(cors())
}

/// Routes served by the downstream echo service.
pub fn echo_router() -> Router {
    Router::new()
        .route("/", get(handlers::handle_hello))
        .route(
            "/ping",
            get(handlers::handle_echo_get).post(handlers::handle_echo_post),
        )
        .layer(cors())
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Bind 127.0.0.1:`port` and serve until the server fails.
pub async fn serve(app: Router, port: u16, name: &'static str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    serve_on(listener, app, name).await
}

/// Serve on an already-bound listener (tests bind port 0).
pub async fn serve_on(listener: TcpListener, app: Router, name: &'static str) -> anyhow::Result<()> {
    let port = listener.local_addr()?.port();
    tracing::info!(port, server = name, "HTTP listening on 127.0.0.1");
    axum::serve(listener, app).await?;
    Ok(())
}
