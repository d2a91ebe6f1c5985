pub mod caller;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// One registered route, for `whattime list-routes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteInfo {
    pub name: &'static str,
    pub methods: &'static [&'static str],
    pub path: &'static str,
}

impl std::fmt::Display for RouteInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.name, self.methods.join(","), self.path)
    }
}

/// Every route `build_router` registers. Keep the two in step.
pub const ROUTES: &[RouteInfo] = &[
    RouteInfo {
        name: "ping",
        methods: &["GET"],
        path: "/ping",
    },
    RouteInfo {
        name: "apt.action_introspect",
        methods: &["GET"],
        path: "/apt",
    },
    RouteInfo {
        name: "apt.action_run",
        methods: &["POST"],
        path: "/apt/run",
    },
    RouteInfo {
        name: "apt.action_status",
        methods: &["GET"],
        path: "/apt/{action_id}/status",
    },
    RouteInfo {
        name: "apt.action_cancel",
        methods: &["POST"],
        path: "/apt/{action_id}/cancel",
    },
    RouteInfo {
        name: "apt.action_release",
        methods: &["POST"],
        path: "/apt/{action_id}/release",
    },
];

/// Build the axum Router with all routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ping", get(routes::ping::ping))
        .route("/apt", get(routes::description::describe))
        .route("/apt/run", post(routes::actions::run_action))
        .route(
            "/apt/{action_id}/status",
            get(routes::actions::action_status),
        )
        .route(
            "/apt/{action_id}/cancel",
            post(routes::actions::cancel_action),
        )
        .route(
            "/apt/{action_id}/release",
            post(routes::actions::release_action),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Serve on a pre-bound listener until Ctrl-C.
///
/// Accepting a bound `TcpListener` lets the caller read the actual port
/// before starting (useful when `port = 0` and the OS picks a free port).
pub async fn serve_on(
    app_state: AppState,
    listener: tokio::net::TcpListener,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    let app = build_router(app_state);

    tracing::info!("action provider listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("action provider stopped");
    Ok(())
}

/// Bind `host:port` and serve.
pub async fn serve(app_state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    serve_on(app_state, listener).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl-C; serving until killed");
        std::future::pending::<()>().await;
    }
}
