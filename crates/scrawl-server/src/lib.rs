use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    http::{HeaderMap, header},
    response::IntoResponse,
    routing::get,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use scrawl_gateway::connection;
use scrawl_gateway::dispatcher::Dispatcher;

#[derive(Clone)]
struct ServerState {
    dispatcher: Dispatcher,
    jwt_secret: String,
}

/// Build the application router. Factored out of `main` so integration
/// tests can serve it on an ephemeral port.
pub fn app(dispatcher: Dispatcher, jwt_secret: String) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .with_state(ServerState {
            dispatcher,
            jwt_secret,
        })
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn ws_upgrade(
    State(state): State<ServerState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    // The auth check runs after the upgrade so the rejection reaches the
    // client as a policy-code close frame rather than a plain 4xx.
    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    ws.on_upgrade(move |socket| {
        connection::handle_connection(socket, state.dispatcher, cookie_header, state.jwt_secret)
    })
}
