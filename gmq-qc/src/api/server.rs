//! HTTP server setup and routing

use super::{handlers, sse};
use crate::commands::CommandService;
use crate::session::SessionRegistry;
use crate::store::PlaylistStore;
use axum::{
    routing::{get, post},
    Router,
};
use gmq_common::events::EventBus;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub commands: Arc<CommandService>,
    pub events: EventBus,
    /// Port the server listens on (reported by /health)
    pub port: u16,
}

impl AppContext {
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        self.commands.registry()
    }

    pub fn store(&self) -> &Arc<PlaylistStore> {
        self.commands.store()
    }
}

/// Build the router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(handlers::health))
        // Session status
        .route("/guilds", get(handlers::list_sessions))
        .route("/guilds/:guild_id", get(handlers::get_session))
        // Play-type commands
        .route("/guilds/:guild_id/play", post(handlers::play))
        .route("/guilds/:guild_id/play-playlist", post(handlers::play_playlist))
        // Session controls
        .route("/guilds/:guild_id/skip", post(handlers::skip))
        .route("/guilds/:guild_id/pause", post(handlers::toggle_pause))
        .route("/guilds/:guild_id/loop", post(handlers::toggle_loop))
        .route("/guilds/:guild_id/stop", post(handlers::stop))
        .route("/guilds/:guild_id/volume", post(handlers::set_volume))
        .route("/guilds/:guild_id/volume/extreme", post(handlers::extreme_volume))
        .route("/guilds/:guild_id/surface", post(handlers::attach_surface))
        // Backend notification ingress
        .route("/guilds/:guild_id/track-ended", post(handlers::track_ended))
        // Playlists
        .route("/playlists", get(handlers::list_playlists))
        .route("/playlists/tracks", post(handlers::add_to_playlist))
        .route("/playlists/manage", post(handlers::manage_playlist))
        // SSE event stream
        .route("/events", get(sse::event_stream))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the API until `shutdown` resolves
pub async fn run(
    ctx: AppContext,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], ctx.port));
    let app = create_router(ctx);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}
