//! HTTP request handlers
//!
//! Thin adapters: decode the request, call the registry, command service or
//! store, and map `Error` onto a status code with a machine-readable kind.

use crate::api::server::AppContext;
use crate::backend::{TrackEndReason, VoiceConnection};
use crate::commands::{ManageAction, ManageOutcome, Requester, TrackSelection};
use crate::error::Error;
use crate::session::{
    BulkPlayOutcome, ControlSurface, ExtremeOutcome, SessionSnapshot, StopOutcome,
    TrackEndOutcome, VolumeChange,
};
use crate::store::AddOutcome;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use gmq_common::{GuildId, PlaylistRecord, Track, UserId};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    git_hash: String,
    build_timestamp: String,
    build_profile: String,
    port: u16,
    sessions: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    /// Machine-readable error kind (absent on success)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl StatusResponse {
    fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            kind: None,
        }
    }
}

type ApiError = (StatusCode, Json<StatusResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct PlayRequest {
    user_id: UserId,
    query: String,
    #[serde(default)]
    voice: Option<VoiceConnection>,
    #[serde(default)]
    control_surface: Option<ControlSurface>,
}

#[derive(Debug, Deserialize)]
pub struct PlayPlaylistRequest {
    user_id: UserId,
    owner_id: UserId,
    name: String,
    #[serde(default)]
    voice: Option<VoiceConnection>,
    #[serde(default)]
    control_surface: Option<ControlSurface>,
}

#[derive(Debug, Serialize)]
pub struct TrackResponse {
    track: Track,
}

#[derive(Debug, Serialize)]
pub struct PauseResponse {
    paused: bool,
}

#[derive(Debug, Serialize)]
pub struct LoopResponse {
    loop_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    result: StopOutcome,
}

/// One of an absolute `value`, a relative `delta`, or a control `step`
#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    #[serde(default)]
    value: Option<i64>,
    #[serde(default)]
    delta: Option<i64>,
    #[serde(default)]
    step: Option<VolumeStep>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeStep {
    Up,
    Down,
}

#[derive(Debug, Serialize)]
pub struct VolumeResponse {
    volume: u16,
}

#[derive(Debug, Deserialize)]
pub struct ExtremeVolumeRequest {
    secret: String,
}

#[derive(Debug, Deserialize)]
pub struct SurfaceRequest {
    surface: ControlSurface,
}

#[derive(Debug, Deserialize)]
pub struct TrackEndedRequest {
    track: Track,
    #[serde(default)]
    reason: TrackEndReason,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistQuery {
    user_id: u64,
}

#[derive(Debug, Deserialize)]
pub struct AddToPlaylistRequest {
    user_id: UserId,
    #[serde(default)]
    owner_id: Option<UserId>,
    name: String,
    track: TrackSelection,
    #[serde(default)]
    is_public: bool,
    #[serde(default)]
    create_if_missing: bool,
}

#[derive(Debug, Serialize)]
pub struct AddToPlaylistResponse {
    result: AddOutcome,
}

#[derive(Debug, Deserialize)]
pub struct ManageRequest {
    user_id: UserId,
    owner_id: UserId,
    name: String,
    #[serde(flatten)]
    action: ManageAction,
}

/// Map a controller error onto the HTTP error tuple
fn api_error(e: Error) -> ApiError {
    let status = e.status_code();
    if status.is_server_error() {
        error!(kind = e.kind(), "Command failed: {}", e);
    } else {
        info!(kind = e.kind(), "Command rejected: {}", e);
    }
    (
        status,
        Json(StatusResponse {
            status: format!("error: {}", e),
            kind: Some(e.kind().to_string()),
        }),
    )
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "gmq-qc".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
        port: ctx.port,
        sessions: ctx.registry().len().await,
    })
}

// ============================================================================
// Session Status
// ============================================================================

/// GET /guilds - Snapshots of all live sessions
pub async fn list_sessions(State(ctx): State<AppContext>) -> Json<Vec<SessionSnapshot>> {
    Json(ctx.registry().snapshots().await)
}

/// GET /guilds/:guild_id - Snapshot of one session
pub async fn get_session(
    State(ctx): State<AppContext>,
    Path(guild_id): Path<u64>,
) -> ApiResult<SessionSnapshot> {
    ctx.registry()
        .snapshot(GuildId(guild_id))
        .await
        .map(Json)
        .map_err(api_error)
}

// ============================================================================
// Play-type Commands
// ============================================================================

/// POST /guilds/:guild_id/play - Resolve a query and play or enqueue it
pub async fn play(
    State(ctx): State<AppContext>,
    Path(guild_id): Path<u64>,
    Json(req): Json<PlayRequest>,
) -> ApiResult<BulkPlayOutcome> {
    let requester = Requester {
        user: req.user_id,
        voice: req.voice,
        surface: req.control_surface,
    };
    ctx.commands
        .play(GuildId(guild_id), requester, &req.query)
        .await
        .map(Json)
        .map_err(api_error)
}

/// POST /guilds/:guild_id/play-playlist - Play a stored playlist
pub async fn play_playlist(
    State(ctx): State<AppContext>,
    Path(guild_id): Path<u64>,
    Json(req): Json<PlayPlaylistRequest>,
) -> ApiResult<BulkPlayOutcome> {
    let requester = Requester {
        user: req.user_id,
        voice: req.voice,
        surface: req.control_surface,
    };
    ctx.commands
        .play_from_playlist(GuildId(guild_id), requester, req.owner_id, &req.name)
        .await
        .map(Json)
        .map_err(api_error)
}

// ============================================================================
// Session Controls
// ============================================================================

/// POST /guilds/:guild_id/skip
pub async fn skip(
    State(ctx): State<AppContext>,
    Path(guild_id): Path<u64>,
) -> ApiResult<TrackResponse> {
    let track = ctx
        .registry()
        .skip(GuildId(guild_id))
        .await
        .map_err(api_error)?;
    Ok(Json(TrackResponse { track }))
}

/// POST /guilds/:guild_id/pause - Toggle pause
pub async fn toggle_pause(
    State(ctx): State<AppContext>,
    Path(guild_id): Path<u64>,
) -> ApiResult<PauseResponse> {
    let paused = ctx
        .registry()
        .toggle_pause(GuildId(guild_id))
        .await
        .map_err(api_error)?;
    Ok(Json(PauseResponse { paused }))
}

/// POST /guilds/:guild_id/loop - Toggle loop mode
pub async fn toggle_loop(
    State(ctx): State<AppContext>,
    Path(guild_id): Path<u64>,
) -> ApiResult<LoopResponse> {
    let loop_enabled = ctx
        .registry()
        .toggle_loop(GuildId(guild_id))
        .await
        .map_err(api_error)?;
    Ok(Json(LoopResponse { loop_enabled }))
}

/// POST /guilds/:guild_id/stop
pub async fn stop(
    State(ctx): State<AppContext>,
    Path(guild_id): Path<u64>,
) -> ApiResult<StopResponse> {
    let result = ctx
        .registry()
        .stop(GuildId(guild_id))
        .await
        .map_err(api_error)?;
    Ok(Json(StopResponse { result }))
}

/// POST /guilds/:guild_id/volume - Absolute value, relative delta, or one step
pub async fn set_volume(
    State(ctx): State<AppContext>,
    Path(guild_id): Path<u64>,
    Json(req): Json<VolumeRequest>,
) -> ApiResult<VolumeResponse> {
    let change = match (req.value, req.delta, req.step) {
        (Some(value), None, None) => VolumeChange::Set(value),
        (None, Some(delta), None) => VolumeChange::Adjust(delta),
        (None, None, Some(VolumeStep::Up)) => VolumeChange::step_up(),
        (None, None, Some(VolumeStep::Down)) => VolumeChange::step_down(),
        _ => {
            return Err(api_error(Error::InvalidVolume(
                "expected exactly one of value, delta or step".to_string(),
            )))
        }
    };

    let volume = ctx
        .registry()
        .set_volume(GuildId(guild_id), change)
        .await
        .map_err(api_error)?;
    Ok(Json(VolumeResponse { volume }))
}

/// POST /guilds/:guild_id/volume/extreme - Privileged volume boost
pub async fn extreme_volume(
    State(ctx): State<AppContext>,
    Path(guild_id): Path<u64>,
    Json(req): Json<ExtremeVolumeRequest>,
) -> ApiResult<ExtremeOutcome> {
    ctx.commands
        .set_extreme_volume(GuildId(guild_id), &req.secret)
        .await
        .map(Json)
        .map_err(api_error)
}

/// POST /guilds/:guild_id/surface - Bind a control surface
pub async fn attach_surface(
    State(ctx): State<AppContext>,
    Path(guild_id): Path<u64>,
    Json(req): Json<SurfaceRequest>,
) -> ApiResult<StatusResponse> {
    ctx.registry()
        .attach_surface(GuildId(guild_id), req.surface)
        .await
        .map_err(api_error)?;
    Ok(Json(StatusResponse::ok()))
}

/// POST /guilds/:guild_id/track-ended - Backend notification ingress
pub async fn track_ended(
    State(ctx): State<AppContext>,
    Path(guild_id): Path<u64>,
    Json(req): Json<TrackEndedRequest>,
) -> ApiResult<TrackEndOutcome> {
    let outcome = ctx
        .registry()
        .track_ended(GuildId(guild_id), req.track, req.reason)
        .await;
    if let Err(e) = &outcome {
        warn!(guild = guild_id, error = %e, "Track end handling failed");
    }
    outcome.map(Json).map_err(api_error)
}

// ============================================================================
// Playlists
// ============================================================================

/// GET /playlists?user_id= - Playlists visible to a user
pub async fn list_playlists(
    State(ctx): State<AppContext>,
    Query(query): Query<PlaylistQuery>,
) -> Json<Vec<PlaylistRecord>> {
    Json(ctx.commands.list_playlists(UserId(query.user_id)).await)
}

/// POST /playlists/tracks - Add a track, creating the playlist on request
pub async fn add_to_playlist(
    State(ctx): State<AppContext>,
    Json(req): Json<AddToPlaylistRequest>,
) -> ApiResult<AddToPlaylistResponse> {
    let result = ctx
        .commands
        .add_to_playlist(
            req.user_id,
            req.owner_id,
            &req.name,
            req.track,
            req.is_public,
            req.create_if_missing,
        )
        .await
        .map_err(api_error)?;
    Ok(Json(AddToPlaylistResponse { result }))
}

/// POST /playlists/manage - Clear, rename, delete, remove a track or set visibility
pub async fn manage_playlist(
    State(ctx): State<AppContext>,
    Json(req): Json<ManageRequest>,
) -> ApiResult<ManageOutcome> {
    ctx.commands
        .manage_playlist(req.user_id, req.owner_id, &req.name, req.action)
        .await
        .map(Json)
        .map_err(api_error)
}
