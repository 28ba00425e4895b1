//! REST API endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::sse;
use crate::error::{PoseError, RigError};
use crate::rig::model::require_remote_url;
use crate::rig::{AvatarPose, PeerId};
use crate::AppState;

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

impl ApiResponse<()> {
    pub fn error(message: &str) -> Json<Self> {
        Json(Self {
            success: false,
            data: None,
            error: Some(message.to_string()),
        })
    }

    pub fn ok() -> Json<Self> {
        Json(Self {
            success: true,
            data: None,
            error: None,
        })
    }
}

fn failure(status: StatusCode, message: &str) -> Response {
    (status, ApiResponse::error(message)).into_response()
}

fn rig_failure(err: RigError) -> Response {
    let status = match &err {
        RigError::PeerNotFound(_) => StatusCode::NOT_FOUND,
        RigError::PeerExists(_) => StatusCode::CONFLICT,
        RigError::PeerRemoved(_) => StatusCode::GONE,
        RigError::Pose(_) => StatusCode::BAD_REQUEST,
        RigError::Load(_) => StatusCode::BAD_GATEWAY,
    };
    tracing::debug!("Rig request failed: {}", err);
    failure(status, &err.to_string())
}

fn pose_failure(err: PoseError) -> Response {
    failure(StatusCode::BAD_REQUEST, &err.to_string())
}

/// Local rig summary
#[derive(Debug, Serialize)]
pub struct LocalRigStatus {
    pub handle: u64,
    pub model: Option<String>,
    pub debug: bool,
    pub height: f32,
    pub frames: u64,
}

/// Status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub local: LocalRigStatus,
    pub peers: usize,
    pub attached: usize,
}

/// Get current status
pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let local = state.rigs.with_local_rig(|rig| LocalRigStatus {
        handle: rig.handle().id(),
        model: rig.model().map(|m| m.name().to_string()),
        debug: rig.is_debug(),
        height: rig.height(),
        frames: rig.frames(),
    });

    ApiResponse::success(StatusResponse {
        version: crate::VERSION.to_string(),
        local,
        peers: state.rigs.peer_count(),
        attached: state.scene.len(),
    })
}

/// Get current configuration
pub async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = state.config.read().await;
    Json(config.clone())
}

/// Avatar swap request
#[derive(Debug, Deserialize)]
pub struct AvatarRequest {
    pub url: String,
}

impl AvatarRequest {
    /// The requested URL, if it is one the API may load
    fn remote_url(&self) -> Result<&str, Response> {
        require_remote_url(&self.url)
            .map(|()| self.url.as_str())
            .map_err(|e| failure(StatusCode::BAD_REQUEST, &e.to_string()))
    }
}

/// Get the local pose (floor height included)
pub async fn get_local_pose(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ApiResponse::success(state.rigs.get_local_avatar_pose())
}

/// Apply a pose to the local rig
pub async fn set_local_pose(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Response {
    match AvatarPose::from_wire(&body) {
        Ok(pose) => {
            state.rigs.set_local_avatar_pose(&pose);
            ApiResponse::ok().into_response()
        }
        Err(e) => pose_failure(e),
    }
}

/// Load a new avatar into the local rig
pub async fn set_local_avatar(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AvatarRequest>,
) -> Response {
    let url = match request.remote_url() {
        Ok(url) => url,
        Err(response) => return response,
    };

    match state.rigs.set_local_avatar_url(url).await {
        Ok(()) => ApiResponse::ok().into_response(),
        Err(e) => failure(StatusCode::BAD_GATEWAY, &e.to_string()),
    }
}

/// Local hand transforms
pub async fn get_transforms(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ApiResponse::success(state.rigs.get_rig_transforms())
}

/// Peer summary
#[derive(Debug, Serialize)]
pub struct PeerStatus {
    pub id: PeerId,
    pub handle: u64,
    pub model: Option<String>,
}

/// List peer rigs
pub async fn list_peers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let peers: Vec<PeerStatus> = state
        .rigs
        .peer_ids()
        .into_iter()
        .filter_map(|id| {
            state
                .rigs
                .with_peer_rig(&id, |rig| PeerStatus {
                    id: id.clone(),
                    handle: rig.handle().id(),
                    model: rig.model().map(|m| m.name().to_string()),
                })
                .ok()
        })
        .collect();

    ApiResponse::success(peers)
}

/// Create a placeholder rig for a peer
pub async fn add_peer(State(state): State<Arc<AppState>>, Path(peer_id): Path<String>) -> Response {
    match state.rigs.add_peer_rig(&peer_id) {
        Ok(()) => (StatusCode::CREATED, ApiResponse::ok()).into_response(),
        Err(e) => rig_failure(e),
    }
}

/// Remove a peer rig
pub async fn remove_peer(
    State(state): State<Arc<AppState>>,
    Path(peer_id): Path<String>,
) -> Response {
    match state.rigs.remove_peer_rig(&peer_id) {
        Ok(()) => ApiResponse::ok().into_response(),
        Err(e) => rig_failure(e),
    }
}

/// Get a peer's pose
pub async fn get_peer_pose(
    State(state): State<Arc<AppState>>,
    Path(peer_id): Path<String>,
) -> Response {
    match state.rigs.get_peer_avatar_pose(&peer_id) {
        Ok(pose) => ApiResponse::success(pose).into_response(),
        Err(e) => rig_failure(e),
    }
}

/// Apply a pose to a peer rig; the floor height is required
pub async fn set_peer_pose(
    State(state): State<Arc<AppState>>,
    Path(peer_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let pose = match AvatarPose::from_wire(&body) {
        Ok(pose) => pose,
        Err(e) => return pose_failure(e),
    };

    match state.rigs.set_peer_avatar_pose(&pose, &peer_id) {
        Ok(()) => ApiResponse::ok().into_response(),
        Err(e) => rig_failure(e),
    }
}

/// Load a new avatar into a peer rig
pub async fn set_peer_avatar(
    State(state): State<Arc<AppState>>,
    Path(peer_id): Path<String>,
    Json(request): Json<AvatarRequest>,
) -> Response {
    let url = match request.remote_url() {
        Ok(url) => url,
        Err(response) => return response,
    };

    match state.rigs.set_peer_avatar_url(url, &peer_id).await {
        Ok(()) => ApiResponse::ok().into_response(),
        Err(e) => rig_failure(e),
    }
}

/// SSE stream of the local pose
pub async fn pose_stream(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    sse::create_pose_stream(state)
}
