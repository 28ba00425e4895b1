//! Rig registry and pose synchronization
//!
//! The manager is the only writer of rig state and scene attachment. It owns
//! one local rig and a map of peer rigs, each peer with its own [`WaitQueue`]
//! so avatar swaps for different peers never wait on each other. Rig state
//! sits behind short synchronous locks that are never held across an await;
//! the wait queues order the async model swaps.

use glam::{Mat4, Quat, Vec3};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::avatar::{Rig, RigHandle, RigOptions};
use super::model::{AvatarModel, ModelLoader};
use super::pose::AvatarPose;
use super::scene::SceneBinding;
use crate::error::{LoadError, PoseError, RigError};
use crate::sync::WaitQueue;

/// Externally assigned peer identifier
pub type PeerId = String;

/// Hand transform handed to world bindings
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RigTransform {
    pub position: Vec3,
    pub quaternion: Quat,
}

struct PeerSlot {
    rig: Rig,
    queue: Arc<WaitQueue>,
}

/// Owner of the local rig and all peer rigs
pub struct RigManager {
    scene: Arc<dyn SceneBinding>,
    loader: Arc<dyn ModelLoader>,
    options: RigOptions,
    local: RwLock<Rig>,
    local_queue: WaitQueue,
    local_matrix: RwLock<Option<Mat4>>,
    peers: RwLock<HashMap<PeerId, PeerSlot>>,
}

impl RigManager {
    /// Create a manager with a placeholder local rig attached to `scene`
    pub fn new(
        scene: Arc<dyn SceneBinding>,
        loader: Arc<dyn ModelLoader>,
        options: RigOptions,
    ) -> Self {
        let local = Rig::new(None, options);
        scene.attach(local.handle());

        Self {
            scene,
            loader,
            options,
            local: RwLock::new(local),
            local_queue: WaitQueue::new(),
            local_matrix: RwLock::new(None),
            peers: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the local rig with one wrapping `model` (placeholder when `None`)
    pub async fn add_local_rig(&self, model: Option<Arc<AvatarModel>>) {
        let guard = self.local_queue.lock().await;

        let rig = Rig::new(model, self.options);
        {
            let mut local = self.local.write();
            self.scene.detach(local.handle());
            tracing::debug!("Local rig {} -> {}", local.handle(), rig.handle());
            *local = rig;
            self.scene.attach(local.handle());
        }

        guard.unlock();
    }

    /// Load the avatar at `url` and make it the local rig.
    ///
    /// On failure the local rig becomes a placeholder and the error is
    /// returned.
    pub async fn set_local_avatar_url(&self, url: &str) -> Result<(), LoadError> {
        match self.loader.load(url).await {
            Ok(model) => {
                tracing::info!("Local avatar loaded: {}", model.name());
                self.add_local_rig(Some(Arc::new(model))).await;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to load local avatar {}: {}", url, e);
                self.add_local_rig(None).await;
                Err(e)
            }
        }
    }

    /// Place the local rig at a fixed world matrix, or release it with `None`
    pub fn set_local_rig_matrix(&self, matrix: Option<Mat4>) {
        *self.local_matrix.write() = matrix;
    }

    /// Register a peer with a placeholder rig
    pub fn add_peer_rig(&self, peer_id: &str) -> Result<(), RigError> {
        let mut peers = self.peers.write();
        if peers.contains_key(peer_id) {
            return Err(RigError::PeerExists(peer_id.to_string()));
        }

        let rig = Rig::new(None, self.options);
        self.scene.attach(rig.handle());
        tracing::info!("Peer {} joined ({})", peer_id, rig.handle());

        peers.insert(
            peer_id.to_string(),
            PeerSlot {
                rig,
                queue: Arc::new(WaitQueue::new()),
            },
        );
        Ok(())
    }

    /// Detach and forget a peer's rig
    pub fn remove_peer_rig(&self, peer_id: &str) -> Result<(), RigError> {
        let mut peers = self.peers.write();
        let slot = peers
            .remove(peer_id)
            .ok_or_else(|| RigError::PeerNotFound(peer_id.to_string()))?;

        self.scene.detach(slot.rig.handle());
        tracing::info!("Peer {} left ({})", peer_id, slot.rig.handle());
        Ok(())
    }

    /// Load the avatar at `url` for a peer.
    ///
    /// Swaps are ordered per peer. A load failure leaves the peer's rig
    /// untouched; if the peer is removed while loading, the model is dropped
    /// and [`RigError::PeerRemoved`] is returned.
    pub async fn set_peer_avatar_url(&self, url: &str, peer_id: &str) -> Result<(), RigError> {
        let queue = self.peer_queue(peer_id)?;
        let guard = queue.lock().await;

        let model = self.loader.load(url).await.map_err(|e| {
            tracing::warn!("Failed to load avatar {} for peer {}: {}", url, peer_id, e);
            e
        })?;
        tracing::info!("Peer {} avatar loaded: {}", peer_id, model.name());

        self.swap_peer_rig(peer_id, &queue, Some(Arc::new(model)))?;
        guard.unlock();
        Ok(())
    }

    /// Swap a peer's rig to an already loaded model (placeholder when `None`)
    pub async fn set_peer_avatar_model(
        &self,
        peer_id: &str,
        model: Option<Arc<AvatarModel>>,
    ) -> Result<(), RigError> {
        let queue = self.peer_queue(peer_id)?;
        let guard = queue.lock().await;
        self.swap_peer_rig(peer_id, &queue, model)?;
        guard.unlock();
        Ok(())
    }

    fn peer_queue(&self, peer_id: &str) -> Result<Arc<WaitQueue>, RigError> {
        self.peers
            .read()
            .get(peer_id)
            .map(|slot| Arc::clone(&slot.queue))
            .ok_or_else(|| RigError::PeerNotFound(peer_id.to_string()))
    }

    /// Replace the peer's rig, provided the slot still belongs to `queue`
    fn swap_peer_rig(
        &self,
        peer_id: &str,
        queue: &Arc<WaitQueue>,
        model: Option<Arc<AvatarModel>>,
    ) -> Result<(), RigError> {
        let mut peers = self.peers.write();
        let slot = match peers.get_mut(peer_id) {
            Some(slot) if Arc::ptr_eq(&slot.queue, queue) => slot,
            _ => {
                tracing::debug!("Peer {} went away during avatar load", peer_id);
                return Err(RigError::PeerRemoved(peer_id.to_string()));
            }
        };

        let rig = Rig::new(model, self.options);
        self.scene.detach(slot.rig.handle());
        self.scene.attach(rig.handle());
        slot.rig = rig;
        Ok(())
    }

    /// Current local pose, floor height included
    pub fn get_local_avatar_pose(&self) -> AvatarPose {
        self.local.read().pose()
    }

    /// Current pose of a peer
    pub fn get_peer_avatar_pose(&self, peer_id: &str) -> Result<AvatarPose, RigError> {
        self.peers
            .read()
            .get(peer_id)
            .map(|slot| slot.rig.pose())
            .ok_or_else(|| RigError::PeerNotFound(peer_id.to_string()))
    }

    /// Write a pose into the local rig; any floor height is ignored
    pub fn set_local_avatar_pose(&self, pose: &AvatarPose) {
        self.local.write().apply_inputs(pose);
    }

    /// Write a pose into a peer rig, including its floor height
    pub fn set_peer_avatar_pose(&self, pose: &AvatarPose, peer_id: &str) -> Result<(), RigError> {
        let floor_height = pose.floor_height.ok_or(PoseError::MissingFloorHeight)?;

        let mut peers = self.peers.write();
        let slot = peers
            .get_mut(peer_id)
            .ok_or_else(|| RigError::PeerNotFound(peer_id.to_string()))?;

        slot.rig.apply_inputs(pose);
        slot.rig.set_floor_height(floor_height);
        Ok(())
    }

    /// Left and right hand transforms of the local rig
    pub fn get_rig_transforms(&self) -> [RigTransform; 2] {
        let local = self.local.read();
        let inputs = &local.inputs;
        [
            RigTransform {
                position: inputs.left_gamepad.position,
                quaternion: inputs.left_gamepad.quaternion,
            },
            RigTransform {
                position: inputs.right_gamepad.position,
                quaternion: inputs.right_gamepad.quaternion,
            },
        ]
    }

    /// Advance the local rig, then every peer rig (peer order unspecified)
    pub fn update(&self) {
        let matrix = *self.local_matrix.read();
        {
            let mut local = self.local.write();
            local.set_root_transform(matrix.unwrap_or(Mat4::IDENTITY));
            local.update();
        }

        for slot in self.peers.write().values_mut() {
            slot.rig.update();
        }
    }

    /// Whether `handle` belongs to one of the peer rigs
    pub fn is_peer_rig(&self, handle: RigHandle) -> bool {
        self.peers
            .read()
            .values()
            .any(|slot| slot.rig.handle() == handle)
    }

    /// Known peer ids, sorted
    pub fn peer_ids(&self) -> Vec<PeerId> {
        let mut ids: Vec<PeerId> = self.peers.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn peer_count(&self) -> usize {
        self.peers.read().len()
    }

    /// Run `f` against the local rig
    pub fn with_local_rig<R>(&self, f: impl FnOnce(&Rig) -> R) -> R {
        f(&self.local.read())
    }

    /// Run `f` against a peer rig
    pub fn with_peer_rig<R>(&self, peer_id: &str, f: impl FnOnce(&Rig) -> R) -> Result<R, RigError> {
        self.peers
            .read()
            .get(peer_id)
            .map(|slot| f(&slot.rig))
            .ok_or_else(|| RigError::PeerNotFound(peer_id.to_string()))
    }
}
