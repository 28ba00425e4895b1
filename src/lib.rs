//! rigview - Avatar rig synchronization service
//!
//! Keeps a local avatar rig and any number of peer rigs posed from a compact
//! wire format, and serves a content gallery with typed previews:
//! - Per-peer ordered avatar swaps that never block each other
//! - Strict pose wire codec (head, hands, floor height)
//! - VRM/glTF model loading over HTTP or from disk
//! - Content-addressed previews for images, video, audio, pages and avatars

pub mod config;
pub mod error;
pub mod gallery;
pub mod preview;
pub mod rig;
pub mod storage;
pub mod sync;
pub mod web;

pub use config::Config;
pub use error::{Result, RigviewError};

use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use gallery::Gallery;
use preview::Previewer;
use rig::{AvatarPose, GltfLoader, ModelLoader, RigManager, SceneGraph};
use storage::{ContentStore, HttpStore};

/// Application state shared across all components
pub struct AppState {
    /// Current configuration
    pub config: RwLock<Config>,
    /// Local and peer rigs
    pub rigs: RigManager,
    /// Scene the rigs are attached to
    pub scene: Arc<SceneGraph>,
    /// Content preview renderer
    pub previewer: Previewer,
    /// Paged content gallery
    pub gallery: Gallery,
    /// Local pose after each frame
    pub pose_tx: broadcast::Sender<AvatarPose>,
    /// Shutdown signal
    pub shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    /// Create application state backed by the HTTP content store and model loader
    pub fn new(config: Config) -> Result<Arc<Self>> {
        let store = Arc::new(HttpStore::new(&config.storage)?);
        let loader = Arc::new(GltfLoader::new(config.storage.timeout())?);
        Ok(Self::with_services(config, store, loader))
    }

    /// Create application state with explicit storage and loader backends
    pub fn with_services(
        config: Config,
        store: Arc<dyn ContentStore>,
        loader: Arc<dyn ModelLoader>,
    ) -> Arc<Self> {
        let (pose_tx, _) = broadcast::channel(64);
        let (shutdown_tx, _) = broadcast::channel(1);

        let scene = Arc::new(SceneGraph::new());
        let rigs = RigManager::new(scene.clone(), loader, config.rig.options());
        let previewer = Previewer::new(store, config.preview.clone());
        let gallery = Gallery::new(&config.gallery);

        Arc::new(Self {
            config: RwLock::new(config),
            rigs,
            scene,
            previewer,
            gallery,
            pose_tx,
            shutdown_tx,
        })
    }

    /// Advance all rigs one frame and broadcast the local pose
    pub fn tick(&self) -> AvatarPose {
        self.rigs.update();
        let pose = self.rigs.get_local_avatar_pose();
        let _ = self.pose_tx.send(pose);
        pose
    }

    /// Subscribe to local pose updates
    pub fn subscribe_pose(&self) -> broadcast::Receiver<AvatarPose> {
        self.pose_tx.subscribe()
    }

    /// Subscribe to shutdown signal
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Signal shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rig::manager::tests::StubLoader;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_tick_broadcasts_pose() {
        let state = AppState::with_services(
            Config::default(),
            Arc::new(MemoryStore::new("https://ipfs.io")),
            Arc::new(StubLoader::default()),
        );
        let mut rx = state.subscribe_pose();

        let pose = state.tick();
        assert_eq!(rx.recv().await.unwrap(), pose);
        assert_eq!(state.rigs.with_local_rig(|rig| rig.frames()), 1);
        assert_eq!(state.scene.len(), 1);
    }

    #[test]
    fn test_new_with_http_backends() {
        assert!(AppState::new(Config::default()).is_ok());
    }
}
