//! Avatar rigs and pose synchronization
//!
//! Handles the local and peer avatar rigs, their pose wire format, and
//! avatar model loading.

pub mod avatar;
pub mod manager;
pub mod model;
pub mod pose;
pub mod scene;

pub use avatar::{Rig, RigHandle, RigOptions};
pub use manager::{PeerId, RigManager, RigTransform};
pub use model::{AvatarModel, GltfLoader, ModelLoader};
pub use pose::{AvatarPose, GamepadPose, HmdPose};
pub use scene::{SceneBinding, SceneGraph};
