//! Scene attachment point for rigs
//!
//! Rendering lives outside this crate; the scene only records which rigs are
//! attached so a renderer (or a test) can walk them.

use parking_lot::Mutex;

use super::avatar::RigHandle;

/// Where rigs get attached for rendering
pub trait SceneBinding: Send + Sync {
    /// Add a rig to the scene
    fn attach(&self, rig: RigHandle);

    /// Remove a rig from the scene
    fn detach(&self, rig: RigHandle);
}

/// In-process scene graph tracking attached rigs in attachment order
#[derive(Debug, Default)]
pub struct SceneGraph {
    attached: Mutex<Vec<RigHandle>>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently attached rigs
    pub fn attached(&self) -> Vec<RigHandle> {
        self.attached.lock().clone()
    }

    pub fn contains(&self, rig: RigHandle) -> bool {
        self.attached.lock().contains(&rig)
    }

    pub fn len(&self) -> usize {
        self.attached.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.attached.lock().is_empty()
    }
}

impl SceneBinding for SceneGraph {
    fn attach(&self, rig: RigHandle) {
        let mut attached = self.attached.lock();
        if attached.contains(&rig) {
            tracing::warn!("{} is already attached", rig);
            return;
        }
        attached.push(rig);
        tracing::debug!("Attached {} ({} in scene)", rig, attached.len());
    }

    fn detach(&self, rig: RigHandle) {
        let mut attached = self.attached.lock();
        let before = attached.len();
        attached.retain(|r| *r != rig);
        if attached.len() == before {
            tracing::debug!("{} was not attached", rig);
        } else {
            tracing::debug!("Detached {} ({} in scene)", rig, attached.len());
        }
    }
}
