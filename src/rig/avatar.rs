//! A single posable avatar rig

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::model::{AvatarModel, DEFAULT_AVATAR_HEIGHT};
use super::pose::{AvatarPose, GamepadPose, HmdPose};

/// Where a disabled hand rests, relative to the head (right hand; left mirrors x)
const REST_HAND_OFFSET: Vec3 = Vec3::new(0.25, -0.65, 0.05);

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Identity of one rig instance in the scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RigHandle(u64);

impl RigHandle {
    fn next() -> Self {
        Self(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RigHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rig#{}", self.0)
    }
}

/// Rig feature toggles applied to every rig a manager creates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RigOptions {
    pub fingers: bool,
    pub hair: bool,
    pub visemes: bool,
    /// Render every rig as a debug skeleton, even with a model
    pub debug: bool,
}

impl Default for RigOptions {
    fn default() -> Self {
        Self {
            fingers: true,
            hair: true,
            visemes: true,
            debug: false,
        }
    }
}

/// Head input channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HmdInput {
    pub position: Vec3,
    pub quaternion: Quat,
}

/// Hand controller input channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GamepadInput {
    pub position: Vec3,
    pub quaternion: Quat,
    pub pointer: f32,
    pub grip: f32,
}

/// The named input channels of a rig
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigInputs {
    pub hmd: HmdInput,
    pub left_gamepad: GamepadInput,
    pub right_gamepad: GamepadInput,
}

impl Default for RigInputs {
    fn default() -> Self {
        let head = Vec3::new(0.0, DEFAULT_AVATAR_HEIGHT, 0.0);
        Self {
            hmd: HmdInput {
                position: head,
                quaternion: Quat::IDENTITY,
            },
            left_gamepad: GamepadInput {
                position: head + REST_HAND_OFFSET * Vec3::new(-1.0, 1.0, 1.0),
                quaternion: Quat::IDENTITY,
                pointer: 0.0,
                grip: 0.0,
            },
            right_gamepad: GamepadInput {
                position: head + REST_HAND_OFFSET,
                quaternion: Quat::IDENTITY,
                pointer: 0.0,
                grip: 0.0,
            },
        }
    }
}

/// World-space result of the last `update()`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigFrame {
    pub head: Mat4,
    pub left_hand: Mat4,
    pub right_hand: Mat4,
}

impl Default for RigFrame {
    fn default() -> Self {
        Self {
            head: Mat4::IDENTITY,
            left_hand: Mat4::IDENTITY,
            right_hand: Mat4::IDENTITY,
        }
    }
}

/// An avatar model wrapped with input channels.
///
/// A rig without a model is a placeholder and always renders as a debug rig.
#[derive(Debug, Clone)]
pub struct Rig {
    handle: RigHandle,
    model: Option<Arc<AvatarModel>>,
    options: RigOptions,
    pub inputs: RigInputs,
    floor_height: f32,
    top_enabled: bool,
    bottom_enabled: bool,
    hands_enabled: [bool; 2],
    root: Mat4,
    frame: RigFrame,
    frames: u64,
}

impl Rig {
    /// Wrap `model` (or nothing, for a placeholder) in a fresh rig
    pub fn new(model: Option<Arc<AvatarModel>>, options: RigOptions) -> Self {
        Self {
            handle: RigHandle::next(),
            model,
            options,
            inputs: RigInputs::default(),
            floor_height: 0.0,
            top_enabled: true,
            bottom_enabled: true,
            hands_enabled: [true, true],
            root: Mat4::IDENTITY,
            frame: RigFrame::default(),
            frames: 0,
        }
    }

    pub fn handle(&self) -> RigHandle {
        self.handle
    }

    pub fn model(&self) -> Option<&Arc<AvatarModel>> {
        self.model.as_ref()
    }

    pub fn options(&self) -> RigOptions {
        self.options
    }

    /// Whether the rig renders as a debug skeleton
    pub fn is_debug(&self) -> bool {
        self.model.is_none() || self.options.debug
    }

    /// Standing height of the wrapped model
    pub fn height(&self) -> f32 {
        self.model
            .as_ref()
            .map(|m| m.height())
            .unwrap_or(DEFAULT_AVATAR_HEIGHT)
    }

    pub fn floor_height(&self) -> f32 {
        self.floor_height
    }

    pub fn set_floor_height(&mut self, floor_height: f32) {
        self.floor_height = floor_height;
    }

    pub fn set_top_enabled(&mut self, enabled: bool) {
        self.top_enabled = enabled;
    }

    pub fn set_bottom_enabled(&mut self, enabled: bool) {
        self.bottom_enabled = enabled;
    }

    /// Enable hand tracking for hand `index` (0 = left, 1 = right)
    pub fn set_hand_enabled(&mut self, index: usize, enabled: bool) {
        if let Some(hand) = self.hands_enabled.get_mut(index) {
            *hand = enabled;
        }
    }

    pub fn top_enabled(&self) -> bool {
        self.top_enabled
    }

    pub fn bottom_enabled(&self) -> bool {
        self.bottom_enabled
    }

    pub fn hand_enabled(&self, index: usize) -> bool {
        self.hands_enabled.get(index).copied().unwrap_or(false)
    }

    /// World transform the rig is placed at
    pub fn set_root_transform(&mut self, root: Mat4) {
        self.root = root;
    }

    pub fn root_transform(&self) -> Mat4 {
        self.root
    }

    /// Result of the last update
    pub fn frame(&self) -> RigFrame {
        self.frame
    }

    /// Number of updates applied so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Read the input channels as a pose (floor height included)
    pub fn pose(&self) -> AvatarPose {
        let inputs = &self.inputs;
        AvatarPose {
            hmd: HmdPose {
                position: inputs.hmd.position,
                quaternion: inputs.hmd.quaternion,
            },
            left_gamepad: gamepad_pose(&inputs.left_gamepad),
            right_gamepad: gamepad_pose(&inputs.right_gamepad),
            floor_height: Some(self.floor_height),
        }
    }

    /// Write a pose into the input channels. The floor height is not touched.
    pub fn apply_inputs(&mut self, pose: &AvatarPose) {
        self.inputs.hmd.position = pose.hmd.position;
        self.inputs.hmd.quaternion = pose.hmd.quaternion;
        apply_gamepad(&mut self.inputs.left_gamepad, &pose.left_gamepad);
        apply_gamepad(&mut self.inputs.right_gamepad, &pose.right_gamepad);
    }

    /// Advance one animation frame from the current inputs
    pub fn update(&mut self) {
        let floor = Vec3::new(0.0, self.floor_height, 0.0);
        let hmd = self.inputs.hmd;

        let head = if self.top_enabled {
            Mat4::from_rotation_translation(hmd.quaternion, hmd.position + floor)
        } else {
            Mat4::from_translation(Vec3::new(0.0, self.height(), 0.0) + floor)
        };
        let head_position = head.w_axis.truncate();

        let hand = |index: usize, input: &GamepadInput, mirror: f32| {
            if self.hands_enabled[index] {
                Mat4::from_rotation_translation(input.quaternion, input.position + floor)
            } else {
                let rest = REST_HAND_OFFSET * Vec3::new(mirror, 1.0, 1.0);
                Mat4::from_translation(head_position + rest)
            }
        };

        let left_hand = hand(0, &self.inputs.left_gamepad, -1.0);
        let right_hand = hand(1, &self.inputs.right_gamepad, 1.0);

        self.frame = RigFrame {
            head: self.root * head,
            left_hand: self.root * left_hand,
            right_hand: self.root * right_hand,
        };
        self.frames += 1;
    }
}

fn gamepad_pose(input: &GamepadInput) -> GamepadPose {
    GamepadPose {
        position: input.position,
        quaternion: input.quaternion,
        pointer: input.pointer,
        grip: input.grip,
    }
}

fn apply_gamepad(input: &mut GamepadInput, pose: &GamepadPose) {
    input.position = pose.position;
    input.quaternion = pose.quaternion;
    input.pointer = pose.pointer;
    input.grip = pose.grip;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_rig() {
        let rig = Rig::new(None, RigOptions::default());
        assert!(rig.is_debug());
        assert_eq!(rig.height(), DEFAULT_AVATAR_HEIGHT);
        assert_eq!(rig.frames(), 0);
    }

    #[test]
    fn test_debug_option() {
        let model = AvatarModel::from_slice(
            "a.vrm",
            crate::rig::model::tests::vrm_json().as_bytes(),
        )
        .unwrap();
        let model = Arc::new(model);

        let rig = Rig::new(Some(model.clone()), RigOptions::default());
        assert!(!rig.is_debug());

        let options = RigOptions {
            debug: true,
            ..RigOptions::default()
        };
        let rig = Rig::new(Some(model), options);
        assert!(rig.is_debug());
        assert!(rig.options().debug);
    }

    #[test]
    fn test_handles_are_unique() {
        let a = Rig::new(None, RigOptions::default());
        let b = Rig::new(None, RigOptions::default());
        assert_ne!(a.handle(), b.handle());
    }

    #[test]
    fn test_pose_round_trip_through_inputs() {
        let mut rig = Rig::new(None, RigOptions::default());
        let mut pose = rig.pose();
        pose.hmd.position = Vec3::new(1.0, 1.7, -2.0);
        pose.left_gamepad.grip = 0.75;
        pose.right_gamepad.quaternion = Quat::from_xyzw(0.0, 1.0, 0.0, 0.0);
        pose.floor_height = Some(3.0);

        rig.apply_inputs(&pose);
        let back = rig.pose();
        assert_eq!(back.hmd, pose.hmd);
        assert_eq!(back.left_gamepad, pose.left_gamepad);
        assert_eq!(back.right_gamepad, pose.right_gamepad);
        // apply_inputs leaves the floor alone
        assert_eq!(back.floor_height, Some(0.0));
    }

    #[test]
    fn test_update_follows_inputs() {
        let mut rig = Rig::new(None, RigOptions::default());
        rig.inputs.right_gamepad.position = Vec3::new(0.4, 1.0, -0.3);
        rig.set_floor_height(0.5);
        rig.update();

        let hand = rig.frame().right_hand.w_axis.truncate();
        assert!((hand - Vec3::new(0.4, 1.5, -0.3)).length() < 1e-5);
        assert_eq!(rig.frames(), 1);
    }

    #[test]
    fn test_disabled_hands_rest_beside_head() {
        let mut rig = Rig::new(None, RigOptions::default());
        rig.set_hand_enabled(0, false);
        rig.set_hand_enabled(1, false);
        rig.set_hand_enabled(7, false);
        rig.inputs.left_gamepad.position = Vec3::new(10.0, 10.0, 10.0);
        rig.update();

        let head = rig.frame().head.w_axis.truncate();
        let left = rig.frame().left_hand.w_axis.truncate();
        assert!(left.x < head.x);
        assert!(left.y < head.y);
        assert!(!rig.hand_enabled(0));
        assert!(!rig.hand_enabled(7));
    }

    #[test]
    fn test_root_transform_applies() {
        let mut rig = Rig::new(None, RigOptions::default());
        rig.set_root_transform(Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)));
        rig.update();

        let head = rig.frame().head.w_axis.truncate();
        assert!((head.x - 5.0).abs() < 1e-5);
    }
}
