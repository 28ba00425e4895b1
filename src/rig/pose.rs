//! Avatar pose record and its nested-array wire format
//!
//! On the wire a pose is
//! `[[hmdPos(3), hmdQuat(4)], [leftPos(3), leftQuat(4), leftPointer, leftGrip],
//!   [rightPos(3), rightQuat(4), rightPointer, rightGrip], floorHeight?]`
//! with quaternions in x, y, z, w order. Decoding is strict: wrong arity,
//! non-numeric or non-finite entries are rejected with a [`PoseError`].

use glam::{Quat, Vec3};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use crate::error::PoseError;

/// Head-mounted display channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HmdPose {
    pub position: Vec3,
    pub quaternion: Quat,
}

impl Default for HmdPose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            quaternion: Quat::IDENTITY,
        }
    }
}

/// Hand controller channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GamepadPose {
    pub position: Vec3,
    pub quaternion: Quat,
    /// Trigger activation (0.0 - 1.0)
    pub pointer: f32,
    /// Grip activation (0.0 - 1.0)
    pub grip: f32,
}

impl Default for GamepadPose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            quaternion: Quat::IDENTITY,
            pointer: 0.0,
            grip: 0.0,
        }
    }
}

/// Full pose of one rig as exchanged between peers
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AvatarPose {
    pub hmd: HmdPose,
    pub left_gamepad: GamepadPose,
    pub right_gamepad: GamepadPose,
    /// Floor offset; required when applied to a peer rig
    pub floor_height: Option<f32>,
}

impl AvatarPose {
    /// Encode into the nested array wire form
    pub fn to_wire(&self) -> Value {
        let mut wire = vec![
            json!([self.hmd.position.to_array(), self.hmd.quaternion.to_array()]),
            gamepad_to_wire(&self.left_gamepad),
            gamepad_to_wire(&self.right_gamepad),
        ];
        if let Some(floor_height) = self.floor_height {
            wire.push(json!(floor_height));
        }
        Value::Array(wire)
    }

    /// Decode from the nested array wire form
    pub fn from_wire(value: &Value) -> Result<Self, PoseError> {
        let root = array(value, "pose", 3, 4)?;

        let hmd = array(&root[0], "pose[0]", 2, 2)?;
        let hmd = HmdPose {
            position: vec3(&hmd[0], "pose[0][0]")?,
            quaternion: quat(&hmd[1], "pose[0][1]")?,
        };

        let left_gamepad = gamepad_from_wire(&root[1], "pose[1]")?;
        let right_gamepad = gamepad_from_wire(&root[2], "pose[2]")?;

        let floor_height = match root.get(3) {
            Some(value) => Some(number(value, "pose[3]")?),
            None => None,
        };

        Ok(Self {
            hmd,
            left_gamepad,
            right_gamepad,
            floor_height,
        })
    }

    /// Parse a pose from JSON text
    pub fn from_json(s: &str) -> Result<Self, PoseError> {
        let value: Value = serde_json::from_str(s).map_err(|e| PoseError::Shape {
            path: "pose".to_string(),
            expected: format!("JSON array ({})", e),
        })?;
        Self::from_wire(&value)
    }

    /// Same pose with the floor height dropped
    pub fn without_floor_height(mut self) -> Self {
        self.floor_height = None;
        self
    }
}

impl Serialize for AvatarPose {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AvatarPose {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_wire(&value).map_err(de::Error::custom)
    }
}

fn gamepad_to_wire(pad: &GamepadPose) -> Value {
    json!([
        pad.position.to_array(),
        pad.quaternion.to_array(),
        pad.pointer,
        pad.grip,
    ])
}

fn gamepad_from_wire(value: &Value, path: &str) -> Result<GamepadPose, PoseError> {
    let pad = array(value, path, 4, 4)?;
    Ok(GamepadPose {
        position: vec3(&pad[0], &format!("{}[0]", path))?,
        quaternion: quat(&pad[1], &format!("{}[1]", path))?,
        pointer: scalar(&pad[2], &format!("{}[2]", path))?,
        grip: scalar(&pad[3], &format!("{}[3]", path))?,
    })
}

fn array<'a>(value: &'a Value, path: &str, min: usize, max: usize) -> Result<&'a [Value], PoseError> {
    let expected = || {
        if min == max {
            format!("array of {} elements", min)
        } else {
            format!("array of {} to {} elements", min, max)
        }
    };

    let items = value.as_array().ok_or_else(|| PoseError::Shape {
        path: path.to_string(),
        expected: expected(),
    })?;

    if items.len() < min || items.len() > max {
        return Err(PoseError::Shape {
            path: path.to_string(),
            expected: format!("{}, got {}", expected(), items.len()),
        });
    }

    Ok(items)
}

fn number(value: &Value, path: &str) -> Result<f32, PoseError> {
    let n = value.as_f64().ok_or_else(|| PoseError::NotANumber {
        path: path.to_string(),
    })? as f32;

    if !n.is_finite() {
        return Err(PoseError::NonFinite {
            path: path.to_string(),
        });
    }
    Ok(n)
}

/// Pointer and grip may also arrive as booleans
fn scalar(value: &Value, path: &str) -> Result<f32, PoseError> {
    match value {
        Value::Bool(pressed) => Ok(if *pressed { 1.0 } else { 0.0 }),
        _ => number(value, path),
    }
}

fn vec3(value: &Value, path: &str) -> Result<Vec3, PoseError> {
    let items = array(value, path, 3, 3)?;
    let mut out = [0.0; 3];
    for (i, item) in items.iter().enumerate() {
        out[i] = number(item, &format!("{}[{}]", path, i))?;
    }
    Ok(Vec3::from_array(out))
}

fn quat(value: &Value, path: &str) -> Result<Quat, PoseError> {
    let items = array(value, path, 4, 4)?;
    let mut out = [0.0; 4];
    for (i, item) in items.iter().enumerate() {
        out[i] = number(item, &format!("{}[{}]", path, i))?;
    }
    Ok(Quat::from_array(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_pose() -> AvatarPose {
        AvatarPose {
            hmd: HmdPose {
                position: Vec3::new(0.0, 1.6, 0.1),
                quaternion: Quat::from_xyzw(0.0, 0.38268343, 0.0, 0.9238795),
            },
            left_gamepad: GamepadPose {
                position: Vec3::new(-0.3, 1.1, -0.2),
                quaternion: Quat::IDENTITY,
                pointer: 0.5,
                grip: 1.0,
            },
            right_gamepad: GamepadPose {
                position: Vec3::new(0.3, 1.1, -0.2),
                quaternion: Quat::from_xyzw(0.5, 0.5, 0.5, 0.5),
                pointer: 0.0,
                grip: 0.25,
            },
            floor_height: Some(-0.05),
        }
    }

    #[test]
    fn test_wire_shape() {
        let wire = sample_pose().to_wire();
        let root = wire.as_array().unwrap();
        assert_eq!(root.len(), 4);
        assert_eq!(root[0].as_array().unwrap().len(), 2);
        assert_eq!(root[1].as_array().unwrap().len(), 4);
        assert_eq!(root[2].as_array().unwrap().len(), 4);
        assert_eq!(root[0][1].as_array().unwrap().len(), 4);

        let without_floor = sample_pose().without_floor_height().to_wire();
        assert_eq!(without_floor.as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_boolean_triggers() {
        let wire = json!([
            [[0, 1.5, 0], [0, 0, 0, 1]],
            [[0, 0, 0], [0, 0, 0, 1], true, false],
            [[0, 0, 0], [0, 0, 0, 1], false, true]
        ]);

        let pose = AvatarPose::from_wire(&wire).unwrap();
        assert_eq!(pose.left_gamepad.pointer, 1.0);
        assert_eq!(pose.left_gamepad.grip, 0.0);
        assert_eq!(pose.right_gamepad.grip, 1.0);
        assert_eq!(pose.floor_height, None);
    }

    #[test]
    fn test_rejects_malformed() {
        // Too few top-level entries
        let err = AvatarPose::from_wire(&json!([[[0, 0, 0], [0, 0, 0, 1]]])).unwrap_err();
        assert!(matches!(err, PoseError::Shape { ref path, .. } if path == "pose"));

        // Short position vector
        let err = AvatarPose::from_wire(&json!([
            [[0, 0], [0, 0, 0, 1]],
            [[0, 0, 0], [0, 0, 0, 1], 0, 0],
            [[0, 0, 0], [0, 0, 0, 1], 0, 0]
        ]))
        .unwrap_err();
        assert!(matches!(err, PoseError::Shape { ref path, .. } if path == "pose[0][0]"));

        // String where a number belongs
        let err = AvatarPose::from_wire(&json!([
            [[0, 0, 0], [0, 0, 0, 1]],
            [[0, "x", 0], [0, 0, 0, 1], 0, 0],
            [[0, 0, 0], [0, 0, 0, 1], 0, 0]
        ]))
        .unwrap_err();
        assert_eq!(
            err,
            PoseError::NotANumber {
                path: "pose[1][0][1]".to_string()
            }
        );

        // Trailing garbage after the floor height
        let err = AvatarPose::from_wire(&json!([
            [[0, 0, 0], [0, 0, 0, 1]],
            [[0, 0, 0], [0, 0, 0, 1], 0, 0],
            [[0, 0, 0], [0, 0, 0, 1], 0, 0],
            0.0,
            1.0
        ]))
        .unwrap_err();
        assert!(matches!(err, PoseError::Shape { .. }));

        // Not an array at all
        assert!(AvatarPose::from_json("{\"hmd\": 1}").is_err());
        assert!(AvatarPose::from_json("not json").is_err());
    }

    #[test]
    fn test_serde_uses_wire_form() {
        let pose = sample_pose();
        let text = serde_json::to_string(&pose).unwrap();
        assert!(text.starts_with("[[["));

        let back: AvatarPose = serde_json::from_str(&text).unwrap();
        assert_eq!(back, pose);

        let err = serde_json::from_str::<AvatarPose>("[1, 2, 3]").unwrap_err();
        assert!(err.to_string().contains("Malformed pose"));
    }

    fn finite() -> impl Strategy<Value = f32> {
        -1000.0f32..1000.0
    }

    prop_compose! {
        fn gamepad()(
            p in prop::array::uniform3(finite()),
            q in prop::array::uniform4(-1.0f32..1.0),
            pointer in 0.0f32..1.0,
            grip in 0.0f32..1.0,
        ) -> GamepadPose {
            GamepadPose {
                position: Vec3::from_array(p),
                quaternion: Quat::from_array(q),
                pointer,
                grip,
            }
        }
    }

    prop_compose! {
        fn pose()(
            hp in prop::array::uniform3(finite()),
            hq in prop::array::uniform4(-1.0f32..1.0),
            left in gamepad(),
            right in gamepad(),
            floor in prop::option::of(finite()),
        ) -> AvatarPose {
            AvatarPose {
                hmd: HmdPose {
                    position: Vec3::from_array(hp),
                    quaternion: Quat::from_array(hq),
                },
                left_gamepad: left,
                right_gamepad: right,
                floor_height: floor,
            }
        }
    }

    proptest! {
        #[test]
        fn prop_json_round_trip(pose in pose()) {
            let text = serde_json::to_string(&pose).unwrap();
            let back = AvatarPose::from_json(&text).unwrap();
            prop_assert_eq!(back, pose);
        }
    }
}
