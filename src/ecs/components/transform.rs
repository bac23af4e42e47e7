//! Transform components for ECS entities.

use glam::{Mat4, Quat, Vec3};

use crate::physics::BodyPose;

/// Local-space transform. Stores position, rotation, and scale separately.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    /// Create an identity transform.
    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    /// Create a transform from a position.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::identity()
        }
    }

    /// Create a unit-scale transform from a body pose.
    pub fn from_pose(pose: BodyPose) -> Self {
        Self {
            position: pose.position,
            rotation: pose.orientation,
            scale: Vec3::ONE,
        }
    }

    /// Copy position and rotation from a body pose, keeping the scale.
    pub fn set_pose(&mut self, pose: BodyPose) {
        self.position = pose.position;
        self.rotation = pose.orientation;
    }

    /// Convert to a 4x4 matrix (translation * rotation * scale).
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

/// World-space transform matrix, refreshed by [`sync_transforms`](crate::ecs::sync_transforms).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalTransform(pub Mat4);

impl Default for GlobalTransform {
    fn default() -> Self {
        Self(Mat4::IDENTITY)
    }
}
