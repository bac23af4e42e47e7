//! Collision primitives attached to bodies, and their bounds.

use glam::{Mat4, Vec3};

use super::body_set::BodyHandle;

/// Default friction coefficient of a new primitive.
pub const DEFAULT_FRICTION: f32 = 0.6;
/// Default restitution of a new primitive.
pub const DEFAULT_RESTITUTION: f32 = 0.1;

/// Axis-aligned bounding box for the broad test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsAabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl PhysicsAabb {
    /// Test whether two AABBs overlap.
    #[inline]
    pub fn overlaps(&self, other: &PhysicsAabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }
}

/// Geometry of a collision primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CollisionShape {
    Sphere { radius: f32 },
    Cuboid { half_extents: Vec3 },
    /// The set of points `p` with `normal.dot(p) <= offset`. Always world-fixed.
    HalfSpace { normal: Vec3, offset: f32 },
}

impl CollisionShape {
    /// Compute the world-space AABB. Half-spaces are unbounded and return `None`.
    pub fn compute_aabb(&self, transform: Mat4) -> Option<PhysicsAabb> {
        match *self {
            CollisionShape::Sphere { radius } => {
                let center = transform.transform_point3(Vec3::ZERO);
                Some(PhysicsAabb {
                    min: center - Vec3::splat(radius),
                    max: center + Vec3::splat(radius),
                })
            }
            CollisionShape::Cuboid { half_extents } => {
                Some(aabb_from_extents(half_extents, transform))
            }
            CollisionShape::HalfSpace { .. } => None,
        }
    }
}

/// Stable identifier of a primitive registered with the world. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollisionPrimitiveId(pub(crate) u64);

impl CollisionPrimitiveId {
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// A shape attached to a body (or to the world when `body` is `None`).
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionPrimitive {
    pub body: Option<BodyHandle>,
    pub shape: CollisionShape,
    /// Translation from the body origin, in body space.
    pub offset: Vec3,
    pub friction: f32,
    pub restitution: f32,
}

impl CollisionPrimitive {
    pub fn new(body: Option<BodyHandle>, shape: CollisionShape) -> Self {
        Self {
            body,
            shape,
            offset: Vec3::ZERO,
            friction: DEFAULT_FRICTION,
            restitution: DEFAULT_RESTITUTION,
        }
    }

    pub fn sphere(body: BodyHandle, radius: f32) -> Self {
        Self::new(Some(body), CollisionShape::Sphere { radius })
    }

    pub fn cuboid(body: BodyHandle, half_extents: Vec3) -> Self {
        Self::new(Some(body), CollisionShape::Cuboid { half_extents })
    }

    /// A world-fixed half-space. The normal is normalized.
    pub fn half_space(normal: Vec3, offset: f32) -> Self {
        Self::new(
            None,
            CollisionShape::HalfSpace {
                normal: normal.normalize_or_zero(),
                offset,
            },
        )
    }

    pub fn with_offset(mut self, offset: Vec3) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_material(mut self, friction: f32, restitution: f32) -> Self {
        self.friction = friction;
        self.restitution = restitution;
        self
    }

    /// World transform of the primitive given its body's transform.
    pub fn world_transform(&self, body_transform: Mat4) -> Mat4 {
        if self.offset == Vec3::ZERO {
            body_transform
        } else {
            body_transform * Mat4::from_translation(self.offset)
        }
    }
}

/// Compute world-space AABB from local half-extents and a transform matrix.
#[inline]
fn aabb_from_extents(half_extents: Vec3, mat: Mat4) -> PhysicsAabb {
    let center = mat.transform_point3(Vec3::ZERO);

    // For each world axis, project the local box axes.
    let extent = mat.x_axis.truncate().abs() * half_extents.x
        + mat.y_axis.truncate().abs() * half_extents.y
        + mat.z_axis.truncate().abs() * half_extents.z;

    PhysicsAabb {
        min: center - extent,
        max: center + extent,
    }
}
