//! Errors surfaced by the physics world.

use thiserror::Error;

/// Reasons a body creation request is rejected.
///
/// Nothing is inserted into the world when one of these is returned.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum BodyError {
    #[error("mass must be positive, got {0}")]
    NegativeMass(f32),
    #[error("mass of zero is not representable; use an inverse mass of zero for immovable bodies")]
    ZeroMass,
    #[error("mass data is not finite")]
    NonFiniteMass,
    #[error("inverse mass must be non-negative, got {0}")]
    NegativeInverseMass(f32),
    #[error("inertia tensor is singular (determinant {0})")]
    SingularInertia(f32),
    #[error("inertia tensor contains non-finite values")]
    NonFiniteInertia,
    #[error("{name} damping must lie in [0, 1], got {value}")]
    InvalidDamping { name: &'static str, value: f32 },
    #[error("initial pose or velocity contains non-finite values")]
    NonFinitePose,
    #[error("orientation quaternion has zero length")]
    DegenerateOrientation,
}
