//! Physics components for ECS entities.

use crate::physics::BodyHandle;

/// Links an entity to a body owned by the physics world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysicsBody(pub BodyHandle);

impl PhysicsBody {
    pub fn handle(&self) -> BodyHandle {
        self.0
    }
}
