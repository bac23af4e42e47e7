//! Entity Component System integration with hecs.
//!
//! Physics bodies live in the [`PhysicsWorld`](crate::physics::PhysicsWorld);
//! entities only carry a [`PhysicsBody`] handle and the transforms the rest of
//! the engine reads.

pub mod components;
pub mod systems;

pub use components::{GlobalTransform, PhysicsBody, Transform};
pub use systems::{despawn_body, spawn_body, sync_transforms};

pub mod prelude {
    pub use super::components::*;
    pub use super::systems::{despawn_body, spawn_body, sync_transforms};
}
