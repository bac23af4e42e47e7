//! ECS systems.

pub mod physics;

pub use physics::{despawn_body, spawn_body, sync_transforms};
