//! Rein Physics
//!
//! Impulse-based rigid body simulation for the rein engine.
//!
//! # Architecture
//!
//! The library is organized into layers:
//!
//! 1. **physics::rigid_body** - Body state, integration, force accumulation
//! 2. **physics::force** - Force generators and their registry
//! 3. **physics::contact** - Contact basis, impulse and position correction
//! 4. **physics::solver** - Iterative worst-first contact resolver
//! 5. **physics::collider / broadphase / narrowphase** - Built-in contact generation
//! 6. **physics** - `PhysicsWorld`, which owns everything and drives a step
//! 7. **ecs** - hecs integration for pose synchronization (feature = "ecs")

pub mod error;
pub mod physics;

#[cfg(feature = "ecs")]
pub mod ecs;

// Re-export commonly used types
pub use error::BodyError;

pub use physics::{
    ApplicationPoint, BodyHandle, BodyPose, CollisionPrimitive, CollisionPrimitiveId,
    CollisionShape, Contact, ContactResolver, ForceGenerator, ForceGeneratorId, Gravity,
    ImpulseGenerator, PhysicsConfig, PhysicsWorld, ResolverConfig, RigidBody, RigidBodyDesc,
    StepStats,
};

#[cfg(feature = "ecs")]
pub use ecs::{despawn_body, spawn_body, sync_transforms, GlobalTransform, PhysicsBody, Transform};

// Re-export glam for convenience
pub use glam;
