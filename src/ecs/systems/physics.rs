//! Pose synchronization between the physics world and ECS entities.

use crate::ecs::components::{GlobalTransform, PhysicsBody, Transform};
use crate::error::BodyError;
use crate::physics::{PhysicsWorld, RigidBody, RigidBodyDesc};

/// Create a body and an entity carrying its handle and transforms.
///
/// Nothing is spawned if the body description is rejected.
pub fn spawn_body(
    world: &mut hecs::World,
    physics: &mut PhysicsWorld,
    desc: RigidBodyDesc,
) -> Result<hecs::Entity, BodyError> {
    let handle = physics.add_rigid_body(desc)?;
    let transform = match physics.pose(handle) {
        Some(pose) => Transform::from_pose(pose),
        None => Transform::identity(),
    };
    Ok(world.spawn((
        transform,
        GlobalTransform(transform.to_matrix()),
        PhysicsBody(handle),
    )))
}

/// Copy every body pose into its entity's transforms.
///
/// Run after stepping. Entities whose body no longer exists are left
/// untouched. Returns the number of entities updated.
pub fn sync_transforms(physics: &PhysicsWorld, world: &mut hecs::World) -> usize {
    let mut synced = 0;
    for (_, (body, transform, global)) in
        world.query_mut::<(&PhysicsBody, &mut Transform, Option<&mut GlobalTransform>)>()
    {
        let Some(pose) = physics.pose(body.0) else {
            continue;
        };
        transform.set_pose(pose);
        if let Some(global) = global {
            global.0 = transform.to_matrix();
        }
        synced += 1;
    }
    synced
}

/// Despawn an entity and remove its body from the physics world.
///
/// Returns the removed body, or `None` if the entity had no live body.
pub fn despawn_body(
    world: &mut hecs::World,
    physics: &mut PhysicsWorld,
    entity: hecs::Entity,
) -> Option<RigidBody> {
    let handle = world.get::<&PhysicsBody>(entity).ok().map(|b| b.0)?;
    if world.despawn(entity).is_err() {
        return None;
    }
    physics.remove_rigid_body(handle)
}
