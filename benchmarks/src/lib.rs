//! Scene builders shared by the physics benchmarks.

use glam::{Quat, Vec3};
use rein_physics::physics::{BodySet, CollisionPrimitive, Contact, PhysicsConfig, PhysicsWorld};
use rein_physics::RigidBodyDesc;

/// `n` spheres dropped in a loose grid above a ground plane.
pub fn setup_sphere_world(n: usize) -> PhysicsWorld {
    let mut physics = PhysicsWorld::new(PhysicsConfig {
        max_contacts: n * 4,
        ..Default::default()
    });
    physics.add_collision_primitive(CollisionPrimitive::half_space(Vec3::Y, 0.0));

    let side = (n as f32).cbrt().ceil() as usize;
    for i in 0..n {
        let x = (i % side) as f32 * 1.5;
        let z = ((i / side) % side) as f32 * 1.5;
        let y = (i / (side * side)) as f32 * 1.5 + 0.5;
        let Ok(body) = physics.add_rigid_body(
            RigidBodyDesc::sphere(1.0, 0.5).with_position(Vec3::new(x, y, z)),
        ) else {
            continue;
        };
        physics.add_collision_primitive(CollisionPrimitive::sphere(body, 0.5));
    }
    physics
}

/// Alternating boxes and spheres, slightly rotated, resting near the ground.
pub fn setup_mixed_world(n: usize) -> PhysicsWorld {
    let mut physics = PhysicsWorld::new(PhysicsConfig {
        max_contacts: n * 8,
        ..Default::default()
    });
    physics.add_collision_primitive(CollisionPrimitive::half_space(Vec3::Y, 0.0));

    let side = (n as f32).sqrt().ceil() as usize;
    for i in 0..n {
        let position = Vec3::new((i % side) as f32 * 1.2, 0.45, (i / side) as f32 * 1.2);
        let desc = if i % 2 == 0 {
            RigidBodyDesc::cuboid(1.0, Vec3::splat(0.5))
                .with_orientation(Quat::from_rotation_y(i as f32 * 0.1))
        } else {
            RigidBodyDesc::sphere(1.0, 0.5)
        };
        let Ok(body) = physics.add_rigid_body(desc.with_position(position)) else {
            continue;
        };
        let primitive = if i % 2 == 0 {
            CollisionPrimitive::cuboid(body, Vec3::splat(0.5))
        } else {
            CollisionPrimitive::sphere(body, 0.5)
        };
        physics.add_collision_primitive(primitive);
    }
    physics
}

/// A column of `n` unit spheres, each contact shared with its neighbours.
///
/// Returns the bodies and one contact per touching pair plus one for the ground.
pub fn setup_stack_contacts(n: usize) -> (BodySet, Vec<Contact>) {
    let mut bodies = BodySet::new();
    let mut handles = Vec::with_capacity(n);
    for i in 0..n {
        let Ok(body) = RigidBodyDesc::sphere(1.0, 0.5)
            .with_position(Vec3::new(0.0, 0.45 + i as f32 * 0.95, 0.0))
            .with_linear_velocity(Vec3::new(0.0, -1.0, 0.0))
            .build()
        else {
            continue;
        };
        handles.push(bodies.insert(body));
    }

    let mut contacts = Vec::with_capacity(handles.len());
    if let Some(&bottom) = handles.first() {
        contacts.push(
            Contact::new(Vec3::new(0.0, -0.025, 0.0), Vec3::Y, 0.05)
                .with_bodies(Some(bottom), None, 0.6, 0.1),
        );
    }
    for (i, pair) in handles.windows(2).enumerate() {
        let y = 0.45 + i as f32 * 0.95 + 0.475;
        contacts.push(
            Contact::new(Vec3::new(0.0, y, 0.0), Vec3::Y, 0.05)
                .with_bodies(Some(pair[1]), Some(pair[0]), 0.6, 0.1),
        );
    }
    (bodies, contacts)
}
