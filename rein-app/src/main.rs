use glam::{Quat, Vec3};
use rein_physics::ecs::{spawn_body, sync_transforms, PhysicsBody, Transform};
use rein_physics::physics::{CollisionPrimitive, PhysicsConfig, PhysicsWorld};
use rein_physics::RigidBodyDesc;

const FRAME_TIME: f64 = 1.0 / 60.0;
const FRAMES: u32 = 300;

/// Drops a few boxes and spheres onto the ground and logs where they land.
fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut world = hecs::World::new();
    let mut physics = PhysicsWorld::new(PhysicsConfig::default());

    // Ground
    physics.add_collision_primitive(CollisionPrimitive::half_space(Vec3::Y, 0.0));

    for i in 0..4 {
        let x = i as f32 * 1.5 - 2.25;
        let crate_box = spawn_body(
            &mut world,
            &mut physics,
            RigidBodyDesc::cuboid(2.0, Vec3::splat(0.5))
                .with_position(Vec3::new(x, 3.0 + i as f32, 0.0))
                .with_orientation(Quat::from_rotation_z(0.3 * i as f32)),
        )?;
        let handle = world.get::<&PhysicsBody>(crate_box)?.handle();
        physics.add_collision_primitive(CollisionPrimitive::cuboid(handle, Vec3::splat(0.5)));

        let ball = spawn_body(
            &mut world,
            &mut physics,
            RigidBodyDesc::sphere(1.0, 0.4).with_position(Vec3::new(x, 6.0 + i as f32, 0.2)),
        )?;
        let handle = world.get::<&PhysicsBody>(ball)?.handle();
        physics.add_collision_primitive(
            CollisionPrimitive::sphere(handle, 0.4).with_material(0.4, 0.5),
        );
    }

    for frame in 0..FRAMES {
        physics.step(FRAME_TIME);
        sync_transforms(&physics, &mut world);

        if frame % 60 == 0 {
            let stats = physics.last_step();
            log::info!(
                "frame {frame}: {} contacts, {} velocity / {} position iterations",
                stats.contacts,
                stats.velocity_iterations,
                stats.position_iterations
            );
        }
    }

    for (entity, (body, transform)) in world.query::<(&PhysicsBody, &Transform)>().iter() {
        let awake = physics.body(body.handle()).is_some_and(|b| b.is_awake());
        log::info!(
            "{entity:?} rests at ({:.2}, {:.2}, {:.2}) awake={awake}",
            transform.position.x,
            transform.position.y,
            transform.position.z
        );
    }
    Ok(())
}
