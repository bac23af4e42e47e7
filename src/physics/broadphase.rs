//! Broad test over collision primitives using AABB overlap.

use glam::Mat4;

use super::body_set::{BodyHandle, BodySet};
use super::collider::{CollisionPrimitive, CollisionPrimitiveId, CollisionShape, PhysicsAabb};

/// A primitive placed in the world for one step.
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveProxy {
    pub id: CollisionPrimitiveId,
    pub body: Option<BodyHandle>,
    pub shape: CollisionShape,
    pub transform: Mat4,
    /// `None` for unbounded shapes.
    pub aabb: Option<PhysicsAabb>,
    pub friction: f32,
    pub restitution: f32,
    /// Attached to an awake, movable body.
    pub active: bool,
}

impl PrimitiveProxy {
    /// Place a primitive using its body's current transform.
    ///
    /// Returns `None` if the primitive references a body that no longer exists.
    pub fn new(
        id: CollisionPrimitiveId,
        primitive: &CollisionPrimitive,
        bodies: &BodySet,
    ) -> Option<Self> {
        let (body_transform, active) = match primitive.body {
            Some(handle) => {
                let body = bodies.get(handle)?;
                (body.transform(), body.is_awake() && !body.is_static())
            }
            None => (Mat4::IDENTITY, false),
        };
        let transform = primitive.world_transform(body_transform);

        Some(Self {
            id,
            body: primitive.body,
            shape: primitive.shape,
            transform,
            aabb: primitive.shape.compute_aabb(transform),
            friction: primitive.friction,
            restitution: primitive.restitution,
            active,
        })
    }
}

/// Brute-force pairwise AABB test.
#[derive(Debug, Clone, Copy, Default)]
pub struct BroadPhase;

impl BroadPhase {
    pub fn new() -> Self {
        Self
    }

    /// Find all index pairs of proxies that may touch, in index order.
    ///
    /// Pairs where neither side is active, or where both sides belong to the
    /// same body, are skipped. Unbounded shapes pair with everything.
    pub fn find_pairs(&self, proxies: &[PrimitiveProxy]) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();

        for i in 0..proxies.len() {
            for j in (i + 1)..proxies.len() {
                let a = &proxies[i];
                let b = &proxies[j];

                if !a.active && !b.active {
                    continue;
                }
                if a.body.is_some() && a.body == b.body {
                    continue;
                }

                let overlapping = match (&a.aabb, &b.aabb) {
                    (Some(aabb_a), Some(aabb_b)) => aabb_a.overlaps(aabb_b),
                    _ => true,
                };
                if overlapping {
                    pairs.push((i, j));
                }
            }
        }

        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::rigid_body::RigidBodyDesc;
    use glam::Vec3;

    fn proxies(bodies: &BodySet, primitives: &[CollisionPrimitive]) -> Vec<PrimitiveProxy> {
        primitives
            .iter()
            .enumerate()
            .filter_map(|(i, p)| PrimitiveProxy::new(CollisionPrimitiveId(i as u64), p, bodies))
            .collect()
    }

    fn sphere_body(bodies: &mut BodySet, x: f32) -> BodyHandle {
        bodies.insert(
            RigidBodyDesc::sphere(1.0, 1.0)
                .with_position(Vec3::new(x, 0.0, 0.0))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_broadphase_overlapping() {
        let mut bodies = BodySet::new();
        let a = sphere_body(&mut bodies, 0.0);
        let b = sphere_body(&mut bodies, 1.0);
        let list = proxies(
            &bodies,
            &[CollisionPrimitive::sphere(a, 1.0), CollisionPrimitive::sphere(b, 1.0)],
        );

        assert_eq!(BroadPhase::new().find_pairs(&list), vec![(0, 1)]);
    }

    #[test]
    fn test_broadphase_no_overlap() {
        let mut bodies = BodySet::new();
        let a = sphere_body(&mut bodies, 0.0);
        let b = sphere_body(&mut bodies, 10.0);
        let list = proxies(
            &bodies,
            &[CollisionPrimitive::sphere(a, 0.5), CollisionPrimitive::sphere(b, 0.5)],
        );

        assert!(BroadPhase::new().find_pairs(&list).is_empty());
    }

    #[test]
    fn test_broadphase_inactive_pairs_skipped() {
        let mut bodies = BodySet::new();
        let ground = bodies.insert(RigidBodyDesc::fixed().build().unwrap());
        let sleeper = sphere_body(&mut bodies, 0.0);
        bodies.get_mut(sleeper).unwrap().set_awake(false);

        let list = proxies(
            &bodies,
            &[
                CollisionPrimitive::half_space(Vec3::Y, 0.0),
                CollisionPrimitive::cuboid(ground, Vec3::splat(5.0)),
                CollisionPrimitive::sphere(sleeper, 1.0),
            ],
        );

        assert!(BroadPhase::new().find_pairs(&list).is_empty());

        bodies.get_mut(sleeper).unwrap().set_awake(true);
        let list = proxies(
            &bodies,
            &[
                CollisionPrimitive::half_space(Vec3::Y, 0.0),
                CollisionPrimitive::cuboid(ground, Vec3::splat(5.0)),
                CollisionPrimitive::sphere(sleeper, 1.0),
            ],
        );
        assert_eq!(BroadPhase::new().find_pairs(&list), vec![(0, 2), (1, 2)]);
    }

    #[test]
    fn test_broadphase_same_body_skipped() {
        let mut bodies = BodySet::new();
        let a = sphere_body(&mut bodies, 0.0);
        let list = proxies(
            &bodies,
            &[
                CollisionPrimitive::sphere(a, 1.0),
                CollisionPrimitive::sphere(a, 1.0).with_offset(Vec3::X * 0.5),
            ],
        );

        assert!(BroadPhase::new().find_pairs(&list).is_empty());
    }

    #[test]
    fn test_stale_body_has_no_proxy() {
        let mut bodies = BodySet::new();
        let a = sphere_body(&mut bodies, 0.0);
        let primitive = CollisionPrimitive::sphere(a, 1.0);
        bodies.remove(a);

        assert!(PrimitiveProxy::new(CollisionPrimitiveId(0), &primitive, &bodies).is_none());
    }
}
