//! Built-in contact generation for spheres, cuboids and half-spaces.
//!
//! Every generated contact follows the resolver's convention: the normal
//! points from body 1 toward body 0. World-fixed primitives always end up as
//! body 1.

use glam::Vec3;

use super::broadphase::PrimitiveProxy;
use super::collider::CollisionShape;
use super::contact::Contact;

/// Distances below this are treated as coincident points.
const COINCIDENT_EPSILON: f32 = 1e-6;

/// Fixed-capacity contact storage for one step.
///
/// Contacts past the capacity are dropped and counted, never reallocated.
#[derive(Debug, Clone)]
pub struct ContactBuffer {
    contacts: Vec<Contact>,
    capacity: usize,
    dropped: usize,
}

impl ContactBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            contacts: Vec::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.contacts.len() >= self.capacity
    }

    /// Contacts rejected since the last clear.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Store a contact. Returns false if the buffer is full.
    pub fn push(&mut self, contact: Contact) -> bool {
        if self.is_full() {
            self.dropped += 1;
            return false;
        }
        self.contacts.push(contact);
        true
    }

    pub fn clear(&mut self) {
        self.contacts.clear();
        self.dropped = 0;
    }

    pub fn as_slice(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn as_mut_slice(&mut self) -> &mut [Contact] {
        &mut self.contacts
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.iter()
    }
}

/// Build a contact between two proxies with their mean material.
fn make_contact(
    first: &PrimitiveProxy,
    second: &PrimitiveProxy,
    point: Vec3,
    normal: Vec3,
    penetration: f32,
) -> Contact {
    Contact::new(point, normal, penetration).with_bodies(
        first.body,
        second.body,
        (first.friction + second.friction) * 0.5,
        (first.restitution + second.restitution) * 0.5,
    )
}

fn center(proxy: &PrimitiveProxy) -> Vec3 {
    proxy.transform.transform_point3(Vec3::ZERO)
}

/// Sphere-sphere test. Returns the number of contacts written.
pub fn sphere_sphere(
    one: &PrimitiveProxy,
    two: &PrimitiveProxy,
    buffer: &mut ContactBuffer,
) -> usize {
    let (
        CollisionShape::Sphere { radius: radius_one },
        CollisionShape::Sphere { radius: radius_two },
    ) = (one.shape, two.shape)
    else {
        return 0;
    };

    let position_one = center(one);
    let position_two = center(two);
    let midline = position_one - position_two;
    let size = midline.length();

    if size <= COINCIDENT_EPSILON || size >= radius_one + radius_two {
        return 0;
    }

    let normal = midline / size;
    let contact = make_contact(
        one,
        two,
        position_two + midline * 0.5,
        normal,
        radius_one + radius_two - size,
    );
    usize::from(buffer.push(contact))
}

/// Sphere against a world-fixed half-space.
pub fn sphere_half_space(
    sphere: &PrimitiveProxy,
    plane: &PrimitiveProxy,
    buffer: &mut ContactBuffer,
) -> usize {
    let (CollisionShape::Sphere { radius }, CollisionShape::HalfSpace { normal, offset }) =
        (sphere.shape, plane.shape)
    else {
        return 0;
    };

    let position = center(sphere);
    let distance = normal.dot(position) - radius - offset;
    if distance >= 0.0 {
        return 0;
    }

    let point = position - normal * (distance + radius);
    usize::from(buffer.push(make_contact(sphere, plane, point, normal, -distance)))
}

/// Cuboid against a world-fixed half-space: one contact per vertex below the plane.
pub fn cuboid_half_space(
    cuboid: &PrimitiveProxy,
    plane: &PrimitiveProxy,
    buffer: &mut ContactBuffer,
) -> usize {
    let (CollisionShape::Cuboid { half_extents }, CollisionShape::HalfSpace { normal, offset }) =
        (cuboid.shape, plane.shape)
    else {
        return 0;
    };

    let mut written = 0;
    for sx in [-1.0, 1.0] {
        for sy in [-1.0, 1.0] {
            for sz in [-1.0, 1.0] {
                let vertex = cuboid
                    .transform
                    .transform_point3(half_extents * Vec3::new(sx, sy, sz));
                let distance = vertex.dot(normal);
                if distance > offset {
                    continue;
                }

                let penetration = offset - distance;
                // Halfway between the vertex and the plane.
                let point = vertex + normal * (penetration * 0.5);
                if buffer.push(make_contact(cuboid, plane, point, normal, penetration)) {
                    written += 1;
                }
            }
        }
    }
    written
}

/// Cuboid against sphere. The cuboid is body 0.
pub fn cuboid_sphere(
    cuboid: &PrimitiveProxy,
    sphere: &PrimitiveProxy,
    buffer: &mut ContactBuffer,
) -> usize {
    let (CollisionShape::Cuboid { half_extents }, CollisionShape::Sphere { radius }) =
        (cuboid.shape, sphere.shape)
    else {
        return 0;
    };

    let sphere_center = center(sphere);
    let relative_center = cuboid.transform.inverse().transform_point3(sphere_center);

    // Early out along each box axis.
    if (relative_center.abs() - Vec3::splat(radius))
        .cmpgt(half_extents)
        .any()
    {
        return 0;
    }

    let closest = relative_center.clamp(-half_extents, half_extents);
    let distance_squared = (closest - relative_center).length_squared();
    if distance_squared > radius * radius {
        return 0;
    }

    let contact = if distance_squared > COINCIDENT_EPSILON * COINCIDENT_EPSILON {
        let closest_world = cuboid.transform.transform_point3(closest);
        let normal = (closest_world - sphere_center).normalize();
        make_contact(
            cuboid,
            sphere,
            closest_world,
            normal,
            radius - distance_squared.sqrt(),
        )
    } else {
        // Centre inside the box: push out through the nearest face.
        let depth = half_extents - relative_center.abs();
        let axis = if depth.x <= depth.y && depth.x <= depth.z {
            0
        } else if depth.y <= depth.z {
            1
        } else {
            2
        };
        let mut face = Vec3::ZERO;
        face[axis] = if relative_center[axis] >= 0.0 { 1.0 } else { -1.0 };
        let outward = cuboid.transform.transform_vector3(face).normalize();
        make_contact(cuboid, sphere, sphere_center, -outward, radius + depth[axis])
    };
    usize::from(buffer.push(contact))
}

/// Dispatch on the shape pair. Pairs without a built-in test write nothing.
pub fn detect_collision(
    a: &PrimitiveProxy,
    b: &PrimitiveProxy,
    buffer: &mut ContactBuffer,
) -> usize {
    use CollisionShape::*;

    match (&a.shape, &b.shape) {
        (Sphere { .. }, Sphere { .. }) => sphere_sphere(a, b, buffer),
        (Sphere { .. }, HalfSpace { .. }) => sphere_half_space(a, b, buffer),
        (HalfSpace { .. }, Sphere { .. }) => sphere_half_space(b, a, buffer),
        (Cuboid { .. }, HalfSpace { .. }) => cuboid_half_space(a, b, buffer),
        (HalfSpace { .. }, Cuboid { .. }) => cuboid_half_space(b, a, buffer),
        (Cuboid { .. }, Sphere { .. }) => cuboid_sphere(a, b, buffer),
        (Sphere { .. }, Cuboid { .. }) => cuboid_sphere(b, a, buffer),
        (Cuboid { .. }, Cuboid { .. }) | (HalfSpace { .. }, HalfSpace { .. }) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::body_set::{BodyHandle, BodySet};
    use crate::physics::collider::{CollisionPrimitive, CollisionPrimitiveId};
    use crate::physics::rigid_body::RigidBodyDesc;
    use glam::Quat;

    fn body(bodies: &mut BodySet, position: Vec3, orientation: Quat) -> BodyHandle {
        bodies.insert(
            RigidBodyDesc::sphere(1.0, 1.0)
                .with_position(position)
                .with_orientation(orientation)
                .build()
                .unwrap(),
        )
    }

    fn proxy(bodies: &BodySet, primitive: CollisionPrimitive) -> PrimitiveProxy {
        PrimitiveProxy::new(CollisionPrimitiveId(0), &primitive, bodies).unwrap()
    }

    fn ground() -> CollisionPrimitive {
        CollisionPrimitive::half_space(Vec3::Y, 0.0)
    }

    #[test]
    fn test_sphere_sphere_intersection() {
        let mut bodies = BodySet::new();
        let a = body(&mut bodies, Vec3::ZERO, Quat::IDENTITY);
        let b = body(&mut bodies, Vec3::new(1.5, 0.0, 0.0), Quat::IDENTITY);
        let pa = proxy(&bodies, CollisionPrimitive::sphere(a, 1.0).with_material(0.2, 0.4));
        let pb = proxy(&bodies, CollisionPrimitive::sphere(b, 1.0).with_material(0.6, 0.0));
        let mut buffer = ContactBuffer::new(8);

        assert_eq!(sphere_sphere(&pa, &pb, &mut buffer), 1);

        let contact = &buffer.as_slice()[0];
        let eps = 1e-4;
        // Body 0 is `a`, which separates by moving toward -x.
        assert_eq!(contact.bodies, [Some(a), Some(b)]);
        assert!((contact.normal - Vec3::NEG_X).length() < eps);
        assert!((contact.penetration - 0.5).abs() < eps);
        assert!((contact.point - Vec3::new(0.75, 0.0, 0.0)).length() < eps);
        assert!((contact.friction - 0.4).abs() < eps);
        assert!((contact.restitution - 0.2).abs() < eps);
    }

    #[test]
    fn test_sphere_sphere_no_intersection() {
        let mut bodies = BodySet::new();
        let a = body(&mut bodies, Vec3::ZERO, Quat::IDENTITY);
        let b = body(&mut bodies, Vec3::new(3.0, 0.0, 0.0), Quat::IDENTITY);
        let mut buffer = ContactBuffer::new(8);

        let written = sphere_sphere(
            &proxy(&bodies, CollisionPrimitive::sphere(a, 1.0)),
            &proxy(&bodies, CollisionPrimitive::sphere(b, 1.0)),
            &mut buffer,
        );
        assert_eq!(written, 0);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_sphere_half_space() {
        let mut bodies = BodySet::new();
        let s = body(&mut bodies, Vec3::new(2.0, 0.75, 0.0), Quat::IDENTITY);
        let mut buffer = ContactBuffer::new(8);

        // Plane first: the sphere still becomes body 0.
        let written = detect_collision(
            &proxy(&bodies, ground()),
            &proxy(&bodies, CollisionPrimitive::sphere(s, 1.0)),
            &mut buffer,
        );
        assert_eq!(written, 1);

        let contact = &buffer.as_slice()[0];
        let eps = 1e-5;
        assert_eq!(contact.bodies, [Some(s), None]);
        assert_eq!(contact.normal, Vec3::Y);
        assert!((contact.penetration - 0.25).abs() < eps);
        assert!((contact.point - Vec3::new(2.0, 0.0, 0.0)).length() < eps);
    }

    #[test]
    fn test_flat_cuboid_on_half_space() {
        let mut bodies = BodySet::new();
        let c = body(&mut bodies, Vec3::new(0.0, 0.4, 0.0), Quat::IDENTITY);
        let mut buffer = ContactBuffer::new(16);

        let written = cuboid_half_space(
            &proxy(&bodies, CollisionPrimitive::cuboid(c, Vec3::splat(0.5))),
            &proxy(&bodies, ground()),
            &mut buffer,
        );
        assert_eq!(written, 4);
        for contact in buffer.iter() {
            assert!((contact.penetration - 0.1).abs() < 1e-5);
            assert!((contact.point.y + 0.05).abs() < 1e-5);
            assert_eq!(contact.bodies, [Some(c), None]);
        }
    }

    #[test]
    fn test_tilted_cuboid_touches_with_one_corner() {
        let mut bodies = BodySet::new();
        // Corner-down: the lowest vertex sits sqrt(3)/2 below the centre.
        let orientation = Quat::from_rotation_arc(Vec3::ONE.normalize(), Vec3::NEG_Y);
        let c = body(&mut bodies, Vec3::new(0.0, 0.8, 0.0), orientation);
        let mut buffer = ContactBuffer::new(16);

        let written = cuboid_half_space(
            &proxy(&bodies, CollisionPrimitive::cuboid(c, Vec3::splat(0.5))),
            &proxy(&bodies, ground()),
            &mut buffer,
        );
        assert_eq!(written, 1);
        let expected = 3.0_f32.sqrt() * 0.5 - 0.8;
        assert!((buffer.as_slice()[0].penetration - expected).abs() < 1e-4);
    }

    #[test]
    fn test_cuboid_sphere_face_contact() {
        let mut bodies = BodySet::new();
        let c = body(&mut bodies, Vec3::ZERO, Quat::IDENTITY);
        let s = body(&mut bodies, Vec3::new(0.0, 1.3, 0.0), Quat::IDENTITY);
        let mut buffer = ContactBuffer::new(8);

        let written = detect_collision(
            &proxy(&bodies, CollisionPrimitive::sphere(s, 0.5)),
            &proxy(&bodies, CollisionPrimitive::cuboid(c, Vec3::splat(1.0))),
            &mut buffer,
        );
        assert_eq!(written, 1);

        let contact = &buffer.as_slice()[0];
        let eps = 1e-5;
        assert_eq!(contact.bodies, [Some(c), Some(s)]);
        assert!((contact.normal - Vec3::NEG_Y).length() < eps);
        assert!((contact.penetration - 0.2).abs() < eps);
        assert!((contact.point - Vec3::Y).length() < eps);
    }

    #[test]
    fn test_cuboid_sphere_center_inside() {
        let mut bodies = BodySet::new();
        let c = body(&mut bodies, Vec3::ZERO, Quat::IDENTITY);
        let s = body(&mut bodies, Vec3::new(0.8, 0.1, 0.0), Quat::IDENTITY);
        let mut buffer = ContactBuffer::new(8);

        let written = cuboid_sphere(
            &proxy(&bodies, CollisionPrimitive::cuboid(c, Vec3::splat(1.0))),
            &proxy(&bodies, CollisionPrimitive::sphere(s, 0.5)),
            &mut buffer,
        );
        assert_eq!(written, 1);

        let contact = &buffer.as_slice()[0];
        let eps = 1e-5;
        assert!((contact.normal - Vec3::NEG_X).length() < eps, "{:?}", contact.normal);
        assert!((contact.penetration - 0.7).abs() < eps);
    }

    #[test]
    fn test_cuboid_pair_has_no_builtin_test() {
        let mut bodies = BodySet::new();
        let a = body(&mut bodies, Vec3::ZERO, Quat::IDENTITY);
        let b = body(&mut bodies, Vec3::X * 0.5, Quat::IDENTITY);
        let mut buffer = ContactBuffer::new(8);

        let written = detect_collision(
            &proxy(&bodies, CollisionPrimitive::cuboid(a, Vec3::ONE)),
            &proxy(&bodies, CollisionPrimitive::cuboid(b, Vec3::ONE)),
            &mut buffer,
        );
        assert_eq!(written, 0);
    }

    #[test]
    fn test_buffer_truncates_at_capacity() {
        let mut bodies = BodySet::new();
        let c = body(&mut bodies, Vec3::new(0.0, 0.4, 0.0), Quat::IDENTITY);
        let mut buffer = ContactBuffer::new(3);

        let written = cuboid_half_space(
            &proxy(&bodies, CollisionPrimitive::cuboid(c, Vec3::splat(0.5))),
            &proxy(&bodies, ground()),
            &mut buffer,
        );
        assert_eq!(written, 3);
        assert_eq!(buffer.len(), 3);
        assert!(buffer.is_full());
        assert_eq!(buffer.dropped(), 1);

        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.dropped(), 0);
        assert_eq!(buffer.capacity(), 3);
    }
}
