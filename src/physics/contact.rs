//! Contacts between bodies and their impulse/position responses.
//!
//! A contact is expressed in its own orthonormal basis whose first axis is
//! the contact normal. The normal points from body 1 toward body 0, i.e. it is
//! the direction body 0 has to move to separate. Closing velocities are
//! therefore negative along the normal.

use glam::{Mat3, Vec3};

use super::body_set::{BodyHandle, BodySet};
use super::rigid_body::RigidBody;

/// Denominators below this are treated as zero.
const DENOMINATOR_EPSILON: f32 = 1e-9;

/// Velocity and rotation (or translation and rotation) applied to one body.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BodyDelta {
    pub linear: Vec3,
    pub angular: Vec3,
}

/// A single contact point, rebuilt every step.
#[derive(Debug, Clone)]
pub struct Contact {
    /// Bodies in contact. `None` stands for the immovable world.
    pub bodies: [Option<BodyHandle>; 2],
    /// World-space contact point.
    pub point: Vec3,
    /// Contact normal, from body 1 toward body 0.
    pub normal: Vec3,
    /// Depth of interpenetration along the normal.
    pub penetration: f32,
    pub friction: f32,
    pub restitution: f32,
    /// Columns are (normal, tangent, bitangent).
    contact_to_world: Mat3,
    /// Contact point relative to each body's centre of mass.
    relative_contact_position: [Vec3; 2],
    /// Closing velocity in contact space (body 0 minus body 1).
    contact_velocity: Vec3,
    /// Normal velocity change needed to resolve the contact.
    desired_delta_velocity: f32,
    valid: bool,
    /// At least one body can be moved by an impulse.
    movable: bool,
}

impl Contact {
    pub fn new(point: Vec3, normal: Vec3, penetration: f32) -> Self {
        Self {
            bodies: [None, None],
            point,
            normal,
            penetration,
            friction: 0.0,
            restitution: 0.0,
            contact_to_world: Mat3::IDENTITY,
            relative_contact_position: [Vec3::ZERO; 2],
            contact_velocity: Vec3::ZERO,
            desired_delta_velocity: 0.0,
            valid: false,
            movable: false,
        }
    }

    /// Set the bodies involved and the material coefficients.
    pub fn set_body_data(
        &mut self,
        first: Option<BodyHandle>,
        second: Option<BodyHandle>,
        friction: f32,
        restitution: f32,
    ) {
        self.bodies = [first, second];
        self.friction = friction;
        self.restitution = restitution;
    }

    /// Builder form of [`Contact::set_body_data`].
    pub fn with_bodies(
        mut self,
        first: Option<BodyHandle>,
        second: Option<BodyHandle>,
        friction: f32,
        restitution: f32,
    ) -> Self {
        self.set_body_data(first, second, friction, restitution);
        self
    }

    pub fn contact_to_world(&self) -> Mat3 {
        self.contact_to_world
    }

    pub fn relative_contact_position(&self, index: usize) -> Vec3 {
        self.relative_contact_position[index]
    }

    pub fn contact_velocity(&self) -> Vec3 {
        self.contact_velocity
    }

    pub fn desired_delta_velocity(&self) -> f32 {
        self.desired_delta_velocity
    }

    /// Whether the last [`Contact::calculate_internals`] succeeded.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Whether the contact is valid and has a body that can move.
    ///
    /// A contact between two immovable sides is left alone by the resolver.
    pub fn is_resolvable(&self) -> bool {
        self.valid && self.movable
    }

    /// Whether body `index` can be moved by this contact.
    pub fn is_dynamic(&self, bodies: &BodySet, index: usize) -> bool {
        self.bodies[index]
            .and_then(|h| bodies.get(h))
            .is_some_and(|b| !b.is_static())
    }

    fn swap_bodies(&mut self) {
        self.normal = -self.normal;
        self.bodies.swap(0, 1);
    }

    /// Canonicalize the contact and cache the data the resolver needs.
    ///
    /// Swaps the bodies if body 0 is `None`, normalizes the normal, builds the
    /// contact basis, and computes relative positions, the contact-space
    /// closing velocity and the desired velocity change. Restitution is
    /// ignored when the closing speed is below `restitution_velocity_limit`.
    ///
    /// Returns false (and marks the contact invalid) when the contact cannot
    /// be resolved: no bodies, stale handles, a body paired with itself, or a
    /// zero-length normal.
    pub fn calculate_internals(
        &mut self,
        bodies: &BodySet,
        duration: f32,
        restitution_velocity_limit: f32,
    ) -> bool {
        self.valid = false;
        self.movable = false;

        if self.bodies[0].is_none() {
            self.swap_bodies();
        }
        let Some(h0) = self.bodies[0] else {
            return false;
        };
        if self.bodies[1] == Some(h0) {
            return false;
        }
        let Some(normal) = self.normal.try_normalize() else {
            return false;
        };
        self.normal = normal;

        let Some(b0) = bodies.get(h0) else {
            return false;
        };
        let b1 = match self.bodies[1] {
            Some(h1) => match bodies.get(h1) {
                Some(b) => Some(b),
                None => return false,
            },
            None => None,
        };

        self.calculate_contact_basis();

        self.relative_contact_position[0] = self.point - b0.position();
        self.relative_contact_position[1] = match b1 {
            Some(b) => self.point - b.position(),
            None => Vec3::ZERO,
        };

        self.contact_velocity = self.local_velocity(b0, 0, duration);
        if let Some(b) = b1 {
            self.contact_velocity -= self.local_velocity(b, 1, duration);
        }

        self.calculate_desired_delta_velocity(b0, b1, duration, restitution_velocity_limit);
        self.movable = !b0.is_static() || b1.is_some_and(|b| !b.is_static());
        self.valid = true;
        true
    }

    /// Build an orthonormal basis around the normal.
    ///
    /// The first tangent is taken perpendicular to whichever of the world X or
    /// Y axes the normal is further from, so the cross product never nears zero.
    fn calculate_contact_basis(&mut self) {
        let n = self.normal;
        let tangent = if n.x.abs() > n.y.abs() {
            let s = 1.0 / (n.z * n.z + n.x * n.x).sqrt();
            Vec3::new(n.z * s, 0.0, -n.x * s)
        } else {
            let s = 1.0 / (n.z * n.z + n.y * n.y).sqrt();
            Vec3::new(0.0, -n.z * s, n.y * s)
        };
        let bitangent = n.cross(tangent);

        self.contact_to_world = Mat3::from_cols(n, tangent, bitangent);
    }

    /// Contact-space velocity of the contact point on one body.
    ///
    /// Includes the planar part of last frame's acceleration so that friction
    /// can hold a body still on a slope.
    fn local_velocity(&self, body: &RigidBody, index: usize, duration: f32) -> Vec3 {
        let world_to_contact = self.contact_to_world.transpose();

        let velocity = body.linear_velocity()
            + body
                .angular_velocity()
                .cross(self.relative_contact_position[index]);
        let contact_velocity = world_to_contact * velocity;

        let mut acceleration_velocity =
            world_to_contact * (body.last_frame_acceleration() * duration);
        acceleration_velocity.x = 0.0;

        contact_velocity + acceleration_velocity
    }

    fn calculate_desired_delta_velocity(
        &mut self,
        b0: &RigidBody,
        b1: Option<&RigidBody>,
        duration: f32,
        restitution_velocity_limit: f32,
    ) {
        // Velocity built up from acceleration this frame is not bounced back.
        let mut velocity_from_acceleration = 0.0;
        if b0.is_awake() {
            velocity_from_acceleration +=
                (b0.last_frame_acceleration() * duration).dot(self.normal);
        }
        if let Some(b) = b1.filter(|b| b.is_awake()) {
            velocity_from_acceleration -= (b.last_frame_acceleration() * duration).dot(self.normal);
        }

        let restitution = if self.contact_velocity.x.abs() < restitution_velocity_limit {
            0.0
        } else {
            self.restitution
        };

        self.desired_delta_velocity = -self.contact_velocity.x
            - restitution * (self.contact_velocity.x - velocity_from_acceleration);
    }

    /// If exactly one of two bodies is awake, wake the other.
    ///
    /// Contacts with the world never wake anything.
    pub fn match_awake_state(&self, bodies: &mut BodySet) {
        let [Some(h0), Some(h1)] = self.bodies else {
            return;
        };
        let Some((b0, b1)) = bodies.get_pair_mut(h0, h1) else {
            return;
        };
        if b0.is_awake() ^ b1.is_awake() {
            if b0.is_awake() {
                b1.set_awake(true);
            } else {
                b0.set_awake(true);
            }
        }
    }

    /// Run `f` with mutable access to the contact's bodies.
    fn with_bodies_mut<R>(
        &self,
        bodies: &mut BodySet,
        f: impl FnOnce(&mut RigidBody, Option<&mut RigidBody>) -> R,
    ) -> Option<R> {
        let h0 = self.bodies[0]?;
        match self.bodies[1] {
            Some(h1) => {
                let (b0, b1) = bodies.get_pair_mut(h0, h1)?;
                Some(f(b0, Some(b1)))
            }
            None => Some(f(bodies.get_mut(h0)?, None)),
        }
    }

    /// Contact-space impulse that achieves the desired velocity change.
    ///
    /// Uses the frictionless solve when friction is zero, otherwise the full
    /// 3x3 solve clamped to the Coulomb cone.
    pub fn calculate_impulse(&self, bodies: &BodySet) -> Vec3 {
        let Some(b0) = self.bodies[0].and_then(|h| bodies.get(h)) else {
            return Vec3::ZERO;
        };
        let b1 = self.bodies[1].and_then(|h| bodies.get(h));
        self.impulse_for(b0, b1)
    }

    fn impulse_for(&self, b0: &RigidBody, b1: Option<&RigidBody>) -> Vec3 {
        if self.friction == 0.0 {
            self.frictionless_impulse(b0, b1)
        } else {
            self.friction_impulse(b0, b1)
        }
    }

    fn frictionless_impulse(&self, b0: &RigidBody, b1: Option<&RigidBody>) -> Vec3 {
        let n = self.normal;

        let mut delta_velocity =
            normal_velocity_per_impulse(b0, self.relative_contact_position[0], n);
        if let Some(b) = b1 {
            delta_velocity += normal_velocity_per_impulse(b, self.relative_contact_position[1], n);
        }

        if delta_velocity <= DENOMINATOR_EPSILON {
            return Vec3::ZERO;
        }
        Vec3::new(self.desired_delta_velocity / delta_velocity, 0.0, 0.0)
    }

    fn friction_impulse(&self, b0: &RigidBody, b1: Option<&RigidBody>) -> Vec3 {
        let mut inverse_mass = b0.inverse_mass();
        let impulse_to_torque = skew_symmetric(self.relative_contact_position[0]);
        let mut delta_world =
            -(impulse_to_torque * b0.inverse_inertia_tensor_world() * impulse_to_torque);

        if let Some(b) = b1 {
            let impulse_to_torque = skew_symmetric(self.relative_contact_position[1]);
            delta_world -= impulse_to_torque * b.inverse_inertia_tensor_world() * impulse_to_torque;
            inverse_mass += b.inverse_mass();
        }

        // Velocity change per unit impulse, in contact coordinates.
        let delta_velocity = self.contact_to_world.transpose() * delta_world * self.contact_to_world
            + Mat3::from_diagonal(Vec3::splat(inverse_mass));

        let det = delta_velocity.determinant();
        if det.abs() <= DENOMINATOR_EPSILON || !det.is_finite() {
            return self.frictionless_impulse(b0, b1);
        }
        let impulse_matrix = delta_velocity.inverse();

        let velocity_kill = Vec3::new(
            self.desired_delta_velocity,
            -self.contact_velocity.y,
            -self.contact_velocity.z,
        );
        let impulse = impulse_matrix * velocity_kill;

        let planar = (impulse.y * impulse.y + impulse.z * impulse.z).sqrt();
        if planar <= impulse.x * self.friction {
            return impulse;
        }

        // Outside the cone: keep the tangential direction, scale it to
        // friction * normal, and re-solve the normal component to match.
        let direction_y = impulse.y / planar;
        let direction_z = impulse.z / planar;
        let denominator = delta_velocity.x_axis.x
            + delta_velocity.y_axis.x * self.friction * direction_y
            + delta_velocity.z_axis.x * self.friction * direction_z;
        if denominator.abs() <= DENOMINATOR_EPSILON {
            return self.frictionless_impulse(b0, b1);
        }

        let normal = self.desired_delta_velocity / denominator;
        Vec3::new(
            normal,
            direction_y * self.friction * normal,
            direction_z * self.friction * normal,
        )
    }

    /// Apply the resolving impulse to both bodies.
    ///
    /// Body 1 receives the negated impulse. Returns the velocity and rotation
    /// change of each body (zero for absent or immovable bodies).
    pub fn apply_velocity_change(&self, bodies: &mut BodySet) -> [BodyDelta; 2] {
        let relative = self.relative_contact_position;
        self.with_bodies_mut(bodies, |b0, b1| {
            let impulse = self.contact_to_world * self.impulse_for(b0, b1.as_deref());

            let mut deltas = [BodyDelta::default(); 2];
            deltas[0] = apply_impulse_to_body(b0, relative[0], impulse);
            if let Some(b) = b1 {
                deltas[1] = apply_impulse_to_body(b, relative[1], -impulse);
            }
            deltas
        })
        .unwrap_or_default()
    }

    /// Move the bodies apart to remove `penetration` along the normal.
    ///
    /// The correction is split between linear and angular motion of each
    /// body in proportion to its inverse mass and angular inertia along the
    /// normal. Angular motion is capped at `angular_limit` times the distance
    /// from the centre of mass to the contact across the normal; the excess
    /// goes to linear motion. Returns each body's translation and rotation.
    pub fn apply_position_change(
        &self,
        bodies: &mut BodySet,
        penetration: f32,
        angular_limit: f32,
    ) -> [BodyDelta; 2] {
        let n = self.normal;
        let relative = self.relative_contact_position;

        self.with_bodies_mut(bodies, |b0, b1| {
            let mut pair: [Option<&mut RigidBody>; 2] = [Some(b0), b1];
            let mut linear_inertia = [0.0_f32; 2];
            let mut angular_inertia = [0.0_f32; 2];
            let mut total_inertia = 0.0;

            for (i, body) in pair.iter().enumerate() {
                let Some(body) = body.as_deref().filter(|b| !b.is_static()) else {
                    continue;
                };
                let angular_world = (body.inverse_inertia_tensor_world() * relative[i].cross(n))
                    .cross(relative[i]);
                angular_inertia[i] = angular_world.dot(n);
                linear_inertia[i] = body.inverse_mass();
                total_inertia += linear_inertia[i] + angular_inertia[i];
            }

            let mut deltas = [BodyDelta::default(); 2];
            if total_inertia <= DENOMINATOR_EPSILON {
                return deltas;
            }

            for (i, body) in pair.iter_mut().enumerate() {
                let Some(body) = body.as_deref_mut().filter(|b| !b.is_static()) else {
                    continue;
                };
                let sign = if i == 0 { 1.0 } else { -1.0 };
                let (linear_move, angular_move) = move_amounts(
                    sign * penetration,
                    linear_inertia[i],
                    angular_inertia[i],
                    total_inertia,
                    relative[i],
                    n,
                    angular_limit,
                );

                let angular = if angular_move == 0.0 || angular_inertia[i] <= 0.0 {
                    Vec3::ZERO
                } else {
                    let per_unit = body.inverse_inertia_tensor_world() * relative[i].cross(n);
                    per_unit * (angular_move / angular_inertia[i])
                };
                let linear = n * linear_move;

                body.translate(linear);
                body.rotate(angular);
                body.calculate_derived_data();

                deltas[i] = BodyDelta { linear, angular };
            }
            deltas
        })
        .unwrap_or_default()
    }
}

/// Normal velocity gained at the contact point per unit normal impulse.
fn normal_velocity_per_impulse(body: &RigidBody, relative: Vec3, normal: Vec3) -> f32 {
    let angular =
        (body.inverse_inertia_tensor_world() * relative.cross(normal)).cross(relative);
    angular.dot(normal) + body.inverse_mass()
}

/// Matrix form of `v.cross(_)`.
fn skew_symmetric(v: Vec3) -> Mat3 {
    Mat3::from_cols(
        Vec3::new(0.0, v.z, -v.y),
        Vec3::new(-v.z, 0.0, v.x),
        Vec3::new(v.y, -v.x, 0.0),
    )
}

fn apply_impulse_to_body(body: &mut RigidBody, relative: Vec3, impulse: Vec3) -> BodyDelta {
    if body.is_static() {
        return BodyDelta::default();
    }
    let delta = BodyDelta {
        linear: impulse * body.inverse_mass(),
        angular: body.inverse_inertia_tensor_world() * relative.cross(impulse),
    };
    body.add_velocity(delta.linear);
    body.add_rotation(delta.angular);
    delta
}

/// Split a signed correction into (linear, angular) moves for one body.
fn move_amounts(
    penetration: f32,
    linear_inertia: f32,
    angular_inertia: f32,
    total_inertia: f32,
    relative: Vec3,
    normal: Vec3,
    angular_limit: f32,
) -> (f32, f32) {
    let mut angular_move = penetration * (angular_inertia / total_inertia);
    let mut linear_move = penetration * (linear_inertia / total_inertia);

    let projection = relative - normal * relative.dot(normal);
    let max_angular_move = angular_limit * projection.length();

    if angular_move.abs() > max_angular_move {
        let total_move = angular_move + linear_move;
        angular_move = angular_move.clamp(-max_angular_move, max_angular_move);
        linear_move = total_move - angular_move;
    }

    (linear_move, angular_move)
}
