//! Rigid body state, creation requests, and integration.

use glam::{Mat3, Mat4, Quat, Vec3};

use crate::error::BodyError;

/// Default fraction of linear velocity retained after one second.
pub const DEFAULT_LINEAR_DAMPING: f32 = 0.99;
/// Default fraction of angular velocity retained after one second.
pub const DEFAULT_ANGULAR_DAMPING: f32 = 0.99;
/// Default motion level below which a body falls asleep.
pub const DEFAULT_SLEEP_EPSILON: f32 = 0.3;

/// Determinants below this are treated as a singular inertia tensor.
const INERTIA_DETERMINANT_EPSILON: f32 = 1e-12;

/// Position and orientation of a body, the only state other subsystems read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyPose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl BodyPose {
    /// Convert to a 4x4 matrix (translation * rotation).
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position)
    }
}

/// Mass data of a creation request, in either direct or reciprocal form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MassProperties {
    Mass(f32),
    /// Zero means infinite mass: the body never moves.
    InverseMass(f32),
}

/// Body-space inertia data of a creation request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InertiaProperties {
    Tensor(Mat3),
    /// May be singular; a zero row locks rotation about that axis.
    InverseTensor(Mat3),
}

/// A request to create a rigid body.
///
/// Validated by [`RigidBodyDesc::validate`] before a [`RigidBody`] is built.
#[derive(Debug, Clone)]
pub struct RigidBodyDesc {
    pub mass: MassProperties,
    pub inertia: InertiaProperties,
    pub position: Vec3,
    pub orientation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    /// Fraction of linear velocity retained per second, in `[0, 1]`.
    pub linear_damping: f32,
    /// Fraction of angular velocity retained per second, in `[0, 1]`.
    pub angular_damping: f32,
    pub can_sleep: bool,
    /// Register the world's gravity generator against this body on insertion.
    pub affected_by_gravity: bool,
}

impl RigidBodyDesc {
    /// A dynamic body with an explicit body-space inertia tensor.
    pub fn dynamic(mass: f32, inertia_tensor: Mat3) -> Self {
        Self {
            mass: MassProperties::Mass(mass),
            inertia: InertiaProperties::Tensor(inertia_tensor),
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            linear_damping: DEFAULT_LINEAR_DAMPING,
            angular_damping: DEFAULT_ANGULAR_DAMPING,
            can_sleep: true,
            affected_by_gravity: true,
        }
    }

    /// An immovable body (inverse mass of zero).
    pub fn fixed() -> Self {
        Self {
            mass: MassProperties::InverseMass(0.0),
            inertia: InertiaProperties::InverseTensor(Mat3::ZERO),
            linear_damping: 1.0,
            angular_damping: 1.0,
            can_sleep: false,
            affected_by_gravity: false,
            ..Self::dynamic(1.0, Mat3::IDENTITY)
        }
    }

    /// A solid sphere.
    pub fn sphere(mass: f32, radius: f32) -> Self {
        let i = 0.4 * mass * radius * radius;
        Self::dynamic(mass, Mat3::from_diagonal(Vec3::splat(i)))
    }

    /// A solid cuboid given its half extents.
    pub fn cuboid(mass: f32, half_extents: Vec3) -> Self {
        let sq = half_extents * half_extents;
        let k = mass / 3.0;
        Self::dynamic(
            mass,
            Mat3::from_diagonal(Vec3::new(
                k * (sq.y + sq.z),
                k * (sq.x + sq.z),
                k * (sq.x + sq.y),
            )),
        )
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_orientation(mut self, orientation: Quat) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_linear_velocity(mut self, velocity: Vec3) -> Self {
        self.linear_velocity = velocity;
        self
    }

    pub fn with_angular_velocity(mut self, velocity: Vec3) -> Self {
        self.angular_velocity = velocity;
        self
    }

    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    pub fn with_sleep(mut self, can_sleep: bool) -> Self {
        self.can_sleep = can_sleep;
        self
    }

    pub fn with_gravity(mut self, affected: bool) -> Self {
        self.affected_by_gravity = affected;
        self
    }

    /// Resolve mass data to an inverse mass.
    fn inverse_mass(&self) -> Result<f32, BodyError> {
        match self.mass {
            MassProperties::Mass(m) if !m.is_finite() => Err(BodyError::NonFiniteMass),
            MassProperties::Mass(m) if m < 0.0 => Err(BodyError::NegativeMass(m)),
            MassProperties::Mass(m) if m == 0.0 => Err(BodyError::ZeroMass),
            MassProperties::Mass(m) => Ok(1.0 / m),
            MassProperties::InverseMass(im) if !im.is_finite() => Err(BodyError::NonFiniteMass),
            MassProperties::InverseMass(im) if im < 0.0 => Err(BodyError::NegativeInverseMass(im)),
            MassProperties::InverseMass(im) => Ok(im),
        }
    }

    /// Resolve inertia data to a body-space inverse inertia tensor.
    fn inverse_inertia(&self) -> Result<Mat3, BodyError> {
        match self.inertia {
            InertiaProperties::Tensor(t) => {
                if !t.is_finite() {
                    return Err(BodyError::NonFiniteInertia);
                }
                let det = t.determinant();
                if det.abs() <= INERTIA_DETERMINANT_EPSILON {
                    return Err(BodyError::SingularInertia(det));
                }
                Ok(t.inverse())
            }
            InertiaProperties::InverseTensor(t) => {
                if !t.is_finite() {
                    return Err(BodyError::NonFiniteInertia);
                }
                Ok(t)
            }
        }
    }

    /// Check the request without building a body.
    pub fn validate(&self) -> Result<(), BodyError> {
        self.build().map(|_| ())
    }

    /// Build the body, rejecting malformed mass, inertia, damping, or pose data.
    pub fn build(&self) -> Result<RigidBody, BodyError> {
        let inverse_mass = self.inverse_mass()?;
        let is_static = inverse_mass == 0.0;
        // Immovable bodies never rotate under contact either.
        let inverse_inertia_tensor = if is_static {
            Mat3::ZERO
        } else {
            self.inverse_inertia()?
        };

        for (name, value) in [
            ("linear", self.linear_damping),
            ("angular", self.angular_damping),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(BodyError::InvalidDamping { name, value });
            }
        }

        if !self.position.is_finite()
            || !self.orientation.is_finite()
            || !self.linear_velocity.is_finite()
            || !self.angular_velocity.is_finite()
        {
            return Err(BodyError::NonFinitePose);
        }
        if self.orientation.length_squared() <= f32::EPSILON {
            return Err(BodyError::DegenerateOrientation);
        }

        let mut body = RigidBody {
            inverse_mass,
            inverse_inertia_tensor,
            inverse_inertia_tensor_world: Mat3::ZERO,
            linear_damping: self.linear_damping,
            angular_damping: self.angular_damping,
            position: self.position,
            orientation: self.orientation.normalize(),
            linear_velocity: if is_static {
                Vec3::ZERO
            } else {
                self.linear_velocity
            },
            angular_velocity: if is_static {
                Vec3::ZERO
            } else {
                self.angular_velocity
            },
            force_accumulator: Vec3::ZERO,
            torque_accumulator: Vec3::ZERO,
            last_frame_acceleration: Vec3::ZERO,
            transform: Mat4::IDENTITY,
            motion: 0.0,
            sleep_epsilon: DEFAULT_SLEEP_EPSILON,
            is_awake: !is_static,
            can_sleep: self.can_sleep && !is_static,
            affected_by_gravity: self.affected_by_gravity && !is_static,
        };
        body.motion = body.sleep_epsilon * 2.0;
        body.calculate_derived_data();
        Ok(body)
    }
}

/// A simulated rigid body.
///
/// Mass and inertia are stored as inverses so that an immovable body is
/// simply `inverse_mass == 0`. Every mutator is a no-op on such bodies.
#[derive(Debug, Clone)]
pub struct RigidBody {
    inverse_mass: f32,
    /// Body-space inverse inertia tensor.
    inverse_inertia_tensor: Mat3,
    /// Cached world-space inverse inertia tensor, kept in sync with `orientation`.
    inverse_inertia_tensor_world: Mat3,
    linear_damping: f32,
    angular_damping: f32,
    position: Vec3,
    orientation: Quat,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
    force_accumulator: Vec3,
    torque_accumulator: Vec3,
    /// Linear acceleration applied during the last integration.
    last_frame_acceleration: Vec3,
    transform: Mat4,
    /// Recency-weighted kinetic activity used for sleeping.
    motion: f32,
    sleep_epsilon: f32,
    is_awake: bool,
    can_sleep: bool,
    affected_by_gravity: bool,
}

impl RigidBody {
    pub fn inverse_mass(&self) -> f32 {
        self.inverse_mass
    }

    /// Mass, or infinity for immovable bodies.
    pub fn mass(&self) -> f32 {
        if self.inverse_mass == 0.0 {
            f32::INFINITY
        } else {
            1.0 / self.inverse_mass
        }
    }

    pub fn has_finite_mass(&self) -> bool {
        self.inverse_mass > 0.0
    }

    pub fn is_static(&self) -> bool {
        self.inverse_mass == 0.0
    }

    pub fn inverse_inertia_tensor(&self) -> Mat3 {
        self.inverse_inertia_tensor
    }

    pub fn inverse_inertia_tensor_world(&self) -> Mat3 {
        self.inverse_inertia_tensor_world
    }

    pub fn linear_damping(&self) -> f32 {
        self.linear_damping
    }

    pub fn angular_damping(&self) -> f32 {
        self.angular_damping
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.calculate_derived_data();
    }

    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    /// Set the orientation. The quaternion is normalized.
    pub fn set_orientation(&mut self, orientation: Quat) {
        self.orientation = orientation;
        self.calculate_derived_data();
    }

    pub fn linear_velocity(&self) -> Vec3 {
        self.linear_velocity
    }

    pub fn set_linear_velocity(&mut self, velocity: Vec3) {
        if !self.is_static() {
            self.linear_velocity = velocity;
        }
    }

    pub fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    pub fn set_angular_velocity(&mut self, velocity: Vec3) {
        if !self.is_static() {
            self.angular_velocity = velocity;
        }
    }

    pub fn force_accumulator(&self) -> Vec3 {
        self.force_accumulator
    }

    pub fn torque_accumulator(&self) -> Vec3 {
        self.torque_accumulator
    }

    pub fn last_frame_acceleration(&self) -> Vec3 {
        self.last_frame_acceleration
    }

    /// World transform (translation * rotation).
    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn pose(&self) -> BodyPose {
        BodyPose {
            position: self.position,
            orientation: self.orientation,
        }
    }

    pub fn is_awake(&self) -> bool {
        self.is_awake
    }

    /// Wake or sleep the body. Sleeping zeroes both velocities.
    ///
    /// Immovable bodies take no part in waking and stay asleep.
    pub fn set_awake(&mut self, awake: bool) {
        if self.is_static() {
            return;
        }
        if awake {
            self.is_awake = true;
            // Give the body a moment before it can fall asleep again.
            self.motion = self.sleep_epsilon * 2.0;
        } else {
            self.is_awake = false;
            self.linear_velocity = Vec3::ZERO;
            self.angular_velocity = Vec3::ZERO;
        }
    }

    /// Wake a sleeping body without resetting the motion of an awake one.
    fn wake(&mut self) {
        if !self.is_awake {
            self.set_awake(true);
        }
    }

    pub fn can_sleep(&self) -> bool {
        self.can_sleep
    }

    /// Enable or disable sleeping. Disabling wakes the body.
    pub fn set_can_sleep(&mut self, can_sleep: bool) {
        self.can_sleep = can_sleep && !self.is_static();
        if !can_sleep && !self.is_awake {
            self.set_awake(true);
        }
    }

    pub fn motion(&self) -> f32 {
        self.motion
    }

    pub fn sleep_epsilon(&self) -> f32 {
        self.sleep_epsilon
    }

    pub(crate) fn set_sleep_epsilon(&mut self, epsilon: f32) {
        self.sleep_epsilon = epsilon;
    }

    pub fn affected_by_gravity(&self) -> bool {
        self.affected_by_gravity
    }

    /// Recompute the transform and world-space inverse inertia from the pose.
    ///
    /// Also renormalizes the orientation.
    pub fn calculate_derived_data(&mut self) {
        self.orientation = self.orientation.normalize();
        self.transform = Mat4::from_rotation_translation(self.orientation, self.position);

        let rotation = Mat3::from_quat(self.orientation);
        self.inverse_inertia_tensor_world =
            rotation * self.inverse_inertia_tensor * rotation.transpose();
    }

    /// Integrate accumulated forces into velocity, then velocity into pose.
    ///
    /// Damping is applied as `v *= damping^duration`. Accumulators are cleared
    /// afterwards. Sleeping and immovable bodies only have their accumulators
    /// cleared.
    pub fn integrate(&mut self, duration: f32) {
        if !self.is_awake || self.is_static() {
            self.clear_accumulators();
            return;
        }

        self.last_frame_acceleration = self.force_accumulator * self.inverse_mass;
        let angular_acceleration = self.inverse_inertia_tensor_world * self.torque_accumulator;

        self.linear_velocity += self.last_frame_acceleration * duration;
        self.angular_velocity += angular_acceleration * duration;

        self.linear_velocity *= self.linear_damping.powf(duration);
        self.angular_velocity *= self.angular_damping.powf(duration);

        self.position += self.linear_velocity * duration;
        self.orientation = add_scaled_vector(self.orientation, self.angular_velocity, duration);

        self.calculate_derived_data();
        self.clear_accumulators();
    }

    /// Fold this step's kinetic activity into `motion` and sleep if it is low.
    pub fn update_sleep_state(&mut self, duration: f32) {
        if !self.can_sleep || !self.is_awake {
            return;
        }

        let current =
            self.linear_velocity.length_squared() + self.angular_velocity.length_squared();
        let bias = 0.5_f32.powf(duration);
        self.motion = bias * self.motion + (1.0 - bias) * current;

        if self.motion < self.sleep_epsilon {
            self.set_awake(false);
        } else if self.motion > 10.0 * self.sleep_epsilon {
            self.motion = 10.0 * self.sleep_epsilon;
        }
    }

    pub fn clear_accumulators(&mut self) {
        self.force_accumulator = Vec3::ZERO;
        self.torque_accumulator = Vec3::ZERO;
    }

    /// Add a force through the centre of mass.
    pub fn add_force(&mut self, force: Vec3) {
        if self.is_static() {
            return;
        }
        self.force_accumulator += force;
        self.wake();
    }

    /// Add a force at a world-space point.
    pub fn add_force_at_point(&mut self, force: Vec3, point: Vec3) {
        if self.is_static() {
            return;
        }
        let arm = point - self.position;
        self.force_accumulator += force;
        self.torque_accumulator += arm.cross(force);
        self.wake();
    }

    /// Add a world-space force at a body-space point.
    pub fn add_force_at_body_point(&mut self, force: Vec3, point: Vec3) {
        let world = self.point_in_world_space(point);
        self.add_force_at_point(force, world);
    }

    pub fn add_torque(&mut self, torque: Vec3) {
        if self.is_static() {
            return;
        }
        self.torque_accumulator += torque;
        self.wake();
    }

    /// Change linear velocity directly.
    pub fn add_velocity(&mut self, delta: Vec3) {
        if !self.is_static() {
            self.linear_velocity += delta;
        }
    }

    /// Change angular velocity directly.
    pub fn add_rotation(&mut self, delta: Vec3) {
        if !self.is_static() {
            self.angular_velocity += delta;
        }
    }

    /// Apply an instantaneous impulse at a world-space point.
    pub fn apply_impulse(&mut self, impulse: Vec3, point: Vec3) {
        if self.is_static() {
            return;
        }
        let impulsive_torque = (point - self.position).cross(impulse);
        self.linear_velocity += impulse * self.inverse_mass;
        self.angular_velocity += self.inverse_inertia_tensor_world * impulsive_torque;
        self.set_awake(true);
    }

    pub fn point_in_world_space(&self, point: Vec3) -> Vec3 {
        self.transform.transform_point3(point)
    }

    pub fn point_in_local_space(&self, point: Vec3) -> Vec3 {
        self.orientation.inverse() * (point - self.position)
    }

    pub fn direction_in_world_space(&self, direction: Vec3) -> Vec3 {
        self.orientation * direction
    }

    pub fn direction_in_local_space(&self, direction: Vec3) -> Vec3 {
        self.orientation.inverse() * direction
    }

    /// Move the body without touching velocities. Used by position correction.
    pub(crate) fn translate(&mut self, delta: Vec3) {
        if !self.is_static() {
            self.position += delta;
        }
    }

    /// Rotate the body by a scaled rotation vector. Used by position correction.
    pub(crate) fn rotate(&mut self, delta: Vec3) {
        if !self.is_static() {
            self.orientation = add_scaled_vector(self.orientation, delta, 1.0);
        }
    }
}

/// Integrate a rotation vector into a quaternion: q' = q + 0.5 * (v * scale) * q.
///
/// The result is not normalized.
pub fn add_scaled_vector(q: Quat, v: Vec3, scale: f32) -> Quat {
    let s = v * scale;
    let dq = Quat::from_xyzw(s.x, s.y, s.z, 0.0) * q;
    Quat::from_xyzw(
        q.x + dq.x * 0.5,
        q.y + dq.y * 0.5,
        q.z + dq.z * 0.5,
        q.w + dq.w * 0.5,
    )
}
