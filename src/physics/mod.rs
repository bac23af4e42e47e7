//! Impulse-based rigid body physics.
//!
//! # Architecture
//!
//! One call to [`PhysicsWorld::step_simulation`] runs:
//!
//! 1. Force generators (gravity, one-shot forces, user generators)
//! 2. Integration of every awake body
//! 3. Contact collection: queued external contacts, then the built-in
//!    broad (AABB) and narrow (sphere/cuboid/half-space) tests, bounded by
//!    `max_contacts`
//! 4. Contact resolution: velocities, then interpenetration
//! 5. Sleep bookkeeping
//!
//! [`PhysicsWorld::step`] wraps this in a fixed timestep accumulator and
//! calls [`PhysicsWorld::start_frame`] before every sub-step.

pub mod body_set;
pub mod broadphase;
pub mod collider;
pub mod contact;
pub mod force;
pub mod narrowphase;
pub mod rigid_body;
pub mod solver;

use std::collections::BTreeMap;

use glam::Vec3;

use crate::error::BodyError;

pub use self::body_set::{BodyHandle, BodySet};
pub use self::broadphase::{BroadPhase, PrimitiveProxy};
pub use self::collider::{CollisionPrimitive, CollisionPrimitiveId, CollisionShape, PhysicsAabb};
pub use self::contact::{BodyDelta, Contact};
pub use self::force::{
    ApplicationPoint, ForceGenerator, ForceGeneratorId, ForceRegistration, ForceRegistry, Gravity,
    ImpulseGenerator,
};
pub use self::narrowphase::{detect_collision, ContactBuffer};
pub use self::rigid_body::{BodyPose, InertiaProperties, MassProperties, RigidBody, RigidBodyDesc};
pub use self::solver::{ContactResolver, ResolverConfig};

/// Default per-step contact capacity.
pub const DEFAULT_MAX_CONTACTS: usize = 256;

/// Configuration for the physics simulation.
#[derive(Debug, Clone)]
pub struct PhysicsConfig {
    /// Gravity vector, or `None` for no shared gravity generator. Default: (0, -9.81, 0).
    pub gravity: Option<Vec3>,
    /// Fixed timestep for [`PhysicsWorld::step`] in seconds. Default: 1/60.
    pub fixed_timestep: f64,
    /// Maximum number of sub-steps per frame. Default: 4.
    pub max_substeps: u32,
    /// Contacts kept per step; the rest are dropped. Default: 256.
    pub max_contacts: usize,
    /// Motion below which bodies fall asleep. Default: 0.3.
    pub sleep_epsilon: f32,
    pub resolver: ResolverConfig,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Some(Vec3::new(0.0, -9.81, 0.0)),
            fixed_timestep: 1.0 / 60.0,
            max_substeps: 4,
            max_contacts: DEFAULT_MAX_CONTACTS,
            sleep_epsilon: rigid_body::DEFAULT_SLEEP_EPSILON,
            resolver: ResolverConfig::default(),
        }
    }
}

/// What happened during the last simulation step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepStats {
    /// Contacts handed to the resolver.
    pub contacts: usize,
    /// Contacts lost to the capacity limit.
    pub dropped_contacts: usize,
    pub velocity_iterations: u32,
    pub position_iterations: u32,
}

/// The main physics world managing simulation state.
#[derive(Debug)]
pub struct PhysicsWorld {
    config: PhysicsConfig,
    accumulator: f64,
    bodies: BodySet,
    registry: ForceRegistry,
    gravity: Option<ForceGeneratorId>,
    resolver: ContactResolver,
    broadphase: BroadPhase,
    primitives: BTreeMap<CollisionPrimitiveId, CollisionPrimitive>,
    next_primitive_id: u64,
    pending_contacts: Vec<Contact>,
    contacts: ContactBuffer,
    last_step: StepStats,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(PhysicsConfig::default())
    }
}

impl PhysicsWorld {
    /// Create a new physics world with the given configuration.
    pub fn new(config: PhysicsConfig) -> Self {
        let mut registry = ForceRegistry::new();
        let gravity = config
            .gravity
            .map(|g| registry.insert_generator(Gravity::new(g)));

        Self {
            accumulator: 0.0,
            bodies: BodySet::new(),
            registry,
            gravity,
            resolver: ContactResolver::new(config.resolver),
            broadphase: BroadPhase::new(),
            primitives: BTreeMap::new(),
            next_primitive_id: 0,
            pending_contacts: Vec::new(),
            contacts: ContactBuffer::new(config.max_contacts),
            last_step: StepStats::default(),
            config,
        }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn resolver(&self) -> &ContactResolver {
        &self.resolver
    }

    /// Create a body from a description.
    ///
    /// Malformed mass, inertia, damping, or pose data is rejected and nothing
    /// is added. Bodies that ask for gravity are registered with the shared
    /// gravity generator.
    pub fn add_rigid_body(&mut self, desc: RigidBodyDesc) -> Result<BodyHandle, BodyError> {
        let mut body = desc.build().inspect_err(|e| {
            tracing::debug!(error = %e, "rejected rigid body");
        })?;

        body.set_sleep_epsilon(self.config.sleep_epsilon);
        if body.is_awake() {
            body.set_awake(true);
        }
        let affected_by_gravity = body.affected_by_gravity();
        let handle = self.bodies.insert(body);

        if affected_by_gravity {
            if let Some(gravity) = self.gravity {
                self.registry.add(handle, gravity);
            }
        }
        tracing::debug!(?handle, bodies = self.bodies.len(), "added rigid body");
        Ok(handle)
    }

    /// Remove a body along with its force registrations, attached primitives
    /// and queued contacts. Other handles stay valid.
    pub fn remove_rigid_body(&mut self, handle: BodyHandle) -> Option<RigidBody> {
        let body = self.bodies.remove(handle)?;
        self.registry.remove_body(handle);
        self.primitives.retain(|_, p| p.body != Some(handle));
        self.pending_contacts
            .retain(|c| !c.bodies.contains(&Some(handle)));
        tracing::debug!(?handle, bodies = self.bodies.len(), "removed rigid body");
        Some(body)
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    /// Mutable access to a body.
    ///
    /// Forces added here are cleared by the next [`PhysicsWorld::start_frame`],
    /// which [`PhysicsWorld::step`] runs before every sub-step. Use
    /// [`PhysicsWorld::apply_force`] or a registered generator for forces that
    /// should act during a step.
    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle)
    }

    pub fn bodies(&self) -> &BodySet {
        &self.bodies
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Hand a generator to the world's registry.
    pub fn insert_force_generator(
        &mut self,
        generator: impl ForceGenerator + 'static,
    ) -> ForceGeneratorId {
        self.registry.insert_generator(generator)
    }

    /// Register a generator against a body.
    pub fn add_force_generator(&mut self, body: BodyHandle, generator: ForceGeneratorId) -> bool {
        debug_assert!(self.bodies.contains(body), "unknown body {:?}", body);
        if !self.bodies.contains(body) {
            return false;
        }
        self.registry.add(body, generator)
    }

    /// Unregister a generator from a body.
    pub fn remove_force_generator(
        &mut self,
        body: BodyHandle,
        generator: ForceGeneratorId,
    ) -> bool {
        self.registry.remove(body, generator)
    }

    /// Drop a generator and all of its registrations.
    pub fn drop_force_generator(
        &mut self,
        generator: ForceGeneratorId,
    ) -> Option<Box<dyn ForceGenerator>> {
        if self.gravity == Some(generator) {
            self.gravity = None;
        }
        self.registry.remove_generator(generator)
    }

    pub fn force_registry(&self) -> &ForceRegistry {
        &self.registry
    }

    /// The shared gravity generator, if gravity is configured.
    pub fn gravity_generator(&self) -> Option<ForceGeneratorId> {
        self.gravity
    }

    /// Register a collision primitive. Ids are never reused.
    pub fn add_collision_primitive(
        &mut self,
        primitive: CollisionPrimitive,
    ) -> CollisionPrimitiveId {
        debug_assert!(
            primitive.body.is_none_or(|h| self.bodies.contains(h)),
            "primitive attached to unknown body {:?}",
            primitive.body
        );
        let id = CollisionPrimitiveId(self.next_primitive_id);
        self.next_primitive_id += 1;
        self.primitives.insert(id, primitive);
        id
    }

    pub fn collision_primitive(&self, id: CollisionPrimitiveId) -> Option<&CollisionPrimitive> {
        self.primitives.get(&id)
    }

    pub fn collision_primitive_mut(
        &mut self,
        id: CollisionPrimitiveId,
    ) -> Option<&mut CollisionPrimitive> {
        self.primitives.get_mut(&id)
    }

    pub fn remove_collision_primitive(
        &mut self,
        id: CollisionPrimitiveId,
    ) -> Option<CollisionPrimitive> {
        self.primitives.remove(&id)
    }

    pub fn collision_primitives(
        &self,
    ) -> impl Iterator<Item = (CollisionPrimitiveId, &CollisionPrimitive)> {
        self.primitives.iter().map(|(id, p)| (*id, p))
    }

    /// Queue a contact from an outside narrow phase for the next step.
    ///
    /// Queued contacts count against `max_contacts`; once that many are
    /// queued, further ones are dropped and false is returned.
    pub fn push_contact(&mut self, contact: Contact) -> bool {
        if self.pending_contacts.len() >= self.config.max_contacts {
            tracing::warn!(
                capacity = self.config.max_contacts,
                "external contact queue full, dropping contact"
            );
            return false;
        }
        self.pending_contacts.push(contact);
        true
    }

    /// Queue a one-shot force, applied during the next step.
    pub fn apply_force(
        &mut self,
        body: BodyHandle,
        force: Vec3,
        point: ApplicationPoint,
    ) -> Option<ForceGeneratorId> {
        if !self.bodies.contains(body) {
            return None;
        }
        let id = self
            .registry
            .insert_generator(ImpulseGenerator::at(force, point));
        self.registry.add(body, id);
        Some(id)
    }

    /// Change a body's velocity immediately. The impulse acts at the centre
    /// of mass unless a world-space point is given.
    pub fn apply_impulse(&mut self, body: BodyHandle, impulse: Vec3, point: Option<Vec3>) -> bool {
        let Some(body) = self.bodies.get_mut(body) else {
            return false;
        };
        let point = point.unwrap_or(body.position());
        body.apply_impulse(impulse, point);
        true
    }

    /// Clear force accumulators and refresh derived data from the current pose.
    pub fn start_frame(&mut self) {
        for (_, body) in self.bodies.iter_mut() {
            body.clear_accumulators();
            // Immovable bodies keep their pose bit for bit.
            if !body.is_static() {
                body.calculate_derived_data();
            }
        }
    }

    /// Advance the simulation by exactly `duration` seconds.
    pub fn step_simulation(&mut self, duration: f32) {
        if duration.is_nan() || duration <= 0.0 {
            tracing::debug!(duration, "ignoring non-positive step");
            return;
        }

        self.registry.update_forces(&mut self.bodies, duration);

        for (_, body) in self.bodies.iter_mut() {
            body.integrate(duration);
        }

        self.generate_contacts();

        self.resolver
            .resolve_contacts(self.contacts.as_mut_slice(), &mut self.bodies, duration);

        for (_, body) in self.bodies.iter_mut() {
            body.update_sleep_state(duration);
        }

        self.last_step = StepStats {
            contacts: self.contacts.len(),
            dropped_contacts: self.contacts.dropped(),
            velocity_iterations: self.resolver.velocity_iterations_used(),
            position_iterations: self.resolver.position_iterations_used(),
        };
        tracing::trace!(
            contacts = self.last_step.contacts,
            velocity_iterations = self.last_step.velocity_iterations,
            position_iterations = self.last_step.position_iterations,
            "physics step"
        );
    }

    /// Step the physics simulation forward by `delta_time` seconds.
    ///
    /// Uses a fixed timestep accumulator. Returns the number of sub-steps run.
    ///
    /// Every sub-step starts with [`PhysicsWorld::start_frame`], so force
    /// accumulators only carry what generators add during the step.
    pub fn step(&mut self, delta_time: f64) -> u32 {
        self.accumulator += delta_time;

        let mut substeps = 0u32;
        while self.accumulator >= self.config.fixed_timestep && substeps < self.config.max_substeps
        {
            self.start_frame();
            self.step_simulation(self.config.fixed_timestep as f32);
            self.accumulator -= self.config.fixed_timestep;
            substeps += 1;
        }

        // Clamp accumulator to avoid spiral of death
        if self.accumulator > self.config.fixed_timestep * self.config.max_substeps as f64 {
            self.accumulator = 0.0;
        }
        substeps
    }

    /// Refill the contact buffer: queued external contacts first, then the
    /// built-in tests in primitive id order. Returns the number of contacts.
    pub fn generate_contacts(&mut self) -> usize {
        self.contacts.clear();

        for contact in self.pending_contacts.drain(..) {
            self.contacts.push(contact);
        }

        let proxies: Vec<PrimitiveProxy> = self
            .primitives
            .iter()
            .filter_map(|(id, primitive)| PrimitiveProxy::new(*id, primitive, &self.bodies))
            .collect();

        for (i, j) in self.broadphase.find_pairs(&proxies) {
            detect_collision(&proxies[i], &proxies[j], &mut self.contacts);
        }

        if self.contacts.dropped() > 0 {
            tracing::warn!(
                dropped = self.contacts.dropped(),
                capacity = self.contacts.capacity(),
                "contact buffer full, dropping contacts"
            );
        }
        self.contacts.len()
    }

    pub fn pose(&self, handle: BodyHandle) -> Option<BodyPose> {
        self.bodies.get(handle).map(RigidBody::pose)
    }

    /// Poses of all bodies in handle slot order.
    pub fn poses(&self) -> impl Iterator<Item = (BodyHandle, BodyPose)> + '_ {
        self.bodies.iter().map(|(handle, body)| (handle, body.pose()))
    }

    /// Contacts resolved during the last step.
    pub fn contacts(&self) -> &[Contact] {
        self.contacts.as_slice()
    }

    pub fn last_step(&self) -> StepStats {
        self.last_step
    }
}
