//! Force generators and the registry that applies them once per step.

use std::collections::BTreeMap;
use std::fmt;

use glam::Vec3;

use super::body_set::{BodyHandle, BodySet};
use super::rigid_body::RigidBody;

/// A source of force applied to registered bodies every step.
pub trait ForceGenerator: fmt::Debug {
    /// Add this generator's contribution to the body's accumulators.
    fn update_force(&mut self, body: &mut RigidBody, duration: f32);

    /// Once true, the registry drops the generator and never calls it again.
    fn is_done(&self) -> bool {
        false
    }
}

/// Identifier of a generator owned by a [`ForceRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ForceGeneratorId(u32);

/// Constant acceleration scaled by each body's mass.
#[derive(Debug, Clone, Copy)]
pub struct Gravity {
    pub acceleration: Vec3,
}

impl Gravity {
    pub fn new(acceleration: Vec3) -> Self {
        Self { acceleration }
    }
}

impl ForceGenerator for Gravity {
    fn update_force(&mut self, body: &mut RigidBody, _duration: f32) {
        // Sleeping bodies stay asleep under gravity alone.
        if body.has_finite_mass() && body.is_awake() {
            body.add_force(self.acceleration * body.mass());
        }
    }
}

/// Where an [`ImpulseGenerator`] applies its force.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ApplicationPoint {
    CenterOfMass,
    /// A world-space point.
    World(Vec3),
    /// A body-space point, transformed with the body's pose when applied.
    Body(Vec3),
}

/// A force applied exactly once, after which the generator is done.
///
/// Registered against several bodies, only the first one receives it.
#[derive(Debug, Clone, Copy)]
pub struct ImpulseGenerator {
    force: Vec3,
    point: ApplicationPoint,
    done: bool,
}

impl ImpulseGenerator {
    pub fn new(force: Vec3) -> Self {
        Self::at(force, ApplicationPoint::CenterOfMass)
    }

    pub fn at(force: Vec3, point: ApplicationPoint) -> Self {
        Self {
            force,
            point,
            done: false,
        }
    }

    pub fn force(&self) -> Vec3 {
        self.force
    }

    pub fn point(&self) -> ApplicationPoint {
        self.point
    }
}

impl ForceGenerator for ImpulseGenerator {
    fn update_force(&mut self, body: &mut RigidBody, _duration: f32) {
        if self.done {
            return;
        }
        match self.point {
            ApplicationPoint::CenterOfMass => body.add_force(self.force),
            ApplicationPoint::World(p) => body.add_force_at_point(self.force, p),
            ApplicationPoint::Body(p) => body.add_force_at_body_point(self.force, p),
        }
        self.done = true;
    }

    fn is_done(&self) -> bool {
        self.done
    }
}

/// A (body, generator) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForceRegistration {
    pub body: BodyHandle,
    pub generator: ForceGeneratorId,
}

/// Owns force generators and the bodies they are registered against.
///
/// Registrations are applied in insertion order, so identical inputs always
/// produce identical accumulated forces.
#[derive(Debug, Default)]
pub struct ForceRegistry {
    generators: BTreeMap<ForceGeneratorId, Box<dyn ForceGenerator>>,
    registrations: Vec<ForceRegistration>,
    next_id: u32,
}

impl ForceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a generator. Ids are never reused.
    pub fn insert_generator(
        &mut self,
        generator: impl ForceGenerator + 'static,
    ) -> ForceGeneratorId {
        let id = ForceGeneratorId(self.next_id);
        self.next_id += 1;
        self.generators.insert(id, Box::new(generator));
        id
    }

    pub fn generator(&self, id: ForceGeneratorId) -> Option<&dyn ForceGenerator> {
        self.generators.get(&id).map(|g| g.as_ref())
    }

    /// Drop a generator together with all of its registrations.
    pub fn remove_generator(&mut self, id: ForceGeneratorId) -> Option<Box<dyn ForceGenerator>> {
        let generator = self.generators.remove(&id)?;
        self.registrations.retain(|r| r.generator != id);
        Some(generator)
    }

    /// Register a generator against a body.
    ///
    /// Registering the same pair twice, or an unknown generator, is a
    /// programming error: it asserts in debug builds and is ignored otherwise.
    pub fn add(&mut self, body: BodyHandle, generator: ForceGeneratorId) -> bool {
        let registration = ForceRegistration { body, generator };
        let known = self.generators.contains_key(&generator);
        let duplicate = self.registrations.contains(&registration);
        debug_assert!(known, "unknown force generator {:?}", generator);
        debug_assert!(!duplicate, "duplicate force registration {:?}", registration);
        if !known || duplicate {
            return false;
        }
        self.registrations.push(registration);
        true
    }

    /// Unregister a pair, keeping the order of the remaining registrations.
    pub fn remove(&mut self, body: BodyHandle, generator: ForceGeneratorId) -> bool {
        let target = ForceRegistration { body, generator };
        match self.registrations.iter().position(|r| *r == target) {
            Some(index) => {
                self.registrations.remove(index);
                true
            }
            None => false,
        }
    }

    /// Unregister every generator from a body.
    pub fn remove_body(&mut self, body: BodyHandle) {
        self.registrations.retain(|r| r.body != body);
    }

    pub fn clear(&mut self) {
        self.registrations.clear();
    }

    pub fn registrations(&self) -> &[ForceRegistration] {
        &self.registrations
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Drop done generators and their registrations.
    pub fn remove_unused(&mut self) {
        self.generators.retain(|_, g| !g.is_done());
        let generators = &self.generators;
        self.registrations
            .retain(|r| generators.contains_key(&r.generator));
    }

    /// Purge done generators, then run each remaining registration once.
    ///
    /// A generator that becomes done part way through is skipped for the
    /// rest of the pass. Registrations against removed bodies are skipped.
    pub fn update_forces(&mut self, bodies: &mut BodySet, duration: f32) {
        self.remove_unused();

        for registration in &self.registrations {
            let Some(generator) = self.generators.get_mut(&registration.generator) else {
                continue;
            };
            if generator.is_done() {
                continue;
            }
            if let Some(body) = bodies.get_mut(registration.body) {
                generator.update_force(body, duration);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::rigid_body::RigidBodyDesc;

    fn spawn(bodies: &mut BodySet, mass: f32) -> BodyHandle {
        bodies.insert(RigidBodyDesc::sphere(mass, 1.0).build().unwrap())
    }

    /// Counts its invocations and reports done after `limit` of them.
    #[derive(Debug)]
    struct Counting {
        calls: u32,
        limit: u32,
    }

    impl ForceGenerator for Counting {
        fn update_force(&mut self, body: &mut RigidBody, _duration: f32) {
            self.calls += 1;
            body.add_force(Vec3::X);
        }

        fn is_done(&self) -> bool {
            self.calls >= self.limit
        }
    }

    #[test]
    fn test_gravity_scales_with_mass() {
        let mut bodies = BodySet::new();
        let light = spawn(&mut bodies, 1.0);
        let heavy = spawn(&mut bodies, 5.0);
        let fixed = bodies.insert(RigidBodyDesc::fixed().build().unwrap());

        let mut registry = ForceRegistry::new();
        let gravity = registry.insert_generator(Gravity::new(Vec3::new(0.0, -10.0, 0.0)));
        for body in [light, heavy, fixed] {
            assert!(registry.add(body, gravity));
        }

        registry.update_forces(&mut bodies, 0.1);

        assert_eq!(bodies.get(light).unwrap().force_accumulator().y, -10.0);
        assert_eq!(bodies.get(heavy).unwrap().force_accumulator().y, -50.0);
        assert_eq!(bodies.get(fixed).unwrap().force_accumulator(), Vec3::ZERO);
        assert!(registry.generator(gravity).is_some());
    }

    #[test]
    fn test_gravity_skips_sleeping_bodies() {
        let mut bodies = BodySet::new();
        let body = spawn(&mut bodies, 1.0);
        bodies.get_mut(body).unwrap().set_awake(false);

        let mut registry = ForceRegistry::new();
        let gravity = registry.insert_generator(Gravity::new(Vec3::NEG_Y));
        registry.add(body, gravity);
        registry.update_forces(&mut bodies, 0.1);

        let b = bodies.get(body).unwrap();
        assert!(!b.is_awake());
        assert_eq!(b.force_accumulator(), Vec3::ZERO);
    }

    #[test]
    fn test_impulse_applied_exactly_once() {
        let mut bodies = BodySet::new();
        let a = spawn(&mut bodies, 1.0);
        let b = spawn(&mut bodies, 1.0);

        let mut registry = ForceRegistry::new();
        let impulse = registry.insert_generator(ImpulseGenerator::new(Vec3::new(3.0, 0.0, 0.0)));
        registry.add(a, impulse);
        registry.add(b, impulse);

        registry.update_forces(&mut bodies, 0.1);
        assert_eq!(bodies.get(a).unwrap().force_accumulator().x, 3.0);
        assert_eq!(bodies.get(b).unwrap().force_accumulator(), Vec3::ZERO);

        for (_, body) in bodies.iter_mut() {
            body.clear_accumulators();
        }
        registry.update_forces(&mut bodies, 0.1);

        assert_eq!(bodies.get(a).unwrap().force_accumulator(), Vec3::ZERO);
        assert!(registry.is_empty());
        assert!(registry.generator(impulse).is_none());
    }

    #[test]
    fn test_impulse_at_body_point() {
        let mut bodies = BodySet::new();
        let a = bodies.insert(
            RigidBodyDesc::sphere(1.0, 1.0)
                .with_position(Vec3::new(0.0, 2.0, 0.0))
                .build()
                .unwrap(),
        );

        let mut registry = ForceRegistry::new();
        let id = registry.insert_generator(ImpulseGenerator::at(
            Vec3::Y,
            ApplicationPoint::Body(Vec3::X),
        ));
        registry.add(a, id);
        registry.update_forces(&mut bodies, 0.1);

        let body = bodies.get(a).unwrap();
        assert_eq!(body.force_accumulator(), Vec3::Y);
        assert!((body.torque_accumulator() - Vec3::Z).length() < 1e-6);
    }

    #[test]
    fn test_done_generator_purged_before_next_pass() {
        let mut bodies = BodySet::new();
        let a = spawn(&mut bodies, 1.0);

        let mut registry = ForceRegistry::new();
        let twice = registry.insert_generator(Counting { calls: 0, limit: 2 });
        let forever = registry.insert_generator(Gravity::new(Vec3::NEG_Y));
        registry.add(a, twice);
        registry.add(a, forever);

        for _ in 0..5 {
            registry.update_forces(&mut bodies, 0.1);
        }

        assert!(registry.generator(twice).is_none());
        assert_eq!(
            registry.registrations(),
            &[ForceRegistration {
                body: a,
                generator: forever
            }]
        );
        // 2 calls of +X, 5 of gravity
        let force = bodies.get(a).unwrap().force_accumulator();
        assert_eq!(force, Vec3::new(2.0, -5.0, 0.0));
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut bodies = BodySet::new();
        let handles: Vec<_> = (0..4).map(|_| spawn(&mut bodies, 1.0)).collect();

        let mut registry = ForceRegistry::new();
        let gravity = registry.insert_generator(Gravity::new(Vec3::NEG_Y));
        for h in &handles {
            registry.add(*h, gravity);
        }

        assert!(registry.remove(handles[1], gravity));
        assert!(!registry.remove(handles[1], gravity));

        let order: Vec<_> = registry.registrations().iter().map(|r| r.body).collect();
        assert_eq!(order, vec![handles[0], handles[2], handles[3]]);
    }

    #[test]
    fn test_stale_body_skipped() {
        let mut bodies = BodySet::new();
        let a = spawn(&mut bodies, 1.0);
        let b = spawn(&mut bodies, 1.0);

        let mut registry = ForceRegistry::new();
        let gravity = registry.insert_generator(Gravity::new(Vec3::NEG_Y));
        registry.add(a, gravity);
        registry.add(b, gravity);
        bodies.remove(a);

        registry.update_forces(&mut bodies, 0.1);
        assert_eq!(bodies.get(b).unwrap().force_accumulator(), Vec3::NEG_Y);

        registry.remove_body(a);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_generator_drops_registrations() {
        let mut bodies = BodySet::new();
        let a = spawn(&mut bodies, 1.0);

        let mut registry = ForceRegistry::new();
        let gravity = registry.insert_generator(Gravity::new(Vec3::NEG_Y));
        registry.add(a, gravity);

        assert!(registry.remove_generator(gravity).is_some());
        assert!(registry.is_empty());
        assert!(registry.remove_generator(gravity).is_none());
    }
}
