//! Iterative contact resolver.
//!
//! Each step first removes closing velocity, then interpenetration. Both
//! phases repeatedly pick the worst remaining contact, resolve it in
//! isolation, and update every contact that shares a moved body.

use super::body_set::{BodyHandle, BodySet};
use super::contact::{BodyDelta, Contact};

/// Tuning of the contact resolver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolverConfig {
    /// Velocity iteration budget. `None` uses four per contact.
    pub velocity_iterations: Option<u32>,
    /// Position iteration budget. `None` uses four per contact.
    pub position_iterations: Option<u32>,
    /// Desired velocity changes at or below this are considered resolved.
    pub velocity_epsilon: f32,
    /// Penetrations at or below this are considered resolved.
    pub position_epsilon: f32,
    /// Closing speeds below this do not bounce.
    pub restitution_velocity_limit: f32,
    /// Angular correction cap, as a fraction of the lever arm across the normal.
    pub angular_move_limit: f32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            velocity_iterations: None,
            position_iterations: None,
            velocity_epsilon: 0.01,
            position_epsilon: 0.01,
            restitution_velocity_limit: 0.25,
            angular_move_limit: 0.2,
        }
    }
}

impl ResolverConfig {
    fn budget(limit: Option<u32>, contact_count: usize) -> u32 {
        limit.unwrap_or_else(|| (contact_count as u32).saturating_mul(4))
    }
}

/// Sequential contact resolver.
#[derive(Debug, Clone, Default)]
pub struct ContactResolver {
    config: ResolverConfig,
    velocity_iterations_used: u32,
    position_iterations_used: u32,
}

impl ContactResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            velocity_iterations_used: 0,
            position_iterations_used: 0,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ResolverConfig {
        &mut self.config
    }

    /// Override both iteration budgets.
    pub fn set_iterations(&mut self, velocity: u32, position: u32) {
        self.config.velocity_iterations = Some(velocity);
        self.config.position_iterations = Some(position);
    }

    pub fn velocity_iterations_used(&self) -> u32 {
        self.velocity_iterations_used
    }

    pub fn position_iterations_used(&self) -> u32 {
        self.position_iterations_used
    }

    /// Resolve velocity and then interpenetration for a set of contacts.
    ///
    /// Never fails: when a budget runs out the remaining error is accepted.
    /// Degenerate contacts are skipped.
    pub fn resolve_contacts(
        &mut self,
        contacts: &mut [Contact],
        bodies: &mut BodySet,
        duration: f32,
    ) {
        self.velocity_iterations_used = 0;
        self.position_iterations_used = 0;
        if contacts.is_empty() {
            return;
        }

        self.prepare_contacts(contacts, bodies, duration);
        self.resolve_velocities(contacts, bodies, duration);
        self.resolve_positions(contacts, bodies);
    }

    /// Compute the cached internals of every contact.
    pub fn prepare_contacts(&self, contacts: &mut [Contact], bodies: &BodySet, duration: f32) {
        let limit = self.config.restitution_velocity_limit;
        for (index, contact) in contacts.iter_mut().enumerate() {
            debug_assert!(
                contact.bodies.iter().any(Option::is_some),
                "contact {} references no body",
                index
            );
            if !contact.calculate_internals(bodies, duration, limit) {
                tracing::warn!(
                    index,
                    bodies = ?contact.bodies,
                    normal = ?contact.normal,
                    "skipping degenerate contact"
                );
            }
        }
    }

    /// Velocity phase. Contacts must have been prepared.
    pub fn resolve_velocities(
        &mut self,
        contacts: &mut [Contact],
        bodies: &mut BodySet,
        duration: f32,
    ) {
        let budget = ResolverConfig::budget(self.config.velocity_iterations, contacts.len());
        let limit = self.config.restitution_velocity_limit;
        self.velocity_iterations_used = 0;

        while self.velocity_iterations_used < budget {
            // Strict comparison keeps the first of equally bad contacts.
            let mut worst = self.config.velocity_epsilon;
            let mut selected = None;
            for (index, contact) in contacts.iter().enumerate() {
                if contact.is_resolvable() && contact.desired_delta_velocity() > worst {
                    worst = contact.desired_delta_velocity();
                    selected = Some(index);
                }
            }
            let Some(selected) = selected else {
                break;
            };

            contacts[selected].match_awake_state(bodies);
            contacts[selected].apply_velocity_change(bodies);

            let moved = moved_bodies(&contacts[selected], bodies);
            for contact in contacts.iter_mut() {
                if contact.is_valid() && shares_body(contact, &moved) {
                    contact.calculate_internals(bodies, duration, limit);
                }
            }

            self.velocity_iterations_used += 1;
        }
    }

    /// Position phase. Contacts must have been prepared.
    pub fn resolve_positions(&mut self, contacts: &mut [Contact], bodies: &mut BodySet) {
        let budget = ResolverConfig::budget(self.config.position_iterations, contacts.len());
        self.position_iterations_used = 0;

        while self.position_iterations_used < budget {
            // Contacts with nothing to move would be picked again forever.
            let mut worst = self.config.position_epsilon;
            let mut selected = None;
            for (index, contact) in contacts.iter().enumerate() {
                if contact.is_resolvable() && contact.penetration > worst {
                    worst = contact.penetration;
                    selected = Some(index);
                }
            }
            let Some(selected) = selected else {
                break;
            };

            contacts[selected].match_awake_state(bodies);
            let penetration = contacts[selected].penetration;
            let deltas = contacts[selected].apply_position_change(
                bodies,
                penetration,
                self.config.angular_move_limit,
            );

            let resolved = contacts[selected].bodies;
            for contact in contacts.iter_mut().filter(|c| c.is_valid()) {
                update_penetration(contact, resolved, &deltas);
            }

            self.position_iterations_used += 1;
        }
    }
}

/// Bodies of a contact that can actually change.
fn moved_bodies(contact: &Contact, bodies: &BodySet) -> [Option<BodyHandle>; 2] {
    let mut moved = [None; 2];
    for (index, slot) in moved.iter_mut().enumerate() {
        if contact.is_dynamic(bodies, index) {
            *slot = contact.bodies[index];
        }
    }
    moved
}

fn shares_body(contact: &Contact, moved: &[Option<BodyHandle>; 2]) -> bool {
    contact
        .bodies
        .iter()
        .flatten()
        .any(|handle| moved.contains(&Some(*handle)))
}

/// Adjust a contact's penetration for the movement of bodies it shares with
/// the contact just resolved.
fn update_penetration(
    contact: &mut Contact,
    resolved: [Option<BodyHandle>; 2],
    deltas: &[BodyDelta; 2],
) {
    for body in 0..2 {
        let Some(handle) = contact.bodies[body] else {
            continue;
        };
        for (moved, delta) in resolved.iter().zip(deltas) {
            if *moved != Some(handle) {
                continue;
            }
            let displacement =
                delta.linear + delta.angular.cross(contact.relative_contact_position(body));
            // Body 0 moving along the normal separates; body 1 moving along it closes.
            let sign = if body == 0 { -1.0 } else { 1.0 };
            contact.penetration += sign * displacement.dot(contact.normal);
        }
    }
}
