//! Contact detection between agents and balls
//!
//! Every participant is a sphere on the ground plane (height is ignored).
//! A pair reports only when it starts overlapping; it must separate before
//! it can report again. Each new contact is delivered from both sides and
//! the combat resolver decides which side acts on it.

use std::collections::BTreeSet;

use glam::Vec3;

use super::combat::Combatant;
use super::state::{CollisionEvent, EntityId, EntityKind, GameEvent, MatchState, World};
use crate::consts::DEGENERATE_SQ;
use crate::flatten;

/// An overlapping pair, `a` always the lower id
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    pub a: EntityId,
    pub b: EntityId,
    pub owners: (EntityId, EntityId),
    /// Surface point between the two centers
    pub point: Vec3,
    /// Unit normal from `a` toward `b`
    pub normal: Vec3,
    pub penetration: f32,
    /// Closing speed along the normal (0 when separating)
    pub strength: f32,
}

#[derive(Debug, Clone, Copy)]
struct Collider {
    id: EntityId,
    owner: EntityId,
    kind: EntityKind,
    position: Vec3,
    velocity: Vec3,
    radius: f32,
}

fn colliders(world: &World) -> Vec<Collider> {
    let agents = world.active_agents().map(|a| Collider {
        id: a.id,
        owner: a.id,
        kind: EntityKind::Agent,
        position: a.transform.position,
        velocity: Vec3::ZERO,
        radius: a.body_radius,
    });
    let balls = world.active_balls().map(|b| Collider {
        id: b.id,
        owner: b.owner,
        kind: EntityKind::Ball,
        position: b.body.position,
        velocity: b.body.velocity,
        radius: b.radius(),
    });
    let mut all: Vec<Collider> = agents.chain(balls).collect();
    all.sort_by_key(|c| c.id);
    all
}

/// Planar sphere overlap. Returns (point, normal a->b, penetration).
pub fn sphere_overlap(pa: Vec3, ra: f32, pb: Vec3, rb: f32) -> Option<(Vec3, Vec3, f32)> {
    let delta = flatten(pb - pa);
    let dist_sq = delta.length_squared();
    let reach = ra + rb;
    if dist_sq >= reach * reach {
        return None;
    }
    let dist = dist_sq.sqrt();
    let normal = if dist_sq < DEGENERATE_SQ {
        Vec3::X
    } else {
        delta / dist
    };
    let point = pa + normal * (ra - (reach - dist) * 0.5);
    Some((point, normal, reach - dist))
}

/// Every overlapping pair this tick, in (lower id, higher id) order.
/// Agent-agent pairs are not contacts.
pub fn find_contacts(world: &World) -> Vec<Contact> {
    let all = colliders(world);
    let mut contacts = Vec::new();
    for (i, a) in all.iter().enumerate() {
        for b in &all[i + 1..] {
            if a.kind == EntityKind::Agent && b.kind == EntityKind::Agent {
                continue;
            }
            let Some((point, normal, penetration)) =
                sphere_overlap(a.position, a.radius, b.position, b.radius)
            else {
                continue;
            };
            let closing = (a.velocity - b.velocity).dot(normal);
            contacts.push(Contact {
                a: a.id,
                b: b.id,
                owners: (a.owner, b.owner),
                point,
                normal,
                penetration,
                strength: closing.max(0.0),
            });
        }
    }
    contacts
}

impl MatchState {
    /// Detect contacts, report the new ones and resolve combat on them.
    /// Returns the number of contacts that began this tick.
    pub(crate) fn process_contacts(&mut self) -> usize {
        let contacts = find_contacts(&self.world);
        let current: BTreeSet<(EntityId, EntityId)> = contacts.iter().map(|c| (c.a, c.b)).collect();
        let began: Vec<Contact> = contacts
            .into_iter()
            .filter(|c| !self.contacts.contains(&(c.a, c.b)))
            .collect();
        self.contacts = current;

        for contact in &began {
            if contact.owners.0 != contact.owners.1 {
                self.push_event(GameEvent::Collision(CollisionEvent {
                    point: contact.point,
                    normal: contact.normal,
                    strength: contact.strength,
                }));
            }
            self.deliver_contact(contact.a, contact.b);
            self.deliver_contact(contact.b, contact.a);
        }
        began.len()
    }

    /// One side's view of a contact. Only the canonical side produces a verdict.
    fn deliver_contact(&mut self, from: EntityId, other: EntityId) {
        let verdict = {
            let (Some(a), Some(b)) = (combatant(&self.world, from), combatant(&self.world, other))
            else {
                return;
            };
            self.resolver.resolve(a, b)
        };
        match verdict {
            Ok(verdict) => {
                log::debug!("Contact {from}/{other}: {} beats {}", verdict.winner, verdict.loser);
                self.defeat(verdict.loser, Some(verdict.winner));
            }
            Err(reason) => log::trace!("Contact {from}/{other}: no verdict ({reason:?})"),
        }
    }
}

fn combatant(world: &World, id: EntityId) -> Option<&dyn Combatant> {
    if let Some(agent) = world.agent(id) {
        return Some(agent as &dyn Combatant);
    }
    world.ball(id).map(|b| b as &dyn Combatant)
}
