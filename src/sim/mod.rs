//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No rendering, input or platform dependencies

pub mod collision;
pub mod combat;
pub mod growth;
pub mod lifecycle;
pub mod motor;
pub mod scheduler;
pub mod spawn;
pub mod state;
pub mod tick;

pub use collision::{Contact, find_contacts, sphere_overlap};
pub use combat::{Combatant, CombatResolver, Defeatable, NoVerdict, OwnerIdentifiable, SizeProvider, Verdict};
pub use growth::{GrowthCurve, GrowthModel};
pub use lifecycle::{AgentLifecycle, AgentPhase, BallLifecycle, BallPhase, DefeatCause};
pub use motor::{FollowMotor, MotorStatus, VerticalMode};
pub use scheduler::{Scheduler, TimerEvent, TimerHandle};
pub use spawn::{DiscArena, FlatGround, SpawnCoordinator, SpawnDeck, TerrainSampler};
pub use state::{
    Agent, Ball, Body, CollisionEvent, Controller, Debris, EntityId, EntityKind, GameEvent,
    MatchPhase, MatchState, Transform, World,
};
pub use tick::{FixedStepper, TickInput, frame, tick};
