//! Fixed timestep simulation tick
//!
//! Per physics tick, in order:
//! 1. apply agent placements from the movement controller
//! 2. advance the scheduler and fire due timers
//! 3. follow motors set ball velocities
//! 4. integrate ball bodies
//! 5. detect contacts and resolve combat
//!
//! Growth sampling and visual smoothing run per frame in [`frame`].

use super::motor::FollowMotor;
use super::state::{Body, EntityId, MatchPhase, MatchState, Transform};
use crate::consts::*;

/// Agent transforms produced by the movement layer for one tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    pub placements: Vec<(EntityId, Transform)>,
}

impl TickInput {
    pub fn place(mut self, agent: EntityId, transform: Transform) -> Self {
        self.placements.push((agent, transform));
        self
    }
}

/// Advance the match by one fixed timestep
pub fn tick(state: &mut MatchState, input: &TickInput, dt: f32) {
    if state.phase == MatchPhase::Ended {
        return;
    }
    state.time_ticks += 1;

    for &(agent, transform) in &input.placements {
        if !state.place_agent(agent, transform) {
            log::trace!("Placement for unavailable agent {agent} ignored");
        }
    }

    state.fire_due_timers(dt);

    step_balls(state, dt);

    state.process_contacts();
}

/// Motor then integration for every active ball, in id order
fn step_balls(state: &mut MatchState, dt: f32) {
    let MatchState { world, .. } = state;
    let mut order: Vec<usize> = (0..world.balls.len())
        .filter(|&i| world.balls[i].active)
        .collect();
    order.sort_by_key(|&i| world.balls[i].id);

    for i in order {
        let owner = world.balls[i].owner;
        let Some(owner_transform) = world.agent(owner).map(|a| a.transform) else {
            continue;
        };
        let ball = &mut world.balls[i];
        let radius = ball.growth.radius();
        drive(&ball.motor, &mut ball.body, &owner_transform, radius, dt);
    }
}

fn drive(motor: &FollowMotor, body: &mut Body, owner: &Transform, radius: f32, dt: f32) {
    motor.step(body, owner, radius, dt);
    motor.integrate(body, dt);
}

/// Per-frame work: growth from movement, then visual smoothing
pub fn frame(state: &mut MatchState, frame_dt: f32) {
    for ball in state.world.balls.iter_mut().filter(|b| b.active) {
        ball.growth.sample(ball.body.position);
        ball.growth.smooth_visual(frame_dt);
    }
}

/// Accumulates frame time into fixed physics steps
#[derive(Debug, Clone, Default)]
pub struct FixedStepper {
    accumulator: f32,
}

impl FixedStepper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run as many ticks as `frame_dt` covers (capped), then the frame update.
    /// Returns the number of ticks run.
    pub fn advance(&mut self, state: &mut MatchState, input: &TickInput, frame_dt: f32) -> u32 {
        self.accumulator += frame_dt.clamp(0.0, MAX_FRAME_DT);

        let idle = TickInput::default();
        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            // Placements apply on the first substep only
            let step_input = if substeps == 0 { input } else { &idle };
            tick(state, step_input, SIM_DT);
            self.accumulator -= SIM_DT;
            substeps += 1;
        }
        if substeps == MAX_SUBSTEPS {
            self.accumulator = 0.0;
        }

        frame(state, frame_dt);
        substeps
    }

    /// Leftover time as a fraction of a tick (for render interpolation)
    pub fn alpha(&self) -> f32 {
        self.accumulator / SIM_DT
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}
