//! Snowball Clash headless runner
//!
//! Runs a scripted match at the fixed timestep and logs what happens. Agents
//! wander on circles around the arena; AI agents that lose their ball run
//! away from the threat for a moment.
//!
//! Usage: `snowball-clash [tuning.json] [--seed N] [--seconds S]`

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use glam::{Vec2, Vec3};
use serde::Serialize;

use snowball_clash::consts::*;
use snowball_clash::sim::{
    Controller, EntityId, FixedStepper, FlatGround, GameEvent, MatchState, TickInput, Transform,
};
use snowball_clash::{Tuning, planar, unplanar};

/// Run a scripted headless match and print a JSON summary
#[derive(Parser, Debug)]
#[command(name = "snowball-clash")]
#[command(version, about, long_about = None)]
struct Args {
    /// Tuning JSON file (defaults when omitted)
    tuning: Option<PathBuf>,

    /// Match seed
    #[arg(long, default_value_t = 12345)]
    seed: u64,

    /// Simulated seconds to run
    #[arg(long, default_value_t = 30.0, value_parser = parse_seconds)]
    seconds: f32,
}

fn parse_seconds(s: &str) -> Result<f32, String> {
    let seconds: f32 = s.parse().map_err(|err| format!("{err}"))?;
    if seconds.is_finite() && seconds >= 0.0 {
        Ok(seconds)
    } else {
        Err(format!("expected a finite, non-negative duration, got {s}"))
    }
}

/// Scripted stand-in for the movement/AI layer
#[derive(Debug, Clone, Copy)]
struct Wander {
    center: Vec2,
    radius: f32,
    angular_speed: f32,
    phase: f32,
    /// Flee direction and remaining time
    flee: Option<(Vec2, f32)>,
}

impl Wander {
    fn new(index: usize) -> Self {
        let i = index as f32;
        Self {
            center: Vec2::new((i * 1.7).sin() * 4.0, (i * 2.3).cos() * 4.0),
            radius: 3.0 + (index % 4) as f32 * 2.0,
            angular_speed: if index % 2 == 0 { 0.6 } else { -0.45 },
            phase: i,
            flee: None,
        }
    }

    fn next(&mut self, current: Vec3, dt: f32) -> Transform {
        const FLEE_SPEED: f32 = 6.0;

        if let Some((dir, time_left)) = self.flee {
            let next = planar(current) + dir * FLEE_SPEED * dt;
            self.flee = (time_left > dt).then_some((dir, time_left - dt));
            return Transform::new(unplanar(next, current.y), dir.x.atan2(dir.y));
        }

        self.phase += self.angular_speed * dt;
        let target = self.center + Vec2::from_angle(self.phase) * self.radius;
        let step = target - planar(current);
        let heading = if step.length_squared() > DEGENERATE_SQ {
            step.x.atan2(step.y)
        } else {
            0.0
        };
        let max_step = 5.0 * dt;
        let next = planar(current) + step.clamp_length_max(max_step);
        Transform::new(unplanar(next, current.y), heading)
    }

    fn flee_from(&mut self, from: Vec3, threat: Vec3, duration: f32) {
        let away = (planar(from) - planar(threat)).normalize_or(Vec2::X);
        self.flee = Some((away, duration));
    }
}

/// End-of-match line per agent
#[derive(Debug, Serialize)]
struct Standing {
    agent: EntityId,
    controller: Controller,
    defeats: u32,
    ball_radius: Option<f32>,
}

#[derive(Debug, Default, Serialize)]
struct Summary {
    seed: u64,
    ticks: u64,
    agent_defeats: u32,
    ball_defeats: u32,
    collisions: u32,
    standings: Vec<Standing>,
}

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    let tuning = match &args.tuning {
        Some(path) => match Tuning::load(path) {
            Ok(tuning) => tuning,
            Err(err) => {
                log::error!("{}: {err}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => Tuning::default(),
    };
    let Args { seed, seconds, .. } = args;

    log::info!("Snowball Clash (headless) starting, seed {seed}, {seconds}s");

    let mut state = MatchState::new(tuning, seed, Box::new(FlatGround::default()));
    state.start();

    let mut wanderers: HashMap<EntityId, Wander> = state
        .world
        .agents
        .iter()
        .enumerate()
        .map(|(i, a)| (a.id, Wander::new(i)))
        .collect();

    let mut summary = Summary {
        seed,
        ..Default::default()
    };
    let mut stepper = FixedStepper::new();
    let frame_dt = 1.0 / 60.0;
    let frames = (seconds / frame_dt) as u32;

    for _ in 0..frames {
        let mut input = TickInput::default();
        for agent in state.world.active_agents() {
            if let Some(wander) = wanderers.get_mut(&agent.id) {
                input = input.place(agent.id, wander.next(agent.transform.position, frame_dt));
            }
        }
        stepper.advance(&mut state, &input, frame_dt);

        for event in state.drain_events() {
            match event {
                GameEvent::AgentDefeated { .. } => summary.agent_defeats += 1,
                GameEvent::BallDefeated { .. } => summary.ball_defeats += 1,
                GameEvent::Collision(_) => summary.collisions += 1,
                GameEvent::FleeFrom {
                    agent,
                    threat_position,
                    duration,
                    ..
                } => {
                    let position = state.world.position_of(agent);
                    if let (Some(wander), Some(position)) = (wanderers.get_mut(&agent), position) {
                        wander.flee_from(position, threat_position, duration);
                    }
                }
                _ => {}
            }
        }

        if let Some(radius) = state.player_ball_radius() {
            log::trace!("player ball radius {radius:.3}");
        }
    }

    summary.ticks = state.time_ticks;
    summary.standings = state
        .world
        .agents
        .iter()
        .map(|a| Standing {
            agent: a.id,
            controller: a.controller,
            defeats: a.lifecycle().defeats(),
            ball_radius: a.ball.and_then(|b| state.ball_radius(b)),
        })
        .collect();

    state.end();

    match serde_json::to_string_pretty(&summary) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("Failed to serialize summary: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["snowball-clash"]).unwrap();
        assert_eq!(args.tuning, None);
        assert_eq!(args.seed, 12345);
        assert_eq!(args.seconds, 30.0);
    }

    #[test]
    fn test_args_reject_bad_values() {
        assert!(Args::try_parse_from(["snowball-clash", "--seed", "notaseed"]).is_err());
        assert!(Args::try_parse_from(["snowball-clash", "--seconds", "nan"]).is_err());
        assert!(Args::try_parse_from(["snowball-clash", "--seconds", "-1"]).is_err());
    }

    #[test]
    fn test_args_tuning_path_and_flags() {
        let args =
            Args::try_parse_from(["snowball-clash", "t.json", "--seed", "7", "--seconds", "2.5"])
                .unwrap();
        assert_eq!(args.tuning, Some(PathBuf::from("t.json")));
        assert_eq!(args.seed, 7);
        assert_eq!(args.seconds, 2.5);
    }
}
