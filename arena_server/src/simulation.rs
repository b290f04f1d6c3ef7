//! Simulation step.
//!
//! The tick loop calls `Simulation::step` once per tick with every live
//! session's latest command. A step must either complete or leave the world
//! untouched; the tick loop restores the pre-step state when it errors.

use std::collections::BTreeMap;

use arena_shared::{
    command::{Actions, UserCommand},
    entity::EntityKind,
    math::Vec3,
    net::SessionId,
};

use crate::store::EntityStore;

/// Latest command per live session, in ascending id order.
pub type Inputs = BTreeMap<SessionId, UserCommand>;

/// Simulation stepper trait.
pub trait Simulation: Send {
    fn step(&mut self, inputs: &Inputs, world: &mut EntityStore, dt_sec: f64) -> anyhow::Result<()>;
}

/// No-op simulation.
#[derive(Default)]
pub struct NullSimulation;

impl Simulation for NullSimulation {
    fn step(&mut self, _inputs: &Inputs, _world: &mut EntityStore, _dt_sec: f64) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Drives paddles from player input.
///
/// The lowest live session id steers the first paddle slot, the next one the
/// second, and so on. Paddles stay within `±half_height` on the y axis.
pub struct PaddleSimulation {
    pub speed: f64,
    pub half_height: f64,
}

impl PaddleSimulation {
    pub fn new(speed: f64) -> Self {
        Self {
            speed,
            half_height: 100.0,
        }
    }

    fn direction(cmd: &UserCommand) -> f64 {
        match (cmd.is_active(Actions::UP), cmd.is_active(Actions::DOWN)) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => 0.0,
        }
    }
}

impl Simulation for PaddleSimulation {
    fn step(&mut self, inputs: &Inputs, world: &mut EntityStore, dt_sec: f64) -> anyhow::Result<()> {
        anyhow::ensure!(dt_sec.is_finite() && dt_sec >= 0.0, "bad dt {dt_sec}");

        let mut commands = inputs.values();
        let mut next = world.current().to_vec();
        for ent in next.iter_mut().filter(|e| e.kind == EntityKind::Paddle) {
            let dir = commands.next().map_or(0.0, Self::direction);
            if dir == 0.0 {
                ent.velocity = Vec3::ZERO;
                continue;
            }
            let limit = (self.half_height - ent.size.y / 2.0).max(0.0);
            let mut position = ent.position + Vec3::new(0.0, dir * self.speed, 0.0).scale(dt_sec);
            position.y = position.y.clamp(-limit, limit);
            // Report the travel that actually happened, so a pinned paddle rests.
            ent.velocity = if dt_sec > 0.0 {
                (position - ent.position).scale(1.0 / dt_sec)
            } else {
                Vec3::ZERO
            };
            ent.position = position;
        }
        world.restore(&next)
    }
}
