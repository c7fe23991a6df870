//! This module defines the shaking environment: the four discrete actions,
//! the narrow interface to the remote physics simulator, and the adapter that
//! turns simulator sessions into episodes.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::config::SimulatorConfig;
use crate::error::{MixError, Result};
use crate::state::{self, Observation};

/// Opaque object or script handle issued by the simulator.
pub type Handle = i64;

/// Defines the possible actions the agent can take.
/// Each one shakes the container back and forth along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Up,
    Down,
    Right,
    Left,
}

impl Action {
    /// All actions in network output order.
    pub const ALL: [Action; 4] = [Action::Up, Action::Down, Action::Right, Action::Left];

    /// Index of the action-value this action corresponds to.
    pub fn index(self) -> usize {
        match self {
            Action::Up => 0,
            Action::Down => 1,
            Action::Right => 2,
            Action::Left => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Action> {
        Self::ALL.get(index).copied()
    }

    /// The axis the shake runs along (0 = x, 1 = y) and the sign of its
    /// first half. The second half moves back by the same distance.
    fn shake(self) -> (usize, f64) {
        match self {
            Action::Up => (1, 1.0),
            Action::Down => (1, -1.0),
            Action::Right => (0, 1.0),
            Action::Left => (0, -1.0),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Up => "Up",
            Action::Down => "Down",
            Action::Right => "Right",
            Action::Left => "Left",
        };
        f.write_str(name)
    }
}

impl FromStr for Action {
    type Err = MixError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Up" => Ok(Action::Up),
            "Down" => Ok(Action::Down),
            "Right" => Ok(Action::Right),
            "Left" => Ok(Action::Left),
            other => Err(MixError::InvalidAction(other.to_string())),
        }
    }
}

/// The slice of the simulator's remote API the agent relies on.
///
/// Implemented over the real remote API by [`crate::coppelia::CoppeliaSession`]
/// and by in-memory fakes in tests.
pub trait Simulator {
    /// Looks up an object by scene path (`/Table/Box`) or bare name (`Cylinder3`).
    fn object_handle(&mut self, name: &str) -> Result<Handle>;

    /// The child script attached to `object`.
    fn child_script(&mut self, object: Handle) -> Result<Handle>;

    fn start_simulation(&mut self) -> Result<()>;

    fn stop_simulation(&mut self) -> Result<()>;

    /// Advances the simulation by one tick.
    fn step(&mut self) -> Result<()>;

    /// World-frame position of an object.
    fn object_position(&mut self, object: Handle) -> Result<[f64; 3]>;

    fn set_object_position(&mut self, object: Handle, position: [f64; 3]) -> Result<()>;

    fn call_script_function(
        &mut self,
        function: &str,
        script: Handle,
        ints: &[i64],
        floats: &[f64],
        strings: &[&str],
    ) -> Result<()>;

    /// Current value of a float signal, `None` while it is unset.
    fn float_signal(&mut self, name: &str) -> Result<Option<f64>>;

    fn set_float_signal(&mut self, name: &str, value: f64) -> Result<()>;
}

/// A live simulation together with the handles looked up for it.
struct Session<S> {
    sim: S,
    box_handle: Handle,
    objects: Vec<Handle>,
}

/// Episode-level view of the simulator.
///
/// Owns at most one session at a time. `reset` throws the current session
/// away and connects a fresh one through `connect`, so no state leaks from
/// one episode into the next.
pub struct ShakeEnvironment<S, C> {
    config: SimulatorConfig,
    connect: C,
    session: Option<Session<S>>,
}

impl<S, C> ShakeEnvironment<S, C>
where
    S: Simulator,
    C: FnMut() -> Result<S>,
{
    pub fn new(config: SimulatorConfig, connect: C) -> Self {
        Self {
            config,
            connect,
            session: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    /// Stops any running session and starts a fresh one with newly dropped objects.
    pub fn reset(&mut self) -> Result<()> {
        self.stop()?;

        let mut sim = (self.connect)()?;
        let table = sim.object_handle(&self.config.table_path)?;
        let box_handle = sim.object_handle(&self.config.box_path)?;
        sim.start_simulation()?;
        self.drop_objects(&mut sim, table)?;

        let objects = (0..self.config.blocks)
            .map(|i| sim.object_handle(&format!("{}{}", self.config.object_prefix, i)))
            .collect::<Result<Vec<_>>>()?;

        self.session = Some(Session {
            sim,
            box_handle,
            objects,
        });
        Ok(())
    }

    /// Asks the table script to spawn the objects, then waits for it to
    /// report that they have landed.
    ///
    /// The wait has no timeout: a scene that never raises the sentinel
    /// blocks here forever.
    fn drop_objects(&self, sim: &mut S, table: Handle) -> Result<()> {
        let cfg = &self.config;
        let script = sim.child_script(table)?;
        sim.step()?;
        sim.call_script_function(
            &cfg.spawn_function,
            script,
            &[cfg.blocks as i64],
            &[
                cfg.block_mass,
                cfg.block_length,
                cfg.friction_cube,
                cfg.friction_cup,
            ],
            &[cfg.shape.as_str()],
        )?;

        loop {
            sim.step()?;
            if sim.float_signal(&cfg.signal_name)? == Some(cfg.drop_sentinel) {
                break;
            }
        }
        for _ in 0..cfg.settle_ticks {
            sim.step()?;
        }
        debug!(blocks = cfg.blocks, "objects dropped");
        Ok(())
    }

    fn session(&mut self) -> Result<&mut Session<S>> {
        self.session.as_mut().ok_or(MixError::NoSession)
    }

    /// Shakes the container: `micro_steps` increments out, the same number
    /// back, one tick after each.
    pub fn apply(&mut self, action: Action) -> Result<()> {
        let span = self.config.span;
        let micro_steps = self.config.micro_steps;
        let session = self.session()?;
        let (axis, sign) = action.shake();

        let mut position = session.sim.object_position(session.box_handle)?;
        for direction in [sign, -sign] {
            for _ in 0..micro_steps {
                position[axis] += direction * span / micro_steps as f64;
                session
                    .sim
                    .set_object_position(session.box_handle, position)?;
                session.sim.step()?;
            }
        }
        Ok(())
    }

    /// Applies an action given by name. Unknown names are reported and
    /// ignored, leaving the scene untouched.
    pub fn apply_named(&mut self, name: &str) -> Result<Option<Action>> {
        match name.parse::<Action>() {
            Ok(action) => {
                self.apply(action)?;
                Ok(Some(action))
            }
            Err(err) => {
                warn!("{err}");
                Ok(None)
            }
        }
    }

    /// XY position of the container.
    pub fn box_position(&mut self) -> Result<[f64; 2]> {
        let session = self.session()?;
        let [x, y, _] = session.sim.object_position(session.box_handle)?;
        Ok([x, y])
    }

    /// XY positions of all objects, in spawn order.
    pub fn object_positions(&mut self) -> Result<Vec<[f64; 2]>> {
        let session = self.session()?;
        session
            .objects
            .iter()
            .map(|&handle| {
                let [x, y, _] = session.sim.object_position(handle)?;
                Ok([x, y])
            })
            .collect()
    }

    /// Reads the scene and encodes it.
    pub fn observe(&mut self) -> Result<Observation> {
        let container = self.box_position()?;
        let objects = self.object_positions()?;
        Ok(state::encode(container, &objects))
    }

    /// Stops and drops the running session, if any.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            session.sim.stop_simulation()?;
        }
        Ok(())
    }
}
