//! Episode loop: epsilon-greedy rollouts, experience replay, periodic target
//! syncs, plus greedy evaluation of a trained agent.

use rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, info};

use crate::config::TrainingConfig;
use crate::environment::{ShakeEnvironment, Simulator};
use crate::error::Result;
use crate::qnetwork::{epsilon_for_episode, DqnAgent};
use crate::replay_buffer::{ReplayBuffer, Transition};

/// Outcome of one training episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    pub episode: usize,
    pub steps: usize,
    /// Sum of the per-step rewards.
    pub reward: f32,
    pub reached_goal: bool,
    pub learn_steps: usize,
    pub epsilon: f64,
}

pub struct Trainer<S, C> {
    config: TrainingConfig,
    agent: DqnAgent,
    buffer: ReplayBuffer,
    env: ShakeEnvironment<S, C>,
    rng: StdRng,
}

impl<S, C> Trainer<S, C>
where
    S: Simulator,
    C: FnMut() -> Result<S>,
{
    pub fn new(config: TrainingConfig, env: ShakeEnvironment<S, C>) -> Result<Self> {
        let agent = DqnAgent::new(&config)?;
        Self::with_agent(config, agent, env, StdRng::from_os_rng())
    }

    /// Seeds both the action/sampling RNG and torch's weight initialization.
    pub fn seeded(config: TrainingConfig, env: ShakeEnvironment<S, C>, seed: u64) -> Result<Self> {
        tch::manual_seed(seed as i64);
        let agent = DqnAgent::new(&config)?;
        Self::with_agent(config, agent, env, StdRng::seed_from_u64(seed))
    }

    pub fn with_agent(
        config: TrainingConfig,
        agent: DqnAgent,
        env: ShakeEnvironment<S, C>,
        rng: StdRng,
    ) -> Result<Self> {
        config.validate()?;
        let buffer = ReplayBuffer::new(config.buffer_size);
        Ok(Self {
            config,
            agent,
            buffer,
            env,
            rng,
        })
    }

    pub fn agent(&self) -> &DqnAgent {
        &self.agent
    }

    pub fn buffer(&self) -> &ReplayBuffer {
        &self.buffer
    }

    pub fn env(&self) -> &ShakeEnvironment<S, C> {
        &self.env
    }

    /// Runs every configured episode, then stops the simulator.
    pub fn train(&mut self) -> Result<Vec<EpisodeSummary>> {
        self.train_with(|_| {})
    }

    /// Like [`Trainer::train`], calling `on_episode` after each episode.
    ///
    /// Every episode gets a fresh session: the simulator is reset before the
    /// first one and again after each.
    pub fn train_with<F>(&mut self, mut on_episode: F) -> Result<Vec<EpisodeSummary>>
    where
        F: FnMut(&EpisodeSummary),
    {
        let mut summaries = Vec::with_capacity(self.config.episodes);
        self.env.reset()?;
        for episode in 0..self.config.episodes {
            let summary = self.run_episode(episode)?;
            on_episode(&summary);
            summaries.push(summary);
            self.env.reset()?;
        }
        self.env.stop()?;
        Ok(summaries)
    }

    /// Plays one episode in the current session, starting one if none is
    /// running.
    ///
    /// The episode ends when every quadrant is balanced or after `steps`
    /// actions. Learning is skipped until the buffer holds a full batch.
    pub fn run_episode(&mut self, episode: usize) -> Result<EpisodeSummary> {
        info!(episode = episode + 1, "episode started");
        if !self.env.is_running() {
            self.env.reset()?;
        }

        let epsilon = epsilon_for_episode(
            episode,
            self.config.epsilon_floor,
            self.config.epsilon_decay_rate,
        );
        let mut state = self.env.observe()?.state;
        let mut summary = EpisodeSummary {
            episode,
            steps: 0,
            reward: 0.0,
            reached_goal: false,
            learn_steps: 0,
            epsilon,
        };

        for step in 0..self.config.steps {
            let action = self.agent.select_action(state, epsilon, &mut self.rng)?;
            self.env.apply(action)?;

            let observation = self.env.observe()?;
            let done = observation.state.is_goal();
            self.buffer.push(Transition {
                state,
                action,
                reward: observation.reward,
                done,
                next_state: observation.state,
            });
            state = observation.state;
            summary.reward += observation.reward;
            summary.steps += 1;
            debug!(step, %action, %state, reward = observation.reward, "step");

            if self.buffer.len() >= self.config.batch_size {
                let batch = self.buffer.sample(&mut self.rng, self.config.batch_size)?;
                self.agent.learn(&batch)?;
                summary.learn_steps += 1;

                // Gated on the step index within the episode, so the
                // schedule restarts with every episode.
                if self.config.update_freq > 0 && step % self.config.update_freq == 0 {
                    self.agent.sync_target()?;
                    debug!(episode, step, "target network synced");
                }
            }

            if done {
                summary.reached_goal = true;
                info!(episode = episode + 1, step, "all quadrants balanced");
                break;
            }
        }

        info!(
            episode = episode + 1,
            reward = summary.reward,
            steps = summary.steps,
            "episode finished"
        );
        Ok(summary)
    }
}

/// Result of a greedy evaluation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationReport {
    pub episodes: usize,
    /// Episodes in which the goal state was observed.
    pub goals_reached: usize,
    /// Actions taken per episode.
    pub steps: Vec<usize>,
}

/// Plays `episodes` greedy episodes of at most `steps` actions, each in a
/// fresh session. An episode counts as solved once the goal state is seen.
pub fn evaluate<S, C>(
    agent: &DqnAgent,
    env: &mut ShakeEnvironment<S, C>,
    episodes: usize,
    steps: usize,
) -> Result<EvaluationReport>
where
    S: Simulator,
    C: FnMut() -> Result<S>,
{
    let mut report = EvaluationReport {
        episodes,
        ..Default::default()
    };
    for episode in 0..episodes {
        env.reset()?;
        let mut state = env.observe()?.state;
        let mut taken = 0;
        for _ in 0..steps {
            if state.is_goal() {
                break;
            }
            env.apply(agent.act(state)?)?;
            state = env.observe()?.state;
            taken += 1;
        }
        if state.is_goal() {
            report.goals_reached += 1;
            info!(episode, steps = taken, "reached final state");
        }
        report.steps.push(taken);
        env.stop()?;
    }
    Ok(report)
}
