//! Main entry point for the container-mixing DQN.
//! Trains the agent against the simulator and saves it, or loads a saved
//! agent and evaluates it greedily, depending on `run.train`.

use std::path::Path;

use anyhow::{Context, Result};
use tensorboard_rs::summary_writer::SummaryWriter;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mix_dqn::{
    config::Config,
    coppelia::CoppeliaSession,
    environment::ShakeEnvironment,
    qnetwork::DqnAgent,
    trainer::{evaluate, Trainer},
};

const CONFIG_FILE: &str = "mix_dqn.toml";

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    init_logging()?;

    let config = if Path::new(CONFIG_FILE).exists() {
        Config::load(CONFIG_FILE).with_context(|| format!("reading {CONFIG_FILE}"))?
    } else {
        Config::default()
    };
    let run = config.run.clone();

    let sim_config = config.simulator.clone();
    let env = ShakeEnvironment::new(config.simulator.clone(), move || {
        CoppeliaSession::connect(&sim_config)
    });

    if run.train {
        let mut trainer = match run.seed {
            Some(seed) => Trainer::seeded(config.training.clone(), env, seed)?,
            None => Trainer::new(config.training.clone(), env)?,
        };
        info!(device = ?trainer.agent().device(), "starting training");

        let mut writer = SummaryWriter::new(&run.logdir);
        let summaries = trainer.train_with(|summary| {
            writer.add_scalar("rewards/total_reward", summary.reward, summary.episode);
        })?;
        writer.flush();

        let solved = summaries.iter().filter(|s| s.reached_goal).count();
        info!(episodes = summaries.len(), solved, "training finished");

        trainer
            .agent()
            .save(&run.model_path)
            .with_context(|| format!("saving {}", run.model_path.display()))?;
        info!(path = %run.model_path.display(), "agent saved");
    } else {
        let mut agent = DqnAgent::new(&config.training)?;
        agent
            .load(&run.model_path)
            .with_context(|| format!("loading {}", run.model_path.display()))?;
        info!(path = %run.model_path.display(), "loaded saved agent");

        let mut env = env;
        let report = evaluate(&agent, &mut env, run.eval_episodes, run.eval_steps)?;
        info!(
            episodes = report.episodes,
            goals_reached = report.goals_reached,
            "evaluation finished"
        );
    }

    Ok(())
}
