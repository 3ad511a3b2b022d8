use std::{fs::File, path::Path, time::Duration};

use polars::{
    frame::DataFrame,
    io::SerWriter,
    prelude::{Column, CsvWriter},
};

use crate::{
    agent::{Learner, TrainOutcome},
    config::EpsilonSchedule,
    environment::{Environment, reset_with_retry},
    error::Result,
};

const RESET_ATTEMPTS: usize = 3;
const RESET_BACKOFF: Duration = Duration::from_millis(500);

/// Step metadata that can say how many bugs the step uncovered.
pub trait DetectionCount {
    fn detection_count(&self) -> usize;
}

impl DetectionCount for () {
    fn detection_count(&self) -> usize {
        0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeReport {
    pub episode: usize,
    pub steps: usize,
    pub total_reward: f32,
    pub bugs_found: usize,
    pub epsilon: f32,
    /// Gradient steps taken during the episode.
    pub updates: usize,
    pub mean_loss: Option<f32>,
    /// Ended by the environment rather than by the step limit.
    pub done: bool,
}

/// Plays one episode of at most `max_steps` steps. With `train` set every
/// transition is stored and followed by a training call.
pub fn run_episode<E>(
    env: &mut E,
    learner: &mut Learner,
    train: bool,
    max_steps: usize,
) -> Result<EpisodeReport>
where
    E: Environment,
    E::Info: DetectionCount,
{
    let mut state = reset_with_retry(env, RESET_ATTEMPTS, RESET_BACKOFF)?;
    let space = learner.action_space();
    let mut report = EpisodeReport {
        episode: 0,
        steps: 0,
        total_reward: 0.0,
        bugs_found: 0,
        epsilon: learner.epsilon(),
        updates: 0,
        mean_loss: None,
        done: false,
    };
    let mut loss_sum = 0.0;

    while report.steps < max_steps {
        let index = learner.select_action(&state)?;
        let step = env.step(&space.decode(index)?)?;

        if train {
            learner.store_transition(&state, index, step.reward, &step.next_state, step.done)?;
            if let TrainOutcome::Updated { loss } = learner.train()? {
                loss_sum += loss;
                report.updates += 1;
            }
        }

        report.steps += 1;
        report.total_reward += step.reward;
        report.bugs_found += step.info.detection_count();
        state = step.next_state;
        if step.done {
            report.done = true;
            break;
        }
    }

    if report.updates > 0 {
        report.mean_loss = Some(loss_sum / report.updates as f32);
    }
    Ok(report)
}

/// Drives a learner through repeated episodes of one environment.
pub struct Trainer<E> {
    env: E,
    learner: Learner,
    schedule: EpsilonSchedule,
    max_steps: usize,
    total_steps: usize,
    reports: Vec<EpisodeReport>,
}

impl<E> Trainer<E>
where
    E: Environment,
    E::Info: DetectionCount,
{
    pub fn new(env: E, learner: Learner, schedule: EpsilonSchedule, max_steps: usize) -> Self {
        Self {
            env,
            learner,
            schedule,
            max_steps,
            total_steps: 0,
            reports: Vec::new(),
        }
    }

    pub fn run(&mut self, episodes: usize) -> Result<&[EpisodeReport]> {
        for _ in 0..episodes {
            if let Some(epsilon) = self.schedule.value(self.total_steps) {
                self.learner.set_epsilon(epsilon);
            }

            let mut report = run_episode(&mut self.env, &mut self.learner, true, self.max_steps)?;
            report.episode = self.reports.len() + 1;
            self.total_steps += report.steps;

            tracing::info!(
                episode = report.episode,
                steps = report.steps,
                reward = report.total_reward,
                bugs = report.bugs_found,
                epsilon = report.epsilon,
                loss = report.mean_loss.unwrap_or(f32::NAN),
                "episode finished"
            );
            self.reports.push(report);
        }
        Ok(&self.reports)
    }

    pub fn reports(&self) -> &[EpisodeReport] {
        &self.reports
    }

    pub fn learner(&self) -> &Learner {
        &self.learner
    }

    pub fn into_parts(self) -> (E, Learner) {
        (self.env, self.learner)
    }
}

/// Writes one CSV row per episode.
pub fn write_metrics(reports: &[EpisodeReport], path: impl AsRef<Path>) -> Result<()> {
    let mut df = DataFrame::new(vec![
        Column::new(
            "episode".into(),
            reports.iter().map(|r| r.episode as u32).collect::<Vec<_>>(),
        ),
        Column::new(
            "steps".into(),
            reports.iter().map(|r| r.steps as u32).collect::<Vec<_>>(),
        ),
        Column::new(
            "total_reward".into(),
            reports.iter().map(|r| r.total_reward).collect::<Vec<_>>(),
        ),
        Column::new(
            "bugs_found".into(),
            reports.iter().map(|r| r.bugs_found as u32).collect::<Vec<_>>(),
        ),
        Column::new(
            "epsilon".into(),
            reports.iter().map(|r| r.epsilon).collect::<Vec<_>>(),
        ),
        Column::new(
            "updates".into(),
            reports.iter().map(|r| r.updates as u32).collect::<Vec<_>>(),
        ),
        Column::new(
            "mean_loss".into(),
            reports.iter().map(|r| r.mean_loss).collect::<Vec<_>>(),
        ),
    ])?;

    let mut file = File::create(path.as_ref())?;
    CsvWriter::new(&mut file).finish(&mut df)?;
    tracing::info!(path = %path.as_ref().display(), rows = reports.len(), "wrote metrics");
    Ok(())
}
