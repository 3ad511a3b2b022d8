//! Deterministic grid world with scripted anomalies.
//!
//! Stands in for the 3D simulator: the agent walks a flat grid, turns in
//! 90 degree increments and can interact with the cell it stands on. Some
//! cells hide anomalies that emit a diagnostic message when triggered; the
//! [`BugCatalog`] turns those messages into detections and rewards.

use serde::{Deserialize, Serialize};

use crate::{
    action::{Action, ActionSpace},
    bugs::{BugCatalog, BugDefinition},
    environment::{Environment, Step},
    error::{Error, Result},
    runner::DetectionCount,
};

/// Width of the observation vector: `[x, z, yaw, health, steps]`.
pub const OBSERVATION_DIM: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    MoveForward,
    MoveBack,
    TurnLeft,
    TurnRight,
    Jump,
    Use,
    Stay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Fires when the agent moves onto the cell.
    Enter,
    /// Fires on `Use` while standing on the cell.
    Use,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub x: i32,
    pub z: i32,
    pub trigger: Trigger,
    pub message: String,
    #[serde(default)]
    pub damage: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub width: i32,
    pub depth: i32,
    pub start: (i32, i32),
    pub health: f32,
    /// Steps after which an episode is cut off.
    pub time_limit: usize,
    /// Commands available to the agent, in action-index order.
    pub commands: Vec<Command>,
    /// Expose the commands as independent toggles instead of one choice.
    pub multi_binary: bool,
    pub detection_reward: f32,
    pub anomalies: Vec<Anomaly>,
    pub bugs: Vec<BugDefinition>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 7,
            depth: 7,
            start: (0, 0),
            health: 20.0,
            time_limit: 200,
            commands: vec![
                Command::MoveForward,
                Command::TurnRight,
                Command::TurnLeft,
                Command::Stay,
                Command::Use,
            ],
            multi_binary: false,
            detection_reward: 10.0,
            anomalies: vec![
                Anomaly {
                    x: 3,
                    z: 3,
                    trigger: Trigger::Use,
                    message: "Door did not open after interaction".into(),
                    damage: 0.0,
                },
                Anomaly {
                    x: 4,
                    z: 4,
                    trigger: Trigger::Enter,
                    message: "Player fell through floor at block".into(),
                    damage: 5.0,
                },
            ],
            bugs: vec![
                BugDefinition {
                    id: "door_stuck".into(),
                    message: "Door did not open".into(),
                },
                BugDefinition {
                    id: "floor_hole".into(),
                    message: "fell through floor".into(),
                },
            ],
        }
    }
}

/// Per-step details returned alongside the observation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepInfo {
    pub messages: Vec<String>,
    pub detected: Vec<String>,
    pub truncated: bool,
}

impl DetectionCount for StepInfo {
    fn detection_count(&self) -> usize {
        self.detected.len()
    }
}

pub struct BugWorld {
    config: WorldConfig,
    catalog: BugCatalog,
    x: i32,
    z: i32,
    /// Degrees, one of 0, 90, 180, 270. 0 faces +z.
    yaw: i32,
    health: f32,
    steps: usize,
    finished: bool,
}

impl BugWorld {
    pub fn new(config: WorldConfig) -> Result<Self> {
        if config.commands.is_empty() {
            return Err(Error::InvalidConfig("world needs at least one command".into()));
        }
        if config.width <= 0 || config.depth <= 0 {
            return Err(Error::InvalidConfig("world must have a positive size".into()));
        }
        if !Self::inside(&config, config.start.0, config.start.1) {
            return Err(Error::InvalidConfig(format!(
                "start {:?} lies outside the {}x{} world",
                config.start, config.width, config.depth
            )));
        }
        let catalog = BugCatalog::new(config.bugs.clone());
        let (x, z) = config.start;
        let health = config.health;
        Ok(Self {
            config,
            catalog,
            x,
            z,
            yaw: 0,
            health,
            steps: 0,
            finished: true,
        })
    }

    /// Replaces the bug definitions taken from the config.
    pub fn with_catalog(mut self, catalog: BugCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn catalog(&self) -> &BugCatalog {
        &self.catalog
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x, self.z)
    }

    pub fn yaw(&self) -> i32 {
        self.yaw
    }

    fn inside(config: &WorldConfig, x: i32, z: i32) -> bool {
        (0..config.width).contains(&x) && (0..config.depth).contains(&z)
    }

    fn observation(&self) -> Vec<f32> {
        vec![
            self.x as f32,
            self.z as f32,
            self.yaw as f32,
            self.health,
            self.steps as f32,
        ]
    }

    fn commands_for(&self, action: &Action) -> Result<Vec<Command>> {
        let commands = &self.config.commands;
        match action {
            Action::Discrete(i) if !self.config.multi_binary => commands
                .get(*i)
                .map(|c| vec![*c])
                .ok_or_else(|| Error::InvalidAction(format!("no command at index {i}"))),
            Action::MultiBinary(bits) if self.config.multi_binary && bits.len() == commands.len() => {
                Ok(commands
                    .iter()
                    .zip(bits)
                    .filter(|(_, on)| **on)
                    .map(|(c, _)| *c)
                    .collect())
            }
            other => Err(Error::InvalidAction(format!(
                "{other:?} does not fit {:?}",
                self.action_space()
            ))),
        }
    }

    fn walk(&mut self, distance: i32) {
        let (dx, dz) = match self.yaw {
            0 => (0, 1),
            90 => (-1, 0),
            180 => (0, -1),
            _ => (1, 0),
        };
        let (x, z) = (self.x + dx * distance, self.z + dz * distance);
        if Self::inside(&self.config, x, z) {
            self.x = x;
            self.z = z;
        }
    }

    fn trigger(&mut self, trigger: Trigger, messages: &mut Vec<String>) {
        for anomaly in &self.config.anomalies {
            if anomaly.trigger == trigger && anomaly.x == self.x && anomaly.z == self.z {
                messages.push(anomaly.message.clone());
                self.health -= anomaly.damage;
            }
        }
    }

    fn apply(&mut self, command: Command, messages: &mut Vec<String>) {
        match command {
            Command::MoveForward => self.walk(1),
            Command::MoveBack => self.walk(-1),
            Command::TurnRight => self.yaw = (self.yaw + 90).rem_euclid(360),
            Command::TurnLeft => self.yaw = (self.yaw - 90).rem_euclid(360),
            Command::Use => self.trigger(Trigger::Use, messages),
            Command::Jump | Command::Stay => {}
        }
    }
}

impl Environment for BugWorld {
    type Info = StepInfo;

    fn reset(&mut self) -> Result<Vec<f32>> {
        (self.x, self.z) = self.config.start;
        self.yaw = 0;
        self.health = self.config.health;
        self.steps = 0;
        self.finished = false;
        self.catalog.reset();
        Ok(self.observation())
    }

    fn step(&mut self, action: &Action) -> Result<Step<StepInfo>> {
        let commands = self.commands_for(action)?;
        if self.finished {
            tracing::warn!("step after episode end");
            return Ok(Step {
                next_state: self.observation(),
                reward: 0.0,
                done: true,
                info: StepInfo::default(),
            });
        }

        let mut messages = Vec::new();
        let start = (self.x, self.z);
        for command in commands {
            self.apply(command, &mut messages);
        }
        if (self.x, self.z) != start {
            self.trigger(Trigger::Enter, &mut messages);
        }
        self.steps += 1;

        let detected = self.catalog.scan(&messages);
        let reward = detected.len() as f32 * self.config.detection_reward;
        let terminal = self.catalog.all_detected() || self.health <= 0.0;
        let truncated = !terminal && self.steps >= self.config.time_limit;
        self.finished = terminal || truncated;

        Ok(Step {
            next_state: self.observation(),
            reward,
            done: self.finished,
            info: StepInfo {
                messages,
                detected,
                truncated,
            },
        })
    }

    fn state_dim(&self) -> usize {
        OBSERVATION_DIM
    }

    fn action_space(&self) -> ActionSpace {
        let n = self.config.commands.len();
        if self.config.multi_binary {
            ActionSpace::MultiBinary { n }
        } else {
            ActionSpace::Discrete { n }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORWARD: Action = Action::Discrete(0);
    const RIGHT: Action = Action::Discrete(1);
    const LEFT: Action = Action::Discrete(2);
    const USE: Action = Action::Discrete(4);

    fn world() -> BugWorld {
        let mut world = BugWorld::new(WorldConfig::default()).unwrap();
        world.reset().unwrap();
        world
    }

    fn walk_to_door(world: &mut BugWorld) {
        // From (0, 0) facing +z: three steps, turn to face +x, three steps.
        for _ in 0..3 {
            world.step(&FORWARD).unwrap();
        }
        world.step(&LEFT).unwrap();
        for _ in 0..3 {
            world.step(&FORWARD).unwrap();
        }
        assert_eq!(world.position(), (3, 3));
    }

    #[test]
    fn reset_returns_start_observation() {
        let mut world = BugWorld::new(WorldConfig::default()).unwrap();
        let obs = world.reset().unwrap();
        assert_eq!(obs, vec![0.0, 0.0, 0.0, 20.0, 0.0]);
        assert_eq!(world.state_dim(), OBSERVATION_DIM);
        assert_eq!(world.action_space(), ActionSpace::Discrete { n: 5 });
    }

    #[test]
    fn default_command_list_maps_action_indices() {
        let config = WorldConfig::default();
        assert_eq!(
            config.commands,
            vec![
                Command::MoveForward,
                Command::TurnRight,
                Command::TurnLeft,
                Command::Stay,
                Command::Use,
            ]
        );
        let mut world = BugWorld::new(config).unwrap();
        world.reset().unwrap();
        world.step(&Action::Discrete(3)).unwrap();
        assert_eq!(world.position(), (0, 0));
        assert_eq!(world.yaw(), 0);
    }

    #[test]
    fn turning_and_walking_follow_yaw() {
        let mut world = world();
        world.step(&RIGHT).unwrap();
        assert_eq!(world.yaw(), 90);
        // Facing -x at the west edge: blocked.
        world.step(&FORWARD).unwrap();
        assert_eq!(world.position(), (0, 0));
        world.step(&RIGHT).unwrap();
        world.step(&RIGHT).unwrap();
        assert_eq!(world.yaw(), 270);
        world.step(&FORWARD).unwrap();
        assert_eq!(world.position(), (1, 0));
    }

    #[test]
    fn using_the_door_detects_a_bug_once() {
        let mut world = world();
        walk_to_door(&mut world);

        let step = world.step(&USE).unwrap();
        assert_eq!(step.reward, 10.0);
        assert_eq!(step.info.detected, vec!["door_stuck".to_string()]);
        assert!(!step.done);

        let again = world.step(&USE).unwrap();
        assert_eq!(again.reward, 0.0);
        assert_eq!(again.info.messages.len(), 1);
    }

    #[test]
    fn finding_every_bug_ends_the_episode() {
        let mut world = world();
        walk_to_door(&mut world);
        world.step(&USE).unwrap();

        // From (3, 3) facing +x: one step, turn to face +z, one step.
        world.step(&FORWARD).unwrap();
        world.step(&RIGHT).unwrap();
        let step = world.step(&FORWARD).unwrap();
        assert_eq!(world.position(), (4, 4));
        assert_eq!(step.info.detected, vec!["floor_hole".to_string()]);
        assert!(step.done);
        assert!(!step.info.truncated);
        assert_eq!(step.next_state[3], 15.0);

        let after = world.step(&FORWARD).unwrap();
        assert!(after.done);
        assert_eq!(after.reward, 0.0);
    }

    #[test]
    fn time_limit_truncates() {
        let mut world = BugWorld::new(WorldConfig {
            time_limit: 3,
            ..WorldConfig::default()
        })
        .unwrap();
        world.reset().unwrap();
        assert!(!world.step(&LEFT).unwrap().done);
        assert!(!world.step(&LEFT).unwrap().done);
        let last = world.step(&LEFT).unwrap();
        assert!(last.done);
        assert!(last.info.truncated);
    }

    #[test]
    fn multi_binary_applies_selected_commands_in_order() {
        let mut world = BugWorld::new(WorldConfig {
            multi_binary: true,
            ..WorldConfig::default()
        })
        .unwrap();
        world.reset().unwrap();
        assert_eq!(world.action_space(), ActionSpace::MultiBinary { n: 5 });

        // Move forward, then turn right.
        let step = world
            .step(&Action::MultiBinary(vec![true, true, false, false, false]))
            .unwrap();
        assert_eq!(world.position(), (0, 1));
        assert_eq!(world.yaw(), 90);
        assert_eq!(step.next_state[..3].to_vec(), vec![0.0, 1.0, 90.0]);

        assert!(world.step(&Action::Discrete(0)).is_err());
        assert!(world.step(&Action::MultiBinary(vec![true])).is_err());
    }

    #[test]
    fn rejects_bad_configs() {
        assert!(BugWorld::new(WorldConfig {
            commands: vec![],
            ..WorldConfig::default()
        })
        .is_err());
        assert!(BugWorld::new(WorldConfig {
            start: (9, 0),
            ..WorldConfig::default()
        })
        .is_err());
    }
}
