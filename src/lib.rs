//! Value-based exploration agent that hunts scripted bugs in a simulated
//! world.
//!
//! The trainable core is the [`replay::ExperienceStore`] and the
//! [`agent::Learner`]; the world is reached only through the
//! [`environment::Environment`] trait. [`world::BugWorld`] is a grid stand-in
//! for the simulator and [`runner`] holds the episode loop.

pub mod action;
pub mod agent;
pub mod bugs;
pub mod config;
pub mod device;
pub mod environment;
pub mod error;
pub mod experience;
pub mod mlp;
pub mod replay;
pub mod runner;
pub mod state;
pub mod world;

pub use action::{Action, ActionSpace};
pub use agent::{Learner, TrainOutcome};
pub use config::{EpsilonSchedule, ExplorerConfig, LearnerConfig};
pub use environment::{Environment, Step};
pub use error::{Error, Result};
pub use experience::{Batch, Transition};
pub use replay::ExperienceStore;
pub use state::FeatureSelection;
