#![warn(missing_docs)]
//! Experience replay memory for agents trained on image observations.
//!
//! The memory stores one post-action frame per environment step together with
//! the action, the reward, the terminal flag, life counters and an auxiliary
//! state vector. States fed to a network are stacks of `phi_length`
//! consecutive frames that never straddle an episode boundary.
//!
//! - [`ReplayMemory`] stores records and draws minibatches.
//! - [`ReplayMemoryConfig`] fixes geometry, capacity and mode.
//! - [`RewardShaping`] configures offline discounted-return propagation.
//! - [`demo`] loads recorded demonstrations.
//!
//! Sampling takes the random number generator as an argument, so a fixed seed
//! reproduces every draw.
pub mod demo;
pub mod error;
pub mod frames;
pub mod ring;

mod base;
pub use base::{ExperienceBufferBase, ReplayBufferBase};

mod config;
pub use config::ReplayMemoryConfig;

mod replay_memory;
pub use replay_memory::{
    images_path, metadata_path, Batch, ReplayMemory, RewardShaping, Window,
};

mod transition;
pub use transition::Transition;
