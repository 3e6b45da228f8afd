//! Configuration of [`ReplayMemory`](crate::ReplayMemory).
//!
//! The configuration fixes the frame geometry, the capacity, the depth of the
//! stacked windows and the storage mode. It can be serialized to YAML so that
//! a training run and the tools share the same settings.
use crate::error::ReplayMemoryError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`ReplayMemory`](crate::ReplayMemory).
///
/// # Examples
///
/// ```rust
/// use phi_replay::ReplayMemoryConfig;
///
/// let config = ReplayMemoryConfig::default()
///     .width(84)
///     .height(84)
///     .max_steps(100_000)
///     .phi_length(4)
///     .num_actions(6)
///     .wrap_memory(true);
/// assert_eq!(config.max_steps, 100_000);
/// ```
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ReplayMemoryConfig {
    /// Width of a frame in pixels.
    pub width: usize,

    /// Height of a frame in pixels.
    pub height: usize,

    /// Number of time steps the memory can hold.
    pub max_steps: usize,

    /// Number of consecutive frames stacked into a state.
    pub phi_length: usize,

    /// Size of the discrete action space, i.e. the width of one-hot actions.
    pub num_actions: usize,

    /// If `true`, the memory is a ring buffer evicting the oldest record on
    /// overflow. Otherwise it fills once and then refuses further records.
    pub wrap_memory: bool,

    /// Length of the auxiliary full-state vector stored with each record.
    pub full_state_size: usize,

    /// If `true`, rewards of windows are collapsed to their sign.
    pub clip_reward: bool,

    /// Number of consecutive rejected draws after which a sampling call fails.
    pub max_retries: usize,
}

impl Default for ReplayMemoryConfig {
    fn default() -> Self {
        Self {
            width: 84,
            height: 84,
            max_steps: 10000,
            phi_length: 4,
            num_actions: 1,
            wrap_memory: false,
            full_state_size: 1013,
            clip_reward: true,
            max_retries: 100_000,
        }
    }
}

impl ReplayMemoryConfig {
    /// Sets the width of frames.
    pub fn width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Sets the height of frames.
    pub fn height(mut self, height: usize) -> Self {
        self.height = height;
        self
    }

    /// Sets the capacity.
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Sets the number of stacked frames.
    pub fn phi_length(mut self, phi_length: usize) -> Self {
        self.phi_length = phi_length;
        self
    }

    /// Sets the number of discrete actions.
    pub fn num_actions(mut self, num_actions: usize) -> Self {
        self.num_actions = num_actions;
        self
    }

    /// Sets the storage mode.
    pub fn wrap_memory(mut self, wrap_memory: bool) -> Self {
        self.wrap_memory = wrap_memory;
        self
    }

    /// Sets the length of the auxiliary full-state vector.
    pub fn full_state_size(mut self, full_state_size: usize) -> Self {
        self.full_state_size = full_state_size;
        self
    }

    /// Sets reward clipping of windows.
    pub fn clip_reward(mut self, clip_reward: bool) -> Self {
        self.clip_reward = clip_reward;
        self
    }

    /// Sets the retry limit of rejection sampling.
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Checks the values that would make the memory unusable.
    pub fn validate(&self) -> Result<()> {
        if self.phi_length == 0 {
            return Err(ReplayMemoryError::InvalidArgument("phi_length must be >= 1".into()).into());
        }
        if self.num_actions == 0 {
            return Err(ReplayMemoryError::InvalidArgument("num_actions must be >= 1".into()).into());
        }
        if self.width == 0 || self.height == 0 {
            return Err(ReplayMemoryError::InvalidArgument(format!(
                "frame shape must be non-empty, got {}x{}",
                self.height, self.width
            ))
            .into());
        }
        if self.max_retries == 0 {
            return Err(ReplayMemoryError::InvalidArgument("max_retries must be >= 1".into()).into());
        }
        Ok(())
    }

    /// Constructs [`ReplayMemoryConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ReplayMemoryConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
