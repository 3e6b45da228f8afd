//! Replay buffer interfaces.
//!
//! The producer side of a buffer is [`ExperienceBufferBase`]: a training loop
//! pushes one item per environment step. The consumer side is
//! [`ReplayBufferBase`], which draws training batches. Randomness is supplied
//! by the caller on every draw, so a buffer never owns a generator.
use anyhow::Result;
use rand::Rng;

/// Interface for buffers that store experiences from environments.
pub trait ExperienceBufferBase {
    /// The type of items stored in the buffer.
    type Item;

    /// Pushes a new experience into the buffer.
    fn push(&mut self, tr: Self::Item) -> Result<()>;

    /// Returns the number of items usable for sampling.
    fn len(&self) -> usize;

    /// Returns `true` if nothing can be sampled.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Interface for replay buffers that generate batches for training.
pub trait ReplayBufferBase: Sized {
    /// Configuration parameters for the replay buffer.
    type Config: Clone;

    /// The type of batch generated for training.
    type Batch;

    /// Builds a new replay buffer from the given configuration.
    fn build(config: &Self::Config) -> Result<Self>;

    /// Constructs a batch of experiences for training.
    fn batch<R: Rng + ?Sized>(&self, size: usize, rng: &mut R) -> Result<Self::Batch>;
}
