//! Replay memory of post-action frames with phi-stacked windows.
//!
//! A [`ReplayMemory`] keeps one record per environment step in parallel
//! column arrays (frame, action, reward, terminal flag, lives, life events and
//! an auxiliary full-state vector). States are assembled on demand by stacking
//! `phi_length` consecutive frames, so a frame is stored once even though it
//! takes part in several states.
//!
//! # Modes
//!
//! - Bounded (`wrap_memory = false`): records are appended until the memory is
//!   full, after which [`ReplayMemory::add`] drops records with a warning.
//!   Used for recorded demonstrations; supports [`ReplayMemory::sample2`],
//!   [`ReplayMemory::sample_sequential`] and [`ReplayMemory::resize`].
//! - Wrapping (`wrap_memory = true`): a ring buffer evicting the oldest record
//!   on overflow. Used during online training; supports
//!   [`ReplayMemory::sample`].
//!
//! # Examples
//!
//! ```rust
//! use ndarray::Array2;
//! use phi_replay::{ReplayMemory, ReplayMemoryConfig, Transition};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let config = ReplayMemoryConfig::default()
//!     .width(2)
//!     .height(2)
//!     .max_steps(16)
//!     .phi_length(2)
//!     .num_actions(3)
//!     .full_state_size(0)
//!     .wrap_memory(true);
//! let mut memory = ReplayMemory::new(&config).unwrap();
//! for t in 0..10u8 {
//!     let tr = Transition::new(Array2::from_elem((2, 2), t), 1, 0.0, false, 3);
//!     memory.add(tr).unwrap();
//! }
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let batch = memory.sample(4, true, None, &mut rng).unwrap();
//! assert_eq!(batch.len(), 4);
//! ```
mod base;
mod persist;
mod reward;
mod sampler;
mod window;
pub use base::ReplayMemory;
pub use persist::{images_path, metadata_path};
pub use reward::RewardShaping;
pub use sampler::Batch;
pub use window::Window;
