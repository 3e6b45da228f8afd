//! Minibatch sampling.
//!
//! All strategies are rejection samplers: a uniformly drawn start index is
//! discarded when its window crosses an episode boundary. A draw that keeps
//! failing `max_retries` times in a row aborts the call with
//! [`ReplayMemoryError::RetriesExhausted`].
use super::ReplayMemory;
use crate::{error::ReplayMemoryError, frames::StateBatch};
use anyhow::Result;
use ndarray::Array2;
use rand::Rng;

/// A minibatch of windows.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// States, `[batch_size, height, width, phi_length]`.
    pub states: StateBatch,

    /// One-hot actions, `[batch_size, num_actions]` or `[batch_size, 2]` in
    /// one-vs-all encoding.
    pub actions: Array2<f32>,

    /// Rewards of the last frame of each state.
    pub rewards: Vec<f32>,

    /// Terminal flags of the last frame of each state.
    pub terminals: Vec<i8>,

    /// Successor states; only materialized by [`ReplayMemory::sample`].
    pub next_states: Option<StateBatch>,
}

impl Batch {
    /// Number of entries.
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    /// Returns `true` if the batch has no entry.
    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }
}

impl ReplayMemory {
    fn insufficient(&self, required: usize) -> anyhow::Error {
        ReplayMemoryError::InsufficientHistory {
            size: self.size(),
            required,
        }
        .into()
    }

    fn count_rejection(&self, rejected: &mut usize) -> Result<()> {
        *rejected += 1;
        if *rejected >= self.max_retries {
            return Err(ReplayMemoryError::RetriesExhausted {
                attempts: *rejected,
            }
            .into());
        }
        Ok(())
    }

    fn action_width(&self, one_vs_all: Option<usize>) -> usize {
        match one_vs_all {
            Some(_) => 2,
            None => self.num_actions,
        }
    }

    /// Sets row `i` of `actions` to the encoding of `action`.
    ///
    /// With `one_vs_all = Some(class)` the row is `[1, 0]` for `class` and
    /// `[0, 1]` for every other action.
    fn encode_action(actions: &mut Array2<f32>, i: usize, action: usize, one_vs_all: Option<usize>) {
        let col = match one_vs_all {
            Some(class) if action == class => 0,
            Some(_) => 1,
            None => action,
        };
        actions[[i, col]] = 1.0;
    }

    fn state_shape(&self) -> [usize; 3] {
        [self.height, self.width, self.phi_length]
    }

    /// Returns `true` if one of the `k` records from the last frame of the
    /// window at `index` onwards has a negative reward or loses a life.
    fn near_bad_state(&self, index: usize, k: usize) -> bool {
        let st = index + self.phi_length - 1;
        let en = (st + k).min(self.size());
        (st..en).any(|i| {
            let slot = self.slot(i);
            self.rewards[slot] < 0.0 || self.loss_life[slot] != 0
        })
    }

    /// Draws `batch_size` transitions uniformly from a wrapping memory.
    ///
    /// Neither the state nor its last frame may hold a terminal flag, so every
    /// drawn transition has a recorded successor, returned in
    /// [`Batch::next_states`]. If `normalize` is set, raw frames are rescaled to
    /// `[0, 1]`.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        normalize: bool,
        one_vs_all: Option<usize>,
        rng: &mut R,
    ) -> Result<Batch> {
        self.require_mode("sample", true)?;
        let size = self.size();
        if size <= self.phi_length {
            return Err(self.insufficient(self.phi_length + 1));
        }
        let high = size - self.phi_length;

        let as_f32 = normalize || self.is_normalized();
        let mut states = StateBatch::zeros(batch_size, self.state_shape(), as_f32);
        let mut next_states = StateBatch::zeros(batch_size, self.state_shape(), as_f32);
        let mut actions = Array2::zeros((batch_size, self.action_width(one_vs_all)));
        let mut rewards = vec![0.0; batch_size];
        let mut terminals = vec![0; batch_size];

        let mut count = 0;
        let mut rejected = 0;
        while count < batch_size {
            let index = rng.gen_range(0..high);
            if (index..index + self.phi_length).any(|k| self.is_terminal_at(k)) {
                self.count_rejection(&mut rejected)?;
                continue;
            }
            let w = match self.window(index) {
                Some(w) => w,
                None => {
                    self.count_rejection(&mut rejected)?;
                    continue;
                }
            };

            states.set(count, &w.state);
            next_states.set(count, &w.next_state);
            Self::encode_action(&mut actions, count, w.action, one_vs_all);
            rewards[count] = w.reward;
            terminals[count] = w.terminal as i8;
            count += 1;
            rejected = 0;
        }

        Ok(Batch {
            states,
            actions,
            rewards,
            terminals,
            next_states: Some(next_states),
        })
    }

    /// Draws `batch_size` windows uniformly from a bounded memory.
    ///
    /// With `k_bad_states > 0`, a window is skipped when a negative reward or
    /// a loss of life occurs within `k_bad_states` records from its last
    /// frame. Successor states are not returned.
    pub fn sample2<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        normalize: bool,
        k_bad_states: usize,
        one_vs_all: Option<usize>,
        rng: &mut R,
    ) -> Result<Batch> {
        self.require_mode("sample2", false)?;
        let size = self.size();
        if size < self.phi_length {
            return Err(self.insufficient(self.phi_length));
        }
        let high = size + 1 - self.phi_length;

        let as_f32 = normalize || self.is_normalized();
        let mut states = StateBatch::zeros(batch_size, self.state_shape(), as_f32);
        let mut actions = Array2::zeros((batch_size, self.action_width(one_vs_all)));
        let mut rewards = vec![0.0; batch_size];
        let mut terminals = vec![0; batch_size];

        let mut count = 0;
        let mut rejected = 0;
        while count < batch_size {
            let index = rng.gen_range(0..high);
            if k_bad_states > 0 && self.near_bad_state(index, k_bad_states) {
                self.count_rejection(&mut rejected)?;
                continue;
            }
            let w = match self.window(index) {
                Some(w) => w,
                None => {
                    self.count_rejection(&mut rejected)?;
                    continue;
                }
            };

            states.set(count, &w.state);
            Self::encode_action(&mut actions, count, w.action, one_vs_all);
            rewards[count] = w.reward;
            terminals[count] = w.terminal as i8;
            count += 1;
            rejected = 0;
        }

        Ok(Batch {
            states,
            actions,
            rewards,
            terminals,
            next_states: None,
        })
    }

    /// Returns `batch_size` consecutive windows of a bounded memory.
    ///
    /// The start is drawn uniformly among the indices whose run of windows
    /// stays within one episode; the run is returned in chronological order.
    pub fn sample_sequential<R: Rng + ?Sized>(
        &self,
        batch_size: usize,
        rng: &mut R,
    ) -> Result<Batch> {
        self.require_mode("sample_sequential", false)?;
        let size = self.size();
        // Frames spanned by the run of windows.
        let span = (self.phi_length - 1 + batch_size).max(self.phi_length);
        if size < span {
            return Err(self.insufficient(span));
        }
        let high = size + 1 - span;

        let mut rejected = 0;
        let start = loop {
            let start = rng.gen_range(0..high);
            if !(start..start + span - 1).any(|k| self.is_terminal_at(k)) {
                break start;
            }
            self.count_rejection(&mut rejected)?;
        };

        let mut states = StateBatch::zeros(batch_size, self.state_shape(), self.is_normalized());
        let mut actions = Array2::zeros((batch_size, self.num_actions));
        let mut rewards = vec![0.0; batch_size];
        let mut terminals = vec![0; batch_size];

        for (count, index) in (start..start + batch_size).enumerate() {
            let w = self.window(index).ok_or_else(|| {
                ReplayMemoryError::Corrupted(format!("window {} is unavailable", index))
            })?;
            states.set(count, &w.state);
            Self::encode_action(&mut actions, count, w.action, None);
            rewards[count] = w.reward;
            terminals[count] = w.terminal as i8;
        }

        Ok(Batch {
            states,
            actions,
            rewards,
            terminals,
            next_states: None,
        })
    }
}
