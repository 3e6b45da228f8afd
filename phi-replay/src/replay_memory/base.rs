//! Storage, bookkeeping and statistics of [`ReplayMemory`].
use super::Batch;
use crate::{
    error::ReplayMemoryError, frames::Frames, ring::RingIndex, ExperienceBufferBase,
    ReplayBufferBase, ReplayMemoryConfig, Transition,
};
use anyhow::Result;
use ndarray::{Array2, Axis};
use rand::Rng;
use std::fmt;

/// Fixed-capacity store of environment steps.
///
/// All per-step arrays are indexed by physical slot; [`RingIndex`] maps the
/// logical indices used by the public API (`0` is the oldest record) to slots.
pub struct ReplayMemory {
    pub(super) width: usize,
    pub(super) height: usize,
    pub(super) phi_length: usize,
    pub(super) num_actions: usize,
    pub(super) full_state_size: usize,
    pub(super) clip_reward: bool,
    pub(super) max_retries: usize,
    pub(super) ring: RingIndex,
    pub(super) imgs: Frames,
    pub(super) actions: Vec<usize>,
    pub(super) rewards: Vec<f32>,
    pub(super) terminal: Vec<i8>,
    pub(super) lives: Vec<i32>,
    pub(super) loss_life: Vec<i8>,
    pub(super) gain_life: Vec<i8>,
    pub(super) full_state: Array2<u8>,
}

impl ReplayMemory {
    /// Allocates an empty memory.
    pub fn new(config: &ReplayMemoryConfig) -> Result<Self> {
        config.validate()?;
        let capacity = config.max_steps;

        Ok(Self {
            width: config.width,
            height: config.height,
            phi_length: config.phi_length,
            num_actions: config.num_actions,
            full_state_size: config.full_state_size,
            clip_reward: config.clip_reward,
            max_retries: config.max_retries,
            ring: RingIndex::new(capacity, config.wrap_memory),
            imgs: Frames::zeros(capacity, config.height, config.width),
            actions: vec![0; capacity],
            rewards: vec![0.0; capacity],
            terminal: vec![0; capacity],
            lives: vec![0; capacity],
            loss_life: vec![0; capacity],
            gain_life: vec![0; capacity],
            full_state: Array2::zeros((capacity, config.full_state_size)),
        })
    }

    fn check_transition(&self, tr: &Transition) -> Result<()> {
        if tr.image.shape() != [self.height, self.width] {
            return Err(ReplayMemoryError::InvalidArgument(format!(
                "image shape {:?} does not match [{}, {}]",
                tr.image.shape(),
                self.height,
                self.width
            ))
            .into());
        }
        if tr.action >= self.num_actions {
            return Err(ReplayMemoryError::InvalidArgument(format!(
                "action {} is out of range for {} actions",
                tr.action, self.num_actions
            ))
            .into());
        }
        if !tr.reward.is_finite() {
            return Err(ReplayMemoryError::InvalidArgument(format!(
                "reward {} is not finite",
                tr.reward
            ))
            .into());
        }
        if !tr.full_state.is_empty() && tr.full_state.len() != self.full_state_size {
            return Err(ReplayMemoryError::InvalidArgument(format!(
                "full_state has {} elements, expected {}",
                tr.full_state.len(),
                self.full_state_size
            ))
            .into());
        }
        Ok(())
    }

    /// Adds a time step record.
    ///
    /// In bounded mode a full memory drops the record and logs a warning; this
    /// is not an error. In wrapping mode the oldest record is evicted once the
    /// memory is full. Malformed records (frame shape, action index,
    /// non-finite reward or full-state length) are rejected before anything
    /// is written.
    pub fn add(&mut self, tr: Transition) -> Result<()> {
        self.check_transition(&tr)?;

        let slot = match self.ring.advance() {
            Some(slot) => slot,
            None => {
                log::warn!("Memory is full. Data not added!");
                return Ok(());
            }
        };

        self.imgs.set(slot, tr.image.view());
        self.actions[slot] = tr.action;
        self.rewards[slot] = tr.reward;
        self.terminal[slot] = tr.terminal as i8;
        self.lives[slot] = tr.lives;
        self.loss_life[slot] = tr.loss_life as i8;
        self.gain_life[slot] = tr.gain_life as i8;
        let mut row = self.full_state.index_axis_mut(Axis(0), slot);
        if tr.full_state.is_empty() {
            row.fill(0);
        } else {
            row.iter_mut()
                .zip(tr.full_state.iter())
                .for_each(|(d, s)| *d = *s);
        }

        Ok(())
    }

    /// Appends every record of `other`, oldest first, as if each were passed
    /// to [`ReplayMemory::add`].
    ///
    /// Returns the number of records written; a bounded memory stops at its
    /// capacity.
    pub fn extend_from(&mut self, other: &ReplayMemory) -> Result<usize> {
        if other.width != self.width || other.height != self.height {
            return Err(ReplayMemoryError::InvalidArgument(format!(
                "frame shape [{}, {}] does not match [{}, {}]",
                other.height, other.width, self.height, self.width
            ))
            .into());
        }
        if other.full_state_size != self.full_state_size {
            return Err(ReplayMemoryError::InvalidArgument(format!(
                "full_state_size {} does not match {}",
                other.full_state_size, self.full_state_size
            ))
            .into());
        }
        if other.num_actions > self.num_actions {
            return Err(ReplayMemoryError::InvalidArgument(format!(
                "{} actions do not fit into {} actions",
                other.num_actions, self.num_actions
            ))
            .into());
        }

        let mut n = 0;
        for i in 0..other.size() {
            let src = other.slot(i);
            let slot = match self.ring.advance() {
                Some(slot) => slot,
                None => {
                    log::warn!(
                        "Memory is full. {} of {} records not added!",
                        other.size() - i,
                        other.size()
                    );
                    break;
                }
            };

            self.imgs.copy_from(slot, &other.imgs, src);
            self.actions[slot] = other.actions[src];
            self.rewards[slot] = other.rewards[src];
            self.terminal[slot] = other.terminal[src];
            self.lives[slot] = other.lives[src];
            self.loss_life[slot] = other.loss_life[src];
            self.gain_life[slot] = other.gain_life[src];
            self.full_state
                .index_axis_mut(Axis(0), slot)
                .assign(&other.full_state.index_axis(Axis(0), src));
            n += 1;
        }

        Ok(n)
    }

    /// Physical slot of a logical index below `size`; see [`RingIndex::slot`].
    pub(super) fn slot(&self, logical: usize) -> usize {
        self.ring.slot(logical)
    }

    pub(super) fn is_terminal_at(&self, logical: usize) -> bool {
        self.terminal[self.slot(logical)] != 0
    }

    pub(super) fn require_mode(&self, op: &'static str, wrap_memory: bool) -> Result<()> {
        if self.ring.is_wrapping() != wrap_memory {
            return Err(ReplayMemoryError::WrongMode {
                op,
                wrap_memory: self.ring.is_wrapping(),
            }
            .into());
        }
        Ok(())
    }

    /// Copy of the record at a logical index, without stacking.
    pub fn get_transition(&self, index: usize) -> Option<Transition> {
        if index >= self.size() {
            return None;
        }
        let slot = self.slot(index);
        Some(Transition {
            image: self.imgs.get_raw(slot),
            action: self.actions[slot],
            reward: self.rewards[slot],
            terminal: self.terminal[slot] != 0,
            lives: self.lives[slot],
            loss_life: self.loss_life[slot] != 0,
            gain_life: self.gain_life[slot] != 0,
            full_state: self.full_state.index_axis(Axis(0), slot).to_vec(),
        })
    }

    /// Approximate number of indices that can start a full window.
    ///
    /// Windows rejected for crossing a terminal are not accounted for.
    pub fn len(&self) -> usize {
        self.ring.size().saturating_sub(self.phi_length)
    }

    /// Returns `true` if no window can be started.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of valid records.
    pub fn size(&self) -> usize {
        self.ring.size()
    }

    /// Number of records the memory can hold.
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Returns `true` if `size == capacity`.
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    /// Returns `true` in wrapping mode.
    pub fn is_wrapping(&self) -> bool {
        self.ring.is_wrapping()
    }

    /// Physical slot of the oldest record (wrapping mode).
    pub fn bottom(&self) -> usize {
        self.ring.bottom()
    }

    /// Physical slot of the next write (wrapping mode).
    pub fn top(&self) -> usize {
        self.ring.top()
    }

    /// Number of stacked frames per state.
    pub fn phi_length(&self) -> usize {
        self.phi_length
    }

    /// Number of discrete actions.
    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    /// Frame shape `[height, width]`.
    pub fn frame_shape(&self) -> [usize; 2] {
        [self.height, self.width]
    }

    /// Length of the auxiliary full-state vector.
    pub fn full_state_size(&self) -> usize {
        self.full_state_size
    }

    /// Returns `true` if window rewards are collapsed to their sign.
    pub fn clip_reward(&self) -> bool {
        self.clip_reward
    }

    /// Returns `true` once frames have been rescaled to `[0, 1]`.
    pub fn is_normalized(&self) -> bool {
        self.imgs.is_normalized()
    }

    /// Rewards of all records, oldest first.
    pub fn rewards(&self) -> Vec<f32> {
        (0..self.size()).map(|i| self.rewards[self.slot(i)]).collect()
    }

    /// Number of records flagged terminal.
    pub fn num_terminal_flags(&self) -> usize {
        (0..self.size()).filter(|&i| self.is_terminal_at(i)).count()
    }

    /// Sum of the rewards of all records.
    pub fn sum_rewards(&self) -> f32 {
        self.rewards().iter().sum()
    }

    /// Number of records per action.
    pub fn action_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.num_actions];
        for i in 0..self.size() {
            counts[self.actions[self.slot(i)]] += 1;
        }
        counts
    }

    /// Rescales stored frames to `[0, 1]`.
    ///
    /// One-way; calling it again does nothing. Frames added afterwards are
    /// rescaled on insertion.
    pub fn normalize_images(&mut self) {
        if self.imgs.is_normalized() {
            log::debug!("Images already normalized");
            return;
        }
        log::info!("Normalizing images...");
        self.imgs.normalize();
        log::info!("Images normalized");
    }

    fn log_shapes(&self) {
        log::debug!("    images shape: {:?}", self.imgs.shape());
        log::debug!("    actions shape: {}", self.actions.len());
        log::debug!("    rewards shape: {}", self.rewards.len());
        log::debug!("    terminal shape: {}", self.terminal.len());
        log::debug!("    lives shape: {}", self.lives.len());
        log::debug!("    loss_life shape: {}", self.loss_life.len());
        log::debug!("    gain_life shape: {}", self.gain_life.len());
        log::debug!("    full_state shape: {:?}", self.full_state.shape());
    }

    /// Shrinks every array to the number of valid records.
    ///
    /// Only defined in bounded mode, where logical and physical order agree.
    pub fn resize(&mut self) -> Result<()> {
        self.require_mode("resize", false)?;

        log::info!("Resizing replay memory...");
        log::debug!(
            "Before resize: size={} max_steps={}",
            self.size(),
            self.capacity()
        );
        self.log_shapes();

        let size = self.size();
        self.imgs.truncate(size);
        self.actions.truncate(size);
        self.rewards.truncate(size);
        self.terminal.truncate(size);
        self.lives.truncate(size);
        self.loss_life.truncate(size);
        self.gain_life.truncate(size);
        self.full_state = self
            .full_state
            .slice_axis(Axis(0), (0..size).into())
            .to_owned();
        self.ring.shrink_to_size();

        log::info!("Resizing completed!");
        log::debug!(
            "After resize: size={} max_steps={}",
            self.size(),
            self.capacity()
        );
        self.log_shapes();

        Ok(())
    }
}

impl fmt::Display for ReplayMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Replay memory:")?;
        writeln!(f, "  size:{}", self.size())?;
        writeln!(f, "  max_steps:{}", self.capacity())?;
        writeln!(f, "  imgs shape:{:?}", self.imgs.shape())
    }
}

impl ExperienceBufferBase for ReplayMemory {
    type Item = Transition;

    fn push(&mut self, tr: Self::Item) -> Result<()> {
        self.add(tr)
    }

    fn len(&self) -> usize {
        ReplayMemory::len(self)
    }
}

impl ReplayBufferBase for ReplayMemory {
    type Config = ReplayMemoryConfig;
    type Batch = Batch;

    fn build(config: &Self::Config) -> Result<Self> {
        Self::new(config)
    }

    /// Draws a batch with [`ReplayMemory::sample`] in wrapping mode and with
    /// [`ReplayMemory::sample2`] in bounded mode.
    fn batch<R: Rng + ?Sized>(&self, size: usize, rng: &mut R) -> Result<Self::Batch> {
        if self.is_wrapping() {
            self.sample(size, false, None, rng)
        } else {
            self.sample2(size, false, 0, None, rng)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn config(max_steps: usize, wrap_memory: bool) -> ReplayMemoryConfig {
        ReplayMemoryConfig::default()
            .width(2)
            .height(1)
            .max_steps(max_steps)
            .phi_length(2)
            .num_actions(3)
            .full_state_size(2)
            .wrap_memory(wrap_memory)
    }

    fn tr(v: u8) -> Transition {
        Transition::new(Array2::from_elem((1, 2), v), (v % 3) as usize, v as f32, false, 3)
    }

    #[test]
    fn test_bounded_add_is_noop_when_full() -> Result<()> {
        let mut memory = ReplayMemory::new(&config(3, false))?;
        for v in 0..3 {
            memory.add(tr(v))?;
        }
        assert!(memory.is_full());
        let before = memory.rewards();

        memory.add(tr(9))?;
        assert_eq!(memory.size(), 3);
        assert_eq!(memory.rewards(), before);
        assert_eq!(memory.get_transition(2).unwrap().image[[0, 0]], 2);
        Ok(())
    }

    #[test]
    fn test_wrapping_add_evicts_oldest() -> Result<()> {
        let mut memory = ReplayMemory::new(&config(3, true))?;
        for v in 0..5 {
            memory.add(tr(v))?;
        }
        assert_eq!(memory.size(), 3);
        assert_eq!((memory.bottom(), memory.top()), (2, 2));
        assert_eq!(memory.rewards(), vec![2.0, 3.0, 4.0]);
        assert_eq!(memory.get_transition(0).unwrap().image[[0, 1]], 2);
        assert_eq!(memory.get_transition(2).unwrap().image[[0, 1]], 4);
        assert!(memory.get_transition(3).is_none());
        assert!(memory.window(2).is_none());
        Ok(())
    }

    #[test]
    fn test_add_rejects_malformed_records() -> Result<()> {
        let mut memory = ReplayMemory::new(&config(3, false))?;
        let bad_shape = Transition::new(Array2::zeros((2, 2)), 0, 0.0, false, 0);
        assert!(memory.add(bad_shape).is_err());
        let bad_action = Transition::new(Array2::zeros((1, 2)), 3, 0.0, false, 0);
        assert!(memory.add(bad_action).is_err());
        let bad_state = tr(0).full_state(vec![1, 2, 3]);
        assert!(memory.add(bad_state).is_err());
        for reward in [f32::INFINITY, f32::NEG_INFINITY, f32::NAN] {
            let bad_reward = Transition::new(Array2::zeros((1, 2)), 0, reward, false, 0);
            let err = memory.add(bad_reward).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<ReplayMemoryError>(),
                Some(ReplayMemoryError::InvalidArgument(_))
            ));
        }
        assert_eq!(memory.size(), 0);
        Ok(())
    }

    #[test]
    fn test_full_state_and_life_flags() -> Result<()> {
        let mut memory = ReplayMemory::new(&config(3, false))?;
        memory.add(tr(1).full_state(vec![7, 8]).loss_life(true))?;
        memory.add(tr(2).gain_life(true))?;
        let t0 = memory.get_transition(0).unwrap();
        assert_eq!(t0.full_state, vec![7, 8]);
        assert!(t0.loss_life && !t0.gain_life);
        let t1 = memory.get_transition(1).unwrap();
        assert_eq!(t1.full_state, vec![0, 0]);
        assert!(t1.gain_life);
        assert!(memory.get_transition(2).is_none());
        Ok(())
    }

    #[test]
    fn test_len() -> Result<()> {
        let mut memory = ReplayMemory::new(&config(10, false))?;
        assert_eq!(memory.len(), 0);
        memory.add(tr(0))?;
        assert_eq!(memory.len(), 0);
        memory.add(tr(1))?;
        assert_eq!(memory.len(), 0);
        memory.add(tr(2))?;
        assert_eq!(memory.len(), 1);
        for v in 3..10 {
            memory.add(tr(v))?;
        }
        assert_eq!(memory.len(), 8);
        Ok(())
    }

    #[test]
    fn test_resize() -> Result<()> {
        let mut memory = ReplayMemory::new(&config(10, false))?;
        for v in 0..4 {
            memory.add(tr(v))?;
        }
        memory.resize()?;
        assert_eq!(memory.capacity(), 4);
        assert_eq!(memory.size(), 4);
        assert!(memory.is_full());
        assert_eq!(memory.rewards(), vec![0.0, 1.0, 2.0, 3.0]);

        let mut wrapping = ReplayMemory::new(&config(10, true))?;
        let err = wrapping.resize().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReplayMemoryError>(),
            Some(ReplayMemoryError::WrongMode { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_normalize_images_is_idempotent() -> Result<()> {
        let mut memory = ReplayMemory::new(&config(3, false))?;
        memory.add(tr(255))?;
        memory.normalize_images();
        memory.normalize_images();
        assert!(memory.is_normalized());
        assert_eq!(memory.get_transition(0).unwrap().image[[0, 0]], 255);
        Ok(())
    }

    #[test]
    fn test_extend_from() -> Result<()> {
        let mut demo = ReplayMemory::new(&config(4, false))?;
        for v in 0..4 {
            demo.add(tr(v))?;
        }
        let mut memory = ReplayMemory::new(&config(3, true))?;
        memory.add(tr(9))?;
        assert_eq!(memory.extend_from(&demo)?, 4);
        assert_eq!(memory.rewards(), vec![1.0, 2.0, 3.0]);

        let mut bounded = ReplayMemory::new(&config(2, false))?;
        assert_eq!(bounded.extend_from(&demo)?, 2);
        assert_eq!(bounded.action_counts(), vec![1, 1, 0]);
        Ok(())
    }

    #[test]
    fn test_buffer_traits() -> Result<()> {
        use rand::{rngs::StdRng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(0);
        for wrap_memory in [false, true] {
            let mut memory = <ReplayMemory as ReplayBufferBase>::build(&config(8, wrap_memory))?;
            for v in 0..8 {
                ExperienceBufferBase::push(&mut memory, tr(v))?;
            }
            assert_eq!(ExperienceBufferBase::len(&memory), 6);

            let batch = memory.batch(4, &mut rng)?;
            assert_eq!(batch.len(), 4);
            assert_eq!(batch.next_states.is_some(), wrap_memory);
        }
        Ok(())
    }

    #[test]
    fn test_statistics_and_display() -> Result<()> {
        let mut memory = ReplayMemory::new(&config(5, false))?;
        memory.add(tr(1))?;
        memory.add(Transition::new(Array2::zeros((1, 2)), 0, -0.5, true, 2))?;
        assert_eq!(memory.num_terminal_flags(), 1);
        assert_eq!(memory.sum_rewards(), 0.5);
        assert_eq!(
            memory.to_string(),
            "Replay memory:\n  size:2\n  max_steps:5\n  imgs shape:[5, 1, 2]\n"
        );
        Ok(())
    }
}
