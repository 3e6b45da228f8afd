//! Stacked windows over consecutive records.
use super::ReplayMemory;
use crate::frames::FrameStack;

/// A state of `phi_length` stacked frames and the step it ends with.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// Frames `[k, k + phi_length - 1]`, oldest first along the last axis.
    pub state: FrameStack,

    /// Action of the last frame.
    pub action: usize,

    /// Reward of the last frame, collapsed to its sign if `clip_reward` is set.
    pub reward: f32,

    /// Terminal flag of the last frame.
    pub terminal: bool,

    /// Frames `[k + 1, k + phi_length]`. Zero-filled when the last frame is
    /// terminal or its successor has not been recorded yet.
    pub next_state: FrameStack,

    /// Lives after the last frame.
    pub lives: i32,

    /// Loss-of-life flag of the last frame.
    pub loss_life: bool,

    /// Gain-of-life flag of the last frame.
    pub gain_life: bool,
}

fn sign(r: f32) -> f32 {
    if r > 0.0 {
        1.0
    } else if r < 0.0 {
        -1.0
    } else {
        0.0
    }
}

impl ReplayMemory {
    /// Returns `true` if any of the first `phi_length - 1` frames of the window
    /// starting at `index` ends an episode.
    pub(super) fn crosses_terminal(&self, index: usize) -> bool {
        (index..index + self.phi_length - 1).any(|k| self.is_terminal_at(k))
    }

    /// Assembles the window starting at logical index `index`.
    ///
    /// Returns `None` if the window reads past the recorded history or if a
    /// terminal flag lies inside the window (only its last frame may be
    /// terminal). The returned arrays are copies.
    pub fn window(&self, index: usize) -> Option<Window> {
        let size = self.size();
        let end = index.checked_add(self.phi_length - 1)?;
        if end >= size || self.crosses_terminal(index) {
            return None;
        }

        let slots = (index..=end).map(|k| self.slot(k)).collect::<Vec<_>>();
        let last = self.slot(end);
        let terminal = self.terminal[last] != 0;
        let reward = if self.clip_reward {
            sign(self.rewards[last])
        } else {
            self.rewards[last]
        };

        let next_state = if !terminal && end + 1 < size {
            let next_slots = (index + 1..=end + 1).map(|k| self.slot(k)).collect::<Vec<_>>();
            self.imgs.stack(&next_slots)
        } else {
            self.imgs.zero_stack(self.phi_length)
        };

        Some(Window {
            state: self.imgs.stack(&slots),
            action: self.actions[last],
            reward,
            terminal,
            next_state,
            lives: self.lives[last],
            loss_life: self.loss_life[last] != 0,
            gain_life: self.gain_life[last] != 0,
        })
    }
}
