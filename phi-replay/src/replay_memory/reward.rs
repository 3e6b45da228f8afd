//! Offline reward post-processing.
use super::ReplayMemory;
use serde::{Deserialize, Serialize};

/// Options of [`ReplayMemory::propagate_rewards`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct RewardShaping {
    /// Discount factor of the backward propagation.
    pub gamma: f32,

    /// Clip rewards to `[-1, 1]` before propagation.
    pub clip: bool,

    /// Divide rewards by `max_reward` before propagation.
    pub normalize: bool,

    /// Rescale the propagated returns to `[0, 1]`.
    pub minmax_scale: bool,

    /// Replace nonzero rewards further than two standard deviations from the
    /// mean of nonzero rewards by `±max_reward`. Ignored when `clip` is set.
    pub exclude_outlier: bool,

    /// Reference magnitude for outlier replacement and normalization; `0`
    /// disables both.
    pub max_reward: f32,
}

impl Default for RewardShaping {
    fn default() -> Self {
        Self {
            gamma: 0.95,
            clip: false,
            normalize: false,
            minmax_scale: false,
            exclude_outlier: false,
            max_reward: 0.0,
        }
    }
}

impl RewardShaping {
    /// Sets the discount factor.
    pub fn gamma(mut self, v: f32) -> Self {
        self.gamma = v;
        self
    }

    /// Sets clipping.
    pub fn clip(mut self, v: bool) -> Self {
        self.clip = v;
        self
    }

    /// Sets normalization by `max_reward`.
    pub fn normalize(mut self, v: bool) -> Self {
        self.normalize = v;
        self
    }

    /// Sets min-max rescaling of the returns.
    pub fn minmax_scale(mut self, v: bool) -> Self {
        self.minmax_scale = v;
        self
    }

    /// Sets outlier suppression.
    pub fn exclude_outlier(mut self, v: bool) -> Self {
        self.exclude_outlier = v;
        self
    }

    /// Sets the reference reward magnitude.
    pub fn max_reward(mut self, v: f32) -> Self {
        self.max_reward = v;
        self
    }
}

fn mean_std(vs: &[f32]) -> (f32, f32) {
    let n = vs.len() as f32;
    let mean = vs.iter().sum::<f32>() / n;
    let var = vs.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
    (mean, var.sqrt())
}

impl ReplayMemory {
    /// Turns step rewards into discounted returns in place.
    ///
    /// For `i` from `size - 2` down to `1`, `reward[i] += gamma * reward[i + 1]`.
    /// The first and the last record keep their reward. Clipping, outlier
    /// suppression and normalization are applied before, min-max rescaling
    /// after the propagation.
    ///
    /// This is destructive and meant for recorded demonstrations; it must not
    /// run on a memory that is being sampled for training.
    pub fn propagate_rewards(&mut self, opts: &RewardShaping) {
        let size = self.size();
        let slots = (0..size).map(|i| self.slot(i)).collect::<Vec<_>>();
        let mut rewards = slots.iter().map(|&s| self.rewards[s]).collect::<Vec<_>>();

        log::info!("Propagating rewards...");
        log::info!("    reward size: {}", size);
        log::info!("    gamma: {}", opts.gamma);
        log::info!("    clip: {}", opts.clip);
        log::info!("    normalize: {}", opts.normalize);
        log::info!("    minmax_scale: {}", opts.minmax_scale);

        if opts.clip {
            rewards.iter_mut().for_each(|r| *r = r.clamp(-1.0, 1.0));
        } else if opts.exclude_outlier && opts.max_reward != 0.0 {
            let nonzero = rewards.iter().copied().filter(|r| *r != 0.0).collect::<Vec<_>>();
            if !nonzero.is_empty() {
                let (mean, std) = mean_std(&nonzero);
                for r in rewards.iter_mut() {
                    if *r != 0.0 && (*r - mean).abs() > 2.0 * std {
                        log::debug!("    outlier: {}", r);
                        *r = if *r > 0.0 {
                            opts.max_reward
                        } else {
                            -opts.max_reward
                        };
                    }
                }
            }
        }

        if opts.normalize && opts.max_reward != 0.0 {
            log::debug!("    max_reward: {}", opts.max_reward);
            rewards.iter_mut().for_each(|r| *r /= opts.max_reward);
        }

        for i in (1..size.saturating_sub(1)).rev() {
            rewards[i] += opts.gamma * rewards[i + 1];
        }

        if opts.minmax_scale && !rewards.is_empty() {
            let min = rewards.iter().copied().fold(f32::INFINITY, f32::min);
            let max = rewards.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let range = max - min;
            rewards.iter_mut().for_each(|r| {
                *r = if range > 0.0 { (*r - min) / range } else { 0.0 };
            });
        }

        for (&s, &r) in slots.iter().zip(rewards.iter()) {
            self.rewards[s] = r;
        }

        log::debug!(
            "    max_reward: {}",
            rewards.iter().fold(0f32, |m, r| m.max(r.abs()))
        );
        log::info!("Rewards propagated!");
    }
}
