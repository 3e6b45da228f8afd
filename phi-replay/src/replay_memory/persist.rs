//! Saving and loading of replay memories.
//!
//! A memory is stored as two files in a folder:
//!
//! - `<name>.json`: every scalar and every non-image array;
//! - `<name>-images.bin.gz`: the frames, bincode-encoded in a gzip stream.
//!
//! Fields introduced after the first version of the format (`lives`,
//! `loss_life`, `gain_life`, `full_state_size`, `full_state`, `clip_reward`)
//! are optional in the metadata and defaulted when absent.
use super::ReplayMemory;
use crate::{error::ReplayMemoryError, frames::Frames, ring::RingIndex, ReplayMemoryConfig};
use anyhow::{Context, Result};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Path of the metadata file.
pub fn metadata_path(folder: impl AsRef<Path>, name: &str) -> PathBuf {
    folder.as_ref().join(format!("{}.json", name))
}

/// Path of the compressed image file.
pub fn images_path(folder: impl AsRef<Path>, name: &str) -> PathBuf {
    folder.as_ref().join(format!("{}-images.bin.gz", name))
}

#[derive(Debug, Serialize, Deserialize)]
struct Metadata {
    width: usize,
    height: usize,
    max_steps: usize,
    phi_length: usize,
    num_actions: usize,
    actions: Vec<usize>,
    rewards: Vec<f32>,
    terminal: Vec<i8>,
    #[serde(default)]
    lives: Option<Vec<i32>>,
    #[serde(default)]
    loss_life: Option<Vec<i8>>,
    #[serde(default)]
    gain_life: Option<Vec<i8>>,
    #[serde(default)]
    full_state_size: Option<usize>,
    #[serde(default)]
    full_state: Option<Array2<u8>>,
    #[serde(default)]
    clip_reward: Option<bool>,
    size: usize,
    wrap_memory: bool,
    top: usize,
    bottom: usize,
    imgs_normalized: bool,
}

fn corrupted(msg: String) -> anyhow::Error {
    ReplayMemoryError::Corrupted(msg).into()
}

fn check_len(field: &str, len: usize, max_steps: usize) -> Result<()> {
    if len != max_steps {
        return Err(corrupted(format!(
            "{} has {} elements, expected {}",
            field, len, max_steps
        )));
    }
    Ok(())
}

impl ReplayMemory {
    /// Builds a memory from `config` and loads `name` from `folder` into it.
    pub fn restore(config: &ReplayMemoryConfig, name: &str, folder: impl AsRef<Path>) -> Result<Self> {
        let mut memory = Self::new(config)?;
        memory.load(name, folder)?;
        Ok(memory)
    }

    /// Writes the memory to `folder`.
    ///
    /// With `resize`, the memory is first shrunk to its size, which is refused
    /// in wrapping mode. Non-finite rewards, which JSON cannot represent, are
    /// refused before anything is written.
    pub fn save(&mut self, name: &str, folder: impl AsRef<Path>, resize: bool) -> Result<()> {
        if let Some(r) = self.rewards.iter().find(|r| !r.is_finite()) {
            return Err(ReplayMemoryError::InvalidArgument(format!(
                "reward {} cannot be saved",
                r
            ))
            .into());
        }
        if resize {
            self.resize()?;
        }
        let folder = folder.as_ref();
        fs::create_dir_all(folder)?;

        let data = Metadata {
            width: self.width,
            height: self.height,
            max_steps: self.capacity(),
            phi_length: self.phi_length,
            num_actions: self.num_actions,
            actions: self.actions.clone(),
            rewards: self.rewards.clone(),
            terminal: self.terminal.clone(),
            lives: Some(self.lives.clone()),
            loss_life: Some(self.loss_life.clone()),
            gain_life: Some(self.gain_life.clone()),
            full_state_size: Some(self.full_state_size),
            full_state: Some(self.full_state.clone()),
            clip_reward: Some(self.clip_reward),
            size: self.size(),
            wrap_memory: self.is_wrapping(),
            top: self.top(),
            bottom: self.bottom(),
            imgs_normalized: self.is_normalized(),
        };
        let path = metadata_path(folder, name);
        let mut wtr = BufWriter::new(File::create(&path)?);
        serde_json::to_writer(&mut wtr, &data)?;
        wtr.flush()?;
        log::debug!("Saved metadata to {:?}", path);

        log::info!("Compressing and saving replay memory...");
        let path = images_path(folder, name);
        let mut enc = GzEncoder::new(BufWriter::new(File::create(&path)?), Compression::default());
        bincode::serialize_into(&mut enc, &self.imgs)?;
        enc.finish()?.flush()?;
        log::info!("Compressed and saved replay memory");

        Ok(())
    }

    /// Replaces the contents of the memory with `name` from `folder`.
    ///
    /// Geometry, capacity, mode, cursors and the normalization flag are taken
    /// from the files. Optional fields missing from older files are
    /// zero-filled. The memory is left untouched if loading fails.
    pub fn load(&mut self, name: &str, folder: impl AsRef<Path>) -> Result<()> {
        let folder = folder.as_ref();
        let path = metadata_path(folder, name);
        let file = File::open(&path).with_context(|| format!("failed to open {:?}", path))?;
        let data: Metadata = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse {:?}", path))?;

        let max_steps = data.max_steps;
        if data.phi_length == 0 || data.num_actions == 0 {
            return Err(corrupted("phi_length and num_actions must be >= 1".into()));
        }
        check_len("actions", data.actions.len(), max_steps)?;
        check_len("rewards", data.rewards.len(), max_steps)?;
        check_len("terminal", data.terminal.len(), max_steps)?;
        if let Some(a) = data.actions.iter().find(|&&a| a >= data.num_actions) {
            return Err(corrupted(format!(
                "action {} is out of range for {} actions",
                a, data.num_actions
            )));
        }

        let lives = data.lives.unwrap_or_else(|| vec![0; max_steps]);
        let loss_life = data.loss_life.unwrap_or_else(|| vec![0; max_steps]);
        let gain_life = data.gain_life.unwrap_or_else(|| vec![0; max_steps]);
        check_len("lives", lives.len(), max_steps)?;
        check_len("loss_life", loss_life.len(), max_steps)?;
        check_len("gain_life", gain_life.len(), max_steps)?;

        let full_state_size = data.full_state_size.unwrap_or(self.full_state_size);
        let full_state = data
            .full_state
            .unwrap_or_else(|| Array2::zeros((max_steps, full_state_size)));
        if full_state.shape() != [max_steps, full_state_size] {
            return Err(corrupted(format!(
                "full_state has shape {:?}, expected [{}, {}]",
                full_state.shape(),
                max_steps,
                full_state_size
            )));
        }

        let ring = RingIndex::from_parts(
            max_steps,
            data.bottom,
            data.top,
            data.size,
            data.wrap_memory,
        )
        .ok_or_else(|| {
            corrupted(format!(
                "cursors bottom={} top={} size={} do not fit max_steps={}",
                data.bottom, data.top, data.size, max_steps
            ))
        })?;

        let path = images_path(folder, name);
        let file = File::open(&path).with_context(|| format!("failed to open {:?}", path))?;
        let imgs: Frames = bincode::deserialize_from(GzDecoder::new(BufReader::new(file)))
            .with_context(|| format!("failed to decode {:?}", path))?;
        if imgs.shape() != [max_steps, data.height, data.width] {
            return Err(corrupted(format!(
                "images have shape {:?}, expected [{}, {}, {}]",
                imgs.shape(),
                max_steps,
                data.height,
                data.width
            )));
        }
        if imgs.is_normalized() != data.imgs_normalized {
            return Err(corrupted(format!(
                "imgs_normalized = {} does not match the stored images",
                data.imgs_normalized
            )));
        }

        self.width = data.width;
        self.height = data.height;
        self.phi_length = data.phi_length;
        self.num_actions = data.num_actions;
        self.full_state_size = full_state_size;
        self.clip_reward = data.clip_reward.unwrap_or(self.clip_reward);
        self.ring = ring;
        self.imgs = imgs;
        self.actions = data.actions;
        self.rewards = data.rewards;
        self.terminal = data.terminal;
        self.lives = lives;
        self.loss_life = loss_life;
        self.gain_life = gain_life;
        self.full_state = full_state;

        log::info!("Loaded replay memory {:?} from {:?}", name, folder);
        log::debug!("{}", self);
        Ok(())
    }
}
