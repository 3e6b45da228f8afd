//! Human demonstrations recorded as bounded replay memories.
//!
//! Demonstrations live in numbered subfolders of a common folder, one memory
//! per subfolder, all saved under the same name:
//!
//! ```text
//! demo_samples/
//!     001/<name>.json
//!     001/<name>-images.bin.gz
//!     002/<name>.json
//!     ...
//! ```
use crate::{ReplayMemory, ReplayMemoryConfig};
use anyhow::{Context, Result};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

/// Folder of the demonstration with id `id`.
pub fn demo_folder(folder: impl AsRef<Path>, id: usize) -> PathBuf {
    folder.as_ref().join(format!("{:03}", id))
}

/// Summary of a set of demonstrations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DemoStats {
    /// Number of records per action over all demonstrations.
    pub action_counts: Vec<usize>,

    /// Sum of rewards per demonstration id.
    pub total_rewards: BTreeMap<usize, f32>,

    /// Number of records over all demonstrations.
    pub total_steps: usize,
}

/// Loads the demonstrations `ids` saved as `name` under `folder`.
///
/// `config` provides the defaults for fields missing from older files.
pub fn load_demos(
    name: &str,
    folder: impl AsRef<Path>,
    ids: &[usize],
    config: &ReplayMemoryConfig,
) -> Result<(BTreeMap<usize, ReplayMemory>, DemoStats)> {
    let mut demos = BTreeMap::new();
    let mut stats = DemoStats::default();

    for &id in ids {
        let path = demo_folder(&folder, id);
        let demo = ReplayMemory::restore(config, name, &path)
            .with_context(|| format!("failed to load demonstration {:03}", id))?;

        let counts = demo.action_counts();
        if stats.action_counts.len() < counts.len() {
            stats.action_counts.resize(counts.len(), 0);
        }
        for (total, c) in stats.action_counts.iter_mut().zip(counts.iter()) {
            *total += c;
        }
        stats.total_rewards.insert(id, demo.sum_rewards());
        stats.total_steps += demo.size();

        log::info!(
            "Loaded demonstration {:03}: {} steps, total reward {}",
            id,
            demo.size(),
            demo.sum_rewards()
        );
        demos.insert(id, demo);
    }

    log::info!(
        "Loaded {} demonstrations, {} steps",
        demos.len(),
        stats.total_steps
    );
    Ok((demos, stats))
}

/// Appends demonstrations to `memory` in id order.
///
/// Returns the number of records written.
pub fn add_demo_experiences<'a>(
    memory: &mut ReplayMemory,
    demos: impl IntoIterator<Item = &'a ReplayMemory>,
) -> Result<usize> {
    log::info!("Memory size={}", memory.size());
    log::info!("Adding human experiences...");
    let mut n = 0;
    for demo in demos {
        n += memory.extend_from(demo)?;
    }
    log::info!("Memory size={}", memory.size());
    Ok(n)
}
