use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use phi_replay::{
    demo::{add_demo_experiences, load_demos},
    ReplayMemory, ReplayMemoryConfig, RewardShaping,
};
use std::path::{Path, PathBuf};

/// Inspect and post-process saved replay memories
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Configuration file (YAML) supplying defaults for fields missing from
    /// older files
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the summary of a saved memory
    Inspect {
        /// Folder of the memory
        folder: PathBuf,

        /// Name the memory was saved under
        name: String,
    },

    /// Propagate discounted rewards through a saved memory
    Propagate(PropagateArgs),

    /// Merge demonstrations into a single bounded memory
    Merge(MergeArgs),
}

#[derive(Args, Debug)]
struct PropagateArgs {
    /// Folder of the memory
    folder: PathBuf,

    /// Name the memory was saved under
    name: String,

    /// Discount factor
    #[arg(long, default_value_t = 0.95)]
    gamma: f32,

    /// Clip rewards to [-1, 1] before propagation
    #[arg(long, default_value_t = false)]
    clip: bool,

    /// Divide rewards by max-reward before propagation
    #[arg(long, default_value_t = false)]
    normalize: bool,

    /// Rescale propagated rewards to [0, 1]
    #[arg(long, default_value_t = false)]
    minmax_scale: bool,

    /// Replace rewards beyond two standard deviations with +/- max-reward
    #[arg(long, default_value_t = false)]
    exclude_outlier: bool,

    /// Largest reward magnitude of the environment
    #[arg(long, default_value_t = 0.0)]
    max_reward: f32,

    /// Name to save the result under, defaults to overwriting the input
    #[arg(long)]
    out: Option<String>,
}

#[derive(Args, Debug)]
struct MergeArgs {
    /// Folder holding the numbered demonstration subfolders
    folder: PathBuf,

    /// Name the demonstrations were saved under
    name: String,

    /// Demonstration ids
    #[arg(long, num_args = 1.., required = true)]
    ids: Vec<usize>,

    /// Output folder
    #[arg(long)]
    out_folder: PathBuf,

    /// Output name, defaults to the input name
    #[arg(long)]
    out_name: Option<String>,
}

fn base_config(cli: &Cli) -> Result<ReplayMemoryConfig> {
    match &cli.config {
        Some(path) => ReplayMemoryConfig::load(path),
        None => Ok(ReplayMemoryConfig::default()),
    }
}

fn inspect(config: &ReplayMemoryConfig, folder: &Path, name: &str) -> Result<()> {
    let memory = ReplayMemory::restore(config, name, folder)?;
    println!("{}", memory);
    println!("  mode:{}", if memory.is_wrapping() { "wrapping" } else { "bounded" });
    println!("  bottom:{} top:{}", memory.bottom(), memory.top());
    println!("  phi_length:{}", memory.phi_length());
    println!("  normalized:{}", memory.is_normalized());
    println!("  terminal flags:{}", memory.num_terminal_flags());
    println!("  sum of rewards:{}", memory.sum_rewards());
    println!("  action counts:{:?}", memory.action_counts());
    Ok(())
}

fn propagate(config: &ReplayMemoryConfig, args: &PropagateArgs) -> Result<()> {
    let mut memory = ReplayMemory::restore(config, &args.name, &args.folder)?;
    let opts = RewardShaping::default()
        .gamma(args.gamma)
        .clip(args.clip)
        .normalize(args.normalize)
        .minmax_scale(args.minmax_scale)
        .exclude_outlier(args.exclude_outlier)
        .max_reward(args.max_reward);
    memory.propagate_rewards(&opts);

    let out = args.out.as_deref().unwrap_or(&args.name);
    memory.save(out, &args.folder, false)?;
    log::info!("Saved propagated memory as {:?}", out);
    Ok(())
}

fn merge(config: &ReplayMemoryConfig, args: &MergeArgs) -> Result<()> {
    let (demos, stats) = load_demos(&args.name, &args.folder, &args.ids, config)?;
    let first = demos
        .values()
        .next()
        .ok_or_else(|| anyhow!("no demonstration loaded"))?;
    let [height, width] = first.frame_shape();

    let merged_config = config
        .clone()
        .width(width)
        .height(height)
        .phi_length(first.phi_length())
        .num_actions(first.num_actions())
        .full_state_size(first.full_state_size())
        .clip_reward(first.clip_reward())
        .max_steps(stats.total_steps)
        .wrap_memory(false);
    let mut memory = ReplayMemory::new(&merged_config)?;
    add_demo_experiences(&mut memory, demos.values())?;

    log::info!("Action counts: {:?}", stats.action_counts);
    for (id, total) in stats.total_rewards.iter() {
        log::info!("Demonstration {:03}: total reward {}", id, total);
    }

    let out = args.out_name.as_deref().unwrap_or(&args.name);
    memory.save(out, &args.out_folder, true)?;
    log::info!("Saved merged memory to {:?}", args.out_folder);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = base_config(&cli)?;

    match &cli.command {
        Command::Inspect { folder, name } => inspect(&config, folder, name),
        Command::Propagate(args) => propagate(&config, args),
        Command::Merge(args) => merge(&config, args),
    }
}
