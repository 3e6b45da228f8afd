use anyhow::Result;
use ndarray::Array2;
use phi_replay::{
    error::ReplayMemoryError, images_path, metadata_path, ReplayMemory, ReplayMemoryConfig,
    RewardShaping, Transition,
};
use rand::{rngs::StdRng, SeedableRng};
use tempdir::TempDir;

fn config(max_steps: usize, wrap_memory: bool) -> ReplayMemoryConfig {
    ReplayMemoryConfig::default()
        .width(3)
        .height(2)
        .max_steps(max_steps)
        .phi_length(2)
        .num_actions(4)
        .full_state_size(3)
        .wrap_memory(wrap_memory)
}

fn fill(memory: &mut ReplayMemory, n: usize) -> Result<()> {
    for i in 0..n {
        let image = Array2::from_shape_fn((2, 3), |(r, c)| (i * 7 + r * 3 + c) as u8);
        let tr = Transition::new(image, i % 4, i as f32 * 0.1 - 0.7, i % 5 == 4, (i % 3) as i32)
            .loss_life(i % 6 == 0)
            .gain_life(i % 9 == 0)
            .full_state(vec![i as u8, 2 * i as u8, 255]);
        memory.add(tr)?;
    }
    Ok(())
}

fn assert_same(a: &ReplayMemory, b: &ReplayMemory) {
    assert_eq!(a.size(), b.size());
    assert_eq!(a.capacity(), b.capacity());
    assert_eq!(a.bottom(), b.bottom());
    assert_eq!(a.top(), b.top());
    assert_eq!(a.is_wrapping(), b.is_wrapping());
    assert_eq!(a.is_normalized(), b.is_normalized());
    assert_eq!(a.phi_length(), b.phi_length());
    assert_eq!(a.num_actions(), b.num_actions());
    assert_eq!(a.frame_shape(), b.frame_shape());
    assert_eq!(a.full_state_size(), b.full_state_size());
    assert_eq!(a.clip_reward(), b.clip_reward());
    for i in 0..a.size() {
        assert_eq!(a.get_transition(i), b.get_transition(i));
        assert_eq!(a.window(i), b.window(i));
    }
}

#[test]
fn test_round_trip_bounded() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new("replay_memory")?;

    let mut memory = ReplayMemory::new(&config(50, false).clip_reward(false))?;
    fill(&mut memory, 30)?;
    memory.save("Breakout-v0", dir.path(), false)?;
    assert!(metadata_path(dir.path(), "Breakout-v0").exists());
    assert!(images_path(dir.path(), "Breakout-v0").exists());

    let mut restored = ReplayMemory::new(&config(50, false))?;
    restored.load("Breakout-v0", dir.path())?;
    assert!(!restored.clip_reward());
    assert_same(&memory, &restored);
    assert_eq!(memory.rewards(), restored.rewards());

    let mut rng1 = StdRng::seed_from_u64(11);
    let mut rng2 = StdRng::seed_from_u64(11);
    assert_eq!(
        memory.sample2(8, false, 0, None, &mut rng1)?,
        restored.sample2(8, false, 0, None, &mut rng2)?
    );
    Ok(())
}

#[test]
fn test_round_trip_resized() -> Result<()> {
    let dir = TempDir::new("replay_memory")?;
    let mut memory = ReplayMemory::new(&config(50, false))?;
    fill(&mut memory, 12)?;
    memory.save("demo", dir.path(), true)?;
    assert_eq!(memory.capacity(), 12);

    let restored = ReplayMemory::restore(&config(50, false), "demo", dir.path())?;
    assert_eq!(restored.capacity(), 12);
    assert!(restored.is_full());
    assert_same(&memory, &restored);
    Ok(())
}

#[test]
fn test_round_trip_wrapping_and_normalized() -> Result<()> {
    let dir = TempDir::new("replay_memory")?;
    let mut memory = ReplayMemory::new(&config(16, true))?;
    fill(&mut memory, 37)?;
    memory.normalize_images();
    memory.save("online", dir.path(), false)?;

    let mut restored = ReplayMemory::new(&config(16, true))?;
    restored.load("online", dir.path())?;
    assert_eq!((restored.bottom(), restored.top()), (5, 5));
    assert!(restored.is_normalized());
    assert_same(&memory, &restored);

    let mut rng1 = StdRng::seed_from_u64(2);
    let mut rng2 = StdRng::seed_from_u64(2);
    assert_eq!(
        memory.sample(8, false, Some(1), &mut rng1)?,
        restored.sample(8, false, Some(1), &mut rng2)?
    );
    Ok(())
}

#[test]
fn test_save_resize_refused_when_wrapping() -> Result<()> {
    let dir = TempDir::new("replay_memory")?;
    let mut memory = ReplayMemory::new(&config(16, true))?;
    fill(&mut memory, 5)?;
    let err = memory.save("online", dir.path(), true).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ReplayMemoryError>(),
        Some(ReplayMemoryError::WrongMode { .. })
    ));
    Ok(())
}

#[test]
fn test_load_legacy_metadata() -> Result<()> {
    let dir = TempDir::new("replay_memory")?;
    let mut memory = ReplayMemory::new(&config(20, false).clip_reward(false))?;
    fill(&mut memory, 10)?;
    memory.save("legacy", dir.path(), false)?;

    // Strip the fields that older files do not have.
    let path = metadata_path(dir.path(), "legacy");
    let mut value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    let obj = value.as_object_mut().unwrap();
    for key in [
        "lives",
        "loss_life",
        "gain_life",
        "full_state_size",
        "full_state",
        "clip_reward",
    ] {
        obj.remove(key);
    }
    std::fs::write(&path, serde_json::to_string(&value)?)?;

    let restored = ReplayMemory::restore(&config(20, false), "legacy", dir.path())?;
    assert_eq!(restored.size(), 10);
    assert!(restored.clip_reward());
    assert_eq!(restored.full_state_size(), 3);
    assert_eq!(restored.rewards(), memory.rewards());
    for i in 0..10 {
        let t = restored.get_transition(i).unwrap();
        let o = memory.get_transition(i).unwrap();
        assert_eq!(t.image, o.image);
        assert_eq!(t.action, o.action);
        assert_eq!(t.terminal, o.terminal);
        assert_eq!(t.lives, 0);
        assert!(!t.loss_life && !t.gain_life);
        assert_eq!(t.full_state, vec![0, 0, 0]);
    }
    Ok(())
}

#[test]
fn test_load_corrupted() -> Result<()> {
    let dir = TempDir::new("replay_memory")?;
    let mut memory = ReplayMemory::new(&config(20, false))?;
    fill(&mut memory, 10)?;
    memory.save("bad", dir.path(), false)?;

    let path = metadata_path(dir.path(), "bad");
    let mut value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    value["size"] = serde_json::json!(21);
    std::fs::write(&path, serde_json::to_string(&value)?)?;

    let mut restored = ReplayMemory::new(&config(20, false))?;
    let err = restored.load("bad", dir.path()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ReplayMemoryError>(),
        Some(ReplayMemoryError::Corrupted(_))
    ));
    assert_eq!(restored.size(), 0);

    std::fs::write(images_path(dir.path(), "bad"), b"not gzip")?;
    value["size"] = serde_json::json!(10);
    std::fs::write(&path, serde_json::to_string(&value)?)?;
    assert!(restored.load("bad", dir.path()).is_err());

    assert!(restored.load("missing", dir.path()).is_err());
    Ok(())
}

#[test]
fn test_load_inconsistent_cursors() -> Result<()> {
    let dir = TempDir::new("replay_memory")?;
    let mut memory = ReplayMemory::new(&config(8, true))?;
    fill(&mut memory, 8)?;
    memory.save("online", dir.path(), false)?;

    let path = metadata_path(dir.path(), "online");
    let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!((saved["bottom"].as_u64(), saved["top"].as_u64()), (Some(0), Some(0)));

    for (bottom, top, size) in [(0, 3, 8), (2, 2, 5), (3, 0, 5)] {
        let mut value = saved.clone();
        value["bottom"] = serde_json::json!(bottom);
        value["top"] = serde_json::json!(top);
        value["size"] = serde_json::json!(size);
        std::fs::write(&path, serde_json::to_string(&value)?)?;

        let mut restored = ReplayMemory::new(&config(8, true))?;
        let err = restored.load("online", dir.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ReplayMemoryError>(),
            Some(ReplayMemoryError::Corrupted(_))
        ));
    }

    // A memory that has not wrapped yet.
    let mut value = saved.clone();
    value["top"] = serde_json::json!(5);
    value["size"] = serde_json::json!(5);
    std::fs::write(&path, serde_json::to_string(&value)?)?;
    let restored = ReplayMemory::restore(&config(8, true), "online", dir.path())?;
    assert_eq!(restored.size(), 5);
    Ok(())
}

#[test]
fn test_save_refuses_non_finite_rewards() -> Result<()> {
    let dir = TempDir::new("replay_memory")?;
    let mut memory = ReplayMemory::new(&config(4, false))?;
    for reward in [0.0, f32::MAX, f32::MAX, 0.0] {
        memory.add(Transition::new(Array2::zeros((2, 3)), 0, reward, false, 0))?;
    }
    // Discounting overflows to infinity.
    memory.propagate_rewards(&RewardShaping::default().gamma(2.0));
    assert!(memory.rewards().iter().any(|r| r.is_infinite()));

    let err = memory.save("overflow", dir.path(), false).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ReplayMemoryError>(),
        Some(ReplayMemoryError::InvalidArgument(_))
    ));
    assert!(!metadata_path(dir.path(), "overflow").exists());
    Ok(())
}
