//! A single time step handed to the replay memory.
use ndarray::Array2;

/// One environment step.
///
/// Every field describes the result of taking `action`: `image` is the frame
/// observed after the action, `reward` and `terminal` the outcome of it.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Frame observed after the action, `[height, width]`.
    pub image: Array2<u8>,

    /// Index of the discrete action.
    pub action: usize,

    /// Reward received for the action.
    pub reward: f32,

    /// `true` if the episode ended with this step.
    pub terminal: bool,

    /// Remaining lives after the step.
    pub lives: i32,

    /// `true` if a life was lost with this step.
    pub loss_life: bool,

    /// `true` if a life was gained with this step.
    pub gain_life: bool,

    /// Auxiliary full-state vector. Empty means zero-filled.
    pub full_state: Vec<u8>,
}

impl Transition {
    /// Creates a transition without life events and auxiliary state.
    pub fn new(image: Array2<u8>, action: usize, reward: f32, terminal: bool, lives: i32) -> Self {
        Self {
            image,
            action,
            reward,
            terminal,
            lives,
            loss_life: false,
            gain_life: false,
            full_state: vec![],
        }
    }

    /// Sets the loss-of-life flag.
    pub fn loss_life(mut self, v: bool) -> Self {
        self.loss_life = v;
        self
    }

    /// Sets the gain-of-life flag.
    pub fn gain_life(mut self, v: bool) -> Self {
        self.gain_life = v;
        self
    }

    /// Sets the auxiliary full-state vector.
    pub fn full_state(mut self, v: Vec<u8>) -> Self {
        self.full_state = v;
        self
    }
}
