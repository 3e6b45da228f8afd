//! Storage of image frames and stacked states.
//!
//! Frames are kept as raw bytes until [`Frames::normalize`] rescales them to
//! `[0, 1]`. The conversion is one-way; stacked states and batches built from
//! the storage follow its element type.
use ndarray::{Array2, Array3, Array4, ArrayView2, Axis, LinalgScalar};
use serde::{Deserialize, Serialize};

/// Image storage of shape `[capacity, height, width]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Frames {
    /// Raw pixel values.
    Raw(Array3<u8>),

    /// Pixel values rescaled to `[0, 1]`.
    Normalized(Array3<f32>),
}

impl Frames {
    /// Zero-filled raw storage.
    pub fn zeros(capacity: usize, height: usize, width: usize) -> Self {
        Self::Raw(Array3::zeros((capacity, height, width)))
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.shape()[0]
    }

    /// Returns `true` if there is no slot.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shape `[capacity, height, width]`.
    pub fn shape(&self) -> [usize; 3] {
        let s = match self {
            Self::Raw(a) => a.shape(),
            Self::Normalized(a) => a.shape(),
        };
        [s[0], s[1], s[2]]
    }

    /// Returns `true` if pixel values have been rescaled.
    pub fn is_normalized(&self) -> bool {
        matches!(self, Self::Normalized(_))
    }

    /// Writes a raw frame into `slot`.
    ///
    /// The frame is rescaled when the storage is normalized.
    pub fn set(&mut self, slot: usize, image: ArrayView2<u8>) {
        match self {
            Self::Raw(a) => a.index_axis_mut(Axis(0), slot).assign(&image),
            Self::Normalized(a) => a
                .index_axis_mut(Axis(0), slot)
                .assign(&image.mapv(|p| p as f32 / 255.0)),
        }
    }

    /// Copies the frame at `src_slot` of `src` into `slot`, converting the
    /// element type if the storages differ.
    pub fn copy_from(&mut self, slot: usize, src: &Frames, src_slot: usize) {
        match (self, src) {
            (Self::Raw(dst), Self::Raw(s)) => dst
                .index_axis_mut(Axis(0), slot)
                .assign(&s.index_axis(Axis(0), src_slot)),
            (Self::Normalized(dst), Self::Normalized(s)) => dst
                .index_axis_mut(Axis(0), slot)
                .assign(&s.index_axis(Axis(0), src_slot)),
            (Self::Normalized(dst), Self::Raw(s)) => dst
                .index_axis_mut(Axis(0), slot)
                .assign(&s.index_axis(Axis(0), src_slot).mapv(|p| p as f32 / 255.0)),
            (Self::Raw(dst), Self::Normalized(s)) => dst
                .index_axis_mut(Axis(0), slot)
                .assign(&s.index_axis(Axis(0), src_slot).mapv(denormalize)),
        }
    }

    /// Raw copy of the frame at `slot`.
    pub fn get_raw(&self, slot: usize) -> Array2<u8> {
        match self {
            Self::Raw(a) => a.index_axis(Axis(0), slot).to_owned(),
            Self::Normalized(a) => a.index_axis(Axis(0), slot).mapv(denormalize),
        }
    }

    /// Rescales raw frames to `[0, 1]`. Returns `false` if already normalized.
    pub fn normalize(&mut self) -> bool {
        match self {
            Self::Normalized(_) => false,
            Self::Raw(a) => {
                let normalized = a.mapv(|p| p as f32 / 255.0);
                *self = Self::Normalized(normalized);
                true
            }
        }
    }

    /// Drops every slot at or beyond `len`.
    pub fn truncate(&mut self, len: usize) {
        match self {
            Self::Raw(a) => *a = a.slice_axis(Axis(0), (0..len).into()).to_owned(),
            Self::Normalized(a) => *a = a.slice_axis(Axis(0), (0..len).into()).to_owned(),
        }
    }

    /// Stacks the frames at `slots` along a new trailing axis.
    pub fn stack(&self, slots: &[usize]) -> FrameStack {
        match self {
            Self::Raw(a) => FrameStack::Raw(stack_slots(a, slots)),
            Self::Normalized(a) => FrameStack::Normalized(stack_slots(a, slots)),
        }
    }

    /// A zero-filled stack with the element type of the storage.
    pub fn zero_stack(&self, depth: usize) -> FrameStack {
        let [_, h, w] = self.shape();
        match self {
            Self::Raw(_) => FrameStack::Raw(Array3::zeros((h, w, depth))),
            Self::Normalized(_) => FrameStack::Normalized(Array3::zeros((h, w, depth))),
        }
    }
}

fn denormalize(p: f32) -> u8 {
    (p * 255.0).round().clamp(0.0, 255.0) as u8
}

fn stack_slots<T: LinalgScalar>(frames: &Array3<T>, slots: &[usize]) -> Array3<T> {
    let (h, w) = (frames.shape()[1], frames.shape()[2]);
    let mut out = Array3::zeros((h, w, slots.len()));
    for (i, &slot) in slots.iter().enumerate() {
        out.index_axis_mut(Axis(2), i)
            .assign(&frames.index_axis(Axis(0), slot));
    }
    out
}

/// A state of shape `[height, width, phi_length]`, oldest frame first.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameStack {
    /// Raw pixel values.
    Raw(Array3<u8>),

    /// Pixel values in `[0, 1]`.
    Normalized(Array3<f32>),
}

impl FrameStack {
    /// Shape `[height, width, phi_length]`.
    pub fn shape(&self) -> [usize; 3] {
        let s = match self {
            Self::Raw(a) => a.shape(),
            Self::Normalized(a) => a.shape(),
        };
        [s[0], s[1], s[2]]
    }

    /// Returns `true` for floating point stacks.
    pub fn is_normalized(&self) -> bool {
        matches!(self, Self::Normalized(_))
    }

    /// Floating point copy; raw values are rescaled to `[0, 1]`.
    pub fn to_f32(&self) -> Array3<f32> {
        match self {
            Self::Raw(a) => a.mapv(|p| p as f32 / 255.0),
            Self::Normalized(a) => a.clone(),
        }
    }

    /// Returns the raw array, if any.
    pub fn as_raw(&self) -> Option<&Array3<u8>> {
        match self {
            Self::Raw(a) => Some(a),
            Self::Normalized(_) => None,
        }
    }

    /// Returns the normalized array, if any.
    pub fn as_normalized(&self) -> Option<&Array3<f32>> {
        match self {
            Self::Raw(_) => None,
            Self::Normalized(a) => Some(a),
        }
    }
}

/// States of shape `[batch_size, height, width, phi_length]`.
#[derive(Debug, Clone, PartialEq)]
pub enum StateBatch {
    /// Raw pixel values.
    Raw(Array4<u8>),

    /// Pixel values in `[0, 1]`.
    Normalized(Array4<f32>),
}

impl StateBatch {
    /// Zero-filled batch. `as_f32` selects the floating point variant.
    pub fn zeros(batch_size: usize, shape: [usize; 3], as_f32: bool) -> Self {
        let [h, w, d] = shape;
        if as_f32 {
            Self::Normalized(Array4::zeros((batch_size, h, w, d)))
        } else {
            Self::Raw(Array4::zeros((batch_size, h, w, d)))
        }
    }

    /// Writes `stack` as the `i`-th entry.
    ///
    /// Raw stacks written into a floating point batch are rescaled to `[0, 1]`.
    pub fn set(&mut self, i: usize, stack: &FrameStack) {
        match (self, stack) {
            (Self::Raw(b), FrameStack::Raw(s)) => b.index_axis_mut(Axis(0), i).assign(s),
            (Self::Normalized(b), FrameStack::Normalized(s)) => {
                b.index_axis_mut(Axis(0), i).assign(s)
            }
            (Self::Normalized(b), s @ FrameStack::Raw(_)) => {
                b.index_axis_mut(Axis(0), i).assign(&s.to_f32())
            }
            (Self::Raw(b), FrameStack::Normalized(s)) => b
                .index_axis_mut(Axis(0), i)
                .assign(&s.mapv(denormalize)),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        match self {
            Self::Raw(a) => a.shape()[0],
            Self::Normalized(a) => a.shape()[0],
        }
    }

    /// Returns `true` if there is no entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` for floating point batches.
    pub fn is_normalized(&self) -> bool {
        matches!(self, Self::Normalized(_))
    }

    /// Floating point copy; raw values are rescaled to `[0, 1]`.
    pub fn to_f32(&self) -> Array4<f32> {
        match self {
            Self::Raw(a) => a.mapv(|p| p as f32 / 255.0),
            Self::Normalized(a) => a.clone(),
        }
    }

    /// Returns the raw array, if any.
    pub fn as_raw(&self) -> Option<&Array4<u8>> {
        match self {
            Self::Raw(a) => Some(a),
            Self::Normalized(_) => None,
        }
    }

    /// Returns the normalized array, if any.
    pub fn as_normalized(&self) -> Option<&Array4<f32>> {
        match self {
            Self::Raw(_) => None,
            Self::Normalized(a) => Some(a),
        }
    }
}
