//! Progressive accumulation bookkeeping.
//!
//! The display image holds the mean of every sample since the last reset.
//! Sample `k` (0-based) enters with weight `1/(k+1)`:
//!
//! ```text
//! display = display * k/(k+1) + sample * 1/(k+1)
//! ```
//!
//! evaluated in 32-bit float by the composite pass. The first sample after a
//! reset has weight 1 and fully replaces whatever the display held.

use std::fmt;

/// Frames accumulated since the last reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleCounter {
    count: u32,
}

impl SampleCounter {
    pub const fn new() -> Self {
        Self { count: 0 }
    }

    /// Number of samples already blended into the display image.
    #[inline]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Weight the next sample is blended with.
    #[inline]
    pub fn weight(&self) -> BlendWeight {
        BlendWeight::for_sample(self.count)
    }

    /// Record one blended sample.
    #[inline]
    pub fn advance(&mut self) {
        self.count = self.count.saturating_add(1);
    }

    /// Restart convergence.
    #[inline]
    pub fn reset(&mut self) {
        self.count = 0;
    }
}

/// Blend weight of a new sample in the running average.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendWeight {
    sample_index: u32,
    value: f32,
}

impl BlendWeight {
    /// Weight of the sample with 0-based index `sample_index`.
    pub fn for_sample(sample_index: u32) -> Self {
        Self {
            sample_index,
            value: 1.0 / (sample_index as f32 + 1.0),
        }
    }

    /// Index of the sample this weight applies to.
    #[inline]
    pub const fn sample_index(&self) -> u32 {
        self.sample_index
    }

    /// `1/(sample_index+1)`.
    #[inline]
    pub const fn value(&self) -> f32 {
        self.value
    }

    /// Weight kept by the previous average, `sample_index/(sample_index+1)`.
    #[inline]
    pub fn retained(&self) -> f32 {
        1.0 - self.value
    }

    /// CPU reference of the composite blend for one channel.
    #[inline]
    pub fn blend(&self, previous: f32, sample: f32) -> f32 {
        previous * self.retained() + sample * self.value
    }
}

/// Accumulation state of one output target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulationState {
    /// No target allocated yet, or the target is being replaced.
    Uninitialized,
    /// Target allocated; the payload is the number of samples blended so far.
    Accumulating(u32),
}

impl AccumulationState {
    pub fn is_initialized(&self) -> bool {
        matches!(self, Self::Accumulating(_))
    }

    pub fn samples(&self) -> u32 {
        match self {
            Self::Uninitialized => 0,
            Self::Accumulating(n) => *n,
        }
    }
}

impl fmt::Display for AccumulationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Accumulating(n) => write!(f, "accumulating ({n} samples)"),
        }
    }
}
