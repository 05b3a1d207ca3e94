use serde::{Deserialize, Serialize};

/// A contiguous block of the study horizon solved as one problem.
///
/// `timesteps[i]` is the absolute timestep of block timestep `i`; data
/// series are read at absolute timesteps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBlock {
    pub id: usize,
    pub timesteps: Vec<usize>,
}

impl TimeBlock {
    pub fn new(id: usize, timesteps: Vec<usize>) -> Self {
        Self { id, timesteps }
    }

    /// Block `id` covering `0..length`
    pub fn first(id: usize, length: usize) -> Self {
        Self::new(id, (0..length).collect())
    }

    pub fn len(&self) -> usize {
        self.timesteps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timesteps.is_empty()
    }
}
