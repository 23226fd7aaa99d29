use thiserror::Error;

use crate::{gpu_projector::GpuError, volume_loader::VolumeLoaderError};

/// Rejected configuration values. Raised at construction time, never corrected.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid projection axis {0:?} (expected z, y, x or 1, 2, 3)")]
    InvalidAxis(String),

    #[error("Invalid render mode {0:?} (expected max, min or 1, 2)")]
    InvalidMode(String),

    #[error("Invalid processor {0:?} (expected cpu or gpu)")]
    InvalidProcessor(String),

    #[error("Window width must be positive and finite, got {0}")]
    InvalidWindowWidth(f64),

    #[error("Window center must be finite, got {0}")]
    InvalidWindowCenter(f64),

    #[error("Volume dimensions must be positive, got {0:?}")]
    EmptyVolume((usize, usize, usize)),

    #[error("Volume dimensions {0:?} overflow the addressable voxel count")]
    VoxelCountOverflow((usize, usize, usize)),

    #[error("Volume of dimensions {dim:?} needs {expected} voxels, got {actual}")]
    VoxelCountMismatch {
        dim: (usize, usize, usize),
        expected: usize,
        actual: usize,
    },

    #[error("Could not build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Index {index:?} out of bounds for extent {extent:?}")]
    IndexOutOfBounds {
        index: (usize, usize, usize),
        extent: (usize, usize, usize),
    },

    #[error("Loader failure: {0}")]
    Loader(#[from] VolumeLoaderError),

    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),

    #[error("Display error: {0}")]
    Display(#[from] image::ImageError),
}
