use crate::enums::ProjectionAxis;
use crate::error::{ConfigurationError, ProjectionError};

use ndarray::Array3;
use ndarray::ArrayView1;
use ndarray::s;

/// Immutable grid of signed 16-bit intensities indexed `[x, y, z]`.
///
/// Storage is always in standard (row-major) layout, so `z` is the fastest
/// varying index in memory.
#[derive(Clone, Debug)]
pub struct VolumeBuffer {
    data: Array3<i16>,
}

impl VolumeBuffer {
    /// Wraps an `[x, y, z]` array. Every extent must be positive.
    pub fn new(data: Array3<i16>) -> Result<Self, ConfigurationError> {
        let dim = data.dim();
        if dim.0 == 0 || dim.1 == 0 || dim.2 == 0 {
            return Err(ConfigurationError::EmptyVolume(dim));
        }
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().into_owned()
        };
        Ok(Self { data })
    }

    /// Builds a volume from samples laid out `[x][y][z]` (z fastest)
    pub fn from_shape_vec(
        dim: (usize, usize, usize),
        voxels: Vec<i16>,
    ) -> Result<Self, ConfigurationError> {
        let expected = dim
            .0
            .checked_mul(dim.1)
            .and_then(|n| n.checked_mul(dim.2))
            .ok_or(ConfigurationError::VoxelCountOverflow(dim))?;
        if voxels.len() != expected {
            return Err(ConfigurationError::VoxelCountMismatch {
                dim,
                expected,
                actual: voxels.len(),
            });
        }
        let data = Array3::from_shape_vec(dim, voxels).map_err(|_| {
            ConfigurationError::VoxelCountMismatch {
                dim,
                expected,
                actual: expected,
            }
        })?;
        Self::new(data)
    }

    /// Get the dimensions of the volume (width, height, depth)
    pub fn dimensions(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<i16> {
        &self.data
    }

    /// Smallest and largest intensity in the volume
    pub fn intensity_range(&self) -> (i16, i16) {
        self.data
            .iter()
            .fold((i16::MAX, i16::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }

    pub fn sample(&self, x: usize, y: usize, z: usize) -> Result<i16, ProjectionError> {
        self.data
            .get((x, y, z))
            .copied()
            .ok_or(ProjectionError::IndexOutOfBounds {
                index: (x, y, z),
                extent: self.dimensions(),
            })
    }

    /// The ray through output pixel `(i, j)` when projecting along `axis`
    pub fn ray(
        &self,
        axis: ProjectionAxis,
        i: usize,
        j: usize,
    ) -> Result<ArrayView1<'_, i16>, ProjectionError> {
        let (out_width, out_height) = axis.output_shape(self.dimensions());
        if i >= out_width || j >= out_height {
            return Err(ProjectionError::IndexOutOfBounds {
                index: axis.voxel_index(i, j, 0),
                extent: self.dimensions(),
            });
        }
        let ray = match axis {
            ProjectionAxis::AlongZ => self.data.slice(s![i, j, ..]),
            ProjectionAxis::AlongY => self.data.slice(s![i, .., j]),
            ProjectionAxis::AlongX => self.data.slice(s![.., i, j]),
        };
        Ok(ray)
    }
}
