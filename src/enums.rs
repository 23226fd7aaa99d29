use std::{fmt, str::FromStr};

use ndarray::Axis;

use crate::error::ConfigurationError;

/// The grid dimension collapsed by the projection. Rays run parallel to it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ProjectionAxis {
    /// Projects out depth; output is `width × height`.
    #[default]
    AlongZ,
    /// Projects out height; output is `width × depth`.
    AlongY,
    /// Projects out width; output is `height × depth`.
    AlongX,
}

impl ProjectionAxis {
    pub const ALL: [ProjectionAxis; 3] = [Self::AlongZ, Self::AlongY, Self::AlongX];

    /// The volume axis the rays run along, in `[x, y, z]` storage order
    pub fn ray_axis(self) -> Axis {
        match self {
            ProjectionAxis::AlongZ => Axis(2),
            ProjectionAxis::AlongY => Axis(1),
            ProjectionAxis::AlongX => Axis(0),
        }
    }

    /// Output `(width, height)` for a volume of the given `(width, height, depth)`
    pub fn output_shape(self, dim: (usize, usize, usize)) -> (usize, usize) {
        let (width, height, depth) = dim;
        match self {
            ProjectionAxis::AlongZ => (width, height),
            ProjectionAxis::AlongY => (width, depth),
            ProjectionAxis::AlongX => (height, depth),
        }
    }

    /// Length of every ray for a volume of the given dimensions
    pub fn ray_length(self, dim: (usize, usize, usize)) -> usize {
        match self {
            ProjectionAxis::AlongZ => dim.2,
            ProjectionAxis::AlongY => dim.1,
            ProjectionAxis::AlongX => dim.0,
        }
    }

    /// Maps output pixel `(i, j)` and ray position `k` to a voxel `(x, y, z)`
    pub fn voxel_index(self, i: usize, j: usize, k: usize) -> (usize, usize, usize) {
        match self {
            ProjectionAxis::AlongZ => (i, j, k),
            ProjectionAxis::AlongY => (i, k, j),
            ProjectionAxis::AlongX => (k, i, j),
        }
    }

    /// Numeric code used by the legacy configuration surface
    pub fn code(self) -> u8 {
        match self {
            ProjectionAxis::AlongZ => 1,
            ProjectionAxis::AlongY => 2,
            ProjectionAxis::AlongX => 3,
        }
    }
}

impl TryFrom<u8> for ProjectionAxis {
    type Error = ConfigurationError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(ProjectionAxis::AlongZ),
            2 => Ok(ProjectionAxis::AlongY),
            3 => Ok(ProjectionAxis::AlongX),
            other => Err(ConfigurationError::InvalidAxis(other.to_string())),
        }
    }
}

impl FromStr for ProjectionAxis {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "z" | "along-z" | "alongz" | "1" => Ok(ProjectionAxis::AlongZ),
            "y" | "along-y" | "alongy" | "2" => Ok(ProjectionAxis::AlongY),
            "x" | "along-x" | "alongx" | "3" => Ok(ProjectionAxis::AlongX),
            _ => Err(ConfigurationError::InvalidAxis(s.to_string())),
        }
    }
}

impl fmt::Display for ProjectionAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProjectionAxis::AlongZ => "z",
            ProjectionAxis::AlongY => "y",
            ProjectionAxis::AlongX => "x",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ReductionMode {
    #[default]
    Maximum,
    Minimum,
}

impl ReductionMode {
    /// Fold seed: strictly outside the `i16` range on the losing side.
    pub fn seed(self) -> i32 {
        match self {
            ReductionMode::Maximum => i32::from(i16::MIN) - 1,
            ReductionMode::Minimum => i32::from(i16::MAX) + 1,
        }
    }

    /// Reduces a ray to its extremum, scanning every sample left to right.
    ///
    /// An empty ray yields the seed; volumes never produce one.
    #[inline]
    pub fn reduce<'a>(self, ray: impl IntoIterator<Item = &'a i16>) -> i32 {
        let ray = ray.into_iter().map(|&v| i32::from(v));
        match self {
            ReductionMode::Maximum => ray.fold(self.seed(), i32::max),
            ReductionMode::Minimum => ray.fold(self.seed(), i32::min),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            ReductionMode::Maximum => 1,
            ReductionMode::Minimum => 2,
        }
    }
}

impl TryFrom<u8> for ReductionMode {
    type Error = ConfigurationError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(ReductionMode::Maximum),
            2 => Ok(ReductionMode::Minimum),
            other => Err(ConfigurationError::InvalidMode(other.to_string())),
        }
    }
}

impl FromStr for ReductionMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "max" | "maximum" | "mip" | "1" => Ok(ReductionMode::Maximum),
            "min" | "minimum" | "minip" | "2" => Ok(ReductionMode::Minimum),
            _ => Err(ConfigurationError::InvalidMode(s.to_string())),
        }
    }
}

impl fmt::Display for ReductionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReductionMode::Maximum => f.write_str("max"),
            ReductionMode::Minimum => f.write_str("min"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Processor {
    #[default]
    CPU,
    GPU,
}

impl FromStr for Processor {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Processor::CPU),
            "gpu" => Ok(Processor::GPU),
            _ => Err(ConfigurationError::InvalidProcessor(s.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortBy {
    #[default]
    ImagePositionPatient,
    TablePosition,
    InstanceNumber,
    None,
}
