//! Command line surface: the five render options plus output and backend
//! selection.

use clap::Parser;
use std::path::PathBuf;

use crate::enums::{Processor, ProjectionAxis, ReductionMode};
use crate::error::ConfigurationError;
use crate::window::WindowSpec;

#[derive(Debug, Parser)]
#[command(
    name = "volume-projection",
    version,
    about = "Maximum/minimum intensity projection of a medical volume"
)]
pub struct Cli {
    /// Volume to project: a DICOM series directory, a .dcm file or a .mhd/.mha file
    pub image_path: PathBuf,

    /// Reduction along each ray: max (1) or min (2)
    #[arg(short, long, default_value = "max")]
    pub mode: ReductionMode,

    /// Axis to project along: z (1), y (2) or x (3)
    #[arg(short, long, default_value = "z")]
    pub axis: ProjectionAxis,

    /// Window center in raw intensity units
    #[arg(long, default_value_t = 1500.0, allow_negative_numbers = true)]
    pub center: f64,

    /// Window width in raw intensity units, must be positive
    #[arg(long, default_value_t = 3000.0, allow_negative_numbers = true)]
    pub width: f64,

    /// Where to write the projection
    #[arg(short, long, default_value = "projection.png")]
    pub output: PathBuf,

    /// Compute backend: cpu or gpu
    #[arg(short, long, default_value = "cpu")]
    pub processor: Processor,

    /// Worker threads for the CPU backend (default: one per core)
    #[arg(short, long)]
    pub threads: Option<usize>,
}

/// Validated render parameters
#[derive(Clone, Debug)]
pub struct RenderConfig {
    pub image_path: PathBuf,
    pub mode: ReductionMode,
    pub axis: ProjectionAxis,
    pub window: WindowSpec,
    pub output: PathBuf,
    pub processor: Processor,
    pub threads: Option<usize>,
}

impl TryFrom<Cli> for RenderConfig {
    type Error = ConfigurationError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        Ok(Self {
            window: WindowSpec::new(cli.center, cli.width)?,
            image_path: cli.image_path,
            mode: cli.mode,
            axis: cli.axis,
            output: cli.output,
            processor: cli.processor,
            threads: cli.threads,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("volume-projection").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_follow_head_ct_demo() {
        let config = RenderConfig::try_from(parse(&["head.mhd"]).unwrap()).unwrap();
        assert_eq!(config.mode, ReductionMode::Maximum);
        assert_eq!(config.axis, ProjectionAxis::AlongZ);
        assert_eq!(config.window.center(), 1500.0);
        assert_eq!(config.window.width(), 3000.0);
        assert_eq!(config.processor, Processor::CPU);
        assert_eq!(config.output, PathBuf::from("projection.png"));
    }

    #[test]
    fn accepts_names_and_legacy_codes() {
        let cli = parse(&["head.mhd", "--mode", "2", "--axis", "x", "--center", "-600"]).unwrap();
        assert_eq!(cli.mode, ReductionMode::Minimum);
        assert_eq!(cli.axis, ProjectionAxis::AlongX);
        assert_eq!(cli.center, -600.0);
    }

    #[test]
    fn rejects_unknown_axis() {
        assert!(parse(&["head.mhd", "--axis", "w"]).is_err());
    }

    #[test]
    fn rejects_non_positive_width() {
        let cli = parse(&["head.mhd", "--width", "-5"]).unwrap();
        assert!(matches!(
            RenderConfig::try_from(cli),
            Err(ConfigurationError::InvalidWindowWidth(_))
        ));
    }
}
