//! # volume-projection
//!
//! Maximum- and minimum-intensity projection of 3D medical images.
//!
//! A [`VolumeBuffer`] holds signed 16-bit intensities indexed `[x, y, z]`.
//! A [`ProjectionEngine`] collapses it along one of the three grid axes,
//! reducing every ray to its extremum, and maps the extremum through a
//! window-level transform onto 8-bit gray values:
//!
//!  - `AlongZ` produces a `width × height` image
//!  - `AlongY` produces a `width × depth` image
//!  - `AlongX` produces a `height × depth` image
//!
//! Every output pixel is independent, so rendering runs as a parallel map
//! over the output, either on a rayon thread pool or as a wgpu compute
//! dispatch. The backend is chosen by the [`ComputeContext`] handed to the
//! engine.
//!
//! Volumes can be loaded from a DICOM series directory, a multi-frame DICOM
//! file or a MetaImage (`.mhd`/`.mha`) file.
//!
//! # Examples
//!
//! ```no_run
//! # use volume_projection::{ComputeContext, PngSink, DisplaySink, ProjectionAxis,
//! #     ProjectionEngine, ReductionMode, VolumeLoader, WindowSpec};
//! let volume = VolumeLoader::load("data/FullHead.mhd").expect("should have loaded volume");
//! let context = ComputeContext::cpu(None).expect("should have built thread pool");
//! let window = WindowSpec::new(1500.0, 3000.0).expect("window width is positive");
//! let mut engine = ProjectionEngine::new(
//!     &volume,
//!     &context,
//!     ProjectionAxis::AlongZ,
//!     ReductionMode::Maximum,
//!     window,
//! );
//! let frame = engine.render().expect("should have rendered projection");
//! PngSink::new("mip.png").present(frame).expect("should have written image");
//! ```

pub mod compute;
pub mod config;
pub mod display;
pub mod enums;
pub mod error;
pub mod gpu_projector;
pub mod metaimage;
pub mod projection;
pub mod volume;
pub mod volume_loader;
pub mod window;

pub use compute::ComputeContext;
pub use display::{DisplaySink, PngSink, frame_to_image};
pub use enums::{Processor, ProjectionAxis, ReductionMode, SortBy};
pub use error::{ConfigurationError, ProjectionError};
pub use projection::{EngineState, ProjectionEngine};
pub use volume::VolumeBuffer;
pub use volume_loader::{VolumeLoader, VolumeLoaderError};
pub use window::{WindowSpec, window_level};
