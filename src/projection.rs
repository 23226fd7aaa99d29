use log::debug;
use ndarray::{Array2, ArrayView2, Zip};
use web_time::Instant;

use crate::compute::ComputeContext;
use crate::enums::{ProjectionAxis, ReductionMode};
use crate::error::{ConfigurationError, ProjectionError};
use crate::gpu_projector::GpuProjector;
use crate::volume::VolumeBuffer;
use crate::window::WindowSpec;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// Parameters set, output zeroed.
    Configured,
    /// Output holds the projection for the current parameters.
    Rendered,
}

/// Extremum projection of a volume onto an 8-bit image.
///
/// The engine borrows the volume and the compute context for its whole
/// lifetime and owns the output buffer, shaped by [`ProjectionAxis::output_shape`]
/// and indexed `[i, j]`.
pub struct ProjectionEngine<'a> {
    volume: &'a VolumeBuffer,
    context: &'a ComputeContext,
    axis: ProjectionAxis,
    mode: ReductionMode,
    window: WindowSpec,
    output: Array2<u8>,
    state: EngineState,
    gpu_projector: Option<GpuProjector>,
}

impl<'a> ProjectionEngine<'a> {
    pub fn new(
        volume: &'a VolumeBuffer,
        context: &'a ComputeContext,
        axis: ProjectionAxis,
        mode: ReductionMode,
        window: WindowSpec,
    ) -> Self {
        debug!(
            "Projection engine for volume {:?}: axis {axis}, mode {mode}, window [{:.1}, {:.1}]",
            volume.dimensions(),
            window.low(),
            window.high()
        );
        Self {
            volume,
            context,
            axis,
            mode,
            window,
            output: Array2::zeros(axis.output_shape(volume.dimensions())),
            state: EngineState::Configured,
            gpu_projector: None,
        }
    }

    /// Builds an engine from the numeric codes of the legacy configuration
    /// (axis 1..=3, mode 1..=2) and raw window values.
    pub fn from_codes(
        volume: &'a VolumeBuffer,
        context: &'a ComputeContext,
        axis: u8,
        mode: u8,
        window_center: f64,
        window_width: f64,
    ) -> Result<Self, ConfigurationError> {
        let axis = ProjectionAxis::try_from(axis)?;
        let mode = ReductionMode::try_from(mode)?;
        let window = WindowSpec::new(window_center, window_width)?;
        Ok(Self::new(volume, context, axis, mode, window))
    }

    pub fn axis(&self) -> ProjectionAxis {
        self.axis
    }

    pub fn mode(&self) -> ReductionMode {
        self.mode
    }

    pub fn window(&self) -> &WindowSpec {
        &self.window
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Output `(width, height)` for the current axis
    pub fn output_dimensions(&self) -> (usize, usize) {
        self.output.dim()
    }

    pub fn output_buffer(&self) -> ArrayView2<'_, u8> {
        self.output.view()
    }

    pub fn set_axis(&mut self, axis: ProjectionAxis) {
        self.axis = axis;
        self.output = Array2::zeros(axis.output_shape(self.volume.dimensions()));
        self.reset();
    }

    pub fn set_mode(&mut self, mode: ReductionMode) {
        self.mode = mode;
        self.reset();
    }

    pub fn set_window(&mut self, window: WindowSpec) {
        self.window = window;
        self.reset();
    }

    fn reset(&mut self) {
        self.output.fill(0);
        self.state = EngineState::Configured;
        debug!("Engine reconfigured: axis {}, mode {}", self.axis, self.mode);
    }

    /// Projects every output pixel and returns the filled buffer.
    ///
    /// On error the previous output and state are left untouched.
    pub fn render(&mut self) -> Result<ArrayView2<'_, u8>, ProjectionError> {
        let start = Instant::now();
        let (volume, context) = (self.volume, self.context);
        let (axis, mode, window) = (self.axis, self.mode, self.window);

        match context {
            ComputeContext::CPU(pool) => {
                let output = &mut self.output;
                pool.install(|| {
                    Zip::from(output)
                        .and(volume.data().lanes(axis.ray_axis()))
                        .par_for_each(|gray, ray| *gray = window.apply(mode.reduce(ray)));
                });
            }
            ComputeContext::GPU(wgpu) => {
                let projector = match self.gpu_projector.take() {
                    Some(projector) => projector,
                    None => GpuProjector::new(volume, wgpu)?,
                };
                let projected = projector.project(axis, mode, &window);
                self.gpu_projector = Some(projector);
                self.output = projected?;
            }
        }

        self.state = EngineState::Rendered;
        debug!(
            "Rendered {:?} projection along {axis} on {:?} in {:?}",
            self.output.dim(),
            context.processor(),
            start.elapsed()
        );
        Ok(self.output.view())
    }

    /// Computes the gray value of one output pixel without touching the buffer
    pub fn project_pixel(&self, i: usize, j: usize) -> Result<u8, ProjectionError> {
        let ray = self.volume.ray(self.axis, i, j)?;
        Ok(self.window.apply(self.mode.reduce(ray)))
    }
}
