use log::{debug, info};

use crate::enums::Processor;
use crate::error::{ConfigurationError, ProjectionError};
use crate::gpu_projector::{GpuError, WGPU};

/// Where projections are computed. Built once per session and passed to
/// every engine; dropping it tears down the pool or device.
pub enum ComputeContext {
    CPU(rayon::ThreadPool),
    GPU(WGPU),
}

impl ComputeContext {
    /// A dedicated rayon pool. `None` lets rayon pick one thread per core.
    pub fn cpu(threads: Option<usize>) -> Result<Self, ConfigurationError> {
        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(|index| format!("projection-worker-{index}"));
        if let Some(threads) = threads {
            builder = builder.num_threads(threads);
        }
        let pool = builder.build()?;
        debug!("CPU compute context with {} threads", pool.current_num_threads());
        Ok(ComputeContext::CPU(pool))
    }

    pub async fn gpu() -> Result<Self, GpuError> {
        let wgpu = WGPU::request().await?;
        info!("GPU compute context ready");
        Ok(ComputeContext::GPU(wgpu))
    }

    pub async fn new(
        processor: Processor,
        threads: Option<usize>,
    ) -> Result<Self, ProjectionError> {
        match processor {
            Processor::CPU => Ok(Self::cpu(threads)?),
            Processor::GPU => Ok(Self::gpu().await?),
        }
    }

    pub fn processor(&self) -> Processor {
        match self {
            ComputeContext::CPU(_) => Processor::CPU,
            ComputeContext::GPU(_) => Processor::GPU,
        }
    }
}
