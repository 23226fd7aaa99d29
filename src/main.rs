use clap::Parser;
use log::info;

use volume_projection::{
    ComputeContext, DisplaySink, PngSink, ProjectionEngine, VolumeLoader,
    config::{Cli, RenderConfig},
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init(); // Log to stderr (if you run with `RUST_LOG=debug`).

    let config = RenderConfig::try_from(Cli::parse())?;
    let volume = VolumeLoader::load(&config.image_path)?;
    let context = ComputeContext::new(config.processor, config.threads).await?;

    let mut engine =
        ProjectionEngine::new(&volume, &context, config.axis, config.mode, config.window);
    let frame = engine.render()?;
    info!(
        "{} projection along {}: {:?}",
        config.mode,
        config.axis,
        frame.dim()
    );

    PngSink::new(&config.output).present(frame)?;
    Ok(())
}
