use image::{GrayImage, ImageBuffer, Luma};
use log::info;
use ndarray::ArrayView2;
use std::path::{Path, PathBuf};

use crate::error::ProjectionError;

/// Receives rendered projections. Called once per `render()`.
pub trait DisplaySink {
    fn present(&mut self, frame: ArrayView2<'_, u8>) -> Result<(), ProjectionError>;
}

/// Converts an `[i, j]` output buffer into an image with `i` as column and
/// `j` as row.
pub fn frame_to_image(frame: ArrayView2<'_, u8>) -> GrayImage {
    let (width, height) = frame.dim();
    ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
        Luma([frame[[x as usize, y as usize]]])
    })
}

/// Writes every presented frame to the same image file.
pub struct PngSink {
    path: PathBuf,
}

impl PngSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DisplaySink for PngSink {
    fn present(&mut self, frame: ArrayView2<'_, u8>) -> Result<(), ProjectionError> {
        frame_to_image(frame).save(&self.path)?;
        info!("Wrote {:?} projection to {}", frame.dim(), self.path.display());
        Ok(())
    }
}
