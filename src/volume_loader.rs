use crate::{enums::SortBy, error::ConfigurationError, metaimage, volume::VolumeBuffer};

use dicom::{
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use log::{info, warn};
use ndarray::{Array2, Array3, s};
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("No valid DICOM images found")]
    NoValidImages,

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Missing header field {0}")]
    MissingHeaderField(&'static str),

    #[error("Invalid value {value:?} for header field {field}")]
    InvalidHeaderField { field: String, value: String },

    #[error("Unsupported element type {0}")]
    UnsupportedElementType(String),

    #[error("Only 3D volumes are supported, got {0} dimensions")]
    UnsupportedDimensions(usize),

    #[error("Compressed image data is not supported")]
    CompressedDataUnsupported,

    #[error("Image data truncated: expected {expected} bytes, got {actual}")]
    TruncatedData { expected: usize, actual: usize },

    #[error("Invalid volume: {0}")]
    Volume(#[from] ConfigurationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),

    #[error("Pixel data error: {0}")]
    PixelData(#[from] dicom::pixeldata::Error),
}

/// Decodes volumetric images into `[x, y, z]` ordered [`VolumeBuffer`]s.
///
/// DICOM intensities have the modality LUT applied (Hounsfield units for
/// CT) and no VOI LUT, so windowing is left to the projection.
pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a volume from a path, picking the decoder by what the path is:
    ///
    /// * a directory is read as a DICOM series of `.dcm` files
    /// * `.mhd` / `.mha` is read as a MetaImage
    /// * `.dcm` is read as a single (multi-frame) DICOM file
    pub fn load(path: impl AsRef<Path>) -> Result<VolumeBuffer, VolumeLoaderError> {
        let path = path.as_ref();
        if path.is_dir() {
            return Self::load_from_directory(path, SortBy::default());
        }
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_ascii_lowercase);
        let volume = match extension.as_deref() {
            Some("mhd") | Some("mha") => metaimage::read(path)?,
            Some("dcm") => Self::load_from_file(path)?,
            _ => return Err(VolumeLoaderError::UnsupportedFormat(path.to_path_buf())),
        };
        info!(
            "Loaded {} with dimensions {:?}, intensities {:?}",
            path.display(),
            volume.dimensions(),
            volume.intensity_range()
        );
        Ok(volume)
    }

    /// Load a volume from DICOM objects
    ///
    /// # Arguments
    ///
    /// * `dicom_objects` - Slice of DICOM file objects, one slice each
    /// * `sort_by` - Method to sort the slices
    ///
    /// # Errors
    ///
    /// Returns error if no valid images found or dimensions are inconsistent
    pub fn load_from_dicom_objects(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        sort_by: SortBy,
    ) -> Result<VolumeBuffer, VolumeLoaderError> {
        let mut images_with_order: Vec<_> = dicom_objects
            .par_iter()
            .filter_map(|dicom_object| Self::extract_image_with_order(dicom_object, &sort_by))
            .collect();

        let skipped = dicom_objects.len() - images_with_order.len();
        if skipped > 0 {
            warn!("Skipped {skipped} DICOM objects without decodable pixel data");
        }
        if images_with_order.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }

        Self::sort_images(&mut images_with_order, sort_by);

        let images: Vec<_> = images_with_order
            .into_iter()
            .map(|(_, image)| image)
            .collect();

        Self::validate_dimensions(&images)?;

        let volume = VolumeBuffer::new(Self::build_volume_array(&images))?;
        info!(
            "Built volume {:?} from {} DICOM slices, intensities {:?}",
            volume.dimensions(),
            images.len(),
            volume.intensity_range()
        );
        Ok(volume)
    }

    /// Load a volume from file paths
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path> + Sync],
        sort_by: SortBy,
    ) -> Result<VolumeBuffer, VolumeLoaderError> {
        let objects: Result<Vec<_>, _> = paths
            .par_iter()
            .map(|path| open_file(path.as_ref()))
            .collect();

        Self::load_from_dicom_objects(&objects?, sort_by)
    }

    /// Load a volume from a directory containing .dcm files
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        sort_by: SortBy,
    ) -> Result<VolumeBuffer, VolumeLoaderError> {
        let paths: Vec<_> = fs::read_dir(path.as_ref())?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
            })
            .collect();

        if paths.is_empty() {
            return Err(VolumeLoaderError::NoValidImages);
        }
        info!("Reading {} DICOM files from {}", paths.len(), path.as_ref().display());

        Self::load_from_file_paths(&paths, sort_by)
    }

    /// Load a volume from one DICOM file whose frames are the slices
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<VolumeBuffer, VolumeLoaderError> {
        let dicom_object = open_file(path.as_ref())?;
        let pixel_data = dicom_object.decode_pixel_data()?;
        let frames = pixel_data
            .to_ndarray_with_options::<i16>(&Self::convert_options())?
            .slice_move(s![.., .., .., 0]);
        // (frame, row, column) is [z, y, x]
        Ok(VolumeBuffer::new(frames.permuted_axes([2, 1, 0]))?)
    }

    fn convert_options() -> ConvertOptions {
        ConvertOptions::new()
            .with_modality_lut(ModalityLutOption::Default)
            .with_voi_lut(VoiLutOption::Identity)
    }

    fn extract_image_with_order(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: &SortBy,
    ) -> Option<(Option<f32>, Array2<i16>)> {
        let order = Self::get_sort_order(dicom_object, sort_by)?;
        let image_2d = Self::decode_image(dicom_object)?;
        Some((order, image_2d))
    }

    fn get_sort_order(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: &SortBy,
    ) -> Option<Option<f32>> {
        match sort_by {
            SortBy::ImagePositionPatient => {
                let pos = dicom_object
                    .element(tags::IMAGE_POSITION_PATIENT)
                    .ok()?
                    .to_multi_float32()
                    .ok()?;
                Some(pos.get(2).copied())
            }
            SortBy::TablePosition => {
                let pos = dicom_object
                    .element(tags::TABLE_POSITION)
                    .ok()?
                    .to_float32()
                    .ok();
                Some(pos)
            }
            SortBy::InstanceNumber => {
                let num = dicom_object
                    .element(tags::INSTANCE_NUMBER)
                    .ok()?
                    .to_int::<i32>()
                    .ok()
                    .map(|n| n as f32);
                Some(num)
            }
            SortBy::None => Some(Some(0.0)),
        }
    }

    /// First frame of the object as a (row, column) array
    fn decode_image(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<Array2<i16>> {
        let pixel_data = dicom_object.decode_pixel_data().ok()?;
        pixel_data
            .to_ndarray_with_options::<i16>(&Self::convert_options())
            .ok()
            .map(|arr| arr.slice_move(s![0, .., .., 0]))
    }

    fn sort_images(images_with_order: &mut [(Option<f32>, Array2<i16>)], sort_by: SortBy) {
        if !matches!(sort_by, SortBy::None) {
            images_with_order
                .sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        }

        if matches!(sort_by, SortBy::ImagePositionPatient) {
            images_with_order.reverse();
        }
    }

    fn validate_dimensions(images: &[Array2<i16>]) -> Result<(), VolumeLoaderError> {
        let first_dim = images[0].dim();
        if images.iter().any(|img| img.dim() != first_dim) {
            return Err(VolumeLoaderError::InconsistentDimensions);
        }
        Ok(())
    }

    /// Stacks (row, column) slices into an `[x, y, z]` array, slice index as z
    fn build_volume_array(images: &[Array2<i16>]) -> Array3<i16> {
        let (height, width) = images[0].dim();
        let depth = images.len();
        let mut volume = Array3::<i16>::zeros((width, height, depth));

        for (z, image) in images.iter().enumerate() {
            volume.slice_mut(s![.., .., z]).assign(&image.t());
        }

        volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn stacks_slices_along_z() {
        let images = vec![array![[1, 2, 3], [4, 5, 6]], array![[7, 8, 9], [10, 11, 12]]];
        let volume = VolumeLoader::build_volume_array(&images);
        assert_eq!(volume.dim(), (3, 2, 2));
        // row 1, column 2 of the second slice
        assert_eq!(volume[[2, 1, 1]], 12);
        assert_eq!(volume[[0, 1, 0]], 4);
    }

    #[test]
    fn rejects_mismatched_slices() {
        let images = vec![Array2::<i16>::zeros((2, 3)), Array2::<i16>::zeros((3, 2))];
        assert!(matches!(
            VolumeLoader::validate_dimensions(&images),
            Err(VolumeLoaderError::InconsistentDimensions)
        ));
    }

    #[test]
    fn sorts_by_position_descending() {
        let mut images = vec![
            (Some(2.0), Array2::<i16>::from_elem((1, 1), 2)),
            (Some(-1.0), Array2::<i16>::from_elem((1, 1), -1)),
            (Some(5.0), Array2::<i16>::from_elem((1, 1), 5)),
        ];
        VolumeLoader::sort_images(&mut images, SortBy::ImagePositionPatient);
        let order: Vec<_> = images.iter().map(|(_, image)| image[[0, 0]]).collect();
        assert_eq!(order, vec![5, 2, -1]);

        VolumeLoader::sort_images(&mut images, SortBy::InstanceNumber);
        let order: Vec<_> = images.iter().map(|(_, image)| image[[0, 0]]).collect();
        assert_eq!(order, vec![-1, 2, 5]);
    }

    #[test]
    fn unknown_extension_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.nrrd");
        fs::write(&path, b"NRRD0004").unwrap();
        assert!(matches!(
            VolumeLoader::load(&path),
            Err(VolumeLoaderError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn empty_directory_has_no_images() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            VolumeLoader::load(dir.path()),
            Err(VolumeLoaderError::NoValidImages)
        ));
    }

    #[test]
    fn loads_metaimage_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.mha");
        let mut bytes =
            b"NDims = 3\nDimSize = 2 2 2\nElementType = MET_CHAR\nElementDataFile = LOCAL\n"
                .to_vec();
        bytes.extend([-3i8, 1, 2, 3, 4, 5, 6, 7].map(|v| v as u8));
        fs::write(&path, bytes).unwrap();

        let volume = VolumeLoader::load(&path).unwrap();
        assert_eq!(volume.dimensions(), (2, 2, 2));
        assert_eq!(volume.sample(0, 0, 0).unwrap(), -3);
        assert_eq!(volume.sample(1, 1, 1).unwrap(), 7);
    }
}
