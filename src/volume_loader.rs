use crate::{enums::SortBy, volume::VolumeDataset};

use dicom::{
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use ndarray::{Array2, Array3, s};
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("No valid images found")]
    NoValidImages,

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("Missing spacing information")]
    MissingSpacing,

    #[error("Expected a 3D volume, got {0} dimension(s)")]
    UnsupportedDimensionality(usize),

    #[error("Unsupported volume format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),

    #[error("NIfTI error: {0}")]
    Nifti(#[from] nifti::NiftiError),
}

/// Something that turns a path into a volume.
pub trait VolumeSource {
    fn load(&self, path: &Path) -> Result<VolumeDataset, DatasetError>;
}

/// A directory of `.dcm` files forming one series.
#[derive(Debug, Clone, Copy, Default)]
pub struct DicomSource {
    pub sort_by: SortBy,
}

impl VolumeSource for DicomSource {
    fn load(&self, path: &Path) -> Result<VolumeDataset, DatasetError> {
        VolumeLoader::load_from_directory(path, self.sort_by)
    }
}

/// A single `.nii` or `.nii.gz` file.
#[derive(Debug, Clone, Copy, Default)]
pub struct NiftiSource;

impl VolumeSource for NiftiSource {
    fn load(&self, path: &Path) -> Result<VolumeDataset, DatasetError> {
        VolumeLoader::load_nifti(path)
    }
}

/// Picks a source from the shape of `path`: directories are DICOM series,
/// `.nii`/`.nii.gz` files are NIfTI.
pub fn source_for_path(path: &Path) -> Result<Box<dyn VolumeSource>, DatasetError> {
    if path.is_dir() {
        return Ok(Box::new(DicomSource::default()));
    }
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if name.ends_with(".nii") || name.ends_with(".nii.gz") {
        Ok(Box::new(NiftiSource))
    } else {
        Err(DatasetError::UnsupportedFormat(path.to_path_buf()))
    }
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Load a volume from DICOM objects
    ///
    /// Pixel values go through the modality LUT, so CT series come out in
    /// Hounsfield units.
    ///
    /// # Errors
    ///
    /// Returns error if no valid images found or dimensions are inconsistent
    pub fn load_from_dicom_objects(
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
        sort_by: SortBy,
    ) -> Result<VolumeDataset, DatasetError> {
        let mut images_with_order: Vec<_> = dicom_objects
            .iter()
            .filter_map(|dicom_object| Self::extract_image_with_order(dicom_object, &sort_by))
            .collect();

        if images_with_order.is_empty() {
            return Err(DatasetError::NoValidImages);
        }
        if images_with_order.len() < dicom_objects.len() {
            warn!(
                skipped = dicom_objects.len() - images_with_order.len(),
                "some DICOM objects had no usable image"
            );
        }

        Self::sort_images(&mut images_with_order, sort_by);

        let images: Vec<_> = images_with_order
            .into_iter()
            .map(|(_, image)| image)
            .collect();

        Self::validate_dimensions(&images)?;

        let volume_array = Self::build_volume_array(&images);
        let spacing = Self::get_spacing(dicom_objects).ok_or(DatasetError::MissingSpacing)?;

        let dataset = VolumeDataset::new(volume_array, spacing, [0.0; 3]);
        info!(
            dimensions = ?dataset.dimensions(),
            ?spacing,
            "loaded DICOM series"
        );
        Ok(dataset)
    }

    /// Load a volume from file paths
    pub fn load_from_file_paths(
        paths: &[impl AsRef<Path>],
        sort_by: SortBy,
    ) -> Result<VolumeDataset, DatasetError> {
        let objects: Result<Vec<_>, _> =
            paths.iter().map(|path| open_file(path.as_ref())).collect();

        Self::load_from_dicom_objects(&objects?, sort_by)
    }

    /// Load a volume from a directory containing .dcm files
    pub fn load_from_directory(
        path: impl AsRef<Path>,
        sort_by: SortBy,
    ) -> Result<VolumeDataset, DatasetError> {
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
            return Err(DatasetError::NoValidImages);
        }
        debug!(files = paths.len(), dir = ?path.as_ref(), "reading DICOM directory");

        Self::load_from_file_paths(&paths, sort_by)
    }

    /// Load a NIfTI-1 volume. Spacing comes from `pixdim`; trailing
    /// dimensions of size one (e.g. a single time point) are dropped.
    pub fn load_nifti(path: impl AsRef<Path>) -> Result<VolumeDataset, DatasetError> {
        let path = path.as_ref();
        let object = ReaderOptions::new().read_file(path)?;
        let pixdim = object.header().pixdim;
        let raw = object.into_volume().into_ndarray::<f32>()?;

        let shape = raw.shape().to_vec();
        if shape.len() < 3 {
            return Err(DatasetError::UnsupportedDimensionality(shape.len()));
        }
        if shape[3..].iter().any(|&d| d != 1) {
            return Err(DatasetError::UnsupportedDimensionality(shape.len()));
        }
        let (nx, ny, nz) = (shape[0], shape[1], shape[2]);
        if nx * ny * nz == 0 {
            return Err(DatasetError::NoValidImages);
        }

        // Logical order of the file array is (x, y, z) with z fastest.
        let values: Vec<f32> = raw.iter().copied().collect();
        let data = Array3::from_shape_vec((nx, ny, nz), values)
            .map_err(|_| DatasetError::InconsistentDimensions)?
            .permuted_axes([2, 1, 0])
            .as_standard_layout()
            .into_owned();

        let spacing = [1, 2, 3].map(|i| f64::from(pixdim[i]).abs());
        if spacing.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err(DatasetError::MissingSpacing);
        }

        let dataset = VolumeDataset::new(data, spacing, [0.0; 3]);
        info!(
            path = %path.display(),
            dimensions = ?dataset.dimensions(),
            ?spacing,
            scalar_range = ?dataset.scalar_range(),
            "loaded NIfTI volume"
        );
        Ok(dataset)
    }

    fn extract_image_with_order(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: &SortBy,
    ) -> Option<(Option<f32>, Array2<f32>)> {
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

    fn decode_image(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<Array2<f32>> {
        let pixel_data = dicom_object.decode_pixel_data().ok()?;
        let options = ConvertOptions::new()
            .with_modality_lut(ModalityLutOption::Default)
            .with_voi_lut(VoiLutOption::Identity);
        pixel_data
            .to_ndarray_with_options::<f32>(&options)
            .ok()
            .map(|arr| arr.slice_move(s![0, .., .., 0]))
    }

    fn sort_images(images_with_order: &mut [(Option<f32>, Array2<f32>)], sort_by: SortBy) {
        if !matches!(sort_by, SortBy::None) {
            images_with_order
                .sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        }

        if matches!(sort_by, SortBy::ImagePositionPatient) {
            images_with_order.reverse();
        }
    }

    fn validate_dimensions(images: &[Array2<f32>]) -> Result<(), DatasetError> {
        let first_dim = images[0].dim();
        if images.iter().any(|img| img.dim() != first_dim) {
            return Err(DatasetError::InconsistentDimensions);
        }
        Ok(())
    }

    fn build_volume_array(images: &[Array2<f32>]) -> Array3<f32> {
        let (height, width) = images[0].dim();
        let mut volume = Array3::<f32>::zeros((images.len(), height, width));

        for (i, image) in images.iter().enumerate() {
            volume.slice_mut(s![i, .., ..]).assign(image);
        }

        volume
    }

    /// (x, y, z) spacing. PixelSpacing is stored as (row, column) spacing.
    fn get_spacing(dicom_objects: &[FileDicomObject<InMemDicomObject>]) -> Option<[f64; 3]> {
        dicom_objects.iter().find_map(|dicom_object| {
            let pixel_spacing = dicom_object
                .element(tags::PIXEL_SPACING)
                .ok()?
                .to_multi_float64()
                .ok()?;

            let slice_thickness = dicom_object
                .element(tags::SLICE_THICKNESS)
                .ok()?
                .to_float64()
                .ok()?;

            Some([*pixel_spacing.get(1)?, *pixel_spacing.first()?, slice_thickness])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_directory_has_no_images() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("notes.txt"), "not a slice").unwrap();
        let result = DicomSource::default().load(dir.path());
        assert!(matches!(result, Err(DatasetError::NoValidImages)));
    }

    #[test]
    fn missing_directory_is_io_error() {
        let result = VolumeLoader::load_from_directory("/nonexistent/series", SortBy::None);
        assert!(matches!(result, Err(DatasetError::Io(_))));
    }

    #[test]
    fn source_is_picked_from_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(source_for_path(dir.path()).is_ok());
        assert!(source_for_path(Path::new("case/liver.nii.gz")).is_ok());
        assert!(source_for_path(Path::new("case/LIVER.NII")).is_ok());
        assert!(matches!(
            source_for_path(Path::new("case/liver.mha")),
            Err(DatasetError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn unreadable_nifti_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.nii");
        fs::write(&path, b"definitely not nifti").unwrap();
        assert!(NiftiSource.load(&path).is_err());
    }
}
