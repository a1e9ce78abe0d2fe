use crate::enums::Interpolation;
use crate::enums::Orientation;
use crate::interpolator::Interpolator;

use glam::DVec3;
use image::GrayImage;
use image::ImageBuffer;
use image::Rgba;
use image::RgbaImage;
use ndarray::Array3;
use ndarray::ArrayView2;
use ndarray::s;
use rayon::prelude::*;

/// A scalar volume in world space.
///
/// Voxels are stored as `(depth, height, width)`, i.e. `(z, y, x)`, the same
/// layout slices are stacked in when loading. Everything geometric
/// (`dimensions`, `spacing`, `origin`, `bounds`) is reported in `(x, y, z)`
/// order so it can be indexed with [`Orientation::axis`].
#[derive(Debug, Clone)]
pub struct VolumeDataset {
    data: Array3<f32>,
    spacing: [f64; 3],
    origin: [f64; 3],
    scalar_range: (f32, f32),
}

impl VolumeDataset {
    pub fn new(data: Array3<f32>, spacing: [f64; 3], origin: [f64; 3]) -> Self {
        let scalar_range = Self::compute_scalar_range(&data);
        Self {
            data,
            spacing,
            origin,
            scalar_range,
        }
    }

    /// Get the dimensions of the underlying array (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Voxel counts along (x, y, z)
    pub fn dimensions(&self) -> [usize; 3] {
        let (depth, height, width) = self.data.dim();
        [width, height, depth]
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    /// Minimum and maximum voxel value. Empty volumes report `(0, 0)`.
    pub fn scalar_range(&self) -> (f32, f32) {
        self.scalar_range
    }

    /// `[xmin, xmax, ymin, ymax, zmin, zmax]` through the voxel centres.
    pub fn bounds(&self) -> [f64; 6] {
        let dims = self.dimensions();
        let mut bounds = [0.0; 6];
        for axis in 0..3 {
            let a = self.origin[axis];
            let b = a + dims[axis].saturating_sub(1) as f64 * self.spacing[axis];
            bounds[2 * axis] = a.min(b);
            bounds[2 * axis + 1] = a.max(b);
        }
        bounds
    }

    pub fn center(&self) -> DVec3 {
        let b = self.bounds();
        DVec3::new(
            (b[0] + b[1]) * 0.5,
            (b[2] + b[3]) * 0.5,
            (b[4] + b[5]) * 0.5,
        )
    }

    /// Largest edge of the bounding box.
    pub fn max_extent(&self) -> f64 {
        let b = self.bounds();
        (b[1] - b[0]).max(b[3] - b[2]).max(b[5] - b[4])
    }

    /// Number of slices along the axis perpendicular to `orientation`.
    pub fn slice_count(&self, orientation: Orientation) -> usize {
        self.dimensions()[orientation.axis()]
    }

    /// World coordinate of slice `index` along the plane normal axis.
    pub fn slice_position(&self, orientation: Orientation, index: usize) -> f64 {
        let axis = orientation.axis();
        self.origin[axis] + index as f64 * self.spacing[axis]
    }

    fn compute_scalar_range(data: &Array3<f32>) -> (f32, f32) {
        if data.is_empty() {
            return (0.0, 0.0);
        }
        let (min, max) = data
            .par_iter()
            .fold(
                || (f32::INFINITY, f32::NEG_INFINITY),
                |(lo, hi), &v| (lo.min(v), hi.max(v)),
            )
            .reduce(
                || (f32::INFINITY, f32::NEG_INFINITY),
                |a, b| (a.0.min(b.0), a.1.max(b.1)),
            );
        if min > max { (0.0, 0.0) } else { (min, max) }
    }

    #[inline]
    fn normalize_to_u8(value: f32, (min, max): (f32, f32)) -> u8 {
        if max <= min {
            return 0;
        }
        ((value - min) / (max - min) * 255.0).clamp(0.0, 255.0) as u8
    }

    /// Rows of the returned view run along the in-plane "up" axis
    /// (y for axial, z otherwise), columns along the in-plane "right" axis.
    pub fn get_slice_from_axis(
        &self,
        index: usize,
        orientation: &Orientation,
    ) -> Option<ArrayView2<'_, f32>> {
        if !self.is_valid_index(index, orientation) {
            return None;
        }
        let slice_result = match orientation {
            Orientation::Axial => self.data().slice(s![index, .., ..]),
            Orientation::Coronal => self.data().slice(s![.., index, ..]),
            Orientation::Sagittal => self.data().slice(s![.., .., index]),
        };
        Some(slice_result)
    }

    fn get_output_dimensions(&self, orientation: &Orientation) -> (u32, u32) {
        let [x, y, z] =
            Interpolator::get_isotropic_dimensions(self.spacing, self.dimensions());
        // Always return (width, height) - standard image convention
        match orientation {
            Orientation::Axial => (x, y),
            Orientation::Coronal => (x, z),
            Orientation::Sagittal => (y, z),
        }
    }

    /// Grey-level image of a slice, window-levelled over the scalar range.
    ///
    /// Image row 0 is the top of the view, so slice rows are flipped.
    pub fn get_image_from_axis(
        &self,
        index: usize,
        orientation: Orientation,
        interpolation: Interpolation,
    ) -> Option<GrayImage> {
        let slice = self.get_slice_from_axis(index, &orientation)?;
        if slice.is_empty() {
            return None;
        }

        match interpolation {
            Interpolation::None => self.slice_to_image(&slice),
            Interpolation::Linear => {
                let (width, height) = self.get_output_dimensions(&orientation);
                if (height as usize, width as usize) == slice.dim() {
                    return self.slice_to_image(&slice);
                }
                self.interpolate_slice(&slice, width, height)
            }
        }
    }

    /// Colour image of a slice, each voxel mapped through `map` without
    /// interpolation.
    pub fn get_rgba_from_axis<F>(
        &self,
        index: usize,
        orientation: Orientation,
        map: F,
    ) -> Option<RgbaImage>
    where
        F: Fn(f32) -> [u8; 4] + Sync,
    {
        let slice = self.get_slice_from_axis(index, &orientation)?;
        let (height, width) = slice.dim();
        let pixel_data: Vec<u8> = (0..height)
            .into_par_iter()
            .flat_map_iter(|row| {
                let src_row = height - 1 - row;
                let slice = &slice;
                let map = &map;
                (0..width).flat_map(move |col| map(slice[[src_row, col]]))
            })
            .collect();
        ImageBuffer::<Rgba<u8>, _>::from_raw(width as u32, height as u32, pixel_data)
    }

    fn slice_to_image(&self, slice: &ArrayView2<'_, f32>) -> Option<GrayImage> {
        let (height, width) = slice.dim();
        let range = self.scalar_range;
        let pixel_data: Vec<u8> = (0..height)
            .into_par_iter()
            .flat_map_iter(|row| {
                let src_row = height - 1 - row;
                (0..width).map(move |col| Self::normalize_to_u8(slice[[src_row, col]], range))
            })
            .collect();
        ImageBuffer::from_raw(width as u32, height as u32, pixel_data)
    }

    fn interpolate_slice(
        &self,
        slice: &ArrayView2<'_, f32>,
        width: u32,
        height: u32,
    ) -> Option<GrayImage> {
        let (slice_height, slice_width) = slice.dim();
        let range = self.scalar_range;

        let pixel_data: Vec<u8> = (0..height)
            .into_par_iter()
            .flat_map(|y| {
                (0..width)
                    .map(|x| {
                        // Normalized coordinates with half-pixel offset
                        let norm_x = (x as f32 + 0.5) / width as f32;
                        let norm_y = 1.0 - (y as f32 + 0.5) / height as f32;

                        // Convert back to source coordinates
                        let src_x = norm_x * slice_width as f32 - 0.5;
                        let src_y = norm_y * slice_height as f32 - 0.5;

                        // Clamp to valid range
                        let src_x = src_x.max(0.0).min((slice_width - 1) as f32);
                        let src_y = src_y.max(0.0).min((slice_height - 1) as f32);

                        let value = Interpolator::bilinear_interpolate(slice, src_y, src_x);
                        Self::normalize_to_u8(value, range)
                    })
                    .collect::<Vec<u8>>()
            })
            .collect();

        ImageBuffer::from_raw(width, height, pixel_data)
    }

    fn is_valid_index(&self, index: usize, orientation: &Orientation) -> bool {
        index < self.slice_count(*orientation)
    }
}
