use ndarray::ArrayView2;

pub(crate) struct Interpolator;

impl Interpolator {
    /// Voxel counts (x, y, z) that keep the physical aspect ratio when every
    /// axis is sampled at the finest spacing of the volume.
    pub(crate) fn get_isotropic_dimensions(spacing: [f64; 3], dimensions: [usize; 3]) -> [u32; 3] {
        let min_spacing = spacing
            .iter()
            .copied()
            .filter(|s| s.is_finite() && *s > 0.0)
            .fold(f64::INFINITY, f64::min);
        if !min_spacing.is_finite() {
            return dimensions.map(|d| d as u32);
        }
        let inv_min_spacing = 1.0 / min_spacing; // Multiply instead of divide

        let mut isotropic = [0u32; 3];
        for axis in 0..3 {
            let s = if spacing[axis].is_finite() && spacing[axis] > 0.0 {
                spacing[axis]
            } else {
                min_spacing
            };
            isotropic[axis] = ((dimensions[axis] as f64 * s * inv_min_spacing).round() as u32)
                .max(dimensions[axis].min(1) as u32);
        }
        isotropic
    }

    #[inline]
    pub(crate) fn bilinear_interpolate(slice: &ArrayView2<f32>, y: f32, x: f32) -> f32 {
        let (height, width) = slice.dim();

        let y0 = y.floor() as usize;
        let x0 = x.floor() as usize;
        let y1 = (y0 + 1).min(height - 1);
        let x1 = (x0 + 1).min(width - 1);

        let dy = y - y0 as f32;
        let dx = x - x0 as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;

        let v00 = slice[[y0, x0]];
        let v01 = slice[[y0, x1]];
        let v10 = slice[[y1, x0]];
        let v11 = slice[[y1, x1]];

        let v0 = v00.mul_add(one_minus_dx, v01 * dx);
        let v1 = v10.mul_add(one_minus_dx, v11 * dx);

        v0.mul_add(one_minus_dy, v1 * dy)
    }
}
