//! Continuous scalar-to-opacity and scalar-to-colour curves and the volume
//! properties handed to the ray-casting primitive.

/// Piecewise-linear scalar → opacity curve.
///
/// Points are kept sorted by scalar value. Outside the first and last point
/// the curve is clamped to the end values; an empty curve evaluates to 0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PiecewiseFunction {
    points: Vec<(f64, f64)>,
}

impl PiecewiseFunction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a point, replacing an existing point at the same scalar.
    pub fn add_point(&mut self, x: f64, y: f64) {
        match self.points.binary_search_by(|p| p.0.total_cmp(&x)) {
            Ok(i) => self.points[i].1 = y,
            Err(i) => self.points.insert(i, (x, y)),
        }
    }

    pub fn with_point(mut self, x: f64, y: f64) -> Self {
        self.add_point(x, y);
        self
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn value(&self, x: f64) -> f64 {
        match segment(&self.points, x, |p| p.0) {
            Segment::Empty => 0.0,
            Segment::Clamped(i) => self.points[i].1,
            Segment::Between(i, t) => {
                let (a, b) = (self.points[i].1, self.points[i + 1].1);
                a + (b - a) * t
            }
        }
    }
}

/// Piecewise-linear scalar → RGB curve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorTransferFunction {
    points: Vec<(f64, [f64; 3])>,
}

impl ColorTransferFunction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rgb_point(&mut self, x: f64, r: f64, g: f64, b: f64) {
        let rgb = [r, g, b];
        match self.points.binary_search_by(|p| p.0.total_cmp(&x)) {
            Ok(i) => self.points[i].1 = rgb,
            Err(i) => self.points.insert(i, (x, rgb)),
        }
    }

    pub fn with_rgb_point(mut self, x: f64, r: f64, g: f64, b: f64) -> Self {
        self.add_rgb_point(x, r, g, b);
        self
    }

    pub fn points(&self) -> &[(f64, [f64; 3])] {
        &self.points
    }

    pub fn color(&self, x: f64) -> [f64; 3] {
        match segment(&self.points, x, |p| p.0) {
            Segment::Empty => [0.0; 3],
            Segment::Clamped(i) => self.points[i].1,
            Segment::Between(i, t) => {
                let (a, b) = (self.points[i].1, self.points[i + 1].1);
                [0, 1, 2].map(|c| a[c] + (b[c] - a[c]) * t)
            }
        }
    }
}

enum Segment {
    Empty,
    Clamped(usize),
    Between(usize, f64),
}

fn segment<P>(points: &[P], x: f64, key: impl Fn(&P) -> f64) -> Segment {
    let Some(last) = points.len().checked_sub(1) else {
        return Segment::Empty;
    };
    if x <= key(&points[0]) {
        return Segment::Clamped(0);
    }
    if x >= key(&points[last]) {
        return Segment::Clamped(last);
    }
    // First point strictly greater than x; x > points[0] so i >= 1.
    let i = points.partition_point(|p| key(p) <= x);
    let (x0, x1) = (key(&points[i - 1]), key(&points[i]));
    Segment::Between(i - 1, (x - x0) / (x1 - x0))
}

/// Rendering parameters of one ray-cast volume.
///
/// Every mutation bumps [`VolumeProperty::modified`] so the owner can tell
/// which volumes need to be re-submitted before the next frame.
#[derive(Debug, Clone)]
pub struct VolumeProperty {
    pub shade: bool,
    pub ambient: f64,
    pub diffuse: f64,
    pub specular: f64,
    scalar_opacity: PiecewiseFunction,
    color: ColorTransferFunction,
    scalar_opacity_unit_distance: f64,
    modified: u64,
}

impl VolumeProperty {
    pub fn new(scalar_opacity: PiecewiseFunction, color: ColorTransferFunction) -> Self {
        Self {
            shade: false,
            ambient: 0.1,
            diffuse: 0.7,
            specular: 0.2,
            scalar_opacity,
            color,
            scalar_opacity_unit_distance: 1.0,
            modified: 0,
        }
    }

    /// Semi-transparent skin/soft-tissue/bone rendering for CT in Hounsfield
    /// units.
    pub fn ct_default() -> Self {
        let opacity = PiecewiseFunction::new()
            .with_point(-3024.0, 0.0)
            .with_point(-200.0, 0.0)
            .with_point(-100.0, 0.005)
            .with_point(40.0, 0.01)
            .with_point(400.0, 0.1)
            .with_point(3000.0, 0.1);
        let color = ColorTransferFunction::new()
            .with_rgb_point(-1000.0, 0.0, 0.0, 0.0)
            .with_rgb_point(-200.0, 0.8, 0.5, 0.4)
            .with_rgb_point(0.0, 0.9, 0.6, 0.5)
            .with_rgb_point(400.0, 1.0, 1.0, 0.9);
        Self {
            shade: true,
            ambient: 0.1,
            diffuse: 0.9,
            specular: 0.2,
            ..Self::new(opacity, color)
        }
    }

    pub fn scalar_opacity(&self) -> &PiecewiseFunction {
        &self.scalar_opacity
    }

    pub fn color(&self) -> &ColorTransferFunction {
        &self.color
    }

    pub fn scalar_opacity_unit_distance(&self) -> f64 {
        self.scalar_opacity_unit_distance
    }

    pub fn modified(&self) -> u64 {
        self.modified
    }

    pub fn set_scalar_opacity(&mut self, opacity: PiecewiseFunction) {
        self.scalar_opacity = opacity;
        self.modified += 1;
    }

    pub fn set_scalar_opacity_unit_distance(&mut self, distance: f64) {
        if self.scalar_opacity_unit_distance != distance {
            self.scalar_opacity_unit_distance = distance;
            self.modified += 1;
        }
    }
}

/// Non-positive (or NaN) opacity factors are raised to `floor`.
pub fn clamp_opacity_factor(factor: f64, floor: f64) -> f64 {
    if factor.is_nan() || factor <= 0.0 {
        floor
    } else {
        factor
    }
}

/// Maps the user-facing CT opacity factor to a unit distance. Larger factors
/// shorten the distance and make the volume denser.
pub fn opacity_factor_to_unit_distance(factor: f64, floor: f64) -> f64 {
    1.0 / clamp_opacity_factor(factor, floor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn piecewise_interpolates_and_clamps() {
        let f = PiecewiseFunction::new()
            .with_point(0.0, 0.0)
            .with_point(10.0, 1.0);
        assert_eq!(f.value(-5.0), 0.0);
        assert!((f.value(2.5) - 0.25).abs() < 1e-12);
        assert_eq!(f.value(20.0), 1.0);
    }

    #[test]
    fn points_stay_sorted_and_unique() {
        let f = PiecewiseFunction::new()
            .with_point(5.0, 0.5)
            .with_point(1.0, 0.1)
            .with_point(5.0, 0.7);
        assert_eq!(f.points(), &[(1.0, 0.1), (5.0, 0.7)]);
    }

    #[test]
    fn empty_curves_evaluate_to_zero() {
        assert_eq!(PiecewiseFunction::new().value(3.0), 0.0);
        assert_eq!(ColorTransferFunction::new().color(3.0), [0.0; 3]);
    }

    #[test]
    fn color_interpolates_per_channel() {
        let c = ColorTransferFunction::new()
            .with_rgb_point(0.0, 0.0, 0.0, 0.0)
            .with_rgb_point(2.0, 1.0, 0.5, 0.0);
        let rgb = c.color(1.0);
        assert!((rgb[0] - 0.5).abs() < 1e-12);
        assert!((rgb[1] - 0.25).abs() < 1e-12);
        assert_eq!(rgb[2], 0.0);
    }

    #[test]
    fn ct_default_hides_air() {
        let property = VolumeProperty::ct_default();
        assert!(property.shade);
        assert_eq!(property.scalar_opacity().value(-1000.0), 0.0);
        assert!((property.scalar_opacity().value(1000.0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn unit_distance_is_inverse_of_factor() {
        assert!((opacity_factor_to_unit_distance(2.0, 0.01) - 0.5).abs() < 1e-12);
        assert!((opacity_factor_to_unit_distance(0.0, 0.01) - 100.0).abs() < 1e-9);
        assert!((opacity_factor_to_unit_distance(-3.0, 0.01) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn mutations_bump_modified() {
        let mut property = VolumeProperty::ct_default();
        let before = property.modified();
        property.set_scalar_opacity_unit_distance(0.5);
        property.set_scalar_opacity_unit_distance(0.5);
        assert_eq!(property.modified(), before + 1);
    }
}
