use glam::{DQuat, DVec3};

const DEFAULT_CLIPPING_RANGE: (f64, f64) = (0.01, 1000.01);
const NEAR_CLIPPING_TOLERANCE: f64 = 0.001;

/// A viewport camera: perspective or parallel (orthographic) projection
/// looking from `position` at `focal_point`.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: DVec3,
    pub focal_point: DVec3,
    pub view_up: DVec3,
    pub parallel_projection: bool,
    /// Half the height of the viewport in world units, parallel projection only.
    pub parallel_scale: f64,
    /// Vertical view angle in degrees, perspective projection only.
    pub view_angle: f64,
    pub clipping_range: (f64, f64),
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: DVec3::Z,
            focal_point: DVec3::ZERO,
            view_up: DVec3::Y,
            parallel_projection: false,
            parallel_scale: 1.0,
            view_angle: 30.0,
            clipping_range: DEFAULT_CLIPPING_RANGE,
        }
    }
}

impl Camera {
    pub fn distance(&self) -> f64 {
        self.position.distance(self.focal_point)
    }

    /// Unit vector from the position towards the focal point.
    pub fn direction_of_projection(&self) -> DVec3 {
        (self.focal_point - self.position).normalize_or(DVec3::NEG_Z)
    }

    /// Frames `bounds` (`[xmin, xmax, ymin, ymax, zmin, zmax]`) keeping the
    /// current view direction.
    pub fn reset(&mut self, bounds: [f64; 6]) {
        let min = DVec3::new(bounds[0], bounds[2], bounds[4]);
        let max = DVec3::new(bounds[1], bounds[3], bounds[5]);
        let center = (min + max) * 0.5;
        let mut radius = (max - min).length() * 0.5;
        if radius <= 0.0 || !radius.is_finite() {
            radius = 1.0;
        }

        let half_angle = (self.view_angle.to_radians() * 0.5).sin();
        let distance = radius / half_angle;
        let view_plane_normal = -self.direction_of_projection();

        if view_plane_normal.dot(self.view_up).abs() > 0.999 {
            let up = self.view_up;
            self.view_up = DVec3::new(-up.z, up.x, up.y);
        }

        self.focal_point = center;
        self.position = center + view_plane_normal * distance;
        self.parallel_scale = radius;
        self.orthogonalize_view_up();
        self.reset_clipping_range(bounds);
    }

    /// Tightens near/far planes around `bounds` so nothing inside them is
    /// clipped.
    pub fn reset_clipping_range(&mut self, bounds: [f64; 6]) {
        let direction = self.direction_of_projection();
        let mut near = f64::INFINITY;
        let mut far = f64::NEG_INFINITY;
        for i in 0..8 {
            let corner = DVec3::new(
                bounds[i & 1],
                bounds[2 + ((i >> 1) & 1)],
                bounds[4 + ((i >> 2) & 1)],
            );
            let depth = (corner - self.position).dot(direction);
            near = near.min(depth);
            far = far.max(depth);
        }

        if !near.is_finite() || !far.is_finite() || far <= 0.0 {
            self.clipping_range = DEFAULT_CLIPPING_RANGE;
            return;
        }

        let margin = ((far - near) * 0.01).max(far * 1e-4);
        near -= margin;
        far += margin;
        self.clipping_range = (near.max(far * NEAR_CLIPPING_TOLERANCE), far);
    }

    /// Zooms by `factor`; values above 1 move closer.
    pub fn dolly(&mut self, factor: f64) {
        if factor <= 0.0 || !factor.is_finite() {
            return;
        }
        if self.parallel_projection {
            self.parallel_scale /= factor;
        } else {
            let distance = self.distance() / factor;
            self.position = self.focal_point - self.direction_of_projection() * distance;
        }
    }

    /// Rotates the position about the view-up axis through the focal point.
    pub fn azimuth(&mut self, degrees: f64) {
        let axis = self.view_up.normalize_or(DVec3::Y);
        self.rotate_about_focal_point(axis, degrees);
    }

    /// Rotates the position up or down about the focal point.
    pub fn elevation(&mut self, degrees: f64) {
        let right = self.direction_of_projection().cross(self.view_up);
        if right.length_squared() == 0.0 {
            return;
        }
        self.rotate_about_focal_point(right.normalize(), -degrees);
    }

    pub fn orthogonalize_view_up(&mut self) {
        let direction = self.direction_of_projection();
        let right = direction.cross(self.view_up);
        if right.length_squared() > 0.0 {
            self.view_up = right.cross(direction).normalize();
        }
    }

    fn rotate_about_focal_point(&mut self, axis: DVec3, degrees: f64) {
        let rotation = DQuat::from_axis_angle(axis, degrees.to_radians());
        self.position = self.focal_point + rotation * (self.position - self.focal_point);
    }
}
