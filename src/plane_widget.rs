//! Slice planes and the base/label plane pair of one anatomical axis.
//!
//! The base plane is the interactive one. The label plane is a follower: its
//! slice index is the base index clamped to the label volume, and its
//! geometry is always derived from the base plane's placement, pushed a
//! small distance towards the camera so the two coplanar surfaces never
//! z-fight.

use std::fmt;
use std::sync::Arc;

use glam::DVec3;
use image::{GrayImage, RgbaImage};
use thiserror::Error;
use tracing::{debug, trace};

use crate::camera::Camera;
use crate::enums::{Interpolation, Orientation};
use crate::label_mapping::LabelLut;
use crate::render::ViewportId;
use crate::volume::VolumeDataset;

/// Distance the label plane is moved towards the camera.
pub const DEFAULT_LABEL_PLANE_OFFSET: f64 = 0.1;

#[derive(Debug, Error)]
pub enum PlaneError {
    #[error("{orientation:?} plane: volume has no slices along this axis")]
    EmptyAxis { orientation: Orientation },

    #[error("{orientation:?} plane: invalid voxel spacing {spacing}")]
    InvalidSpacing {
        orientation: Orientation,
        spacing: f64,
    },
}

/// A rectangle in world space spanned by `point1 - origin` and
/// `point2 - origin`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneGeometry {
    pub origin: DVec3,
    pub point1: DVec3,
    pub point2: DVec3,
}

impl PlaneGeometry {
    /// Placement of slice `index` of `dataset`, spanning the full in-plane
    /// bounds.
    pub fn for_slice(dataset: &VolumeDataset, orientation: Orientation, index: usize) -> Self {
        let b = dataset.bounds();
        let position = dataset.slice_position(orientation, index);
        match orientation {
            Orientation::Axial => Self {
                origin: DVec3::new(b[0], b[2], position),
                point1: DVec3::new(b[1], b[2], position),
                point2: DVec3::new(b[0], b[3], position),
            },
            Orientation::Coronal => Self {
                origin: DVec3::new(b[0], position, b[4]),
                point1: DVec3::new(b[1], position, b[4]),
                point2: DVec3::new(b[0], position, b[5]),
            },
            Orientation::Sagittal => Self {
                origin: DVec3::new(position, b[2], b[4]),
                point1: DVec3::new(position, b[3], b[4]),
                point2: DVec3::new(position, b[2], b[5]),
            },
        }
    }

    /// Unit normal, zero for a degenerate plane.
    pub fn normal(&self) -> DVec3 {
        (self.point1 - self.origin)
            .cross(self.point2 - self.origin)
            .normalize_or_zero()
    }

    pub fn translated(&self, offset: DVec3) -> Self {
        Self {
            origin: self.origin + offset,
            point1: self.point1 + offset,
            point2: self.point2 + offset,
        }
    }

    /// `[xmin, xmax, ymin, ymax, zmin, zmax]` of the four corners.
    pub fn bounds(&self) -> [f64; 6] {
        let far = self.point1 + self.point2 - self.origin;
        let corners = [self.origin, self.point1, self.point2, far];
        let min = corners.iter().copied().fold(DVec3::INFINITY, DVec3::min);
        let max = corners.iter().copied().fold(DVec3::NEG_INFINITY, DVec3::max);
        [min.x, max.x, min.y, max.y, min.z, max.z]
    }
}

fn union_bounds(a: [f64; 6], b: [f64; 6]) -> [f64; 6] {
    [
        a[0].min(b[0]),
        a[1].max(b[1]),
        a[2].min(b[2]),
        a[3].max(b[3]),
        a[4].min(b[4]),
        a[5].max(b[5]),
    ]
}

/// Surface appearance of a plane, separate from its texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneAppearance {
    pub color: [f64; 3],
    pub opacity: f64,
    pub display_text: bool,
    pub texture_visible: bool,
    pub texture_interpolation: Interpolation,
}

/// One plane sampling one volume along one axis.
#[derive(Debug, Clone)]
pub struct SliceWidget {
    orientation: Orientation,
    dataset: Arc<VolumeDataset>,
    slice_index: usize,
    geometry: PlaneGeometry,
    appearance: PlaneAppearance,
    interactive: bool,
    enabled: bool,
}

impl SliceWidget {
    pub fn new(
        orientation: Orientation,
        dataset: Arc<VolumeDataset>,
        slice_index: usize,
        appearance: PlaneAppearance,
    ) -> Result<Self, PlaneError> {
        let axis = orientation.axis();
        if dataset.dimensions()[axis] == 0 {
            return Err(PlaneError::EmptyAxis { orientation });
        }
        let spacing = dataset.spacing()[axis];
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(PlaneError::InvalidSpacing {
                orientation,
                spacing,
            });
        }

        let slice_index = slice_index.min(dataset.dimensions()[axis] - 1);
        let geometry = PlaneGeometry::for_slice(&dataset, orientation, slice_index);
        Ok(Self {
            orientation,
            dataset,
            slice_index,
            geometry,
            appearance,
            interactive: true,
            enabled: true,
        })
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn dataset(&self) -> &Arc<VolumeDataset> {
        &self.dataset
    }

    pub fn slice_index(&self) -> usize {
        self.slice_index
    }

    pub fn max_slice_index(&self) -> usize {
        self.dataset.slice_count(self.orientation).saturating_sub(1)
    }

    /// Clamps `index` into the volume and re-places the plane on that slice.
    /// Returns the index actually used.
    pub fn set_slice_index(&mut self, index: i64) -> usize {
        let clamped = index.clamp(0, self.max_slice_index() as i64) as usize;
        self.slice_index = clamped;
        self.update_placement();
        clamped
    }

    /// Re-derives the geometry from the slice index.
    pub fn update_placement(&mut self) {
        self.geometry = PlaneGeometry::for_slice(&self.dataset, self.orientation, self.slice_index);
    }

    pub fn geometry(&self) -> &PlaneGeometry {
        &self.geometry
    }

    pub fn set_geometry(&mut self, geometry: PlaneGeometry) {
        self.geometry = geometry;
    }

    pub fn normal(&self) -> DVec3 {
        self.geometry.normal()
    }

    pub fn appearance(&self) -> &PlaneAppearance {
        &self.appearance
    }

    pub fn appearance_mut(&mut self) -> &mut PlaneAppearance {
        &mut self.appearance
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Overlay text identifying the plane, e.g. `Axial 151/300`.
    pub fn text(&self) -> Option<String> {
        self.appearance.display_text.then(|| {
            format!(
                "{} {}/{}",
                self.orientation.name(),
                self.slice_index + 1,
                self.dataset.slice_count(self.orientation)
            )
        })
    }

    /// Grey-level texture of the current slice.
    pub fn texture(&self) -> Option<GrayImage> {
        if !self.enabled || !self.appearance.texture_visible {
            return None;
        }
        self.dataset.get_image_from_axis(
            self.slice_index,
            self.orientation,
            self.appearance.texture_interpolation,
        )
    }

    /// Texture of the current slice coloured through `lut`, voxel by voxel.
    pub fn lut_texture(&self, lut: &LabelLut) -> Option<RgbaImage> {
        if !self.enabled || !self.appearance.texture_visible {
            return None;
        }
        self.dataset
            .get_rgba_from_axis(self.slice_index, self.orientation, |v| lut.map_value_u8(v))
    }
}

/// Construction parameters shared by the three plane pairs of a session.
#[derive(Debug, Clone, Copy)]
pub struct PlaneSettings {
    pub label_offset: f64,
    pub base_interpolation: Interpolation,
}

impl Default for PlaneSettings {
    fn default() -> Self {
        Self {
            label_offset: DEFAULT_LABEL_PLANE_OFFSET,
            base_interpolation: Interpolation::Linear,
        }
    }
}

/// Base plane plus optional label plane for one axis, bound to one viewport.
pub struct PlanePair {
    orientation: Orientation,
    viewport: ViewportId,
    base: SliceWidget,
    label: Option<SliceWidget>,
    label_offset: f64,
}

impl fmt::Debug for PlanePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanePair")
            .field("orientation", &self.orientation)
            .field("viewport", &self.viewport)
            .field("base", &self.base.slice_index)
            .field("label", &self.label.as_ref().map(|l| l.slice_index))
            .finish()
    }
}

/// Frame colour of the interactive plane for each axis.
pub fn plane_color(orientation: Orientation) -> [f64; 3] {
    match orientation {
        Orientation::Axial => [1.0, 0.0, 0.0],
        Orientation::Coronal => [0.0, 1.0, 0.0],
        Orientation::Sagittal => [0.0, 0.0, 1.0],
    }
}

impl PlanePair {
    /// Builds the pair with the base plane on the middle slice. A label plane
    /// is only created when both a label volume and a LUT are given.
    pub fn create(
        orientation: Orientation,
        base: Arc<VolumeDataset>,
        label: Option<Arc<VolumeDataset>>,
        viewport: ViewportId,
        lut: Option<&LabelLut>,
        settings: PlaneSettings,
    ) -> Result<Self, PlaneError> {
        let middle = base.slice_count(orientation) / 2;
        let base_widget = SliceWidget::new(
            orientation,
            base,
            middle,
            PlaneAppearance {
                color: plane_color(orientation),
                opacity: 1.0,
                display_text: true,
                texture_visible: true,
                texture_interpolation: settings.base_interpolation,
            },
        )?;

        let label_widget = match (label, lut) {
            (Some(label), Some(_)) => {
                let mut widget = SliceWidget::new(
                    orientation,
                    label,
                    base_widget.slice_index(),
                    PlaneAppearance {
                        color: [0.0; 3],
                        opacity: 0.0,
                        display_text: false,
                        texture_visible: true,
                        texture_interpolation: Interpolation::None,
                    },
                )?;
                widget.set_interactive(false);
                Some(widget)
            }
            _ => None,
        };

        let mut pair = Self {
            orientation,
            viewport,
            base: base_widget,
            label: label_widget,
            label_offset: settings.label_offset,
        };
        pair.sync_geometry();
        debug!(
            ?orientation,
            base_index = pair.base.slice_index(),
            label_index = ?pair.label_slice_index(),
            "plane pair created"
        );
        Ok(pair)
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn viewport(&self) -> ViewportId {
        self.viewport
    }

    pub fn base(&self) -> &SliceWidget {
        &self.base
    }

    pub fn label(&self) -> Option<&SliceWidget> {
        self.label.as_ref()
    }

    pub fn base_slice_index(&self) -> usize {
        self.base.slice_index()
    }

    pub fn label_slice_index(&self) -> Option<usize> {
        self.label.as_ref().map(SliceWidget::slice_index)
    }

    pub fn max_base_slice_index(&self) -> usize {
        self.base.max_slice_index()
    }

    /// Moves the base plane to `index` (clamped), lets the label plane follow
    /// and re-syncs the geometry. Returns the base index actually used.
    pub fn set_base_slice_index(&mut self, index: i64) -> usize {
        let applied = self.base.set_slice_index(index);
        if let Some(label) = &mut self.label {
            label.set_slice_index(applied as i64);
        }
        self.sync_geometry();
        trace!(
            orientation = ?self.orientation,
            base = applied,
            label = ?self.label_slice_index(),
            "slice index set"
        );
        applied
    }

    /// Same as [`PlanePair::set_base_slice_index`], then fits the clipping
    /// range of `camera` to the moved planes.
    pub fn set_base_slice_index_with_camera(&mut self, index: i64, camera: &mut Camera) -> usize {
        let applied = self.set_base_slice_index(index);
        camera.reset_clipping_range(self.bounds());
        applied
    }

    /// Places the label plane on the base plane, offset along the normal
    /// towards the viewer. Calling it again without a slice change yields the
    /// same placement.
    pub fn sync_geometry(&mut self) {
        self.base.update_placement();
        if let Some(label) = &mut self.label {
            let base_geometry = *self.base.geometry();
            let offset = base_geometry.normal() * self.label_offset;
            label.set_geometry(base_geometry.translated(offset));
        }
    }

    /// Same as [`PlanePair::sync_geometry`], then fits the clipping range of
    /// `camera`.
    pub fn sync_geometry_with_camera(&mut self, camera: &mut Camera) {
        self.sync_geometry();
        camera.reset_clipping_range(self.bounds());
    }

    /// Bounds of every plane in the pair.
    pub fn bounds(&self) -> [f64; 6] {
        let base = self.base.geometry().bounds();
        match &self.label {
            Some(label) => union_bounds(base, label.geometry().bounds()),
            None => base,
        }
    }

    pub fn set_visibility(&mut self, show_base: bool, show_label: bool) {
        self.base.appearance_mut().texture_visible = show_base;
        if let Some(label) = &mut self.label {
            label.appearance_mut().texture_visible = show_label;
        }
    }

    pub fn base_texture(&self) -> Option<GrayImage> {
        self.base.texture()
    }

    pub fn label_texture(&self, lut: &LabelLut) -> Option<RgbaImage> {
        self.label.as_ref()?.lut_texture(lut)
    }

    /// Disables and releases both planes.
    pub fn destroy(mut self) {
        self.base.set_enabled(false);
        if let Some(label) = &mut self.label {
            label.set_enabled(false);
        }
        debug!(orientation = ?self.orientation, "plane pair destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label_mapping::{DEFAULT_TUMOR_ALPHA, LabelOpacityState};
    use ndarray::Array3;

    fn volume(x: usize, y: usize, z: usize, spacing: [f64; 3]) -> Arc<VolumeDataset> {
        Arc::new(VolumeDataset::new(
            Array3::from_shape_fn((z, y, x), |(k, _, _)| (k % 3) as f32),
            spacing,
            [0.0; 3],
        ))
    }

    fn lut() -> LabelLut {
        LabelLut::build((0.0, 2.0), LabelOpacityState::default(), DEFAULT_TUMOR_ALPHA)
    }

    fn pair(orientation: Orientation) -> PlanePair {
        let lut = lut();
        PlanePair::create(
            orientation,
            volume(16, 16, 12, [1.0; 3]),
            Some(volume(8, 8, 6, [2.0; 3])),
            ViewportId(1),
            Some(&lut),
            PlaneSettings::default(),
        )
        .expect("valid volumes")
    }

    #[test]
    fn base_starts_on_middle_slice() {
        let pair = pair(Orientation::Axial);
        assert_eq!(pair.base_slice_index(), 6);
        assert_eq!(pair.label_slice_index(), Some(5));
    }

    #[test]
    fn label_index_is_clamped_to_its_own_extent() {
        let mut pair = pair(Orientation::Axial);
        assert_eq!(pair.set_base_slice_index(11), 11);
        assert_eq!(pair.label_slice_index(), Some(5));
        assert_eq!(pair.set_base_slice_index(3), 3);
        assert_eq!(pair.label_slice_index(), Some(3));
    }

    #[test]
    fn indices_stay_in_range_for_every_axis() {
        for orientation in Orientation::ALL {
            let mut pair = pair(orientation);
            for index in -5..40 {
                let applied = pair.set_base_slice_index(index);
                assert!(applied <= pair.max_base_slice_index());
                let label = pair.label().expect("label plane");
                assert!(label.slice_index() <= label.max_slice_index());
            }
        }
    }

    #[test]
    fn label_plane_sits_in_front_of_base_plane() {
        for orientation in Orientation::ALL {
            let pair = pair(orientation);
            let base = pair.base().geometry();
            let label = pair.label().expect("label plane").geometry();
            let offset = label.origin - base.origin;
            assert!((offset.length() - DEFAULT_LABEL_PLANE_OFFSET).abs() < 1e-9);
            assert!((offset.normalize() - base.normal()).length() < 1e-9);
            assert!(((label.point1 - base.point1) - offset).length() < 1e-9);
            assert!(((label.point2 - base.point2) - offset).length() < 1e-9);
        }
    }

    #[test]
    fn label_plane_follows_base_plane_when_scrolling() {
        let mut pair = pair(Orientation::Axial);
        for index in [0, 11, 4] {
            pair.set_base_slice_index(index);
            let base = pair.base().geometry();
            let label = pair.label().expect("label plane").geometry();
            assert_eq!(base.origin.z, index as f64);
            assert!((label.origin.z - base.origin.z - DEFAULT_LABEL_PLANE_OFFSET).abs() < 1e-9);
        }
    }

    #[test]
    fn normals_point_towards_conventional_cameras() {
        let geometry = |o| *pair(o).base().geometry();
        assert_eq!(geometry(Orientation::Axial).normal(), DVec3::Z);
        assert_eq!(geometry(Orientation::Coronal).normal(), DVec3::NEG_Y);
        assert_eq!(geometry(Orientation::Sagittal).normal(), DVec3::X);
    }

    #[test]
    fn sync_geometry_is_idempotent() {
        let mut pair = pair(Orientation::Coronal);
        pair.set_base_slice_index(9);
        pair.sync_geometry();
        let first = *pair.label().expect("label plane").geometry();
        pair.sync_geometry();
        let second = *pair.label().expect("label plane").geometry();
        assert_eq!(first, second);
    }

    #[test]
    fn label_plane_is_an_invisible_follower() {
        let pair = pair(Orientation::Sagittal);
        let label = pair.label().expect("label plane");
        assert!(!label.is_interactive());
        assert_eq!(label.appearance().opacity, 0.0);
        assert_eq!(label.appearance().color, [0.0; 3]);
        assert!(label.text().is_none());
        assert!(pair.base().is_interactive());
        assert_eq!(pair.base().text().as_deref(), Some("Sagittal 9/16"));
    }

    #[test]
    fn no_label_plane_without_lut() {
        let pair = PlanePair::create(
            Orientation::Axial,
            volume(4, 4, 4, [1.0; 3]),
            Some(volume(4, 4, 4, [1.0; 3])),
            ViewportId(0),
            None,
            PlaneSettings::default(),
        )
        .expect("valid volume");
        assert!(pair.label().is_none());
    }

    #[test]
    fn invalid_spacing_fails_only_that_axis() {
        let base = volume(4, 4, 4, [1.0, 1.0, 0.0]);
        let axial = PlanePair::create(
            Orientation::Axial,
            base.clone(),
            None,
            ViewportId(0),
            None,
            PlaneSettings::default(),
        );
        assert!(matches!(axial, Err(PlaneError::InvalidSpacing { .. })));
        let coronal = PlanePair::create(
            Orientation::Coronal,
            base,
            None,
            ViewportId(1),
            None,
            PlaneSettings::default(),
        );
        assert!(coronal.is_ok());
    }

    #[test]
    fn camera_clipping_follows_planes() {
        let mut pair = pair(Orientation::Axial);
        let mut camera = Camera {
            position: DVec3::new(7.5, 7.5, 40.0),
            focal_point: DVec3::new(7.5, 7.5, 5.5),
            parallel_projection: true,
            ..Camera::default()
        };
        pair.set_base_slice_index_with_camera(11, &mut camera);
        let (near, far) = camera.clipping_range;
        let depth = 40.0 - 11.0;
        assert!(near < depth - DEFAULT_LABEL_PLANE_OFFSET && far > depth);
    }

    #[test]
    fn textures_use_lut_for_label_and_grey_for_base() {
        let lut = lut();
        let mut pair = pair(Orientation::Axial);
        pair.set_base_slice_index(1);
        let base = pair.base_texture().expect("base texture");
        assert_eq!(base.dimensions(), (16, 16));
        let label = pair.label_texture(&lut).expect("label texture");
        assert_eq!(label.dimensions(), (8, 8));
        // Label slice 1 holds label value 1 (liver).
        assert_eq!(label.get_pixel(0, 0).0, [0, 255, 0, 153]);
        pair.set_visibility(true, false);
        assert!(pair.label_texture(&lut).is_none());
    }
}
