//! Four-up MPR layout: axial, coronal and sagittal slice views plus the
//! existing 3D view squeezed into the remaining quadrant.

use std::collections::HashMap;
use std::sync::Arc;

use glam::DVec3;
use image::{GrayImage, RgbaImage};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::camera::Camera;
use crate::config::ViewerConfig;
use crate::enums::Orientation;
use crate::label_mapping::{LabelLut, LabelOpacityState};
use crate::plane_widget::{PlanePair, PlaneSettings};
use crate::render::{RenderSurface, Viewport, ViewportId, ViewportRect};
use crate::volume::VolumeDataset;

#[derive(Debug, Error)]
pub enum MprError {
    #[error("no base dataset loaded")]
    NoBaseDataset,
}

/// Quadrant placement with a small gap between neighbours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MprLayout {
    pub gap: f64,
}

impl MprLayout {
    const HALF: f64 = 0.5;

    pub fn slice_rect(&self, orientation: Orientation) -> ViewportRect {
        let (lo, hi) = (Self::HALF - self.gap, Self::HALF + self.gap);
        match orientation {
            Orientation::Axial => ViewportRect::new(0.0, hi, lo, 1.0),
            Orientation::Coronal => ViewportRect::new(hi, hi, 1.0, 1.0),
            Orientation::Sagittal => ViewportRect::new(0.0, 0.0, lo, lo),
        }
    }

    pub fn volume_rect(&self) -> ViewportRect {
        let (lo, hi) = (Self::HALF - self.gap, Self::HALF + self.gap);
        ViewportRect::new(hi, 0.0, 1.0, lo)
    }
}

/// Camera looking at `center` along the axis of `orientation` from
/// `distance` away, parallel projection, anatomical up vector.
pub fn slice_camera(orientation: Orientation, center: DVec3, distance: f64) -> Camera {
    let (offset, view_up) = match orientation {
        Orientation::Axial => (DVec3::new(0.0, 0.0, distance), DVec3::Y),
        Orientation::Coronal => (DVec3::new(0.0, -distance, 0.0), DVec3::Z),
        Orientation::Sagittal => (DVec3::new(distance, 0.0, 0.0), DVec3::Z),
    };
    Camera {
        position: center + offset,
        focal_point: center,
        view_up,
        parallel_projection: true,
        ..Camera::default()
    }
}

/// State that exists only while the four-up layout is active.
#[derive(Debug)]
pub struct MprSession {
    main_viewport: ViewportId,
    slice_viewports: Vec<(Orientation, ViewportId)>,
    pairs: HashMap<ViewportId, PlanePair>,
    lut: Option<LabelLut>,
    opacity: LabelOpacityState,
}

impl MprSession {
    /// Lays out the slice views and builds one plane pair per axis.
    ///
    /// Nothing on the surface is touched when there is no base volume. A
    /// plane pair that cannot be built is logged and skipped; its viewport
    /// stays empty.
    pub fn enter<S: RenderSurface>(
        surface: &mut S,
        main_viewport: ViewportId,
        base: Option<Arc<VolumeDataset>>,
        label: Option<Arc<VolumeDataset>>,
        opacity: LabelOpacityState,
        config: &ViewerConfig,
    ) -> Result<Self, MprError> {
        let base = base.ok_or(MprError::NoBaseDataset)?;
        let layout = MprLayout {
            gap: config.layout.viewport_gap,
        };
        let lut = label.as_ref().map(|label| {
            LabelLut::build(label.scalar_range(), opacity, config.opacity.tumor_alpha)
        });
        let settings = PlaneSettings {
            label_offset: config.mpr.label_plane_offset,
            base_interpolation: config.mpr.slice_interpolation,
        };
        let center = base.center();
        let distance = base.max_extent() * config.mpr.camera_distance_factor;

        let mut session = Self {
            main_viewport,
            slice_viewports: Vec::with_capacity(3),
            pairs: HashMap::new(),
            lut,
            opacity,
        };

        for orientation in Orientation::ALL {
            let mut viewport =
                Viewport::new(layout.slice_rect(orientation), config.layout.mpr_background);
            viewport.camera = slice_camera(orientation, center, distance);
            let id = surface.add_viewport(viewport);
            session.slice_viewports.push((orientation, id));

            let pair = PlanePair::create(
                orientation,
                base.clone(),
                label.clone(),
                id,
                session.lut.as_ref(),
                settings,
            );
            match pair {
                Ok(pair) => {
                    if let Some(vp) = surface.viewport_mut(id) {
                        vp.camera.reset(pair.bounds());
                    }
                    session.pairs.insert(id, pair);
                }
                Err(err) => warn!(?orientation, %err, "skipping MPR view"),
            }
        }

        if let Some(vp) = surface.viewport_mut(main_viewport) {
            vp.rect = layout.volume_rect();
        }

        info!(
            views = session.pairs.len(),
            label = session.lut.is_some(),
            "entered MPR"
        );
        Ok(session)
    }

    /// Releases every plane, removes the slice views and gives the 3D view
    /// the whole surface back.
    pub fn exit<S: RenderSurface>(mut self, surface: &mut S) {
        for (_, pair) in self.pairs.drain() {
            pair.destroy();
        }
        for (_, id) in self.slice_viewports.drain(..) {
            surface.remove_viewport(id);
        }
        if let Some(vp) = surface.viewport_mut(self.main_viewport) {
            vp.rect = ViewportRect::FULL;
        }
        info!("left MPR");
    }

    pub fn main_viewport(&self) -> ViewportId {
        self.main_viewport
    }

    pub fn viewport_for(&self, orientation: Orientation) -> Option<ViewportId> {
        self.slice_viewports
            .iter()
            .find(|(o, _)| *o == orientation)
            .map(|(_, id)| *id)
    }

    pub fn pair_for_viewport(&self, viewport: ViewportId) -> Option<&PlanePair> {
        self.pairs.get(&viewport)
    }

    pub fn pair_for_viewport_mut(&mut self, viewport: ViewportId) -> Option<&mut PlanePair> {
        self.pairs.get_mut(&viewport)
    }

    pub fn pair(&self, orientation: Orientation) -> Option<&PlanePair> {
        self.pair_for_viewport(self.viewport_for(orientation)?)
    }

    pub fn pair_mut(&mut self, orientation: Orientation) -> Option<&mut PlanePair> {
        let id = self.viewport_for(orientation)?;
        self.pair_for_viewport_mut(id)
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    pub fn lut(&self) -> Option<&LabelLut> {
        self.lut.as_ref()
    }

    pub fn opacity(&self) -> LabelOpacityState {
        self.opacity
    }

    /// Moves the base slice of the pair shown in `viewport` and refits that
    /// viewport's clipping range. `None` when no pair owns the viewport.
    pub fn set_slice_index<S: RenderSurface>(
        &mut self,
        surface: &mut S,
        viewport: ViewportId,
        index: i64,
    ) -> Option<usize> {
        let pair = self.pairs.get_mut(&viewport)?;
        let applied = match surface.viewport_mut(viewport) {
            Some(vp) => pair.set_base_slice_index_with_camera(index, &mut vp.camera),
            None => pair.set_base_slice_index(index),
        };
        debug!(orientation = ?pair.orientation(), index = applied, "slice changed");
        Some(applied)
    }

    /// Recolours the liver entry of the shared LUT; every label plane picks
    /// it up on its next texture.
    pub fn set_liver_opacity(&mut self, opacity: LabelOpacityState) {
        self.opacity = opacity;
        if let Some(lut) = &mut self.lut {
            lut.set_liver_opacity(opacity);
        }
    }

    pub fn set_layer_visibility(&mut self, show_base: bool, show_label: bool) {
        for pair in self.pairs.values_mut() {
            pair.set_visibility(show_base, show_label);
        }
    }

    pub fn base_texture(&self, orientation: Orientation) -> Option<GrayImage> {
        self.pair(orientation)?.base_texture()
    }

    pub fn label_texture(&self, orientation: Orientation) -> Option<RgbaImage> {
        let lut = self.lut.as_ref()?;
        self.pair(orientation)?.label_texture(lut)
    }
}
