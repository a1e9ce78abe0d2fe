//! Seams to the host rendering system.
//!
//! The MPR engine never draws anything itself. It arranges [`Viewport`]s on
//! a [`RenderSurface`], positions their cameras, and hands volumes with their
//! transfer functions to a [`VolumeRayCaster`]. The `Headless*` types are
//! in-memory implementations for batch export and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::trace;

use crate::camera::Camera;
use crate::enums::VolumeLayer;
use crate::transfer_function::VolumeProperty;
use crate::volume::VolumeDataset;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewportId(pub u32);

/// Normalized viewport rectangle, origin at the bottom-left of the surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportRect {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl ViewportRect {
    pub const FULL: ViewportRect = ViewportRect::new(0.0, 0.0, 1.0, 1.0);

    pub const fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }

    /// Size in pixels on a surface of the given size.
    pub fn pixel_size(&self, (width, height): (u32, u32)) -> (f64, f64) {
        (
            (self.xmax - self.xmin) * f64::from(width),
            (self.ymax - self.ymin) * f64::from(height),
        )
    }
}

#[derive(Clone, Debug)]
pub struct Viewport {
    pub rect: ViewportRect,
    pub background: [f64; 3],
    pub camera: Camera,
}

impl Viewport {
    pub fn new(rect: ViewportRect, background: [f64; 3]) -> Self {
        Self {
            rect,
            background,
            camera: Camera::default(),
        }
    }
}

/// The window area viewports are drawn into.
pub trait RenderSurface {
    fn add_viewport(&mut self, viewport: Viewport) -> ViewportId;

    fn remove_viewport(&mut self, id: ViewportId) -> Option<Viewport>;

    fn viewport(&self, id: ViewportId) -> Option<&Viewport>;

    fn viewport_mut(&mut self, id: ViewportId) -> Option<&mut Viewport>;

    /// Ids in drawing order, last drawn on top.
    fn viewport_ids(&self) -> Vec<ViewportId>;

    fn size(&self) -> (u32, u32);

    fn resize(&mut self, width: u32, height: u32);

    /// Draws a frame; returns once it is on screen.
    fn render(&mut self);

    /// Topmost viewport under a pointer position given in pixels with the
    /// origin at the bottom-left.
    fn viewport_at(&self, x: f64, y: f64) -> Option<ViewportId> {
        let (width, height) = self.size();
        if width == 0 || height == 0 {
            return None;
        }
        let (nx, ny) = (x / f64::from(width), y / f64::from(height));
        self.viewport_ids()
            .into_iter()
            .rev()
            .find(|id| self.viewport(*id).is_some_and(|vp| vp.rect.contains(nx, ny)))
    }
}

/// The volume ray-casting primitive drawing the 3D view.
pub trait VolumeRayCaster {
    fn set_input(
        &mut self,
        layer: VolumeLayer,
        dataset: Arc<VolumeDataset>,
        property: &VolumeProperty,
    );

    fn update_property(&mut self, layer: VolumeLayer, property: &VolumeProperty);

    fn set_visibility(&mut self, layer: VolumeLayer, visible: bool);

    fn remove(&mut self, layer: VolumeLayer);
}

/// Off-screen surface that only keeps track of its viewports and frames.
#[derive(Debug)]
pub struct HeadlessSurface {
    size: (u32, u32),
    viewports: BTreeMap<ViewportId, Viewport>,
    next_id: u32,
    frames: u64,
}

impl HeadlessSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            viewports: BTreeMap::new(),
            next_id: 0,
            frames: 0,
        }
    }

    /// Number of frames rendered so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn viewport_count(&self) -> usize {
        self.viewports.len()
    }
}

impl RenderSurface for HeadlessSurface {
    fn add_viewport(&mut self, viewport: Viewport) -> ViewportId {
        let id = ViewportId(self.next_id);
        self.next_id += 1;
        self.viewports.insert(id, viewport);
        id
    }

    fn remove_viewport(&mut self, id: ViewportId) -> Option<Viewport> {
        self.viewports.remove(&id)
    }

    fn viewport(&self, id: ViewportId) -> Option<&Viewport> {
        self.viewports.get(&id)
    }

    fn viewport_mut(&mut self, id: ViewportId) -> Option<&mut Viewport> {
        self.viewports.get_mut(&id)
    }

    fn viewport_ids(&self) -> Vec<ViewportId> {
        self.viewports.keys().copied().collect()
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn render(&mut self) {
        self.frames += 1;
        trace!(frame = self.frames, viewports = self.viewports.len(), "render");
    }
}

#[derive(Debug, Clone)]
pub struct RayCastInput {
    pub dataset: Arc<VolumeDataset>,
    pub property: VolumeProperty,
    pub visible: bool,
}

/// Ray caster that records what it was given instead of drawing.
#[derive(Debug, Default)]
pub struct HeadlessRayCaster {
    inputs: HashMap<VolumeLayer, RayCastInput>,
    property_updates: u64,
}

impl HeadlessRayCaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(&self, layer: VolumeLayer) -> Option<&RayCastInput> {
        self.inputs.get(&layer)
    }

    pub fn property_updates(&self) -> u64 {
        self.property_updates
    }
}

impl VolumeRayCaster for HeadlessRayCaster {
    fn set_input(
        &mut self,
        layer: VolumeLayer,
        dataset: Arc<VolumeDataset>,
        property: &VolumeProperty,
    ) {
        self.inputs.insert(
            layer,
            RayCastInput {
                dataset,
                property: property.clone(),
                visible: true,
            },
        );
    }

    fn update_property(&mut self, layer: VolumeLayer, property: &VolumeProperty) {
        if let Some(input) = self.inputs.get_mut(&layer) {
            input.property = property.clone();
            self.property_updates += 1;
        }
    }

    fn set_visibility(&mut self, layer: VolumeLayer, visible: bool) {
        if let Some(input) = self.inputs.get_mut(&layer) {
            input.visible = visible;
        }
    }

    fn remove(&mut self, layer: VolumeLayer) {
        self.inputs.remove(&layer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_lookup_prefers_topmost() {
        let mut surface = HeadlessSurface::new(200, 100);
        let full = surface.add_viewport(Viewport::new(ViewportRect::FULL, [0.0; 3]));
        let corner = surface.add_viewport(Viewport::new(
            ViewportRect::new(0.5, 0.0, 1.0, 0.5),
            [0.0; 3],
        ));
        assert_eq!(surface.viewport_at(150.0, 25.0), Some(corner));
        assert_eq!(surface.viewport_at(50.0, 75.0), Some(full));
        assert_eq!(surface.viewport_at(250.0, 75.0), None);
    }

    #[test]
    fn removed_viewport_is_no_longer_found() {
        let mut surface = HeadlessSurface::new(100, 100);
        let id = surface.add_viewport(Viewport::new(ViewportRect::FULL, [0.0; 3]));
        assert!(surface.remove_viewport(id).is_some());
        assert_eq!(surface.viewport_at(10.0, 10.0), None);
        assert_eq!(surface.viewport_count(), 0);
    }

    #[test]
    fn zero_sized_surface_has_no_hits() {
        let mut surface = HeadlessSurface::new(0, 0);
        surface.add_viewport(Viewport::new(ViewportRect::FULL, [0.0; 3]));
        assert_eq!(surface.viewport_at(0.0, 0.0), None);
    }
}
