//! The application-facing entry points: one case (a CT volume with an
//! optional label volume) shown in a 3D view, optionally split into the
//! four-up MPR layout.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::ViewerConfig;
use crate::enums::{Orientation, VolumeLayer};
use crate::interaction::{EventOutcome, InputEvent, InteractionController, InteractionMode};
use crate::label_mapping::{LabelOpacityState, apply_liver_opacity, label_volume_property};
use crate::render::{RenderSurface, Viewport, ViewportId, ViewportRect, VolumeRayCaster};
use crate::transfer_function::{
    VolumeProperty, clamp_opacity_factor, opacity_factor_to_unit_distance,
};
use crate::view_manager::{MprError, MprSession};
use crate::volume::VolumeDataset;
use crate::volume_loader::{DatasetError, VolumeSource};

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("no base dataset loaded")]
    NoBaseDataset,

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

impl From<MprError> for ViewerError {
    fn from(err: MprError) -> Self {
        match err {
            MprError::NoBaseDataset => ViewerError::NoBaseDataset,
        }
    }
}

/// A volume in the 3D view together with its rendering property.
#[derive(Debug, Clone)]
pub struct VolumeActor {
    dataset: Arc<VolumeDataset>,
    property: VolumeProperty,
    submitted: u64,
}

impl VolumeActor {
    fn new(dataset: Arc<VolumeDataset>, property: VolumeProperty) -> Self {
        let submitted = property.modified();
        Self {
            dataset,
            property,
            submitted,
        }
    }

    pub fn dataset(&self) -> &Arc<VolumeDataset> {
        &self.dataset
    }

    pub fn property(&self) -> &VolumeProperty {
        &self.property
    }

    /// Property changed since it was last handed to the ray caster.
    pub fn is_dirty(&self) -> bool {
        self.property.modified() != self.submitted
    }
}

#[derive(Debug)]
pub struct Viewer<S: RenderSurface, R: VolumeRayCaster> {
    surface: S,
    ray_caster: R,
    config: ViewerConfig,
    main_viewport: ViewportId,
    base: Option<VolumeActor>,
    label: Option<VolumeActor>,
    opacity: LabelOpacityState,
    ct_opacity_factor: f64,
    show_base: bool,
    show_label: bool,
    controller: InteractionController,
    mpr: Option<MprSession>,
}

impl<S: RenderSurface, R: VolumeRayCaster> Viewer<S, R> {
    pub fn new(mut surface: S, ray_caster: R, config: ViewerConfig) -> Self {
        let main_viewport = surface.add_viewport(Viewport::new(
            ViewportRect::FULL,
            config.layout.main_background,
        ));
        Self {
            surface,
            ray_caster,
            main_viewport,
            base: None,
            label: None,
            opacity: LabelOpacityState::new(config.opacity.default_liver_opacity),
            ct_opacity_factor: clamp_opacity_factor(
                config.opacity.default_ct_opacity_factor,
                config.opacity.ct_opacity_floor,
            ),
            show_base: true,
            show_label: true,
            controller: InteractionController::new(config.mpr.fast_scroll_step),
            mpr: None,
            config,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn ray_caster(&self) -> &R {
        &self.ray_caster
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn main_viewport(&self) -> ViewportId {
        self.main_viewport
    }

    pub fn base_dataset(&self) -> Option<&Arc<VolumeDataset>> {
        self.base.as_ref().map(VolumeActor::dataset)
    }

    pub fn label_dataset(&self) -> Option<&Arc<VolumeDataset>> {
        self.label.as_ref().map(VolumeActor::dataset)
    }

    pub fn base_actor(&self) -> Option<&VolumeActor> {
        self.base.as_ref()
    }

    pub fn label_actor(&self) -> Option<&VolumeActor> {
        self.label.as_ref()
    }

    pub fn liver_opacity(&self) -> f64 {
        self.opacity.liver_opacity()
    }

    pub fn ct_opacity_factor(&self) -> f64 {
        self.ct_opacity_factor
    }

    /// `(show_base, show_label)`
    pub fn layer_visibility(&self) -> (bool, bool) {
        (self.show_base, self.show_label)
    }

    pub fn interaction_mode(&self) -> InteractionMode {
        self.controller.mode()
    }

    pub fn mpr_session(&self) -> Option<&MprSession> {
        self.mpr.as_ref()
    }

    pub fn is_mpr_active(&self) -> bool {
        self.mpr.is_some()
    }

    /// Loads a CT volume and makes it the base of a new case. On error the
    /// current case is left as it was.
    pub fn load_base<V: VolumeSource + ?Sized>(
        &mut self,
        source: &V,
        path: impl AsRef<Path>,
    ) -> Result<(), ViewerError> {
        let dataset = source.load(path.as_ref())?;
        self.set_base_dataset(dataset);
        Ok(())
    }

    /// Starts a new case from `dataset`. Any label volume of the previous
    /// case is dropped.
    pub fn set_base_dataset(&mut self, dataset: impl Into<Arc<VolumeDataset>>) {
        self.exit_mpr();
        if self.label.take().is_some() {
            self.ray_caster.remove(VolumeLayer::Label);
        }

        let dataset = dataset.into();
        let mut property = VolumeProperty::ct_default();
        property.set_scalar_opacity_unit_distance(opacity_factor_to_unit_distance(
            self.ct_opacity_factor,
            self.config.opacity.ct_opacity_floor,
        ));
        self.ray_caster
            .set_input(VolumeLayer::Base, dataset.clone(), &property);
        self.ray_caster
            .set_visibility(VolumeLayer::Base, self.show_base);

        info!(
            dimensions = ?dataset.dimensions(),
            scalar_range = ?dataset.scalar_range(),
            "base volume set"
        );
        self.base = Some(VolumeActor::new(dataset, property));
        self.reset_camera();
        self.redraw();
    }

    /// Loads a label volume for the current case. Fails without touching the
    /// file when there is no base volume.
    pub fn load_label<V: VolumeSource + ?Sized>(
        &mut self,
        source: &V,
        path: impl AsRef<Path>,
    ) -> Result<(), ViewerError> {
        if self.base.is_none() {
            return Err(ViewerError::NoBaseDataset);
        }
        let dataset = source.load(path.as_ref())?;
        self.set_label_dataset(dataset)
    }

    /// Overlays `dataset` on the base volume and puts the liver opacity back
    /// to its default.
    pub fn set_label_dataset(
        &mut self,
        dataset: impl Into<Arc<VolumeDataset>>,
    ) -> Result<(), ViewerError> {
        if self.base.is_none() {
            return Err(ViewerError::NoBaseDataset);
        }
        let dataset = dataset.into();
        self.opacity = LabelOpacityState::new(self.config.opacity.default_liver_opacity);

        let property = label_volume_property(self.opacity);
        self.ray_caster
            .set_input(VolumeLayer::Label, dataset.clone(), &property);
        self.ray_caster
            .set_visibility(VolumeLayer::Label, self.show_label);
        info!(
            dimensions = ?dataset.dimensions(),
            scalar_range = ?dataset.scalar_range(),
            "label volume set"
        );
        self.label = Some(VolumeActor::new(dataset, property));

        // Rebuild the slice views so they pick up the new label planes.
        if self.mpr.is_some() {
            self.exit_mpr();
            self.enter_mpr()?;
        }
        self.reset_camera();
        self.redraw();
        Ok(())
    }

    /// Returns whether MPR is active afterwards.
    pub fn toggle_mpr(&mut self) -> Result<bool, ViewerError> {
        if self.mpr.is_some() {
            self.exit_mpr();
        } else {
            self.enter_mpr()?;
        }
        Ok(self.mpr.is_some())
    }

    /// Splits the surface into the four-up layout. Does nothing when MPR is
    /// already active.
    pub fn enter_mpr(&mut self) -> Result<(), ViewerError> {
        if self.mpr.is_some() {
            return Ok(());
        }
        let mut session = MprSession::enter(
            &mut self.surface,
            self.main_viewport,
            self.base.as_ref().map(|a| a.dataset.clone()),
            self.label.as_ref().map(|a| a.dataset.clone()),
            self.opacity,
            &self.config,
        )?;
        session.set_layer_visibility(self.show_base, self.show_label);
        self.mpr = Some(session);
        self.controller.set_mode(InteractionMode::MprSlice);
        self.redraw();
        Ok(())
    }

    pub fn exit_mpr(&mut self) {
        let Some(session) = self.mpr.take() else {
            return;
        };
        session.exit(&mut self.surface);
        self.controller.set_mode(InteractionMode::FreeCamera);
        self.redraw();
    }

    /// Sets the liver opacity of both the slice LUT and the 3D label volume,
    /// clamped into `[0, 1]`. Returns the value applied.
    pub fn set_liver_opacity(&mut self, value: f64) -> f64 {
        if self.opacity.set_liver_opacity(value) {
            if let Some(label) = &mut self.label {
                apply_liver_opacity(&mut label.property, self.opacity);
            }
            if let Some(session) = &mut self.mpr {
                session.set_liver_opacity(self.opacity);
            }
            debug!(opacity = self.opacity.liver_opacity(), "liver opacity");
            self.redraw();
        }
        self.opacity.liver_opacity()
    }

    /// Density of the CT volume in the 3D view; values at or below zero are
    /// raised to the configured floor. Returns the factor applied.
    pub fn set_ct_opacity_factor(&mut self, value: f64) -> f64 {
        let floor = self.config.opacity.ct_opacity_floor;
        self.ct_opacity_factor = clamp_opacity_factor(value, floor);
        if let Some(base) = &mut self.base {
            base.property
                .set_scalar_opacity_unit_distance(opacity_factor_to_unit_distance(value, floor));
        }
        debug!(factor = self.ct_opacity_factor, "CT opacity factor");
        self.redraw();
        self.ct_opacity_factor
    }

    /// Shows or hides each layer in the 3D view and on the slice planes.
    pub fn set_layer_visibility(&mut self, show_base: bool, show_label: bool) {
        self.show_base = show_base;
        self.show_label = show_label;
        if self.base.is_some() {
            self.ray_caster.set_visibility(VolumeLayer::Base, show_base);
        }
        if self.label.is_some() {
            self.ray_caster.set_visibility(VolumeLayer::Label, show_label);
        }
        if let Some(session) = &mut self.mpr {
            session.set_layer_visibility(show_base, show_label);
        }
        self.redraw();
    }

    /// Drops both volumes and puts every setting back to its default.
    pub fn close_case(&mut self) {
        self.exit_mpr();
        if self.base.take().is_some() {
            self.ray_caster.remove(VolumeLayer::Base);
        }
        if self.label.take().is_some() {
            self.ray_caster.remove(VolumeLayer::Label);
        }
        self.opacity = LabelOpacityState::new(self.config.opacity.default_liver_opacity);
        self.ct_opacity_factor = clamp_opacity_factor(
            self.config.opacity.default_ct_opacity_factor,
            self.config.opacity.ct_opacity_floor,
        );
        self.show_base = true;
        self.show_label = true;
        info!("case closed");
        self.redraw();
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface.resize(width, height);
        self.redraw();
    }

    pub fn handle_event(&mut self, event: InputEvent) -> EventOutcome {
        let bounds = self.scene_bounds();
        let outcome = self
            .controller
            .handle(event, &mut self.surface, self.mpr.as_mut(), bounds);
        if outcome.needs_redraw() {
            self.redraw();
        }
        outcome
    }

    /// Current base slice of the `orientation` view while MPR is active.
    pub fn slice_index(&self, orientation: Orientation) -> Option<usize> {
        Some(self.mpr.as_ref()?.pair(orientation)?.base_slice_index())
    }

    /// Label slice shown alongside the base slice of the `orientation` view.
    pub fn label_slice_index(&self, orientation: Orientation) -> Option<usize> {
        self.mpr.as_ref()?.pair(orientation)?.label_slice_index()
    }

    /// Moves the `orientation` view to `index`, clamped. `None` when MPR is
    /// off or that view has no planes.
    pub fn set_slice_index(&mut self, orientation: Orientation, index: i64) -> Option<usize> {
        let session = self.mpr.as_mut()?;
        let viewport = session.viewport_for(orientation)?;
        let applied = session.set_slice_index(&mut self.surface, viewport, index)?;
        self.redraw();
        Some(applied)
    }

    /// Union of the bounds of every loaded volume.
    pub fn scene_bounds(&self) -> Option<[f64; 6]> {
        let mut volumes = self.base.iter().chain(self.label.iter());
        let first = volumes.next()?.dataset.bounds();
        Some(volumes.fold(first, |acc, actor| {
            let b = actor.dataset.bounds();
            [
                acc[0].min(b[0]),
                acc[1].max(b[1]),
                acc[2].min(b[2]),
                acc[3].max(b[3]),
                acc[4].min(b[4]),
                acc[5].max(b[5]),
            ]
        }))
    }

    fn reset_camera(&mut self) {
        let Some(bounds) = self.scene_bounds() else {
            return;
        };
        if let Some(vp) = self.surface.viewport_mut(self.main_viewport) {
            vp.camera.reset(bounds);
        }
    }

    /// Hands changed properties to the ray caster, then draws.
    fn redraw(&mut self) {
        for (layer, actor) in [
            (VolumeLayer::Base, &mut self.base),
            (VolumeLayer::Label, &mut self.label),
        ] {
            if let Some(actor) = actor {
                if actor.is_dirty() {
                    self.ray_caster.update_property(layer, &actor.property);
                    actor.submitted = actor.property.modified();
                }
            }
        }
        self.surface.render();
    }
}
