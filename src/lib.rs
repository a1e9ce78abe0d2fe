//! # volume-mpr
//!
//! Multi-planar reconstruction (MPR) for a CT volume with an optional
//! segmentation mask on top of it.
//!
//! A case is one base (CT) volume and optionally one label volume. Both are
//! ray-cast in a 3D view; on request the surface is split into four
//! quadrants showing the axial, coronal and sagittal slices next to the
//! shrunk 3D view. In every slice view:
//!  - the base slice is drawn as an 8-bit grey texture,
//!  - the label slice is drawn through a discrete lookup table on a second
//!    plane placed just in front of it,
//!  - scrolling moves the slice, with a modifier key moving ten at a time.
//!
//! Label volumes with a maximum of at most 1.0 are treated as binary masks,
//! anything above as liver (1) plus tumor (2). A single liver opacity value
//! drives both the slice lookup table and the 3D transfer function.
//!
//! The crate does not draw. It arranges viewports and cameras on a
//! [`RenderSurface`] and hands volumes with their transfer functions to a
//! [`VolumeRayCaster`]; [`HeadlessSurface`] and [`HeadlessRayCaster`] are
//! in-memory stand-ins for batch export and tests.
//!
//! Volumes are read from a directory of DICOM files or a NIfTI file. Label
//! and base volumes may have different dimensions; the label slice index is
//! the base index clamped to the label volume's extent.
//!
//! # Examples
//!
//! ```no_run
//! # use volume_mpr::{HeadlessRayCaster, HeadlessSurface, NiftiSource, Orientation, Viewer, ViewerConfig};
//! let mut viewer = Viewer::new(
//!     HeadlessSurface::new(1024, 1024),
//!     HeadlessRayCaster::new(),
//!     ViewerConfig::default(),
//! );
//! viewer.load_base(&NiftiSource, "case/ct.nii.gz").expect("should have loaded the CT");
//! viewer.load_label(&NiftiSource, "case/mask.nii.gz").expect("should have loaded the mask");
//! viewer.enter_mpr().expect("base volume is loaded");
//! viewer.set_liver_opacity(0.3);
//! let texture = viewer
//!     .mpr_session()
//!     .and_then(|session| session.label_texture(Orientation::Axial))
//!     .expect("should have an axial label slice");
//! texture.save("axial-label.png").expect("should have written the texture");
//! ```

pub mod camera;
pub mod config;
pub mod enums;
pub mod interaction;
mod interpolator;
pub mod label_mapping;
pub mod plane_widget;
pub mod render;
pub mod transfer_function;
pub mod view_manager;
pub mod viewer;
pub mod volume;
pub mod volume_loader;

pub use config::{ConfigError, ViewerConfig, load_config, save_config};
pub use enums::{Interpolation, MouseButton, Orientation, ScrollDirection, SortBy, VolumeLayer};
pub use interaction::{EventOutcome, InputEvent, InteractionMode};
pub use label_mapping::{LabelLut, LabelOpacityState, MaskKind};
pub use render::{
    HeadlessRayCaster, HeadlessSurface, RenderSurface, Viewport, ViewportId, ViewportRect,
    VolumeRayCaster,
};
pub use view_manager::{MprError, MprSession};
pub use viewer::{Viewer, ViewerError};
pub use volume::VolumeDataset;
pub use volume_loader::{DatasetError, DicomSource, NiftiSource, VolumeSource, source_for_path};

/// Installs a `tracing` subscriber writing to stderr. `RUST_LOG` adds to
/// the default `info` level.
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;
    Ok(())
}
