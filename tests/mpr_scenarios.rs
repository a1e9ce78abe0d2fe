use std::sync::{Arc, OnceLock};

use ndarray::Array3;
use volume_mpr::{
    EventOutcome, HeadlessRayCaster, HeadlessSurface, InputEvent, InteractionMode, LabelLut,
    MaskKind, Orientation, RenderSurface, ScrollDirection, Viewer, ViewerConfig, ViewerError,
    VolumeDataset, VolumeLayer,
};

type TestViewer = Viewer<HeadlessSurface, HeadlessRayCaster>;

/// 512 x 512 x 300 CT-sized volume, shared because it is large.
fn full_size_base() -> Arc<VolumeDataset> {
    static BASE: OnceLock<Arc<VolumeDataset>> = OnceLock::new();
    BASE.get_or_init(|| {
        let mut data = Array3::zeros((300, 512, 512));
        data[[0, 0, 0]] = -1000.0;
        data[[299, 511, 511]] = 1500.0;
        Arc::new(VolumeDataset::new(data, [0.7, 0.7, 2.5], [0.0; 3]))
    })
    .clone()
}

fn small_volume(x: usize, y: usize, z: usize, fill: f32) -> VolumeDataset {
    VolumeDataset::new(Array3::from_elem((z, y, x), fill), [1.0; 3], [0.0; 3])
}

fn viewer() -> TestViewer {
    Viewer::new(
        HeadlessSurface::new(1000, 1000),
        HeadlessRayCaster::new(),
        ViewerConfig::default(),
    )
}

/// Pixel position at the centre of the slice view for `orientation`.
fn view_center(viewer: &TestViewer, orientation: Orientation) -> (f64, f64) {
    let id = viewer
        .mpr_session()
        .and_then(|s| s.viewport_for(orientation))
        .expect("slice view exists");
    let rect = viewer.surface().viewport(id).expect("viewport").rect;
    let (w, h) = viewer.surface().size();
    (
        (rect.xmin + rect.xmax) * 0.5 * f64::from(w),
        (rect.ymin + rect.ymax) * 0.5 * f64::from(h),
    )
}

fn scroll(position: (f64, f64), modifier: bool) -> InputEvent {
    InputEvent::Scroll {
        position,
        direction: ScrollDirection::Forward,
        modifier,
    }
}

#[test]
fn scrolling_the_axial_view() {
    let mut viewer = viewer();
    viewer.set_base_dataset(full_size_base());
    viewer.enter_mpr().expect("base is loaded");
    assert_eq!(viewer.slice_index(Orientation::Axial), Some(150));

    let axial = view_center(&viewer, Orientation::Axial);
    viewer.handle_event(scroll(axial, false));
    assert_eq!(viewer.slice_index(Orientation::Axial), Some(151));

    viewer.handle_event(scroll(axial, true));
    assert_eq!(viewer.slice_index(Orientation::Axial), Some(161));

    for _ in 0..20 {
        viewer.handle_event(scroll(axial, true));
    }
    assert_eq!(viewer.slice_index(Orientation::Axial), Some(299));

    // The other views did not move.
    assert_eq!(viewer.slice_index(Orientation::Coronal), Some(256));
    assert_eq!(viewer.slice_index(Orientation::Sagittal), Some(256));
}

#[test]
fn label_index_clamps_to_label_extent() {
    let mut viewer = viewer();
    viewer.set_base_dataset(full_size_base());
    viewer
        .set_label_dataset(small_volume(256, 256, 150, 1.0))
        .expect("base is loaded");
    viewer.enter_mpr().expect("base is loaded");

    assert_eq!(viewer.set_slice_index(Orientation::Axial, 299), Some(299));
    assert_eq!(viewer.label_slice_index(Orientation::Axial), Some(149));

    assert_eq!(viewer.set_slice_index(Orientation::Axial, 40), Some(40));
    assert_eq!(viewer.label_slice_index(Orientation::Axial), Some(40));

    assert_eq!(viewer.set_slice_index(Orientation::Coronal, 1_000), Some(511));
    assert_eq!(viewer.label_slice_index(Orientation::Coronal), Some(255));
}

#[test]
fn binary_mask_lut_follows_liver_opacity() {
    let lut = LabelLut::build((0.0, 1.0), Default::default(), 0.6);
    assert_eq!(lut.kind(), MaskKind::Binary);
    assert_eq!(lut.len(), 2);

    let mut viewer = viewer();
    viewer.set_base_dataset(small_volume(8, 8, 8, 0.0));
    let mut label = Array3::zeros((8, 8, 8));
    label[[4, 4, 4]] = 1.0;
    viewer
        .set_label_dataset(VolumeDataset::new(label, [1.0; 3], [0.0; 3]))
        .expect("base is loaded");
    viewer.enter_mpr().expect("base is loaded");
    viewer.set_liver_opacity(0.3);

    let lut = viewer
        .mpr_session()
        .and_then(|s| s.lut())
        .expect("label LUT");
    assert_eq!(lut.len(), 2);
    assert_eq!(lut.entry(1).map(|e| e[3]), Some(0.3));
    assert_eq!(lut.entry(0).map(|e| e[3]), Some(0.0));

    viewer.set_liver_opacity(1.0);
    let lut = viewer
        .mpr_session()
        .and_then(|s| s.lut())
        .expect("label LUT");
    assert_eq!(lut.entry(0).map(|e| e[3]), Some(0.0));
}

#[test]
fn liver_opacity_survives_mpr_toggle() {
    let mut viewer = viewer();
    viewer.set_base_dataset(small_volume(10, 10, 10, 0.0));
    viewer
        .set_label_dataset(small_volume(10, 10, 10, 2.0))
        .expect("base is loaded");

    assert!(viewer.toggle_mpr().expect("base is loaded"));
    viewer.set_liver_opacity(0.35);
    assert!(!viewer.toggle_mpr().expect("exit never fails"));
    assert!(viewer.toggle_mpr().expect("base is loaded"));

    assert_eq!(viewer.liver_opacity(), 0.35);
    let session = viewer.mpr_session().expect("session");
    assert_eq!(session.opacity().liver_opacity(), 0.35);
    assert_eq!(session.lut().and_then(|l| l.entry(1)).map(|e| e[3]), Some(0.35));
    assert_eq!(session.lut().and_then(|l| l.entry(2)).map(|e| e[3]), Some(0.6));
}

#[test]
fn entering_mpr_without_base_keeps_3d_view() {
    let mut viewer = viewer();
    let err = viewer.enter_mpr().expect_err("nothing loaded");
    assert!(matches!(err, ViewerError::NoBaseDataset));
    assert_eq!(err.to_string(), "no base dataset loaded");
    assert!(!viewer.is_mpr_active());
    assert_eq!(viewer.surface().viewport_count(), 1);
    assert!(viewer.toggle_mpr().is_err());
    assert!(viewer.ray_caster().input(VolumeLayer::Base).is_none());
}

#[test]
fn exiting_mpr_gives_3d_view_the_whole_surface() {
    let mut viewer = viewer();
    viewer.set_base_dataset(small_volume(6, 6, 6, 0.0));
    viewer.enter_mpr().expect("base is loaded");
    assert_eq!(viewer.surface().viewport_count(), 4);
    let rect = viewer
        .surface()
        .viewport(viewer.main_viewport())
        .expect("main viewport")
        .rect;
    assert!(rect.xmin > 0.5 && rect.ymax < 0.5);

    viewer.exit_mpr();
    assert_eq!(viewer.surface().viewport_count(), 1);
    let rect = viewer
        .surface()
        .viewport(viewer.main_viewport())
        .expect("main viewport")
        .rect;
    assert_eq!((rect.xmin, rect.ymin, rect.xmax, rect.ymax), (0.0, 0.0, 1.0, 1.0));
}

#[test]
fn scrolling_after_exit_zooms_the_3d_view() {
    let mut viewer = viewer();
    viewer.set_base_dataset(small_volume(6, 6, 6, 0.0));
    viewer.enter_mpr().expect("base is loaded");
    assert_eq!(viewer.interaction_mode(), InteractionMode::MprSlice);
    let axial = view_center(&viewer, Orientation::Axial);

    viewer.exit_mpr();
    assert_eq!(viewer.interaction_mode(), InteractionMode::FreeCamera);

    let main = viewer.main_viewport();
    let camera = |viewer: &TestViewer| {
        viewer
            .surface()
            .viewport(main)
            .expect("main viewport")
            .camera
            .clone()
    };
    let before = camera(&viewer);
    let outcome = viewer.handle_event(scroll(axial, false));
    assert_eq!(outcome, EventOutcome::CameraChanged { viewport: main });
    assert_ne!(camera(&viewer), before);
    assert_eq!(viewer.slice_index(Orientation::Axial), None);

    viewer.enter_mpr().expect("base is loaded");
    assert_eq!(viewer.slice_index(Orientation::Axial), Some(3));
}

#[test]
fn visibility_set_before_mpr_applies_to_new_planes() {
    let mut viewer = viewer();
    viewer.set_base_dataset(small_volume(6, 6, 6, 0.0));
    viewer
        .set_label_dataset(small_volume(6, 6, 6, 1.0))
        .expect("base is loaded");
    viewer.set_layer_visibility(true, false);
    viewer.enter_mpr().expect("base is loaded");

    assert_eq!(viewer.layer_visibility(), (true, false));
    let session = viewer.mpr_session().expect("session");
    for orientation in Orientation::ALL {
        assert!(session.base_texture(orientation).is_some());
        assert!(session.label_texture(orientation).is_none());
    }

    viewer.set_layer_visibility(true, true);
    let session = viewer.mpr_session().expect("session");
    assert!(session.label_texture(Orientation::Axial).is_some());
}

#[test]
fn two_class_label_texture_colours() {
    let mut viewer = viewer();
    viewer.set_base_dataset(small_volume(4, 4, 4, 0.0));
    let mut label = Array3::zeros((4, 4, 4));
    label.slice_mut(ndarray::s![2, .., ..]).fill(1.0);
    label.slice_mut(ndarray::s![3, .., ..]).fill(2.0);
    viewer
        .set_label_dataset(VolumeDataset::new(label, [1.0; 3], [0.0; 3]))
        .expect("base is loaded");
    viewer.enter_mpr().expect("base is loaded");

    let texture = |viewer: &TestViewer| {
        viewer
            .mpr_session()
            .and_then(|s| s.label_texture(Orientation::Axial))
            .expect("label texture")
    };

    // Middle axial slice is 2: liver everywhere.
    assert_eq!(texture(&viewer).get_pixel(1, 1).0, [0, 255, 0, 153]);

    viewer.set_slice_index(Orientation::Axial, 3);
    assert_eq!(texture(&viewer).get_pixel(1, 1).0, [255, 0, 0, 153]);

    viewer.set_liver_opacity(0.0);
    assert_eq!(texture(&viewer).get_pixel(1, 1).0, [255, 0, 0, 153]);
    viewer.set_slice_index(Orientation::Axial, 0);
    assert_eq!(texture(&viewer).get_pixel(1, 1).0[3], 0);
}
