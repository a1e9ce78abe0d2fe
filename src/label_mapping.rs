//! Label colouring shared by the 2D slice views and the 3D volume.
//!
//! One opacity value drives two structurally different representations:
//!
//! - a discrete [`LabelLut`] used to texture label slices, and
//! - continuous opacity/colour curves used to ray-cast the label volume.
//!
//! Both are pure functions of the label scalar range and a
//! [`LabelOpacityState`]; updating the opacity touches only the liver entry
//! of the LUT and the opacity curve of the 3D property.

use crate::transfer_function::{ColorTransferFunction, PiecewiseFunction, VolumeProperty};

pub const DEFAULT_LIVER_OPACITY: f64 = 0.6;
pub const DEFAULT_TUMOR_ALPHA: f64 = 0.6;

/// Highest scalar value still treated as a binary (single label) mask.
pub const BINARY_MASK_MAX: f64 = 1.0;

const BACKGROUND_RGBA: [f64; 4] = [0.0, 0.0, 0.0, 0.0];
const BINARY_LABEL_RGB: [f64; 3] = [1.0, 0.8, 0.0];
const LIVER_RGB: [f64; 3] = [0.0, 1.0, 0.0];
const TUMOR_RGB: [f64; 3] = [1.0, 0.0, 0.0];

/// Liver opacity shared by both label pipelines, always within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelOpacityState {
    liver_opacity: f64,
}

impl Default for LabelOpacityState {
    fn default() -> Self {
        Self {
            liver_opacity: DEFAULT_LIVER_OPACITY,
        }
    }
}

impl LabelOpacityState {
    pub fn new(liver_opacity: f64) -> Self {
        Self {
            liver_opacity: clamp_unit(liver_opacity),
        }
    }

    pub fn liver_opacity(&self) -> f64 {
        self.liver_opacity
    }

    /// Returns whether the stored value changed.
    pub fn set_liver_opacity(&mut self, value: f64) -> bool {
        let value = clamp_unit(value);
        let changed = value != self.liver_opacity;
        self.liver_opacity = value;
        changed
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Label cardinality inferred from the scalar range of the mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskKind {
    /// Background and one label.
    Binary,
    /// Background, liver (1) and tumor (2).
    TwoClass,
}

impl MaskKind {
    pub fn from_scalar_range((_, max): (f32, f32)) -> Self {
        if f64::from(max) <= BINARY_MASK_MAX {
            MaskKind::Binary
        } else {
            MaskKind::TwoClass
        }
    }
}

/// Discrete label value → RGBA table.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelLut {
    kind: MaskKind,
    range: (f64, f64),
    entries: Vec<[f64; 4]>,
}

impl LabelLut {
    pub const BACKGROUND: usize = 0;
    pub const LIVER: usize = 1;
    pub const TUMOR: usize = 2;

    pub fn build(scalar_range: (f32, f32), opacity: LabelOpacityState, tumor_alpha: f64) -> Self {
        let kind = MaskKind::from_scalar_range(scalar_range);
        let alpha = opacity.liver_opacity();
        let (range, entries) = match kind {
            MaskKind::Binary => {
                let [r, g, b] = BINARY_LABEL_RGB;
                ((0.0, 1.0), vec![BACKGROUND_RGBA, [r, g, b, alpha]])
            }
            MaskKind::TwoClass => {
                let [lr, lg, lb] = LIVER_RGB;
                let [tr, tg, tb] = TUMOR_RGB;
                (
                    (0.0, 2.0),
                    vec![
                        BACKGROUND_RGBA,
                        [lr, lg, lb, alpha],
                        [tr, tg, tb, clamp_unit(tumor_alpha)],
                    ],
                )
            }
        };
        Self {
            kind,
            range,
            entries,
        }
    }

    pub fn kind(&self) -> MaskKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[[f64; 4]] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<[f64; 4]> {
        self.entries.get(index).copied()
    }

    /// Recolours the liver entry in place. No other entry is touched.
    pub fn set_liver_opacity(&mut self, opacity: LabelOpacityState) {
        if let Some(entry) = self.entries.get_mut(Self::LIVER) {
            entry[3] = opacity.liver_opacity();
        }
    }

    /// Table index for a scalar: the range is split into `len()` equal bins,
    /// values outside the range land in the first or last bin.
    pub fn index_of(&self, value: f32) -> usize {
        let n = self.entries.len();
        let (min, max) = self.range;
        let value = f64::from(value);
        if n == 0 || value.is_nan() || value <= min {
            return 0;
        }
        let bin = ((value - min) / (max - min) * n as f64).floor();
        (bin as usize).min(n - 1)
    }

    pub fn map_value(&self, value: f32) -> [f64; 4] {
        self.entry(self.index_of(value)).unwrap_or(BACKGROUND_RGBA)
    }

    pub fn map_value_u8(&self, value: f32) -> [u8; 4] {
        self.map_value(value)
            .map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8)
    }
}

/// Opacity curve of the label volume.
///
/// Bands: background `[0, 0.4]` transparent, liver `[0.5, 1.4]` at the liver
/// opacity, a transparent gap `[1.45, 1.55]` so interpolation between labels
/// 1 and 2 never produces a visible shell, tumor `[1.6, 2.5]` opaque.
pub fn label_opacity_curve(opacity: LabelOpacityState) -> PiecewiseFunction {
    let liver = opacity.liver_opacity();
    PiecewiseFunction::new()
        .with_point(0.0, 0.0)
        .with_point(0.4, 0.0)
        .with_point(0.5, liver)
        .with_point(1.4, liver)
        .with_point(1.45, 0.0)
        .with_point(1.55, 0.0)
        .with_point(1.6, 1.0)
        .with_point(2.5, 1.0)
}

pub fn label_color_curve() -> ColorTransferFunction {
    let [lr, lg, lb] = LIVER_RGB;
    let [tr, tg, tb] = TUMOR_RGB;
    ColorTransferFunction::new()
        .with_rgb_point(0.0, 0.0, 0.0, 0.0)
        .with_rgb_point(0.5, lr, lg, lb)
        .with_rgb_point(1.4, lr, lg, lb)
        .with_rgb_point(1.6, tr, tg, tb)
        .with_rgb_point(2.5, tr, tg, tb)
}

pub fn build_transfer_function(
    opacity: LabelOpacityState,
) -> (PiecewiseFunction, ColorTransferFunction) {
    (label_opacity_curve(opacity), label_color_curve())
}

/// 3D property of the label volume.
pub fn label_volume_property(opacity: LabelOpacityState) -> VolumeProperty {
    let (scalar_opacity, color) = build_transfer_function(opacity);
    let mut property = VolumeProperty::new(scalar_opacity, color);
    property.shade = true;
    property.ambient = 0.3;
    property.diffuse = 1.0;
    property.specular = 0.2;
    property
}

/// Rebuilds only the opacity curve of an existing label property; the
/// colour curve is independent of the liver opacity.
pub fn apply_liver_opacity(property: &mut VolumeProperty, opacity: LabelOpacityState) {
    property.set_scalar_opacity(label_opacity_curve(opacity));
}
