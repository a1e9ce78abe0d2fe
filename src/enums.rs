use serde::{Deserialize, Serialize};

/// Anatomical slicing axis. The discriminant is the world axis the plane
/// is perpendicular to (x = 0, y = 1, z = 2).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Orientation {
    Sagittal = 0,
    Coronal = 1,
    Axial = 2,
}

impl Orientation {
    /// Order in which the MPR views are built and laid out.
    pub const ALL: [Orientation; 3] = [
        Orientation::Axial,
        Orientation::Coronal,
        Orientation::Sagittal,
    ];

    /// Index into (x, y, z) ordered dimensions, spacing and bounds.
    pub fn axis(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Orientation::Axial => "Axial",
            Orientation::Coronal => "Coronal",
            Orientation::Sagittal => "Sagittal",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interpolation {
    #[default]
    Linear,
    None,
}

#[derive(Clone, Copy, Debug, Default)]
pub enum SortBy {
    #[default]
    ImagePositionPatient,
    TablePosition,
    InstanceNumber,
    None,
}

/// The two volumes of a case.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VolumeLayer {
    Base,
    Label,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollDirection {
    Forward,
    Backward,
}

impl ScrollDirection {
    pub fn sign(self) -> i64 {
        match self {
            ScrollDirection::Forward => 1,
            ScrollDirection::Backward => -1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Primary,
    Middle,
    Secondary,
}
