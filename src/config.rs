//! Viewer settings persisted as YAML.
//!
//! Every section falls back to its defaults field by field, so a config file
//! only needs to name the values it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::enums::Interpolation;
use crate::label_mapping::{DEFAULT_LIVER_OPACITY, DEFAULT_TUMOR_ALPHA};
use crate::plane_widget::DEFAULT_LABEL_PLANE_OFFSET;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub layout: LayoutConfig,
    pub mpr: MprConfig,
    pub opacity: OpacityConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Half the gap between neighbouring quadrants, in normalized units.
    pub viewport_gap: f64,
    pub mpr_background: [f64; 3],
    pub main_background: [f64; 3],
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            viewport_gap: 0.002,
            mpr_background: [0.1, 0.1, 0.1],
            main_background: [0.05, 0.05, 0.05],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MprConfig {
    pub label_plane_offset: f64,
    /// Slice camera distance as a multiple of the largest volume extent.
    pub camera_distance_factor: f64,
    /// Slices per scroll notch while the modifier key is held.
    pub fast_scroll_step: u32,
    pub slice_interpolation: Interpolation,
}

impl Default for MprConfig {
    fn default() -> Self {
        Self {
            label_plane_offset: DEFAULT_LABEL_PLANE_OFFSET,
            camera_distance_factor: 1.5,
            fast_scroll_step: 10,
            slice_interpolation: Interpolation::Linear,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpacityConfig {
    pub default_liver_opacity: f64,
    pub tumor_alpha: f64,
    pub default_ct_opacity_factor: f64,
    pub ct_opacity_floor: f64,
}

impl Default for OpacityConfig {
    fn default() -> Self {
        Self {
            default_liver_opacity: DEFAULT_LIVER_OPACITY,
            tumor_alpha: DEFAULT_TUMOR_ALPHA,
            default_ct_opacity_factor: 1.0,
            ct_opacity_floor: 0.01,
        }
    }
}

impl ViewerConfig {
    /// Rejects values that would break the MPR layout or the opacity mapping.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let gap = self.layout.viewport_gap;
        if !(0.0..0.25).contains(&gap) {
            return Err(invalid("layout.viewport_gap", gap, "must be in [0, 0.25)"));
        }
        positive("mpr.label_plane_offset", self.mpr.label_plane_offset)?;
        positive("mpr.camera_distance_factor", self.mpr.camera_distance_factor)?;
        if self.mpr.fast_scroll_step == 0 {
            return Err(ConfigError::Invalid(
                "mpr.fast_scroll_step must be at least 1".to_string(),
            ));
        }
        unit_interval("opacity.default_liver_opacity", self.opacity.default_liver_opacity)?;
        unit_interval("opacity.tumor_alpha", self.opacity.tumor_alpha)?;
        positive("opacity.default_ct_opacity_factor", self.opacity.default_ct_opacity_factor)?;
        positive("opacity.ct_opacity_floor", self.opacity.ct_opacity_floor)
    }
}

fn invalid(field: &str, value: f64, rule: &str) -> ConfigError {
    ConfigError::Invalid(format!("{field} = {value} {rule}"))
}

fn positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, value, "must be positive"))
    }
}

fn unit_interval(field: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, value, "must be in [0, 1]"))
    }
}

/// Reads and validates `path`; a missing file gives the defaults.
pub fn load_config(path: &Path) -> Result<ViewerConfig, ConfigError> {
    if !path.exists() {
        warn!(?path, "config file not found, using defaults");
        return Ok(ViewerConfig::default());
    }
    let contents = std::fs::read_to_string(path)?;
    let config: ViewerConfig = serde_yaml::from_str(&contents)?;
    config.validate()?;
    info!(?path, "loaded config");
    Ok(config)
}

/// Writes `config` to `path`, creating parent directories as needed.
pub fn save_config(config: &ViewerConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_yaml::to_string(config)?)?;
    info!(?path, "saved config");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let config = load_config(Path::new("/nonexistent/volume-mpr.yaml")).unwrap();
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.yaml");
        std::fs::write(&path, "mpr:\n  fast_scroll_step: 5\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.mpr.fast_scroll_step, 5);
        assert_eq!(config.mpr.camera_distance_factor, 1.5);
        assert_eq!(config.layout, LayoutConfig::default());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.yaml");
        std::fs::write(&path, "mpr: [not, a, map").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn defaults_are_valid() {
        assert!(ViewerConfig::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viewer.yaml");
        for yaml in [
            "opacity:\n  ct_opacity_floor: 0.0\n",
            "mpr:\n  label_plane_offset: -0.1\n",
            "mpr:\n  camera_distance_factor: 0.0\n",
            "mpr:\n  camera_distance_factor: -1.5\n",
            "layout:\n  viewport_gap: 0.5\n",
            "layout:\n  viewport_gap: -0.01\n",
            "mpr:\n  fast_scroll_step: 0\n",
            "opacity:\n  tumor_alpha: 1.5\n",
        ] {
            std::fs::write(&path, yaml).unwrap();
            let err = load_config(&path).expect_err(yaml);
            assert!(matches!(err, ConfigError::Invalid(_)), "{yaml}: {err}");
        }
    }

    #[test]
    fn rejection_names_the_field() {
        let mut config = ViewerConfig::default();
        config.opacity.ct_opacity_floor = 0.0;
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid config value: opacity.ct_opacity_floor = 0 must be positive"
        );
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("viewer.yaml");
        let mut config = ViewerConfig::default();
        config.opacity.default_liver_opacity = 0.25;
        config.mpr.slice_interpolation = Interpolation::None;

        save_config(&config, &path).unwrap();
        assert_eq!(load_config(&path).unwrap(), config);
    }
}
