//! Persistent tracer settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::{
    DirectionalLight, DriverConfig, EnvironmentHandle, FrameBackend, FrameDriver, RandomJitter, ResizePolicy,
    SnapshotDetector, MAX_BOUNCES,
};
use crate::util::{Error, Result};

/// Tracer configuration exposed to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracerSettings {
    // Kernel
    /// Maximum bounce count, 0..=15
    pub bounces: u32,
    /// WGSL kernel file; `None` uses the bundled reference kernel
    pub kernel: Option<PathBuf>,
    /// Compute entry point; `None` picks the module's only compute entry point
    pub kernel_entry_point: Option<String>,

    // Environment
    /// Equirectangular HDR/EXR sky; `None` uses a procedural gradient
    pub environment: Option<PathBuf>,
    pub environment_intensity: f32,

    // Lighting
    pub light: Option<DirectionalLight>,

    // Accumulation
    pub resize_policy: ResizePolicy,
    pub max_samples: Option<u32>,
    /// Fixed jitter seed for reproducible renders
    pub jitter_seed: Option<u64>,
    /// Matrix delta below which the camera counts as static
    pub transform_tolerance: f32,

    // Output
    pub exposure: f32,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for TracerSettings {
    fn default() -> Self {
        Self {
            bounces: 8,
            kernel: None,
            kernel_entry_point: None,
            environment: None,
            environment_intensity: 1.0,
            light: None,
            resize_policy: ResizePolicy::Reset,
            max_samples: None,
            jitter_seed: None,
            transform_tolerance: 0.0,
            exposure: 1.0,
            window_width: 1280,
            window_height: 720,
        }
    }
}

impl TracerSettings {
    /// Get settings file path
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("progressive-tracer");
            p.push("settings.json");
            p
        })
    }

    /// Load settings from the user config dir, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
                Self::default()
            }
        }
    }

    /// Load settings from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&text).map_err(|source| Error::Settings {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(settings.sanitized())
    }

    /// Save settings to the user config dir
    pub fn save(&self) -> Result<()> {
        match Self::path() {
            Some(path) => self.save_to(&path),
            None => Err(Error::missing("user config directory")),
        }
    }

    /// Save settings to an explicit file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| Error::Settings {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Clamp values into their valid ranges
    pub fn sanitized(mut self) -> Self {
        self.bounces = self.bounces.min(MAX_BOUNCES);
        if !(self.exposure.is_finite() && self.exposure > 0.0) {
            self.exposure = 1.0;
        }
        if !self.environment_intensity.is_finite() || self.environment_intensity < 0.0 {
            self.environment_intensity = 1.0;
        }
        if !self.transform_tolerance.is_finite() || self.transform_tolerance < 0.0 {
            self.transform_tolerance = 0.0;
        }
        self.window_width = self.window_width.max(1);
        self.window_height = self.window_height.max(1);
        self
    }

    /// Driver configuration for these settings
    pub fn driver_config(&self, environment: EnvironmentHandle) -> DriverConfig {
        DriverConfig {
            max_bounces: self.bounces.min(MAX_BOUNCES),
            resize_policy: self.resize_policy,
            max_samples: self.max_samples,
            light: self.light,
            environment,
        }
    }

    /// Frame driver configured from these settings.
    pub fn frame_driver<B: FrameBackend>(&self, backend: B, environment: EnvironmentHandle) -> FrameDriver<B> {
        let jitter = match self.jitter_seed {
            Some(seed) => RandomJitter::seeded(seed),
            None => RandomJitter::from_entropy(),
        };
        FrameDriver::with_parts(
            backend,
            self.driver_config(environment),
            SnapshotDetector::with_tolerance(self.transform_tolerance),
            jitter,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = TracerSettings::default();
        assert_eq!(s.bounces, 8);
        assert_eq!(s.resize_policy, ResizePolicy::Reset);
        assert!(s.kernel.is_none());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let s: TracerSettings = serde_json::from_str(r#"{ "bounces": 3 }"#).unwrap();
        assert_eq!(s.bounces, 3);
        assert_eq!(s.window_width, 1280);
        assert_eq!(s.exposure, 1.0);
    }

    #[test]
    fn test_sanitize() {
        let s = TracerSettings {
            bounces: 100,
            exposure: -2.0,
            window_width: 0,
            transform_tolerance: f32::NAN,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(s.bounces, 15);
        assert_eq!(s.exposure, 1.0);
        assert_eq!(s.window_width, 1);
        assert_eq!(s.transform_tolerance, 0.0);
    }

    #[test]
    fn test_resize_policy_names() {
        let s: TracerSettings = serde_json::from_str(r#"{ "resize_policy": "preserve" }"#).unwrap();
        assert_eq!(s.resize_policy, ResizePolicy::Preserve);
    }

    #[test]
    fn test_driver_config() {
        let s = TracerSettings {
            bounces: 4,
            max_samples: Some(256),
            ..Default::default()
        };
        let cfg = s.driver_config(EnvironmentHandle(3));
        assert_eq!(cfg.max_bounces, 4);
        assert_eq!(cfg.max_samples, Some(256));
        assert_eq!(cfg.environment, EnvironmentHandle(3));
    }
}
