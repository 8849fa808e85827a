// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Engine settings
//!
//! Settings are plain serde data. Out-of-range values read from JSON are
//! clamped rather than rejected; malformed JSON is an error.

use crate::coplanar::DEFAULT_COPLANAR_ANGLE;
use crate::hull::DEFAULT_DISSOLVE_ANGLE;
use crate::raycast::RaycastCacheConfig;
use crate::snap::{DEFAULT_SNAP_THRESHOLD, SNAP_THRESHOLD_STEP};
use crate::sphere::{DEFAULT_RINGS, DEFAULT_SEGMENTS};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Accepted push range
pub const PUSH_RANGE: (f64, f64) = (-1.0, 1.0);

/// Names given to created volume objects
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeNames {
    pub bounding_box: String,
    pub convex_hull: String,
    pub sphere: String,
}

impl Default for VolumeNames {
    fn default() -> Self {
        Self {
            bounding_box: "BBox".to_string(),
            convex_hull: "ConvexHull".to_string(),
            sphere: "BSphere".to_string(),
        }
    }
}

/// Raycast cache tuning, serialisable form of [`RaycastCacheConfig`]
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaycastSettings {
    pub capacity: usize,
    /// Pixels
    pub mouse_threshold: f64,
    pub time_window_ms: u64,
}

impl Default for RaycastSettings {
    fn default() -> Self {
        let config = RaycastCacheConfig::default();
        Self {
            capacity: config.capacity,
            mouse_threshold: config.mouse_threshold,
            time_window_ms: config.time_window.as_millis() as u64,
        }
    }
}

impl From<RaycastSettings> for RaycastCacheConfig {
    fn from(s: RaycastSettings) -> Self {
        RaycastCacheConfig {
            capacity: s.capacity,
            mouse_threshold: s.mouse_threshold,
            time_window: Duration::from_millis(s.time_window_ms),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Signed offset applied to created volumes
    pub push: f64,
    /// Coplanar selection tolerance in degrees
    pub coplanar_angle: f64,
    /// Hull face merge tolerance in degrees
    pub dissolve_angle: f64,
    pub sphere_segments: u32,
    pub sphere_rings: u32,
    /// Snap radius in pixels
    pub snap_threshold: f64,
    pub raycast: RaycastSettings,
    pub box_cache_capacity: usize,
    pub names: VolumeNames,
    /// Collection receiving created and imported objects
    pub collection: String,
    /// Display colour of created objects (linear RGB)
    pub color: [f32; 3],
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            push: 0.01,
            coplanar_angle: DEFAULT_COPLANAR_ANGLE,
            dissolve_angle: DEFAULT_DISSOLVE_ANGLE,
            sphere_segments: DEFAULT_SEGMENTS,
            sphere_rings: DEFAULT_RINGS,
            snap_threshold: DEFAULT_SNAP_THRESHOLD,
            raycast: RaycastSettings::default(),
            box_cache_capacity: crate::oriented_box::BOX_CACHE_CAPACITY,
            names: VolumeNames::default(),
            collection: "CursorBBox".to_string(),
            color: [1.0, 0.58, 0.231],
        }
    }
}

impl EngineSettings {
    /// Coarser meshes and looser merging for slow machines
    pub fn fast() -> Self {
        Self {
            dissolve_angle: 10.0,
            sphere_segments: 16,
            sphere_rings: 8,
            ..Self::default()
        }
    }

    /// Finer meshes and tighter merging
    pub fn precise() -> Self {
        Self {
            dissolve_angle: 1.0,
            sphere_segments: 64,
            sphere_rings: 32,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self =
            serde_json::from_str(json).map_err(|e| Error::Settings(e.to_string()))?;
        Ok(settings.sanitized())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Settings(e.to_string()))
    }

    /// Set the push, clamped to [`PUSH_RANGE`]
    pub fn set_push(&mut self, push: f64) {
        self.push = clamp_push_setting(push);
    }

    pub fn raycast_config(&self) -> RaycastCacheConfig {
        self.raycast.into()
    }

    /// Clamp every field into its accepted range
    pub fn sanitized(mut self) -> Self {
        self.push = clamp_push_setting(self.push);
        self.coplanar_angle = sanitize_angle(self.coplanar_angle);
        self.dissolve_angle = sanitize_angle(self.dissolve_angle);
        self.sphere_segments = self.sphere_segments.max(3);
        self.sphere_rings = self.sphere_rings.max(2);
        if self.snap_threshold.is_nan() || self.snap_threshold < SNAP_THRESHOLD_STEP {
            self.snap_threshold = SNAP_THRESHOLD_STEP;
        }
        self.raycast.capacity = self.raycast.capacity.max(1);
        self.box_cache_capacity = self.box_cache_capacity.max(1);
        for c in &mut self.color {
            *c = c.clamp(0.0, 1.0);
        }
        self
    }
}

fn clamp_push_setting(push: f64) -> f64 {
    if push.is_finite() {
        push.clamp(PUSH_RANGE.0, PUSH_RANGE.1)
    } else {
        0.0
    }
}

fn sanitize_angle(angle: f64) -> f64 {
    if angle.is_finite() {
        angle.clamp(0.0, 180.0)
    } else {
        DEFAULT_COPLANAR_ANGLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = EngineSettings::default();
        assert_eq!(s.push, 0.01);
        assert_eq!(s.coplanar_angle, 5.0);
        assert_eq!((s.sphere_segments, s.sphere_rings), (32, 16));
        assert_eq!(s.snap_threshold, 50.0);
        assert_eq!(s.names.bounding_box, "BBox");
        assert_eq!(s.collection, "CursorBBox");
        assert_eq!(s.raycast_config(), RaycastCacheConfig::default());
    }

    #[test]
    fn test_presets() {
        assert!(EngineSettings::fast().sphere_segments < EngineSettings::precise().sphere_segments);
        assert_eq!(EngineSettings::fast().push, EngineSettings::default().push);
    }

    #[test]
    fn test_json_round_trip() {
        let mut s = EngineSettings::precise();
        s.names.sphere = "Ball".into();
        let json = s.to_json().unwrap();
        assert_eq!(EngineSettings::from_json(&json).unwrap(), s);
    }

    #[test]
    fn test_partial_json_is_clamped() {
        let s = EngineSettings::from_json(r#"{"push": 4.0, "coplanar_angle": 400, "snap_threshold": 2}"#)
            .unwrap();
        assert_eq!(s.push, 1.0);
        assert_eq!(s.coplanar_angle, 180.0);
        assert_eq!(s.snap_threshold, 10.0);
        assert_eq!(s.sphere_segments, 32);
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(EngineSettings::from_json("{push"), Err(Error::Settings(_))));
    }

    #[test]
    fn test_set_push_clamps() {
        let mut s = EngineSettings::default();
        s.set_push(-3.0);
        assert_eq!(s.push, -1.0);
        s.set_push(f64::NAN);
        assert_eq!(s.push, 0.0);
    }
}
