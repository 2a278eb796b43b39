//! Snapping preferences

use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared::{OriginSnapping, SnapMode};

/// User preferences of the snapping tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapSettings {
    /// Elements the source point is picked from
    pub snap_source_type: SnapMode,
    /// Elements the target point is picked from
    pub snap_target_type: SnapMode,
    /// Whether origins take part in the general search
    pub snap_objects_origin: OriginSnapping,
    /// Show the hovered target object as wireframe
    pub display_target_wireframe: bool,
    /// Draw a line between source and target
    pub draw_rubberband: bool,
    /// Drop candidates hidden behind another surface
    pub filter_search_obstructed: bool,
    /// Search radius around the mouse, in pixels
    pub search_radius: f64,
    /// Origin-only search radius, in pixels
    pub origin_search_radius: f64,
    /// A candidate closer than this can be picked
    pub actionable_distance: f64,
    /// Indexing time allowed per tick, in milliseconds
    pub time_budget_ms: u64,
    /// Points copied per drain step
    pub batch_size: usize,
    /// Pixel offset of the ring of extra rays cast around the mouse
    pub ring_offset: f64,
}

impl Default for SnapSettings {
    fn default() -> Self {
        Self {
            snap_source_type: SnapMode::Points,
            snap_target_type: SnapMode::Points,
            snap_objects_origin: OriginSnapping::Always,
            display_target_wireframe: true,
            draw_rubberband: true,
            filter_search_obstructed: false,
            search_radius: 20.0,
            origin_search_radius: 40.0,
            actionable_distance: 15.0,
            time_budget_ms: 10,
            batch_size: 1000,
            ring_offset: 40.0,
        }
    }
}

impl SnapSettings {
    pub fn time_budget(&self) -> Duration {
        Duration::from_millis(self.time_budget_ms)
    }

    /// Load settings from file, or return default if not found
    pub fn load() -> Self {
        if let Some(dirs) = directories::ProjectDirs::from("com", "quicksnap", "quicksnap") {
            let config_path = dirs.config_dir().join("settings.json");
            if let Ok(json) = std::fs::read_to_string(&config_path) {
                match serde_json::from_str(&json) {
                    Ok(settings) => return settings,
                    Err(e) => tracing::warn!("Ignoring {}: {e}", config_path.display()),
                }
            }
        }
        Self::default()
    }

    /// Save settings to file
    pub fn save(&self) {
        if let Some(dirs) = directories::ProjectDirs::from("com", "quicksnap", "quicksnap") {
            let config_dir = dirs.config_dir();
            if std::fs::create_dir_all(config_dir).is_ok() {
                let config_path = config_dir.join("settings.json");
                if let Ok(json) = serde_json::to_string_pretty(self) {
                    let _ = std::fs::write(config_path, json);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = SnapSettings::default();
        assert_eq!(s.search_radius, 20.0);
        assert_eq!(s.origin_search_radius, 40.0);
        assert_eq!(s.actionable_distance, 15.0);
        assert_eq!(s.time_budget(), Duration::from_millis(10));
        assert_eq!(s.batch_size, 1000);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let s: SnapSettings =
            serde_json::from_str(r#"{"snap_target_type": "FACES", "snap_objects_origin": "KEY"}"#)
                .unwrap();
        assert_eq!(s.snap_target_type, SnapMode::Faces);
        assert_eq!(s.snap_objects_origin, OriginSnapping::Key);
        assert_eq!(s.snap_source_type, SnapMode::Points);
        assert!(s.display_target_wireframe);
    }
}
