//! JSON command protocol for scripted snapping sessions.
//!
//! A [`SnapDriver`] owns a [`SceneHarness`] and at most one running
//! [`SnapSession`]; commands move the mouse, press keys and inspect the
//! result the way a user would in the viewport.

use kurbo::Point;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::harness::SceneHarness;
use crate::host::SceneQuery;
use crate::session::{HotKey, InputEvent, RenderState, SnapSession};
use crate::settings::SnapSettings;

/// A command a script can execute
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SessionCommand {
    /// Start a session with the mouse at (x, y)
    Begin {
        x: f64,
        y: f64,
        #[serde(default)]
        settings: Option<SnapSettings>,
    },
    /// Move the mouse to region pixel (x, y)
    MouseMove { x: f64, y: f64 },
    /// Move the mouse onto the projection of a world position
    MouseTo { point: [f64; 3] },
    /// Timer tick without input
    Tick,
    Press,
    Key {
        key: HotKey,
        #[serde(default)]
        shift: bool,
    },
    Cancel,
    /// Rotate the camera by degrees
    Orbit { dx: f64, dy: f64 },
    /// Dolly the camera by a fraction of its distance
    Zoom { delta: f64 },
    /// Shift the camera target in view-plane units
    Pan { dx: f64, dy: f64 },
    /// Select objects by IDs
    Select { ids: Vec<String> },
    /// Undo the last committed snap
    Undo,
    /// Session state and object positions
    Inspect,
    /// Export the scene as JSON
    ExportScene,
}

/// Response from executing a command.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl CommandResponse {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
            data: None,
        }
    }

    fn ok_with_data(data: serde_json::Value) -> Self {
        Self {
            success: true,
            error: None,
            data: Some(data),
        }
    }

    fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(msg.into()),
            data: None,
        }
    }
}

/// Harness plus the session being driven
#[derive(Debug)]
pub struct SnapDriver {
    pub harness: SceneHarness,
    pub settings: SnapSettings,
    session: Option<SnapSession>,
    mouse: Point,
}

impl SnapDriver {
    pub fn new(harness: SceneHarness, settings: SnapSettings) -> Self {
        Self {
            harness,
            settings,
            session: None,
            mouse: Point::ZERO,
        }
    }

    pub fn session(&self) -> Option<&SnapSession> {
        self.session.as_ref()
    }

    pub fn mouse(&self) -> Point {
        self.mouse
    }

    fn send(&mut self, event: InputEvent) -> CommandResponse {
        let Some(session) = self.session.as_mut() else {
            return CommandResponse::err("No session running");
        };
        let state = session.tick(&mut self.harness, self.mouse, event);
        CommandResponse::ok_with_data(render_json(&state, session))
    }
}

fn point_json(point: Option<Point>) -> serde_json::Value {
    match point {
        Some(p) => json!([p.x, p.y]),
        None => serde_json::Value::Null,
    }
}

fn render_json(state: &RenderState, session: &SnapSession) -> serde_json::Value {
    json!({
        "state": state.state,
        "status": state.status,
        "source": point_json(state.source),
        "source_actionable": state.source_actionable,
        "target": point_json(state.target),
        "target_world": state.target_world.map(|t| t.to_array()),
        "translation": session.translation().map(|t| t.to_array()),
        "constraint": session.constraint().constraint.map(|c| c.label()),
        "local": session.constraint().local,
        "origins_only": session.origins_only(),
        "highlight_edges": state.highlight.edges.len(),
        "status_line": state.status_line,
    })
}

/// Execute a single command on the driver.
pub fn execute_command(driver: &mut SnapDriver, cmd: SessionCommand) -> CommandResponse {
    match cmd {
        SessionCommand::Begin { x, y, settings } => {
            if driver.session.as_ref().is_some_and(SnapSession::is_running) {
                return CommandResponse::err("A session is already running");
            }
            driver.mouse = Point::new(x, y);
            let settings = settings.unwrap_or_else(|| driver.settings.clone());
            match SnapSession::begin(&mut driver.harness, driver.mouse, settings) {
                Ok(session) => {
                    let state = session.render_state(&driver.harness);
                    let data = render_json(&state, &session);
                    driver.session = Some(session);
                    CommandResponse::ok_with_data(data)
                }
                Err(e) => CommandResponse::err(e.to_string()),
            }
        }

        SessionCommand::MouseMove { x, y } => {
            driver.mouse = Point::new(x, y);
            driver.send(InputEvent::MouseMove)
        }

        SessionCommand::MouseTo { point } => {
            let Some((screen, _)) = driver.harness.view().project(point.into()) else {
                return CommandResponse::err("Point is behind the camera");
            };
            driver.mouse = screen;
            driver.send(InputEvent::MouseMove)
        }

        SessionCommand::Tick => driver.send(InputEvent::Timer),
        SessionCommand::Press => driver.send(InputEvent::Press),
        SessionCommand::Key { key, shift } => driver.send(InputEvent::Key { key, shift }),
        SessionCommand::Cancel => driver.send(InputEvent::Cancel),

        SessionCommand::Orbit { dx, dy } => {
            driver.harness.orbit(dx, dy);
            CommandResponse::ok()
        }

        SessionCommand::Zoom { delta } => {
            driver.harness.zoom(delta);
            CommandResponse::ok()
        }

        SessionCommand::Pan { dx, dy } => {
            driver.harness.pan(dx, dy);
            CommandResponse::ok()
        }

        SessionCommand::Select { ids } => {
            if driver.session.as_ref().is_some_and(SnapSession::is_running) {
                return CommandResponse::err("Cannot change the selection while a session runs");
            }
            let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
            driver.harness.select_only(&refs);
            CommandResponse::ok_with_data(json!({ "selected": ids }))
        }

        SessionCommand::Undo => {
            let undone = driver.harness.undo();
            CommandResponse::ok_with_data(json!({ "undone": undone }))
        }

        SessionCommand::Inspect => {
            let objects: Vec<serde_json::Value> = driver
                .harness
                .scene
                .objects
                .iter()
                .map(|object| {
                    json!({
                        "id": object.id,
                        "name": object.display_name(),
                        "selected": object.selected,
                        "origin": driver.harness.origin_world(&object.id).map(|o| o.to_array()),
                    })
                })
                .collect();
            let session = driver.session.as_ref().map(|s| render_json(&s.render_state(&driver.harness), s));
            CommandResponse::ok_with_data(json!({
                "mode": driver.harness.edit_mode(),
                "object_count": objects.len(),
                "objects": objects,
                "undo_steps": driver.harness.undo_stack().len(),
                "session": session,
            }))
        }

        SessionCommand::ExportScene => {
            let json = driver.harness.export_scene_json();
            CommandResponse::ok_with_data(json!({ "scene_json": json }))
        }
    }
}

/// Parse and execute a single JSON command string.
pub fn execute_json(driver: &mut SnapDriver, json: &str) -> Result<CommandResponse, String> {
    let cmd: SessionCommand = serde_json::from_str(json).map_err(|e| format!("Invalid command JSON: {e}"))?;
    Ok(execute_command(driver, cmd))
}

/// Parse and execute multiple JSON commands (array).
pub fn execute_json_batch(driver: &mut SnapDriver, json: &str) -> Result<Vec<CommandResponse>, String> {
    let cmds: Vec<SessionCommand> = serde_json::from_str(json).map_err(|e| format!("Invalid commands JSON: {e}"))?;
    Ok(cmds.into_iter().map(|cmd| execute_command(driver, cmd)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn driver() -> SnapDriver {
        SnapDriver::new(SceneHarness::new(fixtures::cube_and_plane()), SnapSettings::default())
    }

    #[test]
    fn test_command_serde_key() {
        let json = r#"{"command": "key", "key": "Z", "shift": true}"#;
        let cmd: SessionCommand = serde_json::from_str(json).unwrap();
        match cmd {
            SessionCommand::Key { key, shift } => {
                assert_eq!(key, HotKey::Z);
                assert!(shift);
            }
            _ => panic!("Expected Key"),
        }
    }

    #[test]
    fn test_command_serde_begin_with_settings() {
        let json = r#"{"command": "begin", "x": 10, "y": 20, "settings": {"snap_target_type": "MIDPOINTS"}}"#;
        let cmd: SessionCommand = serde_json::from_str(json).unwrap();
        match cmd {
            SessionCommand::Begin { settings: Some(s), .. } => {
                assert_eq!(s.snap_target_type, shared::SnapMode::Midpoints);
                assert_eq!(s.search_radius, 20.0);
            }
            _ => panic!("Expected Begin with settings"),
        }
    }

    #[test]
    fn test_events_need_a_session() {
        let mut d = driver();
        let resp = execute_json(&mut d, r#"{"command": "press"}"#).unwrap();
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("No session running"));
    }

    #[test]
    fn test_begin_reports_refusal() {
        let mut d = driver();
        execute_json(&mut d, r#"{"command": "select", "ids": []}"#).unwrap();
        let resp = execute_json(&mut d, r#"{"command": "begin", "x": 0, "y": 0}"#).unwrap();
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("Nothing is selected"));
    }

    #[test]
    fn test_execute_inspect() {
        let mut d = driver();
        let resp = execute_json(&mut d, r#"{"command": "inspect"}"#).unwrap();
        assert!(resp.success);
        let data = resp.data.unwrap();
        assert_eq!(data["object_count"], 2);
        assert!(data["session"].is_null());
    }

    #[test]
    fn test_zoom_and_pan_move_the_view() {
        let mut d = driver();
        let before = d.harness.view();
        assert!(execute_json(&mut d, r#"{"command": "zoom", "delta": 0.2}"#).unwrap().success);
        assert!(d.harness.view().moved_from(&before));
        let zoomed = d.harness.view();
        assert!(execute_json(&mut d, r#"{"command": "pan", "dx": 0.5, "dy": 0.0}"#).unwrap().success);
        assert!(d.harness.view().moved_from(&zoomed));
    }

    #[test]
    fn test_execute_invalid_json() {
        let mut d = driver();
        assert!(execute_json(&mut d, "not valid json").is_err());
    }
}
