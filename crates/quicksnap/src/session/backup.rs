//! Pre-session state of everything a snap can move.
//!
//! Every preview is applied from this backup, never on top of the previous
//! preview, and cancelling writes the backed-up values back unchanged.

use glam::{DMat4, DVec3};
use shared::{EditMode, ObjectData, ObjectId};

use crate::helpers::keep_only_parents;
use crate::host::{CurvePointEdit, SceneQuery, TransformApply};

/// Backed-up transform of an object moved as a whole
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectBackup {
    pub id: ObjectId,
    pub local: DMat4,
    /// World matrix of the parent (identity when unparented)
    pub parent_world: DMat4,
}

/// Backed-up selected points of an edited object
#[derive(Debug, Clone, PartialEq)]
pub enum ElementBackup {
    Mesh {
        id: ObjectId,
        world: DMat4,
        vertices: Vec<(u32, DVec3)>,
    },
    Curve {
        id: ObjectId,
        world: DMat4,
        points: Vec<CurvePointEdit>,
    },
}

/// What the session moves and how it looked before
#[derive(Debug, Clone, PartialEq)]
pub enum Backup {
    Objects(Vec<ObjectBackup>),
    Elements(Vec<ElementBackup>),
}

impl Backup {
    /// Objects in object mode (top-most selected ancestors only), selected
    /// vertices and curve points in edit mode
    pub fn capture<H: SceneQuery + TransformApply + ?Sized>(host: &H) -> Self {
        let selection = host.selected_objects();
        match host.edit_mode() {
            EditMode::Object => Backup::Objects(
                keep_only_parents(host, &selection)
                    .into_iter()
                    .filter_map(|id| {
                        let local = host.local_matrix(&id)?;
                        let parent_world = host
                            .object(&id)
                            .and_then(|o| o.parent.as_deref())
                            .and_then(|parent| host.world_matrix(parent))
                            .unwrap_or(DMat4::IDENTITY);
                        Some(ObjectBackup { id, local, parent_world })
                    })
                    .collect(),
            ),
            EditMode::Edit => Backup::Elements(
                selection
                    .iter()
                    .filter_map(|id| capture_elements(host, id))
                    .collect(),
            ),
        }
    }

    /// Nothing would move
    pub fn is_empty(&self) -> bool {
        match self {
            Backup::Objects(objects) => objects.is_empty(),
            Backup::Elements(elements) => elements.iter().all(|e| match e {
                ElementBackup::Mesh { vertices, .. } => vertices.is_empty(),
                ElementBackup::Curve { points, .. } => points.is_empty(),
            }),
        }
    }

    /// Write the backed-up values back
    pub fn restore<H: TransformApply + ?Sized>(&self, host: &mut H) {
        match self {
            Backup::Objects(objects) => {
                for object in objects {
                    host.set_local_matrix(&object.id, object.local);
                }
            }
            Backup::Elements(elements) => {
                for element in elements {
                    match element {
                        ElementBackup::Mesh { id, vertices, .. } => host.set_vertex_positions(id, vertices),
                        ElementBackup::Curve { id, points, .. } => host.set_curve_points(id, points),
                    }
                }
            }
        }
    }

    /// Move everything by the world-space `translation`, starting from the
    /// backed-up state
    pub fn apply<H: TransformApply + ?Sized>(&self, host: &mut H, translation: DVec3) {
        let t = DMat4::from_translation(translation);
        match self {
            Backup::Objects(objects) => {
                for object in objects {
                    let local = object.parent_world.inverse() * t * object.parent_world * object.local;
                    host.set_local_matrix(&object.id, local);
                }
            }
            Backup::Elements(elements) => {
                for element in elements {
                    match element {
                        ElementBackup::Mesh { id, world, vertices } => {
                            let inverse = world.inverse();
                            let moved: Vec<(u32, DVec3)> = vertices
                                .iter()
                                .map(|(i, co)| (*i, translate_local(world, &inverse, *co, translation)))
                                .collect();
                            host.set_vertex_positions(id, &moved);
                        }
                        ElementBackup::Curve { id, world, points } => {
                            let inverse = world.inverse();
                            let moved: Vec<CurvePointEdit> = points
                                .iter()
                                .map(|p| CurvePointEdit {
                                    co: translate_local(world, &inverse, p.co, translation),
                                    handle_left: translate_local(world, &inverse, p.handle_left, translation),
                                    handle_right: translate_local(world, &inverse, p.handle_right, translation),
                                    ..*p
                                })
                                .collect();
                            host.set_curve_points(id, &moved);
                        }
                    }
                }
            }
        }
    }
}

fn translate_local(world: &DMat4, inverse: &DMat4, co: DVec3, translation: DVec3) -> DVec3 {
    inverse.transform_point3(world.transform_point3(co) + translation)
}

fn capture_elements<H: SceneQuery + ?Sized>(host: &H, id: &str) -> Option<ElementBackup> {
    let object = host.object(id)?;
    let world = host.world_matrix(id)?;
    match &object.data {
        ObjectData::Mesh(mesh) => Some(ElementBackup::Mesh {
            id: id.to_string(),
            world,
            vertices: mesh
                .vertices
                .iter()
                .enumerate()
                .filter(|(i, _)| mesh.is_vertex_selected(*i))
                .map(|(i, co)| (i as u32, DVec3::from_array(*co)))
                .collect(),
        }),
        ObjectData::Curve(curve) => {
            let mut points = Vec::new();
            for (s, spline) in curve.splines.iter().enumerate() {
                for (i, p) in spline.bezier_points.iter().enumerate().filter(|(_, p)| p.selected) {
                    points.push(CurvePointEdit {
                        spline: s,
                        index: i,
                        bezier: true,
                        co: DVec3::from_array(p.co),
                        handle_left: DVec3::from_array(p.handle_left),
                        handle_right: DVec3::from_array(p.handle_right),
                    });
                }
                for (i, p) in spline.points.iter().enumerate().filter(|(_, p)| p.selected) {
                    let co = DVec3::from_array(p.co);
                    points.push(CurvePointEdit {
                        spline: s,
                        index: i,
                        bezier: false,
                        co,
                        handle_left: co,
                        handle_right: co,
                    });
                }
            }
            Some(ElementBackup::Curve {
                id: id.to_string(),
                world,
                points,
            })
        }
        ObjectData::Instance { .. } | ObjectData::Empty => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::harness::SceneHarness;

    #[test]
    fn test_object_backup_skips_children_of_selected_parents() {
        let harness = SceneHarness::new(fixtures::parented_scene());
        match Backup::capture(&harness) {
            Backup::Objects(objects) => {
                let ids: Vec<&str> = objects.iter().map(|o| o.id.as_str()).collect();
                assert_eq!(ids, vec!["parent"]);
            }
            other => panic!("Expected object backup, got {other:?}"),
        }
    }

    #[test]
    fn test_child_translation_is_in_world_space() {
        let mut harness = SceneHarness::new(fixtures::parented_scene());
        harness.select_only(&["child"]);
        let before = harness.world_matrix("child").unwrap();
        let backup = Backup::capture(&harness);
        backup.apply(&mut harness, DVec3::new(1.0, 0.0, 0.0));
        let after = harness.world_matrix("child").unwrap();
        let moved = after.transform_point3(DVec3::ZERO) - before.transform_point3(DVec3::ZERO);
        assert!((moved - DVec3::X).length() < 1e-9);
    }

    #[test]
    fn test_edit_backup_takes_selected_vertices() {
        let harness = SceneHarness::new(fixtures::edit_mode_strip());
        let backup = Backup::capture(&harness);
        assert!(!backup.is_empty());
        match backup {
            Backup::Elements(elements) => match &elements[0] {
                ElementBackup::Mesh { vertices, .. } => {
                    let ids: Vec<u32> = vertices.iter().map(|(i, _)| *i).collect();
                    assert_eq!(ids, vec![0, 1]);
                }
                other => panic!("Expected mesh backup, got {other:?}"),
            },
            other => panic!("Expected element backup, got {other:?}"),
        }
    }

    #[test]
    fn test_apply_is_relative_to_backup() {
        let mut harness = SceneHarness::new(fixtures::edit_mode_strip());
        let backup = Backup::capture(&harness);
        backup.apply(&mut harness, DVec3::new(0.0, 1.0, 0.0));
        backup.apply(&mut harness, DVec3::new(0.0, 1.0, 0.0));
        let once = harness.vertex_world("strip", 0).unwrap();
        assert!((once - DVec3::new(0.0, 1.0, 0.0)).length() < 1e-9);

        backup.restore(&mut harness);
        assert_eq!(harness.vertex_world("strip", 0), Some(DVec3::ZERO));
    }
}
