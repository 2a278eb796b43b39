//! Factory functions for test scenes.
//!
//! Every scene is meant to be viewed through the default
//! [`crate::harness::SceneHarness`] camera, which keeps all of its geometry
//! inside the region.

use shared::*;

// ── Geometry factories ──────────────────────────────────────────

/// Axis-aligned cube centered on the origin with the given half size
pub fn cube_mesh(half: f64) -> MeshGeometry {
    let h = half;
    MeshGeometry {
        vertices: vec![
            [-h, -h, -h],
            [h, -h, -h],
            [h, h, -h],
            [-h, h, -h],
            [-h, -h, h],
            [h, -h, h],
            [h, h, h],
            [-h, h, h],
        ],
        edges: vec![
            [0, 1],
            [1, 2],
            [2, 3],
            [3, 0],
            [4, 5],
            [5, 6],
            [6, 7],
            [7, 4],
            [0, 4],
            [1, 5],
            [2, 6],
            [3, 7],
        ],
        polygons: vec![
            vec![0, 3, 2, 1],
            vec![4, 5, 6, 7],
            vec![0, 1, 5, 4],
            vec![2, 3, 7, 6],
            vec![0, 4, 7, 3],
            vec![1, 2, 6, 5],
        ],
        selected: Vec::new(),
    }
}

/// Square in the XZ plane with one quad
pub fn plane_mesh(half: f64) -> MeshGeometry {
    let h = half;
    MeshGeometry {
        vertices: vec![[-h, 0.0, -h], [h, 0.0, -h], [h, 0.0, h], [-h, 0.0, h]],
        edges: vec![[0, 1], [1, 2], [2, 3], [3, 0]],
        polygons: vec![vec![0, 1, 2, 3]],
        selected: Vec::new(),
    }
}

// ── Object factories ────────────────────────────────────────────

pub fn object(id: &str, transform: Transform, data: ObjectData) -> SceneObject {
    SceneObject {
        id: id.to_string(),
        name: String::new(),
        transform,
        parent: None,
        visible: true,
        selected: false,
        data,
    }
}

pub fn selected(mut object: SceneObject) -> SceneObject {
    object.selected = true;
    object
}

pub fn scene(objects: Vec<SceneObject>) -> SceneDescription {
    SceneDescription {
        objects,
        ..SceneDescription::default()
    }
}

// ── Scenes ──────────────────────────────────────────────────────

/// Selected 2x2x2 cube at the origin and an unselected 2x2 plane centered
/// on (4, 0, 0). The cursor sits at the origin.
pub fn cube_and_plane() -> SceneDescription {
    scene(vec![
        selected(object("cube", Transform::new(), ObjectData::Mesh(cube_mesh(1.0)))),
        object("plane", Transform::at([4.0, 0.0, 0.0]), ObjectData::Mesh(plane_mesh(1.0))),
    ])
}

/// Instance of a collection holding one box, placed so the box is centered
/// on the instance origin, next to a selected cube and an empty
pub fn instance_scene() -> SceneDescription {
    let mut scene = scene(vec![
        selected(object("cube", Transform::at([3.0, 0.0, 0.0]), ObjectData::Mesh(cube_mesh(0.5)))),
        object(
            "instance",
            Transform::at([-1.0, 0.0, 0.0]),
            ObjectData::Instance {
                collection: "Props".to_string(),
            },
        ),
        object("marker", Transform::at([1.0, 2.0, 0.0]), ObjectData::Empty),
    ]);
    scene.collections.push(Collection {
        name: "Props".to_string(),
        instance_offset: [1.0, 0.0, 0.0],
        objects: vec![object("box", Transform::at([1.0, 0.0, 0.0]), ObjectData::Mesh(cube_mesh(0.5)))],
    });
    scene
}

/// Selected cube and an unselected curve with two bezier points and one
/// plain point
pub fn curve_scene() -> SceneDescription {
    let bezier = |x: f64| BezierPoint {
        co: [x, 0.0, 0.0],
        handle_left: [x - 0.3, 0.0, 0.0],
        handle_right: [x + 0.3, 0.0, 0.0],
        selected: false,
    };
    let curve = CurveGeometry {
        splines: vec![
            Spline {
                bezier_points: vec![bezier(-1.0), bezier(1.0)],
                points: Vec::new(),
            },
            Spline {
                bezier_points: Vec::new(),
                points: vec![SplinePoint {
                    co: [0.0, 1.0, 0.0],
                    weight: 1.0,
                    selected: false,
                }],
            },
        ],
    };
    scene(vec![
        selected(object("cube", Transform::new(), ObjectData::Mesh(cube_mesh(0.5)))),
        object("curve", Transform::at([2.0, 0.0, -2.0]), ObjectData::Curve(curve)),
    ])
}

/// One selected mesh with `n` x `n` loose vertices spanning 4 units in the
/// XY plane, centered on the camera target
pub fn dense_grid(n: usize) -> SceneDescription {
    let step = if n > 1 { 4.0 / (n - 1) as f64 } else { 0.0 };
    let mut vertices = Vec::with_capacity(n * n);
    for i in 0..n {
        for j in 0..n {
            vertices.push([-2.0 + i as f64 * step, -2.0 + j as f64 * step, 0.0]);
        }
    }
    let grid = MeshGeometry {
        vertices,
        ..MeshGeometry::default()
    };
    scene(vec![selected(object("grid", Transform::at([1.5, 0.0, 0.0]), ObjectData::Mesh(grid)))])
}

/// Edit mode on a strip of four vertices along X, the first two selected
pub fn edit_mode_strip() -> SceneDescription {
    let strip = MeshGeometry {
        vertices: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [3.0, 0.0, 0.0]],
        edges: vec![[0, 1], [1, 2], [2, 3]],
        polygons: Vec::new(),
        selected: vec![true, true, false, false],
    };
    let mut scene = scene(vec![selected(object("strip", Transform::new(), ObjectData::Mesh(strip)))]);
    scene.mode = EditMode::Edit;
    scene
}

/// Selected parent (moved, rotated 90 degrees about Z and scaled 2) with a
/// selected child, plus an unselected ground plane
pub fn parented_scene() -> SceneDescription {
    let parent = Transform {
        position: [1.0, 2.0, 0.0],
        rotation: [0.0, 0.0, 90.0],
        scale: [2.0, 2.0, 2.0],
    };
    let mut child = selected(object("child", Transform::at([1.0, 0.0, 0.0]), ObjectData::Mesh(cube_mesh(0.25))));
    child.parent = Some("parent".to_string());
    scene(vec![
        selected(object("parent", parent, ObjectData::Mesh(cube_mesh(0.25)))),
        child,
        object("ground", Transform::at([1.5, -1.0, 0.0]), ObjectData::Mesh(plane_mesh(2.0))),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_faces_lie_on_the_surface() {
        let cube = cube_mesh(1.0);
        assert_eq!(cube.edges.len(), 12);
        for face in 0..cube.polygons.len() {
            let center = cube.polygon_center(face).unwrap();
            let on_surface = center.iter().filter(|c| (c.abs() - 1.0).abs() < 1e-12).count();
            assert_eq!(on_surface, 1, "face {face}");
        }
    }

    #[test]
    fn test_dense_grid_size() {
        let scene = dense_grid(50);
        match &scene.objects[0].data {
            ObjectData::Mesh(mesh) => assert_eq!(mesh.vertices.len(), 2500),
            other => panic!("Expected mesh, got {other:?}"),
        }
    }
}
