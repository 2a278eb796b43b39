//! Extraction of candidate points from scene objects.
//!
//! Points are produced in the local space of the sampled root object. For
//! collection instances every nested object is flattened into the root's
//! space and tagged with its [`ObjectPath`].

use std::fmt;

use glam::{DMat4, DVec3};
use shared::{CurveGeometry, MeshGeometry, ObjectData, ObjectId, SceneObject, SnapMode};

use crate::helpers::transform_matrix;
use crate::host::SceneQuery;

/// Nested instances deeper than this are ignored
const MAX_INSTANCE_DEPTH: usize = 16;

/// Back-reference from a sampled point to the element it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementRef {
    /// Object origin or 3D cursor
    Synthetic,
    Vertex(u32),
    Edge(u32),
    Face(u32),
    CurvePoint { spline: u32, index: u32, bezier: bool },
}

impl ElementRef {
    /// Element index, -1 for synthetic points
    pub fn index(&self) -> i64 {
        match *self {
            ElementRef::Synthetic => -1,
            ElementRef::Vertex(i) | ElementRef::Edge(i) | ElementRef::Face(i) => i as i64,
            ElementRef::CurvePoint { index, .. } => index as i64,
        }
    }

    pub fn spline(&self) -> Option<u32> {
        match *self {
            ElementRef::CurvePoint { spline, .. } => Some(spline),
            _ => None,
        }
    }
}

/// Selection-state restriction applied while sampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionFilter {
    #[default]
    All,
    /// Only selected elements (an edge or face needs all its vertices selected)
    Selected,
    /// Only unselected elements (an edge or face needs all its vertices unselected)
    Unselected,
}

impl SelectionFilter {
    fn keeps(self, selected: bool) -> bool {
        match self {
            SelectionFilter::All => true,
            SelectionFilter::Selected => selected,
            SelectionFilter::Unselected => !selected,
        }
    }
}

/// Ownership chain of a sampled point: the enqueued root object followed by
/// the instanced objects leading to the geometry
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectPath(Vec<ObjectId>);

impl ObjectPath {
    pub fn root(id: &str) -> Self {
        Self(vec![id.to_string()])
    }

    pub fn child(&self, id: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(id.to_string());
        Self(segments)
    }

    /// Object used for selection and highlighting
    pub fn root_id(&self) -> &str {
        &self.0[0]
    }

    /// Object owning the geometry
    pub fn leaf_id(&self) -> &str {
        &self.0[self.0.len() - 1]
    }

    pub fn segments(&self) -> &[ObjectId] {
        &self.0
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(">"))
    }
}

/// Candidate points of one root object, in the root's local space
#[derive(Debug, Default)]
pub struct SampledGeometry {
    pub paths: Vec<ObjectPath>,
    pub points: Vec<DVec3>,
    /// Index into `paths` per point
    pub owners: Vec<u32>,
    pub elements: Vec<ElementRef>,
}

impl SampledGeometry {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn append(&mut self, path: ObjectPath, matrix: &DMat4, points: Vec<DVec3>, elements: Vec<ElementRef>) {
        if points.is_empty() {
            return;
        }
        let owner = self.paths.len() as u32;
        self.paths.push(path);
        self.owners.extend(std::iter::repeat(owner).take(points.len()));
        self.points.extend(points.into_iter().map(|p| matrix.transform_point3(p)));
        self.elements.extend(elements);
    }
}

/// Sample `object` for `mode`. `filter` applies to the object's own mesh or
/// curve; instanced objects are always sampled whole.
pub fn sample_object<S: SceneQuery + ?Sized>(
    scene: &S,
    object: &SceneObject,
    mode: SnapMode,
    filter: SelectionFilter,
) -> SampledGeometry {
    let mut out = SampledGeometry::default();
    let path = ObjectPath::root(&object.id);
    if mode == SnapMode::Origins {
        out.append(path, &DMat4::IDENTITY, vec![DVec3::ZERO], vec![ElementRef::Synthetic]);
        return out;
    }
    sample_into(scene, object, path, DMat4::IDENTITY, mode, filter, 0, &mut out);
    out
}

#[allow(clippy::too_many_arguments)]
fn sample_into<S: SceneQuery + ?Sized>(
    scene: &S,
    object: &SceneObject,
    path: ObjectPath,
    matrix: DMat4,
    mode: SnapMode,
    filter: SelectionFilter,
    depth: usize,
    out: &mut SampledGeometry,
) {
    match &object.data {
        ObjectData::Mesh(mesh) => {
            let (points, elements) = sample_mesh(mesh, mode, filter);
            out.append(path, &matrix, points, elements);
        }
        ObjectData::Curve(curve) => {
            let (points, elements) = sample_curve(curve, mode, filter);
            out.append(path, &matrix, points, elements);
        }
        ObjectData::Instance { collection } => {
            if depth >= MAX_INSTANCE_DEPTH {
                tracing::debug!("Instance nesting too deep at {path}");
                return;
            }
            let Some(collection) = scene.collection(collection) else {
                return;
            };
            let offset = DMat4::from_translation(-DVec3::from_array(collection.instance_offset));
            for child in &collection.objects {
                let child_matrix = matrix * offset * transform_matrix(&child.transform);
                sample_into(
                    scene,
                    child,
                    path.child(&child.id),
                    child_matrix,
                    mode,
                    SelectionFilter::All,
                    depth + 1,
                    out,
                );
            }
        }
        ObjectData::Empty => {}
    }
}

/// Mesh candidates in object-local space
pub fn sample_mesh(
    mesh: &MeshGeometry,
    mode: SnapMode,
    filter: SelectionFilter,
) -> (Vec<DVec3>, Vec<ElementRef>) {
    let mask: Vec<bool> = (0..mesh.vertices.len())
        .map(|i| filter.keeps(mesh.is_vertex_selected(i)))
        .collect();
    let kept = |i: u32| mask.get(i as usize).copied().unwrap_or(false);
    let co = |i: u32| mesh.vertices.get(i as usize).map(|c| DVec3::from_array(*c));

    match mode {
        SnapMode::Points => mesh
            .vertices
            .iter()
            .enumerate()
            .filter(|(i, _)| mask[*i])
            .map(|(i, c)| (DVec3::from_array(*c), ElementRef::Vertex(i as u32)))
            .unzip(),
        SnapMode::Midpoints => mesh
            .edges
            .iter()
            .enumerate()
            .filter(|(_, [a, b])| kept(*a) && kept(*b))
            .filter_map(|(i, [a, b])| Some(((co(*a)? + co(*b)?) * 0.5, ElementRef::Edge(i as u32))))
            .unzip(),
        SnapMode::Faces => mesh
            .polygons
            .iter()
            .enumerate()
            .filter(|(_, poly)| poly.iter().all(|v| kept(*v)))
            .filter_map(|(i, _)| {
                let center = mesh.polygon_center(i)?;
                Some((DVec3::from_array(center), ElementRef::Face(i as u32)))
            })
            .unzip(),
        SnapMode::Origins => (Vec::new(), Vec::new()),
    }
}

/// Curve control points: every bezier point of every spline first, then the
/// plain spline points
pub fn sample_curve(
    curve: &CurveGeometry,
    mode: SnapMode,
    filter: SelectionFilter,
) -> (Vec<DVec3>, Vec<ElementRef>) {
    if mode != SnapMode::Points {
        return (Vec::new(), Vec::new());
    }
    let bezier = curve.splines.iter().enumerate().flat_map(|(s, spline)| {
        spline.bezier_points.iter().enumerate().map(move |(i, p)| {
            (p.co, p.selected, ElementRef::CurvePoint { spline: s as u32, index: i as u32, bezier: true })
        })
    });
    let plain = curve.splines.iter().enumerate().flat_map(|(s, spline)| {
        spline.points.iter().enumerate().map(move |(i, p)| {
            (p.co, p.selected, ElementRef::CurvePoint { spline: s as u32, index: i as u32, bezier: false })
        })
    });
    bezier
        .chain(plain)
        .filter(|(_, selected, _)| filter.keeps(*selected))
        .map(|(co, _, element)| (DVec3::from_array(co), element))
        .unzip()
}

/// Object at the end of `path` with its local -> world matrix
pub fn resolve_path<'a, S: SceneQuery + ?Sized>(scene: &'a S, path: &ObjectPath) -> Option<(&'a SceneObject, DMat4)> {
    let mut object = scene.object(path.root_id())?;
    let mut matrix = scene.world_matrix(path.root_id())?;
    for id in &path.segments()[1..] {
        let ObjectData::Instance { collection } = &object.data else {
            return None;
        };
        let collection = scene.collection(collection)?;
        let child = collection.objects.iter().find(|o| &o.id == id)?;
        matrix = matrix
            * DMat4::from_translation(-DVec3::from_array(collection.instance_offset))
            * transform_matrix(&child.transform);
        object = child;
    }
    Some((object, matrix))
}

/// Upper bound of the points [`sample_object`] can produce for `object`
pub fn element_count<S: SceneQuery + ?Sized>(scene: &S, object: &SceneObject, mode: SnapMode) -> usize {
    if mode == SnapMode::Origins {
        return 1;
    }
    count_into(scene, object, mode, 0)
}

fn count_into<S: SceneQuery + ?Sized>(scene: &S, object: &SceneObject, mode: SnapMode, depth: usize) -> usize {
    match &object.data {
        ObjectData::Mesh(mesh) => match mode {
            SnapMode::Points => mesh.vertices.len(),
            SnapMode::Midpoints => mesh.edges.len(),
            SnapMode::Faces => mesh.polygons.len(),
            SnapMode::Origins => 0,
        },
        ObjectData::Curve(curve) if mode == SnapMode::Points => curve.point_count(),
        ObjectData::Curve(_) => 0,
        ObjectData::Instance { collection } => {
            if depth >= MAX_INSTANCE_DEPTH {
                return 0;
            }
            scene
                .collection(collection)
                .map(|c| c.objects.iter().map(|child| count_into(scene, child, mode, depth + 1)).sum())
                .unwrap_or(0)
        }
        ObjectData::Empty => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::harness::SceneHarness;
    use shared::{BezierPoint, Spline, SplinePoint};

    fn strip() -> MeshGeometry {
        MeshGeometry {
            vertices: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0], [3.0, 0.0, 0.0]],
            edges: vec![[0, 1], [1, 2], [2, 3]],
            polygons: vec![],
            selected: vec![true, true, false, false],
        }
    }

    #[test]
    fn test_midpoints_selected_needs_both_endpoints() {
        let (points, elements) = sample_mesh(&strip(), SnapMode::Midpoints, SelectionFilter::Selected);
        assert_eq!(elements, vec![ElementRef::Edge(0)]);
        assert_eq!(points, vec![DVec3::new(0.5, 0.0, 0.0)]);
    }

    #[test]
    fn test_midpoints_unselected_needs_no_selected_endpoint() {
        let (_, elements) = sample_mesh(&strip(), SnapMode::Midpoints, SelectionFilter::Unselected);
        assert_eq!(elements, vec![ElementRef::Edge(1), ElementRef::Edge(2)]);
    }

    #[test]
    fn test_points_filter() {
        let (_, all) = sample_mesh(&strip(), SnapMode::Points, SelectionFilter::All);
        assert_eq!(all.len(), 4);
        let (_, unselected) = sample_mesh(&strip(), SnapMode::Points, SelectionFilter::Unselected);
        assert_eq!(unselected, vec![ElementRef::Vertex(2), ElementRef::Vertex(3)]);
    }

    #[test]
    fn test_faces_all_or_nothing() {
        let mut mesh = strip();
        mesh.polygons = vec![vec![0, 1, 2], vec![0, 1]];
        let (_, selected) = sample_mesh(&mesh, SnapMode::Faces, SelectionFilter::Selected);
        assert_eq!(selected, vec![ElementRef::Face(1)]);
        let (points, all) = sample_mesh(&mesh, SnapMode::Faces, SelectionFilter::All);
        assert_eq!(all.len(), 2);
        assert_eq!(points[0], DVec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_curve_bezier_points_come_first() {
        let curve = CurveGeometry {
            splines: vec![
                Spline {
                    bezier_points: vec![],
                    points: vec![SplinePoint { co: [5.0, 0.0, 0.0], weight: 1.0, selected: true }],
                },
                Spline {
                    bezier_points: vec![BezierPoint {
                        co: [1.0, 0.0, 0.0],
                        handle_left: [0.0; 3],
                        handle_right: [2.0, 0.0, 0.0],
                        selected: false,
                    }],
                    points: vec![],
                },
            ],
        };
        let (points, elements) = sample_curve(&curve, SnapMode::Points, SelectionFilter::All);
        assert_eq!(points, vec![DVec3::new(1.0, 0.0, 0.0), DVec3::new(5.0, 0.0, 0.0)]);
        assert_eq!(elements[0], ElementRef::CurvePoint { spline: 1, index: 0, bezier: true });
        assert_eq!(elements[1], ElementRef::CurvePoint { spline: 0, index: 0, bezier: false });
        assert_eq!(elements[1].spline(), Some(0));

        let (_, selected) = sample_curve(&curve, SnapMode::Points, SelectionFilter::Selected);
        assert_eq!(selected.len(), 1);
        assert!(sample_curve(&curve, SnapMode::Faces, SelectionFilter::All).0.is_empty());
    }

    #[test]
    fn test_instance_flattens_with_paths() {
        let harness = SceneHarness::new(fixtures::instance_scene());
        let instance = harness.scene.object("instance").unwrap();
        let sampled = sample_object(&harness, instance, SnapMode::Points, SelectionFilter::All);
        assert_eq!(sampled.len(), 8);
        assert_eq!(sampled.paths.len(), 1);
        assert_eq!(sampled.paths[0].to_string(), "instance>box");
        assert_eq!(sampled.paths[0].root_id(), "instance");
        assert_eq!(sampled.paths[0].leaf_id(), "box");
        // member at (1,0,0) in a collection offset by (1,0,0): the box is centered on the instance
        let sum = sampled.points.iter().fold(DVec3::ZERO, |acc, p| acc + *p);
        assert!((sum / 8.0).length() < 1e-9);
        assert_eq!(element_count(&harness, instance, SnapMode::Points), 8);
    }

    #[test]
    fn test_empty_and_origins() {
        let harness = SceneHarness::new(fixtures::instance_scene());
        let empty = harness.scene.object("marker").unwrap();
        assert!(sample_object(&harness, empty, SnapMode::Points, SelectionFilter::All).is_empty());
        let origin = sample_object(&harness, empty, SnapMode::Origins, SelectionFilter::All);
        assert_eq!(origin.points, vec![DVec3::ZERO]);
        assert_eq!(origin.elements, vec![ElementRef::Synthetic]);
        assert_eq!(ElementRef::Synthetic.index(), -1);
    }
}
