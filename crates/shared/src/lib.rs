use serde::{Deserialize, Serialize};

/// Unique identifier of an object in the scene
pub type ObjectId = String;

fn default_true() -> bool {
    true
}

fn default_version() -> u32 {
    1
}

fn default_weight() -> f64 {
    1.0
}

/// Object transform relative to its parent (or the world when unparented)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Transform {
    pub position: [f64; 3],
    /// Euler rotation in degrees, XYZ order
    pub rotation: [f64; 3],
    pub scale: [f64; 3],
}

impl Transform {
    pub fn new() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            rotation: [0.0, 0.0, 0.0],
            scale: [1.0, 1.0, 1.0],
        }
    }

    /// Identity transform moved to `position`
    pub fn at(position: [f64; 3]) -> Self {
        Self {
            position,
            ..Self::new()
        }
    }
}

/// Which candidate points are extracted from an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SnapMode {
    /// Mesh vertices and curve control points
    #[default]
    Points,
    /// Mesh edge midpoints
    Midpoints,
    /// Mesh polygon centers
    Faces,
    /// Object origins only
    Origins,
}

impl SnapMode {
    pub fn label(&self) -> &'static str {
        match self {
            SnapMode::Points => "vertex/point",
            SnapMode::Midpoints => "edge midpoint",
            SnapMode::Faces => "face center",
            SnapMode::Origins => "object origin",
        }
    }
}

/// When object origins take part in the general nearest-point search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OriginSnapping {
    /// Origins are always candidates
    #[default]
    Always,
    /// Origins are only searched while the origin toggle is held
    Key,
}

/// Interaction mode of the host editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    /// Whole objects are moved
    #[default]
    Object,
    /// Selected vertices / curve points of the edited objects are moved
    Edit,
}

/// Polygon mesh with per-vertex selection flags
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MeshGeometry {
    pub vertices: Vec<[f64; 3]>,
    #[serde(default)]
    pub edges: Vec<[u32; 2]>,
    /// Each polygon lists its vertex indices in winding order
    #[serde(default)]
    pub polygons: Vec<Vec<u32>>,
    /// Vertex selection flags; missing entries count as unselected
    #[serde(default)]
    pub selected: Vec<bool>,
}

impl MeshGeometry {
    pub fn is_vertex_selected(&self, index: usize) -> bool {
        self.selected.get(index).copied().unwrap_or(false)
    }

    /// Mean of the polygon's vertex positions
    pub fn polygon_center(&self, polygon: usize) -> Option<[f64; 3]> {
        let poly = self.polygons.get(polygon)?;
        if poly.is_empty() {
            return None;
        }
        let mut sum = [0.0; 3];
        for &v in poly {
            let co = self.vertices.get(v as usize)?;
            sum[0] += co[0];
            sum[1] += co[1];
            sum[2] += co[2];
        }
        let n = poly.len() as f64;
        Some([sum[0] / n, sum[1] / n, sum[2] / n])
    }
}

/// Bezier control point with its two handles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BezierPoint {
    pub co: [f64; 3],
    pub handle_left: [f64; 3],
    pub handle_right: [f64; 3],
    #[serde(default)]
    pub selected: bool,
}

/// Plain (poly/NURBS) spline point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplinePoint {
    pub co: [f64; 3],
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Spline {
    #[serde(default)]
    pub bezier_points: Vec<BezierPoint>,
    #[serde(default)]
    pub points: Vec<SplinePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CurveGeometry {
    pub splines: Vec<Spline>,
}

impl CurveGeometry {
    pub fn point_count(&self) -> usize {
        self.splines
            .iter()
            .map(|s| s.bezier_points.len() + s.points.len())
            .sum()
    }
}

/// Object payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectData {
    Mesh(MeshGeometry),
    Curve(CurveGeometry),
    /// Instance of a named collection
    Instance { collection: String },
    /// Empty / camera / light: has an origin but no geometry
    Empty,
}

/// An object of the scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub id: ObjectId,
    #[serde(default)]
    pub name: String,
    #[serde(default = "Transform::new")]
    pub transform: Transform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ObjectId>,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub selected: bool,
    pub data: ObjectData,
}

impl SceneObject {
    /// Name shown to the user: explicit name or the id
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Named group of objects that can be instanced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    /// Subtracted from member positions when instanced
    #[serde(default)]
    pub instance_offset: [f64; 3],
    pub objects: Vec<SceneObject>,
}

/// Whole scene handed to the snapping tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub mode: EditMode,
    /// 3D cursor location
    #[serde(default)]
    pub cursor: [f64; 3],
    pub objects: Vec<SceneObject>,
    #[serde(default)]
    pub collections: Vec<Collection>,
}

impl Default for SceneDescription {
    fn default() -> Self {
        Self {
            version: 1,
            mode: EditMode::Object,
            cursor: [0.0; 3],
            objects: Vec::new(),
            collections: Vec::new(),
        }
    }
}

impl SceneDescription {
    pub fn object(&self, id: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn object_mut(&mut self, id: &str) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|o| o.id == id)
    }

    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.name == name)
    }
}
