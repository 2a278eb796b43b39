use glam::{DMat4, DVec3};

/// A ray in world space
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: DVec3,
    pub direction: DVec3,
}

impl Ray {
    pub fn at(&self, t: f64) -> DVec3 {
        self.origin + self.direction * t
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    /// Bounds of a point cloud, None when empty
    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut min = first;
        let mut max = first;
        for p in iter {
            min = min.min(p);
            max = max.max(p);
        }
        Some(Self { min, max })
    }
}

/// Ray-AABB intersection using the slab method.
/// Returns the distance along the ray to the nearest hit, or None.
pub fn ray_aabb(ray: &Ray, aabb: &Aabb) -> Option<f64> {
    let inv_dir = DVec3::new(
        1.0 / ray.direction.x,
        1.0 / ray.direction.y,
        1.0 / ray.direction.z,
    );

    let t1 = (aabb.min.x - ray.origin.x) * inv_dir.x;
    let t2 = (aabb.max.x - ray.origin.x) * inv_dir.x;
    let t3 = (aabb.min.y - ray.origin.y) * inv_dir.y;
    let t4 = (aabb.max.y - ray.origin.y) * inv_dir.y;
    let t5 = (aabb.min.z - ray.origin.z) * inv_dir.z;
    let t6 = (aabb.max.z - ray.origin.z) * inv_dir.z;

    let tmin = t1.min(t2).max(t3.min(t4)).max(t5.min(t6));
    let tmax = t1.max(t2).min(t3.max(t4)).min(t5.max(t6));

    if tmax < 0.0 || tmin > tmax {
        return None;
    }

    Some(if tmin < 0.0 { tmax } else { tmin })
}

/// Möller-Trumbore ray-triangle intersection algorithm.
/// Returns the distance along the ray if hit, or None if no intersection.
pub fn ray_triangle_intersect(ray: &Ray, v0: DVec3, v1: DVec3, v2: DVec3) -> Option<f64> {
    const EPSILON: f64 = 1e-12;

    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = ray.direction.cross(edge2);
    let a = edge1.dot(h);

    // Ray is parallel to triangle
    if a.abs() < EPSILON {
        return None;
    }

    let f = 1.0 / a;
    let s = ray.origin - v0;
    let u = f * s.dot(h);

    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = s.cross(edge1);
    let v = f * ray.direction.dot(q);

    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = f * edge2.dot(q);

    // Intersection is behind ray origin
    if t > EPSILON {
        Some(t)
    } else {
        None
    }
}

/// Nearest polygon of a mesh hit by the ray: (polygon index, distance).
/// Polygons are fan-triangulated in world space using `matrix`.
pub fn pick_polygon(
    ray: &Ray,
    vertices: &[[f64; 3]],
    polygons: &[Vec<u32>],
    matrix: &DMat4,
) -> Option<(usize, f64)> {
    let world = |i: u32| {
        vertices
            .get(i as usize)
            .map(|co| matrix.transform_point3(DVec3::from_array(*co)))
    };
    let bounds = Aabb::from_points(vertices.iter().map(|co| matrix.transform_point3(DVec3::from_array(*co))))?;
    ray_aabb(ray, &bounds)?;

    let mut best: Option<(usize, f64)> = None;
    for (poly_idx, poly) in polygons.iter().enumerate() {
        if poly.len() < 3 {
            continue;
        }
        let Some(v0) = world(poly[0]) else { continue };
        for pair in poly[1..].windows(2) {
            let (Some(v1), Some(v2)) = (world(pair[0]), world(pair[1])) else {
                continue;
            };
            if let Some(dist) = ray_triangle_intersect(ray, v0, v1, v2) {
                if best.is_none_or(|(_, d)| dist < d) {
                    best = Some((poly_idx, dist));
                }
            }
        }
    }
    best
}
