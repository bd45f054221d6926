//! Narrow-phase collision detection.
//!
//! Every routine returns a [`ContactManifold`] whose normal points from the
//! first body to the second, or `None` when the shapes are further apart
//! than the contact margin.
//!
//! | Pair | Method |
//! |------|--------|
//! | sphere / sphere | center distance |
//! | plane / sphere | signed distance of the center |
//! | plane / box | signed distance of each of the 8 corners |
//! | box / sphere | closest point on the box |
//! | box / box | separating axis test over 15 axes, then vertex containment or edge/edge closest points |
//!
//! Planes are half-spaces: a shape entirely behind a plane is in contact
//! with it, which lets deep penetration be pushed back out over a few steps.

use clatter_contact::{ContactManifold, ContactPoint};
use nalgebra::{Point3, Vector3};

use crate::world::{Body, CollisionShape};

/// Points this far outside a box still count as inside it.
const CONTAINMENT_TOLERANCE: f64 = 1e-3;

/// Cross products shorter than this come from near-parallel edges and are
/// not usable as separating axes.
const DEGENERATE_AXIS: f64 = 1e-6;

/// Detect contact between two bodies.
#[must_use]
pub fn collide(body_a: &Body, body_b: &Body, margin: f64) -> Option<ContactManifold> {
    if body_a.id == body_b.id || (body_a.is_static && body_b.is_static) {
        return None;
    }

    match (&body_a.shape, &body_b.shape) {
        // =====================================================================
        // Sphere collisions
        // =====================================================================
        (CollisionShape::Sphere { radius: r_a }, CollisionShape::Sphere { radius: r_b }) => {
            sphere_sphere(body_a, *r_a, body_b, *r_b, margin)
        }

        (CollisionShape::Plane { normal, offset }, CollisionShape::Sphere { radius }) => {
            plane_sphere(body_a, normal, *offset, body_b, *radius, margin)
        }

        (CollisionShape::Sphere { radius }, CollisionShape::Plane { normal, offset }) => {
            plane_sphere(body_b, normal, *offset, body_a, *radius, margin)
                .map(ContactManifold::flipped)
        }

        // =====================================================================
        // Box collisions
        // =====================================================================
        (CollisionShape::Plane { normal, offset }, CollisionShape::Box { half_extents }) => {
            plane_box(body_a, normal, *offset, body_b, half_extents, margin)
        }

        (CollisionShape::Box { half_extents }, CollisionShape::Plane { normal, offset }) => {
            plane_box(body_b, normal, *offset, body_a, half_extents, margin)
                .map(ContactManifold::flipped)
        }

        (CollisionShape::Box { half_extents }, CollisionShape::Sphere { radius }) => {
            box_sphere(body_a, half_extents, body_b, *radius, margin)
        }

        (CollisionShape::Sphere { radius }, CollisionShape::Box { half_extents }) => {
            box_sphere(body_b, half_extents, body_a, *radius, margin)
                .map(ContactManifold::flipped)
        }

        (
            CollisionShape::Box { half_extents: he_a },
            CollisionShape::Box { half_extents: he_b },
        ) => box_box(body_a, he_a, body_b, he_b, margin),

        (CollisionShape::Plane { .. }, CollisionShape::Plane { .. }) => None,
    }
}

/// World-space surface point and outward normal of a plane body.
fn plane_in_world(plane: &Body, normal: &Vector3<f64>, offset: f64) -> (Point3<f64>, Vector3<f64>) {
    let n = plane.state.pose.transform_vector(normal);
    let origin = plane.state.pose.position + n * offset;
    (origin, n)
}

fn sphere_sphere(
    a: &Body,
    r_a: f64,
    b: &Body,
    r_b: f64,
    margin: f64,
) -> Option<ContactManifold> {
    let delta = b.state.pose.position - a.state.pose.position;
    let dist = delta.norm();
    let penetration = r_a + r_b - dist;
    if penetration < -margin {
        return None;
    }

    // Coincident centers: any direction works, pick up
    let normal = if dist > DEGENERATE_AXIS {
        delta / dist
    } else {
        Vector3::y()
    };
    let point = a.state.pose.position + normal * (r_a - 0.5 * penetration);

    Some(ContactManifold::new(
        a.id,
        b.id,
        normal,
        vec![ContactPoint::new(point, penetration)],
    ))
}

fn plane_sphere(
    plane: &Body,
    normal: &Vector3<f64>,
    offset: f64,
    sphere: &Body,
    radius: f64,
    margin: f64,
) -> Option<ContactManifold> {
    let (origin, n) = plane_in_world(plane, normal, offset);
    let center = sphere.state.pose.position;
    let penetration = radius - (center - origin).dot(&n);
    if penetration < -margin {
        return None;
    }

    Some(ContactManifold::new(
        plane.id,
        sphere.id,
        n,
        vec![ContactPoint::new(center - n * radius, penetration)],
    ))
}

fn plane_box(
    plane: &Body,
    normal: &Vector3<f64>,
    offset: f64,
    cuboid: &Body,
    half_extents: &Vector3<f64>,
    margin: f64,
) -> Option<ContactManifold> {
    let (origin, n) = plane_in_world(plane, normal, offset);

    let points: Vec<_> = box_corners(cuboid, half_extents)
        .into_iter()
        .filter_map(|corner| {
            let penetration = -(corner - origin).dot(&n);
            (penetration >= -margin).then(|| ContactPoint::new(corner, penetration))
        })
        .collect();

    if points.is_empty() {
        return None;
    }
    Some(ContactManifold::new(plane.id, cuboid.id, n, points))
}

fn box_sphere(
    cuboid: &Body,
    half_extents: &Vector3<f64>,
    sphere: &Body,
    radius: f64,
    margin: f64,
) -> Option<ContactManifold> {
    let pose = &cuboid.state.pose;
    let center = sphere.state.pose.position;
    let local = pose.inverse_transform_point(&center);

    let clamped = Point3::new(
        local.x.clamp(-half_extents.x, half_extents.x),
        local.y.clamp(-half_extents.y, half_extents.y),
        local.z.clamp(-half_extents.z, half_extents.z),
    );
    let offset = local - clamped;
    let dist = offset.norm();

    if dist > DEGENERATE_AXIS {
        let penetration = radius - dist;
        if penetration < -margin {
            return None;
        }
        let normal = pose.transform_vector(&(offset / dist));
        return Some(ContactManifold::new(
            cuboid.id,
            sphere.id,
            normal,
            vec![ContactPoint::new(pose.transform_point(&clamped), penetration)],
        ));
    }

    // Center inside the box: leave through the nearest face
    let gaps = [
        half_extents.x - local.x.abs(),
        half_extents.y - local.y.abs(),
        half_extents.z - local.z.abs(),
    ];
    let axis = (0..3)
        .min_by(|&i, &j| gaps[i].total_cmp(&gaps[j]))
        .unwrap_or(1);

    let mut face_normal = Vector3::zeros();
    face_normal[axis] = local[axis].signum();
    let mut surface = local;
    surface[axis] = half_extents[axis] * local[axis].signum();

    Some(ContactManifold::new(
        cuboid.id,
        sphere.id,
        pose.transform_vector(&face_normal),
        vec![ContactPoint::new(
            pose.transform_point(&surface),
            radius + gaps[axis],
        )],
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SatAxis {
    FaceA,
    FaceB,
    Edge(usize, usize),
}

fn box_box(
    a: &Body,
    he_a: &Vector3<f64>,
    b: &Body,
    he_b: &Vector3<f64>,
    margin: f64,
) -> Option<ContactManifold> {
    let axes_a = box_axes(a);
    let axes_b = box_axes(b);
    let center_a = a.state.pose.position;
    let center_b = b.state.pose.position;
    let d = center_b - center_a;

    let mut candidates: Vec<(Vector3<f64>, SatAxis)> = Vec::with_capacity(15);
    candidates.extend(axes_a.iter().map(|axis| (*axis, SatAxis::FaceA)));
    candidates.extend(axes_b.iter().map(|axis| (*axis, SatAxis::FaceB)));
    for (i, ea) in axes_a.iter().enumerate() {
        for (j, eb) in axes_b.iter().enumerate() {
            if let Some(axis) = ea.cross(eb).try_normalize(DEGENERATE_AXIS) {
                candidates.push((axis, SatAxis::Edge(i, j)));
            }
        }
    }

    // (score, overlap, normal A→B, kind)
    let mut best: Option<(f64, f64, Vector3<f64>, SatAxis)> = None;
    for (axis, kind) in candidates {
        let proj_a = projected_radius(&axes_a, he_a, &axis);
        let proj_b = projected_radius(&axes_b, he_b, &axis);
        let dist = d.dot(&axis);
        let overlap = proj_a + proj_b - dist.abs();
        if overlap < -margin {
            return None;
        }

        // Edge axes must win clearly, face contacts are far more stable
        let score = match kind {
            SatAxis::Edge(..) => overlap * 1.05 + 0.001,
            _ => overlap,
        };
        if best.is_none_or(|(s, ..)| score < s) {
            let normal = if dist < 0.0 { -axis } else { axis };
            best = Some((score, overlap, normal, kind));
        }
    }

    let (_, overlap, normal, kind) = best?;

    let points = match kind {
        SatAxis::Edge(i, j) => {
            vec![edge_edge_point(
                &center_a, &axes_a, he_a, i, &center_b, &axes_b, he_b, j, &normal, overlap,
            )]
        }
        SatAxis::FaceA | SatAxis::FaceB => {
            contained_vertices(a, he_a, &axes_a, b, he_b, &axes_b, &normal, overlap, margin)
        }
    };

    Some(ContactManifold::new(a.id, b.id, normal, points))
}

#[allow(clippy::too_many_arguments)]
fn contained_vertices(
    a: &Body,
    he_a: &Vector3<f64>,
    axes_a: &[Vector3<f64>; 3],
    b: &Body,
    he_b: &Vector3<f64>,
    axes_b: &[Vector3<f64>; 3],
    normal: &Vector3<f64>,
    overlap: f64,
    margin: f64,
) -> Vec<ContactPoint> {
    let tolerance = CONTAINMENT_TOLERANCE + margin;

    // Furthest extent of A along n, nearest extent of B along n
    let top_a = a.state.pose.position.coords.dot(normal) + projected_radius(axes_a, he_a, normal);
    let bottom_b =
        b.state.pose.position.coords.dot(normal) - projected_radius(axes_b, he_b, normal);

    let corners_b = box_corners(b, he_b);
    let mut points = Vec::new();

    for corner in &corners_b {
        if contains(a, he_a, corner, tolerance) {
            let depth = (top_a - corner.coords.dot(normal)).min(overlap);
            if depth >= -margin {
                points.push(ContactPoint::new(*corner, depth));
            }
        }
    }
    for corner in &box_corners(a, he_a) {
        if contains(b, he_b, corner, tolerance) {
            let depth = (corner.coords.dot(normal) - bottom_b).min(overlap);
            if depth >= -margin {
                points.push(ContactPoint::new(*corner, depth));
            }
        }
    }

    if points.is_empty() {
        // No vertex inside the other box: use B's deepest corner
        if let Some(corner) = corners_b
            .iter()
            .min_by(|p, q| p.coords.dot(normal).total_cmp(&q.coords.dot(normal)))
        {
            points.push(ContactPoint::new(*corner, overlap));
        }
    }

    points
}

#[allow(clippy::too_many_arguments)]
fn edge_edge_point(
    center_a: &Point3<f64>,
    axes_a: &[Vector3<f64>; 3],
    he_a: &Vector3<f64>,
    i: usize,
    center_b: &Point3<f64>,
    axes_b: &[Vector3<f64>; 3],
    he_b: &Vector3<f64>,
    j: usize,
    normal: &Vector3<f64>,
    overlap: f64,
) -> ContactPoint {
    // Edge of A furthest along n, edge of B furthest along -n
    let mut pa = *center_a;
    let mut pb = *center_b;
    for k in 0..3 {
        if k != i {
            pa += axes_a[k] * (he_a[k] * axes_a[k].dot(normal).signum());
        }
        if k != j {
            pb -= axes_b[k] * (he_b[k] * axes_b[k].dot(normal).signum());
        }
    }
    let da = axes_a[i];
    let db = axes_b[j];

    // Closest points between the two segments
    let r = pa - pb;
    let b_dot = da.dot(&db);
    let c = da.dot(&r);
    let f = db.dot(&r);
    let denom = 1.0 - b_dot * b_dot;

    let mut s = if denom > DEGENERATE_AXIS {
        ((b_dot * f - c) / denom).clamp(-he_a[i], he_a[i])
    } else {
        0.0
    };
    let t = (b_dot * s + f).clamp(-he_b[j], he_b[j]);
    s = (b_dot * t - c).clamp(-he_a[i], he_a[i]);

    let on_a = pa + da * s;
    let on_b = pb + db * t;
    ContactPoint::new(Point3::from((on_a.coords + on_b.coords) * 0.5), overlap)
}

fn box_axes(body: &Body) -> [Vector3<f64>; 3] {
    let pose = &body.state.pose;
    [
        pose.transform_vector(&Vector3::x()),
        pose.transform_vector(&Vector3::y()),
        pose.transform_vector(&Vector3::z()),
    ]
}

fn projected_radius(axes: &[Vector3<f64>; 3], half_extents: &Vector3<f64>, dir: &Vector3<f64>) -> f64 {
    half_extents.x * axes[0].dot(dir).abs()
        + half_extents.y * axes[1].dot(dir).abs()
        + half_extents.z * axes[2].dot(dir).abs()
}

fn contains(body: &Body, half_extents: &Vector3<f64>, point: &Point3<f64>, tolerance: f64) -> bool {
    let local = body.state.pose.inverse_transform_point(point);
    local.x.abs() <= half_extents.x + tolerance
        && local.y.abs() <= half_extents.y + tolerance
        && local.z.abs() <= half_extents.z + tolerance
}

fn box_corners(body: &Body, half_extents: &Vector3<f64>) -> [Point3<f64>; 8] {
    let pose = &body.state.pose;
    let mut corners = [Point3::origin(); 8];
    for (n, corner) in corners.iter_mut().enumerate() {
        let sx = if n & 1 == 0 { -1.0 } else { 1.0 };
        let sy = if n & 2 == 0 { -1.0 } else { 1.0 };
        let sz = if n & 4 == 0 { -1.0 } else { 1.0 };
        *corner = pose.transform_point(&Point3::new(
            sx * half_extents.x,
            sy * half_extents.y,
            sz * half_extents.z,
        ));
    }
    corners
}
