//! Math utilities
//!
//! Re-exports from glam plus the bounds types and tolerant comparisons used
//! while cooking mesh geometry.

pub use glam::{Mat4, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Two positions closer than this on every axis are the same point
pub const THRESH_POINTS_ARE_SAME: f32 = 0.00002;
/// Two normals closer than this on every axis are the same direction
pub const THRESH_NORMALS_ARE_SAME: f32 = 0.00002;
/// Two texture coordinates closer than this on every axis are the same
pub const THRESH_UVS_ARE_SAME: f32 = 1.0 / 1024.0;
/// Generic "effectively zero" value
pub const SMALL_NUMBER: f32 = 1.0e-8;
/// Looser "effectively zero" value
pub const KINDA_SMALL_NUMBER: f32 = 1.0e-4;
/// Minimum squared length kept by [`create_orthonormal_basis`]
pub const DELTA: f32 = 0.00001;

/// Axis-aligned box; `min > max` on any axis means empty
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Tightest box around `points`, [`Aabb::EMPTY`] for none
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        points.into_iter().fold(Self::EMPTY, |mut aabb, point| {
            aabb.add_point(point);
            aabb
        })
    }

    pub fn add_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) / 2.0
    }

    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) / 2.0
    }

    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Box and sphere bounds sharing one origin, as stored with built render data
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoxSphereBounds {
    pub origin: Vec3,
    /// Half-size of the box on each axis
    pub box_extent: Vec3,
    pub sphere_radius: f32,
}

/// Per-axis position comparison
pub fn points_equal(a: Vec3, b: Vec3, tolerance: f32) -> bool {
    (a.x - b.x).abs() <= tolerance
        && (a.y - b.y).abs() <= tolerance
        && (a.z - b.z).abs() <= tolerance
}

/// Per-axis normal comparison
pub fn normals_equal(a: Vec3, b: Vec3) -> bool {
    points_equal(a, b, THRESH_NORMALS_ARE_SAME)
}

/// Per-axis texture coordinate comparison
pub fn uvs_equal(a: Vec2, b: Vec2) -> bool {
    (a.x - b.x).abs() <= THRESH_UVS_ARE_SAME && (a.y - b.y).abs() <= THRESH_UVS_ARE_SAME
}

/// Unit vector in the direction of `v`, or zero when its squared length is at most `tolerance`
pub fn safe_normal(v: Vec3, tolerance: f32) -> Vec3 {
    let square_sum = v.length_squared();
    if square_sum == 1.0 {
        v
    } else if square_sum <= tolerance {
        Vec3::ZERO
    } else {
        v / square_sum.sqrt()
    }
}

/// Normalize `v` if it is long enough, otherwise return it unchanged
pub fn normalize_or_keep(v: Vec3) -> Vec3 {
    let square_sum = v.length_squared();
    if square_sum > SMALL_NUMBER {
        v / square_sum.sqrt()
    } else {
        v
    }
}

/// Scalar triple product `x · (y × z)`
pub fn triple(x: Vec3, y: Vec3, z: Vec3) -> f32 {
    x.dot(y.cross(z))
}

/// Sign of the determinant of the basis with rows `x`, `y`, `z`
pub fn basis_determinant_sign(x: Vec3, y: Vec3, z: Vec3) -> f32 {
    if triple(x, y, z) < 0.0 { -1.0 } else { 1.0 }
}

/// Make `x` and `y` perpendicular to `z`, then normalize all three.
///
/// `x` and `y` are only projected off `z`; they are not made orthogonal to
/// each other.
pub fn create_orthonormal_basis(x: &mut Vec3, y: &mut Vec3, z: &mut Vec3) {
    let z_len_sq = z.length_squared();
    if z_len_sq > 0.0 {
        *x -= *z * (x.dot(*z) / z_len_sq);
        *y -= *z * (y.dot(*z) / z_len_sq);
    }

    if x.length_squared() < DELTA * DELTA {
        *x = y.cross(*z);
    }
    if y.length_squared() < DELTA * DELTA {
        *y = x.cross(*z);
    }

    *x = normalize_or_keep(*x);
    *y = normalize_or_keep(*y);
    *z = normalize_or_keep(*z);
}

/// Invert a matrix, falling back to identity when it is singular
pub fn inverse_or_identity(matrix: Mat4) -> Mat4 {
    let det = matrix.determinant();
    if det == 0.0 || !det.is_finite() {
        Mat4::IDENTITY
    } else {
        matrix.inverse()
    }
}
