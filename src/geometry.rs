//! Plane and box geometry used by the oriented slicer.
//!
//! All coordinates are voxel (pixel) space: the volume occupies the box
//! `[0, nx] x [0, ny] x [0, nz]`.

use glam::{DVec2, DVec3};

/// Norms below this are treated as zero when building a plane.
const DEGENERATE_EPSILON: f64 = 1e-9;

/// Plane `a*x + b*y + c*z + d = 0` with `(a, b, c)` of unit length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaneEquation {
    pub normal: DVec3,
    pub d: f64,
}

impl PlaneEquation {
    pub fn coefficients(&self) -> [f64; 4] {
        [self.normal.x, self.normal.y, self.normal.z, self.d]
    }

    /// Move the plane by `distance` along its normal.
    ///
    /// The offset is applied to `d`, so a positive distance moves the plane
    /// toward `-normal`.
    pub fn translated(self, distance: f64) -> Self {
        Self {
            normal: self.normal,
            d: self.d + distance,
        }
    }

    /// Signed distance from the origin to the plane, measured along the normal.
    pub fn origin_distance(&self) -> f64 {
        -self.d
    }

    pub fn signed_distance(&self, p: DVec3) -> f64 {
        self.normal.dot(p) + self.d
    }
}

/// Plane through three points.
///
/// Returns `None` when the points are collinear or coincident.
pub fn plane_from_points(a: DVec3, b: DVec3, c: DVec3) -> Option<PlaneEquation> {
    let ab = normalized(b - a)?;
    let ac = normalized(c - a)?;
    let normal = normalized(ab.cross(ac))?;
    Some(PlaneEquation {
        normal,
        d: -a.dot(normal),
    })
}

fn normalized(v: DVec3) -> Option<DVec3> {
    let norm = v.length();
    // also rejects NaN
    if norm > DEGENERATE_EPSILON {
        Some(v / norm)
    } else {
        None
    }
}

/// Intersections between a plane and the 12 edges of the box `[0, dims]`.
///
/// Each family of axis-parallel edges is only solved when the plane's
/// coefficient for that axis is non-zero. Corners may appear more than once.
pub fn box_plane_intersections(dims: (usize, usize, usize), plane: &PlaneEquation) -> Vec<DVec3> {
    let dims = DVec3::new(dims.0 as f64, dims.1 as f64, dims.2 as f64);
    let coeffs = plane.normal.to_array();
    let mut points = Vec::with_capacity(6);

    for axis in 0..3 {
        let coeff = coeffs[axis];
        if coeff.abs() <= f64::EPSILON {
            continue;
        }
        let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
        for cu in [0.0, dims[u]] {
            for cv in [0.0, dims[v]] {
                let free = -(coeffs[u] * cu + coeffs[v] * cv + plane.d) / coeff;
                if (0.0..=dims[axis]).contains(&free) {
                    let mut p = DVec3::ZERO;
                    p[axis] = free;
                    p[u] = cu;
                    p[v] = cv;
                    points.push(p);
                }
            }
        }
    }

    points
}

/// Axis-aligned 2D bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox2 {
    pub min: DVec2,
    pub max: DVec2,
}

impl BBox2 {
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Corners ordered top-left, top-right, bottom-left, bottom-right.
    pub fn corners(&self) -> [DVec2; 4] {
        [
            DVec2::new(self.min.x, self.max.y),
            DVec2::new(self.max.x, self.max.y),
            DVec2::new(self.min.x, self.min.y),
            DVec2::new(self.max.x, self.min.y),
        ]
    }
}

/// Bounding box over `points`, or `None` if there are none.
pub fn bbox_2d(points: &[DVec2]) -> Option<BBox2> {
    let (first, rest) = points.split_first()?;
    let bbox = rest.iter().fold(
        BBox2 {
            min: *first,
            max: *first,
        },
        |bbox, p| BBox2 {
            min: bbox.min.min(*p),
            max: bbox.max.max(*p),
        },
    );
    Some(bbox)
}

/// Row-major 3x3 matrix.
pub type Mat3 = [[f64; 3]; 3];

/// Dense `m * v`.
#[inline(always)]
pub fn rotate_vector(m: &Mat3, v: [f64; 3]) -> [f64; 3] {
    [
        v[0] * m[0][0] + v[1] * m[0][1] + v[2] * m[0][2],
        v[0] * m[1][0] + v[1] * m[1][1] + v[2] * m[1][2],
        v[0] * m[2][0] + v[1] * m[2][1] + v[2] * m[2][2],
    ]
}

pub fn transpose(m: &Mat3) -> Mat3 {
    [
        [m[0][0], m[1][0], m[2][0]],
        [m[0][1], m[1][1], m[2][1]],
        [m[0][2], m[1][2], m[2][2]],
    ]
}

/// Right-handed orthonormal frame attached to a plane.
///
/// X runs along the first edge of the defining triangle, Z is the plane
/// normal and Y completes the basis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalFrame {
    /// Rows are the local axes; maps world to local.
    pub world_to_local: Mat3,
    /// Transpose of `world_to_local`; maps local to world.
    pub local_to_world: Mat3,
}

impl LocalFrame {
    pub fn new(a: DVec3, b: DVec3, normal: DVec3) -> Option<Self> {
        let x = normalized(b - a)?;
        let y = normal.cross(x);
        let world_to_local = [x.to_array(), y.to_array(), normal.to_array()];
        Some(Self {
            world_to_local,
            local_to_world: transpose(&world_to_local),
        })
    }

    pub fn to_local(&self, p: DVec3) -> DVec3 {
        DVec3::from_array(rotate_vector(&self.world_to_local, p.to_array()))
    }

    pub fn to_world(&self, p: DVec3) -> DVec3 {
        DVec3::from_array(rotate_vector(&self.local_to_world, p.to_array()))
    }
}
