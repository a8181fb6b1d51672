//! The reference-line geometry engine.
//!
//! A road's shape is given by its reference line, a piecewise-analytic 2D
//! curve assembled from five geometry primitives (straight line, circular
//! arc, Euler spiral, cubic polynomial, parametric cubic). All primitives
//! share one capability set: evaluating a point and tangent direction at an
//! s-coordinate, evaluating signed curvature, computing the end vertex
//! analytically, and appending a fixed-density piecewise-linear tessellation.

mod geometry;
mod poly3;
mod reference_line;
mod spiral;

pub use self::geometry::{Geometry, GeometryShape, GeometryType, PRange, NUM_VERTICES_PER_METER};
pub use self::poly3::Poly3;
pub use self::reference_line::ReferenceLine;

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// A vertex of a tessellation: a sample of a curve at a given s-coordinate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// The s-coordinate of this vertex, measured from the beginning of the
    /// reference line.
    pub s_coord: f64,
    /// The position of this vertex.
    pub position: DVec2,
    /// The heading at this vertex, in radians.
    pub heading: f64,
}

/// A piecewise linear approximation of a curve.
pub type Tessellation = Vec<Vertex>;

/// A point on a curve together with the curve's tangent direction there.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointAndTangentDir {
    pub point: DVec2,
    /// Unit tangent direction of the curve at `point`.
    pub tangent_dir: DVec2,
}

impl PointAndTangentDir {
    pub fn new(point: DVec2, tangent_dir: DVec2) -> Self {
        PointAndTangentDir { point, tangent_dir }
    }

    /// The tangent direction rotated 90 degrees counter-clockwise. This is
    /// the direction of increasing t-coordinates.
    pub fn side_dir(&self) -> DVec2 {
        DVec2::new(-self.tangent_dir.y, self.tangent_dir.x)
    }

    /// The point at lateral offset `t` from this point, along `side_dir`.
    pub fn point_with_t_coord(&self, t: f64) -> DVec2 {
        self.point + t * self.side_dir()
    }
}
