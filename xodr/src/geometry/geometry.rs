use glam::{DMat2, DVec2};
use serde::{Deserialize, Serialize};

use super::spiral;
use super::{PointAndTangentDir, Poly3, Tessellation, Vertex};

/// The fixed tessellation density: vertices per meter of arc length.
pub const NUM_VERTICES_PER_METER: f64 = 1.0;

/// Tolerance used when checking whether an s-coordinate lies in a geometry's
/// s-range.
const S_RANGE_EPSILON: f64 = 1e-5;

/// The parameter range of a [`GeometryShape::ParamPoly3`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PRange {
    /// The parameter runs from 0 at the start vertex to the geometry's
    /// length at the end vertex.
    ArcLength,
    /// The parameter runs from 0 at the start vertex to 1 at the end vertex.
    #[default]
    Normalized,
}

/// Discriminant of the five geometry shapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryType {
    Line,
    Spiral,
    Arc,
    Poly3,
    ParamPoly3,
}

/// The shape-specific data of a [`Geometry`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum GeometryShape {
    /// A straight segment along the start vertex' heading.
    Line,
    /// An Euler spiral: curvature changes linearly from `start_curvature` at
    /// the start vertex to `end_curvature` at the end vertex.
    Spiral { start_curvature: f64, end_curvature: f64 },
    /// A circle segment with constant non-zero curvature. Positive curvature
    /// bends counter-clockwise.
    Arc { curvature: f64 },
    /// The explicit cubic `(u, poly(u))` in the local frame of the start
    /// vertex, with `u` the arc-length offset from the start.
    Poly3 { poly: Poly3 },
    /// The parametric cubic `(u_poly(t), v_poly(t))` in the local frame of
    /// the start vertex.
    ParamPoly3 { u_poly: Poly3, v_poly: Poly3, p_range: PRange },
}

/// One piece of a road reference line.
///
/// All shapes share the start vertex and length and support the same
/// operations: point/tangent evaluation, signed curvature, analytic end
/// vertex, and fixed-density tessellation. The s-coordinates accepted by the
/// evaluation functions are absolute (they include `start_vertex.s_coord`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    start_vertex: Vertex,
    length: f64,
    shape: GeometryShape,
}

impl Geometry {
    pub fn new(start_vertex: Vertex, length: f64, shape: GeometryShape) -> Self {
        Geometry {
            start_vertex,
            length,
            shape,
        }
    }

    pub fn line(start_vertex: Vertex, length: f64) -> Self {
        Geometry::new(start_vertex, length, GeometryShape::Line)
    }

    /// A line between two distinct points, starting at s-coordinate
    /// `start_s`.
    pub fn line_between(start_s: f64, from: DVec2, to: DVec2) -> Self {
        let dir = to - from;
        debug_assert!(dir.length() > 0.0);
        Geometry::new(
            Vertex {
                s_coord: start_s,
                position: from,
                heading: dir.y.atan2(dir.x),
            },
            dir.length(),
            GeometryShape::Line,
        )
    }

    pub fn spiral(start_vertex: Vertex, length: f64, start_curvature: f64, end_curvature: f64) -> Self {
        debug_assert!(start_curvature != end_curvature);
        Geometry::new(
            start_vertex,
            length,
            GeometryShape::Spiral {
                start_curvature,
                end_curvature,
            },
        )
    }

    pub fn arc(start_vertex: Vertex, length: f64, curvature: f64) -> Self {
        debug_assert!(curvature != 0.0);
        Geometry::new(start_vertex, length, GeometryShape::Arc { curvature })
    }

    /// An arc built from a circle segment. The circle is given by center and
    /// radius, the segment by the angle of its start point (relative to the
    /// positive x-axis) and its central angle. A positive `segment_angle`
    /// extends counter-clockwise from the start point, a negative one
    /// clockwise.
    pub fn arc_from_circle_segment(
        start_s: f64,
        circle_center: DVec2,
        radius: f64,
        start_angle: f64,
        segment_angle: f64,
    ) -> Self {
        let to_start = DVec2::new(start_angle.cos(), start_angle.sin()) * radius;

        let (heading, curvature) = if segment_angle > 0.0 {
            (start_angle + 0.5 * std::f64::consts::PI, 1.0 / radius)
        } else {
            (start_angle - 0.5 * std::f64::consts::PI, -1.0 / radius)
        };

        Geometry::new(
            Vertex {
                s_coord: start_s,
                position: circle_center + to_start,
                heading,
            },
            segment_angle.abs() * radius,
            GeometryShape::Arc { curvature },
        )
    }

    pub fn poly3(start_vertex: Vertex, length: f64, poly: Poly3) -> Self {
        Geometry::new(start_vertex, length, GeometryShape::Poly3 { poly })
    }

    pub fn param_poly3(start_vertex: Vertex, length: f64, u_poly: Poly3, v_poly: Poly3, p_range: PRange) -> Self {
        Geometry::new(
            start_vertex,
            length,
            GeometryShape::ParamPoly3 {
                u_poly,
                v_poly,
                p_range,
            },
        )
    }

    pub fn start_vertex(&self) -> Vertex {
        self.start_vertex
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn shape(&self) -> &GeometryShape {
        &self.shape
    }

    pub fn geometry_type(&self) -> GeometryType {
        match self.shape {
            GeometryShape::Line => GeometryType::Line,
            GeometryShape::Spiral { .. } => GeometryType::Spiral,
            GeometryShape::Arc { .. } => GeometryType::Arc,
            GeometryShape::Poly3 { .. } => GeometryType::Poly3,
            GeometryShape::ParamPoly3 { .. } => GeometryType::ParamPoly3,
        }
    }

    /// Whether `s` lies in this geometry's s-range, with a small tolerance on
    /// both ends.
    pub fn in_s_range(&self, s: f64) -> bool {
        let local_s = s - self.start_vertex.s_coord;
        local_s >= -S_RANGE_EPSILON && local_s < self.length + S_RANGE_EPSILON
    }

    /// The curvature rate of change of a spiral. Only meaningful for
    /// spirals.
    fn spiral_rate_of_change(&self, start_curvature: f64, end_curvature: f64) -> f64 {
        (end_curvature - start_curvature) / self.length
    }

    /// Evaluates the point with the given s-coordinate and the tangent
    /// direction at that point. `s` must lie in this geometry's s-range.
    pub fn eval(&self, s: f64) -> PointAndTangentDir {
        debug_assert!(self.in_s_range(s));
        let start = self.start_vertex;

        match self.shape {
            GeometryShape::Line => {
                let tangent_dir = DVec2::new(start.heading.cos(), start.heading.sin());
                PointAndTangentDir::new(start.position + (s - start.s_coord) * tangent_dir, tangent_dir)
            }
            GeometryShape::Spiral {
                start_curvature,
                end_curvature,
            } => {
                let rate = self.spiral_rate_of_change(start_curvature, end_curvature);
                let start_param = start_curvature / rate;
                let eval_param = start_param + (s - start.s_coord);

                let start_heading = spiral::canonical_heading(start_param, rate);
                let eval_heading = spiral::canonical_heading(eval_param, rate);

                let rotation = DMat2::from_angle(start.heading - start_heading);
                let offset = rotation * spiral::arc_delta(start_param, eval_param, rate);

                let heading = start.heading + (eval_heading - start_heading);
                PointAndTangentDir::new(start.position + offset, DVec2::new(heading.cos(), heading.sin()))
            }
            GeometryShape::Arc { curvature } => {
                let radius = 1.0 / curvature;
                let to_center = DVec2::new(-start.heading.sin(), start.heading.cos());
                let center = start.position + to_center * radius;

                let heading = start.heading + (s - start.s_coord) * curvature;
                let tangent_dir = DVec2::new(heading.cos(), heading.sin());
                let point = center + DVec2::new(tangent_dir.y, -tangent_dir.x) * radius;
                PointAndTangentDir::new(point, tangent_dir)
            }
            GeometryShape::Poly3 { poly } => {
                let forward = DVec2::new(start.heading.cos(), start.heading.sin());
                let side = DVec2::new(-forward.y, forward.x);

                let u = s - start.s_coord;
                let v = poly.eval(u);
                let dv = poly.eval_derivative(u);

                PointAndTangentDir::new(
                    start.position + u * forward + v * side,
                    (forward + dv * side).normalize(),
                )
            }
            GeometryShape::ParamPoly3 {
                u_poly,
                v_poly,
                p_range,
            } => {
                let forward = DVec2::new(start.heading.cos(), start.heading.sin());
                let side = DVec2::new(-forward.y, forward.x);

                let mut param = s - start.s_coord;
                if p_range == PRange::Normalized {
                    param /= self.length;
                }

                let u = u_poly.eval(param);
                let v = v_poly.eval(param);
                let du = u_poly.eval_derivative(param);
                let dv = v_poly.eval_derivative(param);

                PointAndTangentDir::new(
                    start.position + u * forward + v * side,
                    (du * forward + dv * side).normalize(),
                )
            }
        }
    }

    /// Evaluates the signed curvature at the given s-coordinate. Positive
    /// curvature is directed counter-clockwise. `s` must lie in this
    /// geometry's s-range.
    pub fn eval_curvature(&self, s: f64) -> f64 {
        debug_assert!(self.in_s_range(s));

        match self.shape {
            GeometryShape::Line => 0.0,
            GeometryShape::Spiral {
                start_curvature,
                end_curvature,
            } => {
                let rate = self.spiral_rate_of_change(start_curvature, end_curvature);
                start_curvature + (s - self.start_vertex.s_coord) * rate
            }
            GeometryShape::Arc { curvature } => curvature,
            GeometryShape::Poly3 { poly } => {
                let u = s - self.start_vertex.s_coord;
                let derivative = poly.eval_derivative(u);
                poly.eval_2nd_derivative(u) / (1.0 + derivative * derivative).powf(1.5)
            }
            GeometryShape::ParamPoly3 {
                u_poly,
                v_poly,
                p_range,
            } => {
                let mut param = s - self.start_vertex.s_coord;
                if p_range == PRange::Normalized {
                    param /= self.length;
                }
                let du = u_poly.eval_derivative(param);
                let dv = v_poly.eval_derivative(param);
                let numerator = du * v_poly.eval_2nd_derivative(param) - dv * u_poly.eval_2nd_derivative(param);
                numerator / (du * du + dv * dv).powf(1.5)
            }
        }
    }

    /// Computes the end vertex of this geometry.
    ///
    /// The end vertex of a geometry equals the start vertex of the next one
    /// (or the reference line's cached end vertex for the last geometry), so
    /// this is mostly needed while assembling a reference line.
    pub fn end_vertex(&self) -> Vertex {
        let start = self.start_vertex;

        match self.shape {
            GeometryShape::Line => {
                let forward = DVec2::new(start.heading.cos(), start.heading.sin());
                Vertex {
                    s_coord: start.s_coord + self.length,
                    position: start.position + self.length * forward,
                    heading: start.heading,
                }
            }
            GeometryShape::Spiral {
                start_curvature,
                end_curvature,
            } => {
                let rate = self.spiral_rate_of_change(start_curvature, end_curvature);
                let start_param = start_curvature / rate;
                let end_param = start_param + self.length;

                let start_heading = spiral::canonical_heading(start_param, rate);
                let end_heading = spiral::canonical_heading(end_param, rate);

                let rotation = DMat2::from_angle(start.heading - start_heading);
                let offset = rotation * spiral::arc_delta(start_param, end_param, rate);

                Vertex {
                    s_coord: start.s_coord + self.length,
                    position: start.position + offset,
                    heading: start.heading + (end_heading - start_heading),
                }
            }
            GeometryShape::Arc { curvature } => {
                let radius = 1.0 / curvature;
                let start_normal = DVec2::new(-start.heading.sin(), start.heading.cos());
                let center = start.position + start_normal * radius;

                let heading = start.heading + self.length * curvature;
                let end_normal = DVec2::new(-heading.sin(), heading.cos());
                Vertex {
                    s_coord: start.s_coord + self.length,
                    position: center - end_normal * radius,
                    heading,
                }
            }
            GeometryShape::Poly3 { poly } => {
                let forward = DVec2::new(start.heading.cos(), start.heading.sin());
                let side = DVec2::new(-forward.y, forward.x);

                let end_u = self.length;
                let end_v = poly.eval(end_u);
                let heading_diff = poly.eval_derivative(end_u).atan();

                Vertex {
                    s_coord: start.s_coord + end_u,
                    position: start.position + end_u * forward + end_v * side,
                    heading: start.heading + heading_diff,
                }
            }
            GeometryShape::ParamPoly3 {
                u_poly,
                v_poly,
                p_range,
            } => {
                let forward = DVec2::new(start.heading.cos(), start.heading.sin());
                let side = DVec2::new(-forward.y, forward.x);

                let end_t = match p_range {
                    PRange::ArcLength => self.length,
                    PRange::Normalized => 1.0,
                };

                let end_u = u_poly.eval(end_t);
                let end_v = v_poly.eval(end_t);
                let heading_diff = v_poly.eval_derivative(end_t).atan2(u_poly.eval_derivative(end_t));

                Vertex {
                    s_coord: start.s_coord + self.length,
                    position: start.position + end_u * forward + end_v * side,
                    heading: start.heading + heading_diff,
                }
            }
        }
    }

    /// Appends a tessellation of the section of this geometry with s-values
    /// in `[start_s, end_s]` to `tessellation`.
    ///
    /// `[start_s, end_s]` must be a non-empty subset of this geometry's full
    /// s-range. Vertices are emitted at a fixed density of
    /// [`NUM_VERTICES_PER_METER`], starting exactly at `start_s`; the closing
    /// vertex at `end_s` is emitted only when `include_end_pt` is true, so a
    /// caller stitching several geometries together gets each seam vertex
    /// exactly once.
    pub fn tessellate(&self, tessellation: &mut Tessellation, start_s: f64, end_s: f64, include_end_pt: bool) {
        let start = self.start_vertex;

        debug_assert!(start_s >= start.s_coord - S_RANGE_EPSILON);
        debug_assert!(end_s <= start.s_coord + self.length + S_RANGE_EPSILON);
        debug_assert!(start_s < end_s);

        let mut num = ((end_s - start_s) * NUM_VERTICES_PER_METER).ceil() as usize;
        num = num.max(1);
        let step_size = (end_s - start_s) / num as f64;
        if include_end_pt {
            num += 1;
        }

        match self.shape {
            GeometryShape::Line => {
                let forward = DVec2::new(start.heading.cos(), start.heading.sin());
                let start_t = start_s - start.s_coord;
                for i in 0..num {
                    let t = start_t + i as f64 * step_size;
                    tessellation.push(Vertex {
                        s_coord: start_s + i as f64 * step_size,
                        position: start.position + t * forward,
                        heading: start.heading,
                    });
                }
            }
            GeometryShape::Spiral {
                start_curvature,
                end_curvature,
            } => {
                let rate = self.spiral_rate_of_change(start_curvature, end_curvature);
                let curve_start_param = start_curvature / rate;
                let curve_start_heading = spiral::canonical_heading(curve_start_param, rate);
                let rotation = DMat2::from_angle(start.heading - curve_start_heading);

                let start_param = curve_start_param + (start_s - start.s_coord);
                for i in 0..num {
                    let t = start_param + i as f64 * step_size;
                    let offset = rotation * spiral::arc_delta(curve_start_param, t, rate);
                    tessellation.push(Vertex {
                        s_coord: start_s + i as f64 * step_size,
                        position: start.position + offset,
                        heading: start.heading + (spiral::canonical_heading(t, rate) - curve_start_heading),
                    });
                }
            }
            GeometryShape::Arc { curvature } => {
                let radius = 1.0 / curvature;
                let to_center = DVec2::new(-start.heading.sin(), start.heading.cos());
                let center = start.position + to_center * radius;

                let clamped_start_heading = start.heading + (start_s - start.s_coord) * curvature;
                for i in 0..num {
                    let heading = clamped_start_heading + i as f64 * step_size * curvature;
                    let to_circle = DVec2::new(heading.sin(), -heading.cos());
                    tessellation.push(Vertex {
                        s_coord: start_s + i as f64 * step_size,
                        position: center + to_circle * radius,
                        heading,
                    });
                }
            }
            GeometryShape::Poly3 { poly } => {
                let forward = DVec2::new(start.heading.cos(), start.heading.sin());
                let side = DVec2::new(-forward.y, forward.x);

                let start_u = start_s - start.s_coord;
                for i in 0..num {
                    let u = start_u + i as f64 * step_size;
                    let v = poly.eval(u);
                    tessellation.push(Vertex {
                        s_coord: start_s + i as f64 * step_size,
                        position: start.position + u * forward + v * side,
                        heading: start.heading + poly.eval_derivative(u).atan(),
                    });
                }
            }
            GeometryShape::ParamPoly3 {
                u_poly,
                v_poly,
                p_range,
            } => {
                let forward = DVec2::new(start.heading.cos(), start.heading.sin());
                let side = DVec2::new(-forward.y, forward.x);

                let mut start_param = start_s - start.s_coord;
                let mut param_step_size = step_size;
                if p_range == PRange::Normalized {
                    let scale = 1.0 / self.length;
                    start_param *= scale;
                    param_step_size *= scale;
                }

                for i in 0..num {
                    let t = start_param + i as f64 * param_step_size;
                    let u = u_poly.eval(t);
                    let v = v_poly.eval(t);
                    let heading_diff = v_poly.eval_derivative(t).atan2(u_poly.eval_derivative(t));
                    tessellation.push(Vertex {
                        s_coord: start_s + i as f64 * step_size,
                        position: start.position + u * forward + v * side,
                        heading: start.heading + heading_diff,
                    });
                }
            }
        }
    }
}
