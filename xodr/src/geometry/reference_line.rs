use std::sync::OnceLock;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::result::{Invalidations, XodrParseError, XodrParseResult};
use crate::xml::{FromXmlAttribute, XmlAttributeParsers, XmlChildElementParsers};

use super::{Geometry, GeometryShape, PRange, PointAndTangentDir, Poly3, Tessellation, Vertex};

/// The reference line of a road.
///
/// The reference line specifies the road's basic 2D shape and is the basis of
/// the st-coordinate system used for lane geometry: the s-coordinate measures
/// arc length along this curve, the t-coordinate the lateral offset parallel
/// to it (left positive).
///
/// Geometries are stored in increasing s order and cover the contiguous
/// s-range `[0, end_s()]`; each geometry starts where the previous one ends.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReferenceLine {
    geometries: Vec<Geometry>,
    end_vertex: Vertex,
}

impl ReferenceLine {
    /// Assembles a reference line from consecutive geometries.
    pub fn from_geometries(geometries: Vec<Geometry>) -> Self {
        let end_vertex = match geometries.last() {
            Some(last) => last.end_vertex(),
            None => Vertex::default(),
        };
        ReferenceLine {
            geometries,
            end_vertex,
        }
    }

    /// Parses a ReferenceLine from the text of a `<planView>` element.
    pub fn from_text(text: &str) -> Result<XodrParseResult<ReferenceLine>> {
        let doc = roxmltree::Document::parse(text).context("not well-formed XML")?;
        let root = doc.root_element();
        if !root.has_tag_name("planView") {
            bail!("expected a <planView> root element, found <{}>", root.tag_name().name());
        }
        Ok(ReferenceLine::parse_xml(root))
    }

    /// Parses a ReferenceLine from a `<planView>` element node.
    pub(crate) fn parse_xml(node: roxmltree::Node) -> XodrParseResult<ReferenceLine> {
        let mut ret = XodrParseResult::<ReferenceLine>::default();

        XmlChildElementParsers::parse_one_or_more(node, &mut ret, "geometry", Invalidations::ALL, parse_geometry);

        if let Some(last) = ret.value().geometries.last() {
            ret.value_mut().end_vertex = last.end_vertex();
        }
        ret
    }

    /// Evaluates the point with the given s-coordinate and the tangent
    /// direction at that point. `s` must lie in `[0, end_s()]`.
    pub fn eval(&self, s: f64) -> PointAndTangentDir {
        self.geometry_containing(s).eval(s)
    }

    /// Evaluates the signed curvature at the given s-coordinate. `s` must
    /// lie in `[0, end_s()]`.
    pub fn eval_curvature(&self, s: f64) -> f64 {
        self.geometry_containing(s).eval_curvature(s)
    }

    /// Returns a piecewise linear approximation of the section of this
    /// reference line with s-values in `[start_s, end_s]`.
    ///
    /// The requested range is clipped against each geometry's native s-range;
    /// seam vertices between adjacent geometries are emitted exactly once,
    /// and the final vertex lands exactly on `end_s`.
    pub fn tessellate(&self, start_s: f64, end_s: f64) -> Tessellation {
        debug_assert!(!self.geometries.is_empty());
        debug_assert!(start_s >= self.geometries[0].start_vertex().s_coord);
        debug_assert!(end_s <= self.end_vertex.s_coord);
        debug_assert!(start_s < end_s);

        let mut ret = Tessellation::new();

        for (i, geometry) in self.geometries.iter().enumerate() {
            let geometry_start_s = geometry.start_vertex().s_coord;
            let geometry_end_s = if i == self.geometries.len() - 1 {
                geometry_start_s + geometry.length()
            } else {
                self.geometries[i + 1].start_vertex().s_coord
            };

            let clamped_start_s = start_s.max(geometry_start_s);
            let clamped_end_s = end_s.min(geometry_end_s);
            if clamped_start_s < clamped_end_s {
                geometry.tessellate(&mut ret, clamped_start_s, clamped_end_s, clamped_end_s == end_s);
            }
        }

        ret
    }

    /// The end s-coordinate of this reference line. There's no start
    /// accessor because the start s-coordinate is always 0.
    pub fn end_s(&self) -> f64 {
        self.end_vertex.s_coord
    }

    pub fn end_vertex(&self) -> &Vertex {
        &self.end_vertex
    }

    pub fn geometries(&self) -> &[Geometry] {
        &self.geometries
    }

    /// The geometry whose s-range contains `s`. Ranges are closed on the
    /// left and open on the right, except that the final geometry also owns
    /// the closing endpoint.
    fn geometry_containing(&self, s: f64) -> &Geometry {
        debug_assert!(!self.geometries.is_empty());
        debug_assert!(s >= -1e-5 && s <= self.end_vertex.s_coord + 1e-5);

        let mut min = 0;
        let mut max = self.geometries.len();
        while min != max - 1 {
            let mid = (min + max) / 2;
            if s < self.geometries[mid].start_vertex().s_coord {
                max = mid;
            } else {
                min = mid;
            }
        }
        &self.geometries[min]
    }
}

/// The values of the attributes of a `<geometry>` element.
///
/// This is temporary storage: at the point where these attributes appear in
/// the file, the specific shape of the geometry isn't known yet.
#[derive(Clone, Copy, Debug, Default)]
struct GeometryAttribs {
    start_vertex: Vertex,
    length: f64,
}

fn geometry_attrib_parsers() -> &'static XmlAttributeParsers<GeometryAttribs> {
    static PARSERS: OnceLock<XmlAttributeParsers<GeometryAttribs>> = OnceLock::new();
    PARSERS.get_or_init(|| {
        let mut parsers = XmlAttributeParsers::new();
        parsers.field("s", Invalidations::GEOMETRY, |attribs: &mut GeometryAttribs, s: f64| {
            attribs.start_vertex.s_coord = s
        });
        parsers.field("x", Invalidations::GEOMETRY, |attribs: &mut GeometryAttribs, x: f64| {
            attribs.start_vertex.position.x = x
        });
        parsers.field("y", Invalidations::GEOMETRY, |attribs: &mut GeometryAttribs, y: f64| {
            attribs.start_vertex.position.y = y
        });
        parsers.field("hdg", Invalidations::GEOMETRY, |attribs: &mut GeometryAttribs, hdg: f64| {
            attribs.start_vertex.heading = hdg
        });
        parsers.field(
            "length",
            Invalidations::GEOMETRY,
            |attribs: &mut GeometryAttribs, length: f64| attribs.length = length,
        );
        parsers.finalize();
        parsers
    })
}

fn parse_geometry(node: roxmltree::Node, ret: &mut XodrParseResult<ReferenceLine>) {
    let mut geom_attribs = XodrParseResult::<GeometryAttribs>::default();
    geometry_attrib_parsers().parse(node, &mut geom_attribs);

    if geom_attribs.has_valid_geometry() {
        // No point checking values which failed to parse in the first place.
        if geom_attribs.value().length <= 0.0 {
            geom_attribs.push_error(XodrParseError::message(
                "Reference line geometries must have strictly positive length.",
                Invalidations::GEOMETRY,
            ));
        }
        if geom_attribs.value().start_vertex.s_coord < 0.0 {
            geom_attribs.push_error(XodrParseError::message(
                "Reference line s-coordinates must not be negative.",
                Invalidations::GEOMETRY,
            ));
        }
    }
    let attribs = ret.absorb(geom_attribs);

    let shape_node = node.children().find(|child| child.is_element());
    let shape_node = match shape_node {
        Some(shape_node) => shape_node,
        None => {
            ret.push_error(XodrParseError::message(
                "A <geometry> element should have exactly one of 'line', 'spiral', 'arc', 'poly3' or \
                 'paramPoly3' as its child.",
                Invalidations::GEOMETRY,
            ));
            return;
        }
    };

    let geometry = match shape_node.tag_name().name() {
        "line" => ret.absorb(parse_line(&attribs, shape_node)),
        "spiral" => ret.absorb(parse_spiral(&attribs, shape_node)),
        "arc" => ret.absorb(parse_arc(&attribs, shape_node)),
        "poly3" => ret.absorb(parse_poly3(&attribs, shape_node)),
        "paramPoly3" => ret.absorb(parse_param_poly3(&attribs, shape_node)),
        other => {
            ret.push_error(XodrParseError::message(
                format!(
                    "'{}' is not a valid type of geometry. Expected one of 'line', 'spiral', 'arc', \
                     'poly3' or 'paramPoly3'.",
                    other
                ),
                Invalidations::GEOMETRY,
            ));
            return;
        }
    };
    ret.value_mut().geometries.push(geometry);
}

fn parse_line(geom_attribs: &GeometryAttribs, _node: roxmltree::Node) -> XodrParseResult<Geometry> {
    XodrParseResult::new(Geometry::new(
        geom_attribs.start_vertex,
        geom_attribs.length,
        GeometryShape::Line,
    ))
}

#[derive(Default)]
struct SpiralAttribs {
    curv_start: f64,
    curv_end: f64,
}

fn spiral_attrib_parsers() -> &'static XmlAttributeParsers<SpiralAttribs> {
    static PARSERS: OnceLock<XmlAttributeParsers<SpiralAttribs>> = OnceLock::new();
    PARSERS.get_or_init(|| {
        let mut parsers = XmlAttributeParsers::new();
        parsers.field(
            "curvStart",
            Invalidations::GEOMETRY,
            |attribs: &mut SpiralAttribs, curv: f64| attribs.curv_start = curv,
        );
        parsers.field(
            "curvEnd",
            Invalidations::GEOMETRY,
            |attribs: &mut SpiralAttribs, curv: f64| attribs.curv_end = curv,
        );
        parsers.finalize();
        parsers
    })
}

fn parse_spiral(geom_attribs: &GeometryAttribs, node: roxmltree::Node) -> XodrParseResult<Geometry> {
    let mut attribs = XodrParseResult::<SpiralAttribs>::default();
    spiral_attrib_parsers().parse(node, &mut attribs);

    if attribs.has_valid_geometry() && attribs.value().curv_start == attribs.value().curv_end {
        attribs.push_error(XodrParseError::message(
            "The 'curvStart' and 'curvEnd' attributes of a <spiral> shouldn't be equal.",
            Invalidations::GEOMETRY,
        ));
    }

    let (spiral_attribs, errors) = attribs.into_parts();
    XodrParseResult::from_parts(
        Geometry::new(
            geom_attribs.start_vertex,
            geom_attribs.length,
            GeometryShape::Spiral {
                start_curvature: spiral_attribs.curv_start,
                end_curvature: spiral_attribs.curv_end,
            },
        ),
        errors,
    )
}

#[derive(Default)]
struct ArcAttribs {
    curvature: f64,
}

fn arc_attrib_parsers() -> &'static XmlAttributeParsers<ArcAttribs> {
    static PARSERS: OnceLock<XmlAttributeParsers<ArcAttribs>> = OnceLock::new();
    PARSERS.get_or_init(|| {
        let mut parsers = XmlAttributeParsers::new();
        parsers.parser("curvature", Invalidations::GEOMETRY, |value, attribs: &mut ArcAttribs| {
            let curvature = f64::from_xml_attribute(value)?;
            if curvature == 0.0 {
                anyhow::bail!("the curvature attribute of an <arc> element should be non-zero");
            }
            attribs.curvature = curvature;
            Ok(())
        });
        parsers.finalize();
        parsers
    })
}

fn parse_arc(geom_attribs: &GeometryAttribs, node: roxmltree::Node) -> XodrParseResult<Geometry> {
    let mut attribs = XodrParseResult::<ArcAttribs>::default();
    arc_attrib_parsers().parse(node, &mut attribs);

    let (arc_attribs, errors) = attribs.into_parts();
    XodrParseResult::from_parts(
        Geometry::new(
            geom_attribs.start_vertex,
            geom_attribs.length,
            GeometryShape::Arc {
                curvature: arc_attribs.curvature,
            },
        ),
        errors,
    )
}

fn poly3_attrib_parsers() -> &'static XmlAttributeParsers<Poly3> {
    static PARSERS: OnceLock<XmlAttributeParsers<Poly3>> = OnceLock::new();
    PARSERS.get_or_init(|| {
        let mut parsers = XmlAttributeParsers::new();
        parsers.field("a", Invalidations::GEOMETRY, |poly: &mut Poly3, a: f64| poly.a = a);
        parsers.field("b", Invalidations::GEOMETRY, |poly: &mut Poly3, b: f64| poly.b = b);
        parsers.field("c", Invalidations::GEOMETRY, |poly: &mut Poly3, c: f64| poly.c = c);
        parsers.field("d", Invalidations::GEOMETRY, |poly: &mut Poly3, d: f64| poly.d = d);
        parsers.finalize();
        parsers
    })
}

fn parse_poly3(geom_attribs: &GeometryAttribs, node: roxmltree::Node) -> XodrParseResult<Geometry> {
    let mut attribs = XodrParseResult::<Poly3>::default();
    poly3_attrib_parsers().parse(node, &mut attribs);

    let (poly, errors) = attribs.into_parts();
    XodrParseResult::from_parts(
        Geometry::new(
            geom_attribs.start_vertex,
            geom_attribs.length,
            GeometryShape::Poly3 { poly },
        ),
        errors,
    )
}

#[derive(Default)]
struct ParamPoly3Attribs {
    u_poly: Poly3,
    v_poly: Poly3,
    p_range: PRange,
}

impl FromXmlAttribute for PRange {
    fn from_xml_attribute(value: &str) -> Result<Self> {
        match value {
            "arcLength" => Ok(PRange::ArcLength),
            "normalized" => Ok(PRange::Normalized),
            _ => bail!("not a valid pRange: '{}'", value),
        }
    }
}

fn param_poly3_attrib_parsers() -> &'static XmlAttributeParsers<ParamPoly3Attribs> {
    static PARSERS: OnceLock<XmlAttributeParsers<ParamPoly3Attribs>> = OnceLock::new();
    PARSERS.get_or_init(|| {
        let mut parsers = XmlAttributeParsers::new();
        parsers.field("aU", Invalidations::GEOMETRY, |attribs: &mut ParamPoly3Attribs, v: f64| {
            attribs.u_poly.a = v
        });
        parsers.field("bU", Invalidations::GEOMETRY, |attribs: &mut ParamPoly3Attribs, v: f64| {
            attribs.u_poly.b = v
        });
        parsers.field("cU", Invalidations::GEOMETRY, |attribs: &mut ParamPoly3Attribs, v: f64| {
            attribs.u_poly.c = v
        });
        parsers.field("dU", Invalidations::GEOMETRY, |attribs: &mut ParamPoly3Attribs, v: f64| {
            attribs.u_poly.d = v
        });
        parsers.field("aV", Invalidations::GEOMETRY, |attribs: &mut ParamPoly3Attribs, v: f64| {
            attribs.v_poly.a = v
        });
        parsers.field("bV", Invalidations::GEOMETRY, |attribs: &mut ParamPoly3Attribs, v: f64| {
            attribs.v_poly.b = v
        });
        parsers.field("cV", Invalidations::GEOMETRY, |attribs: &mut ParamPoly3Attribs, v: f64| {
            attribs.v_poly.c = v
        });
        parsers.field("dV", Invalidations::GEOMETRY, |attribs: &mut ParamPoly3Attribs, v: f64| {
            attribs.v_poly.d = v
        });
        parsers.optional_field(
            "pRange",
            Invalidations::GEOMETRY,
            |attribs: &mut ParamPoly3Attribs, p_range: PRange| attribs.p_range = p_range,
        );
        parsers.finalize();
        parsers
    })
}

fn parse_param_poly3(geom_attribs: &GeometryAttribs, node: roxmltree::Node) -> XodrParseResult<Geometry> {
    let mut attribs = XodrParseResult::<ParamPoly3Attribs>::default();
    param_poly3_attrib_parsers().parse(node, &mut attribs);

    let (param_attribs, errors) = attribs.into_parts();
    XodrParseResult::from_parts(
        Geometry::new(
            geom_attribs.start_vertex,
            geom_attribs.length,
            GeometryShape::ParamPoly3 {
                u_poly: param_attribs.u_poly,
                v_poly: param_attribs.v_poly,
                p_range: param_attribs.p_range,
            },
        ),
        errors,
    )
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use glam::DVec2;

    use super::super::GeometryType;
    use super::*;

    fn two_piece_line() -> ReferenceLine {
        // A 10m straight eastwards, then a left-bending quarter circle of
        // radius 20.
        let line = Geometry::line(
            Vertex {
                s_coord: 0.0,
                position: DVec2::ZERO,
                heading: 0.0,
            },
            10.0,
        );
        let arc = Geometry::arc(line.end_vertex(), 20.0 * std::f64::consts::FRAC_PI_2, 1.0 / 20.0);
        ReferenceLine::from_geometries(vec![line, arc])
    }

    #[test]
    fn end_vertex_comes_from_the_last_geometry() {
        let ref_line = two_piece_line();
        assert_relative_eq!(ref_line.end_s(), 10.0 + 20.0 * std::f64::consts::FRAC_PI_2);
        assert_relative_eq!(ref_line.end_vertex().position.x, 30.0, epsilon = 1e-9);
        assert_relative_eq!(ref_line.end_vertex().position.y, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn eval_picks_the_geometry_containing_s() {
        let ref_line = two_piece_line();

        let on_line = ref_line.eval(5.0);
        assert_relative_eq!(on_line.point.x, 5.0);
        assert_relative_eq!(on_line.point.y, 0.0);
        assert_relative_eq!(ref_line.eval_curvature(5.0), 0.0);

        // Just past the seam, curvature jumps to the arc's.
        assert_relative_eq!(ref_line.eval_curvature(10.0), 0.05);
        assert_relative_eq!(ref_line.eval_curvature(ref_line.end_s()), 0.05);

        let on_arc = ref_line.eval(10.0 + 20.0 * std::f64::consts::FRAC_PI_2);
        assert_relative_eq!(on_arc.point.x, 30.0, epsilon = 1e-9);
        assert_relative_eq!(on_arc.point.y, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn point_with_t_coord_offsets_sideways() {
        let ref_line = two_piece_line();
        let pt = ref_line.eval(5.0);
        let left = pt.point_with_t_coord(2.0);
        assert_relative_eq!(left.x, 5.0);
        assert_relative_eq!(left.y, 2.0);
    }

    #[test]
    fn tessellate_emits_seam_vertices_once() {
        let ref_line = two_piece_line();
        let tess = ref_line.tessellate(0.0, ref_line.end_s());

        assert_relative_eq!(tess[0].s_coord, 0.0);
        assert_relative_eq!(tess.last().unwrap().s_coord, ref_line.end_s());
        for pair in tess.windows(2) {
            assert!(pair[1].s_coord > pair[0].s_coord);
        }
    }

    #[test]
    fn tessellate_sub_range() {
        let ref_line = two_piece_line();
        let tess = ref_line.tessellate(8.0, 12.0);
        assert_relative_eq!(tess[0].s_coord, 8.0);
        assert_relative_eq!(tess.last().unwrap().s_coord, 12.0);
        for vert in &tess {
            let eval = ref_line.eval(vert.s_coord);
            assert_relative_eq!(vert.position.x, eval.point.x, epsilon = 1e-9);
            assert_relative_eq!(vert.position.y, eval.point.y, epsilon = 1e-9);
        }
    }

    #[test]
    fn parses_a_plan_view_with_all_shapes() {
        let result = ReferenceLine::from_text(
            r#"<planView>
                 <geometry s="0" x="0" y="0" hdg="0" length="10"><line/></geometry>
                 <geometry s="10" x="10" y="0" hdg="0" length="10"><arc curvature="0.05"/></geometry>
                 <geometry s="20" x="19.9" y="2.4" hdg="0.5" length="10"><spiral curvStart="0.05" curvEnd="0.01"/></geometry>
                 <geometry s="30" x="29" y="7" hdg="0.8" length="10"><poly3 a="0" b="0" c="0.01" d="0"/></geometry>
                 <geometry s="40" x="37" y="13" hdg="0.9" length="10">
                   <paramPoly3 aU="0" bU="10" cU="0" dU="0" aV="0" bV="0" cV="0.5" dV="0" pRange="normalized"/>
                 </geometry>
               </planView>"#,
        )
        .unwrap();

        assert!(result.errors().is_empty());
        let ref_line = result.value();
        assert_eq!(ref_line.geometries().len(), 5);
        assert_eq!(
            ref_line.geometries().iter().map(Geometry::geometry_type).collect::<Vec<_>>(),
            vec![
                GeometryType::Line,
                GeometryType::Arc,
                GeometryType::Spiral,
                GeometryType::Poly3,
                GeometryType::ParamPoly3,
            ]
        );
        assert_relative_eq!(ref_line.end_s(), 50.0);
    }

    #[test]
    fn param_poly3_p_range_defaults_to_normalized() {
        let result = ReferenceLine::from_text(
            r#"<planView>
                 <geometry s="0" x="0" y="0" hdg="0" length="10">
                   <paramPoly3 aU="0" bU="10" cU="0" dU="0" aV="0" bV="0" cV="1" dV="0"/>
                 </geometry>
               </planView>"#,
        )
        .unwrap();
        assert!(result.errors().is_empty());
        match result.value().geometries()[0].shape() {
            GeometryShape::ParamPoly3 { p_range, .. } => assert_eq!(*p_range, PRange::Normalized),
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn zero_arc_curvature_is_rejected() {
        let result = ReferenceLine::from_text(
            r#"<planView>
                 <geometry s="0" x="0" y="0" hdg="0" length="10"><arc curvature="0"/></geometry>
               </planView>"#,
        )
        .unwrap();
        assert!(!result.has_valid_geometry());
    }

    #[test]
    fn equal_spiral_curvatures_are_rejected() {
        let result = ReferenceLine::from_text(
            r#"<planView>
                 <geometry s="0" x="0" y="0" hdg="0" length="10"><spiral curvStart="0.01" curvEnd="0.01"/></geometry>
               </planView>"#,
        )
        .unwrap();
        assert!(!result.has_valid_geometry());
    }

    #[test]
    fn non_positive_length_is_rejected() {
        let result = ReferenceLine::from_text(
            r#"<planView>
                 <geometry s="0" x="0" y="0" hdg="0" length="0"><line/></geometry>
               </planView>"#,
        )
        .unwrap();
        assert!(!result.has_valid_geometry());
    }

    #[test]
    fn unknown_geometry_shape_is_rejected() {
        let result = ReferenceLine::from_text(
            r#"<planView>
                 <geometry s="0" x="0" y="0" hdg="0" length="10"><bezier/></geometry>
               </planView>"#,
        )
        .unwrap();
        assert!(!result.has_valid_geometry());
        assert!(result.error_messages()[0].contains("not a valid type of geometry"));
    }
}
