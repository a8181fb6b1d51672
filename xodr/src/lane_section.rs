use std::sync::OnceLock;

use anyhow::{bail, Result};
use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::geometry::{Poly3, Vertex};
use crate::lane_attributes::{LaneAccess, LaneHeight, LaneMaterial, LaneRule, LaneSpeedLimit, LaneVisibility};
use crate::lane_id::LaneId;
use crate::result::{Invalidations, XodrParseError, XodrParseResult};
use crate::road_link::RoadLinkType;
use crate::xml::{FromXmlAttribute, Multiplicity, XmlAttributeParsers, XmlChildElementParsers};

/// The type of a lane, as given by the `type` attribute of a `<lane>`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LaneType {
    #[default]
    None,
    Driving,
    Stop,
    Shoulder,
    Biking,
    Sidewalk,
    Border,
    Restricted,
    Parking,
    Bidirectional,
    Median,
    Special1,
    Special2,
    Special3,
    RoadWorks,
    Tram,
    Rail,
    Entry,
    Exit,
    OffRamp,
    OnRamp,
    ConnectingRamp,
    Bus,
    Taxi,
    Hov,
}

impl FromXmlAttribute for LaneType {
    fn from_xml_attribute(value: &str) -> Result<Self> {
        match value {
            "none" => Ok(LaneType::None),
            "driving" => Ok(LaneType::Driving),
            "stop" => Ok(LaneType::Stop),
            "shoulder" => Ok(LaneType::Shoulder),
            "biking" => Ok(LaneType::Biking),
            "sidewalk" => Ok(LaneType::Sidewalk),
            "border" => Ok(LaneType::Border),
            "restricted" => Ok(LaneType::Restricted),
            "parking" => Ok(LaneType::Parking),
            "bidirectional" => Ok(LaneType::Bidirectional),
            "median" => Ok(LaneType::Median),
            "special1" => Ok(LaneType::Special1),
            "special2" => Ok(LaneType::Special2),
            "special3" => Ok(LaneType::Special3),
            "roadWorks" => Ok(LaneType::RoadWorks),
            "tram" => Ok(LaneType::Tram),
            "rail" => Ok(LaneType::Rail),
            "entry" => Ok(LaneType::Entry),
            "exit" => Ok(LaneType::Exit),
            "offRamp" => Ok(LaneType::OffRamp),
            "onRamp" => Ok(LaneType::OnRamp),
            "connectingRamp" => Ok(LaneType::ConnectingRamp),
            "bus" => Ok(LaneType::Bus),
            "taxi" => Ok(LaneType::Taxi),
            "hov" => Ok(LaneType::Hov),
            _ => bail!("not a valid lane type: '{}'", value),
        }
    }
}

/// One polynomial piece of a lane's piecewise-cubic width curve.
///
/// Given a point with st-coordinates `(s, t)` on the lane's inner boundary,
/// the point `(s, t + poly3.eval(s - section_start_s - s_offset))` is on the
/// outer boundary.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct WidthPoly3 {
    s_offset: f64,
    poly3: Poly3,
}

impl WidthPoly3 {
    pub fn new(s_offset: f64, poly3: Poly3) -> Self {
        WidthPoly3 { s_offset, poly3 }
    }

    pub(crate) fn parse_xml(node: roxmltree::Node) -> XodrParseResult<WidthPoly3> {
        static PARSERS: OnceLock<XmlAttributeParsers<WidthPoly3>> = OnceLock::new();
        let parsers = PARSERS.get_or_init(|| {
            let mut parsers = XmlAttributeParsers::new();
            parsers.field("sOffset", Invalidations::GEOMETRY, |w: &mut WidthPoly3, v: f64| {
                w.s_offset = v
            });
            parsers.field("a", Invalidations::GEOMETRY, |w: &mut WidthPoly3, v: f64| w.poly3.a = v);
            parsers.field("b", Invalidations::GEOMETRY, |w: &mut WidthPoly3, v: f64| w.poly3.b = v);
            parsers.field("c", Invalidations::GEOMETRY, |w: &mut WidthPoly3, v: f64| w.poly3.c = v);
            parsers.field("d", Invalidations::GEOMETRY, |w: &mut WidthPoly3, v: f64| w.poly3.d = v);
            parsers.finalize();
            parsers
        });

        let mut ret = XodrParseResult::default();
        parsers.parse(node, &mut ret);
        ret
    }

    /// The offset from the beginning of the lane section to the beginning of
    /// this piece's s-range.
    pub fn s_offset(&self) -> f64 {
        self.s_offset
    }

    pub fn poly3(&self) -> &Poly3 {
        &self.poly3
    }
}

/// A lane in a lane section.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Lane {
    id: LaneId,
    lane_type: LaneType,
    level: bool,

    width_poly3s: Vec<WidthPoly3>,

    materials: Vec<LaneMaterial>,
    visibilities: Vec<LaneVisibility>,
    speed_limits: Vec<LaneSpeedLimit>,
    accesses: Vec<LaneAccess>,
    heights: Vec<LaneHeight>,
    rules: Vec<LaneRule>,

    predecessor: Option<LaneId>,
    successor: Option<LaneId>,

    global_index: usize,
}

impl Lane {
    pub(crate) fn parse_xml(node: roxmltree::Node) -> XodrParseResult<Lane> {
        let mut ret = XodrParseResult::default();
        lane_attrib_parsers().parse(node, &mut ret);
        lane_child_parsers().parse(node, &mut ret);
        ret
    }

    pub fn id(&self) -> LaneId {
        self.id
    }

    pub fn lane_type(&self) -> LaneType {
        self.lane_type
    }

    /// Whether this lane should be kept level: if true, superelevation and
    /// crossfall are ignored for this lane.
    pub fn level(&self) -> bool {
        self.level
    }

    /// The lane id of this lane's predecessor in the previous lane section
    /// (or previous road), if linked.
    pub fn predecessor(&self) -> Option<LaneId> {
        self.predecessor
    }

    /// The lane id of this lane's successor in the next lane section (or
    /// next road), if linked.
    pub fn successor(&self) -> Option<LaneId> {
        self.successor
    }

    /// The predecessor or successor link, selected by link type.
    pub fn link(&self, road_link_type: RoadLinkType) -> Option<LaneId> {
        match road_link_type {
            RoadLinkType::Predecessor => self.predecessor,
            RoadLinkType::Successor => self.successor,
        }
    }

    /// The polynomials which together form this lane's piecewise cubic width
    /// curve, in increasing s-offset order.
    pub fn width_poly3s(&self) -> &[WidthPoly3] {
        &self.width_poly3s
    }

    pub fn materials(&self) -> &[LaneMaterial] {
        &self.materials
    }

    pub fn visibilities(&self) -> &[LaneVisibility] {
        &self.visibilities
    }

    pub fn speed_limits(&self) -> &[LaneSpeedLimit] {
        &self.speed_limits
    }

    pub fn accesses(&self) -> &[LaneAccess] {
        &self.accesses
    }

    pub fn heights(&self) -> &[LaneHeight] {
        &self.heights
    }

    pub fn rules(&self) -> &[LaneRule] {
        &self.rules
    }

    /// The dense index of this lane within the whole map. All lanes of a
    /// road form a contiguous range of global indices, so per-lane side data
    /// can live in a plain vector of length
    /// [`XodrMap::total_num_lanes`](crate::XodrMap::total_num_lanes).
    pub fn global_index(&self) -> usize {
        self.global_index
    }

    pub(crate) fn set_global_index(&mut self, global_index: usize) {
        self.global_index = global_index;
    }

    /// The width of this lane at the given s-coordinate, relative to the
    /// beginning of the lane section.
    pub fn width_at_s_coord(&self, s: f64) -> f64 {
        let mut poly_idx = 1;
        while poly_idx < self.width_poly3s.len() {
            if s < self.width_poly3s[poly_idx].s_offset() {
                break;
            }
            poly_idx += 1;
        }

        let poly = &self.width_poly3s[poly_idx - 1];
        poly.poly3().eval(s - poly.s_offset())
    }

    fn validate(&self, max_s_offset: f64) -> Result<()> {
        validate_attrib_s_offsets("width", max_s_offset, &self.width_poly3s, WidthPoly3::s_offset)?;
        validate_attrib_s_offsets("material", max_s_offset, &self.materials, LaneMaterial::s_offset)?;
        validate_attrib_s_offsets("visibility", max_s_offset, &self.visibilities, LaneVisibility::s_offset)?;
        validate_attrib_s_offsets("speed", max_s_offset, &self.speed_limits, LaneSpeedLimit::s_offset)?;
        validate_attrib_s_offsets("access", max_s_offset, &self.accesses, LaneAccess::s_offset)?;
        validate_attrib_s_offsets("height", max_s_offset, &self.heights, LaneHeight::s_offset)?;
        validate_attrib_s_offsets("rule", max_s_offset, &self.rules, LaneRule::s_offset)?;
        Ok(())
    }

    /// Only for use from tests.
    pub fn test_set_predecessor(&mut self, predecessor: Option<LaneId>) {
        self.predecessor = predecessor;
    }

    /// Only for use from tests.
    pub fn test_set_successor(&mut self, successor: Option<LaneId>) {
        self.successor = successor;
    }
}

fn validate_attrib_s_offsets<T>(
    attribs_name: &str,
    max_s_offset: f64,
    attribs: &[T],
    s_offset: fn(&T) -> f64,
) -> Result<()> {
    if attribs.is_empty() {
        return Ok(());
    }

    if s_offset(&attribs[0]) < 0.0 || s_offset(attribs.last().unwrap()) >= max_s_offset {
        bail!(
            "The s-offset of the <{}> elements of a lane should fall within the lane's s-range.",
            attribs_name
        );
    }

    for pair in attribs.windows(2) {
        if s_offset(&pair[0]) >= s_offset(&pair[1]) {
            bail!(
                "The <{}> elements of a lane should occur in increasing s-offset order.",
                attribs_name
            );
        }
    }

    Ok(())
}

fn lane_attrib_parsers() -> &'static XmlAttributeParsers<Lane> {
    static PARSERS: OnceLock<XmlAttributeParsers<Lane>> = OnceLock::new();
    PARSERS.get_or_init(|| {
        let mut parsers = XmlAttributeParsers::new();
        parsers.field("id", Invalidations::ALL, |lane: &mut Lane, id: LaneId| lane.id = id);
        parsers.field("type", Invalidations::NONE, |lane: &mut Lane, lane_type: LaneType| {
            lane.lane_type = lane_type
        });
        parsers.optional_field("level", Invalidations::NONE, |lane: &mut Lane, level: bool| {
            lane.level = level
        });
        parsers.finalize();
        parsers
    })
}

fn lane_child_parsers() -> &'static XmlChildElementParsers<Lane> {
    static PARSERS: OnceLock<XmlChildElementParsers<Lane>> = OnceLock::new();
    PARSERS.get_or_init(|| {
        let mut parsers = XmlChildElementParsers::new();
        parsers.parser("link", Multiplicity::ZeroOrOne, Invalidations::NONE, |node, result| {
            lane_link_child_parsers().parse(node, result);
        });
        parsers.vector(
            "width",
            Multiplicity::OneOrMore,
            Invalidations::GEOMETRY,
            WidthPoly3::parse_xml,
            |lane: &mut Lane, width| lane.width_poly3s.push(width),
        );
        parsers.vector(
            "material",
            Multiplicity::ZeroOrMore,
            Invalidations::NONE,
            LaneMaterial::parse_xml,
            |lane: &mut Lane, material| lane.materials.push(material),
        );
        parsers.vector(
            "visibility",
            Multiplicity::ZeroOrMore,
            Invalidations::NONE,
            LaneVisibility::parse_xml,
            |lane: &mut Lane, visibility| lane.visibilities.push(visibility),
        );
        parsers.vector(
            "speed",
            Multiplicity::ZeroOrMore,
            Invalidations::NONE,
            LaneSpeedLimit::parse_xml,
            |lane: &mut Lane, speed_limit| lane.speed_limits.push(speed_limit),
        );
        parsers.vector(
            "access",
            Multiplicity::ZeroOrMore,
            Invalidations::NONE,
            LaneAccess::parse_xml,
            |lane: &mut Lane, access| lane.accesses.push(access),
        );
        parsers.vector(
            "height",
            Multiplicity::ZeroOrMore,
            Invalidations::NONE,
            LaneHeight::parse_xml,
            |lane: &mut Lane, height| lane.heights.push(height),
        );
        parsers.vector(
            "rule",
            Multiplicity::ZeroOrMore,
            Invalidations::NONE,
            LaneRule::parse_xml,
            |lane: &mut Lane, rule| lane.rules.push(rule),
        );
        parsers.finalize();
        parsers
    })
}

fn lane_link_child_parsers() -> &'static XmlChildElementParsers<Lane> {
    static PARSERS: OnceLock<XmlChildElementParsers<Lane>> = OnceLock::new();
    PARSERS.get_or_init(|| {
        let mut parsers = XmlChildElementParsers::new();
        parsers.parser(
            "predecessor",
            Multiplicity::ZeroOrOne,
            Invalidations::CONNECTIVITY,
            |node, result| {
                XmlAttributeParsers::parse_field(node, result, "id", Invalidations::CONNECTIVITY, |lane: &mut Lane, id: LaneId| {
                    lane.predecessor = Some(id)
                });
            },
        );
        parsers.parser(
            "successor",
            Multiplicity::ZeroOrOne,
            Invalidations::CONNECTIVITY,
            |node, result| {
                XmlAttributeParsers::parse_field(node, result, "id", Invalidations::CONNECTIVITY, |lane: &mut Lane, id: LaneId| {
                    lane.successor = Some(id)
                });
            },
        );
        parsers.finalize();
        parsers
    })
}

/// A tessellation of one lane boundary, as lateral positions
/// (t-coordinates).
///
/// The array is parallel to the reference-line tessellation passed to
/// [`LaneSection::tessellate_lane_boundaries`]; turning a lateral position
/// into a 2D point also needs the corresponding reference-line vertex.
#[derive(Clone, Debug, Default)]
pub struct BoundaryTessellation {
    pub lateral_positions: Vec<f64>,
}

/// A tessellation of one lane boundary, in cartesian coordinates.
#[derive(Clone, Debug, Default)]
pub struct BoundaryCurveTessellation {
    pub vertices: Vec<DVec2>,
}

/// A tessellation of one lane as its center line plus variances. The
/// variance of a vertex is half the lane width there, i.e. the lateral
/// distance from the center line to either boundary.
#[derive(Clone, Debug, Default)]
pub struct CenterLineTessellation {
    pub vertices: Vec<DVec2>,
    pub variances: Vec<f64>,
}

/// The combined result of [`LaneSection::tessellate_lane_boundary_curves_and_center_lines`].
#[derive(Clone, Debug, Default)]
pub struct BoundaryCurveAndCenterLineTessellations {
    pub boundary_curve_tessellations: Vec<BoundaryCurveTessellation>,
    pub center_line_tessellations: Vec<CenterLineTessellation>,
}

/// A lane section: the lanes in a given cross-section of a road.
///
/// Lanes are stored from left to right, with the center lane omitted (it has
/// no width of its own; it only anchors the lane id numbering). The first
/// `num_left_lanes()` entries are the left lanes.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LaneSection {
    start_s: f64,
    end_s: f64,
    single_sided: bool,

    num_left_lanes: usize,
    lanes: Vec<Lane>,
}

impl LaneSection {
    pub(crate) fn parse_xml(node: roxmltree::Node) -> XodrParseResult<LaneSection> {
        let mut ret = XodrParseResult::default();
        lane_section_attrib_parsers().parse(node, &mut ret);
        lane_section_child_parsers().parse(node, &mut ret);
        ret
    }

    /// The start of this section's s-range, relative to the beginning of the
    /// road.
    pub fn start_s(&self) -> f64 {
        self.start_s
    }

    /// The end of this section's s-range, relative to the beginning of the
    /// road.
    pub fn end_s(&self) -> f64 {
        self.end_s
    }

    pub(crate) fn set_end_s(&mut self, end_s: f64) {
        self.end_s = end_s;
    }

    /// Whether this section only carries lanes on one side of the reference
    /// line.
    pub fn single_sided(&self) -> bool {
        self.single_sided
    }

    pub fn num_left_lanes(&self) -> usize {
        self.num_left_lanes
    }

    pub fn num_right_lanes(&self) -> usize {
        self.lanes.len() - self.num_left_lanes
    }

    /// The lanes of this section, from left to right, center lane omitted.
    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    /// Converts a lane index (position in `lanes()`) into a lane id.
    pub fn lane_index_to_id(&self, idx: usize) -> LaneId {
        debug_assert!(idx < self.lanes.len());

        // Lane ids are consecutive and descending from left to right, with
        // id 0 reserved for the center lane, which the lanes vector omits.
        let mut id = self.num_left_lanes as i32 - idx as i32;
        if id <= 0 {
            id -= 1;
        }
        LaneId(id)
    }

    /// Converts a lane id into a lane index (position in `lanes()`). The id
    /// must be a valid non-center lane id of this section.
    pub fn lane_id_to_index(&self, id: LaneId) -> usize {
        debug_assert!(id.0 != 0);
        debug_assert!(id.0 <= self.num_left_lanes as i32);
        debug_assert!(id.0 >= -(self.num_right_lanes() as i32));

        let mut idx = self.num_left_lanes as i32 - id.0;
        if idx >= self.num_left_lanes as i32 {
            idx -= 1;
        }
        idx as usize
    }

    /// The lane with the given lane id.
    pub fn lane_by_id(&self, id: LaneId) -> &Lane {
        &self.lanes[self.lane_id_to_index(id)]
    }

    /// The total width of the left lanes at the given s-offset within this
    /// section.
    pub fn left_width_at_s_offset(&self, s_offset: f64) -> f64 {
        self.lanes[..self.num_left_lanes]
            .iter()
            .map(|lane| lane.width_at_s_coord(s_offset))
            .sum()
    }

    /// The total width of the right lanes at the given s-offset within this
    /// section.
    pub fn right_width_at_s_offset(&self, s_offset: f64) -> f64 {
        self.lanes[self.num_left_lanes..]
            .iter()
            .map(|lane| lane.width_at_s_coord(s_offset))
            .sum()
    }

    /// Tessellates the lane boundaries as lateral positions, using the
    /// s-coordinates of the given reference-line tessellation as sample
    /// positions.
    ///
    /// The result has `lanes().len() + 1` boundaries, from the left boundary
    /// of the left-most lane to the right boundary of the right-most lane;
    /// boundary `num_left_lanes()` is the reference line itself.
    pub fn tessellate_lane_boundaries(&self, ref_line_tessellation: &[Vertex]) -> Vec<BoundaryTessellation> {
        debug_assert!(!ref_line_tessellation.is_empty());
        debug_assert!(self.num_left_lanes <= self.lanes.len());

        let mut ret = vec![BoundaryTessellation::default(); self.lanes.len() + 1];
        ret[self.num_left_lanes].lateral_positions = vec![0.0; ref_line_tessellation.len()];

        if self.num_left_lanes > 0 {
            self.tessellate_lane_boundaries_side(
                ref_line_tessellation,
                &mut ret,
                (0..self.num_left_lanes).rev().collect(),
                -1,
            );
        }
        if self.num_left_lanes < self.lanes.len() {
            self.tessellate_lane_boundaries_side(
                ref_line_tessellation,
                &mut ret,
                (self.num_left_lanes..self.lanes.len()).collect(),
                1,
            );
        }

        ret
    }

    /// Walks the lanes on one side of the reference line, from the lane
    /// adjacent to it outwards, building each lane's far boundary from its
    /// width curve and its near boundary. The near boundary is always
    /// available: it's either the previous iteration's far boundary or the
    /// reference line itself.
    fn tessellate_lane_boundaries_side(
        &self,
        ref_line_tessellation: &[Vertex],
        boundaries: &mut [BoundaryTessellation],
        lane_indices: Vec<usize>,
        step_dir: i32,
    ) {
        debug_assert!(step_dir == -1 || step_dir == 1);

        let mut boundary_idx = self.num_left_lanes;

        for lane_idx in lane_indices {
            let next_boundary_idx = (boundary_idx as i64 + step_dir as i64) as usize;
            let mut outer = vec![0.0; ref_line_tessellation.len()];

            let inner = &boundaries[boundary_idx].lateral_positions;
            let widths = self.lanes[lane_idx].width_poly3s();
            let mut cur_poly = 0;

            for (i, ref_line_vertex) in ref_line_tessellation.iter().enumerate() {
                let param = ref_line_vertex.s_coord - self.start_s;

                // The samples are sorted by s, so the width polynomial lookup
                // only ever advances.
                while cur_poly + 1 < widths.len() && param >= widths[cur_poly + 1].s_offset() {
                    cur_poly += 1;
                }

                let ds = param - widths[cur_poly].s_offset();
                outer[i] = inner[i] + widths[cur_poly].poly3().eval(ds) * -(step_dir as f64);
            }

            boundaries[next_boundary_idx].lateral_positions = outer;
            boundary_idx = next_boundary_idx;
        }
    }

    /// Tessellates the lane boundaries into cartesian polylines. Boundary
    /// order matches [`tessellate_lane_boundaries`](Self::tessellate_lane_boundaries).
    pub fn tessellate_lane_boundary_curves(&self, ref_line_tessellation: &[Vertex]) -> Vec<BoundaryCurveTessellation> {
        debug_assert!(!ref_line_tessellation.is_empty());

        let boundaries = self.tessellate_lane_boundaries(ref_line_tessellation);

        let mut ret = vec![BoundaryCurveTessellation::default(); boundaries.len()];
        for boundary in &mut ret {
            boundary.vertices = vec![DVec2::ZERO; ref_line_tessellation.len()];
        }

        for (i, ref_line_vertex) in ref_line_tessellation.iter().enumerate() {
            let perp = perp_dir(ref_line_vertex.heading);
            for (j, boundary) in boundaries.iter().enumerate() {
                ret[j].vertices[i] = ref_line_vertex.position + perp * boundary.lateral_positions[i];
            }
        }

        ret
    }

    /// Tessellates the lanes in center-line-plus-variance form. Lane `j`
    /// lies between boundaries `j` and `j + 1`.
    pub fn tessellate_lane_center_lines(&self, ref_line_tessellation: &[Vertex]) -> Vec<CenterLineTessellation> {
        debug_assert!(!ref_line_tessellation.is_empty());

        let boundaries = self.tessellate_lane_boundaries(ref_line_tessellation);
        let num_points = ref_line_tessellation.len();
        let num_lanes = boundaries.len() - 1;

        let mut ret = vec![CenterLineTessellation::default(); num_lanes];
        for lane in &mut ret {
            lane.vertices = vec![DVec2::ZERO; num_points];
            lane.variances = vec![0.0; num_points];
        }

        for (i, ref_line_vertex) in ref_line_tessellation.iter().enumerate() {
            let perp = perp_dir(ref_line_vertex.heading);
            for j in 0..num_lanes {
                let variance = 0.5 * (boundaries[j + 1].lateral_positions[i] - boundaries[j].lateral_positions[i]);
                let center_line_lateral = boundaries[j].lateral_positions[i] + variance;
                ret[j].vertices[i] = ref_line_vertex.position + perp * center_line_lateral;
                ret[j].variances[i] = variance;
            }
        }

        ret
    }

    /// Computes the boundary curves and the center lines in a single pass
    /// over the reference-line tessellation, so the perpendicular directions
    /// are only computed once. The results match
    /// [`tessellate_lane_boundary_curves`](Self::tessellate_lane_boundary_curves) and
    /// [`tessellate_lane_center_lines`](Self::tessellate_lane_center_lines).
    pub fn tessellate_lane_boundary_curves_and_center_lines(
        &self,
        ref_line_tessellation: &[Vertex],
    ) -> BoundaryCurveAndCenterLineTessellations {
        debug_assert!(!ref_line_tessellation.is_empty());

        let boundaries = self.tessellate_lane_boundaries(ref_line_tessellation);
        let num_points = ref_line_tessellation.len();
        let num_boundaries = boundaries.len();
        let num_lanes = num_boundaries - 1;

        let mut ret = BoundaryCurveAndCenterLineTessellations {
            boundary_curve_tessellations: vec![BoundaryCurveTessellation::default(); num_boundaries],
            center_line_tessellations: vec![CenterLineTessellation::default(); num_lanes],
        };
        for boundary in &mut ret.boundary_curve_tessellations {
            boundary.vertices = vec![DVec2::ZERO; num_points];
        }
        for lane in &mut ret.center_line_tessellations {
            lane.vertices = vec![DVec2::ZERO; num_points];
            lane.variances = vec![0.0; num_points];
        }

        for (i, ref_line_vertex) in ref_line_tessellation.iter().enumerate() {
            let perp = perp_dir(ref_line_vertex.heading);

            for (j, boundary) in boundaries.iter().enumerate() {
                ret.boundary_curve_tessellations[j].vertices[i] =
                    ref_line_vertex.position + perp * boundary.lateral_positions[i];
            }

            for j in 0..num_lanes {
                let variance = 0.5 * (boundaries[j + 1].lateral_positions[i] - boundaries[j].lateral_positions[i]);
                let center_line_lateral = boundaries[j].lateral_positions[i] + variance;
                ret.center_line_tessellations[j].vertices[i] = ref_line_vertex.position + perp * center_line_lateral;
                ret.center_line_tessellations[j].variances[i] = variance;
            }
        }

        ret
    }

    /// Validates the per-lane attribute vectors: every s-offset sequence
    /// must be strictly increasing and lie in `[0, end_s - start_s)`, and a
    /// single-sided section must keep all lanes on one side.
    pub fn validate(&self) -> Result<()> {
        let max_s_offset = self.end_s - self.start_s;
        for lane in &self.lanes {
            lane.validate(max_s_offset)?;
        }
        if self.single_sided && self.num_left_lanes != 0 && self.num_left_lanes != self.lanes.len() {
            bail!("A single-sided lane section must not have lanes on both sides of the reference line.");
        }
        Ok(())
    }

    pub(crate) fn lanes_mut(&mut self) -> &mut [Lane] {
        &mut self.lanes
    }

    /// Only for use from tests.
    pub fn test_lane_by_id(&mut self, id: LaneId) -> &mut Lane {
        let idx = self.lane_id_to_index(id);
        &mut self.lanes[idx]
    }

    /// Only for use from tests.
    pub fn test_set_end_s(&mut self, end_s: f64) {
        self.end_s = end_s;
    }
}

fn perp_dir(heading: f64) -> DVec2 {
    DVec2::new(-heading.sin(), heading.cos())
}

fn lane_section_attrib_parsers() -> &'static XmlAttributeParsers<LaneSection> {
    static PARSERS: OnceLock<XmlAttributeParsers<LaneSection>> = OnceLock::new();
    PARSERS.get_or_init(|| {
        let mut parsers = XmlAttributeParsers::new();
        parsers.field("s", Invalidations::GEOMETRY, |section: &mut LaneSection, s: f64| {
            section.start_s = s
        });
        parsers.optional_field(
            "singleSided",
            Invalidations::GEOMETRY,
            |section: &mut LaneSection, single_sided: bool| section.single_sided = single_sided,
        );
        parsers.finalize();
        parsers
    })
}

fn lane_section_child_parsers() -> &'static XmlChildElementParsers<LaneSection> {
    static PARSERS: OnceLock<XmlChildElementParsers<LaneSection>> = OnceLock::new();
    PARSERS.get_or_init(|| {
        let mut parsers = XmlChildElementParsers::new();
        parsers.parser("left", Multiplicity::ZeroOrOne, Invalidations::ALL, parse_left_lanes);
        parsers.parser("center", Multiplicity::One, Invalidations::ALL, |_node, result| {
            if !result.value().lanes.is_empty() && result.value().lanes.last().unwrap().id() != LaneId(1) {
                result.push_error(XodrParseError::message(
                    "Lanes should occur with consecutive and descending IDs.",
                    Invalidations::ALL,
                ));
            }
            // The center lane itself carries no widths; it's not stored.
        });
        parsers.parser("right", Multiplicity::ZeroOrOne, Invalidations::NONE, parse_right_lanes);
        parsers.finalize();
        parsers
    })
}

fn parse_left_lanes(node: roxmltree::Node, result: &mut XodrParseResult<LaneSection>) {
    XmlChildElementParsers::parse_one_or_more(node, result, "lane", Invalidations::NONE, |node, result| {
        let mut lane = Lane::parse_xml(node);
        if lane.has_valid_geometry() {
            if lane.value().id() <= LaneId(0) {
                lane.push_error(XodrParseError::message(
                    "Left lanes must have a positive ID.",
                    Invalidations::ALL,
                ));
            }
            if let Some(prev_lane) = result.value().lanes.last() {
                if prev_lane.id().0 - 1 != lane.value().id().0 {
                    lane.push_error(XodrParseError::message(
                        "Lanes should occur with consecutive and descending IDs.",
                        Invalidations::ALL,
                    ));
                }
            }
        }

        let lane = result.absorb(lane);
        result.value_mut().lanes.push(lane);
        result.value_mut().num_left_lanes += 1;
    });
}

fn parse_right_lanes(node: roxmltree::Node, result: &mut XodrParseResult<LaneSection>) {
    XmlChildElementParsers::parse_one_or_more(node, result, "lane", Invalidations::NONE, |node, result| {
        let mut lane = Lane::parse_xml(node);
        if lane.has_valid_geometry() {
            if lane.value().id() >= LaneId(0) {
                lane.push_error(XodrParseError::message(
                    "Right lanes must have a negative ID.",
                    Invalidations::ALL,
                ));
            }

            let first_right_lane = match result.value().lanes.last() {
                None => true,
                Some(prev_lane) => prev_lane.id() == LaneId(1),
            };
            if first_right_lane {
                if lane.value().id() != LaneId(-1) {
                    lane.push_error(XodrParseError::message(
                        "Lanes should occur with consecutive and descending IDs.",
                        Invalidations::ALL,
                    ));
                }
            } else if result.value().lanes.last().unwrap().id().0 - 1 != lane.value().id().0 {
                lane.push_error(XodrParseError::message(
                    "Lanes should occur with consecutive and descending IDs.",
                    Invalidations::ALL,
                ));
            }
        }

        let lane = result.absorb(lane);
        result.value_mut().lanes.push(lane);
    });
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::geometry::{Geometry, ReferenceLine, Vertex};

    use super::*;

    pub(crate) fn parse_section(text: &str) -> XodrParseResult<LaneSection> {
        let doc = roxmltree::Document::parse(text).unwrap();
        LaneSection::parse_xml(doc.root_element())
    }

    fn constant_width_lane(id: i32, width: f64) -> String {
        format!(
            r#"<lane id="{}" type="driving" level="false">
                 <width sOffset="0" a="{}" b="0" c="0" d="0"/>
               </lane>"#,
            id, width
        )
    }

    fn three_by_three_section() -> LaneSection {
        let text = format!(
            r#"<laneSection s="0">
                 <left>{}{}{}</left>
                 <center><lane id="0" type="none"/></center>
                 <right>{}{}{}</right>
               </laneSection>"#,
            constant_width_lane(3, 1.5),
            constant_width_lane(2, 0.35),
            constant_width_lane(1, 3.65),
            constant_width_lane(-1, 3.65),
            constant_width_lane(-2, 0.35),
            constant_width_lane(-3, 1.5),
        );
        let mut result = parse_section(&text);
        assert!(result.errors().is_empty(), "{:?}", result.error_messages());
        result.value_mut().set_end_s(10.0);
        let (section, _) = result.into_parts();
        section
    }

    fn straight_ref_line_tessellation(length: f64) -> Vec<Vertex> {
        let line = Geometry::line(Vertex::default(), length);
        ReferenceLine::from_geometries(vec![line]).tessellate(0.0, length)
    }

    #[test]
    fn lane_index_id_mapping() {
        let section = three_by_three_section();
        assert_eq!(section.num_left_lanes(), 3);
        assert_eq!(section.num_right_lanes(), 3);
        assert_eq!(section.lanes().len(), 6);

        assert_eq!(section.lane_id_to_index(LaneId(3)), 0);
        assert_eq!(section.lane_id_to_index(LaneId(1)), 2);
        assert_eq!(section.lane_id_to_index(LaneId(-1)), 3);
        assert_eq!(section.lane_id_to_index(LaneId(-3)), 5);

        assert_eq!(section.lane_index_to_id(0), LaneId(3));
        assert_eq!(section.lane_index_to_id(2), LaneId(1));
        assert_eq!(section.lane_index_to_id(3), LaneId(-1));
        assert_eq!(section.lane_index_to_id(5), LaneId(-3));
    }

    #[test]
    fn lane_index_id_mapping_is_a_bijection() {
        let section = three_by_three_section();
        for idx in 0..section.lanes().len() {
            assert_eq!(section.lane_id_to_index(section.lane_index_to_id(idx)), idx);
        }
        for id in [-3, -2, -1, 1, 2, 3] {
            assert_eq!(section.lane_index_to_id(section.lane_id_to_index(LaneId(id))), LaneId(id));
        }
    }

    #[test]
    fn boundary_lateral_positions() {
        let section = three_by_three_section();
        let ref_tess = straight_ref_line_tessellation(10.0);
        let boundaries = section.tessellate_lane_boundaries(&ref_tess);

        assert_eq!(boundaries.len(), 7);
        let expected = [5.5, 4.0, 3.65, 0.0, -3.65, -4.0, -5.5];
        for (boundary, expected_lateral) in boundaries.iter().zip(expected) {
            for lateral in &boundary.lateral_positions {
                assert_relative_eq!(*lateral, expected_lateral, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn single_left_lane_boundary_law() {
        // A single left lane of constant width w on a straight reference
        // line: the left boundary is exactly y = w, the right boundary the
        // reference line.
        let text = format!(
            r#"<laneSection s="0">
                 <left>{}</left>
                 <center><lane id="0" type="none"/></center>
                 <right>{}</right>
               </laneSection>"#,
            constant_width_lane(1, 2.25),
            constant_width_lane(-1, 0.0),
        );
        let mut result = parse_section(&text);
        assert!(result.errors().is_empty());
        result.value_mut().set_end_s(8.0);
        let (section, _) = result.into_parts();

        let ref_tess = straight_ref_line_tessellation(8.0);
        let boundaries = section.tessellate_lane_boundaries(&ref_tess);
        assert_eq!(boundaries.len(), 3);
        for i in 0..ref_tess.len() {
            assert_relative_eq!(boundaries[0].lateral_positions[i], 2.25);
            assert_relative_eq!(boundaries[1].lateral_positions[i], 0.0);
        }

        let curves = section.tessellate_lane_boundary_curves(&ref_tess);
        for (i, vert) in ref_tess.iter().enumerate() {
            assert_relative_eq!(curves[0].vertices[i].x, vert.position.x);
            assert_relative_eq!(curves[0].vertices[i].y, 2.25);
            assert_relative_eq!(curves[1].vertices[i].y, 0.0);
        }
    }

    #[test]
    fn center_lines_and_variances() {
        let section = three_by_three_section();
        let ref_tess = straight_ref_line_tessellation(10.0);
        let center_lines = section.tessellate_lane_center_lines(&ref_tess);

        assert_eq!(center_lines.len(), 6);
        // The innermost left lane spans laterals [0, 3.65].
        let inner_left = &center_lines[2];
        for i in 0..ref_tess.len() {
            assert_relative_eq!(inner_left.vertices[i].y, 3.65 / 2.0, epsilon = 1e-12);
            assert_relative_eq!(inner_left.variances[i], -3.65 / 2.0, epsilon = 1e-12);
        }

        let combined = section.tessellate_lane_boundary_curves_and_center_lines(&ref_tess);
        assert_eq!(combined.boundary_curve_tessellations.len(), 7);
        assert_eq!(combined.center_line_tessellations.len(), 6);
        for i in 0..ref_tess.len() {
            assert_relative_eq!(
                combined.center_line_tessellations[2].vertices[i].y,
                inner_left.vertices[i].y
            );
            assert_relative_eq!(
                combined.boundary_curve_tessellations[0].vertices[i].y,
                5.5,
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn width_lookup_walks_the_piecewise_curve() {
        let text = r#"<laneSection s="0">
                        <center><lane id="0" type="none"/></center>
                        <right>
                          <lane id="-1" type="driving">
                            <width sOffset="0" a="2" b="0" c="0" d="0"/>
                            <width sOffset="5" a="3" b="0.5" c="0" d="0"/>
                          </lane>
                        </right>
                      </laneSection>"#;
        let mut result = parse_section(text);
        assert!(result.errors().is_empty());
        result.value_mut().set_end_s(10.0);
        let (section, _) = result.into_parts();

        let lane = section.lane_by_id(LaneId(-1));
        assert_relative_eq!(lane.width_at_s_coord(0.0), 2.0);
        assert_relative_eq!(lane.width_at_s_coord(4.9), 2.0);
        assert_relative_eq!(lane.width_at_s_coord(5.0), 3.0);
        assert_relative_eq!(lane.width_at_s_coord(7.0), 4.0);
    }

    #[test]
    fn lane_links_parse() {
        let text = r#"<laneSection s="0">
                        <left>
                          <lane id="1" type="driving">
                            <link><predecessor id="1"/><successor id="2"/></link>
                            <width sOffset="0" a="3" b="0" c="0" d="0"/>
                          </lane>
                        </left>
                        <center><lane id="0" type="none"/></center>
                      </laneSection>"#;
        let result = parse_section(text);
        assert!(result.errors().is_empty(), "{:?}", result.error_messages());
        let lane = result.value().lane_by_id(LaneId(1));
        assert_eq!(lane.predecessor(), Some(LaneId(1)));
        assert_eq!(lane.successor(), Some(LaneId(2)));
        assert_eq!(lane.link(RoadLinkType::Predecessor), Some(LaneId(1)));
        assert_eq!(lane.link(RoadLinkType::Successor), Some(LaneId(2)));
    }

    #[test]
    fn non_consecutive_lane_ids_are_rejected() {
        let text = format!(
            r#"<laneSection s="0">
                 <left>{}{}</left>
                 <center><lane id="0" type="none"/></center>
               </laneSection>"#,
            constant_width_lane(3, 1.0),
            constant_width_lane(1, 1.0),
        );
        let result = parse_section(&text);
        assert!(result.has_fatal_errors());
    }

    #[test]
    fn wrong_sign_lane_ids_are_rejected() {
        let text = format!(
            r#"<laneSection s="0">
                 <left>{}</left>
                 <center><lane id="0" type="none"/></center>
               </laneSection>"#,
            constant_width_lane(-1, 1.0),
        );
        let result = parse_section(&text);
        assert!(result.has_fatal_errors());

        let text = format!(
            r#"<laneSection s="0">
                 <center><lane id="0" type="none"/></center>
                 <right>{}</right>
               </laneSection>"#,
            constant_width_lane(1, 1.0),
        );
        let result = parse_section(&text);
        assert!(result.has_fatal_errors());
    }

    #[test]
    fn missing_center_lane_is_rejected() {
        let text = format!(
            r#"<laneSection s="0">
                 <left>{}</left>
               </laneSection>"#,
            constant_width_lane(1, 1.0),
        );
        let result = parse_section(&text);
        assert!(result.has_fatal_errors());
    }

    #[test]
    fn validate_checks_attribute_s_offsets() {
        let text = r#"<laneSection s="0">
                        <center><lane id="0" type="none"/></center>
                        <right>
                          <lane id="-1" type="driving">
                            <width sOffset="0" a="2" b="0" c="0" d="0"/>
                            <material sOffset="4" surface="asphalt" friction="1" roughness="0"/>
                            <material sOffset="2" surface="gravel" friction="0.7" roughness="1"/>
                          </lane>
                        </right>
                      </laneSection>"#;
        let mut result = parse_section(text);
        result.value_mut().set_end_s(10.0);
        let (section, _) = result.into_parts();
        let err = section.validate().unwrap_err();
        assert!(err.to_string().contains("material"));
    }

    #[test]
    fn validate_rejects_out_of_range_s_offsets() {
        let text = r#"<laneSection s="0">
                        <center><lane id="0" type="none"/></center>
                        <right>
                          <lane id="-1" type="driving">
                            <width sOffset="0" a="2" b="0" c="0" d="0"/>
                            <width sOffset="12" a="3" b="0" c="0" d="0"/>
                          </lane>
                        </right>
                      </laneSection>"#;
        let mut result = parse_section(text);
        result.value_mut().set_end_s(10.0);
        let (section, _) = result.into_parts();
        assert!(section.validate().is_err());
    }

    #[test]
    fn validate_rejects_double_sided_single_sided_section() {
        let text = format!(
            r#"<laneSection s="0" singleSided="true">
                 <left>{}</left>
                 <center><lane id="0" type="none"/></center>
                 <right>{}</right>
               </laneSection>"#,
            constant_width_lane(1, 1.0),
            constant_width_lane(-1, 1.0),
        );
        let mut result = parse_section(&text);
        result.value_mut().set_end_s(10.0);
        let (section, _) = result.into_parts();
        assert!(section.validate().is_err());
    }
}
