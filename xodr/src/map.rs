use std::fs;
use std::sync::OnceLock;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::junction::{Connection, Junction};
use crate::map_keys::RoadContactPointKey;
use crate::object_reference::IdToIndexMaps;
use crate::result::{Invalidations, XodrParseError, XodrParseResult};
use crate::road::Road;
use crate::road_link::{RoadLink, RoadLinkType};
use crate::validation::{self, LinkValidationError};
use crate::xml::{Multiplicity, XmlChildElementParsers};

/// The root object of an OpenDRIVE road map.
///
/// Constructed once by [`from_file`](Self::from_file) /
/// [`from_text`](Self::from_text), then immutable: all queries are read-only.
/// Cross references between entities are held as indices resolved during
/// parsing, so lookups along the road graph are direct.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct XodrMap {
    geo_reference: Option<String>,

    roads: Vec<Road>,
    junctions: Vec<Junction>,

    #[serde(skip)]
    id_to_index_maps: IdToIndexMaps,

    total_num_lanes: usize,
}

impl XodrMap {
    /// Loads an XodrMap from the given `.xodr` file.
    ///
    /// I/O problems and XML well-formedness errors fail the whole load;
    /// everything else is accumulated in the returned result next to the
    /// (possibly partial) map.
    pub fn from_file(file_name: &str) -> Result<XodrParseResult<XodrMap>> {
        let text = fs::read_to_string(file_name).with_context(|| format!("couldn't read {}", file_name))?;
        let result = Self::from_text(&text).with_context(|| format!("couldn't parse {}", file_name))?;
        info!(
            "loaded {} with {} roads, {} junctions, {} lanes",
            file_name,
            result.value().roads().len(),
            result.value().junctions().len(),
            result.value().total_num_lanes()
        );
        Ok(result)
    }

    /// Loads an XodrMap from OpenDRIVE XML text.
    pub fn from_text(text: &str) -> Result<XodrParseResult<XodrMap>> {
        let doc = roxmltree::Document::parse(text).context("not well-formed XML")?;
        let root = doc.root_element();
        if !root.has_tag_name("OpenDRIVE") {
            bail!(
                "expected an <OpenDRIVE> root element, found <{}>",
                root.tag_name().name()
            );
        }
        Ok(Self::parse_xml(root))
    }

    fn parse_xml(node: roxmltree::Node) -> XodrParseResult<XodrMap> {
        let mut ret = XodrParseResult::<XodrMap>::default();
        map_child_parsers().parse(node, &mut ret);

        let mut errors = Vec::new();
        ret.value_mut().resolve_references(&mut errors);
        for error in errors {
            ret.push_error(error);
        }

        ret.value_mut().assign_global_lane_indices();
        ret
    }

    /// Whether the map carries a geo-reference (a proj-style projection
    /// string describing the mapping from geographic to map coordinates).
    pub fn has_geo_reference(&self) -> bool {
        self.geo_reference.is_some()
    }

    pub fn geo_reference(&self) -> Option<&str> {
        self.geo_reference.as_deref()
    }

    pub fn roads(&self) -> &[Road] {
        &self.roads
    }

    /// The road with the given id, if any.
    pub fn road_by_id(&self, id: &str) -> Option<&Road> {
        self.road_index_by_id(id).map(|idx| &self.roads[idx])
    }

    /// The index of the road with the given id, if any.
    pub fn road_index_by_id(&self, id: &str) -> Option<usize> {
        self.id_to_index_maps.road_id_to_index.get(id).copied()
    }

    pub fn junctions(&self) -> &[Junction] {
        &self.junctions
    }

    /// The junction with the given id, if any.
    pub fn junction_by_id(&self, id: &str) -> Option<&Junction> {
        self.junction_index_by_id(id).map(|idx| &self.junctions[idx])
    }

    /// The index of the junction with the given id, if any.
    pub fn junction_index_by_id(&self, id: &str) -> Option<usize> {
        self.id_to_index_maps.junction_id_to_index.get(id).copied()
    }

    /// The total number of lanes in the map. Use this as the size of arrays
    /// indexed by [`Lane::global_index`](crate::Lane::global_index).
    pub fn total_num_lanes(&self) -> usize {
        self.total_num_lanes
    }

    /// Whether at least one road carries at least one road object.
    pub fn has_road_objects(&self) -> bool {
        self.roads.iter().any(|road| !road.road_objects().is_empty())
    }

    /// Validates the map: per-lane-section checks, junction membership, and
    /// a pass/fail gate over full link validation. Use
    /// [`validate_links`](Self::validate_links) to get the individual link
    /// errors.
    pub fn validate(&self) -> Result<()> {
        for road in &self.roads {
            road.validate()?;
        }

        validation::validate_junction_membership(self)?;

        let mut errors = Vec::new();
        if !validation::validate_links(self, &mut errors) {
            bail!("Link validation failed. Run the link validator for exact error messages.");
        }

        Ok(())
    }

    /// Runs full link validation and returns every error found.
    ///
    /// The map must have valid connectivity (see
    /// [`XodrParseResult::has_valid_connectivity`]); the validator follows
    /// resolved reference indices.
    pub fn validate_links(&self) -> Vec<LinkValidationError> {
        let mut errors = Vec::new();
        validation::validate_links(self, &mut errors);
        errors
    }

    fn resolve_references(&mut self, errors: &mut Vec<XodrParseError>) {
        debug_assert!(self.id_to_index_maps.road_id_to_index.is_empty());
        debug_assert!(self.id_to_index_maps.junction_id_to_index.is_empty());

        for (i, road) in self.roads.iter().enumerate() {
            if self
                .id_to_index_maps
                .road_id_to_index
                .insert(road.id().to_string(), i)
                .is_some()
            {
                errors.push(XodrParseError::message(
                    format!("Multiple roads with id '{}' found.", road.id()),
                    Invalidations::ALL,
                ));
                return;
            }
        }

        for (i, junction) in self.junctions.iter().enumerate() {
            if self
                .id_to_index_maps
                .junction_id_to_index
                .insert(junction.id().to_string(), i)
                .is_some()
            {
                errors.push(XodrParseError::message(
                    format!("Multiple junctions with id '{}' found.", junction.id()),
                    Invalidations::ALL,
                ));
                return;
            }
        }

        for road in &mut self.roads {
            if let Err(err) = road.resolve_references(&self.id_to_index_maps) {
                errors.push(XodrParseError::message(
                    format!("Road with id '{}' has invalid connection. {}", road.id(), err),
                    Invalidations::CONNECTIVITY,
                ));
            }
        }

        for junction in &mut self.junctions {
            if let Err(err) = junction.resolve_references(&self.id_to_index_maps) {
                errors.push(XodrParseError::message(
                    format!("Junction with id '{}' has invalid connection. {}", junction.id(), err),
                    Invalidations::CONNECTIVITY,
                ));
            }
        }
    }

    /// Assigns dense 0-based global lane indices, walking roads, lane
    /// sections and lanes in file order. This matches numbering lanes as
    /// they are parsed, and gives every road a contiguous index range.
    fn assign_global_lane_indices(&mut self) {
        let mut next = 0;
        for road in &mut self.roads {
            for lane_section in road.lane_sections_mut() {
                for lane in lane_section.lanes_mut() {
                    lane.set_global_index(next);
                    next += 1;
                }
            }
        }
        self.total_num_lanes = next;
    }

    /// Only for use from tests.
    pub fn test_road_by_id(&mut self, id: &str) -> Option<&mut Road> {
        let idx = self.id_to_index_maps.road_id_to_index.get(id).copied()?;
        Some(&mut self.roads[idx])
    }

    /// Only for use from tests.
    pub fn test_junction_by_id(&mut self, id: &str) -> Option<&mut Junction> {
        let idx = self.id_to_index_maps.junction_id_to_index.get(id).copied()?;
        Some(&mut self.junctions[idx])
    }
}

/// Calls `f` exactly once for every pair of connected road contact points in
/// the map.
///
/// Most connections between adjacent roads appear twice in an OpenDRIVE file
/// (once from each side), but connecting-to-outgoing junction connections
/// appear only once. To visit every pair exactly once, links are walked from
/// the junction road's side when one of the two roads belongs to a junction,
/// and from the lower-indexed road otherwise. When two connecting roads of
/// adjacent junctions meet, the junction connection carrying the pair is
/// passed as the third argument.
///
/// The map must have valid connectivity.
pub fn for_each_road_link<F>(map: &XodrMap, mut f: F)
where
    F: FnMut(RoadContactPointKey, RoadContactPointKey, Option<&Connection>),
{
    for (road_idx, road) in map.roads().iter().enumerate() {
        for road_link_type in [RoadLinkType::Predecessor, RoadLinkType::Successor] {
            match road.road_link(road_link_type) {
                RoadLink::NotSpecified => {}

                RoadLink::ToRoad {
                    road: other,
                    contact_point,
                } => {
                    let other_road_idx = other.index();
                    if road.junction_ref().has_value() || road_idx < other_road_idx {
                        f(
                            RoadContactPointKey::new(road_idx, road_link_type.contact_point()),
                            RoadContactPointKey::new(other_road_idx, *contact_point),
                            None,
                        );
                    }
                }

                RoadLink::ToJunction { junction } => {
                    // A junction link from a road which is itself a junction
                    // path: the adjacent-junction case. (For a plain incoming
                    // road the pair is visited from the connecting road's
                    // direct link instead.)
                    if road.junction_ref().has_value() {
                        let junction = &map.junctions()[junction.index()];
                        for connection in junction.connections() {
                            if connection.incoming_road().index() != road_idx {
                                continue;
                            }
                            let contact_point = match connection.contact_point() {
                                Some(contact_point) => contact_point,
                                None => continue,
                            };
                            f(
                                RoadContactPointKey::new(road_idx, road_link_type.contact_point()),
                                RoadContactPointKey::new(connection.connecting_road().index(), contact_point),
                                Some(connection),
                            );
                        }
                    }
                }
            }
        }
    }
}

fn map_child_parsers() -> &'static XmlChildElementParsers<XodrMap> {
    static PARSERS: OnceLock<XmlChildElementParsers<XodrMap>> = OnceLock::new();
    PARSERS.get_or_init(|| {
        let mut parsers = XmlChildElementParsers::new();
        parsers.parser("header", Multiplicity::One, Invalidations::ALL, |node, result| {
            header_child_parsers().parse(node, result);
        });
        parsers.vector(
            "road",
            Multiplicity::OneOrMore,
            Invalidations::ALL,
            Road::parse_xml,
            |map: &mut XodrMap, road| map.roads.push(road),
        );
        parsers.vector(
            "junction",
            Multiplicity::ZeroOrMore,
            Invalidations::ALL,
            Junction::parse_xml,
            |map: &mut XodrMap, junction| map.junctions.push(junction),
        );
        parsers.finalize();
        parsers
    })
}

fn header_child_parsers() -> &'static XmlChildElementParsers<XodrMap> {
    static PARSERS: OnceLock<XmlChildElementParsers<XodrMap>> = OnceLock::new();
    PARSERS.get_or_init(|| {
        let mut parsers: XmlChildElementParsers<XodrMap> = XmlChildElementParsers::new();
        parsers.parser("geoReference", Multiplicity::ZeroOrOne, Invalidations::NONE, |node, result| {
            result.value_mut().geo_reference = Some(node.text().unwrap_or("").to_string());
        });
        parsers.finalize();
        parsers
    })
}
