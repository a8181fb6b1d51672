//! Parsing, geometric evaluation and structural validation of
//! [OpenDRIVE](https://www.asam.net/standards/detail/opendrive/) road networks.
//!
//! An OpenDRIVE (`.xodr`) file describes a road network as a set of roads,
//! each with a piecewise-analytic reference line and a sequence of lane
//! sections, plus junctions tying road ends together. [`XodrMap::from_file`]
//! parses such a file into an in-memory map. Parsing never aborts on semantic
//! problems; every parser accumulates [`XodrParseError`]s next to the partial
//! value it produced, and each error carries an [`Invalidations`] mask telling
//! downstream code which uses of the map it breaks.
//!
//! Once parsed, the map supports:
//!
//! - geometric queries and tessellation on road reference lines
//!   ([`geometry::ReferenceLine`]) and lane boundaries ([`LaneSection`]),
//! - structural validation of the link graph ([`XodrMap::validate_links`]),
//!   reporting road-link and lane-link asymmetries as structured
//!   [`validation::LinkValidationError`]s.

#[macro_use]
extern crate log;

pub mod geometry;
pub mod validation;
pub mod xml;

mod elevation;
mod junction;
mod lane_attributes;
mod lane_id;
mod lane_section;
mod map;
mod map_keys;
mod object_reference;
mod result;
mod road;
mod road_link;
mod road_object;
mod units;

pub use crate::elevation::{Elevation, ElevationProfile};
pub use crate::junction::{Connection, Junction, LaneLink};
pub use crate::lane_attributes::{
    LaneAccess, LaneHeight, LaneMaterial, LaneRule, LaneSpeedLimit, LaneVisibility,
};
pub use crate::lane_id::LaneId;
pub use crate::lane_section::{
    BoundaryCurveAndCenterLineTessellations, BoundaryCurveTessellation, BoundaryTessellation,
    CenterLineTessellation, Lane, LaneSection, LaneType, WidthPoly3,
};
pub use crate::map::{for_each_road_link, XodrMap};
pub use crate::map_keys::{
    lane_section_by_key, JunctionConnectionKey, JunctionLaneLinkKey, LaneKey, LaneSectionContactPointKey,
    LaneSectionKey, RoadContactPointKey,
};
pub use crate::object_reference::{IdToIndexMaps, XodrObjectReference};
pub use crate::result::{Invalidations, XodrParseError, XodrParseErrorData, XodrParseResult};
pub use crate::road::Road;
pub use crate::road_link::{
    ContactPoint, NeighborDirection, NeighborLink, NeighborSide, RoadLink, RoadLinkType, RoadLinks,
};
pub use crate::road_object::{
    Corner, CornerLocal, CornerRoad, RoadObject, RoadObjectOrientation, RoadObjectOutline, RoadObjectType,
};
pub use crate::units::{DistanceUnit, MassUnit, SpeedUnit};
