use std::sync::OnceLock;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::result::{Invalidations, XodrParseError, XodrParseResult};
use crate::xml::{FromXmlAttribute, Multiplicity, XmlAttributeParsers, XmlChildElementParsers};

/// The type of a road object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoadObjectType {
    #[default]
    None,
    Obstacle,
    Car,
    Truck,
    Van,
    Bus,
    Trailer,
    Bike,
    Motorbike,
    Tram,
    Train,
    Pedestrian,
    Pole,
    Tree,
    Vegetation,
    Barrier,
    Building,
    ParkingSpace,
    Wind,
    Patch,
}

impl RoadObjectType {
    pub fn name(self) -> &'static str {
        match self {
            RoadObjectType::None => "none",
            RoadObjectType::Obstacle => "obstacle",
            RoadObjectType::Car => "car",
            RoadObjectType::Truck => "truck",
            RoadObjectType::Van => "van",
            RoadObjectType::Bus => "bus",
            RoadObjectType::Trailer => "trailer",
            RoadObjectType::Bike => "bike",
            RoadObjectType::Motorbike => "motorbike",
            RoadObjectType::Tram => "tram",
            RoadObjectType::Train => "train",
            RoadObjectType::Pedestrian => "pedestrian",
            RoadObjectType::Pole => "pole",
            RoadObjectType::Tree => "tree",
            RoadObjectType::Vegetation => "vegetation",
            RoadObjectType::Barrier => "barrier",
            RoadObjectType::Building => "building",
            RoadObjectType::ParkingSpace => "parkingSpace",
            RoadObjectType::Wind => "wind",
            RoadObjectType::Patch => "patch",
        }
    }
}

impl FromXmlAttribute for RoadObjectType {
    fn from_xml_attribute(value: &str) -> Result<Self> {
        match value {
            "none" => Ok(RoadObjectType::None),
            "obstacle" => Ok(RoadObjectType::Obstacle),
            "car" => Ok(RoadObjectType::Car),
            "truck" => Ok(RoadObjectType::Truck),
            "van" => Ok(RoadObjectType::Van),
            "bus" => Ok(RoadObjectType::Bus),
            "trailer" => Ok(RoadObjectType::Trailer),
            "bike" => Ok(RoadObjectType::Bike),
            "motorbike" => Ok(RoadObjectType::Motorbike),
            "tram" => Ok(RoadObjectType::Tram),
            "train" => Ok(RoadObjectType::Train),
            "pedestrian" => Ok(RoadObjectType::Pedestrian),
            "pole" => Ok(RoadObjectType::Pole),
            "tree" => Ok(RoadObjectType::Tree),
            "vegetation" => Ok(RoadObjectType::Vegetation),
            "barrier" => Ok(RoadObjectType::Barrier),
            "building" => Ok(RoadObjectType::Building),
            "parkingSpace" => Ok(RoadObjectType::ParkingSpace),
            "wind" => Ok(RoadObjectType::Wind),
            "patch" => Ok(RoadObjectType::Patch),
            _ => bail!("'{}' isn't a valid road object type", value),
        }
    }
}

/// The road direction for which a road object is valid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoadObjectOrientation {
    Positive,
    Negative,
    /// Valid in both directions.
    #[default]
    None,
}

impl FromXmlAttribute for RoadObjectOrientation {
    fn from_xml_attribute(value: &str) -> Result<Self> {
        match value {
            "+" => Ok(RoadObjectOrientation::Positive),
            "-" => Ok(RoadObjectOrientation::Negative),
            "none" => Ok(RoadObjectOrientation::None),
            _ => bail!("'{}' isn't a valid road object orientation", value),
        }
    }
}

/// A corner of a road object outline, in the s/t coordinates of the parent
/// road.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct CornerRoad {
    s: f64,
    t: f64,
    dz: f64,
    height: f64,
}

impl CornerRoad {
    pub(crate) fn parse_xml(node: roxmltree::Node) -> XodrParseResult<CornerRoad> {
        static PARSERS: OnceLock<XmlAttributeParsers<CornerRoad>> = OnceLock::new();
        let parsers = PARSERS.get_or_init(|| {
            let mut parsers = XmlAttributeParsers::new();
            parsers.field("s", Invalidations::NONE, |c: &mut CornerRoad, v: f64| c.s = v);
            parsers.field("t", Invalidations::NONE, |c: &mut CornerRoad, v: f64| c.t = v);
            parsers.field("dz", Invalidations::NONE, |c: &mut CornerRoad, v: f64| c.dz = v);
            parsers.field("height", Invalidations::NONE, |c: &mut CornerRoad, v: f64| c.height = v);
            parsers.finalize();
            parsers
        });

        let mut ret = XodrParseResult::default();
        parsers.parse(node, &mut ret);
        ret
    }

    pub fn s(&self) -> f64 {
        self.s
    }

    pub fn t(&self) -> f64 {
        self.t
    }

    /// Z-offset of this corner relative to the road's reference line.
    pub fn dz(&self) -> f64 {
        self.dz
    }

    pub fn height(&self) -> f64 {
        self.height
    }
}

/// A corner of a road object outline, in the local u/v coordinates of the
/// parent road object.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct CornerLocal {
    u: f64,
    v: f64,
    z: f64,
    height: f64,
}

impl CornerLocal {
    pub(crate) fn parse_xml(node: roxmltree::Node) -> XodrParseResult<CornerLocal> {
        static PARSERS: OnceLock<XmlAttributeParsers<CornerLocal>> = OnceLock::new();
        let parsers = PARSERS.get_or_init(|| {
            let mut parsers = XmlAttributeParsers::new();
            parsers.field("u", Invalidations::NONE, |c: &mut CornerLocal, v: f64| c.u = v);
            parsers.field("v", Invalidations::NONE, |c: &mut CornerLocal, val: f64| c.v = val);
            parsers.field("z", Invalidations::NONE, |c: &mut CornerLocal, v: f64| c.z = v);
            parsers.field("height", Invalidations::NONE, |c: &mut CornerLocal, v: f64| c.height = v);
            parsers.finalize();
            parsers
        });

        let mut ret = XodrParseResult::default();
        parsers.parse(node, &mut ret);
        ret
    }

    pub fn u(&self) -> f64 {
        self.u
    }

    pub fn v(&self) -> f64 {
        self.v
    }

    pub fn z(&self) -> f64 {
        self.z
    }

    pub fn height(&self) -> f64 {
        self.height
    }
}

/// A corner of a [`RoadObjectOutline`], in either of the two supported
/// coordinate systems.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum Corner {
    Road(CornerRoad),
    Local(CornerLocal),
}

/// Custom geometry for a road object: a polygonal outline extruded upwards.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RoadObjectOutline {
    corners: Vec<Corner>,
}

impl RoadObjectOutline {
    pub(crate) fn parse_xml(node: roxmltree::Node) -> XodrParseResult<RoadObjectOutline> {
        static PARSERS: OnceLock<XmlChildElementParsers<RoadObjectOutline>> = OnceLock::new();
        let parsers = PARSERS.get_or_init(|| {
            let mut parsers = XmlChildElementParsers::new();
            parsers.vector(
                "cornerRoad",
                Multiplicity::ZeroOrMore,
                Invalidations::NONE,
                CornerRoad::parse_xml,
                |outline: &mut RoadObjectOutline, corner| outline.corners.push(Corner::Road(corner)),
            );
            parsers.vector(
                "cornerLocal",
                Multiplicity::ZeroOrMore,
                Invalidations::NONE,
                CornerLocal::parse_xml,
                |outline: &mut RoadObjectOutline, corner| outline.corners.push(Corner::Local(corner)),
            );
            parsers.finalize();
            parsers
        });

        let mut ret = XodrParseResult::default();
        parsers.parse(node, &mut ret);
        ret
    }

    /// The corners of this outline, in document order.
    pub fn corners(&self) -> &[Corner] {
        &self.corners
    }
}

/// An object on or along a road: a pole, obstacle, tree and the like.
///
/// The object's footprint is described in exactly one of three ways: a box
/// (length/width/height), a cylinder (radius/height), or an extruded
/// [`RoadObjectOutline`]. Use [`has_box_geometry`](Self::has_box_geometry),
/// [`has_cylinder_geometry`](Self::has_cylinder_geometry) and
/// [`has_outline_geometry`](Self::has_outline_geometry) to find out which;
/// inconsistent combinations are reported at parse time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoadObject {
    object_type: RoadObjectType,
    name: String,
    id: String,
    s: f64,
    t: f64,
    z_offset: f64,
    valid_length: f64,
    orientation: RoadObjectOrientation,

    length: f64,
    width: f64,
    radius: f64,
    height: f64,
    outline: Option<RoadObjectOutline>,

    heading: f64,
    pitch: f64,
    roll: f64,
}

impl Default for RoadObject {
    fn default() -> Self {
        RoadObject {
            object_type: RoadObjectType::None,
            name: String::new(),
            id: String::new(),
            s: 0.0,
            t: 0.0,
            z_offset: 0.0,
            valid_length: 0.0,
            orientation: RoadObjectOrientation::None,
            // NaN marks an absent dimension; which ones are present decides
            // the geometry encoding.
            length: f64::NAN,
            width: f64::NAN,
            radius: f64::NAN,
            height: f64::NAN,
            outline: None,
            heading: 0.0,
            pitch: 0.0,
            roll: 0.0,
        }
    }
}

impl RoadObject {
    pub(crate) fn parse_xml(node: roxmltree::Node) -> XodrParseResult<RoadObject> {
        let mut ret = XodrParseResult::default();
        road_object_attrib_parsers().parse(node, &mut ret);
        road_object_child_parsers().parse(node, &mut ret);

        let mut errors = Vec::new();
        ret.value().validate_geometry(&mut errors);
        for error in errors {
            ret.push_error(error);
        }
        ret
    }

    pub fn object_type(&self) -> RoadObjectType {
        self.object_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The s-coordinate of this object's origin on the parent road.
    pub fn s(&self) -> f64 {
        self.s
    }

    /// The t-coordinate of this object's origin on the parent road.
    pub fn t(&self) -> f64 {
        self.t
    }

    /// Z-offset of the object's origin relative to the road's track level.
    pub fn z_offset(&self) -> f64 {
        self.z_offset
    }

    /// The s-extent of this object's validity; 0 for point objects.
    pub fn valid_length(&self) -> f64 {
        self.valid_length
    }

    pub fn orientation(&self) -> RoadObjectOrientation {
        self.orientation
    }

    pub fn has_box_geometry(&self) -> bool {
        debug_assert!(self.length.is_nan() == self.width.is_nan());
        !self.length.is_nan()
    }

    pub fn has_cylinder_geometry(&self) -> bool {
        !self.radius.is_nan()
    }

    pub fn has_outline_geometry(&self) -> bool {
        self.outline.is_some()
    }

    /// The length of the box. Only valid with box geometry.
    pub fn length(&self) -> f64 {
        debug_assert!(self.has_box_geometry());
        self.length
    }

    /// The width of the box. Only valid with box geometry.
    pub fn width(&self) -> f64 {
        debug_assert!(self.has_box_geometry());
        self.width
    }

    /// The radius of the cylinder. Only valid with cylinder geometry.
    pub fn radius(&self) -> f64 {
        debug_assert!(self.has_cylinder_geometry());
        self.radius
    }

    /// The height of the box or cylinder.
    pub fn height(&self) -> f64 {
        debug_assert!(self.has_box_geometry() || self.has_cylinder_geometry());
        self.height
    }

    /// The outline. Only valid with outline geometry.
    pub fn outline(&self) -> &RoadObjectOutline {
        self.outline.as_ref().expect("road object has no outline geometry")
    }

    /// Heading of the object relative to the road's forward direction.
    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn roll(&self) -> f64 {
        self.roll
    }

    fn validate_geometry(&self, errors: &mut Vec<XodrParseError>) {
        if !self.length.is_nan() {
            if self.width.is_nan() {
                errors.push(XodrParseError::warning(format!(
                    "Road object with ID '{}' has missing 'width' attribute. A 'length' attribute is \
                     specified, so a 'width' attribute must be specified too.",
                    self.id
                )));
            }
            if !self.radius.is_nan() {
                errors.push(XodrParseError::warning(format!(
                    "Road object with ID '{}' has both 'length' and 'radius' attributes. Either a pair of \
                     'length' and 'width' attributes or a 'radius' attribute should be specified, but not both.",
                    self.id
                )));
            }
            if self.height.is_nan() {
                errors.push(XodrParseError::warning(format!(
                    "Road object with ID '{}' does not have a 'height' attribute. The 'height' attribute is \
                     required if the 'length' and 'width' attributes are specified.",
                    self.id
                )));
            }
            if self.outline.is_some() {
                errors.push(XodrParseError::warning(format!(
                    "Road object with ID '{}' has both 'length' and 'outline' attributes. Either a pair of \
                     'length' and 'width' attributes or an 'outline' attribute should be specified, but not both.",
                    self.id
                )));
            }
        } else if !self.width.is_nan() {
            errors.push(XodrParseError::warning(format!(
                "Road object with ID '{}' has missing 'length' attribute. A 'width' attribute is specified, \
                 so a 'length' attribute must be specified too.",
                self.id
            )));
        } else if !self.radius.is_nan() {
            if self.height.is_nan() {
                errors.push(XodrParseError::warning(format!(
                    "Road object with ID '{}' has missing 'height' attribute. A 'radius' attribute is \
                     specified, so a 'height' attribute must be specified too.",
                    self.id
                )));
            }
            if self.outline.is_some() {
                errors.push(XodrParseError::warning(format!(
                    "Road object with ID '{}' has both 'radius' and 'outline' attributes. Either a 'radius' \
                     attribute or an 'outline' attribute should be specified, but not both.",
                    self.id
                )));
            }
        } else if self.outline.is_none() {
            errors.push(XodrParseError::warning(format!(
                "Road object with ID '{}' does not have any size specification. Either a pair of 'length' \
                 and 'width' attributes, a 'radius' attribute or an 'outline' child element expected.",
                self.id
            )));
        }
    }
}

fn road_object_attrib_parsers() -> &'static XmlAttributeParsers<RoadObject> {
    static PARSERS: OnceLock<XmlAttributeParsers<RoadObject>> = OnceLock::new();
    PARSERS.get_or_init(|| {
        let mut parsers = XmlAttributeParsers::new();
        parsers.field("type", Invalidations::NONE, |o: &mut RoadObject, v: RoadObjectType| {
            o.object_type = v
        });
        parsers.field("name", Invalidations::NONE, |o: &mut RoadObject, v: String| o.name = v);
        parsers.field("id", Invalidations::NONE, |o: &mut RoadObject, v: String| o.id = v);
        parsers.field("s", Invalidations::NONE, |o: &mut RoadObject, v: f64| o.s = v);
        parsers.field("t", Invalidations::NONE, |o: &mut RoadObject, v: f64| o.t = v);
        parsers.field("zOffset", Invalidations::NONE, |o: &mut RoadObject, v: f64| {
            o.z_offset = v
        });
        parsers.field("validLength", Invalidations::NONE, |o: &mut RoadObject, v: f64| {
            o.valid_length = v
        });
        parsers.field(
            "orientation",
            Invalidations::NONE,
            |o: &mut RoadObject, v: RoadObjectOrientation| o.orientation = v,
        );
        parsers.optional_field("length", Invalidations::NONE, |o: &mut RoadObject, v: f64| {
            o.length = v
        });
        parsers.optional_field("width", Invalidations::NONE, |o: &mut RoadObject, v: f64| o.width = v);
        parsers.optional_field("radius", Invalidations::NONE, |o: &mut RoadObject, v: f64| {
            o.radius = v
        });
        parsers.optional_field("height", Invalidations::NONE, |o: &mut RoadObject, v: f64| {
            o.height = v
        });
        parsers.field("hdg", Invalidations::NONE, |o: &mut RoadObject, v: f64| o.heading = v);
        parsers.field("pitch", Invalidations::NONE, |o: &mut RoadObject, v: f64| o.pitch = v);
        parsers.field("roll", Invalidations::NONE, |o: &mut RoadObject, v: f64| o.roll = v);
        parsers.finalize();
        parsers
    })
}

fn road_object_child_parsers() -> &'static XmlChildElementParsers<RoadObject> {
    static PARSERS: OnceLock<XmlChildElementParsers<RoadObject>> = OnceLock::new();
    PARSERS.get_or_init(|| {
        let mut parsers = XmlChildElementParsers::new();
        parsers.parser("repeat", Multiplicity::ZeroOrMore, Invalidations::NONE, |_, result| {
            result.push_error(XodrParseError::warning("WARNING: <repeat> element not implemented yet."));
        });
        parsers.optional_field(
            "outline",
            Invalidations::NONE,
            RoadObjectOutline::parse_xml,
            |object: &mut RoadObject, outline| object.outline = Some(outline),
        );
        parsers.parser("validity", Multiplicity::ZeroOrMore, Invalidations::NONE, |_, result| {
            result.push_error(XodrParseError::warning(
                "WARNING: <validity> element not implemented yet.",
            ));
        });
        parsers.parser(
            "parkingSpace",
            Multiplicity::ZeroOrMore,
            Invalidations::NONE,
            |_, result| {
                result.push_error(XodrParseError::warning(
                    "WARNING: <parkingSpace> element not implemented yet.",
                ));
            },
        );
        parsers.finalize();
        parsers
    })
}
