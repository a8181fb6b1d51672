//! Attributes associated with cross-sections of a lane.
//!
//! Each attribute type carries an `s_offset`: the offset, in s-coordinates
//! from the beginning of the enclosing lane section, where the attribute
//! becomes active. It stays active until the next attribute of the same type.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::result::{Invalidations, XodrParseResult};
use crate::units::SpeedUnit;
use crate::xml::XmlAttributeParsers;

/// The surface material of a cross-section of a lane.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LaneMaterial {
    s_offset: f64,
    surface: String,
    friction: f64,
    roughness: f64,
}

impl LaneMaterial {
    pub(crate) fn parse_xml(node: roxmltree::Node) -> XodrParseResult<LaneMaterial> {
        static PARSERS: OnceLock<XmlAttributeParsers<LaneMaterial>> = OnceLock::new();
        let parsers = PARSERS.get_or_init(|| {
            let mut parsers = XmlAttributeParsers::new();
            parsers.field("sOffset", Invalidations::NONE, |m: &mut LaneMaterial, v: f64| {
                m.s_offset = v
            });
            parsers.field("surface", Invalidations::NONE, |m: &mut LaneMaterial, v: String| {
                m.surface = v
            });
            parsers.field("friction", Invalidations::NONE, |m: &mut LaneMaterial, v: f64| {
                m.friction = v
            });
            parsers.field("roughness", Invalidations::NONE, |m: &mut LaneMaterial, v: f64| {
                m.roughness = v
            });
            parsers.finalize();
            parsers
        });

        let mut ret = XodrParseResult::default();
        parsers.parse(node, &mut ret);
        ret
    }

    pub fn s_offset(&self) -> f64 {
        self.s_offset
    }

    pub fn surface(&self) -> &str {
        &self.surface
    }

    pub fn friction(&self) -> f64 {
        self.friction
    }

    pub fn roughness(&self) -> f64 {
        self.roughness
    }
}

/// The visibility distances of a cross-section of a lane, in meters.
///
/// Forward/back are relative to the lane's own driving direction: for left
/// lanes (right-hand traffic) that direction is opposite to the road's
/// forward direction.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LaneVisibility {
    s_offset: f64,
    forward: f64,
    back: f64,
    left: f64,
    right: f64,
}

impl LaneVisibility {
    pub(crate) fn parse_xml(node: roxmltree::Node) -> XodrParseResult<LaneVisibility> {
        static PARSERS: OnceLock<XmlAttributeParsers<LaneVisibility>> = OnceLock::new();
        let parsers = PARSERS.get_or_init(|| {
            let mut parsers = XmlAttributeParsers::new();
            parsers.field("sOffset", Invalidations::NONE, |v: &mut LaneVisibility, val: f64| {
                v.s_offset = val
            });
            parsers.field("forward", Invalidations::NONE, |v: &mut LaneVisibility, val: f64| {
                v.forward = val
            });
            parsers.field("back", Invalidations::NONE, |v: &mut LaneVisibility, val: f64| {
                v.back = val
            });
            parsers.field("left", Invalidations::NONE, |v: &mut LaneVisibility, val: f64| {
                v.left = val
            });
            parsers.field("right", Invalidations::NONE, |v: &mut LaneVisibility, val: f64| {
                v.right = val
            });
            parsers.finalize();
            parsers
        });

        let mut ret = XodrParseResult::default();
        parsers.parse(node, &mut ret);
        ret
    }

    pub fn s_offset(&self) -> f64 {
        self.s_offset
    }

    pub fn forward(&self) -> f64 {
        self.forward
    }

    pub fn back(&self) -> f64 {
        self.back
    }

    pub fn left(&self) -> f64 {
        self.left
    }

    pub fn right(&self) -> f64 {
        self.right
    }
}

/// The speed limit of a cross-section of a lane.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LaneSpeedLimit {
    s_offset: f64,
    max_speed: f64,
    unit: SpeedUnit,
}

impl LaneSpeedLimit {
    pub(crate) fn parse_xml(node: roxmltree::Node) -> XodrParseResult<LaneSpeedLimit> {
        static PARSERS: OnceLock<XmlAttributeParsers<LaneSpeedLimit>> = OnceLock::new();
        let parsers = PARSERS.get_or_init(|| {
            let mut parsers = XmlAttributeParsers::new();
            parsers.field("sOffset", Invalidations::NONE, |s: &mut LaneSpeedLimit, v: f64| {
                s.s_offset = v
            });
            parsers.field("max", Invalidations::NONE, |s: &mut LaneSpeedLimit, v: f64| {
                s.max_speed = v
            });
            parsers.optional_field("unit", Invalidations::NONE, |s: &mut LaneSpeedLimit, v: SpeedUnit| {
                s.unit = v
            });
            parsers.finalize();
            parsers
        });

        let mut ret = XodrParseResult::default();
        parsers.parse(node, &mut ret);
        ret
    }

    pub fn s_offset(&self) -> f64 {
        self.s_offset
    }

    /// The speed limit, expressed in `unit()`. When no unit is specified the
    /// value is in meters per second.
    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    pub fn unit(&self) -> SpeedUnit {
        self.unit
    }
}

/// The access restriction of a cross-section of a lane.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LaneAccess {
    s_offset: f64,
    restriction: String,
}

impl LaneAccess {
    pub(crate) fn parse_xml(node: roxmltree::Node) -> XodrParseResult<LaneAccess> {
        static PARSERS: OnceLock<XmlAttributeParsers<LaneAccess>> = OnceLock::new();
        let parsers = PARSERS.get_or_init(|| {
            let mut parsers = XmlAttributeParsers::new();
            parsers.field("sOffset", Invalidations::NONE, |a: &mut LaneAccess, v: f64| {
                a.s_offset = v
            });
            parsers.field("restriction", Invalidations::NONE, |a: &mut LaneAccess, v: String| {
                a.restriction = v
            });
            parsers.finalize();
            parsers
        });

        let mut ret = XodrParseResult::default();
        parsers.parse(node, &mut ret);
        ret
    }

    pub fn s_offset(&self) -> f64 {
        self.s_offset
    }

    pub fn restriction(&self) -> &str {
        &self.restriction
    }
}

/// The height of a cross-section of a lane, as inner/outer offsets from the
/// road level.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LaneHeight {
    s_offset: f64,
    inner: f64,
    outer: f64,
}

impl LaneHeight {
    pub(crate) fn parse_xml(node: roxmltree::Node) -> XodrParseResult<LaneHeight> {
        static PARSERS: OnceLock<XmlAttributeParsers<LaneHeight>> = OnceLock::new();
        let parsers = PARSERS.get_or_init(|| {
            let mut parsers = XmlAttributeParsers::new();
            parsers.field("sOffset", Invalidations::NONE, |h: &mut LaneHeight, v: f64| {
                h.s_offset = v
            });
            parsers.field("inner", Invalidations::NONE, |h: &mut LaneHeight, v: f64| h.inner = v);
            parsers.field("outer", Invalidations::NONE, |h: &mut LaneHeight, v: f64| h.outer = v);
            parsers.finalize();
            parsers
        });

        let mut ret = XodrParseResult::default();
        parsers.parse(node, &mut ret);
        ret
    }

    pub fn s_offset(&self) -> f64 {
        self.s_offset
    }

    pub fn inner(&self) -> f64 {
        self.inner
    }

    pub fn outer(&self) -> f64 {
        self.outer
    }
}

/// A free-form rule for a cross-section of a lane.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LaneRule {
    s_offset: f64,
    value: String,
}

impl LaneRule {
    pub(crate) fn parse_xml(node: roxmltree::Node) -> XodrParseResult<LaneRule> {
        static PARSERS: OnceLock<XmlAttributeParsers<LaneRule>> = OnceLock::new();
        let parsers = PARSERS.get_or_init(|| {
            let mut parsers = XmlAttributeParsers::new();
            parsers.field("sOffset", Invalidations::NONE, |r: &mut LaneRule, v: f64| {
                r.s_offset = v
            });
            parsers.field("value", Invalidations::NONE, |r: &mut LaneRule, v: String| r.value = v);
            parsers.finalize();
            parsers
        });

        let mut ret = XodrParseResult::default();
        parsers.parse(node, &mut ret);
        ret
    }

    pub fn s_offset(&self) -> f64 {
        self.s_offset
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn parse<T>(text: &str, parse_xml: fn(roxmltree::Node) -> XodrParseResult<T>) -> XodrParseResult<T> {
        let doc = roxmltree::Document::parse(text).unwrap();
        parse_xml(doc.root_element())
    }

    #[test]
    fn parses_material() {
        let result = parse(
            r#"<material sOffset="1.5" surface="asphalt" friction="0.9" roughness="0.1"/>"#,
            LaneMaterial::parse_xml,
        );
        assert!(result.errors().is_empty());
        assert_relative_eq!(result.value().s_offset(), 1.5);
        assert_eq!(result.value().surface(), "asphalt");
        assert_relative_eq!(result.value().friction(), 0.9);
    }

    #[test]
    fn parses_speed_limit_with_and_without_unit() {
        let result = parse(r#"<speed sOffset="0" max="27.8"/>"#, LaneSpeedLimit::parse_xml);
        assert!(result.errors().is_empty());
        assert_eq!(result.value().unit(), SpeedUnit::NotSpecified);

        let result = parse(r#"<speed sOffset="0" max="60" unit="mph"/>"#, LaneSpeedLimit::parse_xml);
        assert!(result.errors().is_empty());
        assert_eq!(result.value().unit(), SpeedUnit::MilesPerHour);
        assert_relative_eq!(result.value().max_speed(), 60.0);
    }

    #[test]
    fn missing_required_attribute_is_an_error() {
        let result = parse(r#"<height sOffset="0" inner="0.1"/>"#, LaneHeight::parse_xml);
        assert_eq!(result.errors().len(), 1);
    }
}
