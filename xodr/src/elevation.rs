use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::geometry::Poly3;
use crate::result::{Invalidations, XodrParseResult};
use crate::xml::{Multiplicity, XmlAttributeParsers, XmlChildElementParsers};

/// The elevation profile of a road: the road's height along its reference
/// line, as a sequence of cubic segments.
///
/// The profile is parsed and stored but never folded into tessellation; the
/// geometry engine is strictly 2D.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ElevationProfile {
    elevations: Vec<Elevation>,
}

impl ElevationProfile {
    pub(crate) fn parse_xml(node: roxmltree::Node) -> XodrParseResult<ElevationProfile> {
        static PARSERS: OnceLock<XmlChildElementParsers<ElevationProfile>> = OnceLock::new();
        let parsers = PARSERS.get_or_init(|| {
            let mut parsers = XmlChildElementParsers::new();
            parsers.vector(
                "elevation",
                Multiplicity::OneOrMore,
                Invalidations::NONE,
                Elevation::parse_xml,
                |profile: &mut ElevationProfile, elevation| profile.elevations.push(elevation),
            );
            parsers.finalize();
            parsers
        });

        let mut ret = XodrParseResult::default();
        parsers.parse(node, &mut ret);
        ret
    }

    /// The elevation segments, in increasing s order.
    pub fn elevations(&self) -> &[Elevation] {
        &self.elevations
    }
}

/// One segment of an elevation profile.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Elevation {
    s_coord: f64,
    poly3: Poly3,
}

impl Elevation {
    pub fn new(s_coord: f64, poly3: Poly3) -> Self {
        Elevation { s_coord, poly3 }
    }

    pub(crate) fn parse_xml(node: roxmltree::Node) -> XodrParseResult<Elevation> {
        static PARSERS: OnceLock<XmlAttributeParsers<Elevation>> = OnceLock::new();
        let parsers = PARSERS.get_or_init(|| {
            let mut parsers = XmlAttributeParsers::new();
            parsers.field("s", Invalidations::NONE, |e: &mut Elevation, v: f64| e.s_coord = v);
            parsers.field("a", Invalidations::NONE, |e: &mut Elevation, v: f64| e.poly3.a = v);
            parsers.field("b", Invalidations::NONE, |e: &mut Elevation, v: f64| e.poly3.b = v);
            parsers.field("c", Invalidations::NONE, |e: &mut Elevation, v: f64| e.poly3.c = v);
            parsers.field("d", Invalidations::NONE, |e: &mut Elevation, v: f64| e.poly3.d = v);
            parsers.finalize();
            parsers
        });

        let mut ret = XodrParseResult::default();
        parsers.parse(node, &mut ret);
        ret
    }

    /// The s-coordinate where this segment begins. It ends at the next
    /// segment's s-coordinate, or at the end of the reference line for the
    /// last segment.
    pub fn s_coord(&self) -> f64 {
        self.s_coord
    }

    /// The elevation polynomial. Its input is the s-coordinate relative to
    /// `s_coord()`.
    pub fn poly3(&self) -> &Poly3 {
        &self.poly3
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn parses_a_profile() {
        let doc = roxmltree::Document::parse(
            r#"<elevationProfile>
                 <elevation s="0" a="100" b="0.01" c="0" d="0"/>
                 <elevation s="50" a="100.5" b="0" c="-0.001" d="0"/>
               </elevationProfile>"#,
        )
        .unwrap();
        let result = ElevationProfile::parse_xml(doc.root_element());
        assert!(result.errors().is_empty());
        let profile = result.value();
        assert_eq!(profile.elevations().len(), 2);
        assert_relative_eq!(profile.elevations()[0].poly3().eval(10.0), 100.1, epsilon = 1e-12);
        assert_relative_eq!(profile.elevations()[1].s_coord(), 50.0);
    }

    #[test]
    fn empty_profile_is_an_error() {
        let doc = roxmltree::Document::parse("<elevationProfile/>").unwrap();
        let result = ElevationProfile::parse_xml(doc.root_element());
        assert_eq!(result.errors().len(), 1);
    }
}
