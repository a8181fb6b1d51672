//! The declarative XML parsing framework.
//!
//! Every OpenDRIVE element type in this crate describes its attributes and
//! child elements once, as a pair of parser tables ([`XmlAttributeParsers`]
//! and [`XmlChildElementParsers`]), and the framework takes care of the
//! recurring mechanics: typed value conversion, required/optional handling,
//! multiplicities, defaults, and turning every violation into an accumulated
//! error instead of an abort. Unknown attributes and child elements are
//! deliberately non-fatal so that newer or vendor-extended files still parse.

mod attribute_parsers;
mod child_element_parsers;
mod parse_result;

pub use self::attribute_parsers::{FromXmlAttribute, XmlAttributeParsers};
pub use self::child_element_parsers::{Multiplicity, XmlChildElementParsers};
pub use self::parse_result::{XmlParseError, XmlParseErrorCategory};
