//! Accumulated parse errors and the value-plus-errors result type.
//!
//! Parsers in this crate never abort on semantic problems. Each parser returns
//! an [`XodrParseResult`], which is the (possibly partial) parsed value
//! together with the errors found while producing it. Child parsers' errors
//! are folded into their parent's, so the result of parsing a whole map
//! carries every problem found anywhere in the document.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::xml::XmlParseError;

/// A bitmask of map capabilities which a parse error breaks.
///
/// Distinguishing the capabilities lets a consumer keep using the parts of a
/// partially-broken map which are still sound: a map with a bad lane width can
/// still answer connectivity queries, and a map with a dangling road reference
/// can still be tessellated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invalidations(u8);

impl Invalidations {
    /// Nothing is invalidated; the error is a warning.
    pub const NONE: Invalidations = Invalidations(0);

    /// The tessellation contract is broken (bad lengths, missing widths,
    /// invalid curvatures). Geometric evaluation of the map is unsafe.
    pub const GEOMETRY: Invalidations = Invalidations(1);

    /// The link graph is broken (unresolvable references, duplicate ids,
    /// invalid neighbor counts). Graph traversal of the map is unsafe.
    pub const CONNECTIVITY: Invalidations = Invalidations(1 << 1);

    /// Fatal structural problem; the map is unusable.
    pub const ALL: Invalidations = Invalidations(Self::GEOMETRY.0 | Self::CONNECTIVITY.0);

    pub fn invalidates_geometry(self) -> bool {
        self.0 & Self::GEOMETRY.0 != 0
    }

    pub fn invalidates_connectivity(self) -> bool {
        self.0 & Self::CONNECTIVITY.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// The payload of an [`XodrParseError`].
///
/// Structural XML problems keep their full [`XmlParseError`] so tooling can
/// group them by category; everything else is a message string.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum XodrParseErrorData {
    Xml(XmlParseError),
    Message(String),
}

/// An error found while parsing an OpenDRIVE document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct XodrParseError {
    data: XodrParseErrorData,
    invalidations: Invalidations,
}

impl XodrParseError {
    /// An error wrapping a structural XML problem.
    pub fn xml(error: XmlParseError, invalidations: Invalidations) -> Self {
        XodrParseError {
            data: XodrParseErrorData::Xml(error),
            invalidations,
        }
    }

    /// A structural XML problem which doesn't invalidate anything.
    pub fn xml_warning(error: XmlParseError) -> Self {
        Self::xml(error, Invalidations::NONE)
    }

    /// A semantic error described by a message string.
    pub fn message(message: impl Into<String>, invalidations: Invalidations) -> Self {
        XodrParseError {
            data: XodrParseErrorData::Message(message.into()),
            invalidations,
        }
    }

    /// A message-only warning which doesn't invalidate anything.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::message(message, Invalidations::NONE)
    }

    pub fn data(&self) -> &XodrParseErrorData {
        &self.data
    }

    pub fn invalidations(&self) -> Invalidations {
        self.invalidations
    }

    pub fn invalidates_road_geometry(&self) -> bool {
        self.invalidations.invalidates_geometry()
    }

    pub fn invalidates_connectivity(&self) -> bool {
        self.invalidations.invalidates_connectivity()
    }

    /// Whether this error should stop a strict consumer from using the map.
    pub fn is_fatal(&self) -> bool {
        if !self.invalidations.is_empty() {
            return true;
        }
        match &self.data {
            XodrParseErrorData::Xml(err) => err.is_fatal(),
            XodrParseErrorData::Message(_) => false,
        }
    }

    /// A human readable description of this error.
    pub fn description(&self) -> String {
        match &self.data {
            XodrParseErrorData::Xml(err) => err.description(),
            XodrParseErrorData::Message(msg) => msg.clone(),
        }
    }
}

/// The result of parsing some part of an OpenDRIVE document: the (possibly
/// partial) value plus the errors found while producing it.
#[derive(Debug, Default)]
pub struct XodrParseResult<T> {
    value: T,
    errors: Vec<XodrParseError>,
}

impl<T> XodrParseResult<T> {
    pub fn new(value: T) -> Self {
        XodrParseResult {
            value,
            errors: Vec::new(),
        }
    }

    pub fn from_parts(value: T, errors: Vec<XodrParseError>) -> Self {
        XodrParseResult { value, errors }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }

    pub fn errors(&self) -> &[XodrParseError] {
        &self.errors
    }

    pub fn push_error(&mut self, error: XodrParseError) {
        self.errors.push(error);
    }

    /// Folds a child parser's errors into this result and hands back the
    /// child's value.
    pub fn absorb<U>(&mut self, child: XodrParseResult<U>) -> U {
        self.errors.extend(child.errors);
        child.value
    }

    pub fn into_parts(self) -> (T, Vec<XodrParseError>) {
        (self.value, self.errors)
    }

    /// True if no error broke the tessellation contract, so the geometry of
    /// the parsed value is good enough to tessellate.
    pub fn has_valid_geometry(&self) -> bool {
        !self.errors.iter().any(XodrParseError::invalidates_road_geometry)
    }

    /// True if all cross references resolved and the link graph is safe to
    /// traverse.
    pub fn has_valid_connectivity(&self) -> bool {
        !self.errors.iter().any(XodrParseError::invalidates_connectivity)
    }

    pub fn has_fatal_errors(&self) -> bool {
        self.errors.iter().any(XodrParseError::is_fatal)
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(XodrParseError::description).collect()
    }

    /// Moves the value out of this result, insisting that its geometry and
    /// connectivity are intact. The first invalidating error is returned
    /// otherwise.
    ///
    /// Use `into_parts` instead to get the value without the assertion.
    pub fn extract_value(self) -> Result<T> {
        for error in &self.errors {
            if error.invalidates_road_geometry() || error.invalidates_connectivity() {
                bail!("{}", error.description());
            }
        }
        Ok(self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::{XmlParseError, XmlParseErrorCategory};

    #[test]
    fn invalidation_masks() {
        assert!(Invalidations::ALL.invalidates_geometry());
        assert!(Invalidations::ALL.invalidates_connectivity());
        assert!(Invalidations::GEOMETRY.invalidates_geometry());
        assert!(!Invalidations::GEOMETRY.invalidates_connectivity());
        assert!(Invalidations::NONE.is_empty());
    }

    #[test]
    fn extract_value_rejects_invalidating_errors() {
        let mut result = XodrParseResult::new(42);
        result.push_error(XodrParseError::warning("just a warning"));
        assert_eq!(result.extract_value().unwrap(), 42);

        let mut result = XodrParseResult::new(42);
        result.push_error(XodrParseError::message("bad curvature", Invalidations::GEOMETRY));
        assert!(!result.has_valid_geometry());
        assert!(result.has_valid_connectivity());
        assert!(result.extract_value().is_err());
    }

    #[test]
    fn unexpected_attribute_is_not_fatal() {
        let warning = XodrParseError::xml_warning(XmlParseError::new(
            XmlParseErrorCategory::UnexpectedAttribute,
            "road",
            "bogus",
        ));
        assert!(!warning.is_fatal());

        let missing = XodrParseError::xml_warning(XmlParseError::new(
            XmlParseErrorCategory::MissingAttribute,
            "road",
            "id",
        ));
        assert!(missing.is_fatal());
    }
}
