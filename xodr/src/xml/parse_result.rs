use std::fmt;

use serde::{Deserialize, Serialize};

/// The kinds of structural problems the parser tables can detect.
///
/// These are ignorant of OpenDRIVE semantics; they only concern the set of
/// attributes and child elements an element should have.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum XmlParseErrorCategory {
    /// An attribute was registered as required but is missing.
    MissingAttribute,
    /// An attribute wasn't registered at all.
    UnexpectedAttribute,
    /// A child element was registered as required but is missing.
    MissingChildElement,
    /// A child element wasn't registered at all.
    UnexpectedChildElement,
    /// More than one instance of a single-multiplicity child element.
    DuplicateChildElement,
    /// An attribute value couldn't be parsed into the expected type.
    InvalidAttributeValue,
}

/// A structural error found while parsing an XML element.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct XmlParseError {
    pub category: XmlParseErrorCategory,
    /// The attribute name or (parent) element name.
    pub name: String,
    /// The attribute value or (child) element name.
    pub value: String,
}

impl XmlParseError {
    pub fn new(category: XmlParseErrorCategory, name: &str, value: &str) -> Self {
        XmlParseError {
            category,
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    /// A human readable description of this error.
    pub fn description(&self) -> String {
        match self.category {
            XmlParseErrorCategory::MissingAttribute => {
                format!("XML element <{}> should have attribute named {}", self.name, self.value)
            }
            XmlParseErrorCategory::UnexpectedAttribute => {
                format!("XML element <{}> has unexpected attribute named {}", self.name, self.value)
            }
            XmlParseErrorCategory::InvalidAttributeValue => {
                format!("Invalid value {} for attribute {}", self.value, self.name)
            }
            XmlParseErrorCategory::MissingChildElement => format!(
                "XML element <{}> should have at least one child element <{}>",
                self.name, self.value
            ),
            XmlParseErrorCategory::UnexpectedChildElement => format!(
                "XML element <{}> has unexpected child element <{}>",
                self.name, self.value
            ),
            XmlParseErrorCategory::DuplicateChildElement => format!(
                "XML element <{}> should not have more than one child element <{}>",
                self.name, self.value
            ),
        }
    }

    /// Unexpected attributes and child elements are tolerated; everything
    /// else makes the element unreliable.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self.category,
            XmlParseErrorCategory::UnexpectedAttribute | XmlParseErrorCategory::UnexpectedChildElement
        )
    }
}

impl fmt::Display for XmlParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}
