use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::result::{Invalidations, XodrParseError, XodrParseResult};
use crate::xml::{XmlParseError, XmlParseErrorCategory};

/// Conversion from an XML attribute value into a typed field.
///
/// Add an implementation for your own type to make it usable with
/// [`XmlAttributeParsers::field`].
pub trait FromXmlAttribute: Sized {
    fn from_xml_attribute(value: &str) -> Result<Self>;
}

impl FromXmlAttribute for f64 {
    fn from_xml_attribute(value: &str) -> Result<Self> {
        value
            .trim()
            .parse()
            .map_err(|_| anyhow!("not a floating point number: '{}'", value))
    }
}

impl FromXmlAttribute for i32 {
    fn from_xml_attribute(value: &str) -> Result<Self> {
        value
            .trim()
            .parse()
            .map_err(|_| anyhow!("not an integer: '{}'", value))
    }
}

impl FromXmlAttribute for bool {
    fn from_xml_attribute(value: &str) -> Result<Self> {
        match value.trim() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(anyhow!("not a boolean: '{}'", value)),
        }
    }
}

impl FromXmlAttribute for String {
    fn from_xml_attribute(value: &str) -> Result<Self> {
        Ok(value.to_string())
    }
}

type ParseFn<V> = Box<dyn Fn(&str, &mut V) -> Result<()> + Send + Sync>;
type SetDefaultFn<V> = Box<dyn Fn(&mut V) + Send + Sync>;

struct AttributeEntry<V> {
    name: &'static str,
    required: bool,
    invalidations: Invalidations,
    parse: ParseFn<V>,
    set_default: Option<SetDefaultFn<V>>,
}

/// A table of parsers for the attributes of one element type.
///
/// Register an entry per attribute, call [`finalize`](Self::finalize), then
/// reuse the table for every element of that type (tables are built once and
/// cached in a `OnceLock` static by their element's `parse_xml`). Parsing
/// walks the element's attributes, dispatching by binary search on the sorted
/// entry list:
///
/// - unknown attributes become non-fatal `UnexpectedAttribute` warnings,
/// - conversion failures become `InvalidAttributeValue` errors carrying the
///   entry's invalidation mask,
/// - missing required attributes become `MissingAttribute` errors,
/// - missing optional attributes invoke the entry's default action.
pub struct XmlAttributeParsers<V> {
    entries: Vec<AttributeEntry<V>>,
    finalized: bool,
}

impl<V> XmlAttributeParsers<V> {
    pub fn new() -> Self {
        XmlAttributeParsers {
            entries: Vec::new(),
            finalized: false,
        }
    }

    /// Registers a required attribute parsed with a custom function.
    ///
    /// The function receives the raw attribute value; an `Err` is recorded as
    /// an `InvalidAttributeValue` with this entry's invalidation mask.
    pub fn parser<F>(&mut self, name: &'static str, invalidations: Invalidations, parse: F)
    where
        F: Fn(&str, &mut V) -> Result<()> + Send + Sync + 'static,
    {
        self.push_entry(name, true, invalidations, Box::new(parse), None);
    }

    /// Registers a required attribute stored through `assign` after typed
    /// conversion.
    pub fn field<T, F>(&mut self, name: &'static str, invalidations: Invalidations, assign: F)
    where
        T: FromXmlAttribute,
        F: Fn(&mut V, T) + Send + Sync + 'static,
    {
        self.push_entry(
            name,
            true,
            invalidations,
            Box::new(move |value, target| {
                assign(target, T::from_xml_attribute(value)?);
                Ok(())
            }),
            None,
        );
    }

    /// Registers an optional attribute.
    ///
    /// When the attribute is present it's converted and stored through
    /// `assign`; when absent the target simply keeps the value its `Default`
    /// gave it.
    pub fn optional_field<T, F>(&mut self, name: &'static str, invalidations: Invalidations, assign: F)
    where
        T: FromXmlAttribute,
        F: Fn(&mut V, T) + Send + Sync + 'static,
    {
        self.push_entry(
            name,
            false,
            invalidations,
            Box::new(move |value, target| {
                assign(target, T::from_xml_attribute(value)?);
                Ok(())
            }),
            None,
        );
    }

    /// Registers an optional attribute with an explicit fallback value, for
    /// defaults which differ from the target's `Default`.
    pub fn optional_field_with_default<T, F>(
        &mut self,
        name: &'static str,
        default: T,
        invalidations: Invalidations,
        assign: F,
    ) where
        T: FromXmlAttribute + Clone + Send + Sync + 'static,
        F: Fn(&mut V, T) + Send + Sync + 'static,
    {
        let assign = Arc::new(assign);
        let assign_default = Arc::clone(&assign);
        self.push_entry(
            name,
            false,
            invalidations,
            Box::new(move |value, target| {
                assign(target, T::from_xml_attribute(value)?);
                Ok(())
            }),
            Some(Box::new(move |target| assign_default(target, default.clone()))),
        );
    }

    fn push_entry(
        &mut self,
        name: &'static str,
        required: bool,
        invalidations: Invalidations,
        parse: ParseFn<V>,
        set_default: Option<SetDefaultFn<V>>,
    ) {
        debug_assert!(!self.finalized);
        debug_assert!(self.entries.len() < 64);
        self.entries.push(AttributeEntry {
            name,
            required,
            invalidations,
            parse,
            set_default,
        });
    }

    /// Sorts the entry list so lookups can binary search. Must be called
    /// after the last registration and before the first `parse`.
    pub fn finalize(&mut self) {
        self.entries.sort_by(|a, b| a.name.cmp(b.name));
        self.finalized = true;
    }

    /// Parses the attributes of `node` into `result`'s value, accumulating
    /// errors in `result`.
    pub fn parse(&self, node: roxmltree::Node, result: &mut XodrParseResult<V>) {
        debug_assert!(self.finalized, "forgot to call finalize()");

        let elem_name = node.tag_name().name();
        let mut visited: u64 = 0;

        for attr in node.attributes() {
            match self.entries.binary_search_by(|entry| entry.name.cmp(attr.name())) {
                Ok(idx) => {
                    let entry = &self.entries[idx];
                    visited |= 1 << idx;
                    if (entry.parse)(attr.value(), result.value_mut()).is_err() {
                        result.push_error(XodrParseError::xml(
                            XmlParseError::new(
                                XmlParseErrorCategory::InvalidAttributeValue,
                                entry.name,
                                attr.value(),
                            ),
                            entry.invalidations,
                        ));
                    }
                }
                Err(_) => {
                    result.push_error(XodrParseError::xml_warning(XmlParseError::new(
                        XmlParseErrorCategory::UnexpectedAttribute,
                        elem_name,
                        attr.name(),
                    )));
                }
            }
        }

        for (idx, entry) in self.entries.iter().enumerate() {
            if visited & (1 << idx) != 0 {
                continue;
            }
            if entry.required {
                result.push_error(XodrParseError::xml(
                    XmlParseError::new(XmlParseErrorCategory::MissingAttribute, elem_name, entry.name),
                    entry.invalidations,
                ));
            } else if let Some(set_default) = &entry.set_default {
                set_default(result.value_mut());
            }
        }
    }

    /// Parses an element where only a single attribute is of interest;
    /// other attributes on the element are ignored.
    pub fn parse_field<T, F>(
        node: roxmltree::Node,
        result: &mut XodrParseResult<V>,
        name: &'static str,
        invalidations: Invalidations,
        assign: F,
    ) where
        T: FromXmlAttribute,
        F: Fn(&mut V, T),
    {
        match node.attribute(name) {
            Some(value) => match T::from_xml_attribute(value) {
                Ok(parsed) => assign(result.value_mut(), parsed),
                Err(_) => result.push_error(XodrParseError::xml(
                    XmlParseError::new(XmlParseErrorCategory::InvalidAttributeValue, name, value),
                    invalidations,
                )),
            },
            None => result.push_error(XodrParseError::xml(
                XmlParseError::new(XmlParseErrorCategory::MissingAttribute, node.tag_name().name(), name),
                invalidations,
            )),
        }
    }
}
