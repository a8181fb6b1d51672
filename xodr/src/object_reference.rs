use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::xml::FromXmlAttribute;

/// A reference from one object in an OpenDRIVE file to another, for example
/// a road's reference to its successor.
///
/// In the file, references are textual ids. After the whole map is parsed, a
/// resolve pass turns every reference into an index into the map's vector for
/// the target entity type, so lookups are direct. A reference whose id equals
/// a field-specific sentinel (for example junction id `-1`) resolves to a
/// distinguished null state instead.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XodrObjectReference {
    id: String,
    index: ResolvedIndex,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
enum ResolvedIndex {
    #[default]
    Unresolved,
    Null,
    Index(usize),
}

impl XodrObjectReference {
    /// A reference which is already resolved to the given index. Mostly
    /// useful for building maps programmatically in tests.
    pub fn resolved(id: impl Into<String>, index: usize) -> Self {
        XodrObjectReference {
            id: id.into(),
            index: ResolvedIndex::Index(index),
        }
    }

    /// The textual id of the target object.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether this reference points at an actual object, as opposed to
    /// being null. Must only be called after resolution.
    pub fn has_value(&self) -> bool {
        debug_assert!(self.index != ResolvedIndex::Unresolved);
        matches!(self.index, ResolvedIndex::Index(_))
    }

    /// The index of the target object. Must only be called after resolution,
    /// on a non-null reference.
    pub fn index(&self) -> usize {
        match self.index {
            ResolvedIndex::Index(index) => index,
            _ => panic!("reference '{}' was not resolved to an index", self.id),
        }
    }

    /// Resolves this reference against the given id-to-index mapping. An
    /// unknown id is reported as an error message.
    pub(crate) fn resolve(&mut self, id_to_index: &BTreeMap<String, usize>, obj_type_name: &str) -> Result<(), String> {
        debug_assert!(self.index == ResolvedIndex::Unresolved);

        match id_to_index.get(&self.id) {
            Some(index) => {
                self.index = ResolvedIndex::Index(*index);
                Ok(())
            }
            None => Err(format!("There's no {} with identifier '{}'.", obj_type_name, self.id)),
        }
    }

    /// Like [`resolve`](Self::resolve), but an id equal to `null_value`
    /// resolves to the null state instead of failing.
    pub(crate) fn resolve_nullable(
        &mut self,
        id_to_index: &BTreeMap<String, usize>,
        null_value: &str,
        obj_type_name: &str,
    ) -> Result<(), String> {
        if self.id == null_value {
            debug_assert!(self.index == ResolvedIndex::Unresolved);
            self.index = ResolvedIndex::Null;
            Ok(())
        } else {
            self.resolve(id_to_index, obj_type_name)
        }
    }
}

impl FromXmlAttribute for XodrObjectReference {
    fn from_xml_attribute(value: &str) -> Result<Self> {
        Ok(XodrObjectReference {
            id: value.to_string(),
            index: ResolvedIndex::Unresolved,
        })
    }
}

impl PartialEq<str> for XodrObjectReference {
    fn eq(&self, other: &str) -> bool {
        self.id == other
    }
}

/// The id-to-index mappings built by the map-level resolve pass.
#[derive(Clone, Debug, Default)]
pub struct IdToIndexMaps {
    pub road_id_to_index: BTreeMap<String, usize>,
    pub junction_id_to_index: BTreeMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id_map(ids: &[&str]) -> BTreeMap<String, usize> {
        ids.iter().enumerate().map(|(i, id)| (id.to_string(), i)).collect()
    }

    #[test]
    fn resolves_known_ids() {
        let mut reference = XodrObjectReference::from_xml_attribute("b").unwrap();
        reference.resolve(&id_map(&["a", "b"]), "road").unwrap();
        assert!(reference.has_value());
        assert_eq!(reference.index(), 1);
    }

    #[test]
    fn unknown_id_is_an_error() {
        let mut reference = XodrObjectReference::from_xml_attribute("zz").unwrap();
        let err = reference.resolve(&id_map(&["a"]), "junction").unwrap_err();
        assert!(err.contains("junction"));
        assert!(err.contains("zz"));
    }

    #[test]
    fn sentinel_resolves_to_null() {
        let mut reference = XodrObjectReference::from_xml_attribute("-1").unwrap();
        reference.resolve_nullable(&id_map(&["a"]), "-1", "junction").unwrap();
        assert!(!reference.has_value());
    }
}
