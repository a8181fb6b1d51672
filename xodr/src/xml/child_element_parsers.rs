use crate::result::{Invalidations, XodrParseError, XodrParseResult};
use crate::xml::{XmlParseError, XmlParseErrorCategory};

/// How often a child element of a given name may occur.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Multiplicity {
    ZeroOrOne,
    One,
    ZeroOrMore,
    OneOrMore,
}

impl Multiplicity {
    fn is_single(self) -> bool {
        matches!(self, Multiplicity::ZeroOrOne | Multiplicity::One)
    }

    fn is_required(self) -> bool {
        matches!(self, Multiplicity::One | Multiplicity::OneOrMore)
    }
}

type ChildParseFn<V> = Box<dyn Fn(roxmltree::Node, &mut XodrParseResult<V>) + Send + Sync>;

struct ChildEntry<V> {
    name: &'static str,
    multiplicity: Multiplicity,
    invalidations: Invalidations,
    parse: ChildParseFn<V>,
}

/// A table of parsers for the child elements of one element type.
///
/// The counterpart of [`XmlAttributeParsers`](super::XmlAttributeParsers) for
/// child elements, with multiplicities instead of required/optional flags:
///
/// - unknown child elements become non-fatal `UnexpectedChildElement`
///   warnings and are skipped whole,
/// - repeated single-multiplicity children become `DuplicateChildElement`
///   errors (the extra occurrence is not parsed),
/// - missing required children become `MissingChildElement` errors carrying
///   the entry's invalidation mask.
///
/// Children are visited in document order, so entry parsers may rely on
/// seeing elements in the order they appear in the file.
pub struct XmlChildElementParsers<V> {
    entries: Vec<ChildEntry<V>>,
    finalized: bool,
}

impl<V> XmlChildElementParsers<V> {
    pub fn new() -> Self {
        XmlChildElementParsers {
            entries: Vec::new(),
            finalized: false,
        }
    }

    /// Registers a parser for child elements with the given name.
    ///
    /// The function is invoked once per matching child, with that child's
    /// node; it's responsible for storing its result and for recording any
    /// errors it finds.
    pub fn parser<F>(&mut self, name: &'static str, multiplicity: Multiplicity, invalidations: Invalidations, parse: F)
    where
        F: Fn(roxmltree::Node, &mut XodrParseResult<V>) + Send + Sync + 'static,
    {
        debug_assert!(!self.finalized);
        debug_assert!(self.entries.len() < 64);
        self.entries.push(ChildEntry {
            name,
            multiplicity,
            invalidations,
            parse: Box::new(parse),
        });
    }

    /// Registers a required (multiplicity one) child element parsed with
    /// `parse_elem` and stored through `assign`. Errors from the child parser
    /// are folded into the parent's result.
    pub fn field<T, F>(
        &mut self,
        name: &'static str,
        invalidations: Invalidations,
        parse_elem: fn(roxmltree::Node) -> XodrParseResult<T>,
        assign: F,
    ) where
        T: 'static,
        F: Fn(&mut V, T) + Send + Sync + 'static,
    {
        self.parser(name, Multiplicity::One, invalidations, move |node, result| {
            let value = result.absorb(parse_elem(node));
            assign(result.value_mut(), value);
        });
    }

    /// Registers an optional (multiplicity zero-or-one) child element. When
    /// the child is absent the target keeps the value its `Default` gave it.
    pub fn optional_field<T, F>(
        &mut self,
        name: &'static str,
        invalidations: Invalidations,
        parse_elem: fn(roxmltree::Node) -> XodrParseResult<T>,
        assign: F,
    ) where
        T: 'static,
        F: Fn(&mut V, T) + Send + Sync + 'static,
    {
        self.parser(name, Multiplicity::ZeroOrOne, invalidations, move |node, result| {
            let value = result.absorb(parse_elem(node));
            assign(result.value_mut(), value);
        });
    }

    /// Registers a repeatable child element whose parsed values are appended
    /// through `push`.
    pub fn vector<T, F>(
        &mut self,
        name: &'static str,
        multiplicity: Multiplicity,
        invalidations: Invalidations,
        parse_elem: fn(roxmltree::Node) -> XodrParseResult<T>,
        push: F,
    ) where
        T: 'static,
        F: Fn(&mut V, T) + Send + Sync + 'static,
    {
        self.parser(name, multiplicity, invalidations, move |node, result| {
            let value = result.absorb(parse_elem(node));
            push(result.value_mut(), value);
        });
    }

    /// Sorts the entry list so lookups can binary search. Must be called
    /// after the last registration and before the first `parse`.
    pub fn finalize(&mut self) {
        self.entries.sort_by(|a, b| a.name.cmp(b.name));
        self.finalized = true;
    }

    /// Parses the child elements of `node` into `result`'s value,
    /// accumulating errors in `result`.
    pub fn parse(&self, node: roxmltree::Node, result: &mut XodrParseResult<V>) {
        debug_assert!(self.finalized, "forgot to call finalize()");

        let elem_name = node.tag_name().name();
        let mut counts = vec![0u32; self.entries.len()];

        for child in node.children() {
            if !child.is_element() {
                continue;
            }
            let child_name = child.tag_name().name();
            match self.entries.binary_search_by(|entry| entry.name.cmp(child_name)) {
                Ok(idx) => {
                    let entry = &self.entries[idx];
                    if entry.multiplicity.is_single() && counts[idx] > 0 {
                        result.push_error(XodrParseError::xml(
                            XmlParseError::new(XmlParseErrorCategory::DuplicateChildElement, elem_name, entry.name),
                            entry.invalidations,
                        ));
                    } else {
                        (entry.parse)(child, result);
                    }
                    counts[idx] += 1;
                }
                Err(_) => {
                    result.push_error(XodrParseError::xml_warning(XmlParseError::new(
                        XmlParseErrorCategory::UnexpectedChildElement,
                        elem_name,
                        child_name,
                    )));
                }
            }
        }

        for (idx, entry) in self.entries.iter().enumerate() {
            if counts[idx] == 0 && entry.multiplicity.is_required() {
                result.push_error(XodrParseError::xml(
                    XmlParseError::new(XmlParseErrorCategory::MissingChildElement, elem_name, entry.name),
                    entry.invalidations,
                ));
            }
        }
    }

    /// Parses an element whose children of a single name are the only ones of
    /// interest, with multiplicity one-or-more.
    pub fn parse_one_or_more<F>(
        node: roxmltree::Node,
        result: &mut XodrParseResult<V>,
        name: &'static str,
        invalidations: Invalidations,
        parse: F,
    ) where
        F: Fn(roxmltree::Node, &mut XodrParseResult<V>) + Send + Sync + 'static,
    {
        let mut parsers = XmlChildElementParsers::new();
        parsers.parser(name, Multiplicity::OneOrMore, invalidations, parse);
        parsers.finalize();
        parsers.parse(node, result);
    }
}
