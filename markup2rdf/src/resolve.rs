use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::ops::BitOr;

use curie::{Curie, PrefixMapping};
use oxiri::Iri;
use oxrdf::{NamedNode, NamedOrBlankNode};

use crate::context::BnodeFactory;
use crate::host::RdfaVersion;
use crate::processor::MessageClass;

/// The syntactic forms an attribute value may take, as a bitset so that the
/// per-version attribute datatypes are plain data rather than control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Restrictions(u8);

impl Restrictions {
    pub const SAFE_CURIE: Restrictions = Restrictions(1);
    pub const CURIE: Restrictions = Restrictions(1 << 1);
    pub const TERM: Restrictions = Restrictions(1 << 2);
    pub const URI: Restrictions = Restrictions(1 << 3);
    pub const ABS_URI: Restrictions = Restrictions(1 << 4);
    pub const BNODE: Restrictions = Restrictions(1 << 5);

    pub fn contains(self, other: Restrictions) -> bool {
        self.0 & other.0 == other.0
    }

    /// The datatype of @about and @resource.
    pub fn safe_curie_or_curie_or_uri(version: RdfaVersion) -> Restrictions {
        match version {
            RdfaVersion::V1_0 => Self::TERM | Self::SAFE_CURIE | Self::URI | Self::BNODE,
            RdfaVersion::V1_1 => {
                Self::SAFE_CURIE | Self::CURIE | Self::TERM | Self::URI | Self::BNODE
            }
        }
    }

    /// The datatype of @rel, @rev, @typeof, and @datatype.
    pub fn term_or_curie_or_abs_uri(version: RdfaVersion) -> Restrictions {
        match version {
            RdfaVersion::V1_0 => Self::TERM | Self::CURIE,
            RdfaVersion::V1_1 => Self::TERM | Self::CURIE | Self::ABS_URI,
        }
    }

    /// The datatype of @property.
    pub fn property(version: RdfaVersion) -> Restrictions {
        match version {
            RdfaVersion::V1_0 => Self::CURIE,
            RdfaVersion::V1_1 => Self::TERM | Self::CURIE | Self::ABS_URI,
        }
    }
}

impl BitOr for Restrictions {
    type Output = Restrictions;

    fn bitor(self, rhs: Restrictions) -> Restrictions {
        Restrictions(self.0 | rhs.0)
    }
}

enum CurieFailure {
    NotCurie,
    Empty,
    UnknownPrefix(String),
    InvalidIri(String),
}

/// Everything reference resolution reads: the in-scope mappings and base from
/// the evaluation context, the per-parse blank-node factory, and the
/// diagnostic sinks. Resolution itself is a pure function of the token and
/// its [`Restrictions`].
pub(crate) struct Resolver<'a> {
    pub version: RdfaVersion,
    pub base: Option<&'a Iri<String>>,
    pub mappings: &'a PrefixMapping,
    pub terms: &'a BTreeMap<String, NamedNode>,
    pub vocabulary: Option<&'a NamedNode>,
    pub bnodes: &'a RefCell<BnodeFactory>,
    pub interner: Option<&'a RefCell<HashMap<String, NamedNode>>>,
    pub report: &'a dyn Fn(MessageClass, String),
    pub debug: &'a dyn Fn(String),
}

impl Resolver<'_> {
    /// Resolves one attribute token to a resource, first applicable rule
    /// winning. Failures are reported through the diagnostic sinks and yield
    /// `None`; the resolver never aborts the parse.
    pub fn resolve(&self, token: &str, restrictions: Restrictions) -> Option<NamedOrBlankNode> {
        let token = token.trim();

        // A safe CURIE is definitely a CURIE. When its expansion fails the
        // token is ignored, never reinterpreted as an IRI.
        if restrictions.contains(Restrictions::SAFE_CURIE)
            && token.len() >= 2
            && token.starts_with('[')
            && token.ends_with(']')
        {
            return match self.curie(&token[1..token.len() - 1], restrictions) {
                Ok(node) => Some(node),
                Err(CurieFailure::Empty) => None,
                Err(CurieFailure::InvalidIri(expanded)) => {
                    (self.report)(
                        MessageClass::UnresolvedCurie,
                        format!("safe CURIE {token} expanded to an invalid IRI <{expanded}>"),
                    );
                    None
                }
                Err(_) => {
                    (self.report)(
                        MessageClass::UnresolvedCurie,
                        format!("safe CURIE {token} has no prefix mapping"),
                    );
                    None
                }
            };
        }

        if restrictions.contains(Restrictions::TERM) && is_term(token) {
            return self.term(token).map(NamedOrBlankNode::from);
        }

        if restrictions.contains(Restrictions::CURIE) {
            match self.curie(token, restrictions) {
                Ok(node) => return Some(node),
                Err(CurieFailure::InvalidIri(expanded)) => {
                    (self.report)(
                        MessageClass::UnresolvedCurie,
                        format!("CURIE '{token}' expanded to an invalid IRI <{expanded}>"),
                    );
                    return None;
                }
                Err(CurieFailure::UnknownPrefix(prefix)) => {
                    (self.debug)(format!("no mapping for prefix '{prefix}' in '{token}'"));
                    if self.version == RdfaVersion::V1_0 {
                        // every prefix starting with "xml" is reserved in 1.0
                        if token.len() >= 3 && token[..3].eq_ignore_ascii_case("xml") {
                            return None;
                        }
                        // 1.0 attribute datatypes admit only CURIEs, but
                        // deployed content routinely carries full IRIs there
                        if !restrictions.contains(Restrictions::URI)
                            && !restrictions.contains(Restrictions::ABS_URI)
                        {
                            if let Ok(iri) = Iri::parse(token.to_string()) {
                                return Some(self.named(iri.into_inner()).into());
                            }
                        }
                    }
                }
                Err(CurieFailure::NotCurie) | Err(CurieFailure::Empty) => {}
            }
        } else if restrictions.contains(Restrictions::BNODE) {
            // blank nodes stay available where general CURIEs are not (the
            // 1.0 resource attributes)
            if let Some(label) = token.strip_prefix("_:") {
                return Some(self.bnodes.borrow_mut().labelled(label).into());
            }
        }

        if restrictions.contains(Restrictions::ABS_URI) {
            return match Iri::parse(token.to_string()) {
                Ok(iri) => Some(self.named(iri.into_inner()).into()),
                Err(e) => {
                    (self.report)(
                        MessageClass::UnresolvedCurie,
                        format!("'{token}' is not an absolute IRI ({e})"),
                    );
                    None
                }
            };
        }

        if restrictions.contains(Restrictions::URI) {
            return match self.resolve_iri(token) {
                Ok(node) => Some(node.into()),
                Err(message) => {
                    (self.report)(MessageClass::UnresolvedCurie, message);
                    None
                }
            };
        }

        None
    }

    /// Resolves a whitespace-separated attribute value token by token, in
    /// document order; unresolvable tokens are dropped, duplicates kept.
    pub fn resolve_many(&self, value: &str, restrictions: Restrictions) -> Vec<NamedOrBlankNode> {
        value
            .split_ascii_whitespace()
            .filter_map(|token| self.resolve(token, restrictions))
            .collect()
    }

    /// Resolves an IRI-only attribute value against the in-scope base.
    pub fn resolve_iri(&self, value: &str) -> Result<NamedNode, String> {
        match self.base {
            Some(base) => match base.resolve(value) {
                Ok(iri) => Ok(self.named(iri.into_inner())),
                Err(e) => Err(format!("invalid IRI <{value}>: {e}")),
            },
            None => match Iri::parse(value.to_string()) {
                Ok(iri) => Ok(self.named(iri.into_inner())),
                Err(e) => Err(format!("cannot resolve <{value}> without a base IRI ({e})")),
            },
        }
    }

    fn term(&self, token: &str) -> Option<NamedNode> {
        if let Some(node) = self.terms.get(token) {
            return Some(node.clone());
        }
        if let Some(node) = self
            .terms
            .iter()
            .find_map(|(name, node)| name.eq_ignore_ascii_case(token).then(|| node.clone()))
        {
            return Some(node);
        }
        if let Some(vocabulary) = self.vocabulary {
            return Some(self.named(format!("{}{token}", vocabulary.as_str())));
        }
        (self.report)(
            MessageClass::UnresolvedTerm,
            format!("term '{token}' has no mapping and no default vocabulary is in scope"),
        );
        None
    }

    fn curie(
        &self,
        token: &str,
        restrictions: Restrictions,
    ) -> Result<NamedOrBlankNode, CurieFailure> {
        if token.is_empty() {
            return Err(CurieFailure::Empty);
        }
        let Some((prefix, reference)) = token.split_once(':') else {
            return Err(CurieFailure::NotCurie);
        };
        if prefix == "_" {
            if restrictions.contains(Restrictions::BNODE) {
                return Ok(self.bnodes.borrow_mut().labelled(reference).into());
            }
            return Err(CurieFailure::UnknownPrefix("_".to_string()));
        }

        let key = match self.version {
            RdfaVersion::V1_0 => Cow::Borrowed(prefix),
            RdfaVersion::V1_1 => Cow::Owned(prefix.to_ascii_lowercase()),
        };
        match self.mappings.expand_curie(&Curie::new(Some(key.as_ref()), reference)) {
            Ok(expanded) => self.expansion_to_node(expanded),
            Err(_) => Err(CurieFailure::UnknownPrefix(prefix.to_string())),
        }
    }

    // A prefix may (though should not) map to a relative IRI, in which case
    // the expansion is resolved against the in-scope base.
    fn expansion_to_node(&self, expanded: String) -> Result<NamedOrBlankNode, CurieFailure> {
        if let Ok(iri) = Iri::parse(expanded.clone()) {
            return Ok(self.named(iri.into_inner()).into());
        }
        match self.base {
            Some(base) => match base.resolve(&expanded) {
                Ok(iri) => Ok(self.named(iri.into_inner()).into()),
                Err(_) => Err(CurieFailure::InvalidIri(expanded)),
            },
            None => Err(CurieFailure::InvalidIri(expanded)),
        }
    }

    fn named(&self, iri: String) -> NamedNode {
        if let Some(cache) = self.interner {
            let mut cache = cache.borrow_mut();
            if let Some(node) = cache.get(&iri) {
                return node.clone();
            }
            let node = NamedNode::new_unchecked(iri.clone());
            cache.insert(iri, node.clone());
            return node;
        }
        NamedNode::new_unchecked(iri)
    }
}

fn is_term(token: &str) -> bool {
    rxml_validation::validate_ncname(token).is_ok()
}

/// The restricted prefix production `[A-Za-z_][A-Za-z0-9_.-]*`.
pub(crate) fn is_valid_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Splits a 1.1 `prefix` attribute into pairs. A prefix token without its
/// trailing colon terminates the pair and is skipped; invalid prefix names
/// are reported and skipped; `_` is silently ignored.
pub(crate) fn parse_prefix_attribute(
    value: &str,
    mut report: impl FnMut(String),
) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut tokens = value.split_ascii_whitespace();
    while let Some(token) = tokens.next() {
        let Some(prefix) = token.strip_suffix(':') else {
            report(format!("prefix token '{token}' lacks its trailing colon"));
            continue;
        };
        let Some(iri) = tokens.next() else {
            report(format!("prefix '{prefix}:' is not followed by an IRI"));
            break;
        };
        if prefix == "_" {
            continue;
        }
        if !is_valid_prefix(prefix) {
            report(format!("'{prefix}' is not a valid prefix name"));
            continue;
        }
        pairs.push((prefix.to_ascii_lowercase(), iri.to_string()));
    }
    pairs
}
