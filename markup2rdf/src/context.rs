use std::collections::BTreeMap;
use std::rc::Rc;

use curie::PrefixMapping;
use icu::locale::LanguageIdentifier;
use oxiri::Iri;
use oxrdf::{BlankNode, NamedNode, NamedOrBlankNode};

use crate::host::RdfaVersion;
use crate::profile::XHTML_LINK_TYPES;
use crate::XHV_NS;

/// A predicate waiting for the subject a descendant element will supply.
#[derive(Clone, Debug)]
pub(crate) enum IncompleteTriple {
    Forward(NamedNode),
    Reverse(NamedNode),
}

// “During processing, each rule is applied using information provided by an
//  evaluation context. An initial context is created when processing begins.”
#[derive(Clone)]
pub(crate) struct EvaluationContext {
    // The IRI against which relative paths are resolved. Set from the reader
    // option, the (X)HTML base element, or xml:base; absent when none of
    // those supplied one.
    pub base: Option<Iri<String>>,

    // The subject inherited from the enclosing element.
    pub parent_subject: Option<Rc<NamedOrBlankNode>>,

    // The object of a containing statement, carried down so that nested
    // statements can chain onto it.
    pub parent_object: Option<Rc<NamedOrBlankNode>>,

    // In-scope prefix → IRI mappings for CURIE expansion.
    pub uri_mappings: Rc<PrefixMapping>,

    // The subset of mappings declared through xmlns, kept separately because
    // XML-literal serialisation materialises exactly these.
    pub namespaces: Rc<BTreeMap<String, String>>,

    // Triples pending completion by the next descendant that supplies a
    // subject (chaining).
    pub incomplete_triples: Vec<IncompleteTriple>,

    // The in-scope language tag. There is no default language.
    pub language: Option<Rc<LanguageIdentifier>>,

    // NCName → IRI term mappings.
    pub term_mappings: Rc<BTreeMap<String, NamedNode>>,

    // IRI prepended to bare terms with no mapping of their own.
    pub default_vocabulary: Option<NamedNode>,
}

impl EvaluationContext {
    pub fn new(base: Option<Iri<String>>, version: RdfaVersion) -> Self {
        let mut uri_mappings = PrefixMapping::default();
        // the empty prefix expands into the XHTML vocabulary unless a profile
        // or an explicit xmlns declaration overrides it
        uri_mappings.add_prefix("", XHV_NS).ok();

        let mut term_mappings = BTreeMap::new();
        if version == RdfaVersion::V1_0 {
            for term in XHTML_LINK_TYPES {
                term_mappings.insert(
                    term.to_string(),
                    NamedNode::new_unchecked(format!("{XHV_NS}{term}")),
                );
            }
        }

        let parent_subject = base
            .as_ref()
            .map(|b| Rc::new(NamedNode::new_unchecked(b.as_str()).into()));

        Self {
            base,
            parent_subject,
            parent_object: None,
            uri_mappings: Rc::new(uri_mappings),
            namespaces: Rc::new(BTreeMap::new()),
            incomplete_triples: Vec::new(),
            language: None,
            term_mappings: Rc::new(term_mappings),
            default_vocabulary: None,
        }
    }

    /// Adds a prefix mapping from a profile or the reader's seed list.
    /// `_` is never mapped; 1.1 prefixes are case-insensitive so they are
    /// stored lower-cased.
    pub fn seed_prefix(&mut self, prefix: &str, iri: &str, version: RdfaVersion) {
        if prefix == "_" {
            return;
        }
        let key = match version {
            RdfaVersion::V1_0 => prefix.to_string(),
            RdfaVersion::V1_1 => prefix.to_ascii_lowercase(),
        };
        Rc::make_mut(&mut self.uri_mappings).add_prefix(&key, iri).ok();
    }

    pub fn seed_term(&mut self, term: &str, iri: NamedNode) {
        Rc::make_mut(&mut self.term_mappings).insert(term.to_string(), iri);
    }
}

/// Normalises a base IRI by resolving the empty reference against it, which
/// drops any fragment.
pub(crate) fn strip_fragment(iri: Iri<String>) -> Iri<String> {
    match iri.resolve("") {
        Ok(stripped) => stripped,
        Err(_) => iri,
    }
}

/// Rebuilds a prefix map without one entry. The curie map has no removal
/// operation, and dropping a mapping is rare (an explicit `xmlns=""` reset).
pub(crate) fn without_prefix(mappings: &PrefixMapping, prefix: &str) -> PrefixMapping {
    let mut rebuilt = PrefixMapping::default();
    for (p, iri) in mappings.mappings() {
        if p != prefix {
            rebuilt.add_prefix(p, iri).ok();
        }
    }
    rebuilt
}

/// Per-parse blank-node identities.
///
/// Labels written in the document map injectively onto `b…` identities, so
/// equal labels are the same node and distinct labels are distinct nodes;
/// unlabelled nodes draw fresh `f…` identities. Both sequences are
/// deterministic for a given input.
pub(crate) struct BnodeFactory {
    fresh: u64,
    labelled: BTreeMap<String, BlankNode>,
}

impl BnodeFactory {
    pub fn new() -> Self {
        Self {
            fresh: 0,
            labelled: BTreeMap::new(),
        }
    }

    pub fn fresh(&mut self) -> BlankNode {
        let node = BlankNode::new_unchecked(format!("f{}", self.fresh));
        self.fresh += 1;
        node
    }

    /// The stable node for a document label; the empty label is itself a
    /// valid, stable identity.
    pub fn labelled(&mut self, label: &str) -> BlankNode {
        if let Some(node) = self.labelled.get(label) {
            return node.clone();
        }
        let node = match BlankNode::new(format!("b{label}")) {
            Ok(node) => node,
            // labels the N-Triples grammar cannot carry still get one stable
            // identity each
            Err(_) => self.fresh(),
        };
        self.labelled.insert(label.to_string(), node.clone());
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labelled_nodes_are_stable_and_distinct() {
        let mut factory = BnodeFactory::new();
        let a1 = factory.labelled("a");
        let b = factory.labelled("b");
        let a2 = factory.labelled("a");
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
    }

    #[test]
    fn empty_label_has_one_identity() {
        let mut factory = BnodeFactory::new();
        assert_eq!(factory.labelled(""), factory.labelled(""));
    }

    #[test]
    fn fresh_nodes_never_collide_with_labels() {
        let mut factory = BnodeFactory::new();
        let fresh = factory.fresh();
        let labelled = factory.labelled("f0");
        assert_ne!(fresh, labelled);
    }

    #[test]
    fn deterministic_across_factories() {
        let mut one = BnodeFactory::new();
        let mut two = BnodeFactory::new();
        assert_eq!(one.fresh(), two.fresh());
        assert_eq!(one.labelled("x"), two.labelled("x"));
    }

    #[test]
    fn version_1_0_seeds_link_type_terms() {
        let ctx = EvaluationContext::new(None, RdfaVersion::V1_0);
        assert!(ctx.term_mappings.contains_key("stylesheet"));
        let ctx = EvaluationContext::new(None, RdfaVersion::V1_1);
        assert!(ctx.term_mappings.is_empty());
    }

    #[test]
    fn underscore_is_never_seeded() {
        let mut ctx = EvaluationContext::new(None, RdfaVersion::V1_1);
        ctx.seed_prefix("_", "http://example.org/", RdfaVersion::V1_1);
        assert!(ctx.uri_mappings.mappings().all(|(p, _)| p != "_"));
    }
}
