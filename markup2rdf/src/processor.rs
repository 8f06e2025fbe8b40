use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::str::FromStr;

use icu::locale::LanguageIdentifier;
use oxiri::Iri;
use oxrdf::vocab::{rdf, xsd};
use oxrdf::{
    Graph, Literal, LiteralRef, NamedNode, NamedNodeRef, NamedOrBlankNode, Term, Triple, TripleRef,
};
use oxsdatatypes::{Boolean, DateTime, Decimal, Double, Integer};
use ego_tree::NodeId;
use scraper::ElementRef;
use vec1::{Size0Error, Vec1};

use crate::context::{strip_fragment, without_prefix, BnodeFactory, EvaluationContext, IncompleteTriple};
use crate::host::{HostLanguage, RdfaVersion};
use crate::literal::{build_literal, xmlns_declarations};
use crate::resolve::{is_valid_prefix, parse_prefix_attribute, Resolver, Restrictions};
use crate::{dc_vocab, ptr_vocab, rdfa_vocab};

macro_rules! trace {
    ($proc:expr, $($args:tt)*) => {
        $proc.debug_line(|| format!($($args)*))
    };
}

/// Classification of a processor message, named after the RDFa vocabulary
/// class the processor graph records it under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    Info,
    Warning,
    Error,
    DocumentError,
    ProfileReferenceError,
    UnresolvedCurie,
    UnresolvedTerm,
}

impl MessageClass {
    pub(crate) fn iri(self) -> NamedNodeRef<'static> {
        match self {
            MessageClass::Info => rdfa_vocab::INFO,
            MessageClass::Warning => rdfa_vocab::WARNING,
            MessageClass::Error => rdfa_vocab::ERROR,
            MessageClass::DocumentError => rdfa_vocab::DOCUMENT_ERROR,
            MessageClass::ProfileReferenceError => rdfa_vocab::PROFILE_REFERENCE_ERROR,
            MessageClass::UnresolvedCurie => rdfa_vocab::UNRESOLVED_CURIE,
            MessageClass::UnresolvedTerm => rdfa_vocab::UNRESOLVED_TERM,
        }
    }
}

/// Presence-aware attribute value: an attribute can be absent, present but
/// resolving to nothing, or carry a resolved value. Several processing rules
/// hinge on the distinction between the first two.
pub(crate) enum Attr<T> {
    Missing,
    Empty,
    Value(T),
}

impl<T> Attr<T> {
    pub fn is_present(&self) -> bool {
        !matches!(self, Attr::Missing)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Attr::Value(v) => Some(v),
            Attr::Missing | Attr::Empty => None,
        }
    }
}

// The locally scoped values of one element's processing round.
struct LocalVars {
    base: Option<Iri<String>>,
    uri_mappings: Rc<curie::PrefixMapping>,
    namespaces: Rc<std::collections::BTreeMap<String, String>>,
    incomplete_triples: Vec<IncompleteTriple>,
    language: Option<Rc<LanguageIdentifier>>,
    term_mappings: Rc<std::collections::BTreeMap<String, NamedNode>>,
    default_vocabulary: Option<NamedNode>,
    skip: bool,
    new_subject: Option<Rc<NamedOrBlankNode>>,
    current_object_resource: Option<Rc<NamedOrBlankNode>>,
    recurse: bool,
    // whether any of the shareable context fields changed; an unchanged skip
    // element hands its own context to its children
    changed: bool,
}

impl LocalVars {
    fn new(ctx: &EvaluationContext) -> Self {
        Self {
            base: ctx.base.clone(),
            uri_mappings: ctx.uri_mappings.clone(),
            namespaces: ctx.namespaces.clone(),
            incomplete_triples: Vec::new(),
            language: ctx.language.clone(),
            term_mappings: ctx.term_mappings.clone(),
            default_vocabulary: ctx.default_vocabulary.clone(),
            skip: false,
            new_subject: None,
            current_object_resource: None,
            recurse: true,
            changed: false,
        }
    }
}

pub(crate) struct RdfaProcessor<'a> {
    sink: RefCell<&'a mut dyn FnMut(Triple)>,
    processor_graph: RefCell<Option<&'a mut Graph>>,
    debug: Option<&'a RefCell<Vec<String>>>,
    bnodes: RefCell<BnodeFactory>,
    interner: Option<RefCell<HashMap<String, NamedNode>>>,
    doc_base: Option<Iri<String>>,
    host: HostLanguage,
    version: RdfaVersion,
    canonicalize: bool,
    // the reader's notion of the document root; for XML hosts this is the
    // element beneath the synthetic html/body wrappers, not the DOM root
    root_id: NodeId,
}

impl<'a> RdfaProcessor<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sink: &'a mut dyn FnMut(Triple),
        processor_graph: Option<&'a mut Graph>,
        debug: Option<&'a RefCell<Vec<String>>>,
        doc_base: Option<Iri<String>>,
        host: HostLanguage,
        version: RdfaVersion,
        canonicalize: bool,
        intern: bool,
        root_id: NodeId,
    ) -> Self {
        Self {
            sink: RefCell::new(sink),
            processor_graph: RefCell::new(processor_graph),
            debug,
            bnodes: RefCell::new(BnodeFactory::new()),
            interner: intern.then(|| RefCell::new(HashMap::new())),
            doc_base,
            host,
            version,
            canonicalize,
            root_id,
        }
    }

    pub fn run(&self, context: EvaluationContext, root: ElementRef) {
        self.process_element(&Rc::new(context), root);
    }

    /// Records a message that is not tied to any element (preamble failures).
    pub fn report_document(&self, class: MessageClass, message: &str) {
        self.report(class, message, None);
    }

    fn emit(&self, triple: TripleRef) {
        let mut triple = triple.into_owned();
        if self.canonicalize {
            if let Term::Literal(literal) = &triple.object {
                if let Some(canonical) = canonical_literal(literal) {
                    triple.object = canonical.into();
                }
            }
        }
        trace!(self, "emit {triple}");
        (*self.sink.borrow_mut())(triple);
    }

    fn debug_line(&self, line: impl FnOnce() -> String) {
        if self.debug.is_some() || log::log_enabled!(log::Level::Trace) {
            let line = line();
            log::trace!("{line}");
            if let Some(buffer) = self.debug {
                buffer.borrow_mut().push(line);
            }
        }
    }

    // Every message becomes a record in the processor graph: a fresh node
    // typed with the message class, described and dated, and linked both to
    // the document and to a pointer naming the element by path.
    fn report(&self, class: MessageClass, message: &str, element: Option<ElementRef>) {
        self.debug_line(|| format!("{class:?}: {message}"));
        if let Some(graph) = self.processor_graph.borrow_mut().as_deref_mut() {
            let node = self.bnodes.borrow_mut().fresh();
            graph.insert(TripleRef::new(&node, rdf::TYPE, class.iri()));
            graph.insert(TripleRef::new(
                &node,
                dc_vocab::DESCRIPTION,
                LiteralRef::new_simple_literal(message),
            ));
            if let Ok(now) = DateTime::now() {
                let date = Literal::new_typed_literal(now.to_string(), xsd::DATE_TIME.into_owned());
                graph.insert(TripleRef::new(&node, dc_vocab::DATE, date.as_ref()));
            }
            if let Some(base) = &self.doc_base {
                graph.insert(TripleRef::new(
                    &node,
                    rdfa_vocab::CONTEXT,
                    NamedNodeRef::new_unchecked(base.as_str()),
                ));
            }
            if let Some(element) = element {
                let pointer = self.bnodes.borrow_mut().fresh();
                let path = element_path(element);
                graph.insert(TripleRef::new(&node, rdfa_vocab::CONTEXT, &pointer));
                graph.insert(TripleRef::new(&pointer, rdf::TYPE, ptr_vocab::XPATH_POINTER));
                graph.insert(TripleRef::new(
                    &pointer,
                    ptr_vocab::EXPRESSION,
                    LiteralRef::new_simple_literal(&path),
                ));
            }
        }
    }

    fn fresh_bnode(&self) -> Rc<NamedOrBlankNode> {
        Rc::new(self.bnodes.borrow_mut().fresh().into())
    }

    fn process_element(&self, ctx: &Rc<EvaluationContext>, element: ElementRef) {
        let el = element.value();
        let report =
            |class: MessageClass, message: String| self.report(class, &message, Some(element));

        // 1. local values
        let mut local = LocalVars::new(ctx);

        // xml:base only applies in XML hosts; HTML takes its base from the
        // head's base element during the preamble.
        if !self.host.has_head_body() {
            if let Some(xml_base) = xml_attr(el, "base") {
                let resolved = match &local.base {
                    Some(base) => base.resolve(xml_base.trim()),
                    None => Iri::parse(xml_base.trim().to_string()),
                };
                match resolved {
                    Ok(iri) => {
                        local.base = Some(strip_fragment(iri));
                        local.changed = true;
                    }
                    Err(e) => report(
                        MessageClass::Warning,
                        format!("invalid xml:base <{xml_base}>: {e}"),
                    ),
                }
            }
        }

        // 2. @vocab updates the local default vocabulary; an empty value
        // restores the host default.
        if let Some(vocab) = el.attr("vocab") {
            let vocab = vocab.trim();
            if vocab.is_empty() {
                trace!(self, "@vocab reset to the host default");
                local.default_vocabulary = self.host.default_vocabulary();
                local.changed = true;
            } else {
                let resolved = match &local.base {
                    Some(base) => base.resolve(vocab),
                    None => Iri::parse(vocab.to_string()),
                };
                match resolved {
                    Ok(iri) => {
                        let vocabulary = NamedNode::new_unchecked(iri.into_inner());
                        trace!(self, "default vocabulary is now {vocabulary}");
                        if let Some(doc_base) = &self.doc_base {
                            self.emit(TripleRef::new(
                                NamedNodeRef::new_unchecked(doc_base.as_str()),
                                rdfa_vocab::HAS_VOCABULARY,
                                &vocabulary,
                            ));
                        }
                        local.default_vocabulary = Some(vocabulary);
                        local.changed = true;
                    }
                    Err(e) => report(
                        MessageClass::Warning,
                        format!("invalid @vocab value '{vocab}': {e}"),
                    ),
                }
            }
        }

        // 3. IRI mappings: xmlns declarations first, then the 1.1 @prefix
        // attribute. New mappings overwrite in-scope ones of the same name.
        let xmlns = xmlns_declarations(el);
        let prefix_pairs = match (self.version, el.attr("prefix")) {
            (RdfaVersion::V1_1, Some(value)) => parse_prefix_attribute(value, |message| {
                report(MessageClass::Error, message)
            }),
            _ => Vec::new(),
        };
        if !xmlns.is_empty() || !prefix_pairs.is_empty() {
            let mut mappings = (*local.uri_mappings).clone();
            let mut namespaces = (*local.namespaces).clone();
            for (prefix, iri) in &xmlns {
                match prefix {
                    // the unprefixed xmlns governs the default namespace
                    // only; in 1.1 an explicit declaration also wins over the
                    // XHV empty-prefix CURIE mapping
                    None => {
                        if iri.is_empty() {
                            namespaces.remove("");
                            if self.version == RdfaVersion::V1_1 {
                                mappings = without_prefix(&mappings, "");
                            }
                        } else {
                            namespaces.insert(String::new(), iri.clone());
                            if self.version == RdfaVersion::V1_1 {
                                mappings.add_prefix("", iri).ok();
                            }
                        }
                    }
                    Some(prefix) => {
                        if prefix.as_str() == "_" {
                            continue;
                        }
                        if !is_valid_prefix(prefix) {
                            report(
                                MessageClass::Error,
                                format!("xmlns prefix '{prefix}' is not a valid prefix name"),
                            );
                            continue;
                        }
                        let key = match self.version {
                            RdfaVersion::V1_0 => prefix.clone(),
                            RdfaVersion::V1_1 => prefix.to_ascii_lowercase(),
                        };
                        namespaces.insert(key.clone(), iri.clone());
                        mappings.add_prefix(&key, iri).ok();
                    }
                }
            }
            for (prefix, iri) in &prefix_pairs {
                mappings.add_prefix(prefix, iri).ok();
            }
            local.uri_mappings = Rc::new(mappings);
            local.namespaces = Rc::new(namespaces);
            local.changed = true;
        }

        // 4. language, with xml:lang taking precedence over lang; an empty
        // value clears the in-scope language.
        if let Some(lang) = xml_attr(el, "lang").or_else(|| el.attr("lang")) {
            let lang = lang.trim();
            if lang.is_empty() {
                local.language = None;
                local.changed = true;
            } else {
                match LanguageIdentifier::from_str(lang) {
                    Ok(lang) => {
                        local.language = Some(Rc::new(lang));
                        local.changed = true;
                    }
                    Err(e) => report(
                        MessageClass::Warning,
                        format!("invalid language tag '{lang}': {e}"),
                    ),
                }
            }
        }

        let debug = |message: String| self.debug_line(|| message);
        let resolver = Resolver {
            version: self.version,
            base: local.base.as_ref(),
            mappings: &local.uri_mappings,
            terms: &local.term_mappings,
            vocabulary: local.default_vocabulary.as_ref(),
            bnodes: &self.bnodes,
            interner: self.interner.as_ref(),
            report: &report,
            debug: &debug,
        };

        let attr_node = |name: &str, restrictions: Restrictions| -> Attr<Rc<NamedOrBlankNode>> {
            match el.attr(name) {
                None => Attr::Missing,
                Some(value) => match resolver.resolve(value, restrictions) {
                    Some(node) => Attr::Value(Rc::new(node)),
                    None => Attr::Empty,
                },
            }
        };
        let attr_many = |name: &str, restrictions: Restrictions| -> Attr<Vec1<NamedOrBlankNode>> {
            match el.attr(name) {
                None => Attr::Missing,
                Some(value) => match Vec1::try_from_vec(resolver.resolve_many(value, restrictions))
                {
                    Err(Size0Error) => Attr::Empty,
                    Ok(values) => Attr::Value(values),
                },
            }
        };
        // rel/rev/property name predicates, so blank nodes are rejected
        let attr_predicates = |name: &str, restrictions: Restrictions| -> Attr<Vec1<NamedNode>> {
            match el.attr(name) {
                None => Attr::Missing,
                Some(value) => {
                    let predicates = resolver
                        .resolve_many(value, restrictions)
                        .into_iter()
                        .filter_map(|node| match node {
                            NamedOrBlankNode::NamedNode(node) => Some(node),
                            NamedOrBlankNode::BlankNode(node) => {
                                report(
                                    MessageClass::Warning,
                                    format!("@{name} cannot use a blank node: [{node}]"),
                                );
                                None
                            }
                        })
                        .collect();
                    match Vec1::try_from_vec(predicates) {
                        Err(Size0Error) => Attr::Empty,
                        Ok(values) => Attr::Value(values),
                    }
                }
            }
        };

        let about = attr_node("about", Restrictions::safe_curie_or_curie_or_uri(self.version));
        let src = attr_node("src", Restrictions::URI);
        let resource = attr_node(
            "resource",
            Restrictions::safe_curie_or_curie_or_uri(self.version),
        );
        let href = attr_node("href", Restrictions::URI);
        let type_of = attr_many("typeof", Restrictions::term_or_curie_or_abs_uri(self.version));
        let property = attr_predicates("property", Restrictions::property(self.version));
        let rel = attr_predicates("rel", Restrictions::term_or_curie_or_abs_uri(self.version));
        let rev = attr_predicates("rev", Restrictions::term_or_curie_or_abs_uri(self.version));
        let datatype = match el.attr("datatype") {
            None => Attr::Missing,
            Some(value) if value.trim().is_empty() => Attr::Empty,
            Some(value) => {
                match resolver.resolve(value, Restrictions::term_or_curie_or_abs_uri(self.version))
                {
                    Some(node) => Attr::Value(node),
                    None => Attr::Empty,
                }
            }
        };
        let content = el.attr("content");

        let is_root = element.id() == self.root_id;
        let is_head_or_body =
            self.host.has_head_body() && (el.name() == "head" || el.name() == "body");
        let has_rel_rev = rel.is_present() || rev.is_present();
        let base_subject = |base: &Option<Iri<String>>| -> Option<Rc<NamedOrBlankNode>> {
            base.as_ref()
                .map(|b| Rc::new(NamedNode::new_unchecked(b.as_str()).into()))
        };

        if !has_rel_rev {
            // 5. establish the subject
            local.new_subject = about
                .value()
                .cloned()
                .or_else(|| src.value().cloned())
                .or_else(|| resource.value().cloned())
                .or_else(|| href.value().cloned());
            if local.new_subject.is_none() {
                if is_head_or_body && local.base.is_some() {
                    local.new_subject = base_subject(&local.base);
                } else if is_root && local.base.is_some() {
                    local.new_subject = base_subject(&local.base);
                } else if type_of.is_present() {
                    local.new_subject = Some(self.fresh_bnode());
                } else {
                    local.new_subject = ctx.parent_object.clone();
                    if !property.is_present() {
                        trace!(self, "skipping <{}>: no relevant attributes", el.name());
                        local.skip = true;
                    }
                }
            }
        } else {
            // 6. establish both a subject and an object resource
            local.new_subject = about.value().cloned().or_else(|| src.value().cloned());
            if local.new_subject.is_none() {
                if is_root && local.base.is_some() {
                    local.new_subject = base_subject(&local.base);
                } else if is_head_or_body && local.base.is_some() {
                    local.new_subject = base_subject(&local.base);
                } else if type_of.is_present() {
                    local.new_subject = Some(self.fresh_bnode());
                } else {
                    local.new_subject = ctx.parent_object.clone();
                }
            }
            local.current_object_resource = resource
                .value()
                .cloned()
                .or_else(|| href.value().cloned());
        }

        // 7. every @typeof value types the subject
        if let (Some(subject), Attr::Value(types)) = (&local.new_subject, &type_of) {
            for type_iri in types {
                self.emit(TripleRef::new(subject.as_ref(), rdf::TYPE, type_iri));
            }
        }

        // 8. a known object resource completes @rel and @rev immediately
        if let Some(object) = &local.current_object_resource {
            if let Some(subject) = &local.new_subject {
                if let Attr::Value(predicates) = &rel {
                    for predicate in predicates {
                        self.emit(TripleRef::new(subject.as_ref(), predicate, object.as_ref()));
                    }
                }
                if let Attr::Value(predicates) = &rev {
                    for predicate in predicates {
                        self.emit(TripleRef::new(object.as_ref(), predicate, subject.as_ref()));
                    }
                }
            }
        } else if has_rel_rev {
            // 9. no object yet: park the predicates as incomplete triples and
            // hand descendants a bnode to chain onto
            local.current_object_resource = Some(self.fresh_bnode());
            if let Attr::Value(predicates) = &rel {
                for predicate in predicates {
                    local
                        .incomplete_triples
                        .push(IncompleteTriple::Forward(predicate.clone()));
                }
            }
            if let Attr::Value(predicates) = &rev {
                for predicate in predicates {
                    local
                        .incomplete_triples
                        .push(IncompleteTriple::Reverse(predicate.clone()));
                }
            }
        }

        // 11. a non-skip element with a subject completes the incomplete
        // triples received from its parent. The parent's list is consumed
        // here; only the local list travels further down.
        if !local.skip {
            if let (Some(subject), Some(parent_subject)) =
                (&local.new_subject, &ctx.parent_subject)
            {
                for incomplete in &ctx.incomplete_triples {
                    match incomplete {
                        IncompleteTriple::Forward(predicate) => self.emit(TripleRef::new(
                            parent_subject.as_ref(),
                            predicate,
                            subject.as_ref(),
                        )),
                        IncompleteTriple::Reverse(predicate) => self.emit(TripleRef::new(
                            subject.as_ref(),
                            predicate,
                            parent_subject.as_ref(),
                        )),
                    }
                }
            }
        }

        // 10. @property emits the current literal value
        if let Attr::Value(predicates) = &property {
            let built = build_literal(
                element,
                content,
                &datatype,
                local.language.as_deref(),
                &local.namespaces,
                self.version,
                &report,
            );
            if let Some(subject) = &local.new_subject {
                for predicate in predicates {
                    self.emit(TripleRef::new(
                        subject.as_ref(),
                        predicate,
                        built.literal.as_ref(),
                    ));
                }
            }
            local.recurse = built.recurse;
        }

        // 12. descend with the derived context
        if !local.recurse {
            return;
        }
        let child_context = if local.skip {
            if local.changed {
                Rc::new(EvaluationContext {
                    base: local.base.clone(),
                    language: local.language.clone(),
                    uri_mappings: local.uri_mappings.clone(),
                    namespaces: local.namespaces.clone(),
                    term_mappings: local.term_mappings.clone(),
                    default_vocabulary: local.default_vocabulary.clone(),
                    ..(**ctx).clone()
                })
            } else {
                ctx.clone()
            }
        } else {
            Rc::new(EvaluationContext {
                base: local.base.clone(),
                parent_subject: local
                    .new_subject
                    .clone()
                    .or_else(|| ctx.parent_subject.clone()),
                parent_object: local
                    .current_object_resource
                    .clone()
                    .or_else(|| local.new_subject.clone())
                    .or_else(|| ctx.parent_subject.clone()),
                uri_mappings: local.uri_mappings.clone(),
                namespaces: local.namespaces.clone(),
                incomplete_triples: std::mem::take(&mut local.incomplete_triples),
                language: local.language.clone(),
                term_mappings: local.term_mappings.clone(),
                default_vocabulary: local.default_vocabulary.clone(),
            })
        };

        for child in element.children() {
            if let Some(child_element) = ElementRef::wrap(child) {
                self.process_element(&child_context, child_element);
            }
        }
    }
}

/// Looks up an `xml:*` attribute. Depending on content type the tree builder
/// stores these either with the colon inside the local name (HTML content) or
/// namespace-adjusted under the `xml` prefix (foreign content); both shapes
/// are accepted.
pub(crate) fn xml_attr<'a>(el: &'a scraper::node::Element, local: &str) -> Option<&'a str> {
    el.attrs.iter().find_map(|(name, value)| {
        let hit = match name.prefix.as_deref() {
            Some("xml") => name.local.as_ref() == local,
            Some(_) => false,
            None => name
                .local
                .strip_prefix("xml:")
                .is_some_and(|rest| rest == local),
        };
        hit.then(|| &**value)
    })
}

/// Rooted element path in the XPath style the pointer records use; the
/// position predicate is omitted when no same-named sibling exists.
fn element_path(element: ElementRef) -> String {
    let mut segments = Vec::new();
    let mut current = Some(element);
    while let Some(el) = current {
        let name = el.value().name().to_string();
        let position = 1 + el
            .prev_siblings()
            .filter(|s| s.value().as_element().is_some_and(|e| e.name() == name))
            .count();
        let only = position == 1
            && !el
                .next_siblings()
                .any(|s| s.value().as_element().is_some_and(|e| e.name() == name));
        segments.push(if only {
            name
        } else {
            format!("{name}[{position}]")
        });
        current = el.parent().and_then(ElementRef::wrap);
    }
    segments.reverse();
    format!("/{}", segments.join("/"))
}

// Canonical lexical forms for the datatypes the xsd layer can round-trip;
// language tags are canonical in lower case.
fn canonical_literal(literal: &Literal) -> Option<Literal> {
    if literal.is_plain() {
        let language = literal.language()?;
        let lowered = language.to_ascii_lowercase();
        return (lowered != language)
            .then(|| Literal::new_language_tagged_literal_unchecked(literal.value(), lowered));
    }
    let datatype = literal.datatype();
    let value = literal.value();
    let canonical = if datatype == xsd::BOOLEAN {
        Boolean::from_str(value).ok().map(|v| v.to_string())
    } else if datatype == xsd::INTEGER {
        Integer::from_str(value).ok().map(|v| v.to_string())
    } else if datatype == xsd::DECIMAL {
        Decimal::from_str(value).ok().map(|v| v.to_string())
    } else if datatype == xsd::DOUBLE {
        Double::from_str(value).ok().map(|v| v.to_string())
    } else if datatype == xsd::DATE_TIME {
        DateTime::from_str(value).ok().map(|v| v.to_string())
    } else {
        None
    }?;
    (canonical != value).then(|| Literal::new_typed_literal(canonical, datatype.into_owned()))
}
