use markup2rdf::{HostLanguage, RdfaVersion};
use oxrdf::vocab::rdf;
use oxrdf::{NamedNodeRef, Subject, Term};
use rstest::rstest;

mod utils;

#[rstest]
#[case(RdfaVersion::V1_0)]
#[case(RdfaVersion::V1_1)]
fn rel_resource_chaining(#[case] version: RdfaVersion) {
    utils::assert_graph_with(
        r#"<div about="http://a.example/s"><span rel="http://a.example/p" resource="http://a.example/o"></span></div>"#,
        utils::options().with_version(version),
        r#"<http://a.example/s> <http://a.example/p> <http://a.example/o> ."#,
    );
}

#[test]
fn typeof_on_anonymous_subject() {
    // no base, so the root-with-base fallback cannot supply a subject and
    // @typeof mints a fresh blank node
    let (graph, _) = utils::parse_with(
        r#"<div typeof="http://a.example/T"></div>"#,
        markup2rdf::ReaderOptions::default(),
    );
    assert_eq!(graph.len(), 1);
    let triple = graph.iter().next().unwrap();
    assert!(matches!(triple.subject, oxrdf::SubjectRef::BlankNode(_)));
    assert_eq!(triple.predicate, rdf::TYPE);
    assert_eq!(
        triple.object,
        oxrdf::TermRef::from(NamedNodeRef::new_unchecked("http://a.example/T"))
    );
}

#[test]
fn head_inherits_the_base_subject() {
    utils::assert_graph_with(
        r#"<html><head property="http://a.example/p" content="hi"></head></html>"#,
        markup2rdf::ReaderOptions::default()
            .with_base(oxiri::Iri::parse("http://d/".to_string()).unwrap())
            .with_host_language(HostLanguage::Xhtml1),
        r#"<http://d/> <http://a.example/p> "hi" ."#,
    );
}

#[test]
fn incomplete_triples_complete_through_chaining() {
    utils::assert_graph(
        r#"<div about="http://a.example/s" rel="http://a.example/p"><span about="http://a.example/o"></span></div>"#,
        r#"<http://a.example/s> <http://a.example/p> <http://a.example/o> ."#,
    );
}

#[test]
fn incomplete_triples_complete_once_per_resolving_child() {
    utils::assert_graph(
        r#"<div about="http://a.example/s" rel="http://a.example/p">
             <span about="http://a.example/o1"></span>
             <span about="http://a.example/o2"></span>
           </div>"#,
        r#"<http://a.example/s> <http://a.example/p> <http://a.example/o1> .
           <http://a.example/s> <http://a.example/p> <http://a.example/o2> ."#,
    );
}

#[test]
fn grandchildren_never_resee_consumed_incomplete_triples() {
    utils::assert_graph(
        r#"<div about="http://a.example/s" rel="http://a.example/p"><span about="http://a.example/o"><span about="http://a.example/q"></span></span></div>"#,
        r#"<http://a.example/s> <http://a.example/p> <http://a.example/o> ."#,
    );
}

#[test]
fn incomplete_triples_pass_through_skip_elements() {
    utils::assert_graph(
        r#"<div about="http://a.example/s" rel="http://a.example/p"><span><span about="http://a.example/o"></span></span></div>"#,
        r#"<http://a.example/s> <http://a.example/p> <http://a.example/o> ."#,
    );
}

#[test]
fn rev_reverses_subject_and_object() {
    utils::assert_graph(
        r#"<div about="http://a.example/s" rev="http://a.example/p"><span about="http://a.example/o"></span></div>"#,
        r#"<http://a.example/o> <http://a.example/p> <http://a.example/s> ."#,
    );
}

#[test]
fn xml_literal_in_1_0_preserves_markup_and_stops_descent() {
    let (graph, _) = utils::parse_with(
        r#"<span property="http://a.example/p">hello <em about="http://a.example/hidden" property="http://a.example/q">world</em></span>"#,
        utils::options().with_version(RdfaVersion::V1_0),
    );
    assert_eq!(graph.len(), 1);
    let triple = graph.iter().next().unwrap();
    let Term::Literal(literal) = triple.object.into_owned() else {
        panic!("expected a literal object");
    };
    assert_eq!(literal.datatype(), rdf::XML_LITERAL);
    assert!(literal.value().contains("hello "));
    assert!(literal
        .value()
        .contains(r#"<em about="http://a.example/hidden" property="http://a.example/q">world</em>"#));
}

#[test]
fn vocab_applies_and_empty_vocab_resets() {
    utils::assert_graph(
        r#"<div vocab="http://v/"><span property="x"></span><span vocab=""><span property="x"></span></span></div>"#,
        r#"<http://example.org/> <http://www.w3.org/ns/rdfa#hasVocabulary> <http://v/> .
           <http://example.org/> <http://v/x> "" ."#,
    );
}

#[test]
fn unresolved_terms_are_recorded_in_the_processor_graph() {
    let (graph, processor) = utils::parse_with(
        r#"<div about="http://a.example/s" property="nosuchterm" content="v"></div>"#,
        utils::options(),
    );
    assert!(graph.is_empty());
    assert!(processor.iter().any(|t| {
        t.predicate == rdf::TYPE
            && t.object
                == oxrdf::TermRef::from(NamedNodeRef::new_unchecked(
                    "http://www.w3.org/ns/rdfa#UnresolvedTerm",
                ))
    }));
    // the record points back at the offending element
    assert!(processor.iter().any(|t| {
        t.predicate == NamedNodeRef::new_unchecked("http://www.w3.org/2009/pointers#expression")
    }));
}

#[test]
fn typeof_types_the_about_subject() {
    utils::assert_graph(
        r#"<div about="http://a.example/s" typeof="http://a.example/T http://a.example/U"></div>"#,
        r#"<http://a.example/s> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://a.example/T> .
           <http://a.example/s> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://a.example/U> ."#,
    );
}

#[test]
fn prefix_attribute_declares_mappings_in_1_1() {
    utils::assert_graph(
        r#"<div prefix="ex: http://e/" about="http://a.example/s" rel="ex:p" resource="http://a.example/o"></div>"#,
        r#"<http://a.example/s> <http://e/p> <http://a.example/o> ."#,
    );
}

#[test]
fn xmlns_declares_curie_prefixes() {
    utils::assert_graph_with(
        r#"<div xmlns:ex="http://e/" about="[ex:s]" property="ex:p" content="v"></div>"#,
        utils::options().with_version(RdfaVersion::V1_0),
        r#"<http://e/s> <http://e/p> "v" ."#,
    );
}

#[test]
fn empty_prefix_curies_expand_into_xhv() {
    utils::assert_graph_with(
        r#"<div about="http://a.example/s" rel=":next" resource="http://a.example/o"></div>"#,
        utils::options().with_version(RdfaVersion::V1_0),
        r#"<http://a.example/s> <http://www.w3.org/1999/xhtml/vocab#next> <http://a.example/o> ."#,
    );
}

#[test]
fn link_type_terms_are_seeded_in_1_0() {
    utils::assert_graph_with(
        r#"<div about="http://a.example/s" rel="next" resource="http://a.example/o"></div>"#,
        utils::options().with_version(RdfaVersion::V1_0),
        r#"<http://a.example/s> <http://www.w3.org/1999/xhtml/vocab#next> <http://a.example/o> ."#,
    );
}

#[test]
fn xml_lang_wins_over_lang() {
    let (graph, _) = utils::parse_with(
        r#"<div about="http://a.example/s" property="http://a.example/p" content="hallo" lang="de" xml:lang="en"></div>"#,
        utils::options().with_host_language(HostLanguage::Html5),
    );
    assert_eq!(graph.len(), 1);
    let Term::Literal(literal) = graph.iter().next().unwrap().object.into_owned() else {
        panic!("expected a literal object");
    };
    assert_eq!(literal.language(), Some("en"));
}

#[test]
fn empty_lang_clears_the_inherited_language() {
    let (graph, _) = utils::parse_with(
        r#"<div lang="de"><span about="http://a.example/s" property="http://a.example/p" content="x" lang=""></span></div>"#,
        utils::options().with_host_language(HostLanguage::Html5),
    );
    let Term::Literal(literal) = graph.iter().next().unwrap().object.into_owned() else {
        panic!("expected a literal object");
    };
    assert_eq!(literal.language(), None);
}

#[test]
fn labelled_blank_nodes_share_one_identity() {
    let (graph, _) = utils::parse_with(
        r#"<div about="[_:x]" property="http://a.example/p" content="a"></div>
           <div about="[_:x]" property="http://a.example/q" content="b"></div>"#,
        utils::options(),
    );
    assert_eq!(graph.len(), 2);
    let subjects: Vec<Subject> = graph.iter().map(|t| t.subject.into_owned()).collect();
    assert_eq!(subjects[0], subjects[1]);
}

#[test]
fn underscore_prefix_declarations_are_ignored() {
    let (graph, _) = utils::parse_with(
        r#"<div prefix="_: http://u/" about="http://a.example/s" rel="_:p" resource="http://a.example/o"></div>"#,
        utils::options(),
    );
    // the mapping never exists, and _:p is not a legal predicate either
    assert!(graph.is_empty());
}

#[test]
fn sibling_contexts_stay_isolated() {
    utils::assert_graph(
        r#"<div about="http://a.example/s">
             <span prefix="ex: http://e/"></span>
             <span about="[ex:o]" property="http://a.example/p" content="v"></span>
           </div>"#,
        // the second span cannot see its sibling's prefix, so @about is
        // ignored and the subject chains from the div
        r#"<http://a.example/s> <http://a.example/p> "v" ."#,
    );
}

#[test]
fn base_element_supplies_the_base_fragment_stripped() {
    utils::assert_graph_with(
        r#"<html><head><base href="http://d/doc#sec"></head><body><span property="http://a.example/p" content="v"></span></body></html>"#,
        markup2rdf::ReaderOptions::default(),
        r#"<http://d/doc> <http://a.example/p> "v" ."#,
    );
}

#[test]
fn root_with_base_wins_over_typeof_in_xml_hosts() {
    // the content root of a standalone document takes the base as subject
    // before @typeof can mint a blank node, wrappers notwithstanding
    utils::assert_graph_with(
        r#"<svg xml:base="http://s/base/" typeof="http://a.example/T"></svg>"#,
        markup2rdf::ReaderOptions::default(),
        r#"<http://s/base/> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://a.example/T> ."#,
    );
}

#[test]
fn xml_base_applies_in_xml_hosts() {
    utils::assert_graph_with(
        r#"<svg xml:base="http://s/base/"><g about="./item" property="http://a.example/p" content="v"></g></svg>"#,
        markup2rdf::ReaderOptions::default(),
        r#"<http://s/base/item> <http://a.example/p> "v" ."#,
    );
}

#[test]
fn xml_literals_materialise_in_scope_namespaces() {
    let (graph, _) = utils::parse_with(
        r#"<div xmlns:ex="http://e/" about="http://a.example/s"><span property="http://a.example/p">a <ex:b>c</ex:b></span></div>"#,
        utils::options().with_version(RdfaVersion::V1_0),
    );
    assert_eq!(graph.len(), 1);
    let Term::Literal(literal) = graph.iter().next().unwrap().object.into_owned() else {
        panic!("expected a literal object");
    };
    assert_eq!(literal.datatype(), rdf::XML_LITERAL);
    assert_eq!(literal.value(), r#"a <ex:b xmlns:ex="http://e/">c</ex:b>"#);
}
