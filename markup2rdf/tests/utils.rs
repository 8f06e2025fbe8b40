#![allow(dead_code)]

use itertools::Itertools;
use markup2rdf::{RdfaReader, ReaderOptions};
use oxrdf::{Graph, Triple};

pub const BASE: &str = "http://example.org/";

pub fn base() -> oxiri::Iri<String> {
    oxiri::Iri::parse(BASE.to_string()).unwrap()
}

pub fn options() -> ReaderOptions {
    ReaderOptions::default().with_base(base())
}

/// Canonical serialisation so that graphs compare independently of
/// blank-node labels.
pub fn serialize_graph(graph: &Graph) -> String {
    let idents = rdf_canon::issue_graph_with::<sha2::Sha256>(graph, &Default::default()).unwrap();
    let graph = rdf_canon::relabel_graph(graph, &idents).unwrap();
    graph.iter().map(|t| format!("{t} .")).sorted().join("\n")
}

/// Parses, collecting the output into one graph and the processor messages
/// into another.
pub fn parse_with(html: &str, options: ReaderOptions) -> (Graph, Graph) {
    let mut reader =
        RdfaReader::from_str(html, options.with_processor_graph(true)).unwrap();
    let mut graph = Graph::new();
    reader
        .each_statement(|statement| {
            graph.insert(statement.as_ref());
        })
        .unwrap();
    let mut processor = Graph::new();
    for triple in reader.processor_graph().iter() {
        processor.insert(triple);
    }
    (graph, processor)
}

/// The raw statement sequence, duplicates and order preserved.
pub fn statements(html: &str, options: ReaderOptions) -> Vec<Triple> {
    let mut reader = RdfaReader::from_str(html, options).unwrap();
    let mut out = Vec::new();
    reader.each_statement(|statement| out.push(statement)).unwrap();
    out
}

pub fn assert_graph_with(html: &str, options: ReaderOptions, ttl: &str) {
    let (graph, _) = parse_with(html, options);
    let mut expected = Graph::new();
    for triple in oxttl::TurtleParser::new().for_slice(ttl.as_bytes()) {
        expected.insert(&triple.unwrap());
    }
    pretty_assertions::assert_eq!(serialize_graph(&graph), serialize_graph(&expected));
}

pub fn assert_graph(html: &str, ttl: &str) {
    assert_graph_with(html, options(), ttl);
}
