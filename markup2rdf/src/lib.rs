use oxiri::Iri;
use oxrdf::Graph;

mod context;
mod host;
mod literal;
mod processor;
mod profile;
mod reader;
mod resolve;

pub use host::{HostLanguage, RdfaVersion};
pub use processor::MessageClass;
pub use profile::{
    DefaultProfileLoader, NullLoader, Profile, ProfileError, ProfileLoader, HTML_RDFA_1_1_PROFILE,
    RDFA_1_1_PROFILE,
};
pub use reader::{RdfaReader, ReaderOptions};
pub use resolve::Restrictions;

/// The XHTML vocabulary, used to expand bare terms and empty-prefix CURIEs.
pub const XHV_NS: &str = "http://www.w3.org/1999/xhtml/vocab#";

#[derive(derive_more::Error, derive_more::Display, derive_more::From, Debug)]
pub enum ReaderError {
    #[display("empty or unparsable document")]
    DocumentError,

    #[display("IRI parse error: `{iri}`")]
    IriParseError {
        source: oxiri::IriParseError,
        iri: String,
    },

    #[display("profile reference error: {_0}")]
    ProfileReferenceError(ProfileError),
}

pub(crate) mod dc_vocab {
    pub static DESCRIPTION: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("http://purl.org/dc/terms/description");

    pub static DATE: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("http://purl.org/dc/terms/date");
}

pub(crate) mod ptr_vocab {
    pub static XPATH_POINTER: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("http://www.w3.org/2009/pointers#XPathPointer");

    pub static EXPRESSION: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("http://www.w3.org/2009/pointers#expression");
}

pub(crate) mod rdfa_vocab {
    pub static INFO: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#Info");

    pub static ERROR: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#Error");

    pub static WARNING: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#Warning");

    pub static DOCUMENT_ERROR: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#DocumentError");

    pub static PROFILE_REFERENCE_ERROR: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#ProfileReferenceError");

    pub static UNRESOLVED_CURIE: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#UnresolvedCURIE");

    pub static UNRESOLVED_TERM: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#UnresolvedTerm");

    pub static CONTEXT: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#context");

    pub static HAS_VOCABULARY: oxrdf::NamedNodeRef =
        oxrdf::NamedNodeRef::new_unchecked("http://www.w3.org/ns/rdfa#hasVocabulary");
}

/// Parses `input` and collects the extracted statements into `output_graph`,
/// with processor messages accumulating in `processor_graph`.
///
/// Host language and RDFa version are detected from the document itself; use
/// [`RdfaReader`] directly to force them or to stream statements without
/// collecting a graph.
pub fn parse(
    input: &str,
    base: Iri<String>,
    output_graph: &mut Graph,
    processor_graph: &mut Graph,
) -> Result<(), ReaderError> {
    let options = ReaderOptions::default()
        .with_base(base)
        .with_processor_graph(true);

    let result = RdfaReader::from_str(input, options).and_then(|mut reader| {
        reader.each_statement(|statement| {
            output_graph.insert(statement.as_ref());
        })?;
        for triple in reader.processor_graph().iter() {
            processor_graph.insert(triple);
        }
        Ok(())
    });

    if let Err(e) = result {
        // a fixed identity keeps even the failure record deterministic
        let node = oxrdf::BlankNode::new_unchecked("parse-error");
        processor_graph.insert(oxrdf::TripleRef::new(
            &node,
            oxrdf::vocab::rdf::TYPE,
            rdfa_vocab::DOCUMENT_ERROR,
        ));
        processor_graph.insert(oxrdf::TripleRef::new(
            &node,
            dc_vocab::DESCRIPTION,
            oxrdf::LiteralRef::new_simple_literal(&e.to_string()),
        ));
    }

    Ok(())
}
