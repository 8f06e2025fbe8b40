use std::collections::HashMap;

use oxiri::Iri;
use oxrdf::NamedNode;

use crate::XHV_NS;

/// Default profile applied to every RDFa 1.1 document.
pub const RDFA_1_1_PROFILE: &str = "http://www.w3.org/profile/rdfa-1.1";

/// Additional default profile for RDFa 1.1 documents in an (X)HTML host.
pub const HTML_RDFA_1_1_PROFILE: &str = "http://www.w3.org/profile/html-rdfa-1.1";

/// Prefix mappings, term mappings, and the default vocabulary contributed by
/// one RDFa profile document.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub prefixes: Vec<(String, String)>,
    pub terms: Vec<(String, NamedNode)>,
    pub vocabulary: Option<NamedNode>,
}

#[derive(derive_more::Error, derive_more::Display, Debug, Clone)]
pub enum ProfileError {
    #[display("no profile data available for <{_0}>")]
    NotFound(#[error(not(source))] String),

    #[display("profile <{_0}> refers to the document being processed")]
    SelfReference(#[error(not(source))] String),

    #[display("profile fetch timed out: <{_0}>")]
    Timeout(#[error(not(source))] String),
}

/// Resolves a profile IRI to its mappings. Implementations typically cache by
/// IRI; fetch timeouts surface as [`ProfileError::Timeout`].
pub trait ProfileLoader {
    fn find_profile(&mut self, iri: &Iri<String>) -> Result<Profile, ProfileError>;
}

/// In-memory loader seeded with the W3C initial-context data for the two
/// default profiles. Additional fixtures can be registered with [`insert`],
/// which is also how tests inject profile documents without any I/O.
///
/// [`insert`]: DefaultProfileLoader::insert
#[derive(Debug, Clone)]
pub struct DefaultProfileLoader {
    profiles: HashMap<String, Profile>,
}

impl Default for DefaultProfileLoader {
    fn default() -> Self {
        let mut profiles = HashMap::new();
        profiles.insert(RDFA_1_1_PROFILE.to_string(), core_profile());
        profiles.insert(HTML_RDFA_1_1_PROFILE.to_string(), html_profile());
        Self { profiles }
    }
}

impl DefaultProfileLoader {
    pub fn insert(&mut self, iri: impl Into<String>, profile: Profile) {
        self.profiles.insert(iri.into(), profile);
    }
}

impl ProfileLoader for DefaultProfileLoader {
    fn find_profile(&mut self, iri: &Iri<String>) -> Result<Profile, ProfileError> {
        self.profiles
            .get(iri.as_str())
            .cloned()
            .ok_or_else(|| ProfileError::NotFound(iri.to_string()))
    }
}

/// A loader that fails every lookup, for callers that must not touch the
/// network (profile failures are recoverable outside validating mode).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLoader;

impl ProfileLoader for NullLoader {
    fn find_profile(&mut self, iri: &Iri<String>) -> Result<Profile, ProfileError> {
        Err(ProfileError::NotFound(iri.to_string()))
    }
}

/// XHTML link types recognised as terms: seeded directly into RDFa 1.0
/// contexts and published by the HTML default profile for 1.1.
pub(crate) const XHTML_LINK_TYPES: &[&str] = &[
    "alternate",
    "appendix",
    "bookmark",
    "cite",
    "chapter",
    "contents",
    "copyright",
    "first",
    "glossary",
    "help",
    "icon",
    "index",
    "last",
    "license",
    "meta",
    "next",
    "p3pv1",
    "prev",
    "role",
    "section",
    "stylesheet",
    "subsection",
    "start",
    "top",
    "up",
];

// https://www.w3.org/2011/rdfa-context/rdfa-1.1
fn core_profile() -> Profile {
    let prefixes = [
        // W3C documents
        ("as", "https://www.w3.org/ns/activitystreams#"),
        ("csvw", "http://www.w3.org/ns/csvw#"),
        ("dcat", "http://www.w3.org/ns/dcat#"),
        ("dqv", "http://www.w3.org/ns/dqv#"),
        ("duv", "http://www.w3.org/ns/duv#"),
        ("grddl", "http://www.w3.org/2003/g/data-view#"),
        ("jsonld", "http://json-ld.org/vocab#"),
        ("ma", "http://www.w3.org/ns/ma-ont#"),
        ("org", "http://www.w3.org/ns/org#"),
        ("owl", "http://www.w3.org/2002/07/owl#"),
        ("prov", "http://www.w3.org/ns/prov#"),
        ("qb", "http://purl.org/linked-data/cube#"),
        ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
        ("rdfa", "http://www.w3.org/ns/rdfa#"),
        ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
        ("rif", "http://www.w3.org/2007/rif#"),
        ("rr", "http://www.w3.org/ns/r2rml#"),
        ("sd", "http://www.w3.org/ns/sparql-service-description#"),
        ("skos", "http://www.w3.org/2004/02/skos/core#"),
        ("skosxl", "http://www.w3.org/2008/05/skos-xl#"),
        ("sosa", "http://www.w3.org/ns/sosa/"),
        ("ssn", "http://www.w3.org/ns/ssn/"),
        ("time", "http://www.w3.org/2006/time#"),
        ("void", "http://rdfs.org/ns/void#"),
        ("wdr", "http://www.w3.org/2007/05/powder#"),
        ("wdrs", "http://www.w3.org/2007/05/powder-s#"),
        ("xhv", XHV_NS),
        ("xml", "http://www.w3.org/XML/1998/namespace"),
        ("xsd", "http://www.w3.org/2001/XMLSchema#"),
        // widely used
        ("cc", "http://creativecommons.org/ns#"),
        ("ctag", "http://commontag.org/ns#"),
        ("dc", "http://purl.org/dc/terms/"),
        ("dc11", "http://purl.org/dc/elements/1.1/"),
        ("dcterms", "http://purl.org/dc/terms/"),
        ("foaf", "http://xmlns.com/foaf/0.1/"),
        ("gr", "http://purl.org/goodrelations/v1#"),
        ("ical", "http://www.w3.org/2002/12/cal/icaltzd#"),
        ("og", "http://ogp.me/ns#"),
        ("rev", "http://purl.org/stuff/rev#"),
        ("schema", "http://schema.org/"),
        ("sioc", "http://rdfs.org/sioc/ns#"),
        ("v", "http://rdf.data-vocabulary.org/#"),
        ("vcard", "http://www.w3.org/2006/vcard/ns#"),
    ]
    .into_iter()
    .map(|(prefix, iri)| (prefix.to_string(), iri.to_string()))
    .collect();

    let terms = [
        (
            "describedBy",
            "http://www.w3.org/2007/05/powder-s#describedby",
        ),
        ("license", "http://www.w3.org/1999/xhtml/vocab#license"),
        ("role", "http://www.w3.org/1999/xhtml/vocab#role"),
    ]
    .into_iter()
    .map(|(term, iri)| (term.to_string(), NamedNode::new_unchecked(iri)))
    .collect();

    Profile {
        prefixes,
        terms,
        vocabulary: None,
    }
}

fn html_profile() -> Profile {
    Profile {
        prefixes: Vec::new(),
        terms: XHTML_LINK_TYPES
            .iter()
            .map(|term| {
                (
                    term.to_string(),
                    NamedNode::new_unchecked(format!("{XHV_NS}{term}")),
                )
            })
            .collect(),
        vocabulary: None,
    }
}
