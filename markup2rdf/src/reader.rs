use std::cell::RefCell;

use oxiri::Iri;
use oxrdf::{Graph, NamedNode, Subject, Term, Triple};
use scraper::{ElementRef, Html, Selector};

use crate::context::{strip_fragment, EvaluationContext};
use crate::host::{self, HostLanguage, RdfaVersion};
use crate::processor::{MessageClass, RdfaProcessor};
use crate::profile::{
    DefaultProfileLoader, ProfileLoader, HTML_RDFA_1_1_PROFILE, RDFA_1_1_PROFILE,
};
use crate::ReaderError;

/// Construction options for [`RdfaReader`].
#[derive(Debug, Clone, Default)]
pub struct ReaderOptions {
    /// IRI for relative resolution; a base element or `xml:base` in the
    /// document overrides it.
    pub base: Option<Iri<String>>,
    /// Forces the host language instead of detecting it.
    pub host_language: Option<HostLanguage>,
    /// Forces the RDFa version instead of detecting it.
    pub version: Option<RdfaVersion>,
    /// Input byte encoding; a sniffed meta charset overrides the utf-8
    /// default.
    pub encoding: Option<String>,
    /// Fail the parse on validation errors instead of recording them.
    pub validate: bool,
    /// Canonicalise literal lexical forms and language tags.
    pub canonicalize: bool,
    /// Cache resolved IRIs so repeated occurrences are validated once.
    pub intern: bool,
    /// Seed prefix mappings, applied after the default profiles.
    pub prefixes: Vec<(String, String)>,
    /// Accumulate diagnostic records as RDF, exposed by
    /// [`RdfaReader::processor_graph`].
    pub processor_graph: bool,
    /// Keep an append-only diagnostic buffer, exposed by
    /// [`RdfaReader::debug_log`].
    pub debug: bool,
}

impl ReaderOptions {
    pub fn with_base(mut self, base: Iri<String>) -> Self {
        self.base = Some(base);
        self
    }

    pub fn with_host_language(mut self, host: HostLanguage) -> Self {
        self.host_language = Some(host);
        self
    }

    pub fn with_version(mut self, version: RdfaVersion) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    pub fn with_validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn with_canonicalize(mut self, canonicalize: bool) -> Self {
        self.canonicalize = canonicalize;
        self
    }

    pub fn with_intern(mut self, intern: bool) -> Self {
        self.intern = intern;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>, iri: impl Into<String>) -> Self {
        self.prefixes.push((prefix.into(), iri.into()));
        self
    }

    pub fn with_processor_graph(mut self, enabled: bool) -> Self {
        self.processor_graph = enabled;
        self
    }

    pub fn with_debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }
}

/// Walks a parsed document and yields the RDF statements its RDFa attributes
/// describe. One reader owns one document; every call to [`each_statement`]
/// re-walks it with fresh (and therefore stable) blank-node labels.
///
/// [`each_statement`]: RdfaReader::each_statement
pub struct RdfaReader<L = DefaultProfileLoader> {
    document: Html,
    options: ReaderOptions,
    host: HostLanguage,
    version: RdfaVersion,
    encoding: String,
    loader: L,
    processor_graph: Graph,
    debug: RefCell<Vec<String>>,
}

impl RdfaReader<DefaultProfileLoader> {
    pub fn from_str(input: &str, options: ReaderOptions) -> Result<Self, ReaderError> {
        Self::with_loader(input, None, options, DefaultProfileLoader::default())
    }

    /// Builds a reader from raw bytes, sniffing the charset from a meta
    /// declaration when none is forced. Only the utf-8 family is decoded
    /// directly; other declared encodings are decoded lossily and reported
    /// through [`encoding`] so callers can transcode upstream.
    ///
    /// [`encoding`]: RdfaReader::encoding
    pub fn from_bytes(
        bytes: &[u8],
        mime: Option<&str>,
        options: ReaderOptions,
    ) -> Result<Self, ReaderError> {
        let head = String::from_utf8_lossy(&bytes[..bytes.len().min(1000)]);
        let sniffed = options
            .encoding
            .clone()
            .or_else(|| host::detect_encoding(&head));
        let text = String::from_utf8_lossy(bytes).into_owned();
        let mut reader = Self::with_loader(&text, mime, options, DefaultProfileLoader::default())?;
        if let Some(encoding) = sniffed {
            reader.encoding = encoding;
        }
        Ok(reader)
    }
}

impl<L: ProfileLoader> RdfaReader<L> {
    /// Builds a reader with a caller-supplied profile loader; `mime` feeds
    /// host-language detection when known.
    pub fn with_loader(
        input: &str,
        mime: Option<&str>,
        options: ReaderOptions,
        loader: L,
    ) -> Result<Self, ReaderError> {
        if input.trim().is_empty() {
            return Err(ReaderError::DocumentError);
        }
        let (host, version) = host::detect(input, mime, options.host_language, options.version);
        log::debug!("detected host language {host:?}, RDFa {version:?}");
        let encoding = options
            .encoding
            .clone()
            .unwrap_or_else(|| "utf-8".to_string());
        Ok(Self {
            document: Html::parse_document(input),
            options,
            host,
            version,
            encoding,
            loader,
            processor_graph: Graph::new(),
            debug: RefCell::new(Vec::new()),
        })
    }

    pub fn host_language(&self) -> HostLanguage {
        self.host
    }

    pub fn version(&self) -> RdfaVersion {
        self.version
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// The diagnostic records of the most recent parse, populated when the
    /// `processor_graph` option is set.
    pub fn processor_graph(&self) -> &Graph {
        &self.processor_graph
    }

    /// The diagnostic lines of the most recent parse, populated when the
    /// `debug` option is set.
    pub fn debug_log(&self) -> Vec<String> {
        self.debug.borrow().clone()
    }

    /// Walks the document, handing every statement to `f` in document order.
    /// Duplicate statements are delivered as often as they occur.
    pub fn each_statement<F: FnMut(Triple)>(&mut self, mut f: F) -> Result<(), ReaderError> {
        self.walk(&mut f)
    }

    /// Like [`each_statement`], decomposed into subject, predicate, object.
    ///
    /// [`each_statement`]: RdfaReader::each_statement
    pub fn each_triple<F: FnMut(Subject, NamedNode, Term)>(
        &mut self,
        mut f: F,
    ) -> Result<(), ReaderError> {
        self.walk(&mut |triple: Triple| f(triple.subject, triple.predicate, triple.object))
    }

    fn walk(&mut self, sink: &mut dyn FnMut(Triple)) -> Result<(), ReaderError> {
        self.processor_graph = Graph::new();
        self.debug.borrow_mut().clear();

        // the content root anchors both base discovery and the traversal's
        // document-root checks; for XML hosts it sits beneath the synthetic
        // wrappers, not at the DOM root
        let content_root = if self.host.has_head_body() {
            self.document.root_element()
        } else {
            effective_root(&self.document).unwrap_or_else(|| self.document.root_element())
        };
        let root_id = content_root.id();

        // the document may override the caller's base: an (X)HTML base
        // element, or xml:base on the content root of an XML host
        let mut base = self.options.base.clone();
        if self.host.has_head_body() {
            let selector = Selector::parse("html>head>base").unwrap();
            if let Some(href) = self
                .document
                .select(&selector)
                .next()
                .and_then(|el| el.value().attr("href"))
            {
                match Iri::parse(href.trim().to_string()) {
                    Ok(iri) => base = Some(iri),
                    Err(source) => {
                        if self.options.validate {
                            return Err(ReaderError::IriParseError {
                                source,
                                iri: href.to_string(),
                            });
                        }
                        log::warn!("ignoring unparsable base href <{href}>: {source}");
                    }
                }
            }
        } else if let Some(xml_base) = crate::processor::xml_attr(content_root.value(), "base") {
            let resolved = match &base {
                Some(existing) => existing.resolve(xml_base.trim()),
                None => Iri::parse(xml_base.trim().to_string()),
            };
            match resolved {
                Ok(iri) => base = Some(iri),
                Err(e) => log::warn!("ignoring unparsable xml:base <{xml_base}>: {e}"),
            }
        }
        let base = base.map(strip_fragment);

        let (host, version) = (self.host, self.version);
        let RdfaReader {
            document,
            options,
            loader,
            processor_graph,
            debug,
            ..
        } = self;

        let mut context = EvaluationContext::new(base.clone(), version);

        // 1.1 seeds its context from the default profiles; the loader must
        // never be pointed back at the document being parsed
        let mut profile_failures = Vec::new();
        if version == RdfaVersion::V1_1 {
            let mut profile_iris = vec![RDFA_1_1_PROFILE];
            if host.has_head_body() {
                profile_iris.push(HTML_RDFA_1_1_PROFILE);
            }
            for profile_iri in profile_iris {
                let Ok(iri) = Iri::parse(profile_iri.to_string()) else {
                    continue;
                };
                if base.as_ref().is_some_and(|b| b.as_str() == iri.as_str()) {
                    profile_failures.push((
                        profile_iri,
                        crate::ProfileError::SelfReference(profile_iri.to_string()),
                    ));
                    continue;
                }
                match loader.find_profile(&iri) {
                    Ok(profile) => {
                        for (prefix, mapped) in &profile.prefixes {
                            context.seed_prefix(prefix, mapped, version);
                        }
                        for (term, mapped) in &profile.terms {
                            context.seed_term(term, mapped.clone());
                        }
                        if let Some(vocabulary) = profile.vocabulary {
                            context.default_vocabulary = Some(vocabulary);
                        }
                    }
                    Err(e) => profile_failures.push((profile_iri, e)),
                }
            }
        }

        // user-seeded prefixes win over profile data
        for (prefix, iri) in &options.prefixes {
            context.seed_prefix(prefix, iri, version);
        }

        let processor = RdfaProcessor::new(
            sink,
            options.processor_graph.then_some(&mut *processor_graph),
            options.debug.then_some(&*debug),
            base,
            host,
            version,
            options.canonicalize,
            options.intern,
            root_id,
        );

        for (profile_iri, error) in profile_failures {
            if options.validate {
                return Err(ReaderError::ProfileReferenceError(error));
            }
            processor.report_document(
                MessageClass::ProfileReferenceError,
                &format!("continuing without profile <{profile_iri}>: {error}"),
            );
        }

        processor.run(context, document.root_element());
        Ok(())
    }
}

/// The element a standalone XML or SVG document is rooted at. The lenient
/// tree builder wraps foreign content in html/head/body, so the effective
/// root is found beneath those wrappers when present. It supplies the
/// `xml:base` lookup and the traversal's document-root identity, keeping the
/// two in agreement.
fn effective_root(document: &Html) -> Option<ElementRef> {
    let root = document.root_element();
    if root.value().name() != "html" {
        return Some(root);
    }
    for child in root.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "head" | "body" => {
                if let Some(inner) = child.children().filter_map(ElementRef::wrap).next() {
                    return Some(inner);
                }
            }
            _ => return Some(child),
        }
    }
    None
}
