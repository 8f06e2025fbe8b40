use std::borrow::Cow;
use std::collections::BTreeMap;

use icu::locale::LanguageIdentifier;
use itertools::Itertools;
use oxrdf::vocab::rdf;
use oxrdf::{Literal, NamedOrBlankNode};
use scraper::ElementRef;

use crate::host::RdfaVersion;
use crate::processor::{Attr, MessageClass};

pub(crate) struct BuiltLiteral {
    pub literal: Literal,
    /// 1.0 XML literals serialise their descendants instead of walking them.
    pub recurse: bool,
}

/// Chooses between plain, typed, and XML literal forms for a @property
/// element, from the resolved @datatype, the @content override, and the
/// in-scope language.
pub(crate) fn build_literal(
    element: ElementRef,
    content: Option<&str>,
    datatype: &Attr<NamedOrBlankNode>,
    language: Option<&LanguageIdentifier>,
    namespaces: &BTreeMap<String, String>,
    version: RdfaVersion,
    report: &dyn Fn(MessageClass, String),
) -> BuiltLiteral {
    let lexical = || -> Cow<str> {
        match content {
            Some(content) => Cow::Borrowed(content),
            None => Cow::Owned(element.text().join("")),
        }
    };
    let plain = || -> BuiltLiteral {
        BuiltLiteral {
            literal: plain_literal(&lexical(), language),
            recurse: true,
        }
    };
    let xml = |recurse: bool| -> BuiltLiteral {
        BuiltLiteral {
            literal: Literal::new_typed_literal(
                serialize_children(element, namespaces),
                rdf::XML_LITERAL.into_owned(),
            ),
            recurse,
        }
    };

    match datatype {
        Attr::Value(NamedOrBlankNode::NamedNode(dt)) if dt.as_str() != rdf::XML_LITERAL.as_str() => {
            BuiltLiteral {
                literal: Literal::new_typed_literal(lexical(), dt.clone()),
                recurse: true,
            }
        }
        Attr::Value(NamedOrBlankNode::NamedNode(_)) => match version {
            RdfaVersion::V1_1 => xml(true),
            RdfaVersion::V1_0 => v1_0_literal(element, content, plain, xml),
        },
        Attr::Value(NamedOrBlankNode::BlankNode(node)) => {
            report(
                MessageClass::Error,
                format!("@datatype cannot name a blank node: [{node}]"),
            );
            plain()
        }
        // an empty (or unresolvable) @datatype forces a plain literal
        Attr::Empty => plain(),
        Attr::Missing => match version {
            RdfaVersion::V1_1 => plain(),
            RdfaVersion::V1_0 => v1_0_literal(element, content, plain, xml),
        },
    }
}

// Without a 1.1 datatype the 1.0 rules look at the element's content: markup
// children make an XML literal and suppress descent, anything else is plain.
fn v1_0_literal(
    element: ElementRef,
    content: Option<&str>,
    plain: impl Fn() -> BuiltLiteral,
    xml: impl Fn(bool) -> BuiltLiteral,
) -> BuiltLiteral {
    let only_text = element
        .children()
        .all(|child| !child.value().is_element());
    if content.is_some() || only_text {
        plain()
    } else {
        xml(false)
    }
}

fn plain_literal(value: &str, language: Option<&LanguageIdentifier>) -> Literal {
    match language {
        Some(language) => {
            Literal::new_language_tagged_literal_unchecked(value, language.to_string())
        }
        None => Literal::new_simple_literal(value),
    }
}

/// The xmlns declarations carried directly on an element. The HTML tree
/// builder surfaces them either as `xmlns`-prefixed qualified names or as
/// plain attributes whose local name is `xmlns`/`xmlns:p`, depending on
/// content type, so both shapes are recognised.
pub(crate) fn xmlns_declarations(el: &scraper::node::Element) -> Vec<(Option<String>, String)> {
    let mut declarations = Vec::new();
    for (name, value) in el.attrs.iter() {
        let local = name.local.as_ref();
        if name.prefix.as_deref() == Some("xmlns") {
            declarations.push((Some(local.to_string()), value.to_string()));
        } else if name.prefix.is_none() {
            if local == "xmlns" {
                declarations.push((None, value.to_string()));
            } else if let Some(prefix) = local.strip_prefix("xmlns:") {
                if !prefix.is_empty() {
                    declarations.push((Some(prefix.to_string()), value.to_string()));
                }
            }
        }
    }
    declarations
}

/// Serialises the element's inner markup, materialising the in-scope xmlns
/// declarations onto each top-level child element unless the child
/// redeclares the prefix itself.
pub(crate) fn serialize_children(
    element: ElementRef,
    namespaces: &BTreeMap<String, String>,
) -> String {
    let mut out = String::new();
    for child in element.children() {
        write_node(&mut out, child, Some(namespaces));
    }
    out
}

fn write_node(
    out: &mut String,
    node: ego_tree::NodeRef<scraper::Node>,
    inherited: Option<&BTreeMap<String, String>>,
) {
    match node.value() {
        scraper::Node::Text(text) => escape_text(out, &text),
        scraper::Node::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(&comment);
            out.push_str("-->");
        }
        scraper::Node::Element(el) => {
            out.push('<');
            out.push_str(el.name());
            for (name, value) in el.attrs.iter() {
                out.push(' ');
                if let Some(prefix) = &name.prefix {
                    out.push_str(prefix);
                    out.push(':');
                }
                out.push_str(&name.local);
                out.push_str("=\"");
                escape_attr(out, value);
                out.push('"');
            }
            if let Some(namespaces) = inherited {
                let declared = xmlns_declarations(&el);
                for (prefix, iri) in namespaces {
                    let redeclared = declared.iter().any(|(p, _)| match p {
                        Some(p) => p == prefix,
                        None => prefix.is_empty(),
                    });
                    if redeclared {
                        continue;
                    }
                    out.push(' ');
                    out.push_str("xmlns");
                    if !prefix.is_empty() {
                        out.push(':');
                        out.push_str(prefix);
                    }
                    out.push_str("=\"");
                    escape_attr(out, iri);
                    out.push('"');
                }
            }
            if node.has_children() {
                out.push('>');
                for child in node.children() {
                    write_node(out, child, None);
                }
                out.push_str("</");
                out.push_str(el.name());
                out.push('>');
            } else {
                out.push_str("/>");
            }
        }
        _ => {}
    }
}

fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

fn escape_attr(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};
    use std::str::FromStr;

    fn span_of(html: &str) -> (Html, Selector) {
        (Html::parse_document(html), Selector::parse("span").unwrap())
    }

    fn build(
        html: &str,
        content: Option<&str>,
        datatype: &Attr<NamedOrBlankNode>,
        language: Option<&str>,
        version: RdfaVersion,
    ) -> BuiltLiteral {
        let (doc, sel) = span_of(html);
        let element = doc.select(&sel).next().unwrap();
        let language = language.map(|l| LanguageIdentifier::from_str(l).unwrap());
        build_literal(
            element,
            content,
            datatype,
            language.as_ref(),
            &BTreeMap::new(),
            version,
            &|_, _| panic!("unexpected report"),
        )
    }

    #[test]
    fn plain_literal_from_text() {
        let built = build(
            "<span>hello</span>",
            None,
            &Attr::Missing,
            None,
            RdfaVersion::V1_1,
        );
        assert_eq!(built.literal, Literal::new_simple_literal("hello"));
        assert!(built.recurse);
    }

    #[test]
    fn content_overrides_text() {
        let built = build(
            "<span>ignored</span>",
            Some("used"),
            &Attr::Missing,
            Some("en"),
            RdfaVersion::V1_1,
        );
        assert_eq!(
            built.literal,
            Literal::new_language_tagged_literal_unchecked("used", "en")
        );
    }

    #[test]
    fn typed_literal() {
        let dt = Attr::Value(NamedOrBlankNode::from(oxrdf::NamedNode::new_unchecked(
            "http://www.w3.org/2001/XMLSchema#integer",
        )));
        let built = build("<span>42</span>", None, &dt, None, RdfaVersion::V1_1);
        assert_eq!(
            built.literal,
            Literal::new_typed_literal(
                "42",
                oxrdf::NamedNode::new_unchecked("http://www.w3.org/2001/XMLSchema#integer")
            )
        );
    }

    #[test]
    fn empty_datatype_is_plain() {
        let built = build(
            "<span>x <em>y</em></span>",
            None,
            &Attr::Empty,
            None,
            RdfaVersion::V1_0,
        );
        assert_eq!(built.literal, Literal::new_simple_literal("x y"));
        assert!(built.recurse);
    }

    #[test]
    fn markup_children_make_a_1_0_xml_literal() {
        let built = build(
            "<span>hello <em>world</em></span>",
            None,
            &Attr::Missing,
            None,
            RdfaVersion::V1_0,
        );
        assert_eq!(built.literal.datatype(), rdf::XML_LITERAL);
        assert_eq!(built.literal.value(), "hello <em>world</em>");
        assert!(!built.recurse);
    }

    #[test]
    fn version_1_1_flattens_markup_to_text() {
        let built = build(
            "<span>hello <em>world</em></span>",
            None,
            &Attr::Missing,
            None,
            RdfaVersion::V1_1,
        );
        assert_eq!(built.literal, Literal::new_simple_literal("hello world"));
        assert!(built.recurse);
    }

    #[test]
    fn explicit_xml_literal_keeps_descent_in_1_1() {
        let dt = Attr::Value(NamedOrBlankNode::from(rdf::XML_LITERAL.into_owned()));
        let built = build(
            "<span>a <em>b</em></span>",
            None,
            &dt,
            None,
            RdfaVersion::V1_1,
        );
        assert_eq!(built.literal.datatype(), rdf::XML_LITERAL);
        assert!(built.recurse);
    }

    #[test]
    fn xml_literal_materialises_inherited_namespaces() {
        let (doc, sel) = span_of("<span><ex:note>n</ex:note> <b xmlns:ex=\"http://o/\">m</b></span>");
        let element = doc.select(&sel).next().unwrap();
        let mut namespaces = BTreeMap::new();
        namespaces.insert("ex".to_string(), "http://e/".to_string());
        let serialized = serialize_children(element, &namespaces);
        assert_eq!(
            serialized,
            "<ex:note xmlns:ex=\"http://e/\">n</ex:note> <b xmlns:ex=\"http://o/\">m</b>"
        );
    }

    #[test]
    fn text_is_escaped() {
        let (doc, sel) = span_of("<span>a &amp; b</span>");
        let element = doc.select(&sel).next().unwrap();
        assert_eq!(serialize_children(element, &BTreeMap::new()), "a &amp; b");
    }
}
