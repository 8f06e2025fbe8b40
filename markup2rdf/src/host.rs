use oxrdf::NamedNode;

/// The markup language carrying the RDFa attributes. Affects base handling
/// (`<base href>` vs `xml:base`), the `lang` attribute, and the head/body
/// subject fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostLanguage {
    Xml1,
    Xhtml1,
    Xhtml5,
    Html4,
    Html5,
    Svg,
}

impl HostLanguage {
    /// Hosts with an (X)HTML document structure: `html>head>base` supplies the
    /// base IRI, `head`/`body` inherit the base as subject, and the plain
    /// `lang` attribute is honoured alongside `xml:lang`.
    pub fn has_head_body(self) -> bool {
        matches!(
            self,
            HostLanguage::Xhtml1 | HostLanguage::Xhtml5 | HostLanguage::Html4 | HostLanguage::Html5
        )
    }

    /// The host-defined default vocabulary, restored by an empty `@vocab`.
    /// No host currently defines one.
    pub fn default_vocabulary(self) -> Option<NamedNode> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RdfaVersion {
    V1_0,
    #[default]
    V1_1,
}

/// Infers host language and RDFa version from the first ~1000 bytes of the
/// document plus an optional MIME type. Explicit overrides win; otherwise the
/// version marker is taken from the doctype or a root `version` attribute and
/// the host from MIME/doctype/root element, falling back to generic XML.
pub(crate) fn detect(
    head: &str,
    mime: Option<&str>,
    host_override: Option<HostLanguage>,
    version_override: Option<RdfaVersion>,
) -> (HostLanguage, RdfaVersion) {
    let head: String = head.chars().take(1000).collect::<String>().to_lowercase();

    let version = version_override.unwrap_or(if head.contains("rdfa 1.0") {
        RdfaVersion::V1_0
    } else {
        RdfaVersion::V1_1
    });

    let host = host_override.unwrap_or_else(|| detect_host(&head, mime));

    (host, version)
}

fn detect_host(head: &str, mime: Option<&str>) -> HostLanguage {
    let doctype = doctype_of(head);

    match mime.map(|m| m.split(';').next().unwrap_or(m).trim()) {
        Some("application/xml") => HostLanguage::Xml1,
        Some("image/svg+xml") => HostLanguage::Svg,
        Some("text/html") => match doctype {
            Some(d) if d.contains("html 4") => HostLanguage::Html4,
            Some(d) if d.contains("xhtml") => HostLanguage::Xhtml1,
            _ => HostLanguage::Html5,
        },
        Some("application/xhtml+xml") => match doctype {
            Some(d) if d.contains("html 4") => HostLanguage::Html4,
            Some(d) if d.contains("xhtml") => HostLanguage::Xhtml1,
            _ => HostLanguage::Xhtml5,
        },
        _ => match (doctype, root_element_of(head)) {
            (_, Some("svg")) => HostLanguage::Svg,
            (Some(d), _) if d.contains("svg") => HostLanguage::Svg,
            (Some(d), _) if d.contains("html 4") => HostLanguage::Html4,
            (Some(d), _) if d.contains("xhtml") => HostLanguage::Xhtml1,
            (Some(d), _) if d.contains("html") => HostLanguage::Html5,
            (None, Some("html")) => HostLanguage::Html5,
            _ => HostLanguage::Xml1,
        },
    }
}

/// The lower-cased doctype content, if the head of the document carries one.
fn doctype_of(head: &str) -> Option<&str> {
    let start = head.find("<!doctype")?;
    let rest = &head[start + "<!doctype".len()..];
    let end = rest.find('>')?;
    Some(rest[..end].trim())
}

/// The name of the first real element in the document head.
fn root_element_of(head: &str) -> Option<&str> {
    let mut rest = head;
    while let Some(start) = rest.find('<') {
        rest = &rest[start + 1..];
        // skip doctype, comments, processing instructions
        if rest.starts_with('!') || rest.starts_with('?') || rest.starts_with('/') {
            continue;
        }
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(rest.len());
        let name = &rest[..end];
        if !name.is_empty() {
            // foreign prefixes do not matter for sniffing
            return Some(name.rsplit(':').next().unwrap_or(name));
        }
    }
    None
}

/// Scans for a `charset=` declaration (`meta charset` or an http-equiv
/// content-type) in the head of the document.
pub(crate) fn detect_encoding(head: &str) -> Option<String> {
    let head: String = head.chars().take(1000).collect::<String>().to_lowercase();
    let at = head.find("charset=")?;
    let rest = head[at + "charset=".len()..].trim_start_matches(['"', '\'']);
    let end = rest
        .find(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | ';' | '>' | '/'))
        .unwrap_or(rest.len());
    let charset = rest[..end].trim();
    (!charset.is_empty()).then(|| charset.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_overrides_win() {
        let (host, version) = detect(
            "<!DOCTYPE html>",
            Some("text/html"),
            Some(HostLanguage::Svg),
            Some(RdfaVersion::V1_0),
        );
        assert_eq!(host, HostLanguage::Svg);
        assert_eq!(version, RdfaVersion::V1_0);
    }

    #[test]
    fn version_from_doctype() {
        let head = r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML+RDFa 1.0//EN"
            "http://www.w3.org/MarkUp/DTD/xhtml-rdfa-1.dtd">"#;
        let (host, version) = detect(head, None, None, None);
        assert_eq!(version, RdfaVersion::V1_0);
        assert_eq!(host, HostLanguage::Xhtml1);
    }

    #[test]
    fn version_defaults_to_1_1() {
        let (_, version) = detect("<!DOCTYPE html><html>", None, None, None);
        assert_eq!(version, RdfaVersion::V1_1);
    }

    #[test]
    fn host_from_mime() {
        assert_eq!(
            detect("<x/>", Some("application/xml"), None, None).0,
            HostLanguage::Xml1
        );
        assert_eq!(
            detect("<svg/>", Some("image/svg+xml"), None, None).0,
            HostLanguage::Svg
        );
        assert_eq!(
            detect("<!doctype html><html>", Some("text/html"), None, None).0,
            HostLanguage::Html5
        );
        assert_eq!(
            detect(
                r#"<!DOCTYPE html PUBLIC "-//W3C//DTD HTML 4.01//EN">"#,
                Some("text/html"),
                None,
                None
            )
            .0,
            HostLanguage::Html4
        );
        assert_eq!(
            detect("<!doctype html><html>", Some("application/xhtml+xml"), None, None).0,
            HostLanguage::Xhtml5
        );
    }

    #[test]
    fn host_sniffed_without_mime() {
        assert_eq!(detect("<svg xmlns=\"...\">", None, None, None).0, HostLanguage::Svg);
        assert_eq!(detect("<html lang=\"en\">", None, None, None).0, HostLanguage::Html5);
        assert_eq!(detect("<unknown/>", None, None, None).0, HostLanguage::Xml1);
        assert_eq!(
            detect("<!-- note --><?pi?><rdf:RDF/>", None, None, None).0,
            HostLanguage::Xml1
        );
    }

    #[test]
    fn charset_sniffing() {
        assert_eq!(
            detect_encoding(r#"<meta charset="utf-8">"#).as_deref(),
            Some("utf-8")
        );
        assert_eq!(
            detect_encoding(
                r#"<meta http-equiv="Content-Type" content="text/html; charset=ISO-8859-1">"#
            )
            .as_deref(),
            Some("iso-8859-1")
        );
        assert_eq!(detect_encoding("<html>"), None);
    }
}
