//! Minimal namespace-aware XML text extraction.
//!
//! The discovery envelopes are tiny and predictable, so a full XML stack is
//! not warranted; this extractor pulls the text of elements by local name
//! within a known namespace set, tolerating unknown elements, arbitrary
//! ordering, attributes, comments, and self-closing forms. It is lenient by
//! construction: anything it cannot understand it skips, which also keeps
//! malformed neighbours on the multicast group from wedging discovery.

/// Returns the text of the first matching element. An empty `namespaces`
/// slice matches any namespace.
pub(crate) fn extract_text(xml: &str, namespaces: &[&str], local: &str) -> Option<String> {
    extract_all_text(xml, namespaces, local).into_iter().next()
}

/// Returns the text of every matching element, in document order.
pub(crate) fn extract_all_text(xml: &str, namespaces: &[&str], local: &str) -> Vec<String> {
    let mut found = Vec::new();
    // Each open element contributes one scope frame of xmlns bindings.
    let mut scopes: Vec<Vec<(String, String)>> = Vec::new();
    let mut rest = xml;

    while let Some(open) = rest.find('<') {
        rest = &rest[open..];
        if let Some(skipped) = skip_non_element(rest) {
            rest = skipped;
            continue;
        }
        if let Some(after) = rest.strip_prefix("</") {
            scopes.pop();
            rest = after
                .find('>')
                .map(|i| &after[i + 1..])
                .unwrap_or("");
            continue;
        }

        let Some((tag_body, after_tag)) = read_tag(&rest[1..]) else {
            break;
        };
        let self_closing = tag_body.ends_with('/');
        let tag_body = tag_body.trim_end_matches('/');

        let qname = tag_body
            .split([' ', '\t', '\r', '\n'])
            .next()
            .unwrap_or_default();
        scopes.push(xmlns_bindings(tag_body));

        let (prefix, local_part) = match qname.split_once(':') {
            Some((p, l)) => (p, l),
            None => ("", qname),
        };
        let uri = resolve(&scopes, prefix);
        if local_part == local && (namespaces.is_empty() || namespaces.contains(&uri)) {
            if self_closing {
                found.push(String::new());
            } else {
                let text = after_tag
                    .find('<')
                    .map(|i| &after_tag[..i])
                    .unwrap_or(after_tag);
                found.push(text.trim().to_string());
            }
        }

        if self_closing {
            scopes.pop();
        }
        rest = after_tag;
    }
    found
}

/// Skips comments, processing instructions, and declarations. Returns the
/// remainder after the construct, or `None` if `rest` starts an element.
fn skip_non_element(rest: &str) -> Option<&str> {
    for (open, close) in [("<!--", "-->"), ("<?", "?>"), ("<!", ">")] {
        if rest.starts_with(open) {
            return Some(
                rest[open.len()..]
                    .find(close)
                    .map(|i| &rest[open.len() + i + close.len()..])
                    .unwrap_or(""),
            );
        }
    }
    None
}

/// Reads a start tag's body (between `<` and the matching `>`), honouring
/// quotes around attribute values.
fn read_tag(after_open: &str) -> Option<(&str, &str)> {
    let mut quote: Option<char> = None;
    for (i, c) in after_open.char_indices() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Some((&after_open[..i], &after_open[i + 1..])),
            (None, _) => {}
        }
    }
    None
}

/// Extracts `xmlns` and `xmlns:prefix` bindings from a tag body.
fn xmlns_bindings(tag_body: &str) -> Vec<(String, String)> {
    let mut bindings = Vec::new();
    let mut rest = tag_body;
    while let Some(eq) = rest.find('=') {
        let name = rest[..eq]
            .rsplit([' ', '\t', '\r', '\n'])
            .next()
            .unwrap_or_default()
            .trim();
        let after = rest[eq + 1..].trim_start();
        let Some(q) = after.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            rest = &rest[eq + 1..];
            continue;
        };
        let Some(end) = after[1..].find(q) else { break };
        let value = &after[1..1 + end];

        if name == "xmlns" {
            bindings.push((String::new(), value.to_string()));
        } else if let Some(prefix) = name.strip_prefix("xmlns:") {
            bindings.push((prefix.to_string(), value.to_string()));
        }
        rest = &after[1 + end + 1..];
    }
    bindings
}

/// Resolves a prefix against the scope stack, innermost first.
fn resolve<'a>(scopes: &'a [Vec<(String, String)>], prefix: &str) -> &'a str {
    for frame in scopes.iter().rev() {
        for (p, uri) in frame.iter().rev() {
            if p == prefix {
                return uri;
            }
        }
    }
    ""
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENVELOPE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:soap="http://www.w3.org/2003/05/soap-envelope"
               xmlns:wsa="http://schemas.xmlsoap.org/ws/2004/08/addressing"
               xmlns:wsd="http://schemas.xmlsoap.org/ws/2005/04/discovery">
  <soap:Header>
    <!-- relates the answer to our probe -->
    <wsa:RelatesTo>urn:uuid:1234</wsa:RelatesTo>
    <wsa:MessageID>urn:uuid:abcd</wsa:MessageID>
  </soap:Header>
  <soap:Body>
    <wsd:ProbeMatches>
      <wsd:ProbeMatch>
        <wsd:XAddrs>http://192.168.1.7:5357/dpws http://[fe80::1]:5357/dpws</wsd:XAddrs>
      </wsd:ProbeMatch>
    </wsd:ProbeMatches>
  </soap:Body>
</soap:Envelope>"#;

    const WSA: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing";
    const WSD: &str = "http://schemas.xmlsoap.org/ws/2005/04/discovery";

    #[test]
    fn extracts_namespaced_text() {
        assert_eq!(
            extract_text(ENVELOPE, &[WSA], "RelatesTo").as_deref(),
            Some("urn:uuid:1234")
        );
        assert_eq!(
            extract_text(ENVELOPE, &[WSD], "XAddrs").as_deref(),
            Some("http://192.168.1.7:5357/dpws http://[fe80::1]:5357/dpws")
        );
    }

    #[test]
    fn rejects_wrong_namespace() {
        assert_eq!(extract_text(ENVELOPE, &[WSD], "RelatesTo"), None);
    }

    #[test]
    fn any_namespace_when_unconstrained() {
        assert_eq!(
            extract_text(ENVELOPE, &[], "MessageID").as_deref(),
            Some("urn:uuid:abcd")
        );
    }

    #[test]
    fn default_namespace_binding() {
        let xml = r#"<a xmlns="urn:x"><b>hello</b></a>"#;
        assert_eq!(extract_text(xml, &["urn:x"], "b").as_deref(), Some("hello"));
        assert_eq!(extract_text(xml, &["urn:y"], "b"), None);
    }

    #[test]
    fn inner_binding_shadows_outer() {
        let xml = r#"<a xmlns:n="urn:outer"><n:b xmlns:n="urn:inner">x</n:b></a>
                     <n:c xmlns:n="urn:outer">y</n:c>"#;
        assert_eq!(extract_text(xml, &["urn:inner"], "b").as_deref(), Some("x"));
        assert_eq!(extract_text(xml, &["urn:outer"], "b"), None);
    }

    #[test]
    fn tolerates_junk_and_self_closing() {
        let xml = r#"<!-- hi --><?pi bye?><a xmlns="urn:x" attr=">quoted<">
            <unknown/><b/></a>"#;
        assert_eq!(extract_text(xml, &["urn:x"], "b").as_deref(), Some(""));
        assert_eq!(extract_text(xml, &["urn:x"], "missing"), None);
    }

    #[test]
    fn multiple_matches_in_order() {
        let xml = r#"<m xmlns="u"><x>1</x><x>2</x></m>"#;
        assert_eq!(extract_all_text(xml, &["u"], "x"), vec!["1", "2"]);
    }
}
