//! HTML attribute rewriting over the parsed document tree.
//!
//! One pass per attribute kind: `href`, `src`, `srcset`, inline `style`, and
//! `poster`. Every successfully rewritten element gets the rewrite marker so
//! a later pass can tell it has already been processed; per-element failures
//! leave that attribute untouched and never abort the document.

use std::collections::HashSet;

use ego_tree::NodeId;

use crate::proxy::css;
use crate::proxy::dom::Document;
use crate::proxy::uri::{self, RewriteContext};

/// Marker attribute set on every element the proxy has rewritten.
pub const REWRITE_MARKER: &str = "data-bypass-modified";

/// Attribute-level rewriter for parsed HTML documents.
pub struct HtmlRewriter<'a> {
    ctx: &'a RewriteContext,
    strip_integrity: bool,
}

impl<'a> HtmlRewriter<'a> {
    pub fn new(ctx: &'a RewriteContext, strip_integrity: bool) -> Self {
        Self { ctx, strip_integrity }
    }

    /// Rewrite link attributes in place.
    pub fn rewrite(&self, doc: &mut Document) {
        // Elements marked by an earlier run keep their already-routed URLs.
        let marked: HashSet<NodeId> =
            doc.elements_with_attribute(REWRITE_MARKER).into_iter().collect();

        self.rewrite_plain(doc, "href", &marked, true);
        self.rewrite_plain(doc, "src", &marked, false);
        self.rewrite_srcset(doc, &marked);
        self.rewrite_inline_style(doc, &marked);
        self.rewrite_plain(doc, "poster", &marked, false);

        // Rewriting invalidates any subresource-integrity hash.
        if self.strip_integrity {
            for id in doc.elements_with_attribute("integrity") {
                doc.remove_attribute(id, "integrity");
            }
        }
    }

    fn rewrite_plain(&self, doc: &mut Document, attr: &str, marked: &HashSet<NodeId>, skip_svg: bool) {
        for id in doc.elements_with_attribute(attr) {
            if marked.contains(&id) {
                continue;
            }
            // hrefs mean something else inside SVGs
            if skip_svg && doc.has_svg_ancestor(id) {
                continue;
            }
            let Some(value) = doc.attribute(id, attr) else {
                continue;
            };
            match uri::rewrite(&value, self.ctx) {
                Ok(routed) => {
                    doc.set_attribute(id, attr, &routed);
                    doc.set_attribute(id, REWRITE_MARKER, "true");
                }
                Err(err) => {
                    tracing::debug!(attr, value, error = %err, "leaving attribute unrewritten");
                }
            }
        }
    }

    fn rewrite_srcset(&self, doc: &mut Document, marked: &HashSet<NodeId>) {
        for id in doc.elements_with_attribute("srcset") {
            if marked.contains(&id) {
                continue;
            }
            let Some(original) = doc.attribute(id, "srcset") else {
                continue;
            };
            let mut replaced = original.clone();
            let mut touched = false;
            for candidate in parse_srcset(&original) {
                if let Ok(routed) = uri::rewrite(candidate.url, self.ctx) {
                    replaced = replaced.replacen(candidate.url, &routed, 1);
                    touched = true;
                }
            }
            if touched {
                doc.set_attribute(id, "srcset", &replaced);
                doc.set_attribute(id, REWRITE_MARKER, "true");
            }
        }
    }

    fn rewrite_inline_style(&self, doc: &mut Document, marked: &HashSet<NodeId>) {
        for id in doc.elements_with_attribute("style") {
            if marked.contains(&id) {
                continue;
            }
            let Some(style) = doc.attribute(id, "style") else {
                continue;
            };
            let replaced = css::rewrite_urls(&style, self.ctx);
            if replaced != style {
                doc.set_attribute(id, "style", &replaced);
                doc.set_attribute(id, REWRITE_MARKER, "true");
            }
        }
    }
}

/// One entry of a `srcset` attribute: a URL plus its optional width or
/// density descriptor.
#[derive(Debug, PartialEq, Eq)]
pub struct SrcsetCandidate<'a> {
    pub url: &'a str,
    pub descriptor: Option<&'a str>,
}

/// Split a `srcset` value into candidates. Candidates are comma separated;
/// within one, the URL comes first and the descriptor after whitespace.
pub fn parse_srcset(value: &str) -> Vec<SrcsetCandidate<'_>> {
    value
        .split(',')
        .filter_map(|chunk| {
            let chunk = chunk.trim();
            if chunk.is_empty() {
                return None;
            }
            match chunk.split_once(|c: char| c.is_ascii_whitespace()) {
                Some((url, rest)) => Some(SrcsetCandidate {
                    url,
                    descriptor: Some(rest.trim()).filter(|d| !d.is_empty()),
                }),
                None => Some(SrcsetCandidate { url: chunk, descriptor: None }),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use url::Url;

    fn ctx() -> RewriteContext {
        RewriteContext {
            base: Url::parse("http://example.com/").unwrap(),
            external: Url::parse("http://proxy.test").unwrap(),
        }
    }

    fn decoded_target(routed: &str) -> String {
        let routed = Url::parse(routed).unwrap();
        let token = routed.query_pairs().find(|(k, _)| k == "u").unwrap().1.into_owned();
        String::from_utf8(BASE64.decode(token.as_bytes()).unwrap()).unwrap()
    }

    #[test]
    fn rewrites_href_and_sets_marker() {
        let mut doc = Document::parse(r#"<html><body><a href="/x">l</a></body></html>"#);
        HtmlRewriter::new(&ctx(), false).rewrite(&mut doc);

        let id = doc.elements_with_attribute("href")[0];
        let href = doc.attribute(id, "href").unwrap();
        assert_eq!(decoded_target(&href), "http://example.com/x");
        assert_eq!(doc.attribute(id, REWRITE_MARKER).as_deref(), Some("true"));
    }

    #[test]
    fn skips_hrefs_inside_svg() {
        let mut doc = Document::parse(
            r##"<html><body><svg><a href="#pt">s</a></svg><a href="/x">l</a></body></html>"##,
        );
        HtmlRewriter::new(&ctx(), false).rewrite(&mut doc);

        let ids = doc.elements_with_attribute("href");
        assert_eq!(doc.attribute(ids[0], "href").as_deref(), Some("#pt"));
        assert!(doc.attribute(ids[1], "href").unwrap().contains("/p/?u="));
    }

    #[test]
    fn rewrites_each_srcset_candidate_preserving_descriptors() {
        let mut doc = Document::parse(
            r#"<html><body><img srcset="/a.png 1x, /b.png 2x"></body></html>"#,
        );
        HtmlRewriter::new(&ctx(), false).rewrite(&mut doc);

        let id = doc.elements_with_attribute("srcset")[0];
        let srcset = doc.attribute(id, "srcset").unwrap();
        let candidates = parse_srcset(&srcset);
        assert_eq!(candidates.len(), 2);
        assert_eq!(decoded_target(candidates[0].url), "http://example.com/a.png");
        assert_eq!(candidates[0].descriptor, Some("1x"));
        assert_eq!(decoded_target(candidates[1].url), "http://example.com/b.png");
        assert_eq!(candidates[1].descriptor, Some("2x"));
    }

    #[test]
    fn rewrites_inline_style_urls() {
        let mut doc = Document::parse(
            r#"<html><body><div style="background:url('/bg.png')">x</div></body></html>"#,
        );
        HtmlRewriter::new(&ctx(), false).rewrite(&mut doc);

        let id = doc.elements_with_attribute("style")[0];
        let style = doc.attribute(id, "style").unwrap();
        assert!(style.contains("url('http://proxy.test/p/?u="), "{style}");
        assert_eq!(doc.attribute(id, REWRITE_MARKER).as_deref(), Some("true"));
    }

    #[test]
    fn strips_integrity_when_requested() {
        let html = r#"<html><head><script src="/s.js" integrity="sha384-abc"></script></head></html>"#;

        let mut doc = Document::parse(html);
        HtmlRewriter::new(&ctx(), true).rewrite(&mut doc);
        assert!(doc.elements_with_attribute("integrity").is_empty());

        let mut doc = Document::parse(html);
        HtmlRewriter::new(&ctx(), false).rewrite(&mut doc);
        assert_eq!(doc.elements_with_attribute("integrity").len(), 1);
    }

    #[test]
    fn second_run_does_not_change_marked_attributes() {
        let mut doc = Document::parse(r#"<html><body><a href="/x">l</a></body></html>"#);
        let ctx = ctx();
        let rewriter = HtmlRewriter::new(&ctx, false);
        rewriter.rewrite(&mut doc);

        let id = doc.elements_with_attribute("href")[0];
        let first = doc.attribute(id, "href").unwrap();

        rewriter.rewrite(&mut doc);
        let second = doc.attribute(id, "href").unwrap();
        assert_eq!(first, second);
        assert_eq!(decoded_target(&second), "http://example.com/x");
    }

    #[test]
    fn parses_srcset_candidates() {
        let candidates = parse_srcset("/a.png 1x, /b.png 480w, /c.png");
        assert_eq!(
            candidates,
            vec![
                SrcsetCandidate { url: "/a.png", descriptor: Some("1x") },
                SrcsetCandidate { url: "/b.png", descriptor: Some("480w") },
                SrcsetCandidate { url: "/c.png", descriptor: None },
            ]
        );
    }
}
