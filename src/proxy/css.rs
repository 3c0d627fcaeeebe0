//! CSS `url()` reference rewriting.
//!
//! One token scanner serves both full stylesheets and inline `style`
//! attribute values: it yields the span and inner reference of every
//! `url(...)` occurrence, and the rewriter substitutes proxy-routed URLs
//! back in place. A failed rewrite leaves that occurrence verbatim; it never
//! aborts the rest of the document.

use std::ops::Range;

use crate::proxy::uri::{self, RewriteContext};

/// One `url(...)` occurrence in a CSS text.
#[derive(Debug, PartialEq, Eq)]
pub struct UrlToken<'a> {
    /// Byte range of the whole token, `url(` through `)` inclusive.
    pub span: Range<usize>,
    /// The inner reference, quotes and surrounding whitespace stripped.
    pub reference: &'a str,
    /// The quote character used, if any.
    pub quote: Option<char>,
}

/// Lazily scan `text` for `url(...)` tokens.
pub fn url_tokens(text: &str) -> UrlTokens<'_> {
    UrlTokens { text, pos: 0 }
}

pub struct UrlTokens<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Iterator for UrlTokens<'a> {
    type Item = UrlToken<'a>;

    fn next(&mut self) -> Option<UrlToken<'a>> {
        let start = self.pos + find_url_open(&self.text.as_bytes()[self.pos..])?;
        let inner_start = start + 4;
        let close = inner_start + self.text[inner_start..].find(')')?;
        self.pos = close + 1;

        let mut reference = self.text[inner_start..close].trim();
        let mut quote = None;
        // A trailing quote is only a quote when it closes a matching opener.
        if let Some(first @ ('\'' | '"')) = reference.chars().next() {
            quote = Some(first);
            reference = &reference[1..];
            if let Some(inner) = reference.strip_suffix(first) {
                reference = inner;
            }
        }

        Some(UrlToken {
            span: start..close + 1,
            reference,
            quote,
        })
    }
}

fn find_url_open(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(4)
        .position(|window| window.eq_ignore_ascii_case(b"url("))
}

/// Rewrite every `url()` reference in `text` to route through the proxy.
///
/// `data:` URIs and unrewritable references are left untouched.
pub fn rewrite_urls(text: &str, ctx: &RewriteContext) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for token in url_tokens(text) {
        if token.reference.starts_with("data:") {
            continue;
        }
        match uri::rewrite(token.reference, ctx) {
            Ok(routed) => {
                let quote = token.quote.unwrap_or('\'');
                out.push_str(&text[cursor..token.span.start]);
                out.push_str("url(");
                out.push(quote);
                out.push_str(&routed);
                out.push(quote);
                out.push(')');
                cursor = token.span.end;
            }
            Err(err) => {
                tracing::trace!(reference = token.reference, error = %err, "leaving CSS reference as-is");
            }
        }
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn ctx() -> RewriteContext {
        RewriteContext {
            base: Url::parse("https://example.com/styles/site.css").unwrap(),
            external: Url::parse("http://proxy.test").unwrap(),
        }
    }

    #[test]
    fn scans_tokens_with_and_without_quotes() {
        let css = "a{background:url('/x.png')} b{background:url(\"y.png\")} c{cursor:url(z.cur)}";
        let tokens: Vec<_> = url_tokens(css).collect();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].reference, "/x.png");
        assert_eq!(tokens[0].quote, Some('\''));
        assert_eq!(tokens[1].reference, "y.png");
        assert_eq!(tokens[1].quote, Some('"'));
        assert_eq!(tokens[2].reference, "z.cur");
        assert_eq!(tokens[2].quote, None);
    }

    #[test]
    fn span_covers_whole_token() {
        let css = "x url( 'a.png' ) y";
        let token = url_tokens(css).next().unwrap();
        assert_eq!(&css[token.span.clone()], "url( 'a.png' )");
        assert_eq!(token.reference, "a.png");
    }

    #[test]
    fn scanner_is_case_insensitive() {
        let token = url_tokens("a{background:URL('/x.png')}").next().unwrap();
        assert_eq!(token.reference, "/x.png");
    }

    #[test]
    fn trailing_quote_without_opener_is_part_of_the_reference() {
        let token = url_tokens("a{background:url(x')}").next().unwrap();
        assert_eq!(token.reference, "x'");
        assert_eq!(token.quote, None);

        // Mismatched quotes never strip each other.
        let token = url_tokens("a{background:url('x\")}").next().unwrap();
        assert_eq!(token.reference, "x\"");
        assert_eq!(token.quote, Some('\''));
    }

    #[test]
    fn rewrites_and_preserves_quote_style() {
        let out = rewrite_urls("a{background:url('/x.png')}", &ctx());
        assert!(out.starts_with("a{background:url('http://proxy.test/p/?u="), "{out}");
        assert!(out.ends_with("')}"), "{out}");

        let out = rewrite_urls("a{background:url(\"/x.png\")}", &ctx());
        assert!(out.contains("url(\"http://proxy.test/p/?u="), "{out}");
    }

    #[test]
    fn unrewritable_reference_stays_verbatim() {
        let css = "a{background:url('http://[bad')} b{background:url('/ok.png')}";
        let out = rewrite_urls(css, &ctx());
        assert!(out.contains("url('http://[bad')"), "{out}");
        assert!(out.contains("/p/?u="), "{out}");
    }

    #[test]
    fn data_uris_pass_through_unchanged() {
        let css = "a{background:url(data:image/png;base64,AAAA)}";
        assert_eq!(rewrite_urls(css, &ctx()), css);
    }

    #[test]
    fn text_without_tokens_is_unchanged() {
        let css = "a{color:red}";
        assert_eq!(rewrite_urls(css, &ctx()), css);
    }
}
