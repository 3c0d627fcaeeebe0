//! Resource reference rewriting.
//!
//! Takes any reference found in fetched content (absolute or relative),
//! resolves it against the page's final URL, and re-encodes it as a
//! proxy-routed URL. Rewriting is best-effort per reference: callers leave
//! the original in place when this fails.

use thiserror::Error;
use url::Url;

use crate::proxy::address;

/// Base URLs carried through one rewrite pass.
///
/// `base` is the page's final, post-redirect URL, so relative references
/// resolve against what the upstream actually served. `external` is the
/// proxy's own outward-facing origin. Both are constant for the duration of
/// a single response transformation.
#[derive(Debug, Clone)]
pub struct RewriteContext {
    pub base: Url,
    pub external: Url,
}

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("couldn't parse reference to rewrite it")]
    Parse(#[from] url::ParseError),
}

/// Rewrite one resource reference into a proxy-routed URL.
///
/// `data:` URIs are returned unchanged; non-HTTP schemes are forced to HTTP
/// before encoding.
pub fn rewrite(raw: &str, ctx: &RewriteContext) -> Result<String, RewriteError> {
    let resolved = match Url::parse(raw) {
        Ok(url) if url.scheme() == "data" => return Ok(raw.to_string()),
        Ok(url) if url.scheme().starts_with("http") => url,
        Ok(url) => address::force_http(&url)?,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let joined = ctx.base.join(raw)?;
            if joined.scheme().starts_with("http") {
                joined
            } else {
                address::force_http(&joined)?
            }
        }
        Err(e) => return Err(e.into()),
    };
    Ok(address::encode(&resolved, &ctx.external))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::address::TARGET_PARAM;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;

    fn ctx(base: &str) -> RewriteContext {
        RewriteContext {
            base: Url::parse(base).unwrap(),
            external: Url::parse("http://proxy.test").unwrap(),
        }
    }

    /// Decode the target a proxy-routed URL points at.
    fn decoded_target(routed: &str) -> String {
        let routed = Url::parse(routed).unwrap();
        let token = routed
            .query_pairs()
            .find(|(k, _)| k == TARGET_PARAM)
            .expect("routed URL carries a target token")
            .1
            .into_owned();
        String::from_utf8(BASE64.decode(token.as_bytes()).unwrap()).unwrap()
    }

    #[test]
    fn resolves_relative_references_against_base() {
        let routed = rewrite("../c.css", &ctx("https://example.com/a/b")).unwrap();
        assert_eq!(decoded_target(&routed), "https://example.com/c.css");
    }

    #[test]
    fn resolves_root_relative_references() {
        let routed = rewrite("/x", &ctx("http://example.com/deep/page.html")).unwrap();
        assert_eq!(decoded_target(&routed), "http://example.com/x");
    }

    #[test]
    fn absolute_references_ignore_base() {
        let routed = rewrite("https://other.test/r", &ctx("http://example.com/")).unwrap();
        assert_eq!(decoded_target(&routed), "https://other.test/r");
    }

    #[test]
    fn data_uris_are_never_proxied() {
        let data = "data:image/png;base64,iVBORw0KGgo=";
        assert_eq!(rewrite(data, &ctx("http://example.com/")).unwrap(), data);
    }

    #[test]
    fn non_http_schemes_are_forced_to_http() {
        let routed = rewrite("ftp://files.test/a", &ctx("http://example.com/")).unwrap();
        assert_eq!(decoded_target(&routed), "http://files.test/a");
    }

    #[test]
    fn unparsable_reference_is_an_error() {
        assert!(rewrite("http://[bad", &ctx("http://example.com/")).is_err());
    }
}
