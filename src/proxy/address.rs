//! Proxy address codec.
//!
//! A target URL travels through the proxy as an opaque base64 token in the
//! `u` query parameter of a proxy-routed URL (`<external>/p/?u=<token>`).
//! Encoding and decoding are the only two operations; scheme normalization
//! happens on decode so the rest of the pipeline only ever sees absolute
//! HTTP(S) targets.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;
use url::Url;

/// Path on the proxy origin that serves proxied fetches.
pub const PROXY_PATH: &str = "/p/";

/// Query parameter carrying the encoded target URL.
pub const TARGET_PARAM: &str = "u";

#[derive(Debug, Error)]
pub enum AddressError {
    #[error("couldn't decode provided URL parameter")]
    Decode(#[from] base64::DecodeError),
    #[error("couldn't decode provided URL parameter")]
    NotText(#[from] std::string::FromUtf8Error),
    #[error("couldn't parse provided URL")]
    Parse(#[from] url::ParseError),
}

/// Encode a target URL as a proxy-routed URL on the `external` origin.
pub fn encode(target: &Url, external: &Url) -> String {
    let token = BASE64.encode(target.as_str());
    let mut routed = external.clone();
    let mut path = routed.path().trim_end_matches('/').to_string();
    path.push_str(PROXY_PATH);
    routed.set_path(&path);
    routed.query_pairs_mut().append_pair(TARGET_PARAM, &token);
    routed.into()
}

/// Decode a `u` token back into an absolute HTTP(S) target URL.
pub fn decode(token: &str) -> Result<Url, AddressError> {
    let raw = String::from_utf8(BASE64.decode(token)?)?;
    normalize(&raw)
}

/// Parse a raw target, defaulting or forcing the scheme to HTTP where needed.
pub(crate) fn normalize(raw: &str) -> Result<Url, AddressError> {
    match Url::parse(raw) {
        Ok(url) if url.scheme().starts_with("http") => Ok(url),
        Ok(url) => Ok(force_http(&url)?),
        // No scheme at all: the target defaults to http.
        Err(url::ParseError::RelativeUrlWithoutBase) => Ok(Url::parse(&format!("http://{raw}"))?),
        Err(e) => Err(e.into()),
    }
}

/// Rebuild a non-HTTP URL with an `http` scheme.
///
/// `Url::set_scheme` refuses several scheme transitions, so splice the scheme
/// at the string level and reparse.
pub(crate) fn force_http(url: &Url) -> Result<Url, url::ParseError> {
    let rest = &url.as_str()[url.scheme().len()..];
    Url::parse(&format!("http{rest}"))
}
