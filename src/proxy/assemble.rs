//! Response assembly: content-type dispatch, header policy, body rewriting.
//!
//! Decides which rewriter (if any) applies to a fetched body, filters the
//! upstream headers per policy, and emits the final response. Anything that
//! is not HTML or CSS passes through byte for byte.

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Response};
use bytes::Bytes;
use encoding_rs::Encoding;
use thiserror::Error;

use crate::config::RewriteConfig;
use crate::proxy::content_type::{self, ContentDescriptor, ContentTypeError};
use crate::proxy::css;
use crate::proxy::dom::{Document, SerializeError};
use crate::proxy::fetch::FetchResult;
use crate::proxy::html::HtmlRewriter;
use crate::proxy::uri::RewriteContext;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error(transparent)]
    ContentType(#[from] ContentTypeError),
    #[error("{0} is an invalid encoding")]
    UnsupportedEncoding(String),
    #[error("couldn't convert parsed document back to HTML")]
    Serialize(#[from] SerializeError),
}

/// Build the client-facing response from a fetched upstream body.
///
/// The response mirrors the upstream status; headers are copied through the
/// policy filter; the body is rewritten when the resolved type and config
/// call for it.
pub fn assemble(
    cfg: &RewriteConfig,
    ctx: &RewriteContext,
    fetched: FetchResult,
) -> Result<Response<Body>, AssembleError> {
    let header_value = fetched
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let descriptor = content_type::resolve(header_value, &fetched.body)?;

    let headers = filter_headers(cfg, &descriptor, &fetched.headers);
    let body = transform_body(cfg, ctx, &descriptor, &fetched.body)?;

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = fetched.status;
    *response.headers_mut() = headers;
    Ok(response)
}

fn transform_body(
    cfg: &RewriteConfig,
    ctx: &RewriteContext,
    descriptor: &ContentDescriptor,
    body: &Bytes,
) -> Result<Bytes, AssembleError> {
    if cfg.modify_html && descriptor.is_html() {
        // Without a charset there is no safe way to decode; serve as-is.
        let Some(charset) = descriptor.charset() else {
            return Ok(body.clone());
        };
        let text = decode_body(body, charset)?;
        let mut doc = Document::parse(&text);
        HtmlRewriter::new(ctx, cfg.strip_integrity_attributes).rewrite(&mut doc);
        return Ok(Bytes::from(doc.serialize()?));
    }

    if cfg.modify_css && descriptor.is_css() {
        let text = String::from_utf8_lossy(body);
        return Ok(Bytes::from(css::rewrite_urls(&text, ctx)));
    }

    Ok(body.clone())
}

/// Decode the raw body to UTF-8 text using the resolved charset.
fn decode_body(body: &[u8], charset: &str) -> Result<String, AssembleError> {
    if charset == "utf-8" {
        return Ok(String::from_utf8_lossy(body).into_owned());
    }
    let encoding = Encoding::for_label(charset.as_bytes())
        .ok_or_else(|| AssembleError::UnsupportedEncoding(charset.to_string()))?;
    let (text, _, _) = encoding.decode(body);
    Ok(text.into_owned())
}

/// Copy upstream headers through the response policy.
///
/// `Content-Length` is never copied (the transformed body length differs and
/// the server recomputes it), hop-by-hop headers are dropped, CSP and frame
/// options go when their strip flags are on, `Content-Type` is forced to
/// UTF-8 HTML for HTML bodies, and `Access-Control-Allow-Origin: *` is
/// always set.
fn filter_headers(
    cfg: &RewriteConfig,
    descriptor: &ContentDescriptor,
    upstream: &HeaderMap,
) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(upstream.len() + 1);
    for (name, value) in upstream {
        if name == header::CONTENT_LENGTH
            || name == header::TRANSFER_ENCODING
            || name == header::CONNECTION
        {
            continue;
        }
        if name == header::CONTENT_SECURITY_POLICY && cfg.strip_cors {
            continue;
        }
        if name == header::X_FRAME_OPTIONS && cfg.strip_frame_options {
            continue;
        }
        if name == header::CONTENT_TYPE && descriptor.is_html() {
            out.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/html; charset=utf-8"),
            );
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    out
}
