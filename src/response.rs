use crate::request::Json;
use anyhow::Context;
use hyper::{
    body::Bytes,
    header::{HeaderValue, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE},
    Body, StatusCode,
};
use serde::Serialize;

pub type Response = hyper::Response<Body>;

/// Types that can be turned into Response. Every handler's return type
/// has to implement it.
pub trait Responder {
    fn into_response(self) -> anyhow::Result<Response>;
}

/// Responder implementation for '()', returns empty 200 response.
///
/// ```rust
/// fn handler() {}
/// ```
impl Responder for () {
    fn into_response(self) -> anyhow::Result<Response> {
        Ok(Response::default())
    }
}

impl Responder for Response {
    fn into_response(self) -> anyhow::Result<Response> {
        Ok(self)
    }
}

/// Returns 200 response with self as a body.
///
/// ```rust
/// fn handler() -> &'static str {
///     "hello"
/// }
/// ```
impl Responder for &'static str {
    fn into_response(self) -> anyhow::Result<Response> {
        Ok(Response::new(Body::from(self)))
    }
}

impl Responder for String {
    fn into_response(self) -> anyhow::Result<Response> {
        Ok(Response::new(Body::from(self)))
    }
}

/// Errors are not propagated any further, they turn into 500 response
/// with error's message as a body.
impl<T> Responder for anyhow::Result<T>
where
    T: Responder,
{
    fn into_response(self) -> anyhow::Result<Response> {
        match self {
            Ok(r) => r.into_response(),
            Err(e) => Ok(error_response(StatusCode::INTERNAL_SERVER_ERROR, e)),
        }
    }
}

/// Overrides status of the inner responder.
///
/// ```rust
/// fn handler() -> (hyper::StatusCode, &'static str) {
///     (hyper::StatusCode::CREATED, "created")
/// }
/// ```
impl<T> Responder for (StatusCode, T)
where
    T: Responder,
{
    fn into_response(self) -> anyhow::Result<Response> {
        let (status, inner) = self;
        let mut response = inner.into_response()?;
        *response.status_mut() = status;
        Ok(response)
    }
}

/// Serializes value to JSON body and sets content type.
impl<T> Responder for Json<T>
where
    T: Serialize,
{
    fn into_response(self) -> anyhow::Result<Response> {
        let body = serde_json::to_vec(&self.0).context("could not serialize to json")?;

        Ok(hyper::Response::builder()
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(Body::from(body))?)
    }
}

pub(crate) fn error_response<E: std::fmt::Display>(status: StatusCode, e: E) -> Response {
    let mut response = Response::new(Body::from(e.to_string()));
    *response.status_mut() = status;
    response
}

/// Response sent when no registered route matches the request.
pub fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not Found")
}

pub fn body_to_bytes(body: Body) -> anyhow::Result<Bytes> {
    Ok(futures_executor::block_on(hyper::body::to_bytes(body))?)
}

/// Serializes response to HTTP/1.1 message. Content length is always set
/// and connection is always closed after the response.
pub fn response_to_bytes(response: Response) -> anyhow::Result<Vec<u8>> {
    use std::io::Write as _;

    let (mut parts, body) = response.into_parts();
    let body = body_to_bytes(body)?;

    parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    parts
        .headers
        .insert(CONNECTION, HeaderValue::from_static("close"));

    let mut buf: Vec<u8> = Vec::with_capacity(body.len() + 128);
    write!(
        &mut buf,
        "HTTP/1.1 {} {}\r\n",
        parts.status.as_u16(),
        parts.status.canonical_reason().unwrap_or_default()
    )?;

    for (k, v) in parts.headers.iter() {
        write!(&mut buf, "{}: ", k)?;
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(&body);

    Ok(buf)
}
