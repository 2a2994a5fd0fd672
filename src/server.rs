use crate::{
    handler::Service,
    response::{error_response, response_to_bytes, Response},
};
use anyhow::{bail, Context};
use hyper::{Body, Request, StatusCode};
use log::{debug, error, info};
use std::{
    fmt::{self, Display},
    io::{self, Read, Write},
    net::{Shutdown, SocketAddr, TcpListener, TcpStream},
    sync::Arc,
    thread,
    time::Duration,
};

const MESSAGE_SIZE: usize = 1024;
const MAX_HEADERS: usize = 64;

/// Bounds applied to every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Request line and headers, in bytes.
    pub max_head_size: usize,

    /// Decoded body, in bytes.
    pub max_body_size: usize,

    /// Maximum time a single read or write may block.
    pub timeout: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_head_size: 8 * 1024,
            max_body_size: 1024 * 1024,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Request refused before it reaches the service. Answered with `status`.
#[derive(Debug)]
struct Rejection {
    status: StatusCode,
    reason: String,
}

fn reject(status: StatusCode, reason: impl Into<String>) -> anyhow::Error {
    anyhow::Error::new(Rejection {
        status,
        reason: reason.into(),
    })
}

impl Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.reason)
    }
}

impl std::error::Error for Rejection {}

/// Blocking HTTP/1.x server. Every accepted connection is handled on its own
/// thread and serves a single request.
pub struct Server<V> {
    listener: TcpListener,

    /// Shared by all connection threads, never mutated after bind.
    service: Arc<V>,

    limits: Limits,
}

impl<V> Server<V>
where
    V: Service<Request<Body>, Response = Response> + Send + Sync + 'static,
{
    /// Binds listener on `host:port` address. Fails when address is invalid
    /// or already in use.
    pub fn bind(addr: &str, service: V) -> anyhow::Result<Self> {
        let listener =
            TcpListener::bind(addr).with_context(|| format!("could not bind listener on {}", addr))?;

        info!("listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            service: Arc::new(service),
            limits: Limits::default(),
        })
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Starts accepting connections. Failed accepts are logged and skipped,
    /// so this blocks forever.
    pub fn run(self) -> anyhow::Result<()> {
        serve(&self.service, self.limits, self.listener.incoming());
        Ok(())
    }
}

/// Spawns a connection thread for every accepted stream.
fn serve<V, I>(service: &Arc<V>, limits: Limits, incoming: I)
where
    V: Service<Request<Body>, Response = Response> + Send + Sync + 'static,
    I: Iterator<Item = io::Result<TcpStream>>,
{
    for stream in incoming {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                error!("could not accept connection: {}", e);
                continue;
            }
        };

        let s = service.clone();
        thread::spawn(move || {
            if let Err(e) = handle(s.as_ref(), limits, stream) {
                error!("got error during handling connection: {:#}", e);
            }
        });
    }
}

/// Calls service and writes its response to opened stream. Rejected
/// requests are answered without calling the service.
fn handle<V>(service: &V, limits: Limits, mut stream: TcpStream) -> anyhow::Result<()>
where
    V: Service<Request<Body>, Response = Response>,
{
    stream.set_read_timeout(Some(limits.timeout))?;
    stream.set_write_timeout(Some(limits.timeout))?;

    let (response, outcome) = match parse_request_from_tcp(&mut stream, &limits) {
        Ok(request) => (service.call(request), Ok(())),
        Err(e) => {
            let response = match e.downcast_ref::<Rejection>() {
                Some(rejection) => error_response(rejection.status, &rejection.reason),
                None => return Err(e),
            };
            (response, Err(e))
        }
    };

    stream.write_all(&response_to_bytes(response)?)?;
    stream.flush()?;
    stream.shutdown(Shutdown::Write)?;
    drain(&mut stream, limits.max_body_size);

    outcome
}

/// Reads whatever the client still sends until it closes its side, so that
/// closing the socket with unread bytes does not reset the connection
/// before the response is read.
fn drain(stream: &mut TcpStream, max: usize) {
    let mut rx_bytes = [0u8; MESSAGE_SIZE];
    let mut drained = 0;

    while drained < max {
        match stream.read(&mut rx_bytes) {
            Ok(0) | Err(_) => break,
            Ok(n) => drained += n,
        }
    }
    debug!("drained {} bytes after response", drained);
}

/// Reads from stream until request's head and its whole body are received,
/// then parses it to a http request.
fn parse_request_from_tcp(stream: &mut TcpStream, limits: &Limits) -> anyhow::Result<Request<Body>> {
    let mut received: Vec<u8> = vec![];
    let mut rx_bytes = [0u8; MESSAGE_SIZE];

    loop {
        let bytes_read = stream.read(&mut rx_bytes)?;
        if bytes_read == 0 {
            bail!("connection closed before request was complete");
        }
        received.extend_from_slice(&rx_bytes[..bytes_read]);

        if let Some(request) = parse_request(&received, limits)? {
            return Ok(request);
        }
    }
}

/// Returns `None` when more bytes are needed.
fn parse_request(received: &[u8], limits: &Limits) -> anyhow::Result<Option<Request<Body>>> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);

    let body_inx = match req.parse(received) {
        Ok(httparse::Status::Complete(inx)) => inx,
        Ok(httparse::Status::Partial) if received.len() > limits.max_head_size => {
            return Err(reject(
                StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
                "request head too large",
            ))
        }
        Ok(httparse::Status::Partial) => return Ok(None),
        Err(e) => return Err(reject(StatusCode::BAD_REQUEST, format!("malformed request: {}", e))),
    };

    if body_inx > limits.max_head_size {
        return Err(reject(
            StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
            "request head too large",
        ));
    }

    let body = &received[body_inx..];

    let body = match header(&req, "transfer-encoding") {
        Some(encoding) => {
            if !encoding.trim().eq_ignore_ascii_case("chunked") {
                return Err(reject(
                    StatusCode::NOT_IMPLEMENTED,
                    format!("unsupported transfer-encoding: {}", encoding),
                ));
            }
            match decode_chunked(body, limits.max_body_size)? {
                Some(decoded) => decoded,
                None => return Ok(None),
            }
        }
        None => {
            let content_length = match header(&req, "content-length") {
                Some(value) => value.trim().parse::<usize>().map_err(|_| {
                    reject(StatusCode::BAD_REQUEST, "invalid content-length")
                })?,
                None => 0,
            };
            if content_length > limits.max_body_size {
                return Err(reject(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    format!("content-length {} exceeds {}", content_length, limits.max_body_size),
                ));
            }
            if body.len() < content_length {
                return Ok(None);
            }
            body[..content_length].to_vec()
        }
    };

    Ok(Some(httparse_req_to_hyper_request(req, body)?))
}

/// Header value as text, `None` when missing or not valid UTF-8.
fn header<'a>(req: &httparse::Request<'_, 'a>, name: &str) -> Option<&'a str> {
    req.headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .and_then(|h| std::str::from_utf8(h.value).ok())
}

/// Decodes chunked body. Returns `None` when the last chunk was not
/// received yet. Trailers are skipped.
fn decode_chunked(mut raw: &[u8], max_body_size: usize) -> anyhow::Result<Option<Vec<u8>>> {
    let mut body: Vec<u8> = vec![];

    loop {
        let (inx, size) = match httparse::parse_chunk_size(raw) {
            Ok(httparse::Status::Complete(found)) => found,
            Ok(httparse::Status::Partial) => return Ok(None),
            Err(_) => return Err(reject(StatusCode::BAD_REQUEST, "invalid chunk size")),
        };
        raw = &raw[inx..];

        if size == 0 {
            return Ok(trailers_end(raw).map(|_| body));
        }

        let size = usize::try_from(size).unwrap_or(usize::MAX);
        if size > max_body_size.saturating_sub(body.len()) {
            return Err(reject(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("chunked body exceeds {}", max_body_size),
            ));
        }
        if raw.len() < size + 2 {
            return Ok(None);
        }
        if &raw[size..size + 2] != b"\r\n" {
            return Err(reject(StatusCode::BAD_REQUEST, "chunk not terminated"));
        }

        body.extend_from_slice(&raw[..size]);
        raw = &raw[size + 2..];
    }
}

/// Position right after the empty line that ends trailer section.
fn trailers_end(raw: &[u8]) -> Option<usize> {
    if raw.starts_with(b"\r\n") {
        return Some(2);
    }
    raw.windows(4).position(|w| w == b"\r\n\r\n").map(|inx| inx + 4)
}

fn httparse_req_to_hyper_request(
    req: httparse::Request,
    body: Vec<u8>,
) -> anyhow::Result<Request<Body>> {
    let mut builder = Request::builder()
        .method(req.method.context("missing method")?)
        .uri(req.path.context("missing path")?);

    for header in req.headers.iter() {
        builder = builder.header(header.name, header.value);
    }

    Ok(builder.body(Body::from(body))?)
}
