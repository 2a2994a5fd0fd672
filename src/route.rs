use crate::{
    handler::{BoxCloneService, Service},
    request::PathParams,
    response::Response,
};
use hyper::{Body, Request};
use std::sync::Arc;

/// Marks a pattern segment as a path parameter, `/users/:id`.
const PARAM_PREFIX: char = ':';

/// Decides how static (non-parameter) pattern segments take part in matching.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Only the number of segments is compared. Static segments are ignored,
    /// so `/users/:id` also matches `/posts/5`. This is a known limitation kept
    /// as the default.
    #[default]
    SegmentCount,

    /// Segment count must match and every static segment must be equal
    /// to the request's segment at the same position.
    Literal,
}

/// Smallest unit of routing logic. Should not be constructed directly,
/// register routes with `crate::router::Router` methods instead.
#[derive(Clone)]
pub struct Route {
    method: String,

    /// Original, registered pattern.
    pattern: String,

    /// Pattern split into segments, leading element dropped.
    ///
    /// `/users/:id` - ["users", ":id"].
    segments: Vec<String>,

    pub service: Arc<BoxCloneService<Request<Body>, Response>>,
}

impl Route {
    pub fn new<M, P>(method: M, pattern: P, service: BoxCloneService<Request<Body>, Response>) -> Self
    where
        M: Into<String>,
        P: Into<String>,
    {
        let pattern: String = pattern.into();
        Self {
            method: method.into(),
            segments: pattern_segments(&pattern),
            pattern,
            service: Arc::new(service),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Method comparison is exact, `get` is not `GET`.
    pub fn should_fire_on_method(&self, method: &str) -> bool {
        self.method == method
    }

    /// Indicates if request's path segments match with route's pattern.
    ///
    /// '/users/42'     & '/users/:id'  => true,
    /// '/users/42/'    & '/users/:id'  => true,
    /// '/posts/42'     & '/users/:id'  => true (SegmentCount), false (Literal),
    /// '/users/42/x'   & '/users/:id'  => false.
    pub fn should_fire_on_segments(&self, segments: &[&str], mode: MatchMode) -> bool {
        if self.segments.len() != segments.len() {
            return false;
        }

        match mode {
            MatchMode::SegmentCount => true,
            MatchMode::Literal => self
                .segments
                .iter()
                .zip(segments)
                .all(|(r, p)| r.starts_with(PARAM_PREFIX) || r == p),
        }
    }

    /// Binds every `:name` segment to the request's segment at the same index.
    /// Static segments are neither validated nor bound. Repeated names keep
    /// the last occurrence.
    pub fn bind_params(&self, segments: &[&str]) -> PathParams {
        let mut params = PathParams::default();

        for (inx, segment) in self.segments.iter().enumerate() {
            if let (Some(name), Some(value)) = (segment.strip_prefix(PARAM_PREFIX), segments.get(inx)) {
                params.insert(name, *value);
            }
        }
        params
    }

    pub fn fire(&self, request: Request<Body>) -> Response {
        self.service.0.call(request)
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .finish()
    }
}

/// Registered routes in registration order. Order matters, the first
/// route that matches wins.
#[derive(Clone, Default, Debug)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Appends new route. Pattern is accepted as-is, there is nothing to validate.
    pub fn register<M, P>(&mut self, method: M, pattern: P, service: BoxCloneService<Request<Body>, Response>)
    where
        M: Into<String>,
        P: Into<String>,
    {
        self.routes.push(Route::new(method, pattern, service));
    }

    pub fn all(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Spaces are trimmed, slashes are not. The first element is dropped since
/// it is the empty string for any pattern starting with '/'.
///
/// `/users/:id` - ["users", ":id"], `/` - [""], `` - [].
fn pattern_segments(pattern: &str) -> Vec<String> {
    pattern
        .trim_matches(' ')
        .split('/')
        .skip(1)
        .map(String::from)
        .collect()
}

/// Leading and trailing slashes are trimmed, so `/` gives one empty segment.
///
/// `/users/42/` - ["users", "42"].
pub fn path_segments(path: &str) -> Vec<&str> {
    path.trim_matches('/').split('/').collect()
}
