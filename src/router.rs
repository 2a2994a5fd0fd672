use crate::{
    handler::{HandlerTrait, Service},
    request::PathParams,
    response::{not_found, Response},
    route::{path_segments, MatchMode, Route, RouteTable},
    server::Server,
};
use hyper::{Body, Method, Request};
use log::debug;
use percent_encoding::percent_decode_str;

/// Holds registered routes and dispatches requests to them.
///
/// Routes are tried in registration order and the first route with equal
/// method and equal number of path segments wins. In the default
/// `MatchMode::SegmentCount` static segments are not compared at all:
///
/// ```rust
/// use rroute::Router;
///
/// fn users() -> &'static str { "users" }
/// fn posts() -> &'static str { "posts" }
///
/// // "/posts/5" is served by `users`, it was registered first and
/// // both patterns have two segments.
/// let app = Router::default()
///     .get("/users/:id", users)
///     .get("/posts/:id", posts);
///
/// assert_eq!(app.find("GET", "/posts/5").map(|(r, _)| r.pattern()), Some("/users/:id"));
/// ```
///
/// Registration takes `self`, once the router is handed over to a `Server`
/// it can't be changed anymore.
#[derive(Clone, Default, Debug)]
pub struct Router {
    routes: RouteTable,
    mode: MatchMode,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how static pattern segments are matched.
    pub fn match_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Registers route for any method. Method is compared with request's
    /// method as-is, so it has to be upper case to match standard methods.
    pub fn route<M, P, H, Q>(mut self, method: M, pattern: P, handler: H) -> Self
    where
        M: Into<String>,
        P: Into<String>,
        H: HandlerTrait<Q>,
        Q: 'static,
    {
        self.routes
            .register(method, pattern, handler.into_service().into());
        self
    }

    /// Registers GET route.
    pub fn get<P, H, Q>(self, pattern: P, handler: H) -> Self
    where
        P: Into<String>,
        H: HandlerTrait<Q>,
        Q: 'static,
    {
        self.route(Method::GET.as_str(), pattern, handler)
    }

    /// Registers POST route.
    pub fn post<P, H, Q>(self, pattern: P, handler: H) -> Self
    where
        P: Into<String>,
        H: HandlerTrait<Q>,
        Q: 'static,
    {
        self.route(Method::POST.as_str(), pattern, handler)
    }

    /// Registers PUT route.
    pub fn put<P, H, Q>(self, pattern: P, handler: H) -> Self
    where
        P: Into<String>,
        H: HandlerTrait<Q>,
        Q: 'static,
    {
        self.route(Method::PUT.as_str(), pattern, handler)
    }

    /// Registers DELETE route.
    pub fn delete<P, H, Q>(self, pattern: P, handler: H) -> Self
    where
        P: Into<String>,
        H: HandlerTrait<Q>,
        Q: 'static,
    {
        self.route(Method::DELETE.as_str(), pattern, handler)
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Finds first route that matches method and path, together with
    /// parameters bound from the path. Nothing is called.
    ///
    /// Path is percent-decoded before it is split, `%2F` separates segments
    /// the same way `/` does.
    pub fn find(&self, method: &str, path: &str) -> Option<(&Route, PathParams)> {
        let path = percent_decode_str(path).decode_utf8_lossy();
        let segments = path_segments(&path);

        self.routes
            .all()
            .iter()
            .filter(|route| route.should_fire_on_method(method))
            .find(|route| route.should_fire_on_segments(&segments, self.mode))
            .map(|route| (route, route.bind_params(&segments)))
    }

    /// Calls handler of the first matching route with bound parameters
    /// injected into request's extensions. Responds with 404 when nothing matches.
    pub fn dispatch(&self, mut request: Request<Body>) -> Response {
        let (route, params) = match self.find(request.method().as_str(), request.uri().path()) {
            Some(found) => found,
            None => {
                debug!(
                    "dispatch - no route for {} {}",
                    request.method(),
                    request.uri().path()
                );
                return not_found();
            }
        };

        debug!(
            "dispatch - {} {} matched {:?} with {:?}",
            request.method(),
            request.uri().path(),
            route,
            params
        );

        request.extensions_mut().insert(params);
        route.fire(request)
    }

    /// Binds listener on given address and serves requests. Returns only
    /// when binding fails.
    ///
    /// ```no_run
    /// fn hello() -> &'static str {
    ///     "hello"
    /// }
    ///
    /// rroute::Router::default()
    ///     .get("/", hello)
    ///     .start("127.0.0.1:8080")
    ///     .expect("server failed");
    /// ```
    pub fn start(self, addr: &str) -> anyhow::Result<()> {
        Server::bind(addr, self)?.run()
    }
}

impl Service<Request<Body>> for Router {
    type Response = Response;

    fn call(&self, req: Request<Body>) -> Self::Response {
        self.dispatch(req)
    }
}
