//! Minimal HTTP router. Routes are matched in registration order by method
//! and number of path segments, `:name` segments are bound as path parameters
//! and can be read inside handlers with [`get_param`].
//!
//! ```no_run
//! use hyper::{Body, Request};
//! use rroute::{get_param, Router};
//!
//! fn user(req: Request<Body>) -> String {
//!     format!("user {}", get_param(&req, "id"))
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     Router::default().get("/users/:id", user).start("127.0.0.1:8080")
//! }
//! ```
pub mod handler;
pub mod request;
pub mod response;
pub mod route;
pub mod router;
pub mod server;

pub use request::{get_param, Json, Params, PathParams};
pub use response::{Responder, Response};
pub use route::MatchMode;
pub use router::Router;
pub use server::{Limits, Server};
