use hyper::{body::Bytes, http::request::Parts, Body, Request};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// Path parameters bound while dispatching a request. Stored in request's
/// extensions for the time of handler execution.
///
/// `/users/:id` & `/users/42` - { "id": "42" }.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PathParams(HashMap<String, String>);

impl PathParams {
    /// Inserts a binding, an existing value under the same name is replaced.
    pub fn insert<K, V>(&mut self, name: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Returns the value bound to `name` for this request.
///
/// Empty string is returned when the name was not bound or the request did
/// not go through dispatch at all.
///
/// ```rust
/// use hyper::{Body, Request};
///
/// fn handler(req: Request<Body>) -> String {
///     format!("user {}", rroute::get_param(&req, "id"))
/// }
///
/// rroute::Router::default().get("/users/:id", handler);
/// ```
pub fn get_param<'a, B>(request: &'a Request<B>, name: &str) -> &'a str {
    request
        .extensions()
        .get::<PathParams>()
        .and_then(|params| params.get(name))
        .unwrap_or_default()
}

/// Marker types that keep `FromRequest` implementations from overlapping.
mod private {
    #[derive(Debug, Clone, Copy)]
    pub enum ViaParts {}

    #[derive(Debug, Clone, Copy)]
    pub enum ViaRequest {}
}

/// Allows various types to be created from Request. Consumes the body,
/// so it can be used only for the last handler's argument.
pub trait FromRequest<M = private::ViaRequest>: Sized {
    fn from_request(req: Request<Body>) -> anyhow::Result<Self>;
}

/// Types created from request's head only. Can be used for any handler's argument.
pub trait FromRequestParts: Sized {
    fn from_request_parts(parts: &Parts) -> anyhow::Result<Self>;
}

impl FromRequest for Request<Body> {
    fn from_request(req: Request<Body>) -> anyhow::Result<Self> {
        Ok(req)
    }
}

/// This allows to create handler like that:
///
/// ```rust
/// fn handler(s: String) {}
/// ```
impl FromRequest for String {
    fn from_request(req: Request<Body>) -> anyhow::Result<Self> {
        let bytes: Bytes = futures_executor::block_on(hyper::body::to_bytes(req.into_body()))?;
        let string = std::str::from_utf8(&bytes)?.to_owned();

        Ok(string)
    }
}

/// Placeholder for value that can be deserialized from JSON.
///
/// ```rust
/// #[derive(serde::Deserialize)]
/// struct NewUser {
///     name: String,
/// }
///
/// fn handler(rroute::Json(user): rroute::Json<NewUser>) -> String {
///     user.name
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T> FromRequest for Json<T>
where
    T: DeserializeOwned,
{
    fn from_request(req: Request<Body>) -> anyhow::Result<Self> {
        let bytes: Bytes = futures_executor::block_on(hyper::body::to_bytes(req.into_body()))?;
        let deserializer = &mut serde_json::Deserializer::from_slice(&bytes);

        let value = T::deserialize(deserializer)?;
        Ok(Json(value))
    }
}

/// Every bound path parameter of the matched route.
///
/// ```rust
/// fn handler(rroute::Params(params): rroute::Params) -> String {
///     format!("{}/{}", params.get("user").unwrap_or_default(), params.get("post").unwrap_or_default())
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Params(pub PathParams);

impl FromRequestParts for Params {
    fn from_request_parts(parts: &Parts) -> anyhow::Result<Self> {
        Ok(Params(
            parts.extensions.get::<PathParams>().cloned().unwrap_or_default(),
        ))
    }
}

/// Implements FromRequest for every type that implements FromRequestParts trait.
impl<T> FromRequest<private::ViaParts> for T
where
    T: FromRequestParts,
{
    fn from_request(req: Request<Body>) -> anyhow::Result<Self> {
        let (parts, _) = req.into_parts();
        T::from_request_parts(&parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_param_without_params() {
        let req = Request::new(Body::empty());
        assert_eq!(get_param(&req, "id"), "");
    }

    #[test]
    fn test_get_param() {
        let mut params = PathParams::default();
        params.insert("id", "42");

        let mut req = Request::new(Body::empty());
        req.extensions_mut().insert(params);

        assert_eq!(get_param(&req, "id"), "42");
        assert_eq!(get_param(&req, "name"), "");
    }

    #[test]
    fn test_json_from_request() -> anyhow::Result<()> {
        #[derive(serde::Deserialize)]
        struct Payload {
            val: String,
        }

        let req = Request::new(Body::from(r#"{"val":"hello"}"#));
        let Json(body) = <Json<Payload> as FromRequest>::from_request(req)?;
        assert_eq!(body.val, "hello");

        let req = Request::new(Body::from("not json"));
        assert!(<Json<Payload> as FromRequest>::from_request(req).is_err());

        Ok(())
    }

    #[test]
    fn test_params_from_parts() -> anyhow::Result<()> {
        let mut params = PathParams::default();
        params.insert("a", "1");

        let mut req = Request::new(Body::empty());
        req.extensions_mut().insert(params.clone());
        let (parts, _) = req.into_parts();

        assert_eq!(Params::from_request_parts(&parts)?, Params(params));
        Ok(())
    }
}
