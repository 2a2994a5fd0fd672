use crate::{
    request::{FromRequest, FromRequestParts},
    response::{error_response, Responder, Response},
};
use hyper::{Body, Request, StatusCode};
use log::error;
use std::marker::PhantomData;

/// Trait implemented by transition handler's state.
/// Introduced to have handlers that are generic only over R type.
pub trait Service<R> {
    type Response;

    /// Calls service's logic.
    fn call(&self, req: R) -> Self::Response;
}

/// Transition state for handler, it helps 'hide' Q type that is specific
/// for various types of functions(with different amount of parameters).
///
/// IntoService implements Service trait and this way it's responsible for
/// calling handler effectively calling wanted handler's logic.
pub struct IntoService<H, Q> {
    handler: H,
    _marker: PhantomData<fn() -> Q>,
}

impl<H, Q> Service<Request<Body>> for IntoService<H, Q>
where
    H: HandlerTrait<Q>,
{
    type Response = Response;

    fn call(&self, req: Request<Body>) -> Self::Response {
        self.handler.handle(req)
    }
}

/// Main 'entrypoint' for crate handlers. Functions taking up to five
/// arguments implement it, as long as every argument but the last one
/// implements `FromRequestParts`, the last one implements `FromRequest`
/// and the return type implements `Responder`.
///
/// ```rust
/// use rroute::{get_param, Params};
/// use hyper::{Body, Request};
///
/// fn raw(req: Request<Body>) -> String {
///     get_param(&req, "id").to_string()
/// }
///
/// fn extracted(Params(params): Params, body: String) -> String {
///     format!("{}: {}", params.get("id").unwrap_or_default(), body)
/// }
///
/// rroute::Router::default()
///     .get("/users/:id", raw)
///     .post("/users/:id", extracted);
/// ```
pub trait HandlerTrait<Q>: Sized + Send + Sync + 'static {
    /// User defined logic.
    fn handle(&self, request: Request<Body>) -> Response;

    /// Turns Self into `IntoService`.
    fn into_service(self) -> IntoService<Self, Q> {
        IntoService {
            handler: self,
            _marker: PhantomData,
        }
    }
}

/// Extractor errors are client's fault, responder errors are not.
fn extraction_rejection(e: anyhow::Error) -> Response {
    error_response(StatusCode::BAD_REQUEST, e)
}

fn finalize<R: Responder>(responder: R) -> Response {
    match responder.into_response() {
        Ok(response) => response,
        Err(e) => {
            error!("could not build response: {:#}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

macro_rules! implement_handler_trait {
    ([$($ty:ident),*], $last:ident) => {
        #[allow(non_snake_case)]
        impl<F, R, $($ty,)* $last, M> HandlerTrait<($($ty,)* $last, M)> for F
        where
            R: Responder + 'static,
            $($ty: FromRequestParts,)*
            $last: FromRequest<M>,
            F: Fn($($ty,)* $last) -> R + Send + Sync + 'static,
        {
            fn handle(&self, request: Request<Body>) -> Response {
                let (parts, body) = request.into_parts();

                $(
                    let $ty = match $ty::from_request_parts(&parts) {
                        Ok(value) => value,
                        Err(e) => return extraction_rejection(e),
                    };
                )*

                let $last = match <$last as FromRequest<M>>::from_request(Request::from_parts(parts, body)) {
                    Ok(value) => value,
                    Err(e) => return extraction_rejection(e),
                };

                finalize(self($($ty,)* $last))
            }
        }
    };
}

implement_handler_trait!([], T1);
implement_handler_trait!([T1], T2);
implement_handler_trait!([T1, T2], T3);
implement_handler_trait!([T1, T2, T3], T4);
implement_handler_trait!([T1, T2, T3, T4], T5);

impl<F, R> HandlerTrait<((),)> for F
where
    R: Responder + 'static,
    F: Fn() -> R + Send + Sync + 'static,
{
    fn handle(&self, _request: Request<Body>) -> Response {
        finalize(self())
    }
}

pub struct BoxCloneService<T, U>(pub Box<dyn Service<T, Response = U> + Send + Sync>);

impl<T, U> BoxCloneService<T, U> {
    pub fn new<S>(service: S) -> Self
    where
        S: Service<T, Response = U> + Send + Sync + 'static,
    {
        Self(Box::new(service))
    }
}

impl<H, Q> From<IntoService<H, Q>> for BoxCloneService<Request<Body>, Response>
where
    Q: 'static,
    H: HandlerTrait<Q>,
{
    fn from(val: IntoService<H, Q>) -> Self {
        BoxCloneService::new(val)
    }
}
