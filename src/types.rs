use crate::ctx::Ctx;
use hyper::Method;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// The boxed future every handler and middleware layer returns.
pub type Fut = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A request handler: an async function over the request context.
///
/// Handlers receive a cheap clone of the context handle; the context's
/// shared state (writer, params, body) lives behind it.
pub type Handler<V> = Arc<dyn Fn(Ctx<V>) -> Fut + Send + Sync + 'static>;

/// A middleware: a function transforming a handler into a handler.
///
/// At composition time each middleware wraps the downstream chain; at
/// call time the outermost middleware sees the request first. Build one
/// directly, or from an async closure with [`around`].
pub type Middleware<V> = Arc<dyn Fn(Handler<V>) -> Handler<V> + Send + Sync + 'static>;

pub(crate) fn box_future<F>(future: F) -> Fut
where
    F: Future<Output = ()> + Send + 'static,
{
    Box::pin(future)
}

/// Lifts a plain async function into a [`Handler`].
pub fn into_handler<V, F, Fut2>(f: F) -> Handler<V>
where
    V: Send + 'static,
    F: Fn(Ctx<V>) -> Fut2 + Send + Sync + 'static,
    Fut2: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |ctx| box_future(f(ctx)))
}

/// Builds a [`Middleware`] from an async closure receiving the context
/// and the downstream handler.
///
/// ## Example
///
/// ```
/// use trellis::types::around;
///
/// let timing = around::<(), _, _>(|ctx, next| async move {
///     next(ctx.clone()).await;
/// });
/// # let _ = timing;
/// ```
pub fn around<V, F, Fut2>(f: F) -> Middleware<V>
where
    V: Send + 'static,
    F: Fn(Ctx<V>, Handler<V>) -> Fut2 + Send + Sync + 'static,
    Fut2: Future<Output = ()> + Send + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |next: Handler<V>| {
        let f = f.clone();
        Arc::new(move |ctx: Ctx<V>| box_future(f(ctx, next.clone())))
    })
}

/// Wraps a handler so it refuses to run once the context is done.
pub(crate) fn gate<V: Send + 'static>(inner: Handler<V>) -> Handler<V> {
    Arc::new(move |ctx: Ctx<V>| {
        if ctx.is_done() {
            return box_future(async {});
        }
        inner(ctx)
    })
}

/// Composes a middleware chain around a handler.
///
/// `chain` is ordered outermost first. Wrapping happens in reverse so
/// `chain[0]` sees the request before `chain[1]`, and the handler runs
/// last. Every layer, the handler included, is gated on the context's
/// done flag. An empty chain is the fast path: just the gated handler.
pub(crate) fn compose<V: Send + 'static>(
    chain: &[Middleware<V>],
    handler: Handler<V>,
) -> Handler<V> {
    let mut wrapped = gate(handler);
    for mw in chain.iter().rev() {
        wrapped = gate(mw(wrapped));
    }
    wrapped
}

/// The HTTP methods the router registers handlers for.
///
/// `any` on the registration surface binds all of these to one handler;
/// there is no wildcard variant.
#[derive(Eq, Hash, PartialEq, Clone, Copy, Debug)]
pub enum HttpMethods {
    /// The HTTP GET method, typically used for retrieving resources.
    GET,
    /// The HTTP POST method, commonly used for creating resources or submitting data.
    POST,
    /// The HTTP PUT method, generally used for updating or replacing resources.
    PUT,
    /// The HTTP DELETE method, used to remove resources.
    DELETE,
    /// The HTTP PATCH method, used for making partial updates to resources.
    PATCH,
    /// The HTTP OPTIONS method, used to describe the communication options for the target resource.
    OPTIONS,
    /// The HTTP HEAD method, used to retrieve headers for a resource without the body.
    HEAD,
}

/// Every routable method, in the order advertised by the `Allow` header.
pub(crate) const ALL_METHODS: [HttpMethods; 7] = [
    HttpMethods::GET,
    HttpMethods::POST,
    HttpMethods::PUT,
    HttpMethods::DELETE,
    HttpMethods::PATCH,
    HttpMethods::OPTIONS,
    HttpMethods::HEAD,
];

impl HttpMethods {
    /// Maps a hyper method onto the routable set. Anything outside it
    /// (TRACE, CONNECT, extensions) returns `None` and is answered with
    /// a 404 by the dispatcher.
    pub fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::GET => Some(HttpMethods::GET),
            Method::POST => Some(HttpMethods::POST),
            Method::PUT => Some(HttpMethods::PUT),
            Method::DELETE => Some(HttpMethods::DELETE),
            Method::PATCH => Some(HttpMethods::PATCH),
            Method::OPTIONS => Some(HttpMethods::OPTIONS),
            Method::HEAD => Some(HttpMethods::HEAD),
            _ => None,
        }
    }
}

/// The route-registration surface shared by [`crate::app::App`] and the
/// mountable [`crate::router::Router`].
///
/// Implementors provide [`RouterFns::add_route`]; everything else is
/// method sugar over it.
pub trait RouterFns<V: Send + 'static> {
    /// Registers a handler for `method` at `path`, with `middlewares`
    /// applied route-locally (innermost).
    fn add_route(
        &mut self,
        method: HttpMethods,
        path: &str,
        middlewares: Vec<Middleware<V>>,
        handler: Handler<V>,
    );

    /// Registers a handler with route-local middleware.
    fn route<F, Fut2>(
        &mut self,
        method: HttpMethods,
        path: &str,
        middlewares: Vec<Middleware<V>>,
        handler: F,
    ) -> &mut Self
    where
        Self: Sized,
        F: Fn(Ctx<V>) -> Fut2 + Send + Sync + 'static,
        Fut2: Future<Output = ()> + Send + 'static,
    {
        self.add_route(method, path, middlewares, into_handler(handler));
        self
    }

    /// Registers a GET handler.
    fn get<F, Fut2>(&mut self, path: &str, handler: F) -> &mut Self
    where
        Self: Sized,
        F: Fn(Ctx<V>) -> Fut2 + Send + Sync + 'static,
        Fut2: Future<Output = ()> + Send + 'static,
    {
        self.route(HttpMethods::GET, path, Vec::new(), handler)
    }

    /// Registers a POST handler.
    fn post<F, Fut2>(&mut self, path: &str, handler: F) -> &mut Self
    where
        Self: Sized,
        F: Fn(Ctx<V>) -> Fut2 + Send + Sync + 'static,
        Fut2: Future<Output = ()> + Send + 'static,
    {
        self.route(HttpMethods::POST, path, Vec::new(), handler)
    }

    /// Registers a PUT handler.
    fn put<F, Fut2>(&mut self, path: &str, handler: F) -> &mut Self
    where
        Self: Sized,
        F: Fn(Ctx<V>) -> Fut2 + Send + Sync + 'static,
        Fut2: Future<Output = ()> + Send + 'static,
    {
        self.route(HttpMethods::PUT, path, Vec::new(), handler)
    }

    /// Registers a DELETE handler.
    fn delete<F, Fut2>(&mut self, path: &str, handler: F) -> &mut Self
    where
        Self: Sized,
        F: Fn(Ctx<V>) -> Fut2 + Send + Sync + 'static,
        Fut2: Future<Output = ()> + Send + 'static,
    {
        self.route(HttpMethods::DELETE, path, Vec::new(), handler)
    }

    /// Registers a PATCH handler.
    fn patch<F, Fut2>(&mut self, path: &str, handler: F) -> &mut Self
    where
        Self: Sized,
        F: Fn(Ctx<V>) -> Fut2 + Send + Sync + 'static,
        Fut2: Future<Output = ()> + Send + 'static,
    {
        self.route(HttpMethods::PATCH, path, Vec::new(), handler)
    }

    /// Registers an OPTIONS handler.
    fn options<F, Fut2>(&mut self, path: &str, handler: F) -> &mut Self
    where
        Self: Sized,
        F: Fn(Ctx<V>) -> Fut2 + Send + Sync + 'static,
        Fut2: Future<Output = ()> + Send + 'static,
    {
        self.route(HttpMethods::OPTIONS, path, Vec::new(), handler)
    }

    /// Registers a HEAD handler.
    fn head<F, Fut2>(&mut self, path: &str, handler: F) -> &mut Self
    where
        Self: Sized,
        F: Fn(Ctx<V>) -> Fut2 + Send + Sync + 'static,
        Fut2: Future<Output = ()> + Send + 'static,
    {
        self.route(HttpMethods::HEAD, path, Vec::new(), handler)
    }

    /// Binds one handler to every method at `path`.
    fn any<F, Fut2>(&mut self, path: &str, handler: F) -> &mut Self
    where
        Self: Sized,
        F: Fn(Ctx<V>) -> Fut2 + Send + Sync + 'static,
        Fut2: Future<Output = ()> + Send + 'static,
    {
        let handler = into_handler(handler);
        for method in ALL_METHODS {
            self.add_route(method, path, Vec::new(), handler.clone());
        }
        self
    }
}

impl Display for HttpMethods {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let method = match self {
            HttpMethods::GET => "GET",
            HttpMethods::POST => "POST",
            HttpMethods::PUT => "PUT",
            HttpMethods::DELETE => "DELETE",
            HttpMethods::PATCH => "PATCH",
            HttpMethods::OPTIONS => "OPTIONS",
            HttpMethods::HEAD => "HEAD",
        };
        write!(f, "{}", method)
    }
}
