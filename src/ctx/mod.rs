use crate::config::ServerConfig;
use crate::conn::ConnKind;
use crate::error::{Error, ErrorCode};
use crate::helpers;
use crate::res::ResponseWriter;
use crate::static_cache::FileCache;
use ahash::AHashMap;
use hyper::HeaderMap;
use hyper::upgrade::OnUpgrade;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Instant;
use tokio::sync::watch;

pub(crate) mod body;

/// The lazily parsed query-string map.
pub mod query_params;

pub(crate) mod respond;

/// Path parameters bound by the route lookup.
pub mod route_params;

pub use route_params::RouteParams;

use body::BodyState;
pub(crate) use body::BodySource;

use crate::types::HttpMethods;

/// The immutable request facts a context is built from.
pub(crate) struct RequestHead {
    pub method: HttpMethods,
    pub path: String,
    pub query: String,
    pub headers: HeaderMap,
    pub remote_addr: String,
    pub request_id: String,
    pub cancel: Option<watch::Receiver<bool>>,
}

/// Where a context is in its response lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtxState {
    /// Nothing committed yet; headers and status may still change.
    Fresh,
    /// Status or body bytes are on the wire.
    Written,
    /// Terminal; no middleware or handler runs on this context again.
    Done,
}

struct Shared<V> {
    method: HttpMethods,
    path: String,
    query_raw: String,
    headers: HeaderMap,
    remote_addr: String,
    request_id: String,
    start: Instant,
    config: Arc<ServerConfig>,
    cache: Option<Arc<FileCache>>,
    cancel: Option<watch::Receiver<bool>>,

    writer: Mutex<ResponseWriter>,
    params: Mutex<RouteParams>,
    query: OnceLock<query_params::QueryParams>,
    body: tokio::sync::Mutex<BodyState>,
    data: Mutex<V>,
    done: AtomicBool,
    conn_kind: OnceLock<ConnKind>,
    max_body_override: AtomicUsize,
}

/// The per-request context handed to middleware and handlers.
///
/// `Ctx` is a cheap handle: clones share one underlying request state,
/// which is what lets the recovery middleware keep a probe across the
/// handler and lets handlers pass the context to background tasks. The
/// type parameter `V` is a user-defined slot carried through the request
/// untouched by the framework; see [`Ctx::with_data`].
///
/// ## Example
///
/// ```no_run
/// use trellis::{app::App, types::RouterFns};
///
/// let mut app = App::<()>::new();
/// app.get("/users/:id", |ctx| async move {
///     let id = ctx.param("id");
///     ctx.send_string(200, &format!("user {}", id));
/// });
/// ```
pub struct Ctx<V> {
    shared: Arc<Shared<V>>,
}

impl<V> Clone for Ctx<V> {
    fn clone(&self) -> Self {
        Ctx {
            shared: self.shared.clone(),
        }
    }
}

impl<V: Default + Send + 'static> Ctx<V> {
    pub(crate) fn new(
        head: RequestHead,
        body: BodySource,
        writer: ResponseWriter,
        config: Arc<ServerConfig>,
        cache: Option<Arc<FileCache>>,
    ) -> Self {
        Ctx {
            shared: Arc::new(Shared {
                method: head.method,
                path: head.path,
                query_raw: head.query,
                headers: head.headers,
                remote_addr: head.remote_addr,
                request_id: head.request_id,
                start: Instant::now(),
                config,
                cache,
                cancel: head.cancel,
                writer: Mutex::new(writer),
                params: Mutex::new(RouteParams::new()),
                query: OnceLock::new(),
                body: tokio::sync::Mutex::new(BodyState::new(body)),
                data: Mutex::new(V::default()),
                done: AtomicBool::new(false),
                conn_kind: OnceLock::new(),
                max_body_override: AtomicUsize::new(0),
            }),
        }
    }

    /// Clears all mutable state so the context can be reused.
    ///
    /// Parameters, staged response headers, the cached body and the
    /// user slot are all dropped; the done flag is lowered. The request
    /// facts (method, path, headers) are immutable and stay.
    pub fn reset(&self) {
        helpers::lock(&self.shared.params).clear();
        self.writer().reset();
        if let Ok(mut body) = self.shared.body.try_lock() {
            body.reset();
        }
        *helpers::lock(&self.shared.data) = V::default();
        self.shared.done.store(false, Ordering::Release);
        self.shared.max_body_override.store(0, Ordering::Release);
    }
}

impl<V: Send + 'static> Ctx<V> {
    // ---- request facts -------------------------------------------------

    /// The request method.
    pub fn method(&self) -> HttpMethods {
        self.shared.method
    }

    /// The raw request path, undecoded.
    pub fn path(&self) -> &str {
        &self.shared.path
    }

    /// The opaque request id supplied by the listener.
    pub fn request_id(&self) -> &str {
        &self.shared.request_id
    }

    /// When the dispatcher started this request.
    pub fn start(&self) -> Instant {
        self.shared.start
    }

    pub(crate) fn elapsed_seconds(&self) -> f64 {
        self.shared.start.elapsed().as_secs_f64()
    }

    /// The request headers.
    pub fn request_headers(&self) -> &HeaderMap {
        &self.shared.headers
    }

    /// A request header value, if present and valid UTF-8.
    pub fn get_header(&self, name: &str) -> Option<String> {
        self.shared
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    /// Stages a response header.
    pub fn set_header(&self, name: &str, value: &str) {
        self.writer().insert_header(name, value);
    }

    /// Removes a staged response header.
    pub fn del_header(&self, name: &str) {
        self.writer().remove_header(name);
    }

    /// The connection class deduced before the first middleware ran.
    pub fn conn_kind(&self) -> ConnKind {
        self.shared
            .conn_kind
            .get()
            .copied()
            .unwrap_or(ConnKind::Http)
    }

    pub(crate) fn set_conn_kind(&self, kind: ConnKind) {
        let _ = self.shared.conn_kind.set(kind);
    }

    /// Resolves the client IP: first valid `X-Forwarded-For` entry,
    /// then `X-Real-IP`, then the remote address with its port
    /// stripped. `0.0.0.0` when nothing is available.
    pub fn client_ip(&self) -> String {
        helpers::client_ip(&self.shared.headers, &self.shared.remote_addr)
    }

    /// Resolves once the client has gone away; pends forever when the
    /// listener provides no cancellation signal. Handlers streaming for
    /// long periods should select on this.
    pub async fn cancelled(&self) {
        match &self.shared.cancel {
            Some(rx) => {
                let mut rx = rx.clone();
                loop {
                    if *rx.borrow() {
                        return;
                    }
                    if rx.changed().await.is_err() {
                        return;
                    }
                }
            }
            None => futures::future::pending::<()>().await,
        }
    }

    // ---- path parameters ----------------------------------------------

    /// The captured value for a path parameter, or `""` when absent.
    pub fn param(&self, name: &str) -> String {
        helpers::lock(&self.shared.params)
            .get(name)
            .unwrap_or("")
            .to_string()
    }

    /// The captured value for a path parameter.
    pub fn get_param(&self, name: &str) -> Option<String> {
        helpers::lock(&self.shared.params)
            .get(name)
            .map(str::to_string)
    }

    /// Sets a path parameter, shadowing any captured value.
    pub fn set_param(&self, name: &str, value: &str) {
        helpers::lock(&self.shared.params).set(name, value);
    }

    /// A path parameter percent-decoded. Captured values are raw
    /// segment bytes; decoding is opt-in.
    pub fn decoded_param(&self, name: &str) -> Option<String> {
        self.get_param(name)
            .map(|raw| urlencoding::decode(&raw).map(|s| s.into_owned()).unwrap_or(raw))
    }

    pub(crate) fn bind_params(&self, names: &[String], values: Vec<String>) {
        *helpers::lock(&self.shared.params) = RouteParams::bind(names, values);
    }

    /// A snapshot of the bound path parameters.
    pub fn params(&self) -> RouteParams {
        helpers::lock(&self.shared.params).clone()
    }

    // ---- query parameters ----------------------------------------------

    fn query(&self) -> &query_params::QueryParams {
        self.shared
            .query
            .get_or_init(|| query_params::QueryParams::parse(&self.shared.query_raw))
    }

    /// A parameter by name: the path-parameter map first, the query
    /// string second. Empty when neither has it.
    pub fn query_param(&self, name: &str) -> String {
        if let Some(value) = helpers::lock(&self.shared.params).get(name) {
            return value.to_string();
        }
        self.query().first(name).unwrap_or("").to_string()
    }

    /// Like [`Ctx::query_param`], with a fallback.
    pub fn default_query_param(&self, name: &str, default: &str) -> String {
        let value = self.query_param(name);
        if value.is_empty() {
            default.to_string()
        } else {
            value
        }
    }

    /// A value strictly from the query string; path parameters are
    /// never consulted. Empty when absent.
    pub fn query_value(&self, name: &str) -> String {
        self.query().first(name).unwrap_or("").to_string()
    }

    /// Every query value registered under `name`.
    pub fn query_array(&self, name: &str) -> Vec<String> {
        self.query().all(name).to_vec()
    }

    /// The whole query map.
    pub fn query_map(&self) -> AHashMap<String, Vec<String>> {
        self.query().map().clone()
    }

    // ---- cookies -------------------------------------------------------

    /// Reads a named request cookie.
    pub fn cookie(&self, name: &str) -> Result<String, Error> {
        let header = self
            .get_header("cookie")
            .ok_or_else(|| Error::new(ErrorCode::InvalidRequest).with_message(format!(
                "cookie '{}' not present",
                name
            )))?;
        for parsed in cookie::Cookie::split_parse(header.as_str()).flatten() {
            if parsed.name() == name {
                return Ok(parsed.value().to_string());
            }
        }
        Err(Error::new(ErrorCode::InvalidRequest)
            .with_message(format!("cookie '{}' not present", name)))
    }

    /// Stages a `Set-Cookie` header.
    ///
    /// An empty `path` defaults to `/`; an empty `domain` defaults to
    /// the request host; a non-positive `max_age` makes a session
    /// cookie.
    pub fn set_cookie(
        &self,
        name: &str,
        value: &str,
        max_age: i64,
        path: &str,
        domain: &str,
        secure: bool,
        http_only: bool,
    ) {
        let mut cookie = cookie::Cookie::new(name.to_string(), value.to_string());
        cookie.set_path(if path.is_empty() { "/" } else { path }.to_string());
        let domain = if domain.is_empty() {
            self.get_header("host")
                .map(|host| host.split(':').next().unwrap_or("").to_string())
                .unwrap_or_default()
        } else {
            domain.to_string()
        };
        if !domain.is_empty() {
            cookie.set_domain(domain);
        }
        if max_age > 0 {
            cookie.set_max_age(cookie::time::Duration::seconds(max_age));
        }
        cookie.set_secure(secure);
        cookie.set_http_only(http_only);
        self.writer()
            .append_header("set-cookie", &cookie.to_string());
    }

    // ---- user slot -----------------------------------------------------

    /// Runs a closure over the typed user slot.
    pub fn with_data<R>(&self, f: impl FnOnce(&mut V) -> R) -> R {
        f(&mut helpers::lock(&self.shared.data))
    }

    /// Replaces the typed user slot.
    pub fn set_data(&self, value: V) {
        *helpers::lock(&self.shared.data) = value;
    }

    // ---- lifecycle -----------------------------------------------------

    /// Marks the context terminal. Idempotent; once set, no further
    /// middleware, handler or response helper runs.
    pub fn done(&self) {
        self.shared.done.store(true, Ordering::Release);
    }

    /// Whether the context is terminal.
    pub fn is_done(&self) -> bool {
        self.shared.done.load(Ordering::Acquire)
    }

    /// Where this context is in its response lifecycle.
    pub fn state(&self) -> CtxState {
        if self.is_done() {
            CtxState::Done
        } else if self.writer().written() {
            CtxState::Written
        } else {
            CtxState::Fresh
        }
    }

    /// Raises (or lowers) the body-size cap for this request only.
    pub fn set_max_body_size(&self, bytes: usize) {
        self.shared.max_body_override.store(bytes, Ordering::Release);
    }

    pub(crate) fn effective_body_cap(&self) -> usize {
        let over = self.shared.max_body_override.load(Ordering::Acquire);
        over.max(self.shared.config.max_body_size)
    }

    // ---- writer capabilities -------------------------------------------

    pub(crate) fn writer(&self) -> MutexGuard<'_, ResponseWriter> {
        helpers::lock(&self.shared.writer)
    }

    /// Forces buffered response bytes out.
    pub fn flush(&self) -> Result<(), Error> {
        self.writer().flush()
    }

    /// Takes over the connection for a protocol upgrade (WebSocket).
    pub fn hijack(&self) -> Result<OnUpgrade, Error> {
        self.writer().hijack()
    }

    /// Initiates an HTTP/2 server push for `path`.
    pub fn push(&self, path: &str) -> Result<(), Error> {
        self.writer().push(path)
    }

    pub(crate) fn clear_write_deadline(&self) -> Result<(), Error> {
        self.writer().clear_write_deadline()
    }

    pub(crate) fn config(&self) -> &ServerConfig {
        &self.shared.config
    }

    pub(crate) fn file_cache(&self) -> Option<&Arc<FileCache>> {
        self.shared.cache.as_ref()
    }
}

#[cfg(test)]
impl<V: Default + Send + 'static> Ctx<V> {
    pub(crate) fn for_test(
        head: RequestHead,
        body: BodySource,
        writer: Box<dyn crate::res::RawWriter>,
        config: ServerConfig,
    ) -> Self {
        let head_request = head.method == HttpMethods::HEAD;
        Ctx::new(
            head,
            body,
            ResponseWriter::new(writer, head_request),
            Arc::new(config),
            None,
        )
    }
}
