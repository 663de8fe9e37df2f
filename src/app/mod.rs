use crate::config::ServerConfig;
use crate::middlewares::logger::{LoggerConfig, logger};
use crate::middlewares::recovery::recovery;
use crate::router::tree::RouteTree;
use crate::static_cache::FileCache;
use crate::types::{Handler, HttpMethods, Middleware, RouterFns};
use std::sync::Arc;

pub(crate) mod dispatch;
mod serve;

/// The application: the route tree, the middleware channels and the
/// listener entry point.
///
/// Registration is expected to finish before [`App::listen`] runs;
/// `listen` consumes the app, after which the tree is immutable and
/// lookups are lock-free. The type parameter `V` is the user data type
/// carried by every request context.
///
/// ## Example
///
/// ```no_run
/// use trellis::{app::App, types::RouterFns};
///
/// #[tokio::main]
/// async fn main() {
///     let mut app = App::<()>::new();
///     app.get("/health", |ctx| async move {
///         ctx.send_string(200, "ok");
///     });
///     app.listen(3000, || println!("listening on port 3000")).await;
/// }
/// ```
pub struct App<V: Send + 'static = ()> {
    tree: RouteTree<V>,
    pre_middlewares: Vec<Middleware<V>>,
    middlewares: Vec<Middleware<V>>,
    config: Arc<ServerConfig>,
    cache: Option<Arc<FileCache>>,
}

impl<V: Send + 'static> App<V> {
    /// Creates an app with default configuration. The recovery
    /// middleware is installed outermost from the start.
    pub fn new() -> Self {
        App {
            tree: RouteTree::new(),
            pre_middlewares: vec![recovery()],
            middlewares: Vec::new(),
            config: Arc::new(ServerConfig::default()),
            cache: None,
        }
    }

    /// Replaces the configuration. Call before registering routes that
    /// depend on it and before `listen`.
    pub fn set_config(&mut self, config: ServerConfig) -> &mut Self {
        self.cache = config.file_cache_bytes.map(|cap| Arc::new(FileCache::new(cap)));
        self.config = Arc::new(config);
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Adds middleware on the ordinary global channel. Applies to
    /// routes registered afterwards.
    pub fn use_middleware(&mut self, middleware: Middleware<V>) -> &mut Self {
        self.middlewares.push(middleware);
        self
    }

    /// Adds middleware on the global-top channel: it runs before every
    /// ordinary global middleware (but inside recovery).
    pub fn use_pre(&mut self, middleware: Middleware<V>) -> &mut Self {
        self.pre_middlewares.push(middleware);
        self
    }

    /// Attaches middleware to the tree node at `prefix`. Routes
    /// registered under that prefix afterwards inherit it, between the
    /// global channel and their route-local middleware.
    pub fn use_at(&mut self, prefix: &str, middleware: Middleware<V>) -> &mut Self {
        self.tree.attach(prefix, middleware);
        self
    }

    /// Adds the builtin access logger on the global channel.
    pub fn use_logger(&mut self, config: Option<LoggerConfig>) -> &mut Self {
        self.use_middleware(logger(config))
    }
}

impl<V: Send + 'static> Default for App<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Send + 'static> RouterFns<V> for App<V> {
    fn add_route(
        &mut self,
        method: HttpMethods,
        path: &str,
        middlewares: Vec<Middleware<V>>,
        handler: Handler<V>,
    ) {
        let mut upstream =
            Vec::with_capacity(self.pre_middlewares.len() + self.middlewares.len());
        upstream.extend(self.pre_middlewares.iter().cloned());
        upstream.extend(self.middlewares.iter().cloned());
        self.tree
            .insert(method, path, handler, &upstream, &middlewares);
    }
}
