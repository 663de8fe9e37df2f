use crate::app::App;
use crate::types::{Handler, HttpMethods, Middleware, RouterFns};

pub(crate) mod path;
pub(crate) mod tree;

/// A mountable group of routes under a common base path.
///
/// A `Router` collects routes and group middleware, then mounts them
/// onto an [`App`] with [`Router::register`]. Mounting is registration
/// sugar: the base path is prepended to each route's pattern and the
/// group middleware is prepended to each route's local middleware at
/// that moment. Global middleware added to the app after `register`
/// does not retroactively apply to the mounted routes.
///
/// # Example
///
/// ```
/// use trellis::{app::App, router::Router, types::RouterFns};
///
/// let mut api = Router::new("/api");
/// api.get("/health", |ctx| async move {
///     ctx.send_string(200, "ok");
/// });
///
/// let mut app = App::<()>::new();
/// api.register(&mut app);
/// ```
pub struct Router<V: Send + 'static = ()> {
    base_path: String,
    middlewares: Vec<Middleware<V>>,
    routes: Vec<PendingRoute<V>>,
}

struct PendingRoute<V> {
    method: HttpMethods,
    path: String,
    middlewares: Vec<Middleware<V>>,
    handler: Handler<V>,
}

impl<V: Send + 'static> Router<V> {
    /// Creates a router mounted (eventually) at `base_path`.
    pub fn new<P: Into<String>>(base_path: P) -> Self {
        Router {
            base_path: base_path.into(),
            middlewares: Vec::new(),
            routes: Vec::new(),
        }
    }

    /// Adds middleware applying to every route of this group.
    ///
    /// Group middleware runs after the app's global middleware and
    /// before each route's own.
    pub fn use_middleware(&mut self, middleware: Middleware<V>) -> &mut Self {
        self.middlewares.push(middleware);
        self
    }

    /// Mounts the group's routes onto an app.
    pub fn register(self, app: &mut App<V>) {
        for route in self.routes {
            let pattern = join_paths(&self.base_path, &route.path);
            let mut middlewares =
                Vec::with_capacity(self.middlewares.len() + route.middlewares.len());
            middlewares.extend(self.middlewares.iter().cloned());
            middlewares.extend(route.middlewares);
            app.add_route(route.method, &pattern, middlewares, route.handler);
        }
    }
}

impl<V: Send + 'static> RouterFns<V> for Router<V> {
    fn add_route(
        &mut self,
        method: HttpMethods,
        path: &str,
        middlewares: Vec<Middleware<V>>,
        handler: Handler<V>,
    ) {
        self.routes.push(PendingRoute {
            method,
            path: path.to_string(),
            middlewares,
            handler,
        });
    }
}

fn join_paths(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let joined = if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    };
    if joined.is_empty() {
        "/".to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::join_paths;

    #[test]
    fn join_handles_root_and_nesting() {
        assert_eq!(join_paths("/", "/health"), "/health");
        assert_eq!(join_paths("/api", "/users"), "/api/users");
        assert_eq!(join_paths("/api/", "users"), "/api/users");
        assert_eq!(join_paths("/", "/"), "/");
    }
}
