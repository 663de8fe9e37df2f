use crate::types::{Middleware, around};
use std::fmt::Write as _;
use std::time::Instant;

/// Configuration for the access-log middleware.
///
/// ## Fields
///
/// * `method` - whether to log the method
/// * `path` - whether to log the path
/// * `status` - whether to log the response status
/// * `duration` - whether to log the elapsed time
#[derive(Clone)]
pub struct LoggerConfig {
    /// Whether to log the method.
    pub method: bool,

    /// Whether to log the path.
    pub path: bool,

    /// Whether to log the response status.
    pub status: bool,

    /// Whether to log the elapsed time.
    pub duration: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig {
            method: true,
            path: true,
            status: true,
            duration: true,
        }
    }
}

/// Builtin access-log middleware.
///
/// Emits one `INFO` line per request on the `trellis::access` target
/// once the downstream chain returns. When `enable_logger_check` is on
/// and no subscriber would record the line, the whole emission is
/// skipped.
///
/// ## Example
///
/// ```
/// use trellis::{app::App, middlewares::logger::logger};
///
/// let mut app = App::<()>::new();
/// app.use_middleware(logger(None));
/// ```
pub fn logger<V: Send + 'static>(config: Option<LoggerConfig>) -> Middleware<V> {
    let config = config.unwrap_or_default();
    around(move |ctx, next| {
        let config = config.clone();
        async move {
            let skip = ctx.config().enable_logger_check
                && !tracing::enabled!(target: "trellis::access", tracing::Level::INFO);
            if skip {
                next(ctx).await;
                return;
            }

            let start = Instant::now();
            let method = ctx.method();
            let path = ctx.path().to_string();
            next(ctx.clone()).await;

            let mut line = String::new();
            if config.method {
                let _ = write!(line, "{} ", method);
            }
            if config.path {
                let _ = write!(line, "{} ", path);
            }
            if config.status {
                let _ = write!(line, "{} ", ctx.writer().status().as_u16());
            }
            if config.duration {
                let _ = write!(line, "{}ms", start.elapsed().as_millis());
            }
            tracing::info!(target: "trellis::access", "{}", line.trim_end());
        }
    })
}
