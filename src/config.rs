/// Process-wide server configuration.
///
/// Read-mostly: set everything before calling `App::listen`. The body and
/// header caps bound per-request memory; the flags toggle optional
/// behaviour that is off (or on) by default.
///
/// ## Example
///
/// ```
/// use trellis::config::ServerConfig;
///
/// let config = ServerConfig {
///     enable_security_headers: true,
///     ..Default::default()
/// };
/// assert_eq!(config.max_body_size, 10 * 1024 * 1024);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Cap in bytes for reading a request body. Exceeding it fails the
    /// read with an `invalid_request` error. A context may raise (or
    /// lower) its own cap per request.
    pub max_body_size: usize,

    /// Cap in bytes for the request head, handed to the listener.
    pub max_header_size: usize,

    /// When set, every response carries `X-Content-Type-Options`,
    /// `X-Frame-Options` and `X-XSS-Protection`.
    pub enable_security_headers: bool,

    /// When set, access-log emission is skipped entirely if no tracing
    /// subscriber would record it.
    pub enable_logger_check: bool,

    /// When set, response buffers are allocated on first use instead of
    /// up front.
    pub defer_buffer_allocation: bool,

    /// Byte budget for the in-memory file cache used by the file
    /// response helpers. `None` disables caching.
    pub file_cache_bytes: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            max_body_size: 10 * 1024 * 1024,
            max_header_size: 1024 * 1024,
            enable_security_headers: false,
            enable_logger_check: true,
            defer_buffer_allocation: true,
            file_cache_bytes: None,
        }
    }
}
