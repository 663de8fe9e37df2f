#![warn(missing_docs)]

//! # Trellis
//!
//! Trellis is a tree-routed HTTP framework core: a radix-style router
//! with static, parameter, embedded-parameter and wildcard segments, a
//! composable middleware chain with a cooperative done gate, and a typed
//! per-request context carrying parameters, the lazily parsed query,
//! bounded body reads and the standard response envelope.
//!
//! ## Modules
//!
//! - [`app`] - The application struct: registration, dispatch and the listener.
//! - [`router`] - The mountable route group and the routing tree underneath.
//! - [`ctx`] - The per-request context handed to middleware and handlers.
//! - [`res`] - The response writer observer and the response envelope.
//! - [`conn`] - Connection classification (HTTP / SSE / WebSocket).
//! - [`middlewares`] - Builtin middleware: panic recovery and the access logger.
//! - [`error`] - The error taxonomy and the typed error value.
//! - [`config`] - Process-wide configuration.
//! - [`types`] - Handler and middleware types and the registration trait.

/// The application struct: registration, dispatch and the listener.
///
/// See [`app::App`] for details.
pub mod app;

/// Process-wide configuration.
pub mod config;

/// Connection classification (HTTP / SSE / WebSocket).
pub mod conn;

/// The per-request context handed to middleware and handlers.
///
/// See [`ctx::Ctx`] for details.
pub mod ctx;

/// The error taxonomy and the typed error value.
pub mod error;

/// Builtin middleware: panic recovery and the access logger.
pub mod middlewares;

/// The response writer observer and the response envelope.
pub mod res;

/// The mountable route group and the routing tree underneath.
pub mod router;

/// Handler and middleware types and the registration trait.
pub mod types;

pub(crate) mod helpers;
pub(crate) mod static_cache;

mod tests;

pub use app::App;
pub use conn::ConnKind;
pub use ctx::{Ctx, CtxState};
pub use error::{Error, ErrorCode};
pub use middlewares::recovery::{HandlerAborted, abort_handler};
pub use res::envelope::{Envelope, Pagination};
pub use router::Router;
pub use types::{Handler, HttpMethods, Middleware, RouterFns, around, into_handler};
