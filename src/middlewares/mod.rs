/// Access-log middleware emitting one line per request.
pub mod logger;

/// Panic trapping and abort triage around the downstream chain.
pub mod recovery;
