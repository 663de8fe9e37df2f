use hyper::HeaderMap;
use std::net::IpAddr;
use std::sync::Mutex;

const POOL_MAX_BUFFER: usize = 64 * 1024;
const POOL_MAX_ENTRIES: usize = 64;

static JSON_BUFFERS: Mutex<Vec<Vec<u8>>> = Mutex::new(Vec::new());

/// Takes a scratch buffer from the process-global JSON pool.
pub(crate) fn take_buffer(prealloc: bool) -> Vec<u8> {
    if let Some(buf) = lock(&JSON_BUFFERS).pop() {
        return buf;
    }
    if prealloc {
        Vec::with_capacity(4096)
    } else {
        Vec::new()
    }
}

/// Returns a buffer to the pool. Oversized buffers are dropped so the
/// pool's resident memory stays bounded.
pub(crate) fn put_buffer(mut buf: Vec<u8>) {
    if buf.capacity() > POOL_MAX_BUFFER {
        return;
    }
    buf.clear();
    let mut pool = lock(&JSON_BUFFERS);
    if pool.len() < POOL_MAX_ENTRIES {
        pool.push(buf);
    }
}

/// Locks a mutex, recovering the guard if a panicking holder poisoned it.
pub(crate) fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Resolves the client IP for a request.
///
/// Precedence: the first entry of `X-Forwarded-For` that parses as an IP
/// (entries are comma-separated and trimmed), then a valid `X-Real-IP`,
/// then the remote address with its port stripped. Bracketed IPv6
/// (`[::1]:8080`), bare IPv6 and plain IPv4 remote addresses are all
/// handled; an address with no identifiable port separator is returned
/// verbatim, and an empty remote address yields `0.0.0.0`.
pub(crate) fn client_ip(headers: &HeaderMap, remote_addr: &str) -> String {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        for entry in forwarded.split(',') {
            let candidate = entry.trim();
            if candidate.parse::<IpAddr>().is_ok() {
                return candidate.to_string();
            }
        }
    }

    if let Some(real) = header_str(headers, "x-real-ip") {
        let candidate = real.trim();
        if candidate.parse::<IpAddr>().is_ok() {
            return candidate.to_string();
        }
    }

    if remote_addr.is_empty() {
        return "0.0.0.0".to_string();
    }
    strip_port(remote_addr)
}

fn strip_port(addr: &str) -> String {
    if let Some(rest) = addr.strip_prefix('[') {
        // bracketed IPv6, with or without a port
        if let Some(end) = rest.find(']') {
            return rest[..end].to_string();
        }
        return addr.to_string();
    }

    match addr.bytes().filter(|b| *b == b':').count() {
        0 => addr.to_string(),
        1 => addr.split(':').next().unwrap_or(addr).to_string(),
        // more than one colon and no brackets: bare IPv6, no port
        _ => addr.to_string(),
    }
}
