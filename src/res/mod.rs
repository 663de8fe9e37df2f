use crate::error::{Error, ErrorCode};
use bytes::Bytes;
use hyper::header::{HeaderName, HeaderValue};
use hyper::upgrade::OnUpgrade;
use hyper::{HeaderMap, StatusCode};
use std::io;

/// The standard success/error response envelope and paging metadata.
pub mod envelope;

/// The writer the framework ultimately hands bytes to.
///
/// The listener supplies one implementation per request; tests supply a
/// recording one. Capabilities a backend does not support keep the
/// default arms and report a typed "not supported" error instead of
/// panicking.
pub trait RawWriter: Send + 'static {
    /// Commits the status line and headers. Called exactly once, before
    /// the first body byte.
    fn write_head(&mut self, status: StatusCode, headers: &HeaderMap);

    /// Writes a body chunk, returning how many bytes were consumed.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Forces buffered bytes out, for SSE and chunked streaming.
    fn flush(&mut self) -> Result<(), Error> {
        Err(Error::new(ErrorCode::Internal).with_message("flush not supported"))
    }

    /// Takes over the connection for a protocol upgrade.
    fn hijack(&mut self) -> Result<OnUpgrade, Error> {
        Err(Error::new(ErrorCode::Internal).with_message("hijack not supported"))
    }

    /// Initiates an HTTP/2 server push for `path`.
    fn push(&mut self, _path: &str) -> Result<(), Error> {
        Err(Error::new(ErrorCode::Internal).with_message("push not supported"))
    }

    /// Lifts any write deadline armed on the underlying connection, so
    /// long-lived streams are not cut off.
    fn clear_write_deadline(&mut self) -> Result<(), Error> {
        Err(Error::new(ErrorCode::Internal).with_message("write deadline control not supported"))
    }
}

/// Observer around a [`RawWriter`].
///
/// Records the first status written (200 if a body write happens
/// first), the cumulative body bytes, and whether anything has been
/// committed; stages response headers until the head goes out; and
/// elides body writes for HEAD requests while letting headers and
/// status through.
pub struct ResponseWriter {
    inner: Box<dyn RawWriter>,
    status: StatusCode,
    headers: HeaderMap,
    head_sent: bool,
    wrote: bool,
    bytes_written: u64,
    head_request: bool,
    request_body: Option<Bytes>,
}

impl ResponseWriter {
    pub(crate) fn new(inner: Box<dyn RawWriter>, head_request: bool) -> Self {
        ResponseWriter {
            inner,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            head_sent: false,
            wrote: false,
            bytes_written: 0,
            head_request,
            request_body: None,
        }
    }

    /// The status that has been, or will be, sent.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Sets the response status. Ignored once the head is on the wire.
    pub fn set_status(&mut self, status: StatusCode) {
        if !self.head_sent {
            self.status = status;
        }
    }

    /// Whether status or body bytes have been committed.
    pub fn written(&self) -> bool {
        self.wrote
    }

    /// Cumulative body bytes pushed to the underlying writer.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub(crate) fn insert_header(&mut self, name: &str, value: &str) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
    }

    pub(crate) fn append_header(&mut self, name: &str, value: &str) {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
    }

    pub(crate) fn remove_header(&mut self, name: &str) {
        if let Ok(name) = HeaderName::from_bytes(name.as_bytes()) {
            self.headers.remove(name);
        }
    }

    pub(crate) fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Commits the head if it is still pending.
    pub(crate) fn send_head(&mut self) {
        if !self.head_sent {
            self.inner.write_head(self.status, &self.headers);
            self.head_sent = true;
            self.wrote = true;
        }
    }

    /// Writes a full body chunk, committing the head first. For HEAD
    /// requests the body is elided; headers, status and the reported
    /// length still go out.
    pub(crate) fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        self.send_head();
        if self.head_request {
            return Ok(());
        }
        while !buf.is_empty() {
            let n = self.inner.write(buf)?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "writer made no progress",
                ));
            }
            self.bytes_written += n as u64;
            buf = &buf[n..];
        }
        Ok(())
    }

    pub(crate) fn flush(&mut self) -> Result<(), Error> {
        self.inner.flush()
    }

    pub(crate) fn hijack(&mut self) -> Result<OnUpgrade, Error> {
        self.inner.hijack()
    }

    pub(crate) fn push(&mut self, path: &str) -> Result<(), Error> {
        self.inner.push(path)
    }

    pub(crate) fn clear_write_deadline(&mut self) -> Result<(), Error> {
        self.inner.clear_write_deadline()
    }

    /// Snapshots the request body for post-hoc inspection once it has
    /// been read.
    pub(crate) fn capture_request_body(&mut self, body: Bytes) {
        self.request_body = Some(body);
    }

    pub(crate) fn captured_request_body(&self) -> Option<&Bytes> {
        self.request_body.as_ref()
    }

    /// Clears observed state for reuse. The underlying writer is kept.
    pub(crate) fn reset(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.head_sent = false;
        self.wrote = false;
        self.bytes_written = 0;
        self.request_body = None;
    }
}
