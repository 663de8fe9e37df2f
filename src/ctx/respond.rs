use crate::ctx::Ctx;
use crate::error::{Error, ErrorCode};
use crate::helpers;
use crate::res::envelope::{Envelope, Pagination};
use hyper::StatusCode;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};

impl<V: Send + 'static> Ctx<V> {
    /// The single exit point for buffered responses.
    ///
    /// No-op once the context is done. Otherwise: stage Content-Type
    /// (unless the handler already set one) and Content-Length, commit
    /// the status, write the body (elided for HEAD), log any write
    /// failure with path and client IP, and mark the context done.
    fn commit(&self, status: StatusCode, content_type: Option<&str>, body: &[u8]) {
        if self.is_done() {
            return;
        }
        let write_result = {
            let mut writer = self.writer();
            if let Some(content_type) = content_type {
                if writer.header("content-type").is_none() {
                    writer.insert_header("content-type", content_type);
                }
            }
            writer.insert_header("content-length", &body.len().to_string());
            writer.set_status(status);
            writer.write_all(body)
        };
        if let Err(err) = write_result {
            tracing::error!(
                path = %self.path(),
                client_ip = %self.client_ip(),
                error = %err,
                "response write failed"
            );
        }
        self.done();
    }

    fn status_or_internal(&self, status: u16) -> StatusCode {
        match StatusCode::from_u16(status) {
            Ok(code) => code,
            Err(_) => {
                tracing::error!(
                    path = %self.path(),
                    status,
                    "invalid status code passed to response helper"
                );
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Serializes `value` and sends it as `application/json`.
    ///
    /// The serialization goes through a pooled buffer; buffers above the
    /// retention threshold are dropped instead of returned.
    pub fn send_json<T: Serialize>(&self, status: u16, value: &T) {
        if self.is_done() {
            return;
        }
        let status = self.status_or_internal(status);
        let mut buf = helpers::take_buffer(!self.config().defer_buffer_allocation);
        match serde_json::to_writer(&mut buf, value) {
            Ok(()) => {
                self.commit(status, Some("application/json"), &buf);
                helpers::put_buffer(buf);
            }
            Err(err) => {
                helpers::put_buffer(buf);
                tracing::error!(path = %self.path(), error = %err, "response serialization failed");
                self.send_error(ErrorCode::Internal, None);
            }
        }
    }

    /// Sends raw bytes under an explicit content type.
    pub fn send_data(&self, status: u16, content_type: &str, body: &[u8]) {
        let status = self.status_or_internal(status);
        self.commit(status, Some(content_type), body);
    }

    /// Sends plain text.
    pub fn send_string(&self, status: u16, body: &str) {
        let status = self.status_or_internal(status);
        self.commit(status, Some("text/plain; charset=utf-8"), body.as_bytes());
    }

    /// Sends the standard error envelope for `code`, at the code's
    /// default status.
    pub fn send_error(&self, code: ErrorCode, err: Option<Error>) {
        self.send_error_status(code.status().as_u16(), code, err);
    }

    /// Sends the standard error envelope with an explicit status.
    pub fn send_error_status(&self, status: u16, code: ErrorCode, err: Option<Error>) {
        if self.is_done() {
            return;
        }
        let message = match &err {
            Some(e) => e.message().to_string(),
            None => code.default_message().to_string(),
        };
        if let Some(e) = &err {
            let (file, line) = e.site();
            tracing::debug!(
                path = %self.path(),
                code = %code,
                origin = %format!("{}:{}", file, line),
                "request failed: {}", e
            );
        }
        let envelope = Envelope::error(code.as_str(), message, self.elapsed_seconds());
        self.send_json(status, &envelope);
    }

    /// Sends the `not_found` envelope.
    pub fn send_404(&self) {
        self.send_error(ErrorCode::NotFound, None);
    }

    /// Sends the `unauthorized` envelope.
    pub fn send_401(&self) {
        self.send_error(ErrorCode::Unauthorized, None);
    }

    /// Sends the `invalid_request` envelope used for malformed UUID
    /// path parameters.
    pub fn send_invalid_uuid(&self) {
        self.send_error(
            ErrorCode::InvalidRequest,
            Some(Error::new(ErrorCode::InvalidRequest).with_message("Invalid UUID")),
        );
    }

    /// Sends a success envelope wrapping `data`, with optional paging.
    pub fn json_result<T: Serialize>(&self, data: T, paging: Option<Pagination>) {
        let envelope = Envelope::success(Some(data), paging, self.elapsed_seconds());
        self.send_json(200, &envelope);
    }

    /// Redirects to `url`. Non-3xx statuses fall back to 302.
    pub fn redirect(&self, status: u16, url: &str) {
        if self.is_done() {
            return;
        }
        let status = match StatusCode::from_u16(status) {
            Ok(code) if code.is_redirection() => code,
            _ => StatusCode::FOUND,
        };
        self.writer().insert_header("location", url);
        self.commit(status, None, b"");
    }

    /// Serves a file from disk, consulting the process-global file
    /// cache when one is configured. Missing files produce the 404
    /// envelope; other read failures the internal envelope.
    pub async fn file(&self, url_path: &str, file_path: &str) {
        if self.is_done() {
            return;
        }
        if let Some(cache) = self.file_cache() {
            if let Some((bytes, content_type)) = cache.get(file_path) {
                self.commit(StatusCode::OK, Some(&content_type), &bytes);
                return;
            }
        }
        match tokio::fs::read(file_path).await {
            Ok(contents) => {
                let content_type = mime_guess::from_path(file_path)
                    .first_or_octet_stream()
                    .to_string();
                if let Some(cache) = self.file_cache() {
                    cache.insert(file_path, contents.clone().into(), &content_type);
                }
                self.commit(StatusCode::OK, Some(&content_type), &contents);
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(url_path, file_path, "file not found");
                self.send_404();
            }
            Err(err) => {
                tracing::error!(url_path, file_path, error = %err, "file read failed");
                self.send_error(ErrorCode::Internal, None);
            }
        }
    }

    /// Serves a file resolved against a root directory, refusing path
    /// traversal out of it.
    pub async fn file_from_fs(&self, url_path: &str, root: &Path, file_path: &str) {
        let relative = Path::new(file_path);
        let mut resolved = PathBuf::from(root);
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => {
                    tracing::warn!(url_path, file_path, "rejected path traversal");
                    self.send_404();
                    return;
                }
            }
        }
        match resolved.to_str() {
            Some(path) => self.file(url_path, path).await,
            None => self.send_404(),
        }
    }
}
