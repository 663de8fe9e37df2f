use crate::app::App;
use crate::config::ServerConfig;
use crate::ctx::{BodySource, Ctx, RequestHead};
use crate::res::RawWriter;
use crate::types::HttpMethods;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{HeaderMap, StatusCode};
use std::io;
use std::sync::{Arc, Mutex};

/// Everything a request wrote, for assertions.
#[derive(Default, Clone)]
pub(crate) struct Recorded {
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub flushes: usize,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap_or("<non-utf8>")
    }

    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("response body is not JSON")
    }
}

pub(crate) struct RecordingWriter {
    rec: Arc<Mutex<Recorded>>,
}

impl RawWriter for RecordingWriter {
    fn write_head(&mut self, status: StatusCode, headers: &HeaderMap) {
        let mut rec = self.rec.lock().unwrap();
        rec.status = Some(status);
        rec.headers = headers.clone();
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.rec.lock().unwrap().body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), crate::error::Error> {
        self.rec.lock().unwrap().flushes += 1;
        Ok(())
    }

    fn clear_write_deadline(&mut self) -> Result<(), crate::error::Error> {
        Ok(())
    }
}

pub(crate) fn recording() -> (Box<dyn RawWriter>, Arc<Mutex<Recorded>>) {
    let rec = Arc::new(Mutex::new(Recorded::default()));
    (Box::new(RecordingWriter { rec: rec.clone() }), rec)
}

pub(crate) fn header_map(pairs: &[(&str, &str)]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        headers.append(
            HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
    }
    headers
}

pub(crate) fn request_head(
    method: HttpMethods,
    path: &str,
    query: &str,
    headers: &[(&str, &str)],
) -> RequestHead {
    RequestHead {
        method,
        path: path.to_string(),
        query: query.to_string(),
        headers: header_map(headers),
        remote_addr: "127.0.0.1:5000".to_string(),
        request_id: "test-req".to_string(),
        cancel: None,
    }
}

/// Builds a context backed by a recording writer.
pub(crate) fn test_ctx(
    method: HttpMethods,
    path: &str,
    query: &str,
    headers: &[(&str, &str)],
    body: BodySource,
) -> (Ctx<()>, Arc<Mutex<Recorded>>) {
    test_ctx_with_config(method, path, query, headers, body, ServerConfig::default())
}

pub(crate) fn test_ctx_with_config(
    method: HttpMethods,
    path: &str,
    query: &str,
    headers: &[(&str, &str)],
    body: BodySource,
    config: ServerConfig,
) -> (Ctx<()>, Arc<Mutex<Recorded>>) {
    let (writer, rec) = recording();
    let head = request_head(method, path, query, headers);
    (Ctx::for_test(head, body, writer, config), rec)
}

/// Dispatches one request through an app and returns what was written.
pub(crate) async fn run(
    app: &App<()>,
    method: HttpMethods,
    path: &str,
    headers: &[(&str, &str)],
    body: BodySource,
) -> Recorded {
    let (writer, rec) = recording();
    let head = request_head(method, path, "", headers);
    app.dispatch(head, body, writer).await;
    let snapshot = rec.lock().unwrap().clone();
    snapshot
}

/// Captures formatted tracing output for the duration of the guard.
pub(crate) fn capture_logs() -> (tracing::subscriber::DefaultGuard, Arc<Mutex<Vec<u8>>>) {
    let buffer: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(LogBuffer(buffer.clone()))
        .finish();
    (tracing::subscriber::set_default(subscriber), buffer)
}

pub(crate) fn log_text(buffer: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8_lossy(&buffer.lock().unwrap()).into_owned()
}

#[derive(Clone)]
pub(crate) struct LogBuffer(Arc<Mutex<Vec<u8>>>);

pub(crate) struct LogWriter(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter(self.0.clone())
    }
}
