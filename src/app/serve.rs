use crate::app::App;
use crate::ctx::{BodySource, RequestHead};
use crate::error::{Error, ErrorCode};
use crate::res::RawWriter;
use crate::types::HttpMethods;
use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::service::service_fn;
use hyper::upgrade::OnUpgrade;
use hyper::{HeaderMap, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch};

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_request_id() -> String {
    format!("{:016x}", REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed))
}

fn empty_body() -> UnsyncBoxBody<Bytes, Infallible> {
    Empty::<Bytes>::new().boxed_unsync()
}

/// Bridges the dispatcher's imperative writes onto a hyper response:
/// the head goes out once over a oneshot, body chunks over an unbounded
/// channel the response body streams from. Bytes are copied on write,
/// so pooled buffers can be reused immediately.
pub(crate) struct ChannelWriter {
    head: Option<oneshot::Sender<(StatusCode, HeaderMap)>>,
    body: mpsc::UnboundedSender<Bytes>,
    on_upgrade: Option<OnUpgrade>,
}

impl RawWriter for ChannelWriter {
    fn write_head(&mut self, status: StatusCode, headers: &HeaderMap) {
        if let Some(tx) = self.head.take() {
            let _ = tx.send((status, headers.clone()));
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.body
            .send(Bytes::copy_from_slice(buf))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Error> {
        // every chunk is handed to the connection as its own frame
        Ok(())
    }

    fn hijack(&mut self) -> Result<OnUpgrade, Error> {
        self.on_upgrade.take().ok_or_else(|| {
            Error::new(ErrorCode::Internal).with_message("connection does not support upgrades")
        })
    }

    fn clear_write_deadline(&mut self) -> Result<(), Error> {
        // plain tokio sockets carry no armed write deadline
        Ok(())
    }
}

impl<V: Default + Send + 'static> App<V> {
    /// Starts the server on `127.0.0.1:port` and serves until ctrl-c.
    ///
    /// Consumes the app: the route tree is frozen from here on.
    ///
    /// ## Example
    ///
    /// ```no_run
    /// use trellis::app::App;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let app = App::<()>::new();
    ///     app.listen(3000, || println!("server running on port 3000")).await;
    /// }
    /// ```
    pub async fn listen<F: FnOnce()>(self, port: u16, cb: F) {
        let app = Arc::new(self);
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(err) => {
                eprintln!("failed to bind {}: {}", addr, err);
                return;
            }
        };

        cb();

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutdown signal received");
                    break;
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, remote)) => {
                            let app = app.clone();
                            tokio::spawn(async move {
                                Self::handle_connection(app, stream, remote).await;
                            });
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "accept failed");
                        }
                    }
                }
            }
        }
    }

    async fn handle_connection(app: Arc<App<V>>, stream: TcpStream, remote: SocketAddr) {
        let io = TokioIo::new(stream);
        let max_header_size = app.config.max_header_size;
        let service = service_fn(move |req| {
            let app = app.clone();
            async move { Ok::<_, Infallible>(Self::handle_request(app, req, remote).await) }
        });

        let mut builder = Builder::new(TokioExecutor::new());
        builder
            .http1()
            .keep_alive(true)
            .max_buf_size(max_header_size);
        if let Err(err) = builder.serve_connection_with_upgrades(io, service).await {
            tracing::debug!(error = %err, "connection closed with error");
        }
    }

    async fn handle_request(
        app: Arc<App<V>>,
        req: hyper::Request<Incoming>,
        remote: SocketAddr,
    ) -> hyper::Response<UnsyncBoxBody<Bytes, Infallible>> {
        let (mut parts, body) = req.into_parts();

        let Some(method) = HttpMethods::from_method(&parts.method) else {
            let mut resp = hyper::Response::new(empty_body());
            *resp.status_mut() = StatusCode::NOT_FOUND;
            return resp;
        };

        let on_upgrade = parts.extensions.remove::<OnUpgrade>();
        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(next_request_id);

        let (head_tx, head_rx) = oneshot::channel();
        let (body_tx, body_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let writer = ChannelWriter {
            head: Some(head_tx),
            body: body_tx,
            on_upgrade,
        };
        let head = RequestHead {
            method,
            path: parts.uri.path().to_string(),
            query: parts.uri.query().unwrap_or("").to_string(),
            headers: parts.headers,
            remote_addr: remote.to_string(),
            request_id,
            cancel: Some(cancel_rx),
        };

        tokio::spawn(async move {
            app.dispatch(head, BodySource::Hyper(body), Box::new(writer))
                .await;
        });

        match head_rx.await {
            Ok((status, headers)) => {
                // the watch sender rides along with the body stream so
                // dropping the response cancels the request
                let stream = futures::stream::unfold(
                    (body_rx, cancel_tx),
                    |(mut rx, cancel)| async move {
                        rx.recv()
                            .await
                            .map(|chunk| (Ok::<_, Infallible>(Frame::data(chunk)), (rx, cancel)))
                    },
                );
                let mut resp = hyper::Response::new(StreamBody::new(stream).boxed_unsync());
                *resp.status_mut() = status;
                *resp.headers_mut() = headers;
                resp
            }
            Err(_) => {
                let mut resp = hyper::Response::new(empty_body());
                *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                resp
            }
        }
    }
}
