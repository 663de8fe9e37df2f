use crate::app::App;
use crate::conn;
use crate::ctx::{BodySource, Ctx, RequestHead};
use crate::res::{RawWriter, ResponseWriter};
use crate::router::tree::Lookup;
use crate::types::HttpMethods;

const ALLOW_ALL: &str = "GET, POST, PUT, DELETE, PATCH, OPTIONS, HEAD";

impl<V: Default + Send + 'static> App<V> {
    /// Runs one request through the full pipeline: security headers,
    /// route lookup (static fast pass first), context construction,
    /// connection classification, the composed middleware chain, and
    /// finalization.
    pub(crate) async fn dispatch(
        &self,
        head: RequestHead,
        body: BodySource,
        raw: Box<dyn RawWriter>,
    ) {
        let method = head.method;
        let head_request = method == HttpMethods::HEAD;
        let mut writer = ResponseWriter::new(raw, head_request);
        if self.config.enable_security_headers {
            writer.insert_header("x-content-type-options", "nosniff");
            writer.insert_header("x-frame-options", "DENY");
            writer.insert_header("x-xss-protection", "1; mode=block");
        }

        let ctx = Ctx::new(
            head,
            body,
            writer,
            self.config.clone(),
            self.cache.clone(),
        );

        let kind = conn::classify(ctx.request_headers());
        ctx.set_conn_kind(kind);
        if kind.is_streaming() {
            if let Err(err) = ctx.clear_write_deadline() {
                tracing::warn!(
                    conn_type = %kind,
                    path = %ctx.path(),
                    error = %err,
                    "could not lift write deadline for streaming connection"
                );
            }
        }

        let handler = match self.tree.lookup(method, ctx.path()) {
            Lookup::Found(matched) => {
                ctx.bind_params(&matched.entry.param_names, matched.values);
                Some(matched.entry.composed.clone())
            }
            Lookup::MethodMiss => {
                ctx.send_404();
                None
            }
            Lookup::NoRoute => {
                if method == HttpMethods::OPTIONS {
                    ctx.set_header("allow", ALLOW_ALL);
                    ctx.send_string(200, "");
                } else {
                    ctx.send_404();
                }
                None
            }
        };

        if let Some(handler) = handler {
            handler(ctx.clone()).await;
        }

        self.finalize(&ctx);
    }

    /// Commits an empty reply for handlers that returned without
    /// writing, and seals the context.
    fn finalize(&self, ctx: &Ctx<V>) {
        if ctx.is_done() {
            return;
        }
        {
            let mut writer = ctx.writer();
            if !writer.written() {
                if writer.header("content-length").is_none() {
                    writer.insert_header("content-length", "0");
                }
                writer.send_head();
            }
        }
        ctx.done();
    }
}
