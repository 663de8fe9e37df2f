use crate::ctx::Ctx;
use crate::res::envelope::Envelope;
use crate::types::{Handler, Middleware, box_future};
use futures::FutureExt;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Once};

/// The sentinel panic payload signalling an intentional handler abort,
/// typically a client disconnect noticed mid-stream.
#[derive(Debug, Clone, Copy)]
pub struct HandlerAborted;

/// Aborts the current handler by panicking with the abort sentinel.
///
/// The recovery middleware recognises the sentinel and suppresses the
/// error response: streaming connections log at debug, plain HTTP at
/// warn.
pub fn abort_handler() -> ! {
    std::panic::panic_any(HandlerAborted)
}

struct PanicRecord {
    location: String,
    backtrace: String,
}

thread_local! {
    static LAST_PANIC: RefCell<Option<PanicRecord>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Installs the process-wide panic hook that snapshots panic location
/// and stack for the recovery log. Abort sentinels are expected control
/// flow and stay silent; everything else also reaches the previous
/// hook.
fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if info.payload().downcast_ref::<HandlerAborted>().is_some() {
                return;
            }
            let location = info
                .location()
                .map(|l| format!("{}:{}", l.file(), l.line()))
                .unwrap_or_default();
            let backtrace = Backtrace::force_capture().to_string();
            LAST_PANIC.with(|slot| {
                *slot.borrow_mut() = Some(PanicRecord {
                    location,
                    backtrace,
                });
            });
            previous(info);
        }));
    });
}

/// The recovery middleware. Installed outermost by `App::new`; catches
/// any panic from the layers below and converts it into a typed log and
/// (when nothing is on the wire yet) a standard internal-error reply.
pub fn recovery<V: Send + 'static>() -> Middleware<V> {
    install_panic_hook();
    Arc::new(move |next: Handler<V>| {
        Arc::new(move |ctx: Ctx<V>| {
            let next = next.clone();
            let probe = ctx.clone();
            box_future(async move {
                if let Err(payload) = AssertUnwindSafe(next(ctx)).catch_unwind().await {
                    recover(&probe, payload);
                }
            })
        })
    })
}

/// Must never panic itself: the real work runs under a second guard and
/// a failure there degrades to stderr.
fn recover<V: Send + 'static>(ctx: &Ctx<V>, payload: Box<dyn Any + Send>) {
    let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| handle(ctx, payload)));
    if outcome.is_err() {
        eprintln!("panic while recovering from a handler panic");
    }
}

fn handle<V: Send + 'static>(ctx: &Ctx<V>, payload: Box<dyn Any + Send>) {
    if payload.downcast_ref::<HandlerAborted>().is_some() {
        let kind = ctx.conn_kind();
        if kind.is_streaming() {
            tracing::debug!(
                conn_type = %kind,
                path = %ctx.path(),
                "handler aborted mid-stream"
            );
        } else {
            tracing::warn!(
                conn_type = %kind,
                path = %ctx.path(),
                "handler aborted"
            );
        }
        ctx.done();
        return;
    }

    let message = panic_message(payload.as_ref());
    let record = LAST_PANIC.with(|slot| slot.borrow_mut().take());
    let (location, backtrace) = record
        .map(|r| (r.location, r.backtrace))
        .unwrap_or_default();
    let frames: Vec<&str> = backtrace
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    tracing::error!(
        panic_message = %message,
        panic_location = %location,
        path = %ctx.path(),
        method = %ctx.method(),
        client_ip = %ctx.client_ip(),
        stack = ?frames,
        "handler panicked"
    );

    let written = ctx.writer().written();
    if !written {
        let json = ctx
            .writer()
            .header("content-type")
            .map(|ct| ct.to_ascii_lowercase().contains("json"))
            .unwrap_or(false);
        if json {
            let envelope = Envelope::error(
                "internal",
                "Internal error".to_string(),
                ctx.elapsed_seconds(),
            );
            ctx.send_json(500, &envelope);
        } else {
            ctx.send_string(500, "Internal error");
        }
    }
    ctx.done();
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unhandled panic".to_string()
    }
}
