use crate::app::App;
use crate::ctx::BodySource;
use crate::router::Router;
use crate::tests::common::run;
use crate::types::{HttpMethods, Middleware, RouterFns, around};
use std::sync::{Arc, Mutex};

type Trace = Arc<Mutex<Vec<&'static str>>>;

fn tracing_mw(trace: &Trace, label: &'static str) -> Middleware<()> {
    let trace = trace.clone();
    around(move |ctx, next| {
        let trace = trace.clone();
        async move {
            trace.lock().unwrap().push(label);
            next(ctx).await;
        }
    })
}

fn traced_app(trace: &Trace) -> App<()> {
    let mut app = App::new();
    let handler_trace = trace.clone();
    app.use_middleware(tracing_mw(trace, "G"));

    let mut group = Router::new("/api");
    group.use_middleware(tracing_mw(trace, "Gr"));
    group.get("/test", move |ctx| {
        let handler_trace = handler_trace.clone();
        async move {
            handler_trace.lock().unwrap().push("handler");
            ctx.send_string(200, "ok");
        }
    });
    group.register(&mut app);
    app
}

#[tokio::test]
async fn global_then_group_then_handler() {
    let trace: Trace = Arc::new(Mutex::new(Vec::new()));
    let app = traced_app(&trace);
    let rec = run(&app, HttpMethods::GET, "/api/test", &[], BodySource::Empty).await;
    assert_eq!(rec.status.unwrap().as_u16(), 200);
    assert_eq!(*trace.lock().unwrap(), vec!["G", "Gr", "handler"]);
}

#[tokio::test]
async fn pre_channel_runs_before_global() {
    let trace: Trace = Arc::new(Mutex::new(Vec::new()));
    let mut app = App::new();
    app.use_middleware(tracing_mw(&trace, "G"));
    app.use_pre(tracing_mw(&trace, "P"));
    let t = trace.clone();
    app.get("/x", move |ctx| {
        let t = t.clone();
        async move {
            t.lock().unwrap().push("handler");
            ctx.send_string(200, "ok");
        }
    });
    run(&app, HttpMethods::GET, "/x", &[], BodySource::Empty).await;
    assert_eq!(*trace.lock().unwrap(), vec!["P", "G", "handler"]);
}

#[tokio::test]
async fn done_short_circuits_downstream_layers() {
    let trace: Trace = Arc::new(Mutex::new(Vec::new()));
    let mut app = App::new();
    {
        let trace = trace.clone();
        app.use_middleware(around(move |ctx, next| {
            let trace = trace.clone();
            async move {
                trace.lock().unwrap().push("G");
                ctx.done();
                next(ctx).await;
            }
        }));
    }
    let t = trace.clone();
    app.get("/x", move |_ctx| {
        let t = t.clone();
        async move {
            t.lock().unwrap().push("handler");
        }
    });
    let rec = run(&app, HttpMethods::GET, "/x", &[], BodySource::Empty).await;
    assert_eq!(*trace.lock().unwrap(), vec!["G"]);
    // done before anything was written: nothing goes on the wire
    assert!(rec.status.is_none());
}

#[tokio::test]
async fn node_middleware_applies_to_later_registrations_only() {
    let trace: Trace = Arc::new(Mutex::new(Vec::new()));
    let mut app = App::new();

    let before = trace.clone();
    app.get("/admin/before", move |ctx| {
        let before = before.clone();
        async move {
            before.lock().unwrap().push("before");
            ctx.send_string(200, "ok");
        }
    });

    app.use_at("/admin", tracing_mw(&trace, "N"));

    let after = trace.clone();
    app.get("/admin/after", move |ctx| {
        let after = after.clone();
        async move {
            after.lock().unwrap().push("after");
            ctx.send_string(200, "ok");
        }
    });

    run(&app, HttpMethods::GET, "/admin/before", &[], BodySource::Empty).await;
    assert_eq!(*trace.lock().unwrap(), vec!["before"]);

    trace.lock().unwrap().clear();
    run(&app, HttpMethods::GET, "/admin/after", &[], BodySource::Empty).await;
    assert_eq!(*trace.lock().unwrap(), vec!["N", "after"]);
}

#[tokio::test]
async fn route_local_middleware_is_innermost() {
    let trace: Trace = Arc::new(Mutex::new(Vec::new()));
    let mut app = App::new();
    app.use_middleware(tracing_mw(&trace, "G"));
    let t = trace.clone();
    app.route(
        HttpMethods::GET,
        "/x",
        vec![tracing_mw(&trace, "L")],
        move |ctx| {
            let t = t.clone();
            async move {
                t.lock().unwrap().push("handler");
                ctx.send_string(200, "ok");
            }
        },
    );
    run(&app, HttpMethods::GET, "/x", &[], BodySource::Empty).await;
    assert_eq!(*trace.lock().unwrap(), vec!["G", "L", "handler"]);
}

#[tokio::test]
async fn global_middleware_added_after_registration_does_not_apply() {
    let trace: Trace = Arc::new(Mutex::new(Vec::new()));
    let mut app = App::new();
    let t = trace.clone();
    app.get("/x", move |ctx| {
        let t = t.clone();
        async move {
            t.lock().unwrap().push("handler");
            ctx.send_string(200, "ok");
        }
    });
    app.use_middleware(tracing_mw(&trace, "late"));
    run(&app, HttpMethods::GET, "/x", &[], BodySource::Empty).await;
    assert_eq!(*trace.lock().unwrap(), vec!["handler"]);
}

#[tokio::test]
async fn any_binds_every_method() {
    let mut app = App::new();
    app.any("/everything", |ctx| async move {
        ctx.send_string(200, "ok");
    });
    for method in [
        HttpMethods::GET,
        HttpMethods::POST,
        HttpMethods::PUT,
        HttpMethods::DELETE,
        HttpMethods::PATCH,
        HttpMethods::OPTIONS,
        HttpMethods::HEAD,
    ] {
        let rec = run(&app, method, "/everything", &[], BodySource::Empty).await;
        assert_eq!(rec.status.unwrap().as_u16(), 200, "method {}", method);
    }
}
