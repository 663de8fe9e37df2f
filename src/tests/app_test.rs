use crate::app::App;
use crate::config::ServerConfig;
use crate::ctx::BodySource;
use crate::router::Router;
use crate::tests::common::{recording, request_head, run};
use crate::types::{HttpMethods, RouterFns};
use serde_json::json;

#[tokio::test]
async fn static_route_returns_the_success_envelope() {
    let mut app = App::<()>::new();
    app.get("/health", |ctx| async move {
        ctx.json_result(json!({"status": "ok"}), None);
    });
    let rec = run(&app, HttpMethods::GET, "/health", &[], BodySource::Empty).await;

    assert_eq!(rec.status.unwrap().as_u16(), 200);
    assert_eq!(rec.header("content-type"), Some("application/json"));
    let body = rec.body_json();
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["result"], "success");
    assert!(body["time"].as_f64().is_some());
}

#[tokio::test]
async fn param_route_binds_the_segment() {
    let mut app = App::<()>::new();
    app.get("/users/:id", |ctx| async move {
        let id = ctx.param("id");
        ctx.send_string(200, &id);
    });
    let rec = run(&app, HttpMethods::GET, "/users/42", &[], BodySource::Empty).await;
    assert_eq!(rec.body_str(), "42");
}

#[tokio::test]
async fn wildcard_route_preserves_encoding() {
    let mut app = App::<()>::new();
    app.get("/files/*path", |ctx| async move {
        let path = ctx.param("path");
        ctx.send_string(200, &path);
    });
    let rec = run(
        &app,
        HttpMethods::GET,
        "/files/path/with%3F.jpg",
        &[],
        BodySource::Empty,
    )
    .await;
    assert_eq!(rec.body_str(), "path/with%3F.jpg");
}

#[tokio::test]
async fn embedded_params_bind_both_values() {
    let mut app = App::<()>::new();
    app.get("/user:id-post:postId", |ctx| async move {
        let reply = format!("{}/{}", ctx.param("id"), ctx.param("postId"));
        ctx.send_string(200, &reply);
    });
    let rec = run(
        &app,
        HttpMethods::GET,
        "/user123-post456",
        &[],
        BodySource::Empty,
    )
    .await;
    assert_eq!(rec.body_str(), "123/456");
}

#[tokio::test]
async fn unmatched_path_is_a_404_envelope() {
    let app = App::<()>::new();
    let rec = run(&app, HttpMethods::GET, "/nope", &[], BodySource::Empty).await;
    assert_eq!(rec.status.unwrap().as_u16(), 404);
    assert_eq!(rec.body_json()["token"], "not_found");
}

#[tokio::test]
async fn unmatched_options_returns_allow() {
    let app = App::<()>::new();
    let rec = run(&app, HttpMethods::OPTIONS, "/nope", &[], BodySource::Empty).await;
    assert_eq!(rec.status.unwrap().as_u16(), 200);
    assert_eq!(
        rec.header("allow"),
        Some("GET, POST, PUT, DELETE, PATCH, OPTIONS, HEAD")
    );
}

#[tokio::test]
async fn matched_path_with_wrong_method_is_404() {
    let mut app = App::<()>::new();
    app.get("/only-get", |ctx| async move {
        ctx.send_string(200, "ok");
    });
    let rec = run(&app, HttpMethods::POST, "/only-get", &[], BodySource::Empty).await;
    assert_eq!(rec.status.unwrap().as_u16(), 404);
}

#[tokio::test]
async fn empty_and_root_paths_hit_the_root_route() {
    let mut app = App::<()>::new();
    app.get("/", |ctx| async move {
        ctx.send_string(200, "root");
    });
    for path in ["", "/"] {
        let rec = run(&app, HttpMethods::GET, path, &[], BodySource::Empty).await;
        assert_eq!(rec.body_str(), "root", "path {:?}", path);
    }
    let rec = run(&app, HttpMethods::GET, "/sub", &[], BodySource::Empty).await;
    assert_eq!(rec.status.unwrap().as_u16(), 404);
}

#[tokio::test]
async fn security_headers_follow_the_config() {
    let mut app = App::<()>::new();
    app.set_config(ServerConfig {
        enable_security_headers: true,
        ..Default::default()
    });
    app.get("/s", |ctx| async move {
        ctx.send_string(200, "ok");
    });
    let rec = run(&app, HttpMethods::GET, "/s", &[], BodySource::Empty).await;
    assert_eq!(rec.header("x-content-type-options"), Some("nosniff"));
    assert_eq!(rec.header("x-frame-options"), Some("DENY"));
    assert_eq!(rec.header("x-xss-protection"), Some("1; mode=block"));

    let app2 = {
        let mut app = App::<()>::new();
        app.get("/s", |ctx| async move {
            ctx.send_string(200, "ok");
        });
        app
    };
    let rec = run(&app2, HttpMethods::GET, "/s", &[], BodySource::Empty).await;
    assert_eq!(rec.header("x-content-type-options"), None);
}

#[tokio::test]
async fn handler_that_writes_nothing_still_commits_a_head() {
    let mut app = App::<()>::new();
    app.get("/quiet", |_ctx| async move {});
    let rec = run(&app, HttpMethods::GET, "/quiet", &[], BodySource::Empty).await;
    assert_eq!(rec.status.unwrap().as_u16(), 200);
    assert_eq!(rec.header("content-length"), Some("0"));
    assert!(rec.body.is_empty());
}

#[tokio::test]
async fn head_requests_get_headers_but_no_body() {
    let mut app = App::<()>::new();
    app.head("/doc", |ctx| async move {
        ctx.send_string(200, "hello head");
    });
    let rec = run(&app, HttpMethods::HEAD, "/doc", &[], BodySource::Empty).await;
    assert_eq!(rec.status.unwrap().as_u16(), 200);
    assert_eq!(rec.header("content-length"), Some("10"));
    assert!(rec.body.is_empty());
}

#[tokio::test]
async fn group_mounting_prefixes_patterns() {
    let mut app = App::<()>::new();
    let mut v1 = Router::new("/api/v1");
    v1.get("/users/:id", |ctx| async move {
        let id = ctx.param("id");
        ctx.send_string(200, &id);
    });
    v1.register(&mut app);

    let rec = run(
        &app,
        HttpMethods::GET,
        "/api/v1/users/7",
        &[],
        BodySource::Empty,
    )
    .await;
    assert_eq!(rec.body_str(), "7");
    let rec = run(&app, HttpMethods::GET, "/users/7", &[], BodySource::Empty).await;
    assert_eq!(rec.status.unwrap().as_u16(), 404);
}

#[tokio::test]
async fn body_cap_is_enforced_end_to_end() {
    let mut app = App::<()>::new();
    app.set_config(ServerConfig {
        max_body_size: 4,
        ..Default::default()
    });
    app.post("/ingest", |ctx| async move {
        match ctx.need_body().await {
            Ok(body) => ctx.send_string(200, &format!("got {}", body.len())),
            Err(err) => ctx.send_error(err.code(), Some(err)),
        }
    });

    let rec = run(
        &app,
        HttpMethods::POST,
        "/ingest",
        &[],
        BodySource::Bytes(bytes::Bytes::from_static(b"1234")),
    )
    .await;
    assert_eq!(rec.status.unwrap().as_u16(), 200);

    let rec = run(
        &app,
        HttpMethods::POST,
        "/ingest",
        &[],
        BodySource::Bytes(bytes::Bytes::from_static(b"12345")),
    )
    .await;
    assert_eq!(rec.status.unwrap().as_u16(), 400);
    assert_eq!(rec.body_json()["token"], "invalid_request");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn contexts_survive_background_capture_under_load() {
    let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel::<String>();

    let mut app = App::<()>::new();
    app.get("/bg/:val", move |ctx| {
        let done_tx = done_tx.clone();
        async move {
            let bg = ctx.clone();
            let done_tx = done_tx.clone();
            tokio::spawn(async move {
                // reads a captured parameter after the dispatcher may
                // have moved on; the handle keeps the state alive
                done_tx.send(bg.param("val")).ok();
            });
            ctx.send_string(200, "ok");
        }
    });
    let app = std::sync::Arc::new(app);

    let mut workers = Vec::new();
    for i in 0..64 {
        let app = app.clone();
        workers.push(tokio::spawn(async move {
            let (writer, rec) = recording();
            let head = request_head(HttpMethods::GET, &format!("/bg/v{}", i), "", &[]);
            app.dispatch(head, BodySource::Empty, writer).await;
            assert_eq!(rec.lock().unwrap().status.unwrap().as_u16(), 200);
        }));
    }
    for worker in workers {
        worker.await.unwrap();
    }

    let mut seen = 0;
    while let Ok(value) = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        done_rx.recv(),
    )
    .await
    {
        let value = value.expect("channel closed early");
        assert!(value.starts_with('v'), "captured junk: {:?}", value);
        seen += 1;
        if seen == 64 {
            break;
        }
    }
    assert_eq!(seen, 64);
}

#[tokio::test]
async fn query_flows_through_dispatch() {
    let mut app = App::<()>::new();
    app.get("/q", |ctx| async move {
        let value = ctx.default_query_param("page", "1");
        ctx.send_string(200, &value);
    });
    let (writer, rec) = recording();
    let head = request_head(HttpMethods::GET, "/q", "page=3", &[]);
    app.dispatch(head, BodySource::Empty, writer).await;
    assert_eq!(rec.lock().unwrap().clone().body_str(), "3");
}
