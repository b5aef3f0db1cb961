// tests/dev_server.rs

use std::error::Error;
use std::fs;
use std::future::poll_fn;
use std::pin::Pin;

use actix_web::body::MessageBody;
use actix_web::http::{StatusCode, header};
use actix_web::{App, test, web};
use tempfile::TempDir;

use pipewatch::reload::{DevServer, ReloadNotifier, ServerConfig};
use pipewatch::reload::server::{EVENTS_PATH, ServerState, configure_routes};

type TestResult = Result<(), Box<dyn Error>>;

fn site() -> std::io::Result<TempDir> {
    let dir = TempDir::new()?;
    fs::create_dir_all(dir.path().join("src/css"))?;
    fs::write(
        dir.path().join("src/index.html"),
        "<html><body><h1>hi</h1></body></html>",
    )?;
    fs::write(dir.path().join("src/css/main.css"), "h1{color:red}")?;
    Ok(dir)
}

#[actix_web::test]
async fn html_pages_get_the_reload_script() -> TestResult {
    let dir = site()?;
    let state = ServerState::new(dir.path(), ReloadNotifier::new());
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/src/index.html").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = test::read_body(resp).await;
    let body = String::from_utf8(body.to_vec())?;
    assert!(body.contains(EVENTS_PATH));
    assert!(body.ends_with("</script></body></html>"));

    // Directories serve their index.html.
    let req = test::TestRequest::get().uri("/src/").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    Ok(())
}

#[actix_web::test]
async fn other_files_are_served_verbatim() -> TestResult {
    let dir = site()?;
    let state = ServerState::new(dir.path(), ReloadNotifier::new());
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/src/css/main.css").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/css; charset=utf-8"
    );
    assert_eq!(test::read_body(resp).await, "h1{color:red}");

    let req = test::TestRequest::get().uri("/src/missing.css").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[actix_web::test]
async fn static_assets_revalidate_with_etags() -> TestResult {
    let dir = site()?;
    let state = ServerState::new(dir.path(), ReloadNotifier::new());
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::get().uri("/src/css/main.css").to_request();
    let resp = test::call_service(&app, req).await;
    let etag = resp
        .headers()
        .get(header::ETAG)
        .expect("static files carry an etag")
        .clone();

    let req = test::TestRequest::get()
        .uri("/src/css/main.css")
        .insert_header((header::IF_NONE_MATCH, etag))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::NOT_MODIFIED
    );

    // Injected pages are never served from cache.
    let req = test::TestRequest::get().uri("/src/index.html").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.headers().get(header::ETAG).is_none());
    assert_eq!(resp.headers().get(header::CACHE_CONTROL).unwrap(), "no-cache");

    let req = test::TestRequest::get().uri("/../Cargo.toml").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[actix_web::test]
async fn event_stream_emits_one_message_per_reload() -> TestResult {
    let dir = site()?;
    let notifier = ReloadNotifier::new();
    let state = ServerState::new(dir.path(), notifier.clone());
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(configure_routes),
    )
    .await;

    let req = test::TestRequest::get().uri(EVENTS_PATH).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(
        resp.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );
    assert_eq!(notifier.listener_count(), 1);

    let mut body = resp.into_body();

    let first = poll_fn(|cx| Pin::new(&mut body).poll_next(cx))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, ": connected\n\n");

    assert_eq!(notifier.notify(), 1);
    let second = poll_fn(|cx| Pin::new(&mut body).poll_next(cx))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second, "data: reload\n\n");
    Ok(())
}

#[actix_web::test]
async fn dev_server_binds_loopback_and_stops_on_request() -> TestResult {
    let dir = site()?;
    let config = ServerConfig {
        root: dir.path().to_path_buf(),
        start_path: "src/index.html".to_string(),
        open_externally: false,
        port: 0,
    };
    let notifier = ReloadNotifier::new();
    let server = DevServer::init(config, notifier.clone())?;

    assert!(server.addrs().iter().all(|a| a.ip().is_loopback()));
    assert_eq!(server.reload(), 0);
    let _listener = notifier.subscribe();
    assert_eq!(server.reload(), 1);

    let handle = server.handle();
    let serving = actix_web::rt::spawn(server.serve());
    handle.stop(true).await;
    serving.await??;
    Ok(())
}
