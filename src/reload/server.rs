// src/reload/server.rs

//! Development server with live reload.
//!
//! Serves the server root as static files through `actix-files` (content
//! types, ETags, ranges), injects a small script into HTML pages, and streams one `reload` server-sent event to each open page per
//! [`ReloadSignal`](super::ReloadSignal).

use std::convert::Infallible;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::path::{Path, PathBuf};

use actix_files::{NamedFile, file_extension_to_mime};
use actix_web::dev::{Server, ServerHandle};
use actix_web::http::header::{self, ContentType};
use actix_web::web::{self, Bytes};
use actix_web::mime::Mime;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer};
use futures_util::stream::{self, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::config::ServerSection;
use crate::errors::Result;

use super::ReloadNotifier;

/// Route of the server-sent events stream.
pub const EVENTS_PATH: &str = "/__pipewatch/events";

const RELOAD_SCRIPT: &str = "<script>new EventSource(\"/__pipewatch/events\").onmessage=function(){location.reload()};</script>";

/// Resolved server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Absolute directory served at `/`.
    pub root: PathBuf,
    pub start_path: String,
    pub open_externally: bool,
    pub port: u16,
}

impl ServerConfig {
    /// `section.root` is taken relative to `project_root`.
    pub fn from_section(section: &ServerSection, project_root: &Path) -> Self {
        Self {
            root: project_root.join(&section.root),
            start_path: section.start_path.trim_start_matches('/').to_string(),
            open_externally: section.open_externally,
            port: section.port,
        }
    }

    fn bind_ip(&self) -> IpAddr {
        if self.open_externally {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        } else {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

/// Shared by every request handler.
#[derive(Debug, Clone)]
pub struct ServerState {
    root: PathBuf,
    notifier: ReloadNotifier,
}

impl ServerState {
    pub fn new(root: impl Into<PathBuf>, notifier: ReloadNotifier) -> Self {
        Self {
            root: root.into(),
            notifier,
        }
    }
}

/// Register the events stream and the static file handler.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route(EVENTS_PATH, web::get().to(events_handler))
        .route("/{tail:.*}", web::get().to(static_handler));
}

/// A bound, not yet running, development server.
pub struct DevServer {
    config: ServerConfig,
    notifier: ReloadNotifier,
    addrs: Vec<SocketAddr>,
    server: Server,
}

impl std::fmt::Debug for DevServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevServer")
            .field("config", &self.config)
            .field("addrs", &self.addrs)
            .finish_non_exhaustive()
    }
}

impl DevServer {
    /// Bind the listening socket and log where the site is reachable.
    ///
    /// Signal handling is left to the caller; stop the server through
    /// [`handle`](Self::handle).
    pub fn init(config: ServerConfig, notifier: ReloadNotifier) -> Result<Self> {
        let state = ServerState::new(config.root.clone(), notifier.clone());

        let http = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure_routes)
        })
        .workers(1)
        .disable_signals()
        .bind((config.bind_ip(), config.port))?;

        let addrs = http.addrs();
        let server = http.run();

        let port = addrs.first().map(|a| a.port()).unwrap_or(config.port);
        info!(
            root = %config.root.display(),
            "serving at http://localhost:{port}/{}",
            config.start_path
        );
        if config.open_externally {
            match external_ip() {
                Ok(ip) => info!("external: http://{ip}:{port}/{}", config.start_path),
                Err(err) => warn!(error = %err, "could not determine external address"),
            }
        }

        Ok(Self {
            config,
            notifier,
            addrs,
            server,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Addresses actually bound (useful with `port = 0`).
    pub fn addrs(&self) -> &[SocketAddr] {
        &self.addrs
    }

    /// Tell every open page to reload.
    pub fn reload(&self) -> usize {
        self.notifier.notify()
    }

    pub fn handle(&self) -> ServerHandle {
        self.server.handle()
    }

    /// Serve until stopped through a [`ServerHandle`].
    pub async fn serve(self) -> Result<()> {
        self.server.await?;
        Ok(())
    }
}

/// Best-effort LAN address: the local side of a UDP "connection" (no packet
/// is sent).
fn external_ip() -> io::Result<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
    Ok(socket.local_addr()?.ip())
}

async fn events_handler(state: web::Data<ServerState>) -> HttpResponse {
    let rx = state.notifier.subscribe();
    debug!(listeners = state.notifier.listener_count(), "reload listener connected");

    let connected = stream::once(async { Ok::<Bytes, Infallible>(Bytes::from_static(b": connected\n\n")) });
    let reloads = stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Ok(_) | Err(RecvError::Lagged(_)) => {
                Some((Ok::<Bytes, Infallible>(Bytes::from_static(b"data: reload\n\n")), rx))
            }
            Err(RecvError::Closed) => None,
        }
    });

    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(connected.chain(reloads))
}

async fn static_handler(req: HttpRequest, state: web::Data<ServerState>) -> HttpResponse {
    let tail = req.match_info().query("tail");
    let Some(mut path) = resolve_request_path(&state.root, tail) else {
        debug!(path = tail, "rejected request path");
        return HttpResponse::NotFound().finish();
    };

    if tokio::fs::metadata(&path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        path.push("index.html");
    }

    if is_html(&path) {
        return match tokio::fs::read(&path).await {
            Ok(bytes) => HttpResponse::Ok()
                .content_type(ContentType::html())
                .insert_header((header::CACHE_CONTROL, "no-cache"))
                .body(inject_reload_script(&bytes)),
            Err(err) => read_error(&path, &err),
        };
    }

    match NamedFile::open_async(&path).await {
        Ok(file) => file.prefer_utf8(true).into_response(&req),
        Err(err) => read_error(&path, &err),
    }
}

fn read_error(path: &Path, err: &io::Error) -> HttpResponse {
    if err.kind() == io::ErrorKind::NotFound {
        return HttpResponse::NotFound().finish();
    }
    warn!(path = %path.display(), error = %err, "failed to read file");
    HttpResponse::InternalServerError().finish()
}

/// Map a URL tail onto a path under `root`. `None` for anything that would
/// leave the root.
pub fn resolve_request_path(root: &Path, tail: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for segment in tail.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            s if s.contains('\\') || s.contains(':') => return None,
            s => path.push(s),
        }
    }
    Some(path)
}

/// Content type by extension; `application/octet-stream` when unknown.
pub fn content_type(path: &Path) -> Mime {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    file_extension_to_mime(&ext.to_ascii_lowercase())
}

fn is_html(path: &Path) -> bool {
    content_type(path).essence_str() == "text/html"
}

/// Insert the reload script before the last `</body>`, or append it.
pub fn inject_reload_script(html: &[u8]) -> Vec<u8> {
    const CLOSE_BODY: &[u8] = b"</body>";

    let lower = html.to_ascii_lowercase();
    let at = lower
        .windows(CLOSE_BODY.len())
        .rposition(|w| w == CLOSE_BODY)
        .unwrap_or(html.len());

    let mut out = Vec::with_capacity(html.len() + RELOAD_SCRIPT.len());
    out.extend_from_slice(&html[..at]);
    out.extend_from_slice(RELOAD_SCRIPT.as_bytes());
    out.extend_from_slice(&html[at..]);
    out
}
