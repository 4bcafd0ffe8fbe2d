//! # Health endpoint.
//!
//! `GET /ping` and `GET /ping/{seconds}`: 200 `{"message":"ok"}` when the
//! [`HealthView`] reports healthy within the window, 503
//! `{"error":"reactor not healthy"}` otherwise. `seconds` parses as a
//! decimal integer; absent or unparseable values fall back to 86400 (one
//! day). Anything else is a 404.

use std::net::SocketAddr;
use std::time::Duration;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use tokio::sync::oneshot;
use tracing::info;

use crate::error::RuntimeError;
use crate::health::view::HealthView;

const DEFAULT_HEALTHY_SECONDS: u64 = 86_400;

/// Running health endpoint; dropping the shutdown sender stops it.
pub struct HealthServer {
    shutdown: Option<oneshot::Sender<()>>,
    join: tokio::task::JoinHandle<()>,
}

impl HealthServer {
    /// Binds and serves in a background task.
    pub fn start(addr: SocketAddr, view: HealthView) -> Result<Self, RuntimeError> {
        let service = make_service_fn(move |_conn| {
            let view = view.clone();
            async move {
                Ok::<_, hyper::Error>(service_fn(move |req: Request<Body>| {
                    let view = view.clone();
                    async move { handle(req, view) }
                }))
            }
        });

        let (tx, rx) = oneshot::channel::<()>();
        let server = Server::try_bind(&addr)
            .map_err(|e| RuntimeError::Health {
                reason: e.to_string(),
            })?
            .serve(service)
            .with_graceful_shutdown(async {
                let _ = rx.await;
            });

        info!(%addr, "health endpoint listening");
        let join = tokio::spawn(async move {
            let _ = server.await;
        });

        Ok(Self {
            shutdown: Some(tx),
            join,
        })
    }

    /// Stops the listener and waits for it to finish.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.join.await;
    }
}

fn handle(req: Request<Body>, view: HealthView) -> Result<Response<Body>, hyper::Error> {
    if req.method() != Method::GET {
        return not_found();
    }

    let path = req.uri().path();
    let seconds = match path.strip_prefix("/ping") {
        Some("") | Some("/") => DEFAULT_HEALTHY_SECONDS,
        Some(rest) => match rest.strip_prefix('/') {
            Some(raw) => raw.parse::<u64>().unwrap_or(DEFAULT_HEALTHY_SECONDS),
            None => return not_found(),
        },
        None => return not_found(),
    };

    if view.healthy(Duration::from_secs(seconds)) {
        json_response(StatusCode::OK, r#"{"message": "ok"}"#)
    } else {
        json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            r#"{"error": "reactor not healthy"}"#,
        )
    }
}

fn json_response(status: StatusCode, body: &'static str) -> Result<Response<Body>, hyper::Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Body::from(body))
        .unwrap_or_else(|_| Response::new(Body::from(body))))
}

fn not_found() -> Result<Response<Body>, hyper::Error> {
    Ok(Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(Body::empty())
        .unwrap_or_else(|_| Response::new(Body::empty())))
}
