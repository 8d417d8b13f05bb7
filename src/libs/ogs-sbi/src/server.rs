//! SBI HTTP/2 Server
//!
//! h2c server that turns every request into an [`SbiRequest`] and hands it
//! to an [`SbiRequestHandler`]. Stopping the server closes the listener and
//! sends GOAWAY on every open connection; requests already in flight are
//! answered first.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http2;
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::error::{SbiError, SbiResult};
use crate::message::{
    ProblemDetails, SbiHeader, SbiHttpMessage, SbiRequest, SbiResponse, CONTENT_TYPE_PROBLEM_JSON,
};

/// Server configuration
#[derive(Debug, Clone)]
pub struct SbiServerConfig {
    /// Bind address, port 0 picks a free port
    pub addr: SocketAddr,
}

impl Default for SbiServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 7777)),
        }
    }
}

impl SbiServerConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Create configuration with host and port
    pub fn with_host_port(host: impl AsRef<str>, port: u16) -> SbiResult<Self> {
        let addr: SocketAddr = format!("{}:{}", host.as_ref(), port)
            .parse()
            .map_err(|e| SbiError::InvalidUri(format!("Invalid address: {}", e)))?;
        Ok(Self::new(addr))
    }
}

/// Request handler trait
pub trait SbiRequestHandler: Send + Sync + 'static {
    /// Handle an incoming SBI request
    fn handle(&self, request: SbiRequest) -> Pin<Box<dyn Future<Output = SbiResponse> + Send>>;
}

/// Any `async` closure taking an [`SbiRequest`] is a handler
impl<F, Fut> SbiRequestHandler for F
where
    F: Fn(SbiRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SbiResponse> + Send + 'static,
{
    fn handle(&self, request: SbiRequest) -> Pin<Box<dyn Future<Output = SbiResponse> + Send>> {
        Box::pin(self(request))
    }
}

/// hyper service adapter around a handler
struct SbiService<H: SbiRequestHandler> {
    handler: Arc<H>,
}

impl<H: SbiRequestHandler> Service<Request<Incoming>> for SbiService<H> {
    type Response = Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let handler = self.handler.clone();
        Box::pin(async move {
            let response = match into_sbi_request(req).await {
                Ok(request) => handler.handle(request).await,
                Err(e) => send_bad_request(&format!("Unreadable request body: {}", e), None),
            };
            Ok(into_http_response(response))
        })
    }
}

async fn into_sbi_request(req: Request<Incoming>) -> Result<SbiRequest, hyper::Error> {
    let (parts, body) = req.into_parts();

    let mut http = SbiHttpMessage::default();
    for (key, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            http.set_header(key.as_str(), value);
        }
    }
    if let Some(query) = parts.uri.query() {
        for (key, value) in query.split('&').filter_map(|pair| pair.split_once('=')) {
            http.set_param(key, value);
        }
    }

    let bytes = body.collect().await?.to_bytes();
    if !bytes.is_empty() {
        http.set_content(String::from_utf8_lossy(&bytes).into_owned());
    }

    let uri = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    Ok(SbiRequest {
        header: SbiHeader::with_method_uri(parts.method.as_str(), uri),
        http,
    })
}

fn into_http_response(response: SbiResponse) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(response.status);
    for (key, value) in &response.http.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    let body = response.http.content.map(Bytes::from).unwrap_or_default();

    builder.body(Full::new(body)).unwrap_or_else(|e| {
        log::error!("Invalid SBI response: {}", e);
        let mut fallback = Response::new(Full::new(Bytes::new()));
        *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    })
}

async fn serve_connection<H: SbiRequestHandler>(
    stream: TcpStream,
    peer: SocketAddr,
    handler: Arc<H>,
    mut shutdown: watch::Receiver<bool>,
) {
    let connection = http2::Builder::new(TokioExecutor::new())
        .serve_connection(TokioIo::new(stream), SbiService { handler });
    tokio::pin!(connection);

    tokio::select! {
        result = connection.as_mut() => {
            if let Err(e) = result {
                log::debug!("HTTP/2 connection from {} closed: {}", peer, e);
            }
        }
        _ = shutdown.changed() => {
            connection.as_mut().graceful_shutdown();
            if let Err(e) = connection.await {
                log::debug!("HTTP/2 connection from {} closed: {}", peer, e);
            }
        }
    }
}

async fn accept_loop<H: SbiRequestHandler>(
    listener: TcpListener,
    handler: Arc<H>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(serve_connection(stream, peer, handler.clone(), shutdown.clone()));
                }
                Err(e) => log::warn!("Accept error: {}", e),
            },
            _ = shutdown.changed() => break,
        }
    }
}

struct Running {
    addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// SBI Server - HTTP/2 server for SBI communication
pub struct SbiServer {
    config: SbiServerConfig,
    running: Mutex<Option<Running>>,
}

impl SbiServer {
    pub fn new(config: SbiServerConfig) -> Self {
        Self {
            config,
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SbiServerConfig {
        &self.config
    }

    /// Bind and start serving.
    ///
    /// Returns the bound address, which differs from the configured one
    /// when port 0 is requested.
    pub async fn start<H: SbiRequestHandler>(&self, handler: H) -> SbiResult<SocketAddr> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(SbiError::ServerError("Server already running".to_string()));
        }

        let listener = TcpListener::bind(self.config.addr)
            .await
            .map_err(|e| SbiError::ServerError(format!("Failed to bind {}: {}", self.config.addr, e)))?;
        let addr = listener.local_addr()?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(accept_loop(listener, Arc::new(handler), shutdown_rx));
        *running = Some(Running {
            addr,
            shutdown,
            task,
        });

        log::info!("SBI server listening on {}", addr);
        Ok(addr)
    }

    /// Stop accepting and shut open connections down.
    ///
    /// The listener is closed when this returns.
    pub async fn stop(&self) -> SbiResult<()> {
        let running = self.running.lock().await.take();
        if let Some(running) = running {
            let _ = running.shutdown.send(true);
            running
                .task
                .await
                .map_err(|e| SbiError::ServerError(format!("Accept loop failed: {}", e)))?;
            log::info!("SBI server on {} stopped", running.addr);
        }
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }
}

/// Build a problem-details error response
pub fn send_error(status: u16, title: &str, detail: &str, cause: Option<&str>) -> SbiResponse {
    let mut problem = ProblemDetails::with_status(status as i32)
        .with_title(title)
        .with_detail(detail);
    if let Some(cause) = cause {
        problem = problem.with_cause(cause);
    }

    match serde_json::to_string(&problem) {
        Ok(body) => SbiResponse::with_status(status).with_body(body, CONTENT_TYPE_PROBLEM_JSON),
        Err(_) => SbiResponse::with_status(status),
    }
}

pub fn send_bad_request(detail: &str, cause: Option<&str>) -> SbiResponse {
    send_error(400, "Bad Request", detail, cause)
}

pub fn send_not_found(detail: &str, cause: Option<&str>) -> SbiResponse {
    send_error(404, "Not Found", detail, cause)
}

pub fn send_method_not_allowed(method: &str, resource: &str) -> SbiResponse {
    send_error(
        405,
        "Method Not Allowed",
        &format!("Method {} not allowed for resource {}", method, resource),
        Some("METHOD_NOT_ALLOWED"),
    )
}

pub fn send_internal_error(detail: &str) -> SbiResponse {
    send_error(500, "Internal Server Error", detail, Some("INTERNAL_ERROR"))
}
