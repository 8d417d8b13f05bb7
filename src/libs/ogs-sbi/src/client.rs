//! SBI HTTP/2 Client
//!
//! Speaks h2c (HTTP/2 with prior knowledge) to a single peer. The connection
//! is opened on first use and multiplexes every request after that. A
//! request that finds the connection already closed reconnects once.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::client::conn::http2::{self, SendRequest};
use hyper::{Method, Request, Response, Uri};
use hyper_util::rt::{TokioExecutor, TokioIo};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::error::{SbiError, SbiResult};
use crate::message::{
    SbiRequest, SbiResponse, CONTENT_TYPE_JSON, CONTENT_TYPE_JSON_PATCH, CONTENT_TYPE_PROBLEM_JSON,
};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type Sender = SendRequest<Full<Bytes>>;

/// SBI Client configuration
#[derive(Debug, Clone)]
pub struct SbiClientConfig {
    /// Target host (FQDN or IP)
    pub host: String,
    pub port: u16,
    /// Bound on TCP connect plus the HTTP/2 handshake
    pub connect_timeout: Duration,
    /// Bound on waiting for the response headers, and again on reading
    /// the response body
    pub request_timeout: Duration,
}

impl Default for SbiClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 80,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl SbiClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// `host:port` of the peer
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn base_uri(&self) -> String {
        format!("http://{}", self.authority())
    }
}

/// SBI Client - HTTP/2 client for one peer
pub struct SbiClient {
    config: SbiClientConfig,
    sender: Mutex<Option<Sender>>,
}

impl SbiClient {
    pub fn new(config: SbiClientConfig) -> Self {
        Self {
            config,
            sender: Mutex::new(None),
        }
    }

    pub fn with_host_port(host: impl Into<String>, port: u16) -> Self {
        Self::new(SbiClientConfig::new(host, port))
    }

    pub fn config(&self) -> &SbiClientConfig {
        &self.config
    }

    async fn connect(&self) -> SbiResult<Sender> {
        let authority = self.config.authority();

        let handshake = async {
            let stream = TcpStream::connect(&authority)
                .await
                .map_err(|e| SbiError::ConnectionError(format!("{}: {}", authority, e)))?;
            stream.set_nodelay(true)?;
            http2::handshake(TokioExecutor::new(), TokioIo::new(stream))
                .await
                .map_err(|e| SbiError::ConnectionError(format!("{}: {}", authority, e)))
        };
        let (sender, connection) = tokio::time::timeout(self.config.connect_timeout, handshake)
            .await
            .map_err(|_| SbiError::Timeout)??;

        let peer = authority.clone();
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                log::debug!("HTTP/2 connection to {} closed: {}", peer, e);
            }
        });

        log::debug!("SBI client connected to {}", authority);
        Ok(sender)
    }

    /// Cached sender, or a new connection when there is none or `reconnect` is set
    async fn sender(&self, reconnect: bool) -> SbiResult<Sender> {
        let mut cached = self.sender.lock().await;
        if !reconnect {
            if let Some(sender) = cached.as_ref().filter(|sender| !sender.is_closed()) {
                return Ok(sender.clone());
            }
        }

        let sender = self.connect().await?;
        *cached = Some(sender.clone());
        Ok(sender)
    }

    fn build_request(&self, request: &SbiRequest) -> SbiResult<Request<Full<Bytes>>> {
        let method = match request.header.method.to_ascii_uppercase().as_str() {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "PATCH" => Method::PATCH,
            "OPTIONS" => Method::OPTIONS,
            other => return Err(SbiError::InvalidMethod(other.to_string())),
        };

        let mut target = if request.header.uri.starts_with("http") {
            request.header.uri.clone()
        } else {
            format!("{}{}", self.config.base_uri(), request.header.uri)
        };
        if !request.http.params.is_empty() {
            let mut params: Vec<String> = request
                .http
                .params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            params.sort();
            target.push(if target.contains('?') { '&' } else { '?' });
            target.push_str(&params.join("&"));
        }
        let uri: Uri = target
            .parse()
            .map_err(|e| SbiError::InvalidUri(format!("{}: {}", target, e)))?;

        let mut builder = Request::builder().method(method).uri(uri);
        for (key, value) in &request.http.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if request.http.get_header("accept").is_none() {
            builder = builder.header(
                "accept",
                format!("{}, {}", CONTENT_TYPE_JSON, CONTENT_TYPE_PROBLEM_JSON),
            );
        }

        let body = request.http.content.clone().map(Bytes::from).unwrap_or_default();
        builder
            .body(Full::new(body))
            .map_err(|e| SbiError::InvalidRequest(e.to_string()))
    }

    async fn exchange(
        &self,
        sender: &mut Sender,
        request: &SbiRequest,
    ) -> SbiResult<Result<Response<Incoming>, hyper::Error>> {
        let http_request = self.build_request(request)?;
        tokio::time::timeout(self.config.request_timeout, sender.send_request(http_request))
            .await
            .map_err(|_| SbiError::Timeout)
    }

    /// Send an SBI request and receive a response
    pub async fn send_request(&self, request: SbiRequest) -> SbiResult<SbiResponse> {
        let mut sender = self.sender(false).await?;
        let response = match self.exchange(&mut sender, &request).await? {
            Ok(response) => response,
            // The request never left; the peer went away since the last use
            Err(e) if e.is_closed() => {
                log::debug!("SBI connection to {} lost, reconnecting", self.config.authority());
                let mut sender = self.sender(true).await?;
                self.exchange(&mut sender, &request)
                    .await?
                    .map_err(|e| SbiError::HyperError(e.to_string()))?
            }
            Err(e) => return Err(SbiError::HyperError(e.to_string())),
        };

        tokio::time::timeout(self.config.request_timeout, read_response(response))
            .await
            .map_err(|_| SbiError::Timeout)?
    }

    pub async fn get(&self, path: &str) -> SbiResult<SbiResponse> {
        self.send_request(SbiRequest::get(path)).await
    }

    pub async fn put_json<T: Serialize>(&self, path: &str, body: &T) -> SbiResult<SbiResponse> {
        self.send_request(SbiRequest::put(path).with_json_body(body)?)
            .await
    }

    /// Send a JSON Patch (RFC 6902) document
    pub async fn patch_json<T: Serialize>(&self, path: &str, body: &T) -> SbiResult<SbiResponse> {
        let request = SbiRequest::patch(path)
            .with_body(serde_json::to_string(body)?, CONTENT_TYPE_JSON_PATCH);
        self.send_request(request).await
    }
}

async fn read_response(response: Response<Incoming>) -> SbiResult<SbiResponse> {
    let (parts, body) = response.into_parts();
    let bytes = body
        .collect()
        .await
        .map_err(|e| SbiError::InvalidResponse(e.to_string()))?
        .to_bytes();

    let mut sbi_response = SbiResponse::with_status(parts.status.as_u16());
    for (key, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            sbi_response.http.set_header(key.as_str(), value);
        }
    }
    if !bytes.is_empty() {
        sbi_response
            .http
            .set_content(String::from_utf8_lossy(&bytes).into_owned());
    }
    Ok(sbi_response)
}
