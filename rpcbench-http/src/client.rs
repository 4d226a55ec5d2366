use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::BodyExt as _;
use hyper::Request;
use hyper::body::Incoming;
use hyper::client::conn::{http1, http2};
use hyper_util::rt::{TokioExecutor, TokioIo};
use rpcbench_core::{PhaseTracer, TransportOptions};
use tokio::net::TcpStream;

use super::body::TracedBody;
use super::util::{dial_addr, has_header, host_header_value, parse_http_url, parse_proxy};
use super::{Error, HttpRequest, HttpResponse, Result};

/// Connection behaviour of one [`HttpClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Keep connections open between requests.
    pub keep_alive: bool,
    /// Ask for an uncompressed response (`accept-encoding: identity`).
    pub disable_compression: bool,
    /// Speak HTTP/2 with prior knowledge instead of HTTP/1.1.
    pub http2: bool,
    pub proxy: Option<String>,
    pub connect_timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            keep_alive: true,
            disable_compression: false,
            http2: false,
            proxy: None,
            // The OS-level TCP connect timeout can be very long; fail unreachable hosts promptly.
            connect_timeout: Some(Duration::from_secs(3)),
        }
    }
}

impl From<&TransportOptions> for ClientOptions {
    fn from(transport: &TransportOptions) -> Self {
        Self {
            keep_alive: !transport.disable_keep_alives,
            disable_compression: transport.disable_compression,
            http2: transport.http2,
            proxy: transport.proxy.clone(),
            ..Self::default()
        }
    }
}

enum Sender {
    Http1(http1::SendRequest<TracedBody>),
    Http2(http2::SendRequest<TracedBody>),
}

impl Sender {
    async fn ready(&mut self) -> bool {
        match self {
            Self::Http1(s) => !s.is_closed() && s.ready().await.is_ok(),
            Self::Http2(s) => !s.is_closed() && s.ready().await.is_ok(),
        }
    }

    async fn send(
        &mut self,
        req: Request<TracedBody>,
    ) -> std::result::Result<hyper::Response<Incoming>, hyper::Error> {
        match self {
            Self::Http1(s) => s.send_request(req).await,
            Self::Http2(s) => s.send_request(req).await,
        }
    }
}

/// HTTP client owned by a single worker.
///
/// Requests run one at a time. With keep-alive on, one connection per dialed address is kept
/// and reused for the next request.
pub struct HttpClient {
    options: ClientOptions,
    proxy: Option<url::Url>,
    conns: HashMap<String, Sender>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("options", &self.options)
            .field("open_connections", &self.conns.len())
            .finish()
    }
}

impl HttpClient {
    pub fn new(options: ClientOptions) -> Result<Self> {
        let proxy = options.proxy.as_deref().map(parse_proxy).transpose()?;
        Ok(Self {
            options,
            proxy,
            conns: HashMap::new(),
        })
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Sends `req` and reads the whole response. Phase boundaries are marked on `trace`.
    pub async fn request(
        &mut self,
        req: HttpRequest,
        trace: Option<&PhaseTracer>,
    ) -> Result<HttpResponse> {
        let target = parse_http_url(&req.url)?;
        let dial = self.proxy.as_ref().unwrap_or(&target);
        let addr = dial_addr(dial).ok_or_else(|| Error::InvalidUrl(req.url.clone()))?;

        // HTTP/2 and proxied requests carry the absolute URI; direct HTTP/1.1 uses origin-form.
        let uri = if self.proxy.is_some() || self.options.http2 {
            target.as_str().to_string()
        } else {
            target[url::Position::BeforePath..].to_string()
        };

        let mut builder = Request::builder().method(req.method).uri(uri);
        if !self.options.http2
            && !has_header(&req.headers, "host")
            && let Some(host) = host_header_value(&target)
        {
            builder = builder.header(http::header::HOST, host);
        }
        if !req.body.is_empty() && !has_header(&req.headers, "content-length") {
            builder = builder.header(http::header::CONTENT_LENGTH, req.body.len());
        }
        if self.options.disable_compression && !has_header(&req.headers, "accept-encoding") {
            builder = builder.header(http::header::ACCEPT_ENCODING, "identity");
        }
        if !self.options.keep_alive && !self.options.http2 {
            builder = builder.header(http::header::CONNECTION, "close");
        }
        for (k, v) in &req.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }

        let bodyless = req.body.is_empty();
        let request = builder.body(TracedBody::new(req.body, trace.cloned()))?;

        if let Some(trace) = trace {
            trace.connect_started();
        }
        let (mut sender, reused) = self.checkout(&addr).await?;
        if let Some(trace) = trace {
            trace.connection_obtained(reused);
            if bodyless {
                // Nothing to stream; the request is complete with its head.
                trace.request_written();
            }
        }

        let res = sender.send(request).await.map_err(Error::Request)?;
        if let Some(trace) = trace {
            trace.first_byte();
        }

        let status = res.status().as_u16();
        let body: Bytes = res
            .into_body()
            .collect()
            .await
            .map_err(Error::BodyRead)?
            .to_bytes();

        if self.options.keep_alive {
            self.conns.insert(addr, sender);
        }

        Ok(HttpResponse {
            status,
            body,
            reused,
        })
    }

    async fn checkout(&mut self, addr: &str) -> Result<(Sender, bool)> {
        if let Some(mut sender) = self.conns.remove(addr) {
            if sender.ready().await {
                return Ok((sender, true));
            }
            tracing::debug!(addr, "kept connection was closed; reconnecting");
        }
        Ok((self.connect(addr).await?, false))
    }

    async fn connect(&self, addr: &str) -> Result<Sender> {
        let connecting = TcpStream::connect(addr);
        let stream = match self.options.connect_timeout {
            Some(after) => tokio::time::timeout(after, connecting)
                .await
                .map_err(|_| Error::ConnectTimeout {
                    addr: addr.to_string(),
                    after,
                })?,
            None => connecting.await,
        }
        .map_err(|source| Error::Connect {
            addr: addr.to_string(),
            source,
        })?;
        let _ = stream.set_nodelay(true);
        let io = TokioIo::new(stream);

        if self.options.http2 {
            let (sender, conn) = http2::handshake(TokioExecutor::new(), io)
                .await
                .map_err(Error::Handshake)?;
            tokio::spawn(async move {
                if let Err(err) = conn.await {
                    tracing::debug!(error = %err, "http2 connection closed");
                }
            });
            Ok(Sender::Http2(sender))
        } else {
            let (sender, conn) = http1::handshake(io).await.map_err(Error::Handshake)?;
            tokio::spawn(async move {
                if let Err(err) = conn.await {
                    tracing::debug!(error = %err, "http1 connection closed");
                }
            });
            Ok(Sender::Http1(sender))
        }
    }
}
